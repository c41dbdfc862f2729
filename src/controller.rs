//! Closed-loop motion controller.
//!
//! [`MotionController`] owns the actuator and drives the shaft toward the
//! most recent target angle. It combines dead reckoning (counting its own
//! steps) with periodic absolute readings from the position sensor. Readings
//! run on the blocking thread pool so stepping never stalls on the bus.
//!
//! Other tasks talk to the loop through a cloneable [`ControllerHandle`]:
//!
//! - [`set_target`](ControllerHandle::set_target) clamps and delivers a new
//!   target, suspending while an earlier one is still queued
//! - [`pos`](ControllerHandle::pos), [`target`](ControllerHandle::target)
//!   and [`at_target`](ControllerHandle::at_target) read the published state
//!   without blocking
//!
//! If readings stop arriving for `stop_motion_after`, the loop enters a
//! safety stop and leaves the actuator alone until a fresh reading lands.
//!
//! # Example
//!
//! ```rust
//! use rs_blinds::config::ControllerConfig;
//! use rs_blinds::controller::MotionController;
//! use rs_blinds::hal::SimulatedShaft;
//! use rs_blinds::shutdown;
//!
//! # tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap().block_on(async {
//! let shaft = SimulatedShaft::new(0.0, 2);
//! let config = ControllerConfig::default()
//!     .with_steps_per_degree(2)
//!     .with_delay_us(100)
//!     .with_pos_update_interval_ms(20)
//!     .with_idle_delay_ms(20);
//!
//! let controller = MotionController::without_interrupts(shaft.stepper(), shaft.sensor(), config).unwrap();
//! let handle = controller.handle();
//! let (trigger, shutdown) = shutdown::channel();
//! let task = tokio::spawn(controller.run(shutdown.clone()));
//!
//! handle.set_target(20).await;
//! assert!(handle.move_to(20, std::time::Duration::from_millis(10), &shutdown).await);
//!
//! trigger.trigger();
//! task.await.unwrap();
//! # });
//! ```

use core::time::Duration;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ControllerConfig};
use crate::error::Error;
use crate::motion::{angle_to_slot, slot_to_angle, Action, FeedbackState, ShaftSample, StepPacer};
use crate::shutdown::Shutdown;
use crate::traits::{Actuator, AngleDocument, InterruptPin, NoInterruptPin, PositionSensor};

/// State published by the loop and read by handles.
#[derive(Debug)]
struct Shared {
    angle: AtomicI32,
    target: AtomicI32,
    position: AtomicI64,
}

impl Shared {
    fn new(position: i64) -> Self {
        Self {
            angle: AtomicI32::new(angle_to_slot(None)),
            target: AtomicI32::new(angle_to_slot(None)),
            position: AtomicI64::new(position),
        }
    }
}

// ============================================================================
// Controller Handle
// ============================================================================

/// Cloneable access to a running [`MotionController`].
#[derive(Clone, Debug)]
pub struct ControllerHandle {
    shared: Arc<Shared>,
    targets: mpsc::Sender<i32>,
    config: ControllerConfig,
}

impl ControllerHandle {
    /// Request a new target angle, clamped into the configured range.
    ///
    /// A target equal to the last requested one is dropped. Otherwise this
    /// suspends until the loop has room for it.
    pub async fn set_target(&self, angle: i32) {
        let angle = self.config.clamp_angle(angle);
        if self.shared.target.swap(angle, Ordering::AcqRel) == angle {
            return;
        }
        debug!(angle, "target requested");
        if self.targets.send(angle).await.is_err() {
            warn!(angle, "motion loop stopped, target not delivered");
        }
    }

    /// Last accepted sensor angle, `None` before the first good reading.
    pub fn pos(&self) -> Option<i32> {
        slot_to_angle(self.shared.angle.load(Ordering::Acquire))
    }

    /// Last requested target, `None` if none was ever set.
    pub fn target(&self) -> Option<i32> {
        slot_to_angle(self.shared.target.load(Ordering::Acquire))
    }

    /// Dead-reckoned step counter.
    pub fn step_position(&self) -> i64 {
        self.shared.position.load(Ordering::Acquire)
    }

    /// True when both the target and the position are known and
    /// `2 * |target - pos| < position_accuracy`.
    pub fn at_target(&self) -> bool {
        match (self.target(), self.pos()) {
            (Some(target), Some(pos)) => {
                let off = (i64::from(target) - i64::from(pos)).abs();
                off * 2 < i64::from(self.config.position_accuracy)
            }
            _ => false,
        }
    }

    /// Set a target and wait until the shaft reports being there.
    ///
    /// Returns false if `shutdown` fires first.
    pub async fn move_to(&self, angle: i32, poll: Duration, shutdown: &Shutdown) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return false,
            _ = self.set_target(angle) => {}
        }
        loop {
            if self.at_target() {
                return true;
            }
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return false,
                _ = sleep(poll) => {}
            }
        }
    }
}

// ============================================================================
// Controller Document
// ============================================================================

/// Round to the nearest multiple of ten, halves away from zero.
fn round_to_ten(angle: i32) -> i32 {
    ((f64::from(angle) / 10.0).round() as i32) * 10
}

/// [`AngleDocument`] backed by the controller's target.
///
/// Until the first sensor reading the committed angle is 0 and commits are
/// ignored, so an edit cannot send the shaft somewhere relative to an
/// unknown position. After that, edits start from the current target, or
/// from the measured angle rounded to ten degrees if no target was set.
#[derive(Clone, Debug)]
pub struct ControllerDocument {
    handle: ControllerHandle,
    initialized: bool,
}

impl ControllerDocument {
    /// Wrap a controller handle.
    pub fn new(handle: ControllerHandle) -> Self {
        Self {
            handle,
            initialized: false,
        }
    }

    /// True once the shaft position has been observed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl AngleDocument for ControllerDocument {
    fn committed_angle(&mut self) -> i32 {
        let pos = self.handle.pos();
        if !self.initialized {
            if pos.is_none() {
                return 0;
            }
            self.initialized = true;
        }
        self.handle
            .target()
            .or_else(|| pos.map(round_to_ten))
            .unwrap_or(0)
    }

    async fn commit(&mut self, angle: i32) {
        if !self.initialized {
            debug!(angle, "shaft position unknown, commit ignored");
            return;
        }
        self.handle.set_target(angle).await;
    }
}

// ============================================================================
// Motion Controller
// ============================================================================

/// Why [`MotionController::wait`] returned.
enum Wake {
    Elapsed,
    Sample(ShaftSample),
    Shutdown,
}

/// The feedback loop task and the hardware it owns.
pub struct MotionController<A, S, P = NoInterruptPin> {
    config: ControllerConfig,
    actuator: A,
    sensor: Arc<Mutex<S>>,
    pin: Option<P>,
    shared: Arc<Shared>,
    targets_tx: mpsc::Sender<i32>,
    targets: mpsc::Receiver<i32>,
    interrupts_tx: mpsc::Sender<Instant>,
    interrupts: Option<mpsc::Receiver<Instant>>,
}

impl<A, S> MotionController<A, S, NoInterruptPin>
where
    A: Actuator + Send + 'static,
    S: PositionSensor + Send + 'static,
{
    /// Build a controller that never polls an interrupt line.
    pub fn without_interrupts(actuator: A, sensor: S, config: ControllerConfig) -> Result<Self, Error> {
        Self::new(actuator, sensor, None, config.with_interrupt_pin(None))
    }
}

impl<A, S, P> MotionController<A, S, P>
where
    A: Actuator + Send + 'static,
    S: PositionSensor + Send + 'static,
    P: InterruptPin + Send + 'static,
{
    /// Validate `config` and take ownership of the hardware.
    ///
    /// `pin` is polled only when `config.interrupt_pin` is set; a configured
    /// pin without a driver is an error.
    pub fn new(actuator: A, sensor: S, pin: Option<P>, config: ControllerConfig) -> Result<Self, Error> {
        config.validate()?;
        let pin = match (config.interrupt_pin, pin) {
            (Some(_), Some(pin)) => Some(pin),
            (Some(line), None) => return Err(ConfigError::MissingInterruptPin(line).into()),
            (None, Some(_)) => {
                debug!("no interrupt line configured, pin driver unused");
                None
            }
            (None, None) => None,
        };

        let (targets_tx, targets) = mpsc::channel(1);
        let (interrupts_tx, interrupts) = mpsc::channel(1);

        Ok(Self {
            config,
            actuator,
            sensor: Arc::new(Mutex::new(sensor)),
            pin,
            shared: Arc::new(Shared::new(crate::motion::INITIAL_STEP_POSITION)),
            targets_tx,
            targets,
            interrupts_tx,
            interrupts: Some(interrupts),
        })
    }

    /// A new handle to this controller.
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            shared: Arc::clone(&self.shared),
            targets: self.targets_tx.clone(),
            config: self.config.clone(),
        }
    }

    /// Take the receiver of knob interrupts. Returns `None` after the first
    /// call.
    ///
    /// Each message carries the time the edge was seen. At most one is
    /// pending; edges observed while one is queued are dropped.
    pub fn take_interrupts(&mut self) -> Option<mpsc::Receiver<Instant>> {
        self.interrupts.take()
    }

    /// Run the feedback loop until `shutdown` fires.
    ///
    /// On exit the loop waits for any in-flight sensor read, then powers
    /// the actuator off.
    pub async fn run(mut self, shutdown: Shutdown) {
        let (results_tx, mut results) = mpsc::channel::<ShaftSample>(1);
        let mut state = FeedbackState::new();
        let mut pacer = StepPacer::default();
        let interval = self.config.pos_update_interval();

        info!(
            steps_per_degree = self.config.steps_per_degree,
            min_angle = self.config.min_angle,
            max_angle = self.config.max_angle,
            "motion loop started"
        );

        loop {
            while let Ok(angle) = self.targets.try_recv() {
                state.apply_target(angle, self.config.steps_per_degree);
                debug!(angle, target_position = state.target_position, "new target");
            }
            while let Ok(sample) = results.try_recv() {
                self.absorb(&mut state, sample);
            }
            if shutdown.is_cancelled() {
                break;
            }

            let now = Instant::now();
            if state.wants_read(now, interval) {
                self.dispatch_read(&results_tx);
                state.start_read(now);
            }
            if state.check_staleness(now, self.config.stop_motion_after()) {
                self.report_stop();
            }

            let deadline = match state.next_action() {
                Action::Step(direction) => {
                    let delay = self.config.delay();
                    let burst = pacer.due(now, delay, state.remaining());
                    for _ in 0..burst {
                        if let Err(e) = self.actuator.step(direction) {
                            warn!(error = ?e, ?direction, "step failed");
                            break;
                        }
                        state.advance(direction);
                        self.shared.position.store(state.position, Ordering::Release);
                        if state.check_staleness(Instant::now(), self.config.stop_motion_after()) {
                            self.report_stop();
                            break;
                        }
                    }
                    pacer.next_due().unwrap_or(now + delay)
                }
                Action::Hold => {
                    pacer.reset();
                    self.idle_until(now, &state)
                }
                Action::Arrived { first } => {
                    pacer.reset();
                    if first {
                        debug!(angle = ?state.target_angle, "reached target position");
                        if !state.read_in_flight {
                            self.dispatch_read(&results_tx);
                            state.start_read(now);
                        }
                    }
                    if let Err(e) = self.actuator.power_off() {
                        warn!(error = ?e, "power off failed");
                    }
                    if first {
                        now + self.config.delay()
                    } else {
                        self.idle_until(now, &state)
                    }
                }
            };

            match self.wait(deadline, &shutdown, &mut results).await {
                Wake::Elapsed => {}
                Wake::Sample(sample) => self.absorb(&mut state, sample),
                Wake::Shutdown => break,
            }
        }

        drop(results_tx);
        if state.read_in_flight {
            debug!("waiting for in-flight position read");
            let _ = results.recv().await;
        }
        if let Err(e) = self.actuator.power_off() {
            warn!(error = ?e, "power off failed");
        }
        info!("motion loop stopped");
    }

    /// Apply a finished read to the loop state and publish the angle.
    fn absorb(&self, state: &mut FeedbackState, sample: ShaftSample) {
        let accepted = state.accept_sample(
            sample,
            self.config.position_accuracy,
            self.config.steps_per_degree,
        );
        if accepted {
            self.shared
                .angle
                .store(angle_to_slot(sample.angle), Ordering::Release);
            debug!(
                angle = ?sample.angle,
                step_position = sample.step_position,
                target_position = state.target_position,
                "position updated"
            );
        }
    }

    fn report_stop(&self) {
        warn!(
            stale_for = ?self.config.stop_motion_after(),
            "no position reading, stopping motion"
        );
    }

    /// Idle deadline, brought forward if a read comes due sooner.
    fn idle_until(&self, now: Instant, state: &FeedbackState) -> Instant {
        let idle = now + self.config.idle_delay();
        match state.next_read_at(self.config.pos_update_interval()) {
            Some(read_at) => idle.min(read_at.max(now)),
            None => idle,
        }
    }

    /// Sleep until `deadline`, polling the interrupt line meanwhile.
    ///
    /// A finished sensor read ends the wait early.
    async fn wait(
        &mut self,
        deadline: Instant,
        shutdown: &Shutdown,
        results: &mut mpsc::Receiver<ShaftSample>,
    ) -> Wake {
        loop {
            self.poll_interrupt();
            let wake = deadline.min(Instant::now() + self.config.interrupt_poll());
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Wake::Shutdown,
                Some(sample) = results.recv() => return Wake::Sample(sample),
                _ = sleep_until(wake) => {}
            }
            if wake >= deadline {
                return Wake::Elapsed;
            }
        }
    }

    fn poll_interrupt(&mut self) {
        let Some(pin) = self.pin.as_mut() else {
            return;
        };
        if !pin.edge_detected() {
            return;
        }
        match self.interrupts_tx.try_send(Instant::now()) {
            Ok(()) => debug!("knob interrupt"),
            Err(TrySendError::Full(_)) => debug!("knob interrupt already pending"),
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Read the sensor on the blocking pool; the result arrives on `results`.
    fn dispatch_read(&self, results: &mpsc::Sender<ShaftSample>) {
        let sensor = Arc::clone(&self.sensor);
        let shared = Arc::clone(&self.shared);
        let results = results.clone();

        tokio::task::spawn_blocking(move || {
            let taken_at = Instant::now();
            let step_position = shared.position.load(Ordering::Acquire);
            let reading = sensor
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .read();
            let sample = match reading {
                Ok(degrees) => ShaftSample::new(taken_at, step_position, degrees as i32),
                Err(e) => {
                    warn!(error = ?e, "position read failed");
                    ShaftSample::failed()
                }
            };
            let _ = results.blocking_send(sample);
        });
    }
}
