//! Rotary-knob interaction state machine.
//!
//! Turning the knob edits a draft angle. The machine wakes on interrupts
//! forwarded by the motion controller, waits for the knob to settle, reads
//! the accumulated clicks, and shows the draft as a color on the knob LED.
//! After a quiet period the draft is committed to the [`AngleDocument`].
//!
//! # States
//!
//! ```text
//!            interrupt                 debounce elapsed
//!   Idle ─────────────────> Debounce ─────────────────> Edit
//!    ^   (draft := committed)   ^   (read knob, show draft)  │
//!    │                          │         interrupt          │
//!    │                          └────────────────────────────┤
//!    │               commit_after elapsed (commit draft)     │
//!    └───────────────────────────────────────────────────────┘
//! ```
//!
//! Interrupts during `Debounce` are ignored and do not extend the window.
//! Knob read errors skip the adjustment; they never end the session.

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::color::Color;
use crate::config::InteractionConfig;
use crate::error::Error;
use crate::sequencer::{LedSequence, SequencerHandle};
use crate::shutdown::Shutdown;
use crate::traits::{AngleDocument, RotaryInput};

/// Where the machine is in an edit session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InteractionState {
    /// Waiting for the knob to move.
    #[default]
    Idle,
    /// Knob moved; waiting for it to settle before reading.
    Debounce,
    /// Draft shown; waiting for more input or the commit timeout.
    Edit,
}

/// Feedback color for `angle`, blending linearly from the configured low
/// color at `min_angle` to the high color at `max_angle`.
///
/// ```rust
/// use rs_blinds::config::InteractionConfig;
/// use rs_blinds::interaction::angle_color;
/// use rs_blinds::Color;
///
/// let config = InteractionConfig::default();
/// assert_eq!(angle_color(config.min_angle, &config), Color::BLUE);
/// assert_eq!(angle_color(config.max_angle, &config), Color::GREEN);
/// ```
pub fn angle_color(angle: i32, config: &InteractionConfig) -> Color {
    let span = (i64::from(config.max_angle) - i64::from(config.min_angle)) as f32;
    let ratio = (i64::from(angle) - i64::from(config.min_angle)) as f32 / span;
    Color::blend(config.low_color, config.high_color, ratio)
}

enum Event {
    Shutdown,
    Interrupt,
    Timer,
}

/// Next interrupt, or never if the channel is gone.
async fn next_interrupt(rx: &mut Option<mpsc::Receiver<Instant>>) -> Instant {
    let closed = match rx.as_mut() {
        Some(inner) => match inner.recv().await {
            Some(at) => return at,
            None => true,
        },
        None => false,
    };
    if closed {
        debug!("interrupt channel closed");
        *rx = None;
    }
    core::future::pending().await
}

/// The knob task.
pub struct InteractionMachine<R, D> {
    config: InteractionConfig,
    rotary: R,
    document: D,
    interrupts: Option<mpsc::Receiver<Instant>>,
    led: SequencerHandle,
    state: watch::Sender<InteractionState>,
    draft: i32,
    button: bool,
}

impl<R, D> InteractionMachine<R, D>
where
    R: RotaryInput + Send,
    D: AngleDocument,
{
    /// Validate `config` and assemble the machine.
    ///
    /// With `interrupts` set to `None` the machine stays idle until shutdown.
    pub fn new(
        rotary: R,
        document: D,
        interrupts: Option<mpsc::Receiver<Instant>>,
        led: SequencerHandle,
        config: InteractionConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let (state, _) = watch::channel(InteractionState::Idle);
        Ok(Self {
            config,
            rotary,
            document,
            interrupts,
            led,
            state,
            draft: 0,
            button: false,
        })
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<InteractionState> {
        self.state.subscribe()
    }

    /// Run until `shutdown` fires. An unfinished draft is discarded.
    pub async fn run(mut self, shutdown: Shutdown) {
        let mut state = InteractionState::Idle;
        let mut deadline = Instant::now();

        info!("interaction machine started");
        loop {
            self.state.send_replace(state);

            let timed = state != InteractionState::Idle;
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Event::Shutdown,
                _ = sleep_until(deadline), if timed => Event::Timer,
                _ = next_interrupt(&mut self.interrupts) => Event::Interrupt,
            };

            state = match (state, event) {
                (_, Event::Shutdown) => break,
                (InteractionState::Idle, Event::Interrupt) => {
                    self.draft = self
                        .document
                        .committed_angle()
                        .clamp(self.config.min_angle, self.config.max_angle);
                    debug!(angle = self.draft, "edit session started");
                    deadline = Instant::now() + self.config.debounce();
                    InteractionState::Debounce
                }
                (InteractionState::Debounce, Event::Interrupt) => InteractionState::Debounce,
                (InteractionState::Debounce, Event::Timer) => {
                    self.sample_knob(&shutdown).await;
                    deadline = Instant::now() + self.config.commit_after();
                    InteractionState::Edit
                }
                (InteractionState::Edit, Event::Interrupt) => {
                    deadline = Instant::now() + self.config.debounce();
                    InteractionState::Debounce
                }
                (InteractionState::Edit, Event::Timer) => {
                    info!(angle = self.draft, "committing knob edit");
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = self.document.commit(self.draft) => {}
                    }
                    InteractionState::Idle
                }
                (InteractionState::Idle, Event::Timer) => InteractionState::Idle,
            };
        }

        self.state.send_replace(InteractionState::Idle);
        info!("interaction machine stopped");
    }

    /// Read the button and clicks, update the draft and show it.
    async fn sample_knob(&mut self, shutdown: &Shutdown) {
        match self.rotary.button() {
            Ok(button) => {
                if button.pressed && !self.button {
                    debug!("knob button pressed");
                }
                self.button = button.pressed;
            }
            Err(e) => warn!(error = ?e, "knob button read failed"),
        }

        let clicks = match self.rotary.delta() {
            Ok(clicks) => clicks,
            Err(e) => {
                warn!(error = ?e, "knob read failed");
                return;
            }
        };

        let previous = self.draft;
        self.draft = self
            .draft
            .saturating_add(clicks.saturating_mul(self.config.click_angle))
            .clamp(self.config.min_angle, self.config.max_angle);
        debug!(clicks, from = previous, to = self.draft, "draft adjusted");

        let color = angle_color(self.draft, &self.config);
        let feedback = LedSequence::single(color, self.config.commit_after());
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {}
            delivered = self.led.submit(feedback) => {
                if !delivered {
                    debug!("LED sequencer stopped, feedback dropped");
                }
            }
        }
    }
}
