//! Wiring for the complete blind controller.
//!
//! [`BlindService::start`] builds the three tasks, connects their channels and
//! spawns them on the current tokio runtime:
//!
//! ```text
//!                 interrupts             sequences
//!  MotionController ─────────> Interaction ─────────> Sequencer ──> LED
//!        ^                        Machine
//!        │      set_target           │
//!        └───────────────────────────┘
//! ```
//!
//! [`BlindService::shutdown`] stops them in dependency order: the knob first
//! (so no new target or LED request is produced), then the controller (which
//! powers the coils down), then the LED sequencer. The LED is switched off
//! last.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::color::Color;
use crate::config::ServiceConfig;
use crate::controller::{ControllerDocument, ControllerHandle, MotionController};
use crate::error::Error;
use crate::interaction::{InteractionMachine, InteractionState};
use crate::sequencer::Sequencer;
use crate::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::traits::{Actuator, ColorOutput, InterruptPin, PositionSensor, RotaryInput};

/// The devices a [`BlindService`] drives.
#[derive(Debug)]
pub struct Hardware<A, S, P, R, L> {
    /// Stepper driving the shaft
    pub actuator: A,
    /// Absolute shaft angle sensor
    pub sensor: S,
    /// Knob interrupt line, if wired
    pub interrupt_pin: Option<P>,
    /// Knob clicks and button
    pub rotary: R,
    /// Knob LED
    pub led: L,
}

/// Running controller, knob and LED tasks.
pub struct BlindService<L> {
    trigger: ShutdownTrigger,
    controller: ControllerHandle,
    state: watch::Receiver<InteractionState>,
    interaction_task: JoinHandle<()>,
    controller_task: JoinHandle<()>,
    sequencer_task: JoinHandle<L>,
}

impl<L> BlindService<L>
where
    L: ColorOutput + Send + 'static,
{
    /// Validate `config`, build every task and spawn them.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<A, S, P, R>(hardware: Hardware<A, S, P, R, L>, config: ServiceConfig) -> Result<Self, Error>
    where
        A: Actuator + Send + 'static,
        S: PositionSensor + Send + 'static,
        P: InterruptPin + Send + 'static,
        R: RotaryInput + Send + 'static,
    {
        config.validate()?;

        let mut controller = MotionController::new(
            hardware.actuator,
            hardware.sensor,
            hardware.interrupt_pin,
            config.controller,
        )?;
        let handle = controller.handle();
        let (sequencer, led) = Sequencer::new(hardware.led, &config.sequencer)?;
        let machine = InteractionMachine::new(
            hardware.rotary,
            ControllerDocument::new(handle.clone()),
            controller.take_interrupts(),
            led,
            config.interaction,
        )?;
        let state = machine.subscribe_state();

        let (trigger, shutdown) = shutdown::channel();
        let sequencer_task = tokio::spawn(sequencer.run(shutdown.clone()));
        let controller_task = tokio::spawn(controller.run(shutdown.clone()));
        let interaction_task = tokio::spawn(machine.run(shutdown));

        info!("blind service started");
        Ok(Self {
            trigger,
            controller: handle,
            state,
            interaction_task,
            controller_task,
            sequencer_task,
        })
    }

    /// Handle for reading the shaft state and setting targets.
    pub fn controller(&self) -> &ControllerHandle {
        &self.controller
    }

    /// Observe the knob state machine.
    pub fn interaction_state(&self) -> watch::Receiver<InteractionState> {
        self.state.clone()
    }

    /// A listener for this service's shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        self.trigger.subscribe()
    }

    /// Stop every task and switch the LED off.
    ///
    /// Every task is joined even if an earlier one failed; the first
    /// failure is returned.
    pub async fn shutdown(self) -> Result<(), Error> {
        info!("blind service stopping");
        self.trigger.trigger();

        let interaction = self.interaction_task.await;
        let controller = self.controller_task.await;
        let led = match self.sequencer_task.await {
            Ok(mut led) => {
                if let Err(e) = led.set_color(Color::OFF) {
                    warn!(error = ?e, "failed to switch LED off");
                }
                Ok(())
            }
            Err(e) => Err(e),
        };

        interaction?;
        controller?;
        led?;
        info!("blind service stopped");
        Ok(())
    }
}
