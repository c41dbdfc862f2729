//! # rs-blinds
//!
//! A motorized window-blind controller: a stepper turns the blind shaft, an
//! absolute position sensor closes the loop, and a rotary knob with an RGB
//! LED lets a person pick the angle by hand.
//!
//! ## Features
//!
//! - **Closed-loop motion**: Dead reckoning corrected by periodic sensor reads,
//!   with deceleration near the target
//! - **Safety stop**: Motion halts when position readings go stale
//! - **Knob editing**: Debounced clicks build a draft angle, committed after a
//!   quiet period
//! - **LED feedback**: The draft is shown as a color between two endpoints
//! - **Hardware abstraction**: Traits for every device, with desktop mocks
//!
//! ## Architecture
//!
//! Three tokio tasks cooperate over channels:
//!
//! - `controller` - Feedback loop owning the stepper and sensor
//! - `interaction` - Knob state machine (Idle, Debounce, Edit)
//! - `sequencer` - Plays timed color sequences on the knob LED
//! - `service` - Starts the three tasks and shuts them down in order
//!
//! Supporting modules:
//!
//! - `motion` - Step/degree arithmetic and the loop's bookkeeping
//! - `traits` - Hardware and document abstractions
//! - `hal` - Coil driver, magnetometer sensor and mocks
//! - `config`, `color`, `shutdown`, `error`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//! use rs_blinds::{
//!     BlindService, Hardware, ServiceConfig,
//!     config::ControllerConfig,
//!     hal::{MockInterruptPin, MockRotary, SimulatedShaft},
//! };
//!
//! # tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap().block_on(async {
//! let shaft = SimulatedShaft::new(0.0, 2);
//! let knob = Arc::new(Mutex::new(MockRotary::new()));
//!
//! let config = ServiceConfig::default().with_controller(
//!     ControllerConfig::default()
//!         .with_steps_per_degree(2)
//!         .with_delay_us(100)
//!         .with_idle_delay_ms(20)
//!         .with_pos_update_interval_ms(20)
//!         .with_interrupt_pin(Some(4)),
//! );
//!
//! let service = BlindService::start(
//!     Hardware {
//!         actuator: shaft.stepper(),
//!         sensor: shaft.sensor(),
//!         interrupt_pin: Some(MockInterruptPin::new()),
//!         rotary: Arc::clone(&knob),
//!         led: Arc::clone(&knob),
//!     },
//!     config,
//! )
//! .unwrap();
//!
//! let controller = service.controller().clone();
//! let shutdown = service.shutdown_signal();
//! assert!(controller.move_to(-30, Duration::from_millis(10), &shutdown).await);
//!
//! service.shutdown().await.unwrap();
//! # });
//! ```

#![warn(missing_docs)]

/// RGB colors and blending.
pub mod color;
/// Component configuration with defaults and validation.
pub mod config;
/// Closed-loop motion controller task and its handle.
pub mod controller;
/// Crate error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Rotary-knob interaction state machine.
pub mod interaction;
/// Step/degree conversion and feedback-loop bookkeeping.
pub mod motion;
/// Knob LED sequence player.
pub mod sequencer;
/// Task wiring and ordered shutdown.
pub mod service;
/// Cooperative shutdown signal.
pub mod shutdown;
/// Core traits for hardware abstraction.
pub mod traits;

// Re-exports for convenience
pub use color::Color;
pub use config::{ControllerConfig, InteractionConfig, SequencerConfig, ServiceConfig};
pub use controller::{ControllerDocument, ControllerHandle, MotionController};
pub use error::{ConfigError, Error};
pub use interaction::{angle_color, InteractionMachine, InteractionState};
pub use motion::{target_steps, ShaftSample};
pub use sequencer::{LedSequence, LedStep, SequenceFull, Sequencer, SequencerHandle};
pub use service::{BlindService, Hardware};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use traits::{
    // Hardware
    Actuator,
    // Document
    AngleDocument,
    ButtonState,
    ColorOutput,
    InterruptPin,
    MagneticField,
    NoInterruptPin,
    PositionSensor,
    RotaryInput,
    StepDirection,
};
