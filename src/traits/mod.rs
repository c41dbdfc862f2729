//! Trait definitions for hardware abstraction and the edit document.
//!
//! These traits let rs-blinds:
//! - Run on different hardware (GPIO/I2C drivers, desktop mocks)
//! - Decouple the knob interaction from the motion controller
//!
//! # Submodules
//!
//! - `hardware`: Position sensor, stepper actuator, rotary knob, LED, interrupt line
//! - `document`: The angle store the knob edits
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`PositionSensor`]: Absolute shaft angle
//! - [`Actuator`]: Stepper steps and coil power
//! - [`RotaryInput`]: Encoder clicks and push button
//! - [`ColorOutput`]: Knob LED
//! - [`InterruptPin`]: Polled edge detector

pub mod document;
pub mod hardware;

pub use document::*;
pub use hardware::*;
