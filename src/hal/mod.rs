//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `coil`: Four-coil half-step stepper over `embedded-hal` output pins
//! - `magnetic`: Shaft angle from a 3-axis magnetometer
//! - `mock`: Test implementations for desktop development

pub mod coil;
pub mod magnetic;
pub mod mock;

pub use coil::*;
pub use magnetic::*;
pub use mock::*;
