//! Hardware abstraction traits for the shaft, the knob and the interrupt line.
//!
//! These traits let the control tasks run against real drivers or the
//! desktop mocks in [`crate::hal::mock`].
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`PositionSensor`] | Absolute shaft angle in degrees |
//! | [`Actuator`] | Single signed stepper steps and coil power-off |
//! | [`RotaryInput`] | Knob clicks since last read and push-button state |
//! | [`ColorOutput`] | Knob LED color |
//! | [`InterruptPin`] | Polled edge detector for the knob's interrupt line |
//! | [`MagneticField`] | Raw field vector from a 3-axis magnetometer |
//!
//! # Sharing one knob device
//!
//! A single rotary board usually provides both [`RotaryInput`] and
//! [`ColorOutput`]. The interaction machine reads the knob and the sequencer
//! writes the LED, so the device is shared as `Arc<Mutex<T>>`, which
//! implements both traits:
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use rs_blinds::hal::MockRotary;
//! use rs_blinds::traits::{ColorOutput, RotaryInput};
//! use rs_blinds::Color;
//!
//! let knob = Arc::new(Mutex::new(MockRotary::new()));
//! let mut input = Arc::clone(&knob);
//! let mut led = Arc::clone(&knob);
//!
//! knob.lock().unwrap().queue_delta(2);
//! assert_eq!(input.delta().unwrap(), 2);
//!
//! led.set_color(Color::RED).unwrap();
//! assert_eq!(knob.lock().unwrap().last_color(), Some(Color::RED));
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::color::Color;

/// Direction of a single stepper step.
///
/// [`Forward`](Self::Forward) advances the step counter and turns the shaft
/// toward lower angles. The sign convention is fixed by the controller's
/// target computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepDirection {
    /// One step in the positive step-counter direction.
    Forward,
    /// One step in the negative step-counter direction.
    Backward,
}

impl StepDirection {
    /// The step-counter change for this direction (`+1` or `-1`).
    #[inline]
    pub const fn delta(self) -> i64 {
        match self {
            StepDirection::Forward => 1,
            StepDirection::Backward => -1,
        }
    }

    /// Direction that moves `from` toward `to`, or `None` if they are equal.
    #[inline]
    pub fn toward(from: i64, to: i64) -> Option<Self> {
        match to.cmp(&from) {
            core::cmp::Ordering::Greater => Some(StepDirection::Forward),
            core::cmp::Ordering::Less => Some(StepDirection::Backward),
            core::cmp::Ordering::Equal => None,
        }
    }
}

/// Absolute shaft position sensor.
///
/// `read` is synchronous and may be slow (a bus transaction plus conversion
/// delay). The controller always calls it from the blocking thread pool,
/// never from the feedback loop itself.
pub trait PositionSensor {
    /// Error type for sensor reads.
    type Error: core::fmt::Debug;

    /// Current shaft angle in degrees.
    fn read(&mut self) -> Result<f32, Self::Error>;
}

/// Stepper actuator driving the shaft.
///
/// # Implementation Notes
///
/// - `step` advances exactly one (half-)step and leaves the coils energized
///   so the shaft holds position
/// - `power_off` de-energizes every coil; the next `step` re-energizes them
pub trait Actuator {
    /// Error type for actuator operations.
    type Error: core::fmt::Debug;

    /// Advance one step in `direction`.
    fn step(&mut self, direction: StepDirection) -> Result<(), Self::Error>;

    /// De-energize the coils.
    fn power_off(&mut self) -> Result<(), Self::Error>;
}

/// Push-button sample returned by [`RotaryInput::button`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonState {
    /// Button is currently held down.
    pub pressed: bool,
    /// The board latched an edge since the previous read.
    pub edge: bool,
}

/// Rotary encoder with push button.
///
/// Reads go over a shared bus and may fail; callers skip the affected
/// adjustment rather than retry.
pub trait RotaryInput {
    /// Error type for bus reads.
    type Error: core::fmt::Debug;

    /// Clicks since the previous call (sign gives the direction).
    ///
    /// Reading resets the device counter.
    fn delta(&mut self) -> Result<i32, Self::Error>;

    /// Current button state.
    fn button(&mut self) -> Result<ButtonState, Self::Error>;
}

/// Single RGB LED, typically the one built into the knob.
pub trait ColorOutput {
    /// Error type for LED writes.
    type Error: core::fmt::Debug;

    /// Show `color`.
    fn set_color(&mut self, color: Color) -> Result<(), Self::Error>;
}

/// Edge-detecting input line, polled rather than pushed.
pub trait InterruptPin {
    /// Returns true if an edge was latched since the previous call.
    ///
    /// Reading clears the latch.
    fn edge_detected(&mut self) -> bool;
}

/// Placeholder for controllers built without an interrupt line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoInterruptPin;

impl InterruptPin for NoInterruptPin {
    fn edge_detected(&mut self) -> bool {
        false
    }
}

/// Three-axis magnetometer producing a raw field vector.
pub trait MagneticField {
    /// Error type for field reads.
    type Error: core::fmt::Debug;

    /// Field components `(x, y, z)` in sensor units.
    fn read_field(&mut self) -> Result<(f32, f32, f32), Self::Error>;
}

// ============================================================================
// Shared device impls
// ============================================================================

impl<T: RotaryInput> RotaryInput for Arc<Mutex<T>> {
    type Error = T::Error;

    fn delta(&mut self) -> Result<i32, Self::Error> {
        self.lock().unwrap_or_else(PoisonError::into_inner).delta()
    }

    fn button(&mut self) -> Result<ButtonState, Self::Error> {
        self.lock().unwrap_or_else(PoisonError::into_inner).button()
    }
}

impl<T: ColorOutput> ColorOutput for Arc<Mutex<T>> {
    type Error = T::Error;

    fn set_color(&mut self, color: Color) -> Result<(), Self::Error> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_color(color)
    }
}

impl<T: PositionSensor> PositionSensor for Arc<Mutex<T>> {
    type Error = T::Error;

    fn read(&mut self) -> Result<f32, Self::Error> {
        self.lock().unwrap_or_else(PoisonError::into_inner).read()
    }
}
