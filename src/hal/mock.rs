//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for every hardware trait, so the
//! control tasks can run on a desktop.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`SimulatedShaft`] | n/a | Shared shaft model behind the stepper and sensor mocks |
//! | [`MockStepper`] | [`Actuator`] | Moves the simulated shaft, records directions |
//! | [`MockPositionSensor`] | [`PositionSensor`] | Reads the simulated shaft, can be made to fail |
//! | [`MockRotary`] | [`RotaryInput`], [`ColorOutput`] | Queued clicks, button, LED history |
//! | [`MockInterruptPin`] | [`InterruptPin`] | Edges fired from the test |
//! | [`MockOutputPin`] | `embedded_hal::digital::OutputPin` | Observable GPIO level |
//! | [`MockField`] | [`MagneticField`] | Fixed field vector |
//!
//! Mocks that are moved into a task ([`MockStepper`], [`MockPositionSensor`],
//! [`MockInterruptPin`], [`MockOutputPin`]) are cheap handles onto shared
//! state, so the test keeps a clone to inspect and steer them.
//!
//! # Example
//!
//! ```rust
//! use rs_blinds::hal::SimulatedShaft;
//! use rs_blinds::traits::{Actuator, PositionSensor, StepDirection};
//!
//! // Shaft at 10 degrees, 4 steps per degree
//! let shaft = SimulatedShaft::new(10.0, 4);
//! let mut stepper = shaft.stepper();
//! let mut sensor = shaft.sensor();
//!
//! // Forward steps lower the angle
//! for _ in 0..8 {
//!     stepper.step(StepDirection::Forward).unwrap();
//! }
//! assert_eq!(sensor.read().unwrap(), 8.0);
//! assert_eq!(shaft.steps(), 8);
//! ```
//!
//! [`Actuator`]: crate::traits::Actuator
//! [`PositionSensor`]: crate::traits::PositionSensor
//! [`RotaryInput`]: crate::traits::RotaryInput
//! [`ColorOutput`]: crate::traits::ColorOutput
//! [`InterruptPin`]: crate::traits::InterruptPin
//! [`MagneticField`]: crate::traits::MagneticField

use core::convert::Infallible;
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::color::Color;
use crate::traits::{
    Actuator, ButtonState, ColorOutput, InterruptPin, MagneticField, PositionSensor, RotaryInput,
    StepDirection,
};

// ============================================================================
// Simulated Shaft
// ============================================================================

#[derive(Debug)]
struct ShaftModel {
    initial_angle: f32,
    steps_per_degree: f32,
    steps: i64,
    frozen: bool,
    failing: bool,
    read_delay: Duration,
    reads: usize,
    power_offs: usize,
    energized: bool,
    history: Vec<StepDirection>,
}

/// A shaft driven by [`MockStepper`] and observed by [`MockPositionSensor`].
///
/// The angle is `initial - steps / steps_per_degree`, so a
/// [`Forward`](StepDirection::Forward) step lowers it.
#[derive(Clone, Debug)]
pub struct SimulatedShaft {
    model: Arc<Mutex<ShaftModel>>,
}

impl SimulatedShaft {
    /// A shaft at `initial_angle` degrees.
    pub fn new(initial_angle: f32, steps_per_degree: i64) -> Self {
        Self {
            model: Arc::new(Mutex::new(ShaftModel {
                initial_angle,
                steps_per_degree: steps_per_degree as f32,
                steps: 0,
                frozen: false,
                failing: false,
                read_delay: Duration::ZERO,
                reads: 0,
                power_offs: 0,
                energized: false,
                history: Vec::new(),
            })),
        }
    }

    /// A shaft whose sensor always reports `angle`, no matter how it is
    /// stepped.
    pub fn fixed(angle: f32) -> Self {
        let shaft = Self::new(angle, 1);
        shaft.model().frozen = true;
        shaft
    }

    fn model(&self) -> MutexGuard<'_, ShaftModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Actuator handle.
    pub fn stepper(&self) -> MockStepper {
        MockStepper {
            model: Arc::clone(&self.model),
        }
    }

    /// Sensor handle.
    pub fn sensor(&self) -> MockPositionSensor {
        MockPositionSensor {
            model: Arc::clone(&self.model),
        }
    }

    /// True angle of the shaft.
    pub fn angle(&self) -> f32 {
        self.model().angle()
    }

    /// Net steps taken.
    pub fn steps(&self) -> i64 {
        self.model().steps
    }

    /// Make sensor reads fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.model().failing = failing;
    }

    /// Make every sensor read block for `delay`.
    pub fn set_read_delay(&self, delay: Duration) {
        self.model().read_delay = delay;
    }

    /// Sensor reads attempted so far.
    pub fn reads(&self) -> usize {
        self.model().reads
    }

    /// Number of `power_off` calls.
    pub fn power_offs(&self) -> usize {
        self.model().power_offs
    }

    /// True between a step and the next `power_off`.
    pub fn is_energized(&self) -> bool {
        self.model().energized
    }

    /// Every step taken, in order.
    pub fn history(&self) -> Vec<StepDirection> {
        self.model().history.clone()
    }

    /// Forget the recorded history.
    pub fn clear_history(&self) {
        self.model().history.clear();
    }
}

impl ShaftModel {
    fn angle(&self) -> f32 {
        if self.frozen {
            return self.initial_angle;
        }
        self.initial_angle - self.steps as f32 / self.steps_per_degree
    }
}

/// Stepper handle onto a [`SimulatedShaft`].
#[derive(Clone, Debug)]
pub struct MockStepper {
    model: Arc<Mutex<ShaftModel>>,
}

impl Actuator for MockStepper {
    type Error = Infallible;

    fn step(&mut self, direction: StepDirection) -> Result<(), Infallible> {
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        model.steps += direction.delta();
        model.energized = true;
        model.history.push(direction);
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), Infallible> {
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        model.energized = false;
        model.power_offs += 1;
        Ok(())
    }
}

/// Sensor handle onto a [`SimulatedShaft`].
#[derive(Clone, Debug)]
pub struct MockPositionSensor {
    model: Arc<Mutex<ShaftModel>>,
}

impl PositionSensor for MockPositionSensor {
    type Error = ();

    fn read(&mut self) -> Result<f32, ()> {
        let delay = {
            let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
            model.reads += 1;
            model.read_delay
        };
        // The bus transaction happens without holding the model.
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        if model.failing {
            return Err(());
        }
        Ok(model.angle())
    }
}

// ============================================================================
// Knob Mocks
// ============================================================================

/// Mock rotary knob with LED.
///
/// Clicks are queued and handed out one entry per [`delta`] call, oldest
/// first. Every LED write is recorded.
///
/// # Example
///
/// ```rust
/// use rs_blinds::hal::MockRotary;
/// use rs_blinds::traits::{ColorOutput, RotaryInput};
/// use rs_blinds::Color;
///
/// let mut knob = MockRotary::new();
/// knob.queue_delta(3);
/// knob.queue_delta(-1);
///
/// assert_eq!(knob.delta().unwrap(), 3);
/// assert_eq!(knob.delta().unwrap(), -1);
/// assert_eq!(knob.delta().unwrap(), 0); // Empty
///
/// knob.press_button();
/// let button = knob.button().unwrap();
/// assert!(button.pressed && button.edge);
/// assert!(!knob.button().unwrap().edge); // Edge consumed
///
/// knob.set_color(Color::CYAN).unwrap();
/// assert_eq!(knob.last_color(), Some(Color::CYAN));
/// ```
///
/// [`delta`]: RotaryInput::delta
#[derive(Debug, Default)]
pub struct MockRotary {
    deltas: VecDeque<i32>,
    pressed: bool,
    edge: bool,
    colors: Vec<Color>,
    /// Fail every `delta` and `button` read.
    pub fail_reads: bool,
    /// Fail every LED write.
    pub fail_writes: bool,
    /// Number of `delta` calls.
    pub delta_reads: usize,
}

impl MockRotary {
    /// A knob with no pending clicks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue clicks for a later `delta` call.
    pub fn queue_delta(&mut self, clicks: i32) {
        self.deltas.push_back(clicks);
    }

    /// Press the button (latches an edge).
    pub fn press_button(&mut self) {
        self.pressed = true;
        self.edge = true;
    }

    /// Release the button (latches an edge).
    pub fn release_button(&mut self) {
        self.pressed = false;
        self.edge = true;
    }

    /// Most recent LED color.
    pub fn last_color(&self) -> Option<Color> {
        self.colors.last().copied()
    }

    /// Every LED write, in order.
    pub fn colors(&self) -> Vec<Color> {
        self.colors.clone()
    }
}

impl RotaryInput for MockRotary {
    type Error = ();

    fn delta(&mut self) -> Result<i32, ()> {
        self.delta_reads += 1;
        if self.fail_reads {
            return Err(());
        }
        Ok(self.deltas.pop_front().unwrap_or(0))
    }

    fn button(&mut self) -> Result<ButtonState, ()> {
        if self.fail_reads {
            return Err(());
        }
        let edge = core::mem::take(&mut self.edge);
        Ok(ButtonState {
            pressed: self.pressed,
            edge,
        })
    }
}

impl ColorOutput for MockRotary {
    type Error = ();

    fn set_color(&mut self, color: Color) -> Result<(), ()> {
        if self.fail_writes {
            return Err(());
        }
        self.colors.push(color);
        Ok(())
    }
}

/// Mock interrupt line. Clones share the latch.
///
/// ```rust
/// use rs_blinds::hal::MockInterruptPin;
/// use rs_blinds::traits::InterruptPin;
///
/// let line = MockInterruptPin::new();
/// let mut pin = line.clone();
///
/// assert!(!pin.edge_detected());
/// line.fire();
/// line.fire();
/// assert!(pin.edge_detected());
/// assert!(!pin.edge_detected()); // Latch cleared
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockInterruptPin {
    latched: Arc<AtomicBool>,
    polls: Arc<AtomicUsize>,
}

impl MockInterruptPin {
    /// A quiet line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch an edge.
    pub fn fire(&self) {
        self.latched.store(true, Ordering::Release);
    }

    /// How many times the line was polled.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::Acquire)
    }
}

impl InterruptPin for MockInterruptPin {
    fn edge_detected(&mut self) -> bool {
        self.polls.fetch_add(1, Ordering::AcqRel);
        self.latched.swap(false, Ordering::AcqRel)
    }
}

// ============================================================================
// Driver Mocks
// ============================================================================

/// GPIO output whose level is visible through clones.
#[derive(Clone, Debug, Default)]
pub struct MockOutputPin {
    high: Arc<AtomicBool>,
}

impl MockOutputPin {
    /// A pin driven low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level.
    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::Acquire)
    }
}

impl embedded_hal::digital::ErrorType for MockOutputPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for MockOutputPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high.store(true, Ordering::Release);
        Ok(())
    }
}

/// Magnetometer reporting a fixed field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MockField {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
    /// Fail every read.
    pub failing: bool,
}

impl MockField {
    /// A field pointing at `degrees` in the XY plane.
    pub fn pointing(degrees: f32) -> Self {
        let radians = degrees.to_radians();
        Self {
            x: radians.cos(),
            y: radians.sin(),
            z: 0.0,
            failing: false,
        }
    }
}

impl MagneticField for MockField {
    type Error = ();

    fn read_field(&mut self) -> Result<(f32, f32, f32), ()> {
        if self.failing {
            return Err(());
        }
        Ok((self.x, self.y, self.z))
    }
}
