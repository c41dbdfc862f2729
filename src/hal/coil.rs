//! Half-step driver for a four-coil unipolar stepper (28BYJ-48 style).
//!
//! The coils are switched through four GPIO outputs, typically via a
//! ULN2003 darlington array. Each step walks one entry through an 8-phase
//! half-step table; walking backward through the table reverses the shaft.
//!
//! Phase table (bit 0 = first pin):
//!
//! | Phase | Pattern |
//! |-------|---------|
//! | 0 | `0001` |
//! | 1 | `0011` |
//! | 2 | `0010` |
//! | 3 | `0110` |
//! | 4 | `0100` |
//! | 5 | `1100` |
//! | 6 | `1000` |
//! | 7 | `1001` |

use embedded_hal::digital::{OutputPin, PinState};

use crate::error::Error;
use crate::traits::{Actuator, StepDirection};

/// Number of coil pins the driver switches.
pub const COIL_PINS: usize = 4;

const HALF_STEP_SEQUENCE: [u8; 8] = [
    0b0001, 0b0011, 0b0010, 0b0110, 0b0100, 0b1100, 0b1000, 0b1001,
];

/// Four-coil stepper driven through GPIO outputs.
///
/// # Example
///
/// ```rust
/// use rs_blinds::hal::{CoilStepper, MockOutputPin};
/// use rs_blinds::traits::{Actuator, StepDirection};
///
/// let pins: Vec<MockOutputPin> = (0..4).map(|_| MockOutputPin::new()).collect();
/// let observed = pins.clone();
/// let mut stepper = CoilStepper::new(pins).unwrap();
///
/// stepper.step(StepDirection::Forward).unwrap();
/// // Phase 1: 0011
/// assert!(observed[0].is_high() && observed[1].is_high());
/// assert!(!observed[2].is_high() && !observed[3].is_high());
///
/// stepper.power_off().unwrap();
/// assert!(observed.iter().all(|p| !p.is_high()));
/// ```
#[derive(Debug)]
pub struct CoilStepper<P> {
    pins: [P; COIL_PINS],
    phase: usize,
}

impl<P: OutputPin> CoilStepper<P> {
    /// Take ownership of exactly [`COIL_PINS`] outputs and drive them low.
    ///
    /// # Errors
    ///
    /// [`Error::PinCount`] if the wrong number of pins is supplied,
    /// [`Error::Driver`] if a pin cannot be driven low.
    pub fn new(pins: Vec<P>) -> Result<Self, Error> {
        let found = pins.len();
        let pins: [P; COIL_PINS] = pins.try_into().map_err(|_| Error::PinCount {
            found,
            expected: COIL_PINS,
        })?;
        let mut stepper = Self { pins, phase: 0 };
        stepper
            .power_off()
            .map_err(|e| Error::Driver(format!("{e:?}")))?;
        Ok(stepper)
    }

    /// Current index into the half-step table.
    pub fn phase(&self) -> usize {
        self.phase
    }

    fn apply(&mut self, pattern: u8) -> Result<(), P::Error> {
        for (bit, pin) in self.pins.iter_mut().enumerate() {
            pin.set_state(PinState::from(pattern & (1 << bit) != 0))?;
        }
        Ok(())
    }
}

impl<P: OutputPin> Actuator for CoilStepper<P> {
    type Error = P::Error;

    fn step(&mut self, direction: StepDirection) -> Result<(), Self::Error> {
        let len = HALF_STEP_SEQUENCE.len() as i64;
        self.phase = (self.phase as i64 + direction.delta()).rem_euclid(len) as usize;
        self.apply(HALF_STEP_SEQUENCE[self.phase])
    }

    fn power_off(&mut self) -> Result<(), Self::Error> {
        self.apply(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockOutputPin;

    fn pattern(observed: &[MockOutputPin]) -> u8 {
        observed
            .iter()
            .enumerate()
            .fold(0, |acc, (bit, p)| acc | (u8::from(p.is_high()) << bit))
    }

    fn driver() -> (CoilStepper<MockOutputPin>, Vec<MockOutputPin>) {
        let pins: Vec<MockOutputPin> = (0..COIL_PINS).map(|_| MockOutputPin::new()).collect();
        let observed = pins.clone();
        (CoilStepper::new(pins).unwrap(), observed)
    }

    #[test]
    fn wrong_pin_count() {
        let pins: Vec<MockOutputPin> = (0..3).map(|_| MockOutputPin::new()).collect();
        let err = CoilStepper::new(pins).unwrap_err();
        assert!(matches!(err, Error::PinCount { found: 3, expected: 4 }));
    }

    #[test]
    fn starts_powered_off() {
        let pins: Vec<MockOutputPin> = (0..COIL_PINS).map(|_| MockOutputPin::new()).collect();
        let observed = pins.clone();
        let mut first = observed[0].clone();
        embedded_hal::digital::OutputPin::set_high(&mut first).unwrap();

        let stepper = CoilStepper::new(pins).unwrap();
        assert_eq!(stepper.phase(), 0);
        assert_eq!(pattern(&observed), 0);
    }

    #[test]
    fn forward_walks_the_table() {
        let (mut stepper, observed) = driver();
        for expected in HALF_STEP_SEQUENCE.iter().cycle().skip(1).take(9) {
            stepper.step(StepDirection::Forward).unwrap();
            assert_eq!(pattern(&observed), *expected);
        }
    }

    #[test]
    fn backward_wraps_below_zero() {
        let (mut stepper, observed) = driver();
        stepper.step(StepDirection::Backward).unwrap();
        assert_eq!(stepper.phase(), 7);
        assert_eq!(pattern(&observed), 0b1001);

        stepper.step(StepDirection::Forward).unwrap();
        assert_eq!(stepper.phase(), 0);
        assert_eq!(pattern(&observed), 0b0001);
    }

    #[test]
    fn power_off_keeps_phase() {
        let (mut stepper, observed) = driver();
        stepper.step(StepDirection::Forward).unwrap();
        stepper.step(StepDirection::Forward).unwrap();
        stepper.power_off().unwrap();
        assert_eq!(pattern(&observed), 0);

        stepper.step(StepDirection::Forward).unwrap();
        assert_eq!(stepper.phase(), 3);
        assert_eq!(pattern(&observed), 0b0110);
    }
}
