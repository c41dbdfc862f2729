//! Shaft angle from a magnet on the shaft and a fixed magnetometer.
//!
//! The sensor measures the field direction in its XY plane. The shaft angle
//! is that direction minus the direction measured at the calibration
//! position, wrapped into `[-180, 180]` degrees.

use crate::traits::{MagneticField, PositionSensor};

/// [`PositionSensor`] over any [`MagneticField`].
///
/// ```rust
/// use rs_blinds::hal::{MagneticPositionSensor, MockField};
/// use rs_blinds::traits::PositionSensor;
///
/// // Calibrated with the field pointing at 30 degrees
/// let mut sensor = MagneticPositionSensor::new(MockField::pointing(75.0), 30.0);
/// assert!((sensor.read().unwrap() - 45.0).abs() < 0.01);
/// ```
#[derive(Debug)]
pub struct MagneticPositionSensor<M> {
    field: M,
    base_angle: f32,
}

impl<M: MagneticField> MagneticPositionSensor<M> {
    /// Wrap `field`, treating `base_angle` degrees as shaft angle 0.
    pub fn new(field: M, base_angle: f32) -> Self {
        Self { field, base_angle }
    }

    /// The calibration angle.
    pub fn base_angle(&self) -> f32 {
        self.base_angle
    }

    /// Release the magnetometer.
    pub fn into_inner(self) -> M {
        self.field
    }
}

fn wrap_degrees(mut degrees: f32) -> f32 {
    if degrees > 180.0 {
        degrees -= 360.0;
    } else if degrees < -180.0 {
        degrees += 360.0;
    }
    degrees
}

impl<M: MagneticField> PositionSensor for MagneticPositionSensor<M> {
    type Error = M::Error;

    fn read(&mut self) -> Result<f32, Self::Error> {
        let (x, y, _) = self.field.read_field()?;
        Ok(wrap_degrees(y.atan2(x).to_degrees() - self.base_angle))
    }
}
