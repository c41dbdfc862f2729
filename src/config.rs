//! Configuration for the controller, the interaction machine and the sequencer.
//!
//! Every component takes an immutable config struct at construction. Each
//! struct has documented defaults and `with_*` builder methods. Durations are
//! stored as integer `_ms`/`_us` fields and exposed through [`Duration`]
//! accessors.
//!
//! # Example
//!
//! ```rust
//! use rs_blinds::config::{ControllerConfig, ServiceConfig};
//!
//! // Use defaults
//! let config = ServiceConfig::default();
//! assert!(config.validate().is_ok());
//!
//! // Or customize
//! let config = ServiceConfig::default()
//!     .with_angle_range(-90, 90)
//!     .with_controller(ControllerConfig::default().with_steps_per_degree(64));
//! assert_eq!(config.interaction.max_angle, 90);
//! assert_eq!(config.controller.steps_per_degree, 64);
//! ```

use core::time::Duration;

use thiserror::Error;

use crate::color::Color;

/// Configuration values that would make a component misbehave.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `min_angle` is not below `max_angle`.
    #[error("Invalid angle range: min {min} must be below max {max}")]
    InvalidAngleRange {
        /// Configured lower bound.
        min: i32,
        /// Configured upper bound.
        max: i32,
    },

    /// `steps_per_degree` must be positive.
    #[error("Steps per degree must be positive, got {0}")]
    InvalidStepsPerDegree(i64),

    /// `position_accuracy` must be positive.
    #[error("Position accuracy must be positive, got {0}")]
    InvalidAccuracy(i32),

    /// A duration that drives a timer is zero.
    #[error("Duration `{0}` must be non-zero")]
    ZeroDuration(&'static str),

    /// An interrupt pin is configured but none was supplied to the controller.
    #[error("Interrupt pin {0} is configured but no pin driver was supplied")]
    MissingInterruptPin(u8),

    /// The sequencer channel needs room for at least one sequence.
    #[error("Sequencer buffer must hold at least one sequence")]
    ZeroBuffer,

    /// A config file could not be parsed.
    #[cfg(feature = "toml")]
    #[error("TOML parse error: {0}")]
    Toml(String),
}

fn check_range(min: i32, max: i32) -> Result<(), ConfigError> {
    if min >= max {
        return Err(ConfigError::InvalidAngleRange { min, max });
    }
    Ok(())
}

fn check_nonzero(value: u64, name: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroDuration(name));
    }
    Ok(())
}

// ============================================================================
// Service Config
// ============================================================================

/// Complete configuration for the three cooperating tasks.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServiceConfig {
    /// Motion controller configuration
    pub controller: ControllerConfig,
    /// Interaction state machine configuration
    pub interaction: InteractionConfig,
    /// LED sequencer configuration
    pub sequencer: SequencerConfig,
}

impl ServiceConfig {
    /// Set controller configuration
    pub fn with_controller(mut self, controller: ControllerConfig) -> Self {
        self.controller = controller;
        self
    }

    /// Set interaction configuration
    pub fn with_interaction(mut self, interaction: InteractionConfig) -> Self {
        self.interaction = interaction;
        self
    }

    /// Set sequencer configuration
    pub fn with_sequencer(mut self, sequencer: SequencerConfig) -> Self {
        self.sequencer = sequencer;
        self
    }

    /// Set the shaft angle range on both the controller and the knob.
    pub fn with_angle_range(mut self, min: i32, max: i32) -> Self {
        self.controller = self.controller.with_angle_range(min, max);
        self.interaction = self.interaction.with_angle_range(min, max);
        self
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        self.interaction.validate()?;
        self.sequencer.validate()
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// ```rust
    /// use rs_blinds::config::ServiceConfig;
    ///
    /// let config = ServiceConfig::from_toml_str(r#"
    ///     [controller]
    ///     steps_per_degree = 90
    ///     interrupt_pin = 4
    ///
    ///     [interaction]
    ///     commit_after_ms = 1500
    /// "#).unwrap();
    ///
    /// assert_eq!(config.controller.steps_per_degree, 90);
    /// assert_eq!(config.controller.interrupt_pin, Some(4));
    /// assert_eq!(config.interaction.commit_after_ms, 1500);
    /// assert_eq!(config.interaction.debounce_ms, 100);
    /// ```
    #[cfg(feature = "toml")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Controller Config
// ============================================================================

/// Motion controller tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControllerConfig {
    /// Delay between steps while moving, in microseconds
    pub delay_us: u64,
    /// Loop cadence when at target or in a safety stop, in milliseconds
    pub idle_delay_ms: u64,
    /// How often the position sensor is read, in milliseconds
    pub pos_update_interval_ms: u64,
    /// Stop moving if no valid reading arrived for this long, in milliseconds
    pub stop_motion_after_ms: u64,
    /// Stepper steps (after gearbox reduction) per shaft degree
    pub steps_per_degree: i64,
    /// Distance from target (degrees) that still counts as on target
    pub position_accuracy: i32,
    /// Lowest allowed shaft angle
    pub min_angle: i32,
    /// Highest allowed shaft angle
    pub max_angle: i32,
    /// GPIO line of the knob's interrupt output (`None` disables polling)
    pub interrupt_pin: Option<u8>,
    /// Interrupt pin polling cadence, in milliseconds
    pub interrupt_poll_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            delay_us: 75,
            idle_delay_ms: 1000,
            pos_update_interval_ms: 1000,
            stop_motion_after_ms: 5000,
            steps_per_degree: 180,
            position_accuracy: 5,
            min_angle: -140,
            max_angle: 140,
            interrupt_pin: None,
            interrupt_poll_ms: 20,
        }
    }
}

impl ControllerConfig {
    /// Set the inter-step delay
    pub fn with_delay_us(mut self, us: u64) -> Self {
        self.delay_us = us;
        self
    }

    /// Set the idle cadence
    pub fn with_idle_delay_ms(mut self, ms: u64) -> Self {
        self.idle_delay_ms = ms;
        self
    }

    /// Set the sensor refresh interval
    pub fn with_pos_update_interval_ms(mut self, ms: u64) -> Self {
        self.pos_update_interval_ms = ms;
        self
    }

    /// Set the staleness bound for the safety stop
    pub fn with_stop_motion_after_ms(mut self, ms: u64) -> Self {
        self.stop_motion_after_ms = ms;
        self
    }

    /// Set the step/degree ratio
    pub fn with_steps_per_degree(mut self, steps: i64) -> Self {
        self.steps_per_degree = steps;
        self
    }

    /// Set the on-target accuracy
    pub fn with_position_accuracy(mut self, degrees: i32) -> Self {
        self.position_accuracy = degrees;
        self
    }

    /// Set the allowed angle range
    pub fn with_angle_range(mut self, min: i32, max: i32) -> Self {
        self.min_angle = min;
        self.max_angle = max;
        self
    }

    /// Set the interrupt pin
    pub fn with_interrupt_pin(mut self, pin: Option<u8>) -> Self {
        self.interrupt_pin = pin;
        self
    }

    /// Set the interrupt polling cadence
    pub fn with_interrupt_poll_ms(mut self, ms: u64) -> Self {
        self.interrupt_poll_ms = ms;
        self
    }

    /// Inter-step delay.
    #[inline]
    pub fn delay(&self) -> Duration {
        Duration::from_micros(self.delay_us)
    }

    /// Idle cadence.
    #[inline]
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    /// Sensor refresh interval.
    #[inline]
    pub fn pos_update_interval(&self) -> Duration {
        Duration::from_millis(self.pos_update_interval_ms)
    }

    /// Staleness bound.
    #[inline]
    pub fn stop_motion_after(&self) -> Duration {
        Duration::from_millis(self.stop_motion_after_ms)
    }

    /// Interrupt polling cadence.
    #[inline]
    pub fn interrupt_poll(&self) -> Duration {
        Duration::from_millis(self.interrupt_poll_ms)
    }

    /// Clamp an angle into `[min_angle, max_angle]`.
    #[inline]
    pub fn clamp_angle(&self, angle: i32) -> i32 {
        angle.clamp(self.min_angle, self.max_angle)
    }

    /// Check every value the feedback loop depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(self.min_angle, self.max_angle)?;
        if self.steps_per_degree <= 0 {
            return Err(ConfigError::InvalidStepsPerDegree(self.steps_per_degree));
        }
        if self.position_accuracy <= 0 {
            return Err(ConfigError::InvalidAccuracy(self.position_accuracy));
        }
        check_nonzero(self.idle_delay_ms, "idle_delay_ms")?;
        check_nonzero(self.pos_update_interval_ms, "pos_update_interval_ms")?;
        check_nonzero(self.stop_motion_after_ms, "stop_motion_after_ms")?;
        check_nonzero(self.interrupt_poll_ms, "interrupt_poll_ms")
    }
}

// ============================================================================
// Interaction Config
// ============================================================================

/// Rotary knob interaction tunables.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InteractionConfig {
    /// Quiet time after an interrupt before the knob is read, in milliseconds
    pub debounce_ms: u64,
    /// Time without input before the draft angle is committed, in milliseconds
    pub commit_after_ms: u64,
    /// Degrees per encoder click (negative inverts the knob direction)
    pub click_angle: i32,
    /// Lowest draft angle
    pub min_angle: i32,
    /// Highest draft angle
    pub max_angle: i32,
    /// LED color at `min_angle`
    pub low_color: Color,
    /// LED color at `max_angle`
    pub high_color: Color,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            commit_after_ms: 3000,
            click_angle: -10,
            min_angle: -140,
            max_angle: 140,
            low_color: Color::BLUE,
            high_color: Color::GREEN,
        }
    }
}

impl InteractionConfig {
    /// Set the debounce time
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the commit timeout
    pub fn with_commit_after_ms(mut self, ms: u64) -> Self {
        self.commit_after_ms = ms;
        self
    }

    /// Set the degrees per click
    pub fn with_click_angle(mut self, degrees: i32) -> Self {
        self.click_angle = degrees;
        self
    }

    /// Set the allowed angle range
    pub fn with_angle_range(mut self, min: i32, max: i32) -> Self {
        self.min_angle = min;
        self.max_angle = max;
        self
    }

    /// Set the feedback color endpoints
    pub fn with_colors(mut self, low: Color, high: Color) -> Self {
        self.low_color = low;
        self.high_color = high;
        self
    }

    /// Debounce time.
    #[inline]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Commit timeout.
    #[inline]
    pub fn commit_after(&self) -> Duration {
        Duration::from_millis(self.commit_after_ms)
    }

    /// Check the values the state machine depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(self.min_angle, self.max_angle)?;
        check_nonzero(self.debounce_ms, "debounce_ms")?;
        check_nonzero(self.commit_after_ms, "commit_after_ms")
    }
}

// ============================================================================
// Sequencer Config
// ============================================================================

/// LED sequencer tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SequencerConfig {
    /// Sequences that may wait in the channel before `submit` suspends
    pub buffer: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self { buffer: 10 }
    }
}

impl SequencerConfig {
    /// Set the channel capacity
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Check the channel capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer == 0 {
            return Err(ConfigError::ZeroBuffer);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.controller.steps_per_degree, 180);
        assert_eq!(config.controller.delay(), Duration::from_micros(75));
        assert_eq!(config.controller.stop_motion_after(), Duration::from_secs(5));
        assert_eq!(config.controller.interrupt_pin, None);
        assert_eq!(config.interaction.debounce(), Duration::from_millis(100));
        assert_eq!(config.interaction.commit_after(), Duration::from_secs(3));
        assert_eq!(config.interaction.click_angle, -10);
        assert_eq!(config.sequencer.buffer, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn angle_range_applies_to_both_sections() {
        let config = ServiceConfig::default().with_angle_range(-45, 60);
        assert_eq!(config.controller.min_angle, -45);
        assert_eq!(config.controller.max_angle, 60);
        assert_eq!(config.interaction.min_angle, -45);
        assert_eq!(config.interaction.max_angle, 60);
    }

    #[test]
    fn clamp_angle() {
        let config = ControllerConfig::default();
        assert_eq!(config.clamp_angle(-500), -140);
        assert_eq!(config.clamp_angle(500), 140);
        assert_eq!(config.clamp_angle(12), 12);
    }

    #[test]
    fn inverted_range_rejected() {
        let config = ServiceConfig::default().with_angle_range(10, 10);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidAngleRange { min: 10, max: 10 })
        );
    }

    #[test]
    fn controller_values_rejected() {
        let config = ControllerConfig::default().with_steps_per_degree(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidStepsPerDegree(0)));

        let config = ControllerConfig::default().with_position_accuracy(-1);
        assert_eq!(config.validate(), Err(ConfigError::InvalidAccuracy(-1)));

        let config = ControllerConfig::default().with_idle_delay_ms(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("idle_delay_ms"))
        );
    }

    #[test]
    fn zero_step_delay_allowed() {
        // Stepping as fast as the timer allows is fine.
        let config = ControllerConfig::default().with_delay_us(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn interaction_values_rejected() {
        let config = InteractionConfig::default().with_commit_after_ms(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("commit_after_ms"))
        );
    }

    #[test]
    fn sequencer_buffer_rejected() {
        let config = SequencerConfig::default().with_buffer(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroBuffer));
    }

    #[test]
    fn builder_pattern() {
        let config = ServiceConfig::default()
            .with_controller(
                ControllerConfig::default()
                    .with_delay_us(500)
                    .with_idle_delay_ms(50)
                    .with_interrupt_pin(Some(4)),
            )
            .with_interaction(
                InteractionConfig::default()
                    .with_click_angle(5)
                    .with_colors(Color::RED, Color::WHITE),
            )
            .with_sequencer(SequencerConfig::default().with_buffer(3));

        assert_eq!(config.controller.delay(), Duration::from_micros(500));
        assert_eq!(config.controller.idle_delay(), Duration::from_millis(50));
        assert_eq!(config.controller.interrupt_pin, Some(4));
        assert_eq!(config.interaction.click_angle, 5);
        assert_eq!(config.interaction.low_color, Color::RED);
        assert_eq!(config.interaction.high_color, Color::WHITE);
        assert_eq!(config.sequencer.buffer, 3);
    }
}
