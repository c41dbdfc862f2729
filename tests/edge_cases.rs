//! Edge case and boundary condition tests for the pure helpers

use std::time::Duration;

use rs_blinds::{
    angle_color,
    motion::{target_steps, SLOWDOWN_DEGREES},
    sequencer::MAX_SEQUENCE_STEPS,
    Color, ConfigError, ControllerConfig, InteractionConfig, LedSequence, LedStep, SequenceFull,
    ServiceConfig,
};

// ============================================================================
// Step Conversion Boundaries
// ============================================================================

#[test]
fn slowdown_boundary_is_exclusive() {
    let edge = SLOWDOWN_DEGREES as i32;
    assert_eq!(target_steps(0, edge, 0, 100), i64::from(edge) * 100);
    assert_eq!(target_steps(0, edge - 1, 0, 100), i64::from(edge - 1) * 50);
}

#[test]
fn extreme_angles_do_not_overflow() {
    let steps = target_steps(i64::from(i32::MAX), 140, -140, 180);
    assert_eq!(steps, i64::from(i32::MAX) + 280 * 180);

    let steps = target_steps(0, i32::MIN, i32::MAX, 180);
    assert!(steps < 0);
}

#[test]
fn odd_steps_per_degree_rounds_down() {
    // 7 / 2 = 3 steps per degree when close
    assert_eq!(target_steps(0, 5, 0, 7), 15);
}

// ============================================================================
// Color Boundaries
// ============================================================================

#[test]
fn color_outside_range_saturates() {
    let config = InteractionConfig::default();
    assert_eq!(angle_color(config.min_angle - 100, &config), Color::BLUE);
    assert_eq!(angle_color(config.max_angle + 100, &config), Color::GREEN);
}

#[test]
fn blend_endpoints_are_exact() {
    assert_eq!(Color::blend(Color::WHITE, Color::OFF, 0.0), Color::WHITE);
    assert_eq!(Color::blend(Color::WHITE, Color::OFF, 1.0), Color::OFF);

    // Channels truncate, so the midpoint sits just below half.
    let mid = Color::blend(Color::RED, Color::BLUE, 0.5);
    assert_eq!(mid, Color::rgb(127, 0, 127));
}

#[test]
fn blend_with_nan_ratio_shows_low_color() {
    assert_eq!(Color::blend(Color::RED, Color::BLUE, f32::NAN), Color::RED);
}

// ============================================================================
// Sequence Boundaries
// ============================================================================

#[test]
fn empty_sequence() {
    let sequence = LedSequence::new();
    assert!(sequence.is_empty());
    assert_eq!(sequence.total_duration(), Duration::ZERO);
}

#[test]
fn builder_stops_at_capacity() {
    let mut sequence = LedSequence::new();
    for i in 0..MAX_SEQUENCE_STEPS {
        sequence = sequence
            .then(Color::rgb(i as u8, 0, 0), Duration::from_millis(10))
            .unwrap();
    }
    assert_eq!(
        sequence.clone().then(Color::RED, Duration::from_millis(10)),
        Err(SequenceFull)
    );
    assert_eq!(sequence.steps()[3], LedStep::new(Color::rgb(3, 0, 0), Duration::from_millis(10)));
}

// ============================================================================
// Config Boundaries
// ============================================================================

#[test]
fn single_degree_range_is_valid() {
    let config = ServiceConfig::default().with_angle_range(0, 1);
    assert!(config.validate().is_ok());
}

#[test]
fn zero_interrupt_poll_rejected() {
    let config = ControllerConfig::default().with_interrupt_poll_ms(0);
    assert_eq!(
        config.validate(),
        Err(ConfigError::ZeroDuration("interrupt_poll_ms"))
    );
}

#[test]
fn zero_debounce_rejected() {
    let config = ServiceConfig::default()
        .with_interaction(InteractionConfig::default().with_debounce_ms(0));
    assert_eq!(config.validate(), Err(ConfigError::ZeroDuration("debounce_ms")));
}
