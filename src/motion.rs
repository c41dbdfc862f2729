//! Step-space bookkeeping for the shaft feedback loop.
//!
//! The controller works in two coordinate systems: degrees (what the sensor
//! reports and the user asks for) and steps (what the actuator executes).
//! Each accepted [`ShaftSample`] pairs the two. Targets are turned into step
//! positions relative to the most recent sample, so drift between dead
//! reckoning and the real shaft is corrected every time a fresh reading
//! arrives.
//!
//! # Deceleration
//!
//! Far from the target, one degree of error is converted into
//! `steps_per_degree` steps. Within [`SLOWDOWN_DEGREES`] the factor is halved,
//! so the shaft deliberately undershoots and closes the remaining gap on
//! the next reading instead of overshooting.
//!
//! ```rust
//! use rs_blinds::motion::target_steps;
//!
//! // 40 degrees away: full speed
//! assert_eq!(target_steps(1000, 40, 0, 10), 1000 + 400);
//! // 4 degrees away: half speed
//! assert_eq!(target_steps(1000, 4, 0, 10), 1000 + 20);
//! // Moving the other way
//! assert_eq!(target_steps(1000, -4, 0, 10), 1000 - 20);
//! ```

use core::time::Duration;

use tokio::time::Instant;

use crate::traits::StepDirection;

/// Atomic-slot sentinel for "angle unknown / never read".
pub const NO_ANGLE: i32 = -999_999;

/// Initial step counter: half of the 32-bit range, so absolute positions
/// never go negative and only deltas matter.
pub const INITIAL_STEP_POSITION: i64 = i32::MAX as i64;

/// Below this many degrees from target the step conversion is halved.
pub const SLOWDOWN_DEGREES: i64 = 10;

/// A step burst never catches up on more lateness than this.
pub(crate) const MAX_STEP_LAG: Duration = Duration::from_millis(20);

/// Encode an optional angle for an atomic slot.
#[inline]
pub const fn angle_to_slot(angle: Option<i32>) -> i32 {
    match angle {
        Some(angle) => angle,
        None => NO_ANGLE,
    }
}

/// Decode an atomic slot value.
#[inline]
pub const fn slot_to_angle(slot: i32) -> Option<i32> {
    if slot == NO_ANGLE {
        None
    } else {
        Some(slot)
    }
}

/// Step position that should put the shaft at `target`.
///
/// `step_position` and `angle` come from the same sensor sample. The result
/// is deterministic. Only `|angle - target| < SLOWDOWN_DEGREES` selects half
/// speed, never rounded to less than one step per degree.
pub fn target_steps(step_position: i64, angle: i32, target: i32, steps_per_degree: i64) -> i64 {
    let delta = i64::from(angle) - i64::from(target);
    let speed = if delta.abs() < SLOWDOWN_DEGREES {
        (steps_per_degree / 2).max(1)
    } else {
        steps_per_degree
    };
    step_position + delta * speed
}

/// A sensor reading paired with the step counter at the moment of the read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaftSample {
    /// When the read started (`None` for failed reads and the initial state).
    pub taken_at: Option<Instant>,
    /// Step counter captured just before the read.
    pub step_position: i64,
    /// Shaft angle in degrees (`None` if the read failed).
    pub angle: Option<i32>,
}

impl ShaftSample {
    /// A successful reading.
    pub fn new(taken_at: Instant, step_position: i64, angle: i32) -> Self {
        Self {
            taken_at: Some(taken_at),
            step_position,
            angle: Some(angle),
        }
    }

    /// A failed reading. Never accepted as a position update.
    pub const fn failed() -> Self {
        Self {
            taken_at: None,
            step_position: 0,
            angle: None,
        }
    }

    /// Time since the reading, `Duration::MAX` if there never was one.
    pub fn age(&self, now: Instant) -> Duration {
        match self.taken_at {
            Some(at) => now.saturating_duration_since(at),
            None => Duration::MAX,
        }
    }
}

/// What the loop should do with the actuator this iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    /// Safety stop: leave the actuator alone.
    Hold,
    /// Take one step.
    Step(StepDirection),
    /// At the target step position. `first` is set on the iteration that
    /// arrived.
    Arrived { first: bool },
}

/// Mutable state of the feedback loop, owned by the loop task.
#[derive(Debug)]
pub(crate) struct FeedbackState {
    pub position: i64,
    pub target_position: i64,
    pub target_angle: Option<i32>,
    pub sample: ShaftSample,
    pub reached: bool,
    pub safety_stop: bool,
    pub read_in_flight: bool,
    pub last_attempt: Option<Instant>,
}

impl FeedbackState {
    pub fn new() -> Self {
        Self {
            position: INITIAL_STEP_POSITION,
            target_position: INITIAL_STEP_POSITION,
            target_angle: None,
            sample: ShaftSample::failed(),
            reached: false,
            safety_stop: false,
            read_in_flight: false,
            last_attempt: None,
        }
    }

    /// A new target angle arrived.
    pub fn apply_target(&mut self, angle: i32, steps_per_degree: i64) {
        self.target_angle = Some(angle);
        self.reached = false;
        if let Some(current) = self.sample.angle {
            self.target_position =
                target_steps(self.sample.step_position, current, angle, steps_per_degree);
        }
    }

    /// A read finished. Returns true if the sample was accepted.
    ///
    /// Re-anchors the target while still approaching, or after arrival if
    /// the shaft has drifted beyond half the accuracy.
    pub fn accept_sample(
        &mut self,
        sample: ShaftSample,
        accuracy: i32,
        steps_per_degree: i64,
    ) -> bool {
        self.read_in_flight = false;
        let Some(angle) = sample.angle else {
            return false;
        };

        if let Some(target) = self.target_angle {
            let diff = (i64::from(angle) - i64::from(target)).abs();
            let drifted = if self.reached {
                diff * 2 > i64::from(accuracy)
            } else {
                diff > 0
            };
            if drifted {
                self.target_position =
                    target_steps(sample.step_position, angle, target, steps_per_degree);
                self.reached = false;
            }
        }

        self.sample = sample;
        self.safety_stop = false;
        true
    }

    /// When the next read is due, `None` while one is in flight or if
    /// none was ever attempted.
    ///
    /// Failed reads are retried once per `interval`, not back to back.
    pub fn next_read_at(&self, interval: Duration) -> Option<Instant> {
        if self.read_in_flight {
            return None;
        }
        let sample_due = self.sample.taken_at.map(|at| at + interval);
        let attempt_due = self.last_attempt.map(|at| at + interval);
        sample_due.max(attempt_due)
    }

    /// True if a new read should be dispatched.
    pub fn wants_read(&self, now: Instant, interval: Duration) -> bool {
        !self.read_in_flight && self.next_read_at(interval).map_or(true, |at| now >= at)
    }

    /// A read was dispatched at `now`.
    pub fn start_read(&mut self, now: Instant) {
        self.read_in_flight = true;
        self.last_attempt = Some(now);
    }

    /// Update the safety-stop flag. Returns true when the stop begins.
    pub fn check_staleness(&mut self, now: Instant, stop_after: Duration) -> bool {
        if self.sample.age(now) > stop_after && !self.safety_stop {
            self.safety_stop = true;
            return true;
        }
        false
    }

    /// Decide this iteration's actuator action.
    pub fn next_action(&mut self) -> Action {
        if self.safety_stop {
            return Action::Hold;
        }
        match StepDirection::toward(self.position, self.target_position) {
            Some(direction) => Action::Step(direction),
            None => {
                let first = !self.reached;
                self.reached = true;
                Action::Arrived { first }
            }
        }
    }

    /// Record a completed step.
    pub fn advance(&mut self, direction: StepDirection) {
        self.position += direction.delta();
    }

    /// Steps left to the target position.
    pub fn remaining(&self) -> u64 {
        self.target_position.abs_diff(self.position)
    }
}

/// Paces steps against the clock.
///
/// Timers wake on millisecond ticks, so a shorter step delay is kept on
/// average: each wake takes every step that has come due since the last
/// one.
#[derive(Debug, Default)]
pub(crate) struct StepPacer {
    next_due: Option<Instant>,
}

impl StepPacer {
    /// Number of steps due at `now`, at most `limit`.
    pub fn due(&mut self, now: Instant, delay: Duration, limit: u64) -> u64 {
        let start = match self.next_due {
            Some(at) if now < at => return 0,
            Some(at) if now - at <= MAX_STEP_LAG => at,
            _ => now,
        };
        let late = (now - start).as_nanos() / delay.as_nanos().max(1);
        let count = u64::try_from(late)
            .unwrap_or(u64::MAX)
            .saturating_add(1)
            .min(limit);
        let scheduled = u32::try_from(count).unwrap_or(u32::MAX);
        self.next_due = Some(start + delay.saturating_mul(scheduled));
        count
    }

    /// When the next step is due, if stepping.
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Stop pacing; the next burst starts from scratch.
    pub fn reset(&mut self) {
        self.next_due = None;
    }
}
