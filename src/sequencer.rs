//! Timed color sequences for the knob LED.
//!
//! The [`Sequencer`] task owns the LED. It plays one [`LedSequence`] at a
//! time: each step sets a color and holds it for the step's duration. A new
//! submission preempts whatever is playing, immediately. When a sequence
//! runs out the LED goes dark and stays dark until the next submission.
//!
//! ```rust
//! use std::time::Duration;
//! use rs_blinds::sequencer::LedSequence;
//! use rs_blinds::Color;
//!
//! // Two quick red flashes
//! let flash = LedSequence::new()
//!     .then(Color::RED, Duration::from_millis(150)).unwrap()
//!     .then(Color::OFF, Duration::from_millis(150)).unwrap()
//!     .then(Color::RED, Duration::from_millis(150)).unwrap();
//! assert_eq!(flash.len(), 3);
//! ```

use core::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::color::Color;
use crate::config::SequencerConfig;
use crate::error::Error;
use crate::shutdown::Shutdown;
use crate::traits::ColorOutput;

/// Maximum steps in one sequence.
pub const MAX_SEQUENCE_STEPS: usize = 16;

/// One color held for a while.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedStep {
    /// Color to show
    pub color: Color,
    /// How long to show it (`None` holds until the next submission)
    pub duration: Option<Duration>,
}

impl LedStep {
    /// A step that lasts `duration`.
    pub const fn new(color: Color, duration: Duration) -> Self {
        Self {
            color,
            duration: Some(duration),
        }
    }

    /// A step that never ends on its own.
    pub const fn hold(color: Color) -> Self {
        Self {
            color,
            duration: None,
        }
    }
}

/// A sequence was built past [`MAX_SEQUENCE_STEPS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("LED sequence is limited to {MAX_SEQUENCE_STEPS} steps")]
pub struct SequenceFull;

/// Ordered, bounded list of [`LedStep`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedSequence {
    steps: heapless::Vec<LedStep, MAX_SEQUENCE_STEPS>,
}

impl LedSequence {
    /// An empty sequence. Playing it turns the LED off.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single color for `duration`, then off.
    pub fn single(color: Color, duration: Duration) -> Self {
        let mut steps = heapless::Vec::new();
        // capacity is at least one
        let _ = steps.push(LedStep::new(color, duration));
        Self { steps }
    }

    /// Append a step (builder form).
    pub fn then(mut self, color: Color, duration: Duration) -> Result<Self, SequenceFull> {
        self.push(LedStep::new(color, duration))?;
        Ok(self)
    }

    /// Append a step.
    pub fn push(&mut self, step: LedStep) -> Result<(), SequenceFull> {
        self.steps.push(step).map_err(|_| SequenceFull)
    }

    /// The steps in play order.
    pub fn steps(&self) -> &[LedStep] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if there are no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all finite step durations.
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().filter_map(|s| s.duration).sum()
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Submits sequences to a running [`Sequencer`].
#[derive(Clone, Debug)]
pub struct SequencerHandle {
    tx: mpsc::Sender<LedSequence>,
}

impl SequencerHandle {
    /// Queue a sequence, suspending while the channel is full.
    ///
    /// Returns false if the sequencer has stopped.
    pub async fn submit(&self, sequence: LedSequence) -> bool {
        self.tx.send(sequence).await.is_ok()
    }

    /// Queue a sequence without waiting.
    pub fn try_submit(&self, sequence: LedSequence) -> Result<(), TrySendError<LedSequence>> {
        self.tx.try_send(sequence)
    }
}

// ============================================================================
// Sequencer
// ============================================================================

/// The LED task.
pub struct Sequencer<L> {
    output: L,
    requests: mpsc::Receiver<LedSequence>,
}

impl<L> Sequencer<L>
where
    L: ColorOutput + Send + 'static,
{
    /// Create the task and the handle that feeds it.
    pub fn new(output: L, config: &SequencerConfig) -> Result<(Self, SequencerHandle), Error> {
        config.validate()?;
        let (tx, requests) = mpsc::channel(config.buffer);
        Ok((Self { output, requests }, SequencerHandle { tx }))
    }

    /// Play submissions until `shutdown` fires or every handle is dropped.
    ///
    /// Hands the output back so the owner can blank it.
    pub async fn run(mut self, shutdown: Shutdown) -> L {
        let mut current = LedSequence::new();
        let mut next = 0;
        let mut deadline: Option<Instant> = None;

        info!("LED sequencer started");
        loop {
            let timer = sleep_until(deadline.unwrap_or_else(Instant::now));
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(sequence) => {
                        debug!(steps = sequence.len(), "new LED sequence");
                        current = sequence;
                        next = 0;
                        deadline = self.advance(&current, &mut next);
                    }
                    None => break,
                },
                _ = timer, if deadline.is_some() => {
                    deadline = self.advance(&current, &mut next);
                }
            }
        }
        info!("LED sequencer stopped");
        self.output
    }

    /// Show the next step, or go dark if there is none.
    fn advance(&mut self, sequence: &LedSequence, next: &mut usize) -> Option<Instant> {
        let Some(step) = sequence.steps().get(*next) else {
            self.show(Color::OFF);
            return None;
        };
        *next += 1;
        self.show(step.color);
        step.duration.map(|d| Instant::now() + d)
    }

    fn show(&mut self, color: Color) {
        if let Err(e) = self.output.set_color(color) {
            warn!(error = ?e, ?color, "LED write failed");
        }
    }
}
