//! Knob state machine timing, on a paused clock

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rs_blinds::{
    angle_color,
    hal::MockRotary,
    shutdown::{self, ShutdownTrigger},
    AngleDocument, Color, InteractionConfig, InteractionMachine, InteractionState, LedSequence,
    Sequencer, SequencerConfig,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

const DEBOUNCE: Duration = Duration::from_millis(100);
const COMMIT_AFTER: Duration = Duration::from_millis(3000);
const TICK: Duration = Duration::from_millis(10);

/// Remembers every commit; the committed angle follows the last one.
#[derive(Clone, Default)]
struct RecordingDocument {
    committed: Arc<Mutex<i32>>,
    commits: Arc<Mutex<Vec<i32>>>,
}

impl RecordingDocument {
    fn at(angle: i32) -> Self {
        let doc = Self::default();
        *doc.committed.lock().unwrap() = angle;
        doc
    }

    fn commits(&self) -> Vec<i32> {
        self.commits.lock().unwrap().clone()
    }
}

impl AngleDocument for RecordingDocument {
    fn committed_angle(&mut self) -> i32 {
        *self.committed.lock().unwrap()
    }

    async fn commit(&mut self, angle: i32) {
        self.commits.lock().unwrap().push(angle);
        *self.committed.lock().unwrap() = angle;
    }
}

struct Harness {
    knob: Arc<Mutex<MockRotary>>,
    doc: RecordingDocument,
    interrupts: mpsc::Sender<Instant>,
    state: watch::Receiver<InteractionState>,
    trigger: ShutdownTrigger,
    machine: JoinHandle<()>,
    sequencer: JoinHandle<Arc<Mutex<MockRotary>>>,
}

impl Harness {
    fn start(doc: RecordingDocument) -> Self {
        let knob = Arc::new(Mutex::new(MockRotary::new()));
        let (interrupts, rx) = mpsc::channel(1);
        let (sequencer, led) =
            Sequencer::new(Arc::clone(&knob), &SequencerConfig::default()).unwrap();
        let machine = InteractionMachine::new(
            Arc::clone(&knob),
            doc.clone(),
            Some(rx),
            led,
            InteractionConfig::default(),
        )
        .unwrap();
        let state = machine.subscribe_state();

        let (trigger, shutdown) = shutdown::channel();
        let sequencer = tokio::spawn(sequencer.run(shutdown.clone()));
        let machine = tokio::spawn(machine.run(shutdown));

        Self {
            knob,
            doc,
            interrupts,
            state,
            trigger,
            machine,
            sequencer,
        }
    }

    async fn interrupt(&self) {
        self.interrupts.send(Instant::now()).await.unwrap();
        // Let the machine pick it up.
        sleep(TICK).await;
    }

    fn state(&self) -> InteractionState {
        *self.state.borrow()
    }

    async fn stop(self) {
        self.trigger.trigger();
        self.machine.await.unwrap();
        self.sequencer.await.unwrap();
    }
}

// ============================================================================
// Edit Session Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn full_edit_session() {
    let h = Harness::start(RecordingDocument::at(0));
    assert_eq!(h.state(), InteractionState::Idle);

    h.knob.lock().unwrap().queue_delta(2);
    h.interrupt().await;
    assert_eq!(h.state(), InteractionState::Debounce);
    assert_eq!(h.knob.lock().unwrap().delta_reads, 0);

    sleep(DEBOUNCE).await;
    assert_eq!(h.state(), InteractionState::Edit);
    assert_eq!(h.knob.lock().unwrap().delta_reads, 1);

    // Two clicks at -10 degrees each
    let expected = angle_color(-20, &InteractionConfig::default());
    assert_eq!(h.knob.lock().unwrap().last_color(), Some(expected));
    assert!(h.doc.commits().is_empty());

    sleep(COMMIT_AFTER).await;
    assert_eq!(h.state(), InteractionState::Idle);
    assert_eq!(h.doc.commits(), vec![-20]);
    // Live color ran out
    assert_eq!(h.knob.lock().unwrap().last_color(), Some(Color::OFF));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn interrupts_do_not_extend_debounce() {
    let h = Harness::start(RecordingDocument::at(0));

    h.interrupt().await;
    assert_eq!(h.state(), InteractionState::Debounce);

    sleep(Duration::from_millis(40)).await;
    h.interrupt().await;
    h.interrupt().await;
    assert_eq!(h.state(), InteractionState::Debounce);

    // 100 ms after the first interrupt, not the last
    sleep(Duration::from_millis(50)).await;
    assert_eq!(h.state(), InteractionState::Edit);
    assert_eq!(h.knob.lock().unwrap().delta_reads, 1);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn further_input_restarts_commit_timer() {
    let h = Harness::start(RecordingDocument::at(30));

    h.knob.lock().unwrap().queue_delta(1);
    h.interrupt().await;
    sleep(DEBOUNCE).await;
    assert_eq!(h.state(), InteractionState::Edit);

    sleep(Duration::from_millis(1000)).await;
    h.knob.lock().unwrap().queue_delta(-3);
    h.interrupt().await;
    assert_eq!(h.state(), InteractionState::Debounce);
    sleep(DEBOUNCE).await;
    assert_eq!(h.state(), InteractionState::Edit);

    // The first session's deadline passes without a commit.
    sleep(Duration::from_millis(2500)).await;
    assert!(h.doc.commits().is_empty());

    sleep(Duration::from_millis(600)).await;
    // 30 - 10 + 30
    assert_eq!(h.doc.commits(), vec![50]);
    assert_eq!(h.state(), InteractionState::Idle);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn draft_is_clamped_to_range() {
    let h = Harness::start(RecordingDocument::at(130));

    h.knob.lock().unwrap().queue_delta(-5);
    h.interrupt().await;
    sleep(DEBOUNCE + COMMIT_AFTER).await;

    assert_eq!(h.doc.commits(), vec![140]);
    assert_eq!(
        h.knob.lock().unwrap().colors().first().copied(),
        Some(Color::GREEN)
    );

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn consecutive_sessions_start_from_last_commit() {
    let h = Harness::start(RecordingDocument::at(0));

    h.knob.lock().unwrap().queue_delta(-2);
    h.interrupt().await;
    sleep(DEBOUNCE + COMMIT_AFTER).await;
    assert_eq!(h.doc.commits(), vec![20]);

    h.knob.lock().unwrap().queue_delta(-1);
    h.interrupt().await;
    sleep(DEBOUNCE + COMMIT_AFTER).await;
    assert_eq!(h.doc.commits(), vec![20, 30]);

    h.stop().await;
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn knob_read_failure_skips_adjustment() {
    let h = Harness::start(RecordingDocument::at(-60));
    h.knob.lock().unwrap().fail_reads = true;
    h.knob.lock().unwrap().queue_delta(4);

    h.interrupt().await;
    sleep(DEBOUNCE).await;
    assert_eq!(h.state(), InteractionState::Edit);
    assert_eq!(h.knob.lock().unwrap().last_color(), None);

    sleep(COMMIT_AFTER).await;
    // The draft never moved off the committed angle.
    assert_eq!(h.doc.commits(), vec![-60]);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn out_of_range_start_is_clamped_without_knob_input() {
    // A shaft past the end of the range, and a knob that cannot be read.
    let h = Harness::start(RecordingDocument::at(180));
    h.knob.lock().unwrap().fail_reads = true;

    h.interrupt().await;
    sleep(DEBOUNCE + COMMIT_AFTER).await;

    assert_eq!(h.doc.commits(), vec![140]);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_discards_unfinished_draft() {
    let h = Harness::start(RecordingDocument::at(0));

    h.knob.lock().unwrap().queue_delta(3);
    h.interrupt().await;
    sleep(DEBOUNCE).await;
    assert_eq!(h.state(), InteractionState::Edit);

    let doc = h.doc.clone();
    h.stop().await;
    assert!(doc.commits().is_empty());
}

#[tokio::test(start_paused = true)]
async fn closed_interrupt_channel_waits_for_shutdown() {
    let h = Harness::start(RecordingDocument::at(0));
    let Harness {
        knob: _knob,
        doc,
        interrupts,
        state,
        trigger,
        machine,
        sequencer,
    } = h;
    drop(interrupts);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(*state.borrow(), InteractionState::Idle);
    assert!(!machine.is_finished());

    trigger.trigger();
    machine.await.unwrap();
    sequencer.await.unwrap();
    assert!(doc.commits().is_empty());
}

// ============================================================================
// Shutdown Tests
// ============================================================================

/// A document whose commits never complete.
struct StuckDocument;

impl AngleDocument for StuckDocument {
    fn committed_angle(&mut self) -> i32 {
        0
    }

    async fn commit(&mut self, _angle: i32) {
        std::future::pending::<()>().await;
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_a_stalled_commit() {
    let knob = Arc::new(Mutex::new(MockRotary::new()));
    let (interrupts, rx) = mpsc::channel(1);
    let (sequencer, led) = Sequencer::new(Arc::clone(&knob), &SequencerConfig::default()).unwrap();
    let machine = InteractionMachine::new(
        Arc::clone(&knob),
        StuckDocument,
        Some(rx),
        led,
        InteractionConfig::default(),
    )
    .unwrap();
    let (trigger, shutdown) = shutdown::channel();
    let sequencer = tokio::spawn(sequencer.run(shutdown.clone()));
    let machine = tokio::spawn(machine.run(shutdown));

    interrupts.send(Instant::now()).await.unwrap();
    // Past the commit deadline: the machine is stuck in commit.
    sleep(DEBOUNCE + COMMIT_AFTER + TICK).await;

    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(1), machine)
        .await
        .expect("machine did not stop")
        .unwrap();
    sequencer.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_blocked_led_feedback() {
    let knob = Arc::new(Mutex::new(MockRotary::new()));
    let (interrupts, rx) = mpsc::channel(1);
    // Nobody drains the LED queue: its single slot is filled up front.
    let (sequencer, led) = Sequencer::new(Arc::clone(&knob), &SequencerConfig::default()).unwrap();
    while led.try_submit(LedSequence::new()).is_ok() {}
    let machine = InteractionMachine::new(
        Arc::clone(&knob),
        RecordingDocument::at(0),
        Some(rx),
        led,
        InteractionConfig::default(),
    )
    .unwrap();
    let (trigger, shutdown) = shutdown::channel();
    let machine = tokio::spawn(machine.run(shutdown));

    interrupts.send(Instant::now()).await.unwrap();
    sleep(DEBOUNCE + TICK).await;

    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(1), machine)
        .await
        .expect("machine did not stop")
        .unwrap();
    drop(sequencer);
}
