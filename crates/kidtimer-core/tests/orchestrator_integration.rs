//! Integration tests for the multi-child orchestrator.
//!
//! Everything runs against a manual clock and in-memory hooks, so suspensions
//! of any length are simulated by moving the clock.

mod support;

use kidtimer_core::hooks::NotificationCall;
use kidtimer_core::{
    CompletionEvent, CompletionSink, Event, MemoryStore, SnapshotStore, TimerMode,
    TimerOrchestrator, TimerState,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{secs, Device, T0};
use uuid::Uuid;

#[test]
fn countdown_completes_once() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    assert!(orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(1500)));
    device.advance(secs(1499));
    assert!(orchestrator.tick().is_empty());
    assert_eq!(orchestrator.remaining_ms(device.emma), Some(secs(1)));

    device.advance(secs(5));
    let finished = orchestrator.tick();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].child_name, "Emma");
    assert_eq!(finished[0].category_name, "Reading");
    assert_eq!(finished[0].actual_duration_ms, secs(1500));
    assert_eq!(finished[0].completed_at_epoch_ms, T0 + secs(1500));

    for _ in 0..10 {
        device.advance(secs(60));
        assert!(orchestrator.tick().is_empty());
    }
    assert_eq!(orchestrator.completed_timers().len(), 1);
    assert_eq!(device.sink.count_for(device.emma), 1);
}

#[test]
fn second_start_replaces_the_first() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(1500));
    device.advance(secs(100));
    assert!(orchestrator.start_timer(device.emma, device.lego, TimerMode::Countdown, secs(600)));

    assert_eq!(orchestrator.timer_states().count(), 1);
    assert_eq!(orchestrator.remaining_ms(device.emma), Some(secs(600)));
    let timer = orchestrator.timer_state(device.emma).unwrap();
    assert_eq!(timer.category().unwrap().name, "Lego");

    // Only the new timer's alerts are live.
    let pending = device.notifier.pending_for(device.emma);
    assert!(pending.contains(&NotificationCall::Completion {
        child_id: device.emma,
        fire_in: Duration::from_secs(600),
        label: "Emma's Lego".into(),
    }));
    assert!(pending
        .iter()
        .all(|c| !matches!(c, NotificationCall::Completion { fire_in, .. } if *fire_in == Duration::from_secs(1500))));

    // The first timer's original deadline passes without a completion.
    device.advance(secs(1400));
    let finished = orchestrator.tick();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].actual_duration_ms, secs(600));
    assert_eq!(finished[0].category_name, "Lego");
}

#[test]
fn children_are_independent() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(600));
    orchestrator.start_timer(device.noah, device.lego, TimerMode::Countdown, secs(900));
    device.advance(secs(60));
    orchestrator.pause_timer(device.emma);
    device.advance(secs(240));
    orchestrator.add_time(device.noah, secs(120) as i64);

    assert_eq!(orchestrator.remaining_ms(device.emma), Some(secs(540)));
    assert_eq!(orchestrator.remaining_ms(device.noah), Some(secs(900 + 120 - 300)));

    orchestrator.stop_timer(device.noah);
    assert_eq!(orchestrator.remaining_ms(device.emma), Some(secs(540)));
    assert_eq!(
        orchestrator.timer_state(device.emma).map(|t| t.state()),
        Some(TimerState::Paused)
    );
    assert_eq!(orchestrator.active_children(), vec![device.emma]);
}

#[test]
fn unknown_child_is_a_no_op() {
    let device = Device::new();
    let mut orchestrator = device.launch();
    let stranger = Uuid::new_v4();

    assert!(!orchestrator.pause_timer(stranger));
    assert!(!orchestrator.resume_timer(stranger));
    assert!(!orchestrator.stop_timer(stranger));
    assert!(!orchestrator.add_time(stranger, 60_000));
    assert!(!orchestrator.dismiss_completed(stranger));
    assert!(orchestrator.timer_state(stranger).is_none());
    assert!(orchestrator.remaining_ms(stranger).is_none());
    assert_eq!(device.store.save_count(), 0);
}

#[test]
fn invalid_transitions_are_rejected_without_side_effects() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    assert!(!orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, 0));
    assert!(orchestrator.timer_state(device.emma).is_none());

    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(300));
    assert!(!orchestrator.resume_timer(device.emma));
    assert!(orchestrator.pause_timer(device.emma));
    assert!(!orchestrator.pause_timer(device.emma));
    assert_eq!(
        orchestrator.timer_state(device.emma).map(|t| t.state()),
        Some(TimerState::Paused)
    );
}

#[test]
fn stopwatch_counts_up_and_never_completes() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.noah, device.lego, TimerMode::Stopwatch, 0);
    device.advance(secs(7200));
    assert!(orchestrator.tick().is_empty());
    assert_eq!(orchestrator.remaining_ms(device.noah), None);
    let timer = orchestrator.timer_state(device.noah).unwrap();
    assert_eq!(timer.elapsed_ms(device.now()), secs(7200));
    assert!(!orchestrator.add_time(device.noah, 1_000));
    assert!(device.notifier.pending_for(device.noah).is_empty());
}

#[test]
fn notifications_follow_the_timer() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(1500));
    assert_eq!(device.notifier.pending_for(device.emma).len(), 3);

    device.advance(secs(100));
    orchestrator.pause_timer(device.emma);
    assert!(device.notifier.pending_for(device.emma).is_empty());

    device.advance(secs(3600));
    orchestrator.resume_timer(device.emma);
    let pending = device.notifier.pending_for(device.emma);
    assert_eq!(pending.len(), 3);
    assert_eq!(
        pending[0],
        NotificationCall::Completion {
            child_id: device.emma,
            fire_in: Duration::from_secs(1400),
            label: "Emma's Reading".into(),
        }
    );

    orchestrator.add_time(device.emma, secs(300) as i64);
    let pending = device.notifier.pending_for(device.emma);
    assert!(matches!(
        pending[0],
        NotificationCall::Completion { fire_in, .. } if fire_in == Duration::from_secs(1700)
    ));

    assert!(orchestrator.stop_timer(device.emma));
    assert!(device.notifier.pending_for(device.emma).is_empty());
    // Stopping again is harmless.
    assert!(!orchestrator.stop_timer(device.emma));
}

#[test]
fn completed_queue_is_fifo() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.noah, device.lego, TimerMode::Countdown, secs(120));
    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(60));
    device.advance(secs(600));
    let finished = orchestrator.tick();
    assert_eq!(finished.len(), 2);

    let first = orchestrator.acknowledge_next_completed().unwrap();
    assert_eq!(first.child_id, device.emma);
    assert!(orchestrator.timer_state(device.emma).is_none());
    assert_eq!(orchestrator.next_completed().map(|r| r.child_id), Some(device.noah));
    let second = orchestrator.acknowledge_next_completed().unwrap();
    assert_eq!(second.child_id, device.noah);
    assert!(orchestrator.acknowledge_next_completed().is_none());
}

#[test]
fn new_start_clears_stale_completion() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(60));
    device.advance(secs(61));
    orchestrator.tick();
    assert_eq!(orchestrator.completed_timers().len(), 1);

    assert!(orchestrator.start_timer(device.emma, device.lego, TimerMode::Countdown, secs(60)));
    assert!(orchestrator.completed_timers().is_empty());
    assert!(orchestrator.has_active_timer(device.emma));
}

#[test]
fn plain_ticks_never_write() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(600));
    let writes = device.store.save_count();
    for _ in 0..500 {
        device.advance(1_000);
        orchestrator.tick();
    }
    assert_eq!(device.store.save_count(), writes);

    device.advance(secs(200));
    assert_eq!(orchestrator.tick().len(), 1);
    assert_eq!(device.store.save_count(), writes + 1);
}

/// Looks at the store at the moment a completion is delivered.
struct StoreWitness {
    store: Arc<MemoryStore>,
    seen: Mutex<Vec<usize>>,
}

impl CompletionSink for StoreWitness {
    fn timer_completed(&self, event: &CompletionEvent) {
        let stored = self
            .store
            .load()
            .map(|s| {
                s.completed
                    .iter()
                    .filter(|r| r.child_id == event.child_id)
                    .count()
            })
            .unwrap_or(0);
        self.seen.lock().unwrap().push(stored);
    }
}

#[test]
fn completion_is_persisted_before_it_is_announced() {
    let device = Device::new();
    let witness = Arc::new(StoreWitness {
        store: device.store.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let mut orchestrator = TimerOrchestrator::builder(device.store.clone())
        .clock(device.clock.clone())
        .notifier(device.notifier.clone())
        .sink(witness.clone())
        .directory(Arc::new(device.directory.clone()))
        .build();
    let mut events = orchestrator.subscribe();

    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(30));
    device.advance(secs(31));
    orchestrator.tick();

    assert_eq!(*witness.seen.lock().unwrap(), vec![1]);

    assert!(matches!(events.try_recv().unwrap(), Event::TimerStarted { .. }));
    match events.try_recv().unwrap() {
        Event::TimerCompleted { record, .. } => assert_eq!(record.child_id, device.emma),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn sink_receives_category_and_duration() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.noah, device.lego, TimerMode::Countdown, secs(90));
    device.advance(secs(20));
    orchestrator.pause_timer(device.noah);
    device.advance(secs(600));
    orchestrator.resume_timer(device.noah);
    device.advance(secs(70));
    orchestrator.tick();

    let events = device.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].child_id, device.noah);
    assert_eq!(events[0].category.id, device.lego);
    assert_eq!(events[0].actual_duration_ms, secs(90));
    assert_eq!(events[0].completed_at_epoch_ms, T0 + secs(690));
}

#[test]
fn backward_clock_never_overshoots() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.start_timer(device.emma, device.reading, TimerMode::Countdown, secs(600));
    device.clock.rewind(Duration::from_secs(3600));
    assert_eq!(orchestrator.remaining_ms(device.emma), Some(secs(600)));
    assert!(orchestrator.tick().is_empty());
}

#[test]
fn pending_start_is_read_once_within_ttl() {
    let device = Device::new();
    let mut orchestrator = device.launch();

    orchestrator.queue_pending_start(device.noah, device.lego);
    device.advance(secs(10));
    let pending = orchestrator.consume_pending_start().unwrap();
    assert_eq!(pending.child_id, device.noah);
    assert!(orchestrator.consume_pending_start().is_none());

    orchestrator.queue_pending_start(device.noah, device.lego);
    device.advance(secs(31));
    assert!(orchestrator.consume_pending_start().is_none());
}
