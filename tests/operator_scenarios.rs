//! End-to-end scenarios over the public operator surface, each grounded
//! in one of the concrete walkthroughs this engine is built to satisfy:
//! a single-source pipeline producing a known sequence, run start to
//! finish through `Flow`/`consumer` rather than by inspecting any
//! operator's internals.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reactor_core::consumer::to_vec;
use reactor_core::operators::{self, ErrorMode};
use reactor_core::scheduler::{ImmediateScheduler, NewThreadScheduler, Scheduler, VirtualTimeScheduler};
use reactor_core::sources::{self, create, iterable, range, Emitter};
use reactor_core::subscriber::{BoxSource, CallbackSubscriber};
use reactor_core::Flow;

#[test]
fn range_to_list_blocking_first() {
    let values = Flow::new(range(1, 5)).to_vec().unwrap();
    assert_eq!(vec![1, 2, 3, 4, 5], values);
}

#[test]
fn flat_map_expansion_preserves_order_within_each_inner() {
    let source = operators::flat_map(range(1, 5), |i: i64| range(i, 2), None, ErrorMode::FastFail);
    let values = to_vec(&source).unwrap();
    assert_eq!(vec![1, 2, 2, 3, 3, 4, 4, 5, 5, 6], values);
}

#[test]
fn take_last_timed_keeps_the_trailing_one_second_window() {
    let scheduler = VirtualTimeScheduler::new();
    let emitter_slot: Arc<Mutex<Option<Emitter<i32>>>> = Arc::new(Mutex::new(None));
    let setter = emitter_slot.clone();
    let upstream = create(move |emitter: Emitter<i32>| *setter.lock().unwrap() = Some(emitter));

    let windowed = operators::take_last_timed(upstream, Duration::from_secs(1), Arc::new(scheduler.clone()));

    let collected = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(Mutex::new(false));
    let collected_clone = collected.clone();
    let completed_clone = completed.clone();
    windowed.subscribe(Box::new(CallbackSubscriber::new(
        move |v| collected_clone.lock().unwrap().push(v),
        |_| {},
        move || *completed_clone.lock().unwrap() = true,
    )));

    let emit = |at: Duration, value: i32| {
        scheduler.advance_to(at);
        emitter_slot.lock().unwrap().as_ref().unwrap().on_next(value);
    };
    emit(Duration::from_millis(0), 1);
    emit(Duration::from_millis(250), 2);
    emit(Duration::from_millis(500), 3);
    emit(Duration::from_millis(750), 4);
    emit(Duration::from_millis(1000), 5);
    scheduler.advance_to(Duration::from_millis(1250));
    emitter_slot.lock().unwrap().as_ref().unwrap().on_complete();

    assert_eq!(vec![2, 3, 4, 5], *collected.lock().unwrap());
    assert!(*completed.lock().unwrap());
}

#[test]
fn timeout_switches_to_fallback_once_the_deadline_elapses() {
    let scheduler = VirtualTimeScheduler::new();
    let emitter_slot: Arc<Mutex<Option<Emitter<&'static str>>>> = Arc::new(Mutex::new(None));
    let setter = emitter_slot.clone();
    let upstream = create(move |emitter: Emitter<&'static str>| *setter.lock().unwrap() = Some(emitter));
    let fallback: BoxSource<&'static str> = iterable(vec!["a", "b", "c"]);

    let watched = operators::timeout(upstream, Duration::from_secs(3), Arc::new(scheduler.clone()), Some(fallback));

    let collected = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(Mutex::new(false));
    let collected_clone = collected.clone();
    let completed_clone = completed.clone();
    watched.subscribe(Box::new(CallbackSubscriber::new(
        move |v| collected_clone.lock().unwrap().push(v),
        |_| {},
        move || *completed_clone.lock().unwrap() = true,
    )));

    scheduler.advance_to(Duration::from_secs(2));
    emitter_slot.lock().unwrap().as_ref().unwrap().on_next("One");
    scheduler.advance_to(Duration::from_secs(6));

    assert_eq!(vec!["One", "a", "b", "c"], *collected.lock().unwrap());
    assert!(*completed.lock().unwrap());
}

#[test]
fn group_by_then_flat_map_partitions_by_string_length() {
    let words = iterable(vec!["one", "two", "three", "four", "five", "six"]);
    let groups = operators::group_by(words, |w: &&str| w.len());

    let by_key: Arc<Mutex<std::collections::HashMap<usize, Vec<&str>>>> = Arc::new(Mutex::new(std::collections::HashMap::new()));
    for (key, group) in to_vec(&groups).unwrap() {
        let by_key = by_key.clone();
        group.subscribe(Box::new(CallbackSubscriber::new(
            move |value| by_key.lock().unwrap().entry(key).or_default().push(value),
            |_| {},
            || {},
        )));
    }
    let by_key = by_key.lock().unwrap();
    assert_eq!(&vec!["one", "two", "six"], by_key.get(&3).unwrap());
    assert_eq!(&vec!["four", "five"], by_key.get(&4).unwrap());
    assert_eq!(&vec!["three"], by_key.get(&5).unwrap());
}

#[test]
fn zip_completes_as_soon_as_the_shorter_source_is_exhausted() {
    let letters: BoxSource<String> = iterable(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    let numbers: BoxSource<String> = operators::map(iterable(vec![1, 2]), |n: i32| n.to_string());
    let zipped = operators::zip(vec![letters, numbers], |values: Vec<String>| format!("{}{}", values[0], values[1]));
    assert_eq!(vec!["a1".to_string(), "b2".to_string()], to_vec(&zipped).unwrap());
}

#[test]
fn observe_on_survives_a_large_synchronous_burst_under_early_cancellation() {
    let scheduler = Arc::new(NewThreadScheduler::default());
    let burst = sources::array((0..4_000_000i64).collect::<Vec<_>>());
    let relayed = operators::observe_on(burst, scheduler, 1024);
    let limited = operators::take(relayed, 100);

    let values = to_vec(&limited).unwrap();
    assert_eq!(100, values.len());
    assert_eq!((0..100).collect::<Vec<_>>(), values);
}

#[test]
fn switch_map_only_observes_the_latest_inner() {
    let scheduler = VirtualTimeScheduler::new();
    let emitter_slot: Arc<Mutex<Option<Emitter<i32>>>> = Arc::new(Mutex::new(None));
    let setter = emitter_slot.clone();
    let upstream = create(move |emitter: Emitter<i32>| *setter.lock().unwrap() = Some(emitter));

    let scheduler_for_inner = scheduler.clone();
    let switched = operators::switch_map(upstream, move |key: i32| {
        let worker_scheduler: Arc<dyn Scheduler> = Arc::new(scheduler_for_inner.clone());
        operators::observe_on(iterable(vec![key * 10]), worker_scheduler, 16)
    });

    let collected = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(Mutex::new(false));
    let collected_clone = collected.clone();
    let completed_clone = completed.clone();
    switched.subscribe(Box::new(CallbackSubscriber::new(
        move |v| collected_clone.lock().unwrap().push(v),
        |_| {},
        move || *completed_clone.lock().unwrap() = true,
    )));

    let emitter = emitter_slot.lock().unwrap().as_ref().unwrap().clone();
    emitter.on_next(1);
    emitter.on_next(2);
    emitter.on_complete();
    scheduler.trigger_actions();

    assert_eq!(vec![20], *collected.lock().unwrap());
    assert!(*completed.lock().unwrap());
}

#[test]
fn identity_map_and_always_true_filter_are_transparent() {
    let mapped = Flow::new(range(1, 5)).map(|v| v).to_vec().unwrap();
    let filtered = Flow::new(range(1, 5)).filter(|_| true).to_vec().unwrap();
    let plain = Flow::new(range(1, 5)).to_vec().unwrap();
    assert_eq!(plain, mapped);
    assert_eq!(plain, filtered);
}

#[test]
fn terminal_signals_silently_discard_everything_queued_behind_them() {
    let emitter_slot: Arc<Mutex<Option<Emitter<i32>>>> = Arc::new(Mutex::new(None));
    let setter = emitter_slot.clone();
    let source = create(move |emitter: Emitter<i32>| *setter.lock().unwrap() = Some(emitter));

    let collected = Arc::new(Mutex::new(Vec::new()));
    let complete_count = Arc::new(Mutex::new(0));
    let collected_clone = collected.clone();
    let complete_count_clone = complete_count.clone();
    source.subscribe(Box::new(CallbackSubscriber::new(
        move |v| collected_clone.lock().unwrap().push(v),
        |_| {},
        move || *complete_count_clone.lock().unwrap() += 1,
    )));

    let emitter = emitter_slot.lock().unwrap().as_ref().unwrap().clone();
    emitter.on_next(1);
    emitter.on_complete();
    emitter.on_next(2);
    emitter.on_complete();

    assert_eq!(vec![1], *collected.lock().unwrap());
    assert_eq!(1, *complete_count.lock().unwrap());
}

#[test]
fn publish_and_replay_compose_with_the_rest_of_the_operator_surface() {
    let connectable = Flow::new(iterable(vec![1, 2, 3])).replay(reactor_core::buffer_policy::BufferLengthPolicy::new(usize::MAX));
    connectable.connect();
    let doubled = operators::map(Arc::new(connectable) as BoxSource<i32>, |v| v * 2);
    assert_eq!(vec![2, 4, 6], to_vec(&doubled).unwrap());
}

#[test]
fn immediate_scheduler_runs_reentrant_work_without_recursing() {
    let scheduler = ImmediateScheduler::default();
    let worker = scheduler.create_worker();
    let log = Arc::new(Mutex::new(Vec::new()));

    let log_outer = log.clone();
    let worker_for_inner = worker.clone();
    worker.schedule(Box::new(move || {
        log_outer.lock().unwrap().push("outer");
        let log_inner = log_outer.clone();
        worker_for_inner.schedule(Box::new(move || log_inner.lock().unwrap().push("inner")));
    }));

    assert_eq!(vec!["outer", "inner"], *log.lock().unwrap());
}
