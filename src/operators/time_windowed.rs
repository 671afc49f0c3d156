//! The time-windowed operator family: `debounce`,
//! `sample`, `throttleFirst`/`throttleLast`/`throttleWithTimeout`,
//! `timeout`, `takeLastTimed`, `skipLastTimed`. Every operator here that
//! has a timer callback racing against the upstream thread hands both
//! sides to one `SerializedSubscriber`, so the timer firing concurrently
//! with an upstream terminal can never produce an out-of-order delivery.
//! The two purely upstream-driven operators (`takeLastTimed`,
//! `skipLastTimed`) need no such wrapper: nothing but the upstream thread
//! ever touches their buffer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ReactorError;
use crate::scheduler::{schedule_periodically_on, worker_as_subscription, Scheduler, Worker};
use crate::serialized::{ErrorMode, SerializedSubscriber};
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{CompositeSubscription, SerialSubscription, Subscription};

// ---- debounce / throttleWithTimeout -----------------------------------

struct DebounceState<T> {
    downstream: Arc<SerializedSubscriber<T>>,
    worker: Arc<dyn Worker>,
    pending: Mutex<Option<T>>,
    timer: Arc<SerialSubscription>,
}

struct DebounceObserver<T> {
    state: Arc<DebounceState<T>>,
    duration: Duration,
    children: Arc<CompositeSubscription>,
}

impl<T: Send + 'static> Subscriber<T> for DebounceObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.children.add(subscription);
    }

    fn on_next(&mut self, value: T) {
        *self.state.pending.lock().expect("debounce mutex poisoned") = Some(value);
        let state = self.state.clone();
        let handle = self.state.worker.schedule_after(
            Box::new(move || {
                if let Some(v) = state.pending.lock().expect("debounce mutex poisoned").take() {
                    state.downstream.on_next(v);
                }
            }),
            self.duration,
        );
        self.state.timer.set(handle);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.state.timer.dispose();
        self.state.pending.lock().expect("debounce mutex poisoned").take();
        self.state.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        self.state.timer.dispose();
        if let Some(v) = self.state.pending.lock().expect("debounce mutex poisoned").take() {
            self.state.downstream.on_next(v);
        }
        self.state.downstream.on_complete();
    }
}

struct DebounceSource<T> {
    upstream: BoxSource<T>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Send + 'static> Source<T> for DebounceSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let downstream = Arc::new(SerializedSubscriber::new(subscriber, ErrorMode::FastFail));
        let worker = self.scheduler.create_worker();
        let timer = Arc::new(SerialSubscription::new());
        let children = Arc::new(CompositeSubscription::new());
        children.add(worker_as_subscription(worker.clone()));
        children.add(timer.clone() as Arc<dyn Subscription>);
        downstream.on_subscribe(children.clone() as Arc<dyn Subscription>);

        let state = Arc::new(DebounceState { downstream, worker, pending: Mutex::new(None), timer });
        self.upstream.subscribe(Box::new(DebounceObserver { state, duration: self.duration, children }));
    }
}

/// Emit a value only once `duration` has passed without a newer one
/// arriving; flush whatever's pending immediately if the upstream
/// completes first.
pub fn debounce<T: Send + 'static>(source: BoxSource<T>, duration: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<T> {
    Arc::new(DebounceSource { upstream: source, duration, scheduler })
}

/// An alias for [`debounce`]: the two names describe the same behavior
/// from different angles ("wait for quiet" vs. "don't fire more often
/// than this without new activity").
pub fn throttle_with_timeout<T: Send + 'static>(source: BoxSource<T>, duration: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<T> {
    debounce(source, duration, scheduler)
}

// ---- throttleFirst ------------------------------------------------------

struct ThrottleFirstState {
    window_open: AtomicBool,
}

struct ThrottleFirstObserver<T> {
    inner: Box<dyn Subscriber<T>>,
    state: Arc<ThrottleFirstState>,
    worker: Arc<dyn Worker>,
    duration: Duration,
}

impl<T: Send + 'static> Subscriber<T> for ThrottleFirstObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }

    fn on_next(&mut self, value: T) {
        if self.state.window_open.swap(true, Ordering::AcqRel) {
            return; // already inside a throttle window; drop this value.
        }
        self.inner.on_next(value);
        let state = self.state.clone();
        self.worker.schedule_after(
            Box::new(move || {
                state.window_open.store(false, Ordering::Release);
            }),
            self.duration,
        );
    }

    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

struct ThrottleFirstSource<T> {
    upstream: BoxSource<T>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Send + 'static> Source<T> for ThrottleFirstSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let worker = self.scheduler.create_worker();
        self.upstream.subscribe(Box::new(ThrottleFirstObserver {
            inner: subscriber,
            state: Arc::new(ThrottleFirstState { window_open: AtomicBool::new(false) }),
            worker,
            duration: self.duration,
        }));
    }
}

/// Emit the first value in a burst, then ignore everything else for
/// `duration` before opening the gate again.
pub fn throttle_first<T: Send + 'static>(source: BoxSource<T>, duration: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<T> {
    Arc::new(ThrottleFirstSource { upstream: source, duration, scheduler })
}

// ---- throttleLast ---------------------------------------------------------

struct ThrottleLastState<T> {
    downstream: Arc<SerializedSubscriber<T>>,
    latest: Mutex<Option<T>>,
    armed: AtomicBool,
    timer: Arc<SerialSubscription>,
    worker: Arc<dyn Worker>,
}

struct ThrottleLastObserver<T> {
    state: Arc<ThrottleLastState<T>>,
    duration: Duration,
    children: Arc<CompositeSubscription>,
}

impl<T: Send + 'static> Subscriber<T> for ThrottleLastObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.children.add(subscription);
    }

    fn on_next(&mut self, value: T) {
        *self.state.latest.lock().expect("throttle_last mutex poisoned") = Some(value);
        if self.state.armed.swap(true, Ordering::AcqRel) {
            return;
        }
        let state = self.state.clone();
        let handle = self.state.worker.schedule_after(
            Box::new(move || {
                state.armed.store(false, Ordering::Release);
                if let Some(v) = state.latest.lock().expect("throttle_last mutex poisoned").take() {
                    state.downstream.on_next(v);
                }
            }),
            self.duration,
        );
        self.state.timer.set(handle);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.state.timer.dispose();
        self.state.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        self.state.timer.dispose();
        if let Some(v) = self.state.latest.lock().expect("throttle_last mutex poisoned").take() {
            self.state.downstream.on_next(v);
        }
        self.state.downstream.on_complete();
    }
}

struct ThrottleLastSource<T> {
    upstream: BoxSource<T>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Send + 'static> Source<T> for ThrottleLastSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let downstream = Arc::new(SerializedSubscriber::new(subscriber, ErrorMode::FastFail));
        let worker = self.scheduler.create_worker();
        let timer = Arc::new(SerialSubscription::new());
        let children = Arc::new(CompositeSubscription::new());
        children.add(worker_as_subscription(worker.clone()));
        children.add(timer.clone() as Arc<dyn Subscription>);
        downstream.on_subscribe(children.clone() as Arc<dyn Subscription>);

        let state = Arc::new(ThrottleLastState {
            downstream,
            latest: Mutex::new(None),
            armed: AtomicBool::new(false),
            timer,
            worker,
        });
        self.upstream.subscribe(Box::new(ThrottleLastObserver { state, duration: self.duration, children }));
    }
}

/// Emit the most recent value seen once `duration` has elapsed since the
/// window opened, then allow a new window to open on the next value.
pub fn throttle_last<T: Send + 'static>(source: BoxSource<T>, duration: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<T> {
    Arc::new(ThrottleLastSource { upstream: source, duration, scheduler })
}

// ---- sample ---------------------------------------------------------------

struct SampleState<T> {
    downstream: Arc<SerializedSubscriber<T>>,
    latest: Mutex<Option<T>>,
}

struct SampleObserver<T> {
    state: Arc<SampleState<T>>,
    children: Arc<CompositeSubscription>,
}

impl<T: Send + 'static> Subscriber<T> for SampleObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.children.add(subscription);
    }

    fn on_next(&mut self, value: T) {
        *self.state.latest.lock().expect("sample mutex poisoned") = Some(value);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.state.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        self.state.downstream.on_complete();
    }
}

struct SampleSource<T> {
    upstream: BoxSource<T>,
    period: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Send + 'static> Source<T> for SampleSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let downstream = Arc::new(SerializedSubscriber::new(subscriber, ErrorMode::FastFail));
        let worker = self.scheduler.create_worker();
        let state = Arc::new(SampleState { downstream: downstream.clone(), latest: Mutex::new(None) });

        let tick_state = state.clone();
        let ticker = schedule_periodically_on(
            worker.clone(),
            Arc::new(move || {
                if let Some(v) = tick_state.latest.lock().expect("sample mutex poisoned").take() {
                    tick_state.downstream.on_next(v);
                }
            }),
            self.period,
            self.period,
        );

        let children = Arc::new(CompositeSubscription::new());
        children.add(worker_as_subscription(worker));
        children.add(ticker);
        downstream.on_subscribe(children.clone() as Arc<dyn Subscription>);

        self.upstream.subscribe(Box::new(SampleObserver { state, children }));
    }
}

/// Emit the most recently seen value once per `period`, independent of
/// when upstream values actually arrive.
pub fn sample<T: Send + 'static>(source: BoxSource<T>, period: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<T> {
    Arc::new(SampleSource { upstream: source, period, scheduler })
}

// ---- timeout ----------------------------------------------------------

struct TimeoutState<T> {
    downstream: Arc<SerializedSubscriber<T>>,
    worker: Arc<dyn Worker>,
    watchdog: Arc<SerialSubscription>,
    upstream_token: Arc<SerialSubscription>,
    duration: Duration,
    fallback: Option<BoxSource<T>>,
    switched: AtomicBool,
}

fn arm_watchdog<T: Send + 'static>(state: &Arc<TimeoutState<T>>) {
    let armed = state.clone();
    let handle = state.worker.schedule_after(Box::new(move || fire_timeout(&armed)), state.duration);
    state.watchdog.set(handle);
}

fn fire_timeout<T: Send + 'static>(state: &Arc<TimeoutState<T>>) {
    if state.switched.swap(true, Ordering::AcqRel) {
        return;
    }
    match &state.fallback {
        Some(fallback) => {
            fallback.subscribe(Box::new(FallbackObserver { state: state.clone() }));
        }
        None => {
            state.upstream_token.dispose();
            state.downstream.on_error(ReactorError::Timeout(state.duration));
        }
    }
}

struct FallbackObserver<T> {
    state: Arc<TimeoutState<T>>,
}

impl<T: Send + 'static> Subscriber<T> for FallbackObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.state.upstream_token.set(subscription);
    }

    fn on_next(&mut self, value: T) {
        self.state.downstream.on_next(value);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.state.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        self.state.downstream.on_complete();
    }
}

struct TimeoutObserver<T> {
    state: Arc<TimeoutState<T>>,
}

impl<T: Send + 'static> Subscriber<T> for TimeoutObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.state.upstream_token.set(subscription);
        arm_watchdog(&self.state);
    }

    fn on_next(&mut self, value: T) {
        if self.state.switched.load(Ordering::Acquire) {
            return;
        }
        self.state.downstream.on_next(value);
        arm_watchdog(&self.state);
    }

    fn on_error(&mut self, error: ReactorError) {
        if self.state.switched.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state.watchdog.dispose();
        self.state.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        if self.state.switched.swap(true, Ordering::AcqRel) {
            return;
        }
        self.state.watchdog.dispose();
        self.state.downstream.on_complete();
    }
}

struct TimeoutSource<T> {
    upstream: BoxSource<T>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
    fallback: Option<BoxSource<T>>,
}

impl<T: Send + 'static> Source<T> for TimeoutSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let downstream = Arc::new(SerializedSubscriber::new(subscriber, ErrorMode::FastFail));
        let worker = self.scheduler.create_worker();
        let watchdog = Arc::new(SerialSubscription::new());
        let upstream_token = Arc::new(SerialSubscription::new());

        let children = Arc::new(CompositeSubscription::new());
        children.add(worker_as_subscription(worker.clone()));
        children.add(watchdog.clone() as Arc<dyn Subscription>);
        children.add(upstream_token.clone() as Arc<dyn Subscription>);
        downstream.on_subscribe(children.clone() as Arc<dyn Subscription>);

        let state = Arc::new(TimeoutState {
            downstream,
            worker,
            watchdog,
            upstream_token,
            duration: self.duration,
            fallback: self.fallback.clone(),
            switched: AtomicBool::new(false),
        });

        self.upstream.subscribe(Box::new(TimeoutObserver { state }));
    }
}

/// Fail (or switch to `fallback` if given) once `duration` passes without
/// a new signal from `source`.
pub fn timeout<T: Send + 'static>(source: BoxSource<T>, duration: Duration, scheduler: Arc<dyn Scheduler>, fallback: Option<BoxSource<T>>) -> BoxSource<T> {
    Arc::new(TimeoutSource { upstream: source, duration, scheduler, fallback })
}

// ---- takeLastTimed / skipLastTimed ----------------------------------------

struct TakeLastTimedObserver<T> {
    inner: Box<dyn Subscriber<T>>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
    buffer: VecDeque<(Duration, T)>,
}

impl<T> TakeLastTimedObserver<T> {
    fn evict_stale(&mut self, now: Duration) {
        while let Some((timestamp, _)) = self.buffer.front() {
            if now - *timestamp > self.duration {
                self.buffer.pop_front();
            } else {
                break;
            }
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for TakeLastTimedObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }

    fn on_next(&mut self, value: T) {
        let now = self.scheduler.now();
        self.buffer.push_back((now, value));
        self.evict_stale(now);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.buffer.clear();
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        let now = self.scheduler.now();
        self.evict_stale(now);
        for (_, value) in self.buffer.drain(..) {
            self.inner.on_next(value);
        }
        self.inner.on_complete();
    }
}

struct TakeLastTimedSource<T> {
    upstream: BoxSource<T>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Send + 'static> Source<T> for TakeLastTimedSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        self.upstream.subscribe(Box::new(TakeLastTimedObserver {
            inner: subscriber,
            duration: self.duration,
            scheduler: self.scheduler.clone(),
            buffer: VecDeque::new(),
        }));
    }
}

/// Buffer only the values seen within `duration` of the most recent
/// signal and, once upstream completes, emit that trailing window in
/// order before completing.
pub fn take_last_timed<T: Send + 'static>(source: BoxSource<T>, duration: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<T> {
    Arc::new(TakeLastTimedSource { upstream: source, duration, scheduler })
}

struct SkipLastTimedObserver<T> {
    inner: Box<dyn Subscriber<T>>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
    buffer: VecDeque<(Duration, T)>,
}

impl<T: Send + 'static> Subscriber<T> for SkipLastTimedObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }

    fn on_next(&mut self, value: T) {
        let now = self.scheduler.now();
        self.buffer.push_back((now, value));
        while let Some((timestamp, _)) = self.buffer.front() {
            if now - *timestamp >= self.duration {
                let (_, value) = self.buffer.pop_front().expect("checked non-empty above");
                self.inner.on_next(value);
            } else {
                break;
            }
        }
    }

    fn on_error(&mut self, error: ReactorError) {
        self.buffer.clear();
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        // The trailing `duration` window is discarded by definition.
        self.buffer.clear();
        self.inner.on_complete();
    }
}

struct SkipLastTimedSource<T> {
    upstream: BoxSource<T>,
    duration: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Send + 'static> Source<T> for SkipLastTimedSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        self.upstream.subscribe(Box::new(SkipLastTimedObserver {
            inner: subscriber,
            duration: self.duration,
            scheduler: self.scheduler.clone(),
            buffer: VecDeque::new(),
        }));
    }
}

/// Hold every value back until it has aged past `duration`, so the final
/// `duration` worth of values right before completion is never emitted.
pub fn skip_last_timed<T: Send + 'static>(source: BoxSource<T>, duration: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<T> {
    Arc::new(SkipLastTimedSource { upstream: source, duration, scheduler })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::to_vec;
    use crate::scheduler::VirtualTimeScheduler;
    use crate::sources::{create, iterable, Emitter};
    use crate::subscriber::CallbackSubscriber;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn debounce_only_emits_after_a_quiet_period() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let emitter_slot: Arc<Mutex<Option<Emitter<i32>>>> = Arc::new(Mutex::new(None));
        let emitter_slot_setter = emitter_slot.clone();
        let upstream = create(move |emitter: Emitter<i32>| *emitter_slot_setter.lock().unwrap() = Some(emitter));
        let source = debounce(upstream, Duration::from_millis(100), scheduler);

        let values = Arc::new(StdMutex::new(Vec::new()));
        let values_clone = values.clone();
        source.subscribe(Box::new(CallbackSubscriber::new(move |v| values_clone.lock().unwrap().push(v), |_| {}, || {})));

        let emit = |v: i32| emitter_slot.lock().unwrap().as_ref().unwrap().on_next(v);
        emit(1);
        vt.advance_by(Duration::from_millis(50));
        emit(2); // restarts the quiet window; 1 should never fire
        vt.advance_by(Duration::from_millis(100));

        assert_eq!(vec![2], *values.lock().unwrap());
    }

    #[test]
    fn throttle_first_drops_values_inside_the_window() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let source = throttle_first(iterable(vec![1, 2, 3]), Duration::from_millis(100), scheduler);
        assert_eq!(vec![1], to_vec(&source).unwrap());
    }

    #[test]
    fn timeout_without_fallback_errors_after_the_deadline() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let emitter_slot: Arc<Mutex<Option<Emitter<i32>>>> = Arc::new(Mutex::new(None));
        let emitter_slot_setter = emitter_slot.clone();
        let upstream = create(move |emitter: Emitter<i32>| *emitter_slot_setter.lock().unwrap() = Some(emitter));
        let source = timeout(upstream, Duration::from_millis(50), scheduler.clone(), None);

        let errors = Arc::new(StdMutex::new(0));
        let errors_clone = errors.clone();
        source.subscribe(Box::new(CallbackSubscriber::new(|_: i32| {}, move |_| *errors_clone.lock().unwrap() += 1, || {})));

        vt.advance_by(Duration::from_millis(60));
        assert_eq!(1, *errors.lock().unwrap());
    }

    #[test]
    fn timeout_with_fallback_switches_instead_of_erroring() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let emitter_slot: Arc<Mutex<Option<Emitter<i32>>>> = Arc::new(Mutex::new(None));
        let emitter_slot_setter = emitter_slot.clone();
        let upstream = create(move |emitter: Emitter<i32>| *emitter_slot_setter.lock().unwrap() = Some(emitter));
        let fallback = iterable(vec![9, 9]);
        let source = timeout(upstream, Duration::from_millis(50), scheduler.clone(), Some(fallback));

        let values = Arc::new(StdMutex::new(Vec::new()));
        let values_clone = values.clone();
        source.subscribe(Box::new(CallbackSubscriber::new(move |v| values_clone.lock().unwrap().push(v), |_| {}, || {})));

        vt.advance_by(Duration::from_millis(60));
        assert_eq!(vec![9, 9], *values.lock().unwrap());
    }

    #[test]
    fn take_last_timed_keeps_only_the_trailing_window() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let emitter_slot: Arc<Mutex<Option<Emitter<i32>>>> = Arc::new(Mutex::new(None));
        let emitter_slot_setter = emitter_slot.clone();
        let upstream = create(move |emitter: Emitter<i32>| *emitter_slot_setter.lock().unwrap() = Some(emitter));
        let source = take_last_timed(upstream, Duration::from_millis(100), scheduler.clone());

        let values = Arc::new(StdMutex::new(Vec::new()));
        let values_clone = values.clone();
        let done = Arc::new(StdMutex::new(false));
        let done_clone = done.clone();
        source.subscribe(Box::new(CallbackSubscriber::new(
            move |v| values_clone.lock().unwrap().push(v),
            |_| {},
            move || *done_clone.lock().unwrap() = true,
        )));

        let emit = |v: i32| emitter_slot.lock().unwrap().as_ref().unwrap().on_next(v);
        emit(1);
        vt.advance_by(Duration::from_millis(150));
        emit(2);
        emit(3);
        emitter_slot.lock().unwrap().as_ref().unwrap().on_complete();

        assert_eq!(vec![2, 3], *values.lock().unwrap());
        assert!(*done.lock().unwrap());
    }
}
