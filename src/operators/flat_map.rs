//! `flatMap`/`merge`: for each upstream value, derive
//! an inner stream and interleave its values into the output, bounded by
//! an optional maximum concurrency. All inner producers and the upstream
//! itself write into one shared queue guarded by the same queue-drain
//! pattern `serialized.rs` uses for its own multi-producer fan-in, so the
//! output is delivered on exactly one thread at a time regardless of how
//! many inner streams are active concurrently.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::drain::DrainLoop;
use crate::error::ReactorError;
use crate::hooks;
use crate::queue::{spsc_linked_array, SpscConsumer, SpscProducer};
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{CompositeSubscription, Subscription};
use crate::terminal_latch::TerminalLatch;

/// Whether an inner/upstream error cancels everything else immediately,
/// or is accumulated and only surfaces once every other inner has
/// finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    FastFail,
    Delayed,
}

enum Event<U> {
    Next(U),
    InnerError(ReactorError),
    InnerComplete,
    UpstreamComplete,
}

struct FlatMapState<T, U> {
    producer: Mutex<SpscProducer<Event<U>>>,
    consumer: Mutex<SpscConsumer<Event<U>>>,
    drain: DrainLoop,
    downstream: Mutex<Box<dyn Subscriber<U>>>,
    active_inner: AtomicUsize,
    upstream_done: AtomicBool,
    latch: TerminalLatch,
    children: Arc<CompositeSubscription>,
    error_mode: ErrorMode,
    errors: Mutex<Vec<ReactorError>>,
    max_concurrency: Option<usize>,
    pending: Mutex<VecDeque<T>>,
    mapper: Arc<dyn Fn(T) -> BoxSource<U> + Send + Sync>,
}

fn mark_and_drain<T: Send + 'static, U: Send + 'static>(state: &Arc<FlatMapState<T, U>>) {
    if state.drain.mark() {
        state.drain.drain(|| drain_once(state));
    }
}

fn drain_once<T: Send + 'static, U: Send + 'static>(state: &Arc<FlatMapState<T, U>>) {
    loop {
        let event = state.consumer.lock().expect("flat_map mutex poisoned").poll();
        match event {
            Some(Event::Next(value)) => {
                if state.latch.is_terminated() {
                    continue;
                }
                state.downstream.lock().expect("flat_map mutex poisoned").on_next(value);
            }
            Some(Event::InnerError(error)) => match state.error_mode {
                ErrorMode::FastFail => {
                    if state.latch.begin_terminate() {
                        state.children.dispose();
                        state.downstream.lock().expect("flat_map mutex poisoned").on_error(error);
                        state.latch.finish_terminate();
                    } else {
                        hooks::report_undeliverable(error);
                    }
                }
                ErrorMode::Delayed => {
                    state.errors.lock().expect("flat_map mutex poisoned").push(error);
                    maybe_finish(state);
                }
            },
            Some(Event::InnerComplete) | Some(Event::UpstreamComplete) => {
                maybe_finish(state);
            }
            None => return,
        }
    }
}

fn maybe_finish<T: Send + 'static, U: Send + 'static>(state: &Arc<FlatMapState<T, U>>) {
    if !state.latch.is_active() {
        return;
    }
    let done = state.upstream_done.load(Ordering::Acquire) && state.active_inner.load(Ordering::Acquire) == 0;
    if !done {
        return;
    }
    if state.latch.begin_terminate() {
        let errors = std::mem::take(&mut *state.errors.lock().expect("flat_map mutex poisoned"));
        let mut downstream = state.downstream.lock().expect("flat_map mutex poisoned");
        match ReactorError::fold(errors) {
            Some(error) => downstream.on_error(error),
            None => downstream.on_complete(),
        }
        drop(downstream);
        state.latch.finish_terminate();
    }
}

fn start_inner<T: Send + 'static, U: Send + 'static>(state: &Arc<FlatMapState<T, U>>, value: T) {
    state.active_inner.fetch_add(1, Ordering::AcqRel);
    let inner_source = (state.mapper)(value);
    inner_source.subscribe(Box::new(InnerObserver { state: state.clone() }));
}

fn try_start_pending<T: Send + 'static, U: Send + 'static>(state: &Arc<FlatMapState<T, U>>) {
    loop {
        if let Some(max) = state.max_concurrency {
            if state.active_inner.load(Ordering::Acquire) >= max {
                return;
            }
        }
        let next = state.pending.lock().expect("flat_map mutex poisoned").pop_front();
        match next {
            Some(value) => start_inner(state, value),
            None => return,
        }
    }
}

struct InnerObserver<T, U> {
    state: Arc<FlatMapState<T, U>>,
}

impl<T: Send + 'static, U: Send + 'static> Subscriber<U> for InnerObserver<T, U> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.state.children.add(subscription);
    }

    fn on_next(&mut self, value: U) {
        self.state.producer.lock().expect("flat_map mutex poisoned").offer(Event::Next(value));
        mark_and_drain(&self.state);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.state.active_inner.fetch_sub(1, Ordering::AcqRel);
        self.state.producer.lock().expect("flat_map mutex poisoned").offer(Event::InnerError(error));
        mark_and_drain(&self.state);
        try_start_pending(&self.state);
    }

    fn on_complete(&mut self) {
        self.state.active_inner.fetch_sub(1, Ordering::AcqRel);
        self.state.producer.lock().expect("flat_map mutex poisoned").offer(Event::InnerComplete);
        mark_and_drain(&self.state);
        try_start_pending(&self.state);
    }
}

struct UpstreamObserver<T, U> {
    state: Arc<FlatMapState<T, U>>,
}

impl<T: Send + 'static, U: Send + 'static> Subscriber<T> for UpstreamObserver<T, U> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.state.children.add(subscription);
    }

    fn on_next(&mut self, value: T) {
        let at_limit = self
            .state
            .max_concurrency
            .is_some_and(|max| self.state.active_inner.load(Ordering::Acquire) >= max);
        if at_limit {
            self.state.pending.lock().expect("flat_map mutex poisoned").push_back(value);
            return;
        }
        start_inner(&self.state, value);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.state.upstream_done.store(true, Ordering::Release);
        self.state.producer.lock().expect("flat_map mutex poisoned").offer(Event::InnerError(error));
        mark_and_drain(&self.state);
    }

    fn on_complete(&mut self) {
        self.state.upstream_done.store(true, Ordering::Release);
        self.state.producer.lock().expect("flat_map mutex poisoned").offer(Event::UpstreamComplete);
        mark_and_drain(&self.state);
    }
}

struct FlatMapSource<T, U> {
    upstream: BoxSource<T>,
    mapper: Arc<dyn Fn(T) -> BoxSource<U> + Send + Sync>,
    max_concurrency: Option<usize>,
    error_mode: ErrorMode,
    prefetch: usize,
}

impl<T: Send + 'static, U: Send + 'static> Source<U> for FlatMapSource<T, U> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<U>>) {
        let (producer, consumer) = spsc_linked_array(self.prefetch);
        let state = Arc::new(FlatMapState {
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            drain: DrainLoop::new(),
            downstream: Mutex::new(subscriber),
            active_inner: AtomicUsize::new(0),
            upstream_done: AtomicBool::new(false),
            latch: TerminalLatch::new(),
            children: Arc::new(CompositeSubscription::new()),
            error_mode: self.error_mode,
            errors: Mutex::new(Vec::new()),
            max_concurrency: self.max_concurrency,
            pending: Mutex::new(VecDeque::new()),
            mapper: self.mapper.clone(),
        });

        let children_as_subscription: Arc<dyn Subscription> = state.children.clone();
        state.downstream.lock().expect("flat_map mutex poisoned").on_subscribe(children_as_subscription);

        self.upstream.subscribe(Box::new(UpstreamObserver { state }));
    }
}

/// Map each upstream value to an inner `Source` and interleave its
/// values into the output, running at most `max_concurrency` inner
/// streams at once (`None` means unbounded).
pub fn flat_map<T, U, F>(source: BoxSource<T>, mapper: F, max_concurrency: Option<usize>, error_mode: ErrorMode) -> BoxSource<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> BoxSource<U> + Send + Sync + 'static,
{
    Arc::new(FlatMapSource {
        upstream: source,
        mapper: Arc::new(mapper),
        max_concurrency,
        error_mode,
        prefetch: crate::operators::observe_on::DEFAULT_PREFETCH,
    })
}

/// Interleave a fixed set of sources into one, completing once every one
/// of them has completed.
pub fn merge<T: Send + 'static>(sources: Vec<BoxSource<T>>, max_concurrency: Option<usize>) -> BoxSource<T> {
    let source_of_sources = crate::sources::iterable(sources);
    flat_map(source_of_sources, |inner: BoxSource<T>| inner, max_concurrency, ErrorMode::FastFail)
}
