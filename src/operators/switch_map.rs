//! `switchMap`: like `flat_map` with a maximum
//! concurrency of one, except that a new upstream value doesn't wait for
//! the current inner to finish -- it disposes it outright and subscribes
//! the new one in its place. The outgoing inner's subscription lives in a
//! `SerialSubscription`, which is exactly the primitive built for "replace
//! this child, disposing whatever was there before". Completion requires
//! both the upstream and the currently-live inner to be done.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::drain::DrainLoop;
use crate::error::ReactorError;
use crate::hooks;
use crate::queue::{spsc_linked_array, SpscConsumer, SpscProducer};
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{CompositeSubscription, SerialSubscription, Subscription};
use crate::terminal_latch::TerminalLatch;

enum Event<U> {
    Next(U),
    Error(ReactorError),
    InnerComplete,
    UpstreamComplete,
}

struct SwitchMapState<T, U> {
    producer: Mutex<SpscProducer<Event<U>>>,
    consumer: Mutex<SpscConsumer<Event<U>>>,
    drain: DrainLoop,
    downstream: Mutex<Box<dyn Subscriber<U>>>,
    latch: TerminalLatch,
    children: Arc<CompositeSubscription>,
    current_inner: Arc<SerialSubscription>,
    generation: AtomicUsize,
    upstream_done: AtomicBool,
    inner_done: AtomicBool,
    mapper: Arc<dyn Fn(T) -> BoxSource<U> + Send + Sync>,
}

fn mark_and_drain<T: Send + 'static, U: Send + 'static>(state: &Arc<SwitchMapState<T, U>>) {
    if state.drain.mark() {
        state.drain.drain(|| drain_once(state));
    }
}

fn drain_once<T: Send + 'static, U: Send + 'static>(state: &Arc<SwitchMapState<T, U>>) {
    loop {
        let event = state.consumer.lock().expect("switch_map mutex poisoned").poll();
        match event {
            Some(Event::Next(value)) => {
                if state.latch.is_terminated() {
                    continue;
                }
                state.downstream.lock().expect("switch_map mutex poisoned").on_next(value);
            }
            Some(Event::Error(error)) => {
                if state.latch.begin_terminate() {
                    state.children.dispose();
                    let mut downstream = state.downstream.lock().expect("switch_map mutex poisoned");
                    downstream.on_error(error);
                    state.latch.finish_terminate();
                    drop(downstream);
                } else {
                    hooks::report_undeliverable(error);
                }
            }
            Some(Event::InnerComplete) | Some(Event::UpstreamComplete) => check_finish(state),
            None => return,
        }
    }
}

fn check_finish<T: Send + 'static, U: Send + 'static>(state: &Arc<SwitchMapState<T, U>>) {
    if !state.latch.is_active() {
        return;
    }
    if state.upstream_done.load(Ordering::Acquire) && state.inner_done.load(Ordering::Acquire) {
        if state.latch.begin_terminate() {
            state.children.dispose();
            let mut downstream = state.downstream.lock().expect("switch_map mutex poisoned");
            downstream.on_complete();
            state.latch.finish_terminate();
            drop(downstream);
        }
    }
}

struct InnerObserver<T, U> {
    state: Arc<SwitchMapState<T, U>>,
    generation: usize,
}

impl<T: Send + 'static, U: Send + 'static> InnerObserver<T, U> {
    fn is_current(&self) -> bool {
        self.state.generation.load(Ordering::Acquire) == self.generation
    }
}

impl<T: Send + 'static, U: Send + 'static> Subscriber<U> for InnerObserver<T, U> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.is_current() {
            self.state.current_inner.set(subscription);
        } else {
            subscription.dispose();
        }
    }

    fn on_next(&mut self, value: U) {
        if !self.is_current() {
            return;
        }
        self.state.producer.lock().expect("switch_map mutex poisoned").offer(Event::Next(value));
        mark_and_drain(&self.state);
    }

    fn on_error(&mut self, error: ReactorError) {
        if !self.is_current() {
            return;
        }
        self.state.producer.lock().expect("switch_map mutex poisoned").offer(Event::Error(error));
        mark_and_drain(&self.state);
    }

    fn on_complete(&mut self) {
        if !self.is_current() {
            return;
        }
        self.state.inner_done.store(true, Ordering::Release);
        self.state.producer.lock().expect("switch_map mutex poisoned").offer(Event::InnerComplete);
        mark_and_drain(&self.state);
    }
}

struct UpstreamObserver<T, U> {
    state: Arc<SwitchMapState<T, U>>,
}

impl<T: Send + 'static, U: Send + 'static> Subscriber<T> for UpstreamObserver<T, U> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.state.children.add(subscription);
    }

    fn on_next(&mut self, value: T) {
        let generation = self.state.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.inner_done.store(false, Ordering::Release);
        let inner_source = (self.state.mapper)(value);
        inner_source.subscribe(Box::new(InnerObserver { state: self.state.clone(), generation }));
    }

    fn on_error(&mut self, error: ReactorError) {
        self.state.upstream_done.store(true, Ordering::Release);
        self.state.producer.lock().expect("switch_map mutex poisoned").offer(Event::Error(error));
        mark_and_drain(&self.state);
    }

    fn on_complete(&mut self) {
        self.state.upstream_done.store(true, Ordering::Release);
        self.state.producer.lock().expect("switch_map mutex poisoned").offer(Event::UpstreamComplete);
        mark_and_drain(&self.state);
    }
}

struct SwitchMapSource<T, U> {
    upstream: BoxSource<T>,
    mapper: Arc<dyn Fn(T) -> BoxSource<U> + Send + Sync>,
    prefetch: usize,
}

impl<T: Send + 'static, U: Send + 'static> Source<U> for SwitchMapSource<T, U> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<U>>) {
        let (producer, consumer) = spsc_linked_array(self.prefetch);
        let current_inner = Arc::new(SerialSubscription::new());
        let children = Arc::new(CompositeSubscription::new());
        children.add(current_inner.clone() as Arc<dyn Subscription>);

        let state = Arc::new(SwitchMapState {
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            drain: DrainLoop::new(),
            downstream: Mutex::new(subscriber),
            latch: TerminalLatch::new(),
            children: children.clone(),
            current_inner,
            generation: AtomicUsize::new(0),
            upstream_done: AtomicBool::new(false),
            inner_done: AtomicBool::new(true),
            mapper: self.mapper.clone(),
        });

        let children_as_subscription: Arc<dyn Subscription> = children;
        state.downstream.lock().expect("switch_map mutex poisoned").on_subscribe(children_as_subscription);

        self.upstream.subscribe(Box::new(UpstreamObserver { state }));
    }
}

/// Map each upstream value to an inner `Source`, subscribing only to the
/// latest one: a new upstream value disposes whatever inner is currently
/// running. Completes once the upstream is done and the currently-live
/// inner (if any) has completed.
pub fn switch_map<T, U, F>(source: BoxSource<T>, mapper: F) -> BoxSource<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> BoxSource<U> + Send + Sync + 'static,
{
    Arc::new(SwitchMapSource {
        upstream: source,
        mapper: Arc::new(mapper),
        prefetch: crate::operators::observe_on::DEFAULT_PREFETCH,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::to_vec;
    use crate::sources::{iterable, range, Emitter};
    use crate::subscriber::CallbackSubscriber;
    use std::collections::HashMap;

    #[test]
    fn switching_to_a_new_inner_discards_the_old_one_s_further_values() {
        let upstream_emitter: Arc<Mutex<Option<Emitter<i32>>>> = Arc::new(Mutex::new(None));
        let upstream_emitter_setter = upstream_emitter.clone();
        let upstream = crate::sources::create(move |emitter: Emitter<i32>| {
            *upstream_emitter_setter.lock().unwrap() = Some(emitter);
        });

        let inner_emitters: Arc<Mutex<HashMap<i32, Emitter<i32>>>> = Arc::new(Mutex::new(HashMap::new()));
        let inner_emitters_for_mapper = inner_emitters.clone();
        let source = switch_map(upstream, move |v: i32| {
            let inner_emitters = inner_emitters_for_mapper.clone();
            crate::sources::create(move |emitter: Emitter<i32>| {
                inner_emitters.lock().unwrap().insert(v, emitter);
            })
        });

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let done = Arc::new(Mutex::new(false));
        let done_clone = done.clone();
        source.subscribe(Box::new(CallbackSubscriber::new(
            move |v| received_clone.lock().unwrap().push(v),
            |_| {},
            move || *done_clone.lock().unwrap() = true,
        )));

        let emit_upstream = |v: i32| upstream_emitter.lock().unwrap().as_ref().unwrap().on_next(v);
        let emit_upstream_complete = || upstream_emitter.lock().unwrap().as_ref().unwrap().on_complete();
        let emit_inner = |key: i32, v: i32| inner_emitters.lock().unwrap().get(&key).unwrap().on_next(v);
        let complete_inner = |key: i32| inner_emitters.lock().unwrap().get(&key).unwrap().on_complete();

        emit_upstream(1);
        emit_inner(1, 100);
        emit_upstream(2);
        emit_inner(1, 999); // stale: inner 1's token was disposed by the switch
        emit_inner(2, 200);
        emit_upstream_complete();
        complete_inner(2);

        assert_eq!(vec![100, 200], *received.lock().unwrap());
        assert!(*done.lock().unwrap());
    }

    #[test]
    fn completes_once_upstream_and_the_final_inner_are_both_done() {
        let source = switch_map(range(1, 1), |v| iterable(vec![v]));
        assert_eq!(vec![1], to_vec(&source).unwrap());
    }
}
