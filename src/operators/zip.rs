//! `zip`: combine the Nth value of every source into
//! one output value, in lockstep. Each source gets its own queue; a
//! single queue-drain loop (the same single-owner pattern `flat_map` and
//! `observe_on` use) is the only place that ever calls the combiner or
//! touches the downstream subscriber, so a source finishing its queue on
//! one thread can never race a combine step still running on another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::drain::DrainLoop;
use crate::error::ReactorError;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{CompositeSubscription, Subscription};
use crate::terminal_latch::TerminalLatch;

struct ZipState<T, U, F> {
    queues: Vec<Mutex<VecDeque<T>>>,
    done: Vec<AtomicBool>,
    error: Mutex<Option<ReactorError>>,
    drain: DrainLoop,
    latch: TerminalLatch,
    downstream: Mutex<Box<dyn Subscriber<U>>>,
    children: Arc<CompositeSubscription>,
    combiner: Arc<F>,
}

fn mark_and_drain<T, U, F>(state: &Arc<ZipState<T, U, F>>)
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
    if state.drain.mark() {
        state.drain.drain(|| drain_once(state));
    }
}

fn drain_once<T, U, F>(state: &Arc<ZipState<T, U, F>>)
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
    loop {
        if state.latch.is_terminated() {
            return;
        }

        let pending_error = state.error.lock().expect("zip mutex poisoned").is_some();
        if pending_error {
            if state.latch.begin_terminate() {
                state.children.dispose();
                let error = state.error.lock().expect("zip mutex poisoned").take().expect("error just observed present");
                let mut downstream = state.downstream.lock().expect("zip mutex poisoned");
                downstream.on_error(error);
                state.latch.finish_terminate();
                drop(downstream);
            }
            return;
        }

        let mut guards: Vec<_> = state.queues.iter().map(|queue| queue.lock().expect("zip mutex poisoned")).collect();
        let all_ready = guards.iter().all(|queue| !queue.is_empty());
        if !all_ready {
            for (index, queue) in guards.iter().enumerate() {
                if queue.is_empty() && state.done[index].load(Ordering::Acquire) {
                    drop(guards);
                    if state.latch.begin_terminate() {
                        state.children.dispose();
                        let mut downstream = state.downstream.lock().expect("zip mutex poisoned");
                        downstream.on_complete();
                        state.latch.finish_terminate();
                        drop(downstream);
                    }
                    return;
                }
            }
            return;
        }

        let values: Vec<T> = guards.iter_mut().map(|queue| queue.pop_front().expect("checked non-empty above")).collect();
        drop(guards);
        let combined = (state.combiner)(values);
        state.downstream.lock().expect("zip mutex poisoned").on_next(combined);
    }
}

struct InnerObserver<T, U, F> {
    index: usize,
    state: Arc<ZipState<T, U, F>>,
}

impl<T, U, F> Subscriber<T> for InnerObserver<T, U, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.state.children.add(subscription);
    }

    fn on_next(&mut self, value: T) {
        self.state.queues[self.index].lock().expect("zip mutex poisoned").push_back(value);
        mark_and_drain(&self.state);
    }

    fn on_error(&mut self, error: ReactorError) {
        let mut slot = self.state.error.lock().expect("zip mutex poisoned");
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        mark_and_drain(&self.state);
    }

    fn on_complete(&mut self) {
        self.state.done[self.index].store(true, Ordering::Release);
        mark_and_drain(&self.state);
    }
}

struct ZipSource<T, U, F> {
    sources: Vec<BoxSource<T>>,
    combiner: Arc<F>,
    _marker: std::marker::PhantomData<fn() -> U>,
}

impl<T, U, F> Source<U> for ZipSource<T, U, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<U>>) {
        let n = self.sources.len();
        let state = Arc::new(ZipState {
            queues: (0..n).map(|_| Mutex::new(VecDeque::new())).collect(),
            done: (0..n).map(|_| AtomicBool::new(false)).collect(),
            error: Mutex::new(None),
            drain: DrainLoop::new(),
            latch: TerminalLatch::new(),
            downstream: Mutex::new(subscriber),
            children: Arc::new(CompositeSubscription::new()),
            combiner: self.combiner.clone(),
        });

        let children_as_subscription: Arc<dyn Subscription> = state.children.clone();
        state
            .downstream
            .lock()
            .expect("zip mutex poisoned")
            .on_subscribe(children_as_subscription);

        if n == 0 {
            if state.latch.begin_terminate() {
                state.downstream.lock().expect("zip mutex poisoned").on_complete();
                state.latch.finish_terminate();
            }
            return;
        }

        for (index, source) in self.sources.iter().enumerate() {
            source.subscribe(Box::new(InnerObserver { index, state: state.clone() }));
        }
    }
}

/// Combine the Nth value from every one of `sources` with `combiner`,
/// completing once any source completes and its own queue has drained.
pub fn zip<T, U, F>(sources: Vec<BoxSource<T>>, combiner: F) -> BoxSource<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
    Arc::new(ZipSource { sources, combiner: Arc::new(combiner), _marker: std::marker::PhantomData })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::to_vec;
    use crate::error::ReactorError;
    use crate::sources::{iterable, range};

    #[test]
    fn combines_values_in_lockstep() {
        let source = zip(vec![range(1, 3), iterable(vec![10, 20, 30, 40])], |mut values: Vec<i32>| {
            let b = values.pop().unwrap();
            let a = values.pop().unwrap();
            a + b
        });
        assert_eq!(vec![11, 22, 33], to_vec(&source).unwrap());
    }

    #[test]
    fn completes_when_the_shortest_source_runs_out() {
        let source = zip(vec![range(1, 2), range(100, 10)], |mut values: Vec<i32>| values.pop().unwrap());
        assert_eq!(2, to_vec(&source).unwrap().len());
    }

    #[test]
    fn an_inner_error_propagates_and_cancels_siblings() {
        let failing: BoxSource<i32> = crate::sources::create(|emitter: crate::sources::Emitter<i32>| {
            emitter.on_error(ReactorError::User("boom".into()));
        });
        let source = zip(vec![range(1, 1_000), failing], |values: Vec<i32>| values[0]);
        assert!(to_vec(&source).is_err());
    }
}
