//! `observeOn`: receive upstream signals on whatever
//! thread delivers them, re-emit downstream on a worker drawn from a
//! target scheduler. The handoff queue is the SPSC linked-array queue;
//! the handoff itself is the queue-drain pattern from `drain.rs`,
//! generalized from a single absorb-and-notify poll step into an
//! explicit worker-submitted drain task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::drain::DrainLoop;
use crate::error::ReactorError;
use crate::queue::{spsc_linked_array, SpscConsumer, SpscProducer};
use crate::scheduler::{worker_as_subscription, Scheduler, Worker};
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{CompositeSubscription, Subscription};

/// Default queue capacity when the caller doesn't specify one.
pub const DEFAULT_PREFETCH: usize = 128;

enum Event<T> {
    Next(T),
    Error(ReactorError),
    Complete,
}

struct ObserveOnState<T> {
    producer: Mutex<SpscProducer<Event<T>>>,
    consumer: Mutex<SpscConsumer<Event<T>>>,
    drain: DrainLoop,
    downstream: Mutex<Box<dyn Subscriber<T>>>,
    worker: Arc<dyn Worker>,
    cancelled: AtomicBool,
}

fn schedule_drain<T: Send + 'static>(state: &Arc<ObserveOnState<T>>) {
    if state.cancelled.load(Ordering::Acquire) {
        return;
    }
    if state.drain.mark() {
        let state = state.clone();
        let worker = state.worker.clone();
        worker.schedule(Box::new(move || {
            state.drain.drain(|| drain_once(&state));
        }));
    }
}

fn drain_once<T: Send + 'static>(state: &Arc<ObserveOnState<T>>) {
    loop {
        if state.cancelled.load(Ordering::Acquire) {
            state.consumer.lock().expect("observe_on mutex poisoned").clear();
            return;
        }
        let event = state.consumer.lock().expect("observe_on mutex poisoned").poll();
        match event {
            Some(Event::Next(value)) => {
                state.downstream.lock().expect("observe_on mutex poisoned").on_next(value);
            }
            Some(Event::Error(error)) => {
                state.downstream.lock().expect("observe_on mutex poisoned").on_error(error);
                return;
            }
            Some(Event::Complete) => {
                state.downstream.lock().expect("observe_on mutex poisoned").on_complete();
                return;
            }
            None => return,
        }
    }
}

struct UpstreamObserver<T> {
    state: Arc<ObserveOnState<T>>,
    upstream: Arc<CompositeSubscription>,
}

impl<T: Send + 'static> Subscriber<T> for UpstreamObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.upstream.add(subscription);
    }

    fn on_next(&mut self, value: T) {
        self.state.producer.lock().expect("observe_on mutex poisoned").offer(Event::Next(value));
        schedule_drain(&self.state);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.state.producer.lock().expect("observe_on mutex poisoned").offer(Event::Error(error));
        schedule_drain(&self.state);
    }

    fn on_complete(&mut self) {
        self.state.producer.lock().expect("observe_on mutex poisoned").offer(Event::Complete);
        schedule_drain(&self.state);
    }
}

struct ObserveOnSource<T> {
    upstream: BoxSource<T>,
    scheduler: Arc<dyn Scheduler>,
    prefetch: usize,
}

impl<T: Send + 'static> Source<T> for ObserveOnSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let (producer, consumer) = spsc_linked_array(self.prefetch);
        let worker = self.scheduler.create_worker();
        let state = Arc::new(ObserveOnState {
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            drain: DrainLoop::new(),
            downstream: Mutex::new(subscriber),
            worker: worker.clone(),
            cancelled: AtomicBool::new(false),
        });

        let upstream_children = Arc::new(CompositeSubscription::new());
        let outer = Arc::new(CompositeSubscription::new());
        outer.add(worker_as_subscription(worker));
        outer.add(upstream_children.clone() as Arc<dyn Subscription>);
        let outer_for_dispose = outer.clone();
        let cancel_flag = state.clone();
        let cancel_wrapper: Arc<dyn Subscription> = Arc::new(CancelFlagSubscription { flag: cancel_flag, inner: outer_for_dispose });

        state
            .downstream
            .lock()
            .expect("observe_on mutex poisoned")
            .on_subscribe(cancel_wrapper);

        self.upstream.subscribe(Box::new(UpstreamObserver { state, upstream: upstream_children }));
    }
}

struct CancelFlagSubscription<T> {
    flag: Arc<ObserveOnState<T>>,
    inner: Arc<CompositeSubscription>,
}

impl<T: Send> Subscription for CancelFlagSubscription<T> {
    fn dispose(&self) {
        self.flag.cancelled.store(true, Ordering::Release);
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

/// Move `source`'s signal delivery onto a worker drawn from `scheduler`,
/// handing off through a bounded-but-always-growing queue of `prefetch`
/// capacity.
pub fn observe_on<T: Send + 'static>(source: BoxSource<T>, scheduler: Arc<dyn Scheduler>, prefetch: usize) -> BoxSource<T> {
    Arc::new(ObserveOnSource { upstream: source, scheduler, prefetch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::VirtualTimeScheduler;
    use crate::sources::range;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[test]
    fn values_and_completion_are_delivered_on_the_worker() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let source = observe_on(range(1, 5), scheduler, DEFAULT_PREFETCH);

        let log = Arc::new(StdMutex::new(Vec::new()));
        let done = Arc::new(StdMutex::new(false));
        let log_clone = log.clone();
        let done_clone = done.clone();
        source.subscribe(Box::new(crate::subscriber::CallbackSubscriber::new(
            move |v| log_clone.lock().unwrap().push(v),
            |_| {},
            move || *done_clone.lock().unwrap() = true,
        )));

        // VirtualTimeScheduler's workers fire tasks scheduled with zero
        // delay only once the clock is advanced past "now" (even a
        // zero-amount advance runs everything already due).
        vt.advance_by(Duration::ZERO);
        assert_eq!(vec![1, 2, 3, 4, 5], *log.lock().unwrap());
        assert!(*done.lock().unwrap());
    }

    #[test]
    fn error_is_delivered_and_stops_further_drains() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let source = crate::sources::create(|emitter: crate::sources::Emitter<i32>| {
            emitter.on_next(1);
            emitter.on_error(ReactorError::User("boom".into()));
        });
        let source = observe_on(source, scheduler, DEFAULT_PREFETCH);

        let errors = Arc::new(StdMutex::new(0));
        let errors_clone = errors.clone();
        source.subscribe(Box::new(crate::subscriber::CallbackSubscriber::new(
            |_: i32| {},
            move |_| *errors_clone.lock().unwrap() += 1,
            || {},
        )));
        vt.advance_by(Duration::ZERO);
        assert_eq!(1, *errors.lock().unwrap());
    }
}
