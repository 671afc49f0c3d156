//! `groupBy`: partition upstream values by a key
//! function into one hot per-key sub-stream each, emitted downstream the
//! first time its key is seen as a `(key, inner source)` pair. Each inner
//! source may be subscribed to exactly once -- a second subscription
//! attempt is a protocol violation, the same rule the signal protocol
//! applies to a plain `Source` double-subscribe, here enforced per group
//! rather than per top-level stream.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ReactorError;
use crate::hooks;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{disposed, CompositeSubscription, Subscription};

/// Default number of values buffered for a group before it has a
/// subscriber. Exceeding it is a backpressure violation, reported to
/// whichever subscriber the group eventually gets (or the undeliverable
/// hook if it never gets one).
pub const DEFAULT_GROUP_BUFFER: usize = 128;

enum Terminal {
    Complete,
    Error(ReactorError),
}

struct GroupInner<T> {
    buffer: Mutex<VecDeque<T>>,
    subscriber: Mutex<Option<Box<dyn Subscriber<T>>>>,
    subscribed: AtomicBool,
    cancelled: AtomicBool,
    terminal: Mutex<Option<Terminal>>,
    capacity: usize,
    subscription: Arc<CompositeSubscription>,
}

impl<T: Send + 'static> GroupInner<T> {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::new()),
            subscriber: Mutex::new(None),
            subscribed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            terminal: Mutex::new(None),
            capacity,
            subscription: Arc::new(CompositeSubscription::new()),
        }
    }

    fn offer(&self, value: T) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let mut subscriber = self.subscriber.lock().expect("group mutex poisoned");
        match subscriber.as_mut() {
            Some(downstream) => downstream.on_next(value),
            None => {
                let mut buffer = self.buffer.lock().expect("group mutex poisoned");
                if buffer.len() >= self.capacity {
                    drop(buffer);
                    drop(subscriber);
                    self.finish(Terminal::Error(ReactorError::QueueOverflow { capacity: self.capacity }));
                } else {
                    buffer.push_back(value);
                }
            }
        }
    }

    fn finish(&self, terminal: Terminal) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let mut slot = self.terminal.lock().expect("group mutex poisoned");
        if slot.is_some() {
            return;
        }
        let mut subscriber = self.subscriber.lock().expect("group mutex poisoned");
        match subscriber.as_mut() {
            Some(downstream) => match &terminal {
                Terminal::Complete => downstream.on_complete(),
                Terminal::Error(error) => downstream.on_error(error.clone()),
            },
            None => {
                if let Terminal::Error(error) = &terminal {
                    hooks::report_undeliverable(error.clone());
                }
            }
        }
        *slot = Some(terminal);
    }

    fn subscribe(self: &Arc<Self>, mut subscriber: Box<dyn Subscriber<T>>) {
        if self.subscribed.swap(true, Ordering::AcqRel) {
            subscriber.on_subscribe(disposed());
            subscriber.on_error(ReactorError::Protocol("group source subscribed to more than once"));
            return;
        }

        let group_for_dispose = self.clone();
        let cancel_token: Arc<dyn Subscription> = Arc::new(GroupCancelSubscription { group: group_for_dispose });
        subscriber.on_subscribe(cancel_token);

        let drained: Vec<T> = self.buffer.lock().expect("group mutex poisoned").drain(..).collect();
        for value in drained {
            subscriber.on_next(value);
        }

        let already_terminal = self.terminal.lock().expect("group mutex poisoned").take();
        match already_terminal {
            Some(Terminal::Complete) => subscriber.on_complete(),
            Some(Terminal::Error(error)) => subscriber.on_error(error),
            None => {
                *self.subscriber.lock().expect("group mutex poisoned") = Some(subscriber);
            }
        }
    }
}

struct GroupCancelSubscription<T> {
    group: Arc<GroupInner<T>>,
}

impl<T: Send> Subscription for GroupCancelSubscription<T> {
    fn dispose(&self) {
        self.group.cancelled.store(true, Ordering::Release);
        *self.group.subscriber.lock().expect("group mutex poisoned") = None;
        self.group.buffer.lock().expect("group mutex poisoned").clear();
    }

    fn is_disposed(&self) -> bool {
        self.group.cancelled.load(Ordering::Acquire)
    }
}

struct GroupSource<T> {
    inner: Arc<GroupInner<T>>,
}

impl<T: Send + 'static> Source<T> for GroupSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        self.inner.subscribe(subscriber);
    }
}

struct GroupByState<K, T> {
    groups: Mutex<HashMap<K, Arc<GroupInner<T>>>>,
    downstream: Mutex<Box<dyn Subscriber<(K, BoxSource<T>)>>>,
    capacity: usize,
}

struct UpstreamObserver<K, T, F> {
    state: Arc<GroupByState<K, T>>,
    key_selector: F,
    children: Arc<CompositeSubscription>,
}

impl<K, T, F> Subscriber<T> for UpstreamObserver<K, T, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(&T) -> K + Send,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.children.add(subscription);
    }

    fn on_next(&mut self, value: T) {
        let key = (self.key_selector)(&value);
        let group = {
            let mut groups = self.state.groups.lock().expect("group_by mutex poisoned");
            if let Some(existing) = groups.get(&key) {
                existing.clone()
            } else {
                let group = Arc::new(GroupInner::new(self.state.capacity));
                groups.insert(key.clone(), group.clone());
                let boxed: BoxSource<T> = Arc::new(GroupSource { inner: group.clone() });
                self.state
                    .downstream
                    .lock()
                    .expect("group_by mutex poisoned")
                    .on_next((key, boxed));
                group
            }
        };
        group.offer(value);
    }

    fn on_error(&mut self, error: ReactorError) {
        let groups = std::mem::take(&mut *self.state.groups.lock().expect("group_by mutex poisoned"));
        for group in groups.values() {
            group.finish(Terminal::Error(error.clone()));
        }
        self.state.downstream.lock().expect("group_by mutex poisoned").on_error(error);
    }

    fn on_complete(&mut self) {
        let groups = std::mem::take(&mut *self.state.groups.lock().expect("group_by mutex poisoned"));
        for group in groups.values() {
            group.finish(Terminal::Complete);
        }
        self.state.downstream.lock().expect("group_by mutex poisoned").on_complete();
    }
}

struct GroupBySource<T, F> {
    upstream: BoxSource<T>,
    key_selector: Arc<F>,
    capacity: usize,
}

impl<K, T, F> Source<(K, BoxSource<T>)> for GroupBySource<T, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<(K, BoxSource<T>)>>) {
        let state = Arc::new(GroupByState {
            groups: Mutex::new(HashMap::new()),
            downstream: Mutex::new(subscriber),
            capacity: self.capacity,
        });
        let children = Arc::new(CompositeSubscription::new());
        let children_as_subscription: Arc<dyn Subscription> = children.clone();
        state
            .downstream
            .lock()
            .expect("group_by mutex poisoned")
            .on_subscribe(children_as_subscription);

        let key_selector = self.key_selector.clone();
        self.upstream.subscribe(Box::new(UpstreamObserver {
            state,
            key_selector: move |value: &T| key_selector(value),
            children,
        }));
    }
}

/// Partition `source` by `key_selector`, emitting `(key, group)` the
/// first time each key appears. Each group is its own `Source`, hot from
/// the moment of creation, that may only be subscribed to once.
pub fn group_by<T, K, F>(source: BoxSource<T>, key_selector: F) -> BoxSource<(K, BoxSource<T>)>
where
    T: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    Arc::new(GroupBySource {
        upstream: source,
        key_selector: Arc::new(key_selector),
        capacity: DEFAULT_GROUP_BUFFER,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::to_vec;
    use crate::sources::iterable;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn partitions_values_by_key_and_preserves_order_within_a_group() {
        let source = group_by(iterable(vec![1, 2, 3, 4, 5, 6]), |v: &i32| v % 2);
        let groups: Vec<(i32, BoxSource<i32>)> = to_vec(&source).unwrap();

        let collected: Arc<StdMutex<HashMap<i32, Vec<i32>>>> = Arc::new(StdMutex::new(HashMap::new()));
        for (key, group) in groups {
            let collected = collected.clone();
            group.subscribe(Box::new(crate::subscriber::CallbackSubscriber::new(
                move |value| {
                    collected.lock().unwrap().entry(key).or_default().push(value);
                },
                |_| {},
                || {},
            )));
        }
        let collected = collected.lock().unwrap();
        assert_eq!(&vec![1, 3, 5], collected.get(&1).unwrap());
        assert_eq!(&vec![2, 4, 6], collected.get(&0).unwrap());
    }

    #[test]
    fn subscribing_to_a_group_twice_is_a_protocol_violation() {
        let source = group_by(iterable(vec![1]), |_: &i32| 0);
        let groups: Vec<(i32, BoxSource<i32>)> = to_vec(&source).unwrap();
        let (_, group) = groups.into_iter().next().unwrap();

        group.subscribe(Box::new(crate::subscriber::NoopSubscriber));

        let errors = Arc::new(StdMutex::new(0));
        let errors_clone = errors.clone();
        group.subscribe(Box::new(crate::subscriber::CallbackSubscriber::new(
            |_: i32| {},
            move |_| *errors_clone.lock().unwrap() += 1,
            || {},
        )));
        assert_eq!(1, *errors.lock().unwrap());
    }
}
