//! `publish`, `replay`, and `cache`: share one upstream subscription among
//! many downstreams via a [`MulticastCore`]. `publish`
//! and `replay` return a [`ConnectableSource`] -- subscribing registers a
//! downstream but does not start the upstream; `connect` does that
//! exactly once, and its returned token tears the upstream connection
//! down. `cache` connects automatically the first time anyone subscribes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::core::{MulticastCore, Terminal};
use crate::buffer_policy::{BufferLengthPolicy, BufferPolicy};
use crate::error::ReactorError;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{SerialSubscription, Subscription};

struct UpstreamObserver<T> {
    core: Arc<MulticastCore<T>>,
    token: Arc<SerialSubscription>,
}

impl<T: Clone + Send + Sync + 'static> Subscriber<T> for UpstreamObserver<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.token.set(subscription);
    }

    fn on_next(&mut self, value: T) {
        self.core.push(value);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.core.push_terminal(Terminal::Error(error));
    }

    fn on_complete(&mut self) {
        self.core.push_terminal(Terminal::Complete);
    }
}

/// A multicast source that shares one upstream subscription once
/// [`connect`](ConnectableSource::connect) is called, no matter how many
/// times [`subscribe`](Source::subscribe) runs before or after.
pub struct ConnectableSource<T> {
    core: Arc<MulticastCore<T>>,
    upstream: BoxSource<T>,
    connected: Arc<AtomicBool>,
    upstream_token: Arc<SerialSubscription>,
}

impl<T: Clone + Send + Sync + 'static> ConnectableSource<T> {
    fn new(upstream: BoxSource<T>, policy: Box<dyn BufferPolicy<T> + Send>, replay_on_subscribe: bool) -> Self {
        Self {
            core: MulticastCore::new(policy, replay_on_subscribe),
            upstream,
            connected: Arc::new(AtomicBool::new(false)),
            upstream_token: Arc::new(SerialSubscription::new()),
        }
    }

    /// Subscribe to the upstream exactly once, no matter how many times
    /// this is called. Returns a token that tears down that one shared
    /// subscription; disposing it does not affect already-registered
    /// downstreams, which simply stop receiving further items.
    pub fn connect(&self) -> Arc<dyn Subscription> {
        if !self.connected.swap(true, Ordering::AcqRel) {
            self.upstream.subscribe(Box::new(UpstreamObserver {
                core: self.core.clone(),
                token: self.upstream_token.clone(),
            }));
        }
        self.upstream_token.clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Source<T> for ConnectableSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        self.core.subscribe(subscriber);
    }
}

/// Share `source` among every downstream: each subscriber receives only
/// items emitted after it subscribes, missing anything emitted earlier,
/// and sees nothing at all until [`connect`](ConnectableSource::connect)
/// is called.
pub fn publish<T: Clone + Send + Sync + 'static>(source: BoxSource<T>) -> ConnectableSource<T> {
    ConnectableSource::new(source, Box::new(BufferLengthPolicy::new(0)), false)
}

/// Share `source` among every downstream, buffering items per `policy` so
/// each new subscriber starts from the earliest still-retained item and is
/// then fed live. Nothing is produced until `connect` is called.
pub fn replay<T, P>(source: BoxSource<T>, policy: P) -> ConnectableSource<T>
where
    T: Clone + Send + Sync + 'static,
    P: BufferPolicy<T> + Send + 'static,
{
    ConnectableSource::new(source, Box::new(policy), true)
}

struct CacheSource<T> {
    connectable: Arc<ConnectableSource<T>>,
}

impl<T: Clone + Send + Sync + 'static> Source<T> for CacheSource<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        self.connectable.subscribe(subscriber);
        self.connectable.connect();
    }
}

/// Replay every item forever, connecting to `source` automatically on the
/// first subscription rather than requiring an explicit `connect` call.
pub fn cache<T: Clone + Send + Sync + 'static>(source: BoxSource<T>) -> BoxSource<T> {
    let connectable = Arc::new(replay(source, BufferLengthPolicy::new(usize::MAX)));
    Arc::new(CacheSource { connectable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::to_vec;
    use crate::sources::{create, iterable, Emitter};
    use crate::subscriber::CallbackSubscriber;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn publish_only_delivers_items_emitted_after_each_subscriber_joins() {
        let emitter_slot: Arc<std::sync::Mutex<Option<Emitter<i32>>>> = Arc::new(std::sync::Mutex::new(None));
        let emitter_slot_setter = emitter_slot.clone();
        let upstream = create(move |emitter: Emitter<i32>| *emitter_slot_setter.lock().unwrap() = Some(emitter));
        let shared = publish(upstream);

        let first = Arc::new(StdMutex::new(Vec::new()));
        let first_clone = first.clone();
        shared.subscribe(Box::new(CallbackSubscriber::new(move |v| first_clone.lock().unwrap().push(v), |_| {}, || {})));
        shared.connect();

        let emit = |v: i32| emitter_slot.lock().unwrap().as_ref().unwrap().on_next(v);
        emit(1);

        let second = Arc::new(StdMutex::new(Vec::new()));
        let second_clone = second.clone();
        shared.subscribe(Box::new(CallbackSubscriber::new(move |v| second_clone.lock().unwrap().push(v), |_| {}, || {})));

        emit(2);
        emit(3);

        assert_eq!(vec![1, 2, 3], *first.lock().unwrap());
        assert_eq!(vec![2, 3], *second.lock().unwrap());
    }

    #[test]
    fn replay_feeds_late_subscribers_from_the_retained_window() {
        let shared = replay(iterable(vec![1, 2, 3, 4]), BufferLengthPolicy::new(2));
        shared.connect();

        let values = to_vec(&shared).unwrap();
        // Only the last 2 items survive the bounded replay policy.
        assert_eq!(vec![3, 4], values);
    }

    #[test]
    fn cache_connects_automatically_and_replays_everything() {
        let source = cache(iterable(vec![1, 2, 3]));
        assert_eq!(vec![1, 2, 3], to_vec(&source).unwrap());
        // A second, later subscriber still sees the full cached history.
        assert_eq!(vec![1, 2, 3], to_vec(&source).unwrap());
    }
}
