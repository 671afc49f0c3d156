//! The plain subscriber/source contract.

use std::sync::Arc;

use crate::error::ReactorError;
use crate::subscription::Subscription;

/// The downstream recipient of a stream's signals.
///
/// `on_subscribe` is called exactly once, synchronously, before any other
/// signal, with the token the subscriber uses to cancel. `on_next`
/// delivers one value. `on_error` delivers a single failure. `on_complete`
/// signals normal end. At most one of `on_error`/`on_complete` is ever
/// delivered; once it has been, the caller must not
/// invoke any method on this subscriber again. Implementations are not
/// required to re-check that on their own end -- the producer side
/// (`SerializedSubscriber`, the terminal latch) is what enforces it.
pub trait Subscriber<T>: Send {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);
    fn on_next(&mut self, value: T);
    fn on_error(&mut self, error: ReactorError);
    fn on_complete(&mut self);
}

/// A factory of streams. One call to `subscribe` yields an independent
/// execution unless the source is explicitly a multicast (see
/// `operators::multicast`).
pub trait Source<T>: Send + Sync {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>);
}

pub type BoxSubscriber<T> = Box<dyn Subscriber<T>>;
pub type BoxSource<T> = Arc<dyn Source<T>>;

/// A `Subscriber` that does nothing. Useful as a placeholder, and for
/// operators (like `using`'s disposer-ordering) that need to observe a
/// terminal signal without forwarding anywhere.
pub struct NoopSubscriber;

impl<T> Subscriber<T> for NoopSubscriber {
    fn on_subscribe(&mut self, _subscription: Arc<dyn Subscription>) {}
    fn on_next(&mut self, _value: T) {}
    fn on_error(&mut self, _error: ReactorError) {}
    fn on_complete(&mut self) {}
}

/// Build a `Subscriber<T>` out of plain closures, for call sites that
/// don't want to define a whole struct: an `onNext`/`onError`/`onComplete`
/// callable set.
pub struct CallbackSubscriber<N, E, C> {
    on_next: N,
    on_error: E,
    on_complete: C,
}

impl<N, E, C> CallbackSubscriber<N, E, C> {
    pub fn new(on_next: N, on_error: E, on_complete: C) -> Self {
        Self {
            on_next,
            on_error,
            on_complete,
        }
    }
}

impl<T, N, E, C> Subscriber<T> for CallbackSubscriber<N, E, C>
where
    N: FnMut(T) + Send,
    E: FnMut(ReactorError) + Send,
    C: FnMut() + Send,
{
    fn on_subscribe(&mut self, _subscription: Arc<dyn Subscription>) {}

    fn on_next(&mut self, value: T) {
        (self.on_next)(value)
    }

    fn on_error(&mut self, error: ReactorError) {
        (self.on_error)(error)
    }

    fn on_complete(&mut self) {
        (self.on_complete)()
    }
}
