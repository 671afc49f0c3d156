use std::sync::{Arc, Mutex};

use crate::error::ReactorError;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{SimpleSubscription, Subscription};
use crate::terminal_latch::TerminalLatch;

/// The handle `create`'s producer closure emits through. Each method
/// checks the subscription's disposal state first: an emitter attempting
/// to signal after cancellation is a no-op, not an error.
pub struct Emitter<T> {
    downstream: Arc<Mutex<Box<dyn Subscriber<T>>>>,
    subscription: Arc<SimpleSubscription>,
    latch: Arc<TerminalLatch>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            downstream: self.downstream.clone(),
            subscription: self.subscription.clone(),
            latch: self.latch.clone(),
        }
    }
}

impl<T> Emitter<T> {
    pub fn is_cancelled(&self) -> bool {
        self.subscription.is_disposed()
    }

    pub fn on_next(&self, value: T) {
        if self.is_cancelled() || !self.latch.is_active() {
            return;
        }
        self.downstream.lock().expect("emitter mutex poisoned").on_next(value);
    }

    pub fn on_error(&self, error: ReactorError) {
        if self.is_cancelled() || !self.latch.begin_terminate() {
            return;
        }
        self.downstream.lock().expect("emitter mutex poisoned").on_error(error);
        self.latch.finish_terminate();
    }

    pub fn on_complete(&self) {
        if self.is_cancelled() || !self.latch.begin_terminate() {
            return;
        }
        self.downstream.lock().expect("emitter mutex poisoned").on_complete();
        self.latch.finish_terminate();
    }
}

struct CreateSource<F> {
    producer: F,
}

impl<T, F> Source<T> for CreateSource<F>
where
    T: Send + 'static,
    F: Fn(Emitter<T>) + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let subscription = Arc::new(SimpleSubscription::new());
        let downstream = Arc::new(Mutex::new(subscriber));
        downstream
            .lock()
            .expect("emitter mutex poisoned")
            .on_subscribe(subscription.clone());

        let emitter = Emitter { downstream, subscription, latch: Arc::new(TerminalLatch::new()) };
        (self.producer)(emitter);
    }
}

/// Build a `Source` from a producer closure given direct, imperative
/// control over emission through an [`Emitter`] -- the escape hatch for
/// wrapping callback-based APIs that don't fit the other factories.
pub fn create<T, F>(producer: F) -> BoxSource<T>
where
    T: Send + 'static,
    F: Fn(Emitter<T>) + Send + Sync + 'static,
{
    Arc::new(CreateSource { producer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::to_vec;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emitter_forwards_values_and_completion() {
        let source = create(|emitter: Emitter<i32>| {
            emitter.on_next(1);
            emitter.on_next(2);
            emitter.on_complete();
        });
        assert_eq!(vec![1, 2], to_vec(&source).unwrap());
    }

    #[test]
    fn emission_after_completion_is_silently_ignored() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let source = create(move |emitter: Emitter<i32>| {
            emitter.on_next(1);
            emitter.on_complete();
            emitter.on_next(2); // must be dropped, not delivered
            seen_clone.store(1, Ordering::SeqCst);
        });
        assert_eq!(vec![1], to_vec(&source).unwrap());
        assert_eq!(1, seen.load(Ordering::SeqCst));
    }
}
