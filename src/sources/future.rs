use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use futures::future::{select, Either};

use crate::error::ReactorError;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::Subscription;

/// A subscription that, when disposed, sends on a oneshot channel racing
/// against the wrapped future. Dropping the future this way is this
/// adapter's answer to the original system's "cancel the pending future
/// on dispose" contract -- Rust futures have no `cancel()` method, so
/// losing the race and being dropped unpolled is what cancellation means
/// here.
struct CancelOnDispose {
    disposed: AtomicBool,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl Subscription for CancelOnDispose {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(sender) = self.cancel.lock().expect("future source mutex poisoned").take() {
            let _ = sender.send(());
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

struct FutureSource<F> {
    future: Mutex<Option<F>>,
}

impl<T, F> Source<T> for FutureSource<F>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ReactorError>> + Send + 'static,
{
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<T>>) {
        let future = self.future.lock().expect("future source mutex poisoned").take();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let subscription = Arc::new(CancelOnDispose { disposed: AtomicBool::new(false), cancel: Mutex::new(Some(cancel_tx)) });
        subscriber.on_subscribe(subscription.clone());

        let future = match future {
            Some(future) => future,
            None => {
                subscriber.on_error(ReactorError::Protocol("future source can only be subscribed to once"));
                return;
            }
        };

        std::thread::spawn(move || {
            let outcome = futures::executor::block_on(select(Box::pin(future), cancel_rx));
            match outcome {
                Either::Left((result, _)) => match result {
                    Ok(value) => {
                        subscriber.on_next(value);
                        subscriber.on_complete();
                    }
                    Err(error) => subscriber.on_error(error),
                },
                Either::Right(_) => {
                    // Disposed before the future resolved: I3 says the
                    // subscriber simply receives nothing further.
                }
            }
        });
    }
}

/// Adapt a single `Future` into a one-shot `Source` that emits its output
/// and completes, or forwards its error. Can only be subscribed to once;
/// a second subscription gets a protocol error, since the future itself
/// is consumed on first poll.
pub fn from_future<T, F>(future: F) -> BoxSource<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ReactorError>> + Send + 'static,
{
    Arc::new(FutureSource { future: Mutex::new(Some(future)) })
}
