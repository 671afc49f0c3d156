use std::sync::Arc;

use crate::error::ReactorError;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{SimpleSubscription, Subscription};

struct CallableSource<F> {
    supplier: F,
}

impl<T, F> Source<T> for CallableSource<F>
where
    T: Send + 'static,
    F: Fn() -> Result<T, ReactorError> + Send + Sync + 'static,
{
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<T>>) {
        let subscription = Arc::new(SimpleSubscription::new());
        subscriber.on_subscribe(subscription.clone());
        if subscription.is_disposed() {
            return;
        }
        match (self.supplier)() {
            Ok(value) => {
                if subscription.is_disposed() {
                    return;
                }
                subscriber.on_next(value);
                if !subscription.is_disposed() {
                    subscriber.on_complete();
                }
            }
            Err(error) => {
                if !subscription.is_disposed() {
                    subscriber.on_error(error);
                }
            }
        }
    }
}

/// Invoke `supplier` synchronously on each subscription and emit its
/// single result (or its error), then terminate. Unlike `create`, the
/// supplier can't emit more than one value -- it's a bridge from a plain
/// function call into a one-shot stream.
pub fn from_callable<T, F>(supplier: F) -> BoxSource<T>
where
    T: Send + 'static,
    F: Fn() -> Result<T, ReactorError> + Send + Sync + 'static,
{
    Arc::new(CallableSource { supplier })
}
