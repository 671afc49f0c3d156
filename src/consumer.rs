//! Blocking terminal consumers: thin adapters that bridge the push
//! protocol to conventional call/return code, scoped in as connective
//! tissue rather than a full blocking-iterator surface. Each of these
//! parks the calling thread on a
//! condition variable until the stream reaches a terminal signal, then
//! returns a plain `Result` -- no iterator, no async runtime required.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::ReactorError;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::Subscription;

struct Outcome<T> {
    values: Vec<T>,
    error: Option<ReactorError>,
    done: bool,
}

struct BlockingSubscriber<T> {
    state: Arc<(Mutex<Outcome<T>>, Condvar)>,
    subscription: Arc<Mutex<Option<Arc<dyn Subscription>>>>,
    stop_after_first: bool,
}

impl<T: Send> Subscriber<T> for BlockingSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock().expect("blocking consumer mutex poisoned") = Some(subscription);
    }

    fn on_next(&mut self, value: T) {
        let (lock, cvar) = &*self.state;
        let mut outcome = lock.lock().expect("blocking consumer mutex poisoned");
        outcome.values.push(value);
        if self.stop_after_first {
            outcome.done = true;
            cvar.notify_all();
            drop(outcome);
            if let Some(subscription) = self.subscription.lock().expect("blocking consumer mutex poisoned").take() {
                subscription.dispose();
            }
        }
    }

    fn on_error(&mut self, error: ReactorError) {
        let (lock, cvar) = &*self.state;
        let mut outcome = lock.lock().expect("blocking consumer mutex poisoned");
        outcome.error = Some(error);
        outcome.done = true;
        cvar.notify_all();
    }

    fn on_complete(&mut self) {
        let (lock, cvar) = &*self.state;
        let mut outcome = lock.lock().expect("blocking consumer mutex poisoned");
        outcome.done = true;
        cvar.notify_all();
    }
}

fn run_blocking<T: Send + 'static>(source: &BoxSource<T>, stop_after_first: bool) -> Arc<(Mutex<Outcome<T>>, Condvar)> {
    let state = Arc::new((
        Mutex::new(Outcome { values: Vec::new(), error: None, done: false }),
        Condvar::new(),
    ));
    let subscriber = BlockingSubscriber {
        state: state.clone(),
        subscription: Arc::new(Mutex::new(None)),
        stop_after_first,
    };
    source.subscribe(Box::new(subscriber));

    let (lock, cvar) = &*state;
    let guard = lock.lock().expect("blocking consumer mutex poisoned");
    drop(
        cvar.wait_while(guard, |outcome| !outcome.done)
            .expect("blocking consumer mutex poisoned"),
    );
    state
}

/// Block until the first value arrives (or a terminal signal), then
/// dispose the subscription. Returns `Ok(None)` if the stream completed
/// without emitting.
pub fn block_first<T: Send + 'static>(source: &BoxSource<T>) -> Result<Option<T>, ReactorError> {
    let state = run_blocking(source, true);
    let mut outcome = state.0.lock().expect("blocking consumer mutex poisoned");
    if let Some(error) = outcome.error.take() {
        return Err(error);
    }
    Ok(if outcome.values.is_empty() { None } else { Some(outcome.values.remove(0)) })
}

/// Block until the stream's terminal signal, returning the last value
/// seen (or `None` if it completed having emitted nothing).
pub fn block_last<T: Send + 'static>(source: &BoxSource<T>) -> Result<Option<T>, ReactorError> {
    let state = run_blocking(source, false);
    let mut outcome = state.0.lock().expect("blocking consumer mutex poisoned");
    if let Some(error) = outcome.error.take() {
        return Err(error);
    }
    Ok(outcome.values.pop())
}

/// Block until the stream's terminal signal, collecting every value
/// emitted along the way.
pub fn to_vec<T: Send + 'static>(source: &BoxSource<T>) -> Result<Vec<T>, ReactorError> {
    let state = run_blocking(source, false);
    let mut outcome = state.0.lock().expect("blocking consumer mutex poisoned");
    if let Some(error) = outcome.error.take() {
        return Err(error);
    }
    Ok(std::mem::take(&mut outcome.values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources;

    #[test]
    fn block_first_returns_the_first_value_and_cancels_upstream() {
        let source = sources::range(1, 5);
        let value = block_first(&source).unwrap();
        assert_eq!(Some(1), value);
    }

    #[test]
    fn block_last_returns_the_final_value() {
        let source = sources::range(1, 5);
        let value = block_last(&source).unwrap();
        assert_eq!(Some(5), value);
    }

    #[test]
    fn to_vec_collects_everything_in_order() {
        let source = sources::range(1, 5);
        let values = to_vec(&source).unwrap();
        assert_eq!(vec![1, 2, 3, 4, 5], values);
    }

    #[test]
    fn empty_source_yields_none_not_an_error() {
        let source = sources::iterable(Vec::<i32>::new());
        assert_eq!(None, block_first(&source).unwrap());
        assert_eq!(None, block_last(&source).unwrap());
        assert!(to_vec(&source).unwrap().is_empty());
    }
}
