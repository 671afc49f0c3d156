use std::sync::Arc;

use crate::subscriber::{BoxSource, Source, Subscriber};

struct DeferSource<F> {
    factory: F,
}

impl<T, F> Source<T> for DeferSource<F>
where
    T: Send + 'static,
    F: Fn() -> BoxSource<T> + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        (self.factory)().subscribe(subscriber);
    }
}

/// Build a fresh `Source` by calling `factory` on every subscription,
/// rather than sharing one underlying source across subscribers. Used to
/// capture state (a clock reading, a random seed, a connection) at
/// subscribe time instead of at source-construction time.
pub fn defer<T, F>(factory: F) -> BoxSource<T>
where
    T: Send + 'static,
    F: Fn() -> BoxSource<T> + Send + Sync + 'static,
{
    Arc::new(DeferSource { factory })
}
