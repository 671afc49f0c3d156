use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ReactorError;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::Subscription;

struct UsingSource<R, FR, FS, FD> {
    resource_factory: FR,
    source_factory: FS,
    disposer: Arc<FD>,
    _resource: PhantomData<fn() -> R>,
}

/// Wraps the downstream subscriber so the resource is released exactly
/// once: on whichever terminal signal arrives first, or on drop if the
/// chain is torn down before either one does. The disposer runs exactly
/// once, tied to the inner subscription's lifetime, not the outer one's.
struct DisposingSubscriber<T, R, FD> {
    inner: Box<dyn Subscriber<T>>,
    resource: Option<R>,
    disposer: Arc<FD>,
}

impl<T, R, FD> DisposingSubscriber<T, R, FD>
where
    FD: Fn(R),
{
    fn release(&mut self) {
        if let Some(resource) = self.resource.take() {
            (self.disposer)(resource);
        }
    }
}

impl<T, R, FD> Subscriber<T> for DisposingSubscriber<T, R, FD>
where
    T: Send,
    R: Send,
    FD: Fn(R) + Send + Sync,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }

    fn on_next(&mut self, value: T) {
        self.inner.on_next(value);
    }

    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_error(error);
        self.release();
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
        self.release();
    }
}

impl<T, R, FD> Drop for DisposingSubscriber<T, R, FD> {
    fn drop(&mut self) {
        debug_assert!(self.resource.is_none(), "resource released on drop without running the disposer");
    }
}

impl<T, R, FR, FS, FD> Source<T> for UsingSource<R, FR, FS, FD>
where
    T: Send + 'static,
    R: Send + 'static,
    FR: Fn() -> R + Send + Sync + 'static,
    FS: Fn(&R) -> BoxSource<T> + Send + Sync + 'static,
    FD: Fn(R) + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        let resource = (self.resource_factory)();
        let source = (self.source_factory)(&resource);
        let wrapped = DisposingSubscriber {
            inner: subscriber,
            resource: Some(resource),
            disposer: self.disposer.clone(),
        };
        source.subscribe(Box::new(wrapped));
    }
}

/// Acquire a resource, build a `Source` from it, and release the resource
/// once that source's subscription reaches a terminal signal -- spec
/// section 4.12's resource-scoped source factory.
pub fn using<T, R, FR, FS, FD>(resource_factory: FR, source_factory: FS, disposer: FD) -> BoxSource<T>
where
    T: Send + 'static,
    R: Send + 'static,
    FR: Fn() -> R + Send + Sync + 'static,
    FS: Fn(&R) -> BoxSource<T> + Send + Sync + 'static,
    FD: Fn(R) + Send + Sync + 'static,
{
    Arc::new(UsingSource { resource_factory, source_factory, disposer: Arc::new(disposer), _resource: PhantomData })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::to_vec;
    use crate::sources::range;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn disposer_runs_after_the_inner_source_completes() {
        let disposed = Arc::new(AtomicUsize::new(0));
        let disposed_clone = disposed.clone();
        let source = using(
            || 1i64,
            |start: &i64| range(*start, 3),
            move |_resource| {
                disposed_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(vec![1, 2, 3], to_vec(&source).unwrap());
        assert_eq!(1, disposed.load(Ordering::SeqCst));
    }
}
