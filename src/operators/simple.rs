//! The mechanical one-input-one-output operators: transforms that follow
//! directly from the plain subscriber contract. Kept minimal: just enough
//! connective tissue to write
//! realistic chains (`range(..).map(..).flat_map(..)`) in this crate's
//! own tests for the operators that *are* the point of this crate.
//!
//! Every closure is captured in an `Arc` rather than required to be
//! `Clone`: a `Source` is cold and its `subscribe` may be called many
//! times independently, so each subscription needs its own subscriber
//! state built from the same shared, read-only closure.

use std::sync::Arc;

use crate::error::ReactorError;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::Subscription;

struct SourceAdapter<T, B> {
    source: BoxSource<T>,
    build: B,
}

impl<T, U, B> Source<U> for SourceAdapter<T, B>
where
    T: Send + 'static,
    U: Send + 'static,
    B: Fn(Box<dyn Subscriber<U>>) -> Box<dyn Subscriber<T>> + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Box<dyn Subscriber<U>>) {
        self.source.subscribe((self.build)(subscriber));
    }
}

struct MappingSubscriber<T, U, F> {
    inner: Box<dyn Subscriber<U>>,
    transform: Arc<F>,
    _marker: std::marker::PhantomData<fn(T) -> U>,
}

impl<T, U, F> Subscriber<T> for MappingSubscriber<T, U, F>
where
    T: Send,
    U: Send,
    F: Fn(T) -> Result<U, ReactorError> + Send + Sync,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }

    fn on_next(&mut self, value: T) {
        match (self.transform)(value) {
            Ok(mapped) => self.inner.on_next(mapped),
            Err(error) => self.inner.on_error(error),
        }
    }

    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

/// Transform each value with an infallible mapper.
pub fn map<T, U, F>(source: BoxSource<T>, transform: F) -> BoxSource<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    try_map(source, move |value| Ok(transform(value)))
}

/// Transform each value with a fallible mapper. A mapper error is
/// delivered as `on_error` -- a user callback failure is an error signal,
/// never a panic.
pub fn try_map<T, U, F>(source: BoxSource<T>, transform: F) -> BoxSource<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Result<U, ReactorError> + Send + Sync + 'static,
{
    let transform = Arc::new(transform);
    Arc::new(SourceAdapter {
        source,
        build: move |inner| {
            Box::new(MappingSubscriber { inner, transform: transform.clone(), _marker: std::marker::PhantomData }) as Box<dyn Subscriber<T>>
        },
    })
}

struct FilteringSubscriber<T, F> {
    inner: Box<dyn Subscriber<T>>,
    predicate: Arc<F>,
}

impl<T, F> Subscriber<T> for FilteringSubscriber<T, F>
where
    T: Send,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }
    fn on_next(&mut self, value: T) {
        if (self.predicate)(&value) {
            self.inner.on_next(value);
        }
    }
    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_error(error);
    }
    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

/// Forward only the values for which `predicate` returns `true`.
pub fn filter<T, F>(source: BoxSource<T>, predicate: F) -> BoxSource<T>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    Arc::new(SourceAdapter {
        source,
        build: move |inner| Box::new(FilteringSubscriber { inner, predicate: predicate.clone() }) as Box<dyn Subscriber<T>>,
    })
}

struct ScanningSubscriber<T, U, F> {
    inner: Box<dyn Subscriber<U>>,
    accumulator: U,
    combine: Arc<F>,
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<T, U, F> Subscriber<T> for ScanningSubscriber<T, U, F>
where
    T: Send,
    U: Send + Clone,
    F: Fn(&U, T) -> U + Send + Sync,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }
    fn on_next(&mut self, value: T) {
        self.accumulator = (self.combine)(&self.accumulator, value);
        self.inner.on_next(self.accumulator.clone());
    }
    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_error(error);
    }
    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

/// Emit a running accumulation, starting from `seed`, one value per
/// upstream item (the scan does not emit the seed itself).
pub fn scan<T, U, F>(source: BoxSource<T>, seed: U, combine: F) -> BoxSource<U>
where
    T: Send + 'static,
    U: Send + Sync + Clone + 'static,
    F: Fn(&U, T) -> U + Send + Sync + 'static,
{
    let combine = Arc::new(combine);
    Arc::new(SourceAdapter {
        source,
        build: move |inner| {
            Box::new(ScanningSubscriber { inner, accumulator: seed.clone(), combine: combine.clone(), _marker: std::marker::PhantomData })
                as Box<dyn Subscriber<T>>
        },
    })
}

struct TakeSubscriber<T> {
    inner: Box<dyn Subscriber<T>>,
    remaining: u64,
    subscription: Option<Arc<dyn Subscription>>,
}

impl<T: Send> Subscriber<T> for TakeSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.remaining == 0 {
            subscription.dispose();
            self.inner.on_subscribe(subscription);
            self.inner.on_complete();
            return;
        }
        self.subscription = Some(subscription.clone());
        self.inner.on_subscribe(subscription);
    }

    fn on_next(&mut self, value: T) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        self.inner.on_next(value);
        if self.remaining == 0 {
            if let Some(subscription) = &self.subscription {
                subscription.dispose();
            }
            self.inner.on_complete();
        }
    }

    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

/// Emit at most the first `count` values, then cancel upstream and
/// complete.
pub fn take<T: Send + 'static>(source: BoxSource<T>, count: u64) -> BoxSource<T> {
    Arc::new(SourceAdapter {
        source,
        build: move |inner| Box::new(TakeSubscriber { inner, remaining: count, subscription: None }) as Box<dyn Subscriber<T>>,
    })
}

struct SkipSubscriber<T> {
    inner: Box<dyn Subscriber<T>>,
    remaining: u64,
}

impl<T: Send> Subscriber<T> for SkipSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }
    fn on_next(&mut self, value: T) {
        if self.remaining > 0 {
            self.remaining -= 1;
            return;
        }
        self.inner.on_next(value);
    }
    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_error(error);
    }
    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

/// Drop the first `count` values, then forward everything else.
pub fn skip<T: Send + 'static>(source: BoxSource<T>, count: u64) -> BoxSource<T> {
    Arc::new(SourceAdapter {
        source,
        build: move |inner| Box::new(SkipSubscriber { inner, remaining: count }) as Box<dyn Subscriber<T>>,
    })
}

struct OnErrorReturnSubscriber<T, F> {
    inner: Box<dyn Subscriber<T>>,
    fallback: Arc<F>,
}

impl<T, F> Subscriber<T> for OnErrorReturnSubscriber<T, F>
where
    T: Send,
    F: Fn(ReactorError) -> T + Send + Sync,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }
    fn on_next(&mut self, value: T) {
        self.inner.on_next(value);
    }
    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_next((self.fallback)(error));
        self.inner.on_complete();
    }
    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

/// Recover from an upstream error by substituting a fallback value and
/// completing normally instead of propagating the error.
pub fn on_error_return<T, F>(source: BoxSource<T>, fallback: F) -> BoxSource<T>
where
    T: Send + 'static,
    F: Fn(ReactorError) -> T + Send + Sync + 'static,
{
    let fallback = Arc::new(fallback);
    Arc::new(SourceAdapter {
        source,
        build: move |inner| Box::new(OnErrorReturnSubscriber { inner, fallback: fallback.clone() }) as Box<dyn Subscriber<T>>,
    })
}

struct DoOnNextSubscriber<T, F> {
    inner: Box<dyn Subscriber<T>>,
    effect: Arc<F>,
}

impl<T, F> Subscriber<T> for DoOnNextSubscriber<T, F>
where
    T: Send,
    F: Fn(&T) + Send + Sync,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription);
    }
    fn on_next(&mut self, value: T) {
        (self.effect)(&value);
        self.inner.on_next(value);
    }
    fn on_error(&mut self, error: ReactorError) {
        self.inner.on_error(error);
    }
    fn on_complete(&mut self) {
        self.inner.on_complete();
    }
}

/// Run a side-effecting callback for each value without altering it.
pub fn do_on_next<T, F>(source: BoxSource<T>, effect: F) -> BoxSource<T>
where
    T: Send + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    let effect = Arc::new(effect);
    Arc::new(SourceAdapter {
        source,
        build: move |inner| Box::new(DoOnNextSubscriber { inner, effect: effect.clone() }) as Box<dyn Subscriber<T>>,
    })
}

/// Convert every value with `From`, for when the upstream and downstream
/// item types are convertible.
pub fn cast<T, U>(source: BoxSource<T>) -> BoxSource<U>
where
    T: Send + 'static,
    U: From<T> + Send + 'static,
{
    map(source, U::from)
}
