//! `Flow<T>`: a fluent wrapper around a [`BoxSource<T>`]
//! so operator chains read left to right instead of nesting function
//! calls. Every method here just calls the matching free function in
//! `operators` or `consumer` and, for the ones that return another
//! stream, rewraps the result. `Flow` carries no state of its own beyond
//! the wrapped source.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::buffer_policy::BufferPolicy;
use crate::consumer;
use crate::error::ReactorError;
use crate::operators;
use crate::operators::ErrorMode;
use crate::scheduler::Scheduler;
use crate::subscriber::{BoxSource, Source, Subscriber};

/// A stream with a fluent, chainable operator surface. Build one with
/// [`Flow::new`] or [`crate::sources`]' factories already return one
/// where noted; unwrap with [`Flow::into_source`] at any point a plain
/// `BoxSource<T>` is required.
pub struct Flow<T> {
    source: BoxSource<T>,
}

impl<T> Flow<T> {
    pub fn new(source: BoxSource<T>) -> Self {
        Self { source }
    }

    pub fn into_source(self) -> BoxSource<T> {
        self.source
    }
}

impl<T: Send + 'static> Flow<T> {
    pub fn map<U, F>(self, transform: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Flow::new(operators::map(self.source, transform))
    }

    pub fn try_map<U, F>(self, transform: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, ReactorError> + Send + Sync + 'static,
    {
        Flow::new(operators::try_map(self.source, transform))
    }

    pub fn cast<U>(self) -> Flow<U>
    where
        U: From<T> + Send + 'static,
    {
        Flow::new(operators::cast(self.source))
    }

    pub fn filter<F>(self, predicate: F) -> Flow<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Flow::new(operators::filter(self.source, predicate))
    }

    pub fn scan<U, F>(self, seed: U, combine: F) -> Flow<U>
    where
        U: Send + Sync + Clone + 'static,
        F: Fn(&U, T) -> U + Send + Sync + 'static,
    {
        Flow::new(operators::scan(self.source, seed, combine))
    }

    pub fn take(self, count: u64) -> Flow<T> {
        Flow::new(operators::take(self.source, count))
    }

    pub fn skip(self, count: u64) -> Flow<T> {
        Flow::new(operators::skip(self.source, count))
    }

    pub fn on_error_return<F>(self, fallback: F) -> Flow<T>
    where
        F: Fn(ReactorError) -> T + Send + Sync + 'static,
    {
        Flow::new(operators::on_error_return(self.source, fallback))
    }

    pub fn do_on_next<F>(self, effect: F) -> Flow<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Flow::new(operators::do_on_next(self.source, effect))
    }

    pub fn observe_on(self, scheduler: Arc<dyn Scheduler>, prefetch: usize) -> Flow<T> {
        Flow::new(operators::observe_on(self.source, scheduler, prefetch))
    }

    pub fn flat_map<U, F>(self, mapper: F, max_concurrency: Option<usize>, error_mode: ErrorMode) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> BoxSource<U> + Send + Sync + 'static,
    {
        Flow::new(operators::flat_map(self.source, mapper, max_concurrency, error_mode))
    }

    pub fn switch_map<U, F>(self, mapper: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> BoxSource<U> + Send + Sync + 'static,
    {
        Flow::new(operators::switch_map(self.source, mapper))
    }

    pub fn group_by<K, F>(self, key_selector: F) -> Flow<(K, BoxSource<T>)>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Flow::new(operators::group_by(self.source, key_selector))
    }

    pub fn debounce(self, duration: Duration, scheduler: Arc<dyn Scheduler>) -> Flow<T> {
        Flow::new(operators::debounce(self.source, duration, scheduler))
    }

    pub fn throttle_with_timeout(self, duration: Duration, scheduler: Arc<dyn Scheduler>) -> Flow<T> {
        Flow::new(operators::throttle_with_timeout(self.source, duration, scheduler))
    }

    pub fn throttle_first(self, duration: Duration, scheduler: Arc<dyn Scheduler>) -> Flow<T> {
        Flow::new(operators::throttle_first(self.source, duration, scheduler))
    }

    pub fn throttle_last(self, duration: Duration, scheduler: Arc<dyn Scheduler>) -> Flow<T> {
        Flow::new(operators::throttle_last(self.source, duration, scheduler))
    }

    pub fn sample(self, period: Duration, scheduler: Arc<dyn Scheduler>) -> Flow<T> {
        Flow::new(operators::sample(self.source, period, scheduler))
    }

    pub fn timeout(self, duration: Duration, scheduler: Arc<dyn Scheduler>, fallback: Option<BoxSource<T>>) -> Flow<T> {
        Flow::new(operators::timeout(self.source, duration, scheduler, fallback))
    }

    pub fn take_last_timed(self, duration: Duration, scheduler: Arc<dyn Scheduler>) -> Flow<T> {
        Flow::new(operators::take_last_timed(self.source, duration, scheduler))
    }

    pub fn skip_last_timed(self, duration: Duration, scheduler: Arc<dyn Scheduler>) -> Flow<T> {
        Flow::new(operators::skip_last_timed(self.source, duration, scheduler))
    }

    pub fn publish(self) -> operators::ConnectableSource<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        operators::publish(self.source)
    }

    pub fn replay<P>(self, policy: P) -> operators::ConnectableSource<T>
    where
        T: Clone + Send + Sync + 'static,
        P: BufferPolicy<T> + Send + 'static,
    {
        operators::replay(self.source, policy)
    }

    pub fn cache(self) -> Flow<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Flow::new(operators::cache(self.source))
    }

    pub fn subscribe(self, subscriber: Box<dyn Subscriber<T>>) {
        self.source.subscribe(subscriber);
    }

    pub fn block_first(self) -> Result<Option<T>, ReactorError> {
        consumer::block_first(self.source.as_ref())
    }

    pub fn block_last(self) -> Result<Option<T>, ReactorError> {
        consumer::block_last(self.source.as_ref())
    }

    pub fn to_vec(self) -> Result<Vec<T>, ReactorError> {
        consumer::to_vec(self.source.as_ref())
    }
}

/// Zip several flows together positionally. A free function rather than
/// a method since it combines many flows, not one.
pub fn zip<T, U, F>(sources: Vec<Flow<T>>, combiner: F) -> Flow<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
    let sources = sources.into_iter().map(Flow::into_source).collect();
    Flow::new(operators::zip(sources, combiner))
}

/// Interleave several flows into one, completing once all of them have.
pub fn merge<T: Send + 'static>(sources: Vec<Flow<T>>) -> Flow<T> {
    let sources = sources.into_iter().map(Flow::into_source).collect();
    Flow::new(operators::merge(sources, None))
}

impl<T: Send + Sync + 'static> Source<T> for Flow<T> {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<T>>) {
        self.source.subscribe(subscriber);
    }
}

impl<T> From<BoxSource<T>> for Flow<T> {
    fn from(source: BoxSource<T>) -> Self {
        Flow::new(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::range;

    #[test]
    fn chained_operators_read_left_to_right() {
        let values = Flow::new(range(1, 5))
            .filter(|v| v % 2 == 0)
            .map(|v| v * 10)
            .to_vec()
            .unwrap();
        assert_eq!(vec![20, 40], values);
    }

    #[test]
    fn take_and_skip_compose() {
        let values = Flow::new(range(1, 10)).skip(2).take(3).to_vec().unwrap();
        assert_eq!(vec![3, 4, 5], values);
    }

    #[test]
    fn merge_interleaves_every_flow_to_completion() {
        let merged = merge(vec![Flow::new(range(1, 3)), Flow::new(range(10, 3))]);
        let mut values = merged.to_vec().unwrap();
        values.sort_unstable();
        assert_eq!(vec![1, 2, 3, 10, 11, 12], values);
    }

    #[test]
    fn zip_combines_positionally() {
        let zipped = zip(vec![Flow::new(range(1, 3)), Flow::new(range(10, 3))], |values| values[0] + values[1]);
        assert_eq!(vec![11, 13, 15], zipped.to_vec().unwrap());
    }
}
