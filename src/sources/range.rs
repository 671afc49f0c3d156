use std::sync::Arc;

use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{SimpleSubscription, Subscription};

struct RangeSource {
    start: i64,
    count: u64,
}

impl Source<i64> for RangeSource {
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<i64>>) {
        let subscription = Arc::new(SimpleSubscription::new());
        subscriber.on_subscribe(subscription.clone());
        for offset in 0..self.count {
            if subscription.is_disposed() {
                return;
            }
            subscriber.on_next(self.start + offset as i64);
        }
        if !subscription.is_disposed() {
            subscriber.on_complete();
        }
    }
}

/// Emit `count` consecutive integers starting at `start`, then complete.
pub fn range(start: i64, count: u64) -> BoxSource<i64> {
    Arc::new(RangeSource { start, count })
}
