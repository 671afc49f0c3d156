use std::sync::atomic::{AtomicBool, Ordering};

use super::Subscription;

/// The simplest possible token: one atomic boolean. `dispose` sets it,
/// `is_disposed` reads it. This is the leaf building block every other
/// subscription kind is made from.
#[derive(Debug, Default)]
pub struct SimpleSubscription {
    disposed: AtomicBool,
}

impl SimpleSubscription {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Subscription for SimpleSubscription {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
