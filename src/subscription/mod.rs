//! Subscription tokens.
//!
//! A token is the handle a consumer gets back from `on_subscribe` to
//! request cancellation. Every kind here supports an O(1) disposal check
//! via the shared [`Subscription`] trait, and disposal is always one-way
//! and idempotent.

mod composite;
mod serial;
mod simple;

pub use composite::CompositeSubscription;
pub use serial::SerialSubscription;
pub use simple::SimpleSubscription;

use std::sync::Arc;

/// The handle a consumer uses to cancel a subscription.
///
/// `dispose` is non-blocking and idempotent: calling it
/// twice, or calling it concurrently from two threads, has the same
/// effect as calling it once.
pub trait Subscription: Send + Sync {
    fn dispose(&self);
    fn is_disposed(&self) -> bool;
}

/// A token that is already disposed, and stays that way. Useful as a
/// placeholder before a real upstream subscription exists yet, and for
/// wiring up early-out paths (e.g. `on_subscribe` immediately followed by
/// `on_error` for a source that fails synchronously).
#[derive(Debug, Default)]
pub struct DisposedSubscription;

impl Subscription for DisposedSubscription {
    fn dispose(&self) {}
    fn is_disposed(&self) -> bool {
        true
    }
}

/// A token that never disposes. Used where a subscription is conceptually
/// infallible and uncancellable (e.g. inside tests that poll futures
/// directly rather than going through a real downstream).
#[derive(Debug, Default)]
pub struct NeverSubscription;

impl Subscription for NeverSubscription {
    fn dispose(&self) {}
    fn is_disposed(&self) -> bool {
        false
    }
}

pub fn disposed() -> Arc<dyn Subscription> {
    Arc::new(DisposedSubscription)
}

pub fn never() -> Arc<dyn Subscription> {
    Arc::new(NeverSubscription)
}
