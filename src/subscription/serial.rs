use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{disposed, Subscription};

/// A holder of a single, swappable child token.
///
/// Used by operators that re-subscribe upstream (`switchMap`, `timeout`'s
/// fallback, `debounce`'s armed timer): replacing the current child
/// disposes the previous one. Disposing the parent disposes whatever
/// child is current, and disposes any future child the instant it's set.
pub struct SerialSubscription {
    disposed: AtomicBool,
    current: Mutex<Option<Arc<dyn Subscription>>>,
}

impl Default for SerialSubscription {
    fn default() -> Self {
        Self {
            disposed: AtomicBool::new(false),
            current: Mutex::new(None),
        }
    }
}

impl SerialSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current child, disposing the one being replaced.
    /// If this serial token is already disposed, the incoming child is
    /// disposed immediately instead of being stored.
    pub fn set(&self, next: Arc<dyn Subscription>) {
        if self.is_disposed() {
            next.dispose();
            return;
        }
        let previous = {
            let mut slot = self.current.lock().expect("subscription mutex poisoned");
            slot.replace(next)
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
        // A dispose() racing with this set() could have flipped `disposed`
        // after our is_disposed() check above but before the swap landed.
        // Re-check and clean up to avoid leaking an active child.
        if self.is_disposed() {
            if let Some(leaked) = self.current.lock().expect("subscription mutex poisoned").take() {
                leaked.dispose();
            }
        }
    }

    /// Drop the current child without disposing the serial token itself.
    pub fn clear(&self) {
        if let Some(previous) = self.current.lock().expect("subscription mutex poisoned").take() {
            previous.dispose();
        }
    }
}

impl Subscription for SerialSubscription {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        if let Some(child) = self.current.lock().expect("subscription mutex poisoned").take() {
            child.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SerialSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSubscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Convenience constructor for an already-disposed serial slot, useful for
/// initializing operator state before the real upstream subscription
/// exists.
pub fn already_disposed_child() -> Arc<dyn Subscription> {
    disposed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SimpleSubscription;

    #[test]
    fn replacing_disposes_previous() {
        let serial = SerialSubscription::new();
        let first = Arc::new(SimpleSubscription::new());
        serial.set(first.clone());
        let second = Arc::new(SimpleSubscription::new());
        serial.set(second.clone());

        assert!(first.is_disposed());
        assert!(!second.is_disposed());
    }

    #[test]
    fn disposing_parent_disposes_current_and_future_children() {
        let serial = SerialSubscription::new();
        let first = Arc::new(SimpleSubscription::new());
        serial.set(first.clone());
        serial.dispose();
        assert!(first.is_disposed());

        let second = Arc::new(SimpleSubscription::new());
        serial.set(second.clone());
        assert!(second.is_disposed());
    }
}
