//! `ScheduledRunnable`: the task wrapper returned by
//! every `schedule*` call. A two-slot atomic container holding a parent
//! composite back-reference and a cancel handle for the underlying
//! scheduler future, with states {pending, done, disposed} transitioned
//! by compare-and-swap so a `dispose()` racing with the task body
//! finishing can't double-report or leak either slot.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::subscription::{CompositeSubscription, Subscription};

const PENDING: u8 = 0;
const DONE: u8 = 1;
const DISPOSED: u8 = 2;

/// A cancel callback for whatever underlying timer primitive armed this
/// task (a thread's sleep being interrupted, a heap entry being dropped,
/// a virtual-time schedule being removed).
pub type CancelHandle = Box<dyn FnOnce() + Send>;

pub struct ScheduledRunnable {
    state: AtomicU8,
    parent: Mutex<Option<Weak<CompositeSubscription>>>,
    cancel: Mutex<Option<CancelHandle>>,
}

impl ScheduledRunnable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(PENDING),
            parent: Mutex::new(None),
            cancel: Mutex::new(None),
        })
    }

    /// Attach the cancel handle once the underlying timer/thread exists.
    /// If `dispose()` already ran by the time this is called, the handle
    /// is invoked immediately instead of being stored.
    pub fn set_cancel_handle(self: &Arc<Self>, cancel: CancelHandle) {
        if self.is_disposed() {
            cancel();
            return;
        }
        let previous = self.cancel.lock().expect("scheduled runnable mutex poisoned").replace(cancel);
        debug_assert!(previous.is_none(), "cancel handle set twice");
        if self.is_disposed() {
            if let Some(cancel) = self.cancel.lock().expect("scheduled runnable mutex poisoned").take() {
                cancel();
            }
        }
    }

    /// Register the parent composite this task was added to, so disposal
    /// can deregister cleanly: a weak back-reference avoids a retain cycle
    /// between the composite and its own members.
    pub fn set_parent(self: &Arc<Self>, parent: &Arc<CompositeSubscription>) {
        *self.parent.lock().expect("scheduled runnable mutex poisoned") = Some(Arc::downgrade(parent));
    }

    /// Called by the worker immediately after the task body returns.
    /// A no-op if `dispose()` already won the race.
    pub fn mark_done(self: &Arc<Self>) {
        let _ = self
            .state
            .compare_exchange(PENDING, DONE, Ordering::AcqRel, Ordering::Acquire);
        self.deregister_from_parent();
    }

    fn deregister_from_parent(self: &Arc<Self>) {
        if let Some(parent) = self
            .parent
            .lock()
            .expect("scheduled runnable mutex poisoned")
            .take()
            .and_then(|weak| weak.upgrade())
        {
            let as_member: Arc<dyn Subscription> = self.clone();
            parent.remove(&as_member);
        }
    }
}

impl Subscription for ScheduledRunnable {
    fn dispose(&self) {
        let won = self
            .state
            .compare_exchange(PENDING, DISPOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !won {
            return; // already done or already disposed; dispose is idempotent.
        }
        if let Some(cancel) = self.cancel.lock().expect("scheduled runnable mutex poisoned").take() {
            cancel();
        }
    }

    fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) != PENDING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispose_before_run_prevents_mark_done_from_reverting_state() {
        let runnable = ScheduledRunnable::new();
        runnable.dispose();
        runnable.mark_done(); // races in, but dispose already won
        assert!(runnable.is_disposed());
    }

    #[test]
    fn cancel_handle_set_after_dispose_runs_immediately() {
        let runnable = ScheduledRunnable::new();
        runnable.dispose();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_clone = ran.clone();
        runnable.set_cancel_handle(Box::new(move || ran_clone.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn done_then_dispose_does_not_invoke_cancel_twice() {
        let runnable = ScheduledRunnable::new();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_clone = calls.clone();
        runnable.set_cancel_handle(Box::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        runnable.mark_done();
        runnable.dispose();
        assert_eq!(0, calls.load(Ordering::SeqCst), "a task that finished normally never needed cancellation");
    }
}
