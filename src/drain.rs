//! The queue-drain pattern.
//!
//! Used by every operator that has a single logical consumer but
//! potentially many concurrent producers -- including self-reentry, where
//! the producer calling in is the same logical thread that's already
//! draining. An atomic work-in-progress counter decides, without any
//! lock, which caller is responsible for the drain loop.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A mutual-exclusion token for the drain loop. Not a lock: callers that
/// lose the race to become the drainer don't block, they just return --
/// their work will be picked up by whichever caller *is* draining.
#[derive(Default)]
pub struct DrainLoop {
    wip: AtomicUsize,
}

impl DrainLoop {
    pub const fn new() -> Self {
        Self {
            wip: AtomicUsize::new(0),
        }
    }

    /// Register one unit of pending work. Returns `true` if the caller
    /// must now run the drain body itself (the drain role was free), or
    /// `false` if another thread is already draining and will observe
    /// this caller's work on its next pass.
    pub fn mark(&self) -> bool {
        self.wip.fetch_add(1, Ordering::AcqRel) == 0
    }

    /// Run `body` for as long as producers keep marking work during the
    /// run. `body` should process everything currently observable and
    /// then return; this function takes care of looping again if more
    /// work arrived while `body` was running, and exiting the drain role
    /// cleanly otherwise.
    pub fn drain(&self, mut body: impl FnMut()) {
        let mut missed = 1usize;
        loop {
            body();
            let previous = self.wip.fetch_sub(missed, Ordering::AcqRel);
            let remaining = previous - missed;
            if remaining == 0 {
                break;
            }
            missed = remaining;
        }
    }
}
