//! The terminal-event latch: a three-state machine
//! {active, terminating, terminated} guarding the exactly-once delivery of
//! a terminal signal when multiple producers might race to deliver one.

use std::sync::atomic::{AtomicU8, Ordering};

const ACTIVE: u8 = 0;
const TERMINATING: u8 = 1;
const TERMINATED: u8 = 2;

#[derive(Default)]
pub struct TerminalLatch {
    state: AtomicU8,
}

impl TerminalLatch {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ACTIVE),
        }
    }

    /// Attempt to move active -> terminating. Returns `true` if this
    /// caller won the race to deliver the terminal signal; `false` means
    /// a terminal signal is already in flight or done, and this one
    /// should be routed to the global undeliverable-error hook instead:
    /// if multiple terminals race, the first wins and subsequent ones are
    /// routed to a global error handler.
    pub fn begin_terminate(&self) -> bool {
        self.state
            .compare_exchange(ACTIVE, TERMINATING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move terminating -> terminated, after the drainer has flushed
    /// buffered items and emitted the terminal signal.
    pub fn finish_terminate(&self) {
        self.state.store(TERMINATED, Ordering::Release);
    }

    pub fn is_terminated(&self) -> bool {
        self.state.load(Ordering::Acquire) == TERMINATED
    }

    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == ACTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_caller_wins_the_race() {
        let latch = TerminalLatch::new();
        assert!(latch.begin_terminate());
        assert!(!latch.begin_terminate(), "a second terminal must be rejected");
        latch.finish_terminate();
        assert!(latch.is_terminated());
    }
}
