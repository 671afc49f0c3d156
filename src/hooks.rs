//! Process-wide configuration: the purge policy for scheduler workers, and
//! the undeliverable-error hook.
//!
//! These knobs are kept in plain atomics rather than behind a mutex, the
//! same way the multicast core keeps its own cross-cutting state (see
//! `operators::multicast`): read far more often than written, so they're
//! modeled the same way. There is exactly one set of these values for
//! the whole process: initialized once at module load, and never rebound
//! after first use except through an explicit test-hook.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::error::ReactorError;

static PURGE_ENABLED: AtomicBool = AtomicBool::new(true);
static PURGE_PERIOD_SECONDS: AtomicU64 = AtomicU64::new(2);

type ErrorHook = dyn Fn(ReactorError) + Send + Sync + 'static;

static ERROR_HOOK: OnceLock<Box<ErrorHook>> = OnceLock::new();

/// Is periodic purging of cancelled-but-unexecuted scheduler tasks enabled?
///
/// As specified, the period is read only after the enable flag is read, so
/// a reader that observes `purge_enabled() == false` should not bother
/// reading `purge_period_seconds()` at all -- that's exactly how
/// implementations backed by a pool should gate their purge timers.
pub fn purge_enabled() -> bool {
    PURGE_ENABLED.load(Ordering::Relaxed)
}

/// Purge cadence in seconds, default 2. Only meaningful when
/// [`purge_enabled`] is true at the time it's read.
pub fn purge_period_seconds() -> u64 {
    PURGE_PERIOD_SECONDS.load(Ordering::Relaxed)
}

/// Override the purge-enabled flag. Intended for process startup or tests;
/// last writer wins.
pub fn set_purge_enabled(enabled: bool) {
    PURGE_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Override the purge cadence. Last writer wins.
pub fn set_purge_period_seconds(seconds: u64) {
    PURGE_PERIOD_SECONDS.store(seconds, Ordering::Relaxed);
}

/// Install the process-wide undeliverable-error hook. Only the first
/// registration sticks -- subsequent calls are ignored, which is the
/// `OnceLock` equivalent of "last writer wins" for a slot that in practice
/// is set exactly once at startup. Returns `false` if a hook was already
/// installed.
pub fn set_error_hook<F>(hook: F) -> bool
where
    F: Fn(ReactorError) + Send + Sync + 'static,
{
    ERROR_HOOK.set(Box::new(hook)).is_ok()
}

/// Report an error that could not be delivered to any subscriber: it
/// arrived after a subscription had already terminated, or was raised
/// inside a flow that had already been cancelled.
///
/// This must never be swallowed silently. If no hook is installed, the
/// default behavior logs at `error` level.
pub fn report_undeliverable(error: ReactorError) {
    match ERROR_HOOK.get() {
        Some(hook) => hook(error),
        None => log::error!("undeliverable error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_defaults() {
        assert!(purge_enabled());
        assert_eq!(2, purge_period_seconds());
    }

    #[test]
    fn purge_overrides_round_trip() {
        set_purge_period_seconds(5);
        assert_eq!(5, purge_period_seconds());
        set_purge_period_seconds(2);
    }
}
