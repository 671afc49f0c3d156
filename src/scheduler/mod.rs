//! The scheduler abstraction: an abstract time source and task
//! submission interface. Specific implementations
//! (thread pool, computation pool) are external collaborators; this
//! module carries the trait plus the handful of concrete schedulers
//! needed to exercise and test the operator engine: an immediate
//! (trampoline) scheduler, a dedicated-thread-per-worker scheduler for
//! genuine cross-thread concurrency, and a virtual-time scheduler for
//! deterministic tests of the timed operators.

mod immediate;
pub mod scheduled_runnable;
mod thread_worker;
mod virtual_time;

pub use immediate::ImmediateScheduler;
pub use scheduled_runnable::ScheduledRunnable;
pub use thread_worker::NewThreadScheduler;
pub use virtual_time::VirtualTimeScheduler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::subscription::Subscription;

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Monotonic time since an arbitrary, process-wide epoch. Real scheduler
/// implementations report this; the virtual-time scheduler reports its
/// own advanceable clock instead.
pub fn wall_clock_now() -> Duration {
    process_epoch().elapsed()
}

/// A monotonically increasing counter used to break ties between tasks
/// that share a deadline, preserving submission order within a single
/// worker.
pub(crate) fn next_sequence() -> u64 {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

pub type Task = Box<dyn FnOnce() + Send>;
pub type PeriodicTask = Arc<dyn Fn() + Send + Sync>;

pub trait Scheduler: Send + Sync {
    /// Current time. Units are whatever the scheduler measures in
    /// (real schedulers use `Duration` since their own epoch; the
    /// virtual-time scheduler uses its own logical clock).
    fn now(&self) -> Duration;

    fn create_worker(&self) -> Arc<dyn Worker>;

    fn schedule_direct(&self, task: Task) -> Arc<dyn Subscription> {
        self.create_worker().schedule(task)
    }

    fn schedule_direct_after(&self, task: Task, delay: Duration) -> Arc<dyn Subscription> {
        self.create_worker().schedule_after(task, delay)
    }

    fn schedule_periodically(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> Arc<dyn Subscription> {
        schedule_periodically_on(self.create_worker(), task, initial_delay, period)
    }
}

/// A scheduler-local execution context guaranteeing serial task order.
/// A worker is itself a disposable resource: disposing it cancels every
/// pending task scheduled on it.
pub trait Worker: Subscription {
    fn schedule(&self, task: Task) -> Arc<dyn Subscription>;
    fn schedule_after(&self, task: Task, delay: Duration) -> Arc<dyn Subscription>;
}

/// `Worker::schedule_periodically` is realized generically in terms of
/// `schedule_after`, by having each execution re-arm the next one from
/// inside the task body. The returned token cancels the whole chain:
/// once disposed, the next re-arm sees the flag and stops.
pub fn schedule_periodically_on(
    worker: Arc<dyn Worker>,
    task: PeriodicTask,
    initial_delay: Duration,
    period: Duration,
) -> Arc<dyn Subscription> {
    use crate::subscription::SerialSubscription;

    let holder = Arc::new(SerialSubscription::new());
    arm(worker, task, initial_delay, period, holder.clone());
    holder
}

/// Adapt a `Worker` handle into a plain `Subscription` so it can be
/// stored alongside other tokens in a `CompositeSubscription` -- e.g. an
/// operator that owns a worker for its whole lifetime and wants disposing
/// the operator to dispose the worker too.
pub fn worker_as_subscription(worker: Arc<dyn Worker>) -> Arc<dyn Subscription> {
    struct WorkerSubscription(Arc<dyn Worker>);
    impl Subscription for WorkerSubscription {
        fn dispose(&self) {
            self.0.dispose();
        }
        fn is_disposed(&self) -> bool {
            self.0.is_disposed()
        }
    }
    Arc::new(WorkerSubscription(worker))
}

fn arm(
    worker: Arc<dyn Worker>,
    task: PeriodicTask,
    delay: Duration,
    period: Duration,
    holder: Arc<crate::subscription::SerialSubscription>,
) {
    let worker_for_body = worker.clone();
    let task_for_body = task.clone();
    let holder_for_body = holder.clone();
    let handle = worker.schedule_after(
        Box::new(move || {
            if holder_for_body.is_disposed() {
                return;
            }
            task_for_body();
            if !holder_for_body.is_disposed() {
                arm(worker_for_body, task_for_body.clone(), period, period, holder_for_body.clone());
            }
        }),
        delay,
    );
    holder.set(handle);
}
