//! A scheduler whose workers each own a dedicated OS thread (spec
//! section 4.4's "genuine concurrency" scheduler, used to exercise
//! `observeOn`/`flatMap` across real thread boundaries rather than a
//! trampoline). Pending tasks for a worker are held in a min-heap keyed
//! by `(deadline, sequence)`, so two tasks submitted with the same delay
//! run in submission order -- invariant I4.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::scheduled_runnable::ScheduledRunnable;
use super::{next_sequence, wall_clock_now, Scheduler, Task, Worker};
use crate::subscription::{CompositeSubscription, Subscription};

struct Entry {
    deadline: Instant,
    sequence: u64,
    job: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest deadline.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct SharedState {
    heap: BinaryHeap<Entry>,
    disposed: bool,
}

struct Shared {
    state: Mutex<SharedState>,
    wake: Condvar,
}

#[derive(Default, Clone, Copy)]
pub struct NewThreadScheduler;

impl Scheduler for NewThreadScheduler {
    fn now(&self) -> Duration {
        wall_clock_now()
    }

    fn create_worker(&self) -> Arc<dyn Worker> {
        let shared = Arc::new(Shared {
            state: Mutex::new(SharedState { heap: BinaryHeap::new(), disposed: false }),
            wake: Condvar::new(),
        });

        let thread_shared = shared.clone();
        std::thread::spawn(move || run_worker_thread(thread_shared));

        Arc::new(ThreadWorker { shared, pending: Arc::new(CompositeSubscription::new()) })
    }
}

fn run_worker_thread(shared: Arc<Shared>) {
    loop {
        let mut state = shared.state.lock().expect("thread worker mutex poisoned");
        loop {
            if state.disposed {
                return;
            }
            match state.heap.peek() {
                None => {
                    state = shared.wake.wait(state).expect("thread worker mutex poisoned");
                }
                Some(entry) => {
                    let now = Instant::now();
                    let deadline = entry.deadline;
                    if deadline <= now {
                        break;
                    }
                    let (guard, _timeout) = shared
                        .wake
                        .wait_timeout(state, deadline - now)
                        .expect("thread worker mutex poisoned");
                    state = guard;
                }
            }
        }
        let entry = state.heap.pop().expect("peeked entry vanished under the lock");
        drop(state);
        (entry.job)();
    }
}

pub struct ThreadWorker {
    shared: Arc<Shared>,
    pending: Arc<CompositeSubscription>,
}

impl Subscription for ThreadWorker {
    fn dispose(&self) {
        let mut state = self.shared.state.lock().expect("thread worker mutex poisoned");
        state.disposed = true;
        state.heap.clear();
        drop(state);
        self.shared.wake.notify_all();
        self.pending.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.shared.state.lock().expect("thread worker mutex poisoned").disposed
    }
}

impl Worker for ThreadWorker {
    fn schedule(&self, task: Task) -> Arc<dyn Subscription> {
        self.schedule_after(task, Duration::ZERO)
    }

    fn schedule_after(&self, task: Task, delay: Duration) -> Arc<dyn Subscription> {
        let runnable = ScheduledRunnable::new();
        runnable.set_parent(&self.pending);
        self.pending.add(runnable.clone());

        if self.is_disposed() {
            runnable.dispose();
            return runnable;
        }

        let for_run = runnable.clone();
        let entry = Entry {
            deadline: Instant::now() + delay,
            sequence: next_sequence(),
            job: Box::new(move || {
                if !for_run.is_disposed() {
                    task();
                }
                for_run.mark_done();
            }),
        };

        let mut state = self.shared.state.lock().expect("thread worker mutex poisoned");
        if state.disposed {
            drop(state);
            runnable.dispose();
            return runnable;
        }
        state.heap.push(entry);
        drop(state);
        self.shared.wake.notify_all();

        let shared_for_cancel = self.shared.clone();
        runnable.set_cancel_handle(Box::new(move || {
            // The heap entry's own `is_disposed` check at run time makes this
            // a no-op to remove eagerly; we just wake the thread so a
            // now-stale entry at the head doesn't delay a disposed worker.
            shared_for_cancel.wake.notify_all();
        }));
        runnable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tasks_with_equal_delay_run_in_submission_order() {
        let scheduler = NewThreadScheduler;
        let worker = scheduler.create_worker();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (lock, cvar) = (Mutex::new(0usize), Condvar::new());
        let done = Arc::new((lock, cvar));

        for i in 0..5 {
            let order = order.clone();
            let done = done.clone();
            worker.schedule(Box::new(move || {
                order.lock().unwrap().push(i);
                if i == 4 {
                    *done.0.lock().unwrap() = 1;
                    done.1.notify_all();
                }
            }));
        }

        let guard = done.0.lock().unwrap();
        let _ = cvar_wait(&done.1, guard);
        assert_eq!(vec![0, 1, 2, 3, 4], *order.lock().unwrap());
    }

    fn cvar_wait<'a>(cvar: &Condvar, guard: std::sync::MutexGuard<'a, usize>) -> std::sync::MutexGuard<'a, usize> {
        cvar.wait_timeout_while(guard, Duration::from_secs(5), |done| *done == 0)
            .expect("thread worker test mutex poisoned")
            .0
    }

    #[test]
    fn runs_on_a_thread_other_than_the_caller() {
        let scheduler = NewThreadScheduler;
        let worker = scheduler.create_worker();
        let caller = std::thread::current().id();
        let observed = Arc::new(Mutex::new(None));
        let observed_clone = observed.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        worker.schedule(Box::new(move || {
            *observed_clone.lock().unwrap() = Some(std::thread::current().id());
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let deadline = Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_ne!(Some(caller), *observed.lock().unwrap());
    }
}
