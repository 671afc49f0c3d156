//! A trampoline scheduler: `schedule` runs its task on whichever thread
//! called it, queuing reentrant submissions (a task that itself calls
//! `schedule` again) rather than recursing, using the same drain-loop
//! primitive the operator engine uses internally. Delayed tasks are
//! realized with a detached timer thread per submission, without
//! requiring any async runtime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::scheduled_runnable::ScheduledRunnable;
use super::{wall_clock_now, Scheduler, Task, Worker};
use crate::drain::DrainLoop;
use crate::subscription::{CompositeSubscription, Subscription};

struct Inner {
    queue: Mutex<VecDeque<Task>>,
    drain: DrainLoop,
    disposed: AtomicBool,
}

impl Inner {
    fn enqueue(self: &Arc<Self>, job: Task) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        self.queue.lock().expect("trampoline mutex poisoned").push_back(job);
        if self.drain.mark() {
            self.drain.drain(|| loop {
                let next = self.queue.lock().expect("trampoline mutex poisoned").pop_front();
                match next {
                    Some(job) => job(),
                    None => break,
                }
            });
        }
    }
}

#[derive(Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn now(&self) -> Duration {
        wall_clock_now()
    }

    fn create_worker(&self) -> Arc<dyn Worker> {
        Arc::new(ImmediateWorker {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                drain: DrainLoop::new(),
                disposed: AtomicBool::new(false),
            }),
            pending: Arc::new(CompositeSubscription::new()),
        })
    }
}

pub struct ImmediateWorker {
    inner: Arc<Inner>,
    pending: Arc<CompositeSubscription>,
}

impl Subscription for ImmediateWorker {
    fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        self.pending.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl Worker for ImmediateWorker {
    fn schedule(&self, task: Task) -> Arc<dyn Subscription> {
        let runnable = ScheduledRunnable::new();
        runnable.set_parent(&self.pending);
        self.pending.add(runnable.clone());

        let for_run = runnable.clone();
        self.inner.enqueue(Box::new(move || {
            if !for_run.is_disposed() {
                task();
            }
            for_run.mark_done();
        }));
        runnable
    }

    fn schedule_after(&self, task: Task, delay: Duration) -> Arc<dyn Subscription> {
        if delay.is_zero() {
            return self.schedule(task);
        }

        let runnable = ScheduledRunnable::new();
        runnable.set_parent(&self.pending);
        self.pending.add(runnable.clone());

        let inner = self.inner.clone();
        let for_thread = runnable.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(delay);
            if for_thread.is_disposed() {
                return;
            }
            let for_run = for_thread.clone();
            inner.enqueue(Box::new(move || {
                if !for_run.is_disposed() {
                    task();
                }
                for_run.mark_done();
            }));
        });
        runnable.set_cancel_handle(Box::new(move || {
            // The timer thread checks `is_disposed` before enqueueing, so
            // there is nothing more to do here than let it run to
            // completion; we don't detach-and-forget, but we also don't
            // block the caller of `dispose()` on the sleep.
            drop(handle);
        }));
        runnable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn reentrant_schedule_runs_after_current_task_not_recursively() {
        let scheduler = ImmediateScheduler;
        let worker = scheduler.create_worker();
        let order = Arc::new(Mutex::new(Vec::new()));

        let worker_clone = worker.clone();
        let order_clone = order.clone();
        worker.schedule(Box::new(move || {
            order_clone.lock().unwrap().push(1);
            let order_inner = order_clone.clone();
            worker_clone.schedule(Box::new(move || {
                order_inner.lock().unwrap().push(2);
            }));
            order_clone.lock().unwrap().push(3);
        }));

        assert_eq!(vec![1, 3, 2], *order.lock().unwrap());
    }

    #[test]
    fn disposing_worker_prevents_pending_task_from_running() {
        let scheduler = ImmediateScheduler;
        let worker = scheduler.create_worker();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let handle = worker.schedule_after(Box::new(move || { ran_clone.fetch_add(1, Ordering::SeqCst); }), Duration::from_millis(50));
        handle.dispose();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(0, ran.load(Ordering::SeqCst));
    }
}
