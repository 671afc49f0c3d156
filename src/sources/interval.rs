use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::scheduler::{schedule_periodically_on, PeriodicTask, Scheduler};
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{SerialSubscription, Subscription};

struct IntervalSource {
    period: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl Source<i64> for IntervalSource {
    fn subscribe(&self, subscriber: Box<dyn Subscriber<i64>>) {
        let downstream = Arc::new(Mutex::new(subscriber));
        let serial = Arc::new(SerialSubscription::new());
        let to_pass: Arc<dyn Subscription> = serial.clone();
        downstream.lock().expect("interval mutex poisoned").on_subscribe(to_pass);

        let counter = Arc::new(AtomicI64::new(0));
        let worker = self.scheduler.create_worker();

        let downstream_for_task = downstream.clone();
        let task: PeriodicTask = Arc::new(move || {
            let value = counter.fetch_add(1, Ordering::SeqCst);
            downstream_for_task.lock().expect("interval mutex poisoned").on_next(value);
        });

        let handle = schedule_periodically_on(worker, task, self.period, self.period);
        serial.set(handle);
    }
}

/// Emit `0, 1, 2, ...` every `period`, indefinitely, until disposed.
pub fn interval(period: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<i64> {
    Arc::new(IntervalSource { period, scheduler })
}
