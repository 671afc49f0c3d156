use std::sync::Arc;
use std::time::Duration;

use crate::scheduler::Scheduler;
use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{SerialSubscription, Subscription};

struct TimerSource {
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl Source<i64> for TimerSource {
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<i64>>) {
        let serial = Arc::new(SerialSubscription::new());
        let to_pass: Arc<dyn Subscription> = serial.clone();
        subscriber.on_subscribe(to_pass);

        let worker = self.scheduler.create_worker();
        let handle = worker.schedule_after(
            Box::new(move || {
                subscriber.on_next(0);
                subscriber.on_complete();
            }),
            self.delay,
        );
        serial.set(handle);
    }
}

/// Emit `0` once, after `delay`, then complete.
pub fn timer(delay: Duration, scheduler: Arc<dyn Scheduler>) -> BoxSource<i64> {
    Arc::new(TimerSource { delay, scheduler })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::VirtualTimeScheduler;
    use std::sync::Mutex;

    #[test]
    fn fires_once_after_the_delay_elapses() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let source = timer(Duration::from_secs(1), scheduler);
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        source.subscribe(Box::new(crate::subscriber::CallbackSubscriber::new(
            move |value| log_clone.lock().unwrap().push(value),
            |_| {},
            || {},
        )));

        assert!(log.lock().unwrap().is_empty());
        vt.advance_by(Duration::from_secs(1));
        assert_eq!(vec![0], *log.lock().unwrap());
    }

    struct CapturingSubscriber {
        fired: Arc<Mutex<bool>>,
        subscription: Arc<Mutex<Option<Arc<dyn Subscription>>>>,
    }

    impl crate::subscriber::Subscriber<i64> for CapturingSubscriber {
        fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
            *self.subscription.lock().unwrap() = Some(subscription);
        }
        fn on_next(&mut self, _value: i64) {
            *self.fired.lock().unwrap() = true;
        }
        fn on_error(&mut self, _error: crate::error::ReactorError) {}
        fn on_complete(&mut self) {}
    }

    #[test]
    fn disposing_before_the_delay_prevents_firing() {
        let vt = VirtualTimeScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(vt.clone());
        let source = timer(Duration::from_secs(1), scheduler);
        let fired = Arc::new(Mutex::new(false));
        let subscription = Arc::new(Mutex::new(None));

        source.subscribe(Box::new(CapturingSubscriber { fired: fired.clone(), subscription: subscription.clone() }));
        subscription.lock().unwrap().as_ref().unwrap().dispose();
        vt.advance_by(Duration::from_secs(1));
        assert!(!*fired.lock().unwrap());
    }
}
