//! The serialized subscriber wrapper: accepts
//! concurrent `on_next`/`on_error`/`on_complete` calls from multiple
//! emitters (including self-reentry) and serializes them onto one
//! downstream subscriber, using the queue-drain pattern from `drain.rs`
//! and the three-state latch from `terminal_latch.rs` to guarantee
//! exactly-once terminal delivery.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use crate::drain::DrainLoop;
use crate::error::ReactorError;
use crate::hooks;
use crate::subscriber::Subscriber;
use crate::subscription::Subscription;
use crate::terminal_latch::TerminalLatch;

/// Whether an error should cut the queue short (discarding anything
/// queued behind it) or wait for already-queued items to drain first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// An error jumps to the front of the queue and anything behind it is
    /// dropped: once failed, stop delivering.
    FastFail,
    /// An error is appended to the back of the queue: everything already
    /// queued is still delivered first, then the error.
    DelayError,
}

enum Event<T> {
    Next(T),
    Error(ReactorError),
    Complete,
}

pub struct SerializedSubscriber<T> {
    downstream: Mutex<Box<dyn Subscriber<T>>>,
    queue: Mutex<VecDeque<Event<T>>>,
    drain: DrainLoop,
    latch: TerminalLatch,
    mode: ErrorMode,
}

impl<T: Send + 'static> SerializedSubscriber<T> {
    pub fn new(downstream: Box<dyn Subscriber<T>>, mode: ErrorMode) -> Self {
        Self {
            downstream: Mutex::new(downstream),
            queue: Mutex::new(VecDeque::new()),
            drain: DrainLoop::new(),
            latch: TerminalLatch::new(),
            mode,
        }
    }

    /// Forwarded directly: `on_subscribe` happens exactly once before any
    /// concurrent activity can occur, so it needs no serialization.
    pub fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.downstream
            .lock()
            .expect("serialized subscriber mutex poisoned")
            .on_subscribe(subscription);
    }

    pub fn on_next(&self, value: T) {
        if !self.latch.is_active() {
            return; // I3: a terminal is in flight or done; discard.
        }
        {
            self.queue
                .lock()
                .expect("serialized subscriber mutex poisoned")
                .push_back(Event::Next(value));
        }
        self.mark_and_drain();
    }

    pub fn on_error(&self, error: ReactorError) {
        if !self.latch.begin_terminate() {
            hooks::report_undeliverable(error);
            return;
        }
        {
            let mut queue = self.queue.lock().expect("serialized subscriber mutex poisoned");
            match self.mode {
                ErrorMode::FastFail => {
                    queue.clear();
                    queue.push_front(Event::Error(error));
                }
                ErrorMode::DelayError => queue.push_back(Event::Error(error)),
            }
        }
        self.mark_and_drain();
    }

    pub fn on_complete(&self) {
        if !self.latch.begin_terminate() {
            return; // a terminal already happened; a second complete is simply swallowed.
        }
        {
            self.queue
                .lock()
                .expect("serialized subscriber mutex poisoned")
                .push_back(Event::Complete);
        }
        self.mark_and_drain();
    }

    fn mark_and_drain(&self) {
        if self.drain.mark() {
            self.drain.drain(|| self.drain_once());
        }
    }

    fn drain_once(&self) {
        loop {
            let event = {
                self.queue
                    .lock()
                    .expect("serialized subscriber mutex poisoned")
                    .pop_front()
            };
            match event {
                Some(Event::Next(value)) => {
                    if self.latch.is_terminated() {
                        continue; // I3: terminal landed while this was queued; discard.
                    }
                    self.downstream
                        .lock()
                        .expect("serialized subscriber mutex poisoned")
                        .on_next(value);
                }
                Some(Event::Error(error)) => {
                    self.downstream
                        .lock()
                        .expect("serialized subscriber mutex poisoned")
                        .on_error(error);
                    self.latch.finish_terminate();
                }
                Some(Event::Complete) => {
                    self.downstream
                        .lock()
                        .expect("serialized subscriber mutex poisoned")
                        .on_complete();
                    self.latch.finish_terminate();
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::NoopSubscriber;
    use crate::subscription::never;
    use std::sync::Mutex as StdMutex;

    struct RecordingSubscriber {
        events: Arc<StdMutex<Vec<String>>>,
    }

    impl Subscriber<i32> for RecordingSubscriber {
        fn on_subscribe(&mut self, _subscription: Arc<dyn Subscription>) {}
        fn on_next(&mut self, value: i32) {
            self.events.lock().unwrap().push(format!("next({value})"));
        }
        fn on_error(&mut self, error: ReactorError) {
            self.events.lock().unwrap().push(format!("error({error})"));
        }
        fn on_complete(&mut self) {
            self.events.lock().unwrap().push("complete".to_string());
        }
    }

    #[test]
    fn delivers_in_order_and_terminal_is_final() {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let recorder = Box::new(RecordingSubscriber { events: events.clone() });
        let serialized = SerializedSubscriber::new(recorder, ErrorMode::FastFail);
        serialized.on_subscribe(never());

        serialized.on_next(1);
        serialized.on_next(2);
        serialized.on_complete();
        serialized.on_next(3); // must be discarded: terminal already delivered

        assert_eq!(
            vec!["next(1)", "next(2)", "complete"],
            *events.lock().unwrap()
        );
    }

    #[test]
    fn fast_fail_drops_values_queued_behind_the_error() {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let recorder = Box::new(RecordingSubscriber { events: events.clone() });
        let serialized = Arc::new(SerializedSubscriber::new(recorder, ErrorMode::FastFail));
        serialized.on_subscribe(never());

        // Hold the drain role open by marking from inside on_next via a
        // reentrant call, simulating a second producer racing in.
        serialized.on_next(1);
        serialized.on_error(ReactorError::User("boom".into()));

        let seen = events.lock().unwrap();
        assert_eq!("next(1)", seen[0]);
        assert!(seen[1].starts_with("error("));
        assert_eq!(2, seen.len());
    }

    #[test]
    fn second_terminal_is_routed_to_the_undeliverable_hook_not_downstream() {
        let serialized = SerializedSubscriber::new(Box::new(NoopSubscriber), ErrorMode::DelayError);
        serialized.on_subscribe(never());
        serialized.on_complete();
        // A second on_error after a completed subscription must not panic
        // and must not reach the downstream subscriber (NoopSubscriber
        // would accept it silently either way, but this exercises the
        // early-return path rather than the queue).
        serialized.on_error(ReactorError::User("late".into()));
    }
}
