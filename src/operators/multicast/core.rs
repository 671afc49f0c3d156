//! The shared buffer and per-subscriber cursor that back every operator in
//! this module: an append-only, `ArcSwap`-published
//! buffer the producer rewrites on every item, plus one record per
//! subscriber holding a cursor into that buffer and a `DrainLoop` guarding
//! its own delivery. The producer notifies every record after publishing a
//! new snapshot; each record re-reads the latest snapshot from its own
//! cursor forward, so a subscriber never observes a torn or partial
//! append. Delivery happens straight from the producer's own thread via
//! each record's drain loop rather than through a waker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::buffer_policy::{BufferInstruction, BufferPolicy};
use crate::drain::DrainLoop;
use crate::error::ReactorError;
use crate::hooks;
use crate::subscriber::Subscriber;
use crate::subscription::Subscription;

#[derive(Clone)]
struct Entry<T> {
    id: u64,
    item: T,
}

#[derive(Clone)]
pub(super) enum Terminal {
    Complete,
    Error(ReactorError),
}

struct ProducerState<T> {
    policy: Box<dyn BufferPolicy<T> + Send>,
    next_id: u64,
}

/// The buffer and subscriber registry a `publish`/`replay`/`cache` source
/// shares across every downstream. `replay_on_subscribe` decides whether a
/// new subscriber starts from the earliest still-buffered item (`replay`,
/// `cache`) or only from whatever is produced after it joins (`publish`).
pub(super) struct MulticastCore<T> {
    producer: Mutex<ProducerState<T>>,
    buffer: ArcSwap<VecDeque<Entry<T>>>,
    records: Mutex<Vec<Arc<SubscriberRecord<T>>>>,
    terminal: Mutex<Option<Terminal>>,
    replay_on_subscribe: bool,
}

impl<T: Clone + Send + Sync + 'static> MulticastCore<T> {
    pub(super) fn new(policy: Box<dyn BufferPolicy<T> + Send>, replay_on_subscribe: bool) -> Arc<Self> {
        Arc::new(Self {
            producer: Mutex::new(ProducerState { policy, next_id: 1 }),
            buffer: ArcSwap::from_pointee(VecDeque::new()),
            records: Mutex::new(Vec::new()),
            terminal: Mutex::new(None),
            replay_on_subscribe,
        })
    }

    pub(super) fn push(self: &Arc<Self>, item: T) {
        let mut producer = self.producer.lock().expect("multicast producer mutex poisoned");
        // TODO: this clones the whole retained window on every single item;
        // fine for the buffer sizes this crate expects replay policies to
        // retain, but a batched producer would amortize it across a burst.
        let mut next_queue = VecDeque::new();
        next_queue.clone_from(self.buffer.load().as_ref());
        while let Some(BufferInstruction::Pop) = next_queue.front().map(|tail| producer.policy.buffer_tail_policy(&tail.item)) {
            let mut oldest = next_queue.pop_front().expect("front was just checked present");
            producer.policy.on_after_pop(&mut oldest.item);
        }
        let id = producer.next_id;
        producer.next_id += 1;
        let mut item = item;
        producer.policy.on_before_send(&mut item);
        next_queue.push_back(Entry { id, item });
        self.buffer.store(Arc::new(next_queue));
        drop(producer);
        self.notify_all();
    }

    pub(super) fn push_terminal(self: &Arc<Self>, terminal: Terminal) {
        let mut slot = self.terminal.lock().expect("multicast terminal mutex poisoned");
        if slot.is_some() {
            return;
        }
        *slot = Some(terminal);
        drop(slot);
        self.notify_all();
    }

    fn notify_all(self: &Arc<Self>) {
        let records = self.records.lock().expect("multicast records mutex poisoned").clone();
        for record in records {
            record.mark_and_drain();
        }
    }

    fn remove_record(&self, record: &Arc<SubscriberRecord<T>>) {
        self.records
            .lock()
            .expect("multicast records mutex poisoned")
            .retain(|existing| !Arc::ptr_eq(existing, record));
    }

    pub(super) fn subscribe(self: &Arc<Self>, subscriber: Box<dyn Subscriber<T>>) {
        let initial_cursor = if self.replay_on_subscribe {
            self.buffer
                .load()
                .front()
                .map(|entry| entry.id)
                .unwrap_or_else(|| self.producer.lock().expect("multicast producer mutex poisoned").next_id)
        } else {
            self.producer.lock().expect("multicast producer mutex poisoned").next_id
        };

        let record = Arc::new(SubscriberRecord {
            core: self.clone(),
            cursor: AtomicU64::new(initial_cursor),
            drain: DrainLoop::new(),
            downstream: Mutex::new(subscriber),
            cancelled: AtomicBool::new(false),
            terminal_delivered: AtomicBool::new(false),
        });

        let token: Arc<dyn Subscription> = Arc::new(RecordCancelSubscription { record: record.clone() });
        record.downstream.lock().expect("multicast subscriber mutex poisoned").on_subscribe(token);

        self.records.lock().expect("multicast records mutex poisoned").push(record.clone());
        record.mark_and_drain();
    }
}

struct SubscriberRecord<T> {
    core: Arc<MulticastCore<T>>,
    cursor: AtomicU64,
    drain: DrainLoop,
    downstream: Mutex<Box<dyn Subscriber<T>>>,
    cancelled: AtomicBool,
    terminal_delivered: AtomicBool,
}

impl<T: Clone + Send + 'static> SubscriberRecord<T> {
    fn mark_and_drain(self: &Arc<Self>) {
        if self.drain.mark() {
            self.drain.drain(|| self.drain_once());
        }
    }

    fn drain_once(self: &Arc<Self>) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }

        let snapshot = self.core.buffer.load();
        let cursor = self.cursor.load(Ordering::Acquire);
        if let Some(front) = snapshot.front() {
            let caught_up_cursor = if cursor < front.id { front.id } else { cursor };
            let start = (caught_up_cursor - front.id) as usize;
            for entry in snapshot.iter().skip(start) {
                if self.cancelled.load(Ordering::Acquire) {
                    return;
                }
                self.downstream.lock().expect("multicast subscriber mutex poisoned").on_next(entry.item.clone());
                self.cursor.store(entry.id + 1, Ordering::Release);
            }
        }

        if self.cancelled.load(Ordering::Acquire) || self.terminal_delivered.load(Ordering::Acquire) {
            return;
        }
        let terminal = self.core.terminal.lock().expect("multicast terminal mutex poisoned").clone();
        if let Some(terminal) = terminal {
            if !self.terminal_delivered.swap(true, Ordering::AcqRel) {
                let mut downstream = self.downstream.lock().expect("multicast subscriber mutex poisoned");
                match terminal {
                    Terminal::Complete => downstream.on_complete(),
                    Terminal::Error(error) => {
                        if self.cancelled.load(Ordering::Acquire) {
                            hooks::report_undeliverable(error);
                        } else {
                            downstream.on_error(error);
                        }
                    }
                }
            }
        }
    }
}

struct RecordCancelSubscription<T> {
    record: Arc<SubscriberRecord<T>>,
}

impl<T: Clone + Send + Sync + 'static> Subscription for RecordCancelSubscription<T> {
    fn dispose(&self) {
        if !self.record.cancelled.swap(true, Ordering::AcqRel) {
            self.record.core.remove_record(&self.record);
        }
    }

    fn is_disposed(&self) -> bool {
        self.record.cancelled.load(Ordering::Acquire)
    }
}
