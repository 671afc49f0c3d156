//! The single-producer/single-consumer linked-array queue.
//!
//! A bounded ring segment that, instead of rejecting items when full,
//! allocates a successor segment and links to it. The producer and
//! consumer each own a cursor into the segment chain and never contend
//! with each other on the same memory except at a segment boundary, where
//! the handoff is mediated by [`arc_swap::ArcSwapOption`].
//!
//! This queue is itself built from `crossbeam_queue::ArrayQueue` segments
//! rather than hand-rolled unsafe cells: each segment already gives us a
//! lookahead optimization (avoiding a cache-line bounce on every element
//! by batching index reads), so there is nothing for this module to
//! reimplement there.
//!
//! The producer and consumer halves are separate owned types -- following
//! the `Sender`/`SenderStream` split in `sender.rs` -- so the single-writer
//! and single-reader invariants are enforced by Rust's ownership model
//! (the halves are `Send` but not `Clone`) rather than by a runtime check.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam_queue::ArrayQueue;

struct Segment<T> {
    ring: ArrayQueue<T>,
    next: ArcSwapOption<Segment<T>>,
}

impl<T> Segment<T> {
    fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity),
            next: ArcSwapOption::from(None),
        }
    }
}

/// Create a linked pair of queue halves. `capacity` is rounded up to the
/// next power of two, and is the fixed size of every segment in the chain
/// (the chain grows by adding more segments of this size, not by resizing
/// one).
pub fn spsc_linked_array<T: Send>(capacity: usize) -> (SpscProducer<T>, SpscConsumer<T>) {
    let segment_capacity = capacity.max(1).next_power_of_two();
    let first = Arc::new(Segment::new(segment_capacity));
    let len = Arc::new(AtomicUsize::new(0));
    (
        SpscProducer {
            current: first.clone(),
            segment_capacity,
            len: len.clone(),
        },
        SpscConsumer {
            current: first,
            peeked: None,
            len,
        },
    )
}

/// The write half. Only one thread may call [`SpscProducer::offer`] /
/// [`SpscProducer::offer_pair`] at a time; enforced by this type simply
/// not being `Clone`.
pub struct SpscProducer<T> {
    current: Arc<Segment<T>>,
    segment_capacity: usize,
    len: Arc<AtomicUsize>,
}

impl<T> SpscProducer<T> {
    /// Publish one value. Never blocks and never fails: if the current
    /// segment is full, a successor segment is allocated and linked.
    pub fn offer(&mut self, value: T) {
        if let Err(value) = self.current.ring.push(value) {
            self.grow_and_push_one(value);
        } else {
            self.len.fetch_add(1, Ordering::Release);
        }
    }

    /// Publish two values atomically with respect to the segment
    /// boundary: either both land in the current segment, or a new
    /// segment is allocated that holds both.
    pub fn offer_pair(&mut self, first: T, second: T) {
        let has_room_for_both = self.current.ring.len() + 2 <= self.current.ring.capacity();
        if has_room_for_both {
            let _ = self.current.ring.push(first);
            let _ = self.current.ring.push(second);
            self.len.fetch_add(2, Ordering::Release);
            return;
        }

        let next = Arc::new(Segment::new(self.segment_capacity));
        let _ = next.ring.push(first);
        let _ = next.ring.push(second);
        self.current.next.store(Some(next.clone()));
        self.current = next;
        self.len.fetch_add(2, Ordering::Release);
    }

    /// Best-effort length, shared with the consumer half: accurate only
    /// up to in-flight concurrent activity.
    pub fn len_hint(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    fn grow_and_push_one(&mut self, value: T) {
        let next = Arc::new(Segment::new(self.segment_capacity));
        let _ = next.ring.push(value);
        self.current.next.store(Some(next.clone()));
        self.current = next;
        self.len.fetch_add(1, Ordering::Release);
    }
}

/// The read half. Only one thread may call [`SpscConsumer::poll`] /
/// [`SpscConsumer::peek`] at a time.
pub struct SpscConsumer<T> {
    current: Arc<Segment<T>>,
    peeked: Option<T>,
    len: Arc<AtomicUsize>,
}

impl<T> SpscConsumer<T> {
    /// Remove and return the next value, or `None` if the queue is
    /// currently empty.
    pub fn poll(&mut self) -> Option<T> {
        let value = match self.peeked.take() {
            Some(value) => Some(value),
            None => self.pop_raw(),
        };
        if value.is_some() {
            self.len.fetch_sub(1, Ordering::Release);
        }
        value
    }

    /// Look at the next value without removing it.
    pub fn peek(&mut self) -> Option<&T> {
        if self.peeked.is_none() {
            self.peeked = self.pop_raw();
        }
        self.peeked.as_ref()
    }

    /// Drain everything currently available.
    pub fn clear(&mut self) {
        while self.poll().is_some() {}
    }

    pub fn is_empty(&mut self) -> bool {
        self.peek().is_none()
    }

    /// Best-effort length; see the producer half's `len_hint`.
    pub fn len_hint(&self) -> usize {
        self.len.load(Ordering::Relaxed) + usize::from(self.peeked.is_some())
    }

    fn pop_raw(&mut self) -> Option<T> {
        loop {
            if let Some(value) = self.current.ring.pop() {
                return Some(value);
            }
            // This segment is drained. If the producer has linked a
            // successor, follow it -- it can only have done so because
            // this segment was full at the time, so there is nothing left
            // to find here.
            match self.current.next.load_full() {
                Some(next) => self.current = next,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_within_and_across_segments() {
        let (mut producer, mut consumer) = spsc_linked_array::<i32>(4);
        for i in 0..10 {
            producer.offer(i);
        }
        let drained: Vec<i32> = std::iter::from_fn(|| consumer.poll()).collect();
        assert_eq!((0..10).collect::<Vec<_>>(), drained);
    }

    #[test]
    fn peek_does_not_consume() {
        let (mut producer, mut consumer) = spsc_linked_array::<&str>(2);
        producer.offer("a");
        assert_eq!(Some(&"a"), consumer.peek());
        assert_eq!(Some(&"a"), consumer.peek());
        assert_eq!(Some("a"), consumer.poll());
        assert_eq!(None, consumer.peek());
    }

    #[test]
    fn offer_pair_keeps_both_in_same_segment_when_room_exists() {
        let (mut producer, mut consumer) = spsc_linked_array::<i32>(4);
        producer.offer(0);
        producer.offer_pair(1, 2);
        assert_eq!(vec![0, 1, 2], std::iter::from_fn(|| consumer.poll()).collect::<Vec<_>>());
    }

    #[test]
    fn offer_pair_spills_to_new_segment_together() {
        let (mut producer, mut consumer) = spsc_linked_array::<i32>(2);
        producer.offer(0);
        producer.offer(1); // segment (capacity 2) now full
        producer.offer_pair(2, 3); // must not split across the boundary
        assert_eq!(vec![0, 1, 2, 3], std::iter::from_fn(|| consumer.poll()).collect::<Vec<_>>());
    }

    #[test]
    fn clear_drains_everything() {
        let (mut producer, mut consumer) = spsc_linked_array::<i32>(4);
        for i in 0..20 {
            producer.offer(i);
        }
        consumer.clear();
        assert!(consumer.is_empty());
        assert_eq!(None, consumer.poll());
    }

    #[test]
    fn len_hint_tracks_outstanding_items() {
        let (mut producer, mut consumer) = spsc_linked_array::<i32>(4);
        producer.offer(1);
        producer.offer(2);
        assert_eq!(2, producer.len_hint());
        consumer.poll();
        assert_eq!(1, consumer.len_hint());
    }

    #[test]
    fn cross_thread_producer_consumer_preserves_order() {
        let (mut producer, mut consumer) = spsc_linked_array::<usize>(8);
        let handle = std::thread::spawn(move || {
            for i in 0..5000 {
                producer.offer(i);
            }
        });
        let mut received = Vec::with_capacity(5000);
        while received.len() < 5000 {
            if let Some(v) = consumer.poll() {
                received.push(v);
            }
        }
        handle.join().expect("producer thread panicked");
        assert_eq!((0..5000).collect::<Vec<_>>(), received);
    }
}
