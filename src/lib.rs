//! A push-based reactive streams runtime: the subscription/signal
//! protocol, an SPSC linked-array queue, a scheduler/worker abstraction,
//! and the operator engine built on top of them.
//!
//! # About
//! This crate is not a `Stream`/`Future` adapter layer. Signals travel
//! through plain synchronous method calls -- `on_subscribe`, `on_next`,
//! `on_error`, `on_complete` -- the same grammar used by the reactive
//! streams families this crate's operators are named after. There is no
//! polling and no executor; a chain runs on whatever thread calls
//! `subscribe`, plus whatever threads its `Scheduler`s hand work to.
//!
//! This project does not use `unsafe` code directly. Reputable
//! dependencies like `arc-swap` and `crossbeam-queue` are used here,
//! which internally do have unsafe code.
//!
//! # Details
//! The signal protocol is the contract every piece here is built
//! around: `onSubscribe (onNext)* (onComplete | onError)?`, delivered
//! FIFO per subscriber, with at most one terminal signal ever delivered
//! and nothing delivered after disposal. A handful of building blocks
//! enforce that contract so operators don't each have to:
//!
//! 1. [`subscriber::Subscriber`] / [`subscriber::Source`] -- the push
//!    contract itself.
//! 2. [`serialized::SerializedSubscriber`] -- serializes concurrent
//!    callers (multiple emitting threads, timer callbacks) onto one
//!    downstream without ever holding a lock across a downstream call.
//! 3. [`scheduler::Scheduler`] / [`scheduler::Worker`] -- where and when
//!    scheduled work runs; `observe_on` and the timed operators are
//!    built entirely in terms of this trait, not any concrete executor.
//! 4. [`operators`] -- the operator engine: `observe_on`, `flat_map`/
//!    `merge`, `switch_map`, `group_by`, `zip`, the timed operators, and
//!    `publish`/`replay`/`cache`.
//! 5. [`flow::Flow`] -- a fluent wrapper so chains read left to right.
//!
//! ## Serialization
//! [`serialized::SerializedSubscriber`] lets any number of callers share
//! one `Arc` and race to become the sole drainer of a queue via
//! [`drain::DrainLoop`]. Whichever caller wins drains everything queued
//! -- including items queued by callers that arrived while it was
//! draining -- then hands the baton back, so the downstream is always
//! called from exactly one thread at a time with no lock held across
//! the call.
//!
//! ## Multicast
//! [`operators::publish`], [`operators::replay`], and [`operators::cache`]
//! share one upstream subscription across many downstreams via an
//! `ArcSwap`-published buffer and a per-subscriber cursor, with delivery
//! happening straight from the producer's own call stack through each
//! subscriber's drain loop, without a waker.
//!
//! # Examples
//! ```
//! use reactor_core::consumer::to_vec;
//! use reactor_core::sources::range;
//! use reactor_core::Flow;
//!
//! let values = Flow::new(range(1, 5)).filter(|v| v % 2 == 0).map(|v| v * 10).to_vec().unwrap();
//! assert_eq!(vec![20, 40], values);
//! ```

pub mod buffer_policy;
pub mod consumer;
pub mod drain;
pub mod error;
mod flow;
pub mod hooks;
pub mod operators;
pub mod queue;
pub mod scheduler;
pub mod serialized;
pub mod sources;
pub mod subscriber;
pub mod subscription;
pub mod terminal_latch;

pub use error::ReactorError;
pub use flow::{merge, zip, Flow};
pub use subscriber::{BoxSource, BoxSubscriber, Source, Subscriber};
