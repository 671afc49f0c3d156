//! Multicast operators: share one upstream subscription among many
//! downstreams instead of re-running it per
//! subscriber. `core` holds the buffer and per-subscriber cursor shared by
//! all three; `connectable` builds `publish`/`replay`/`cache` on top of it.

mod connectable;
mod core;

pub use connectable::{cache, publish, replay, ConnectableSource};
