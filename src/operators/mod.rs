//! The operator engine. `simple` holds the mechanical one-input-one-output
//! operators that exist only as connective tissue; everything else here
//! is one of the operators that make up the hard engineering this crate
//! exists to cover.

pub mod flat_map;
pub mod group_by;
pub mod multicast;
pub mod observe_on;
pub mod simple;
pub mod switch_map;
pub mod time_windowed;
pub mod zip;

pub use flat_map::{flat_map, merge, ErrorMode};
pub use group_by::group_by;
pub use multicast::{cache, publish, replay, ConnectableSource};
pub use observe_on::observe_on;
pub use simple::{cast, do_on_next, filter, map, on_error_return, scan, skip, take, try_map};
pub use switch_map::switch_map;
pub use time_windowed::{
    debounce, sample, skip_last_timed, take_last_timed, throttle_first, throttle_last, throttle_with_timeout, timeout,
};
pub use zip::zip;
