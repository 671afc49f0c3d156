//! Source factories: the concrete `Source<T>`
//! implementations every chain starts from. Each is cold: every call to
//! `subscribe` is an independent execution, re-running the factory's
//! underlying closure or re-iterating its underlying collection.

mod array;
mod callable;
mod create;
mod defer;
mod future;
mod interval;
mod iterable;
mod range;
mod timer;
mod using;

pub use array::array;
pub use callable::from_callable;
pub use create::{create, Emitter};
pub use defer::defer;
pub use future::from_future;
pub use interval::interval;
pub use iterable::iterable;
pub use range::range;
pub use timer::timer;
pub use using::using;
