use std::fmt;

/// The error taxonomy that can travel downstream through `on_error`.
///
/// Every variant here corresponds to one of the error classes in the
/// signal protocol: a user callback failing, a required value being
/// absent, a protocol violation (double `on_subscribe`, signal after
/// terminal), a backpressure violation, a `timeout` firing, or several
/// errors collapsed together under a delay-error policy.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ReactorError {
    /// Raised when a user-supplied mapper, predicate, or combiner returns
    /// an error instead of a value.
    #[error("user callback failed: {0}")]
    User(String),

    /// Raised when an operator's transform would produce an absent value
    /// where a real value is required downstream.
    #[error("null signal: {0}")]
    NullSignal(&'static str),

    /// A violation of the `onSubscribe (onNext)* (onComplete | onError)?`
    /// grammar: a second `on_subscribe`, an `on_next` after terminal, or
    /// similar. These are not silently accepted; see `hooks::report_undeliverable`.
    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    /// A bounded buffer rejected an item on a backpressured path.
    #[error("queue overflow: capacity {capacity} exceeded")]
    QueueOverflow { capacity: usize },

    /// Synthetic error raised by the `timeout` operator when the
    /// inter-arrival deadline elapses with no fallback configured.
    #[error("timed out waiting {0:?} for the next signal")]
    Timeout(std::time::Duration),

    /// Several failures collapsed into one under a delay-error policy.
    #[error("{} error(s) occurred: {}", .0.len(), .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Composite(Vec<ReactorError>),
}

impl ReactorError {
    /// Flatten nested composites and fold a set of errors raised under a
    /// delay-error policy into a single value suitable for `on_error`.
    ///
    /// Returns `None` if `errors` is empty, the error itself if there is
    /// exactly one, and `Composite` otherwise.
    pub fn fold(mut errors: Vec<ReactorError>) -> Option<ReactorError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ReactorError::Composite(errors)),
        }
    }

    pub fn user<E: fmt::Display>(e: E) -> Self {
        ReactorError::User(e.to_string())
    }
}
