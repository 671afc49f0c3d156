use crate::subscriber::BoxSource;

use super::iterable;

/// Emit every element of a fixed array, then complete. A thin, more
/// discoverable name for `iterable` over a `Vec`; kept as a separate
/// factory even though it shares one implementation here.
pub fn array<T: Send + Clone + Sync + 'static>(items: Vec<T>) -> BoxSource<T> {
    iterable(items)
}
