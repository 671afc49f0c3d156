use std::sync::Arc;

use crate::subscriber::{BoxSource, Source, Subscriber};
use crate::subscription::{SimpleSubscription, Subscription};

struct IterableSource<I> {
    items: I,
}

impl<T, I> Source<T> for IterableSource<I>
where
    T: Send + 'static,
    I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
{
    fn subscribe(&self, mut subscriber: Box<dyn Subscriber<T>>) {
        let subscription = Arc::new(SimpleSubscription::new());
        subscriber.on_subscribe(subscription.clone());
        for item in self.items.clone() {
            if subscription.is_disposed() {
                return;
            }
            subscriber.on_next(item);
        }
        if !subscription.is_disposed() {
            subscriber.on_complete();
        }
    }
}

/// Emit every element of `items`, in order, then complete. Re-iterates
/// the collection on every independent subscription.
pub fn iterable<T, I>(items: I) -> BoxSource<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
{
    Arc::new(IterableSource { items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::to_vec;

    #[test]
    fn emits_every_element_in_order() {
        let source = iterable(vec![1, 2, 3]);
        assert_eq!(vec![1, 2, 3], to_vec(&*source).unwrap());
    }

    #[test]
    fn empty_collection_completes_without_emitting() {
        let source = iterable(Vec::<i32>::new());
        assert!(to_vec(&*source).unwrap().is_empty());
    }

    #[test]
    fn each_subscription_re_iterates_independently() {
        let source = iterable(vec!["a", "b"]);
        assert_eq!(to_vec(&*source).unwrap(), to_vec(&*source).unwrap());
    }
}
