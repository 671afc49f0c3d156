mod spsc_linked_array;

pub use spsc_linked_array::{spsc_linked_array, SpscConsumer, SpscProducer};
