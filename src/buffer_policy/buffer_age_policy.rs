use std::time::{Duration, Instant};

use super::{BufferInstruction, BufferPolicy};

/// Caps a replay buffer's history by item age rather than count -- the
/// policy behind `replay(Duration)`'s time-windowed history.
#[derive(Debug, Clone, Copy)]
pub struct BufferAgePolicy<T, F> {
    age_limit: Duration,
    get_timestamp: F,
    _phantom: std::marker::PhantomData<T>,
}

impl<T, F: Fn(&T) -> Instant> BufferAgePolicy<T, F> {
    /// `get_timestamp` extracts the moment each item was admitted; once an
    /// item is older than `age_limit`, it is evicted.
    pub fn new(age_limit: Duration, get_timestamp: F) -> Self {
        Self {
            age_limit,
            get_timestamp,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F: Fn(&T) -> Instant> BufferPolicy<T> for BufferAgePolicy<T, F> {
    fn buffer_tail_policy(&mut self, tail_item: &T) -> BufferInstruction {
        if self.age_limit < (self.get_timestamp)(tail_item).elapsed() {
            log::debug!("evicting oldest replay entry: past age limit");
            BufferInstruction::Pop
        } else {
            log::debug!("retaining oldest replay entry: within age limit");
            BufferInstruction::Retain
        }
    }

    fn on_before_send(&mut self, _new_item: &mut T) {
        // No bookkeeping needed.
    }

    fn on_after_pop(&mut self, _popped_item: &mut T) {
        // No bookkeeping needed.
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use crate::buffer_policy::{BufferAgePolicy, BufferInstruction, BufferPolicy};

    #[test]
    fn evicts_once_the_oldest_entry_ages_out() {
        let time = Instant::now();
        let mut policy = BufferAgePolicy::new(Duration::from_secs(1), |_: &usize| time);

        assert_eq!(policy.buffer_tail_policy(&0), BufferInstruction::Retain);

        let time = time - Duration::from_secs(2);
        let mut policy = BufferAgePolicy::new(Duration::from_secs(1), |_: &usize| time);

        assert_eq!(policy.buffer_tail_policy(&0), BufferInstruction::Pop);
    }
}
