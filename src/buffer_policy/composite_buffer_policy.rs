use super::{BufferInstruction, BufferPolicy};

/// Joins two eviction policies, e.g. a length cap and an age cap on the
/// same `replay` buffer.
///
/// Retains an item only if both policies agree to retain it. The upper
/// policy is checked first; if it says to pop, the lower policy is never
/// consulted for that round.
#[derive(Debug, Clone, Copy)]
pub struct CompositeBufferPolicy<T, U> {
    pub(super) upper: T,
    pub(super) lower: U,
}

impl<T, PUpper, PLower> BufferPolicy<T> for CompositeBufferPolicy<PUpper, PLower>
where
    PUpper: BufferPolicy<T>,
    PLower: BufferPolicy<T>,
{
    fn buffer_tail_policy(&mut self, tail_item: &T) -> BufferInstruction {
        match self.upper.buffer_tail_policy(tail_item) {
            BufferInstruction::Retain => {
                log::debug!("upper policy retains: checking lower policy");
                match self.lower.buffer_tail_policy(tail_item) {
                    BufferInstruction::Retain => {
                        log::debug!("lower policy retains: composite retains");
                        BufferInstruction::Retain
                    }
                    BufferInstruction::Pop => {
                        log::debug!("lower policy evicts: composite evicts");
                        BufferInstruction::Pop
                    }
                }
            }
            BufferInstruction::Pop => {
                log::debug!("upper policy evicts: composite evicts");
                BufferInstruction::Pop
            }
        }
    }

    fn on_before_send(&mut self, new_item: &mut T) {
        self.upper.on_before_send(new_item);
        self.lower.on_before_send(new_item);
    }

    fn on_after_pop(&mut self, popped_item: &mut T) {
        self.upper.on_after_pop(popped_item);
        self.lower.on_after_pop(popped_item);
    }
}

/// Extension trait for composing buffer policies with `.wrap(...)`.
pub trait BufferPolicyExtension<T, PLower>
where
    PLower: BufferPolicy<T>,
    Self: Sized,
{
    /// Layer `self` above `lower`: an item is retained only if both agree
    /// to retain it.
    fn wrap(self, lower: PLower) -> CompositeBufferPolicy<Self, PLower>;
}

impl<T, PUpper, PLower> BufferPolicyExtension<T, PLower> for PUpper
where
    PUpper: BufferPolicy<T>,
    PLower: BufferPolicy<T>,
{
    fn wrap(self, lower: PLower) -> CompositeBufferPolicy<PUpper, PLower> {
        CompositeBufferPolicy { upper: self, lower }
    }
}
