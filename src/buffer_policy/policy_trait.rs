/// What to do with the oldest retained item when a new one is about to
/// join a replay buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferInstruction {
    /// Keep the oldest item.
    Retain,
    /// Evict the oldest item.
    ///
    /// Causes `on_after_pop` to be called with that item. After it runs,
    /// `buffer_tail_policy` is consulted again before the new item is
    /// admitted, so a single incoming item can evict more than one entry.
    Pop,
}

/// Determines when a `replay`/`cache` buffer should evict its oldest
/// retained item.
///
/// Evicting too eagerly leaves a late-subscribing replay consumer with a
/// shorter history than it might expect; never evicting means the buffer
/// grows without bound for the lifetime of the multicast source. This
/// trait lets each call site pick its own tradeoff -- by count, by age,
/// by a caller-defined weight, or some combination via
/// [`crate::buffer_policy::CompositeBufferPolicy`].
pub trait BufferPolicy<T> {
    /// Should the buffer's oldest item be retained or evicted, given a
    /// new item is about to be admitted?
    fn buffer_tail_policy(&mut self, tail_item: &T) -> BufferInstruction;

    /// Called once a new item has been committed to the buffer, before it
    /// becomes visible to subscribers. Policies that track running totals
    /// (count, weight) update their bookkeeping here.
    fn on_before_send(&mut self, new_item: &mut T);

    /// Called once an item has been evicted from the buffer. `popped_item`
    /// is the same item that was passed to `on_before_send` when it was
    /// admitted, handed back so the policy can undo its bookkeeping.
    fn on_after_pop(&mut self, popped_item: &mut T);
}
