//! Decides which entry plays after the current one.
//!
//! Indices are dense queue positions. Callers never ask about an empty
//! queue.

use rand::Rng;

use super::types::{LoopMode, QueueOrder};

/// Index of the entry to play after `current`, or `None` once the queue is
/// exhausted.
pub fn next_index(len: usize, current: usize, order: QueueOrder, loop_mode: LoopMode) -> Option<usize> {
    next_index_with(&mut rand::thread_rng(), len, current, order, loop_mode)
}

pub fn next_index_with<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    current: usize,
    order: QueueOrder,
    loop_mode: LoopMode,
) -> Option<usize> {
    debug_assert!(len > 0, "next_index called on an empty queue");
    debug_assert!(current < len, "current index {current} outside queue of {len}");

    if loop_mode == LoopMode::Track {
        return Some(current);
    }

    match order {
        QueueOrder::Normal => {
            if current + 1 < len {
                Some(current + 1)
            } else {
                wrap(loop_mode, 0)
            }
        }
        QueueOrder::Reverse => {
            if current > 0 {
                Some(current - 1)
            } else {
                wrap(loop_mode, len - 1)
            }
        }
        QueueOrder::Random => {
            if len == 1 {
                return Some(current);
            }
            // Draw from the other len - 1 slots and step over `current`.
            let pick = rng.gen_range(0..len - 1);
            Some(if pick >= current { pick + 1 } else { pick })
        }
    }
}

fn wrap(loop_mode: LoopMode, to: usize) -> Option<usize> {
    match loop_mode {
        LoopMode::All => Some(to),
        _ => None,
    }
}
