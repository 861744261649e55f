//! The term rotation protocol (spec §4.4): the only part of the core that
//! mutates more than one field, and the only part with a bounded retry
//! loop.
use std::sync::atomic::{AtomicI32, Ordering};

use crate::position::index_by_term_count;
use crate::tail::{pack_tail, term_id, RawTail};

/// The three per-partition raw-tail counters, addressed by partition
/// index, as used by the rotator and by producers/consumers claiming
/// space.
pub struct RawTails<'a> {
    tails: [RawTail<'a>; 3],
}

impl<'a> RawTails<'a> {
    pub fn new(tails: [RawTail<'a>; 3]) -> Self {
        RawTails { tails }
    }

    pub fn partition(&self, index: i32) -> &RawTail<'a> {
        &self.tails[index as usize]
    }
}

/// Execute the rotation algorithm of spec §4.4 exactly.
///
/// `term_count`/`current_term_id` are the caller's belief about the
/// currently active term; `active_term_count` is the metadata field that
/// gates which partition is "active".
pub fn rotate_term(
    raw_tails: &RawTails<'_>,
    active_term_count: &AtomicI32,
    term_count: i32,
    current_term_id: i32,
) -> bool {
    let next_term_id = current_term_id.wrapping_add(1);
    let next_term_count = (term_count as i64).wrapping_add(1);
    let next_index = index_by_term_count(next_term_count);
    let expected_term_id = next_term_id.wrapping_sub(3);

    let next_tail = raw_tails.partition(next_index);
    loop {
        let raw_tail = next_tail.read_acquire();
        if term_id(raw_tail) != expected_term_id {
            // Another actor already rotated this slot.
            break;
        }

        let updated = pack_tail(next_term_id, 0);
        if next_tail.compare_and_set(raw_tail, updated) {
            #[cfg(feature = "tracing")]
            tracing::debug!(next_term_id, next_index, "rotated term tail");
            break;
        }
        // CAS failed: another actor changed the tail since our read.
        // Retry — the predicate above is false on the very next iteration
        // if that actor's change was the same rotation we're attempting.
    }

    active_term_count
        .compare_exchange(
            term_count,
            next_term_count as i32,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_ok()
}
