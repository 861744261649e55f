//! The raw tail counter: a single 64-bit value packing `(termId,
//! termOffset)` so that both can be read, stored, and compare-and-swapped
//! atomically together.
use std::sync::atomic::{AtomicI64, Ordering};

/// `rawTail = (termId << 32) | termOffset`.
pub fn pack_tail(term_id: i32, term_offset: i32) -> i64 {
    ((term_id as i64) << 32) | (term_offset as u32 as i64)
}

/// The (sign-extending) term id packed into `raw_tail`.
pub fn term_id(raw_tail: i64) -> i32 {
    (raw_tail >> 32) as i32
}

/// The term offset packed into `raw_tail`, saturated at `term_length` so a
/// producer that ran past the end of the term never reports an offset
/// larger than the term itself (I5).
///
/// The low 32 bits are compared as unsigned (spec §4.3's `low32(rawTail)`),
/// not sign-extended, so this stays correct even for a low word `>= 2^31`.
pub fn term_offset(raw_tail: i64, term_length: i32) -> i32 {
    ((raw_tail as u32) as i64).min(term_length as i64) as i32
}

/// A single partition's raw-tail counter, backed by shared mmap'd memory.
///
/// Wraps an `&AtomicI64` rather than owning one: the memory lives in the
/// metadata section of a mapped log buffer file and may be written by a
/// producer in another process.
pub struct RawTail<'a> {
    cell: &'a AtomicI64,
}

impl<'a> RawTail<'a> {
    pub fn new(cell: &'a AtomicI64) -> Self {
        RawTail { cell }
    }

    /// Plain read, for use when no other party can be concurrently
    /// mutating this counter (e.g. during initialisation).
    pub fn read_plain(&self) -> i64 {
        self.cell.load(Ordering::Relaxed)
    }

    /// Acquire-ordered read: observes every store that happened-before the
    /// corresponding `write_release` (I6).
    pub fn read_acquire(&self) -> i64 {
        self.cell.load(Ordering::Acquire)
    }

    /// Plain write, used only while padding out the remainder of a term
    /// the producer is not yet publishing as complete.
    pub fn write_plain(&self, value: i64) {
        self.cell.store(value, Ordering::Relaxed);
    }

    /// Release-ordered write, publishing the end of a term to readers.
    pub fn write_release(&self, value: i64) {
        self.cell.store(value, Ordering::Release);
    }

    /// Compare-and-swap with acquire-release ordering on success, acquire
    /// on failure. Returns whether the swap happened.
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.cell
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;

    // P1: round-trip of packed tail.
    #[test]
    fn p1_pack_unpack_round_trip() {
        let cases: &[(i32, i32)] = &[
            (0, 0),
            (7, 65536),
            (-1, 0),
            (i32::MIN, 0),
            (i32::MAX, i32::MAX),
            (8, 0),
        ];
        for &(t, o) in cases {
            let packed = pack_tail(t, o);
            assert_eq!(term_id(packed), t);
            assert_eq!(packed as u32 as i32, o);
        }
    }

    #[test]
    fn term_offset_saturates_at_term_length() {
        let packed = pack_tail(7, 100_000);
        assert_eq!(term_offset(packed, 65536), 65536);
        let packed = pack_tail(7, 1234);
        assert_eq!(term_offset(packed, 65536), 1234);
    }

    // S1: rawTail[0] = packTail(7, 0) = 0x0000_0007_0000_0000
    #[test]
    fn s1_packed_tail_value() {
        assert_eq!(pack_tail(7, 0), 0x0000_0007_0000_0000u64 as i64);
    }

    #[test]
    fn cas_respects_expected_value() {
        let cell = AtomicI64::new(pack_tail(7, 0));
        let tail = RawTail::new(&cell);
        assert!(!tail.compare_and_set(pack_tail(6, 0), pack_tail(8, 0)));
        assert!(tail.compare_and_set(pack_tail(7, 0), pack_tail(8, 0)));
        assert_eq!(tail.read_acquire(), pack_tail(8, 0));
    }

    // P7: a reader's acquire-load after a writer's release-store observes
    // at least the released value (checked here single-threaded; cross
    // thread behaviour is exercised in tests/rotation.rs).
    #[test]
    fn p7_release_then_acquire_observes_value() {
        let cell = AtomicI64::new(0);
        let tail = RawTail::new(&cell);
        tail.write_release(pack_tail(9, 42));
        assert_eq!(tail.read_acquire(), pack_tail(9, 42));
    }
}
