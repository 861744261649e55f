//! Pure arithmetic mapping an absolute stream position to `(term id, term
//! offset)` and back. Every function here is total over its documented
//! domain and has no side effects.
use crate::error::LogBufferError;

/// Smallest permitted term length: 64 KiB.
pub const MIN_TERM_LENGTH: i32 = 1 << 16;
/// Largest permitted term length: 1 GiB.
pub const MAX_TERM_LENGTH: i32 = 1 << 30;

/// Is `term_length` one of the 15 powers of two in `[64 KiB, 1 GiB]`?
pub fn is_permitted_term_length(term_length: i32) -> bool {
    term_length >= MIN_TERM_LENGTH
        && term_length <= MAX_TERM_LENGTH
        && (term_length as u32).is_power_of_two()
}

/// `log2(term_length)`, used to turn a term offset into a shift amount for
/// the position arithmetic below.
///
/// Defined only for the 15 permitted term lengths; any other value is
/// `InvalidArgument`.
pub fn position_bits_to_shift(term_length: i32) -> Result<u32, LogBufferError> {
    if !is_permitted_term_length(term_length) {
        return Err(LogBufferError::InvalidArgument);
    }
    Ok(term_length.trailing_zeros())
}

/// Absolute stream position of `(active_term_id, term_offset)`.
///
/// The term-id delta is computed with a 32-bit *signed* subtraction so
/// that a 32-bit wrap of `active_term_id` past `initial_term_id` produces
/// the natural (small, signed) delta rather than a huge unsigned one.
pub fn compute_position(
    active_term_id: i32,
    term_offset: i32,
    position_bits_to_shift: u32,
    initial_term_id: i32,
) -> i64 {
    let term_count = active_term_id.wrapping_sub(initial_term_id) as i64;
    (term_count << position_bits_to_shift) + term_offset as i64
}

/// Position of offset 0 within `active_term_id`.
pub fn compute_term_begin_position(
    active_term_id: i32,
    position_bits_to_shift: u32,
    initial_term_id: i32,
) -> i64 {
    compute_position(active_term_id, 0, position_bits_to_shift, initial_term_id)
}

/// The term id that `position` falls within.
///
/// `position` is treated as an unsigned bit pattern when shifted (matching
/// Java's `>>>`), then narrowed to 32 bits and added to `initial_term_id`
/// with wrapping semantics so that term-id wrap round-trips correctly.
pub fn compute_term_id_from_position(
    position: i64,
    position_bits_to_shift: u32,
    initial_term_id: i32,
) -> i32 {
    let term_count = ((position as u64) >> position_bits_to_shift) as i32;
    term_count.wrapping_add(initial_term_id)
}

/// Partition index (`0..3`) that `position` falls within.
pub fn index_by_position(position: i64, position_bits_to_shift: u32) -> i32 {
    (((position as u64) >> position_bits_to_shift) % 3) as i32
}

/// Partition index of `term_id`, given the log's `initial_term_id`.
pub fn index_by_term(initial_term_id: i32, term_id: i32) -> i32 {
    let delta = term_id.wrapping_sub(initial_term_id) as i64;
    delta.rem_euclid(3) as i32
}

/// Partition index for a given rotation count since creation.
pub fn index_by_term_count(term_count: i64) -> i32 {
    term_count.rem_euclid(3) as i32
}

/// The partition index that follows `index`.
pub fn next_partition_index(index: i32) -> i32 {
    (index + 1) % 3
}
