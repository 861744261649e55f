//! Frame length calculators (spec §4.5): the size a message occupies once
//! fragmented into MTU-sized frames, and the size of the payload once
//! those fragments are reassembled.
use crate::metadata::HEADER_LENGTH;

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub fn align(value: i32, alignment: i32) -> i32 {
    (value + (alignment - 1)) & !(alignment - 1)
}

/// Total on-the-wire length of a message of `length` bytes once
/// fragmented into frames of at most `max_payload_size` bytes of payload
/// each, including each fragment's header.
pub fn fragmented_length(length: i32, max_payload_size: i32) -> i32 {
    let full_fragments = length / max_payload_size;
    let remainder = length % max_payload_size;
    let last = if remainder > 0 {
        align(remainder + HEADER_LENGTH as i32, 32)
    } else {
        0
    };
    full_fragments * (max_payload_size + HEADER_LENGTH as i32) + last
}

/// Length of the reassembled message (header plus payload) once `length`
/// bytes have been written in fragments of at most `max_payload_size`.
pub fn assembled_length(length: i32, _max_payload_size: i32) -> i32 {
    HEADER_LENGTH as i32 + length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up_to_multiple() {
        assert_eq!(align(0, 32), 0);
        assert_eq!(align(1, 32), 32);
        assert_eq!(align(32, 32), 32);
        assert_eq!(align(33, 32), 64);
    }

    // S6: fragmentedLength(5000, 1408) == 5152. (n=3, r=776,
    // last=align(776+32,32)=832, total=3*(1408+32)+832=5152.)
    #[test]
    fn s6_fragmented_length_example() {
        assert_eq!(fragmented_length(5000, 1408), 5152);
    }

    // P6: fragmentation round-trip.
    #[test]
    fn p6_assembled_length_is_header_plus_length() {
        for &length in &[0i32, 1, 31, 32, 1407, 1408, 5000, 1 << 20] {
            assert_eq!(assembled_length(length, 1408), HEADER_LENGTH as i32 + length);
        }
    }

    #[test]
    fn p6_fragmented_length_at_least_assembled_length() {
        // L=0 is excluded: an empty message fragments to zero bytes, but
        // assembledLength still counts the bare header, so the inequality
        // does not hold there.
        for &length in &[1i32, 1407, 1408, 1409, 5000, 1 << 20] {
            for &mtu in &[1408i32, 64, 4096] {
                assert!(fragmented_length(length, mtu) >= assembled_length(length, mtu));
            }
        }
    }

    #[test]
    fn fragmented_length_of_exact_multiple_has_no_tail_fragment() {
        // Exactly two full MTU-sized payloads, no remainder fragment.
        assert_eq!(
            fragmented_length(2 * 1408, 1408),
            2 * (1408 + HEADER_LENGTH as i32)
        );
    }
}
