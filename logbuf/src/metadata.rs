//! Typed, atomically-ordered access to the metadata section (spec §4.2,
//! §6). `MetadataLayout` reproduces the offset table bit-exactly — other
//! processes, possibly written in other languages, map the same file and
//! must see the same bytes at the same offsets.
use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU8, Ordering};

use crate::error::LogBufferError;
use crate::tail::{pack_tail, RawTail};

/// Length of the metadata section: the minimum page size (I1).
pub const METADATA_LENGTH: usize = 4096;

/// Length of the reserved default-header slot (§4.6): twice the largest
/// header this core expects to ever store, to leave room for growth
/// without relayout.
pub const DEFAULT_HEADER_SLOT_LENGTH: usize = 128;

/// Size, in bytes, of a data-frame header (§4.5/§4.6).
pub const HEADER_LENGTH: usize = 32;

#[repr(C)]
struct MetadataLayout {
    raw_tail: [AtomicI64; 3],                            // 0, 8, 16
    active_term_count: AtomicI32,                         // 24
    _reserved_28: [u8; 100],                              // 28 -> 128
    end_of_stream_position: AtomicI64,                    // 128
    is_connected: AtomicI32,                              // 136
    active_transport_count: AtomicI32,                    // 140
    _reserved_144: [u8; 112],                             // 144 -> 256
    correlation_id: AtomicI64,                            // 256
    initial_term_id: AtomicI32,                           // 264
    default_frame_header_length: AtomicI32,               // 268
    mtu_length: AtomicI32,                                // 272
    term_length: AtomicI32,                               // 276
    page_size: AtomicI32,                                 // 280
    publication_window_length: AtomicI32,                 // 284
    receiver_window_length: AtomicI32,                    // 288
    socket_send_buffer_length: AtomicI32,                 // 292
    os_default_socket_send_buffer_length: AtomicI32,      // 296
    os_max_socket_send_buffer_length: AtomicI32,          // 300
    socket_recv_buffer_length: AtomicI32,                 // 304
    os_default_socket_recv_buffer_length: AtomicI32,      // 308
    os_max_socket_recv_buffer_length: AtomicI32,          // 312
    max_resend: AtomicI32,                                // 316
    default_frame_header_bytes: UnsafeCell<[u8; DEFAULT_HEADER_SLOT_LENGTH]>, // 320 -> 448
    entity_tag: AtomicI64,                                // 448
    response_correlation_id: AtomicI64,                   // 456
    linger_timeout_ns: AtomicI64,                         // 464
    untethered_window_limit_timeout_ns: AtomicI64,        // 472
    untethered_resting_timeout_ns: AtomicI64,             // 480
    group: AtomicU8,                                      // 488
    is_response: AtomicU8,                                // 489
    rejoin: AtomicU8,                                     // 490
    reliable: AtomicU8,                                   // 491
    sparse: AtomicU8,                                     // 492
    signal_eos: AtomicU8,                                 // 493
    spies_simulate_connection: AtomicU8,                  // 494
    tether: AtomicU8,                                     // 495
    is_publication_revoked: AtomicU8,                     // 496
    _reserved_497: [u8; 3],                               // 497 -> 500
    // Not 8-aligned (offset 500): a true `AtomicI64` here would be
    // undefined behavior. Stored as plain bytes instead; spec §4.2 does
    // not list this field in the concurrency-critical table, so a plain,
    // unaligned load/store is the correct (and only sound) match.
    untethered_linger_timeout_ns: UnsafeCell<[u8; 8]>,    // 500 -> 508
    _reserved_508: [u8; METADATA_LENGTH - 508],
}

const _: () = assert!(std::mem::size_of::<MetadataLayout>() == METADATA_LENGTH);

/// A view over a log buffer's metadata section.
///
/// Borrows a `METADATA_LENGTH`-byte slice of mapped memory; the caller
/// (`LogBuffer`) is responsible for the slice being exactly that long and
/// 8-byte aligned (true of any page-aligned mmap offset).
pub struct Metadata<'a> {
    layout: &'a MetadataLayout,
}

impl<'a> Metadata<'a> {
    /// Wrap a metadata section.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is not exactly `METADATA_LENGTH` bytes long or is
    /// not 8-byte aligned; callers are expected to slice a page-aligned
    /// mmap region, for which both hold by construction.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        assert_eq!(bytes.len(), METADATA_LENGTH, "metadata section is the wrong size");
        assert_eq!(
            bytes.as_ptr() as usize % std::mem::align_of::<MetadataLayout>(),
            0,
            "metadata section is not properly aligned"
        );
        // Safety: length and alignment checked above; `MetadataLayout`'s
        // fields are all `Atomic*`/`UnsafeCell`, so shared, possibly
        // cross-process mutable aliasing of the pointee is sound.
        let layout = unsafe { &*(bytes.as_ptr() as *const MetadataLayout) };
        Metadata { layout }
    }

    pub fn raw_tail(&self, partition: i32) -> RawTail<'a> {
        RawTail::new(&self.layout.raw_tail[partition as usize])
    }

    pub fn active_term_count_acquire(&self) -> i32 {
        self.layout.active_term_count.load(Ordering::Acquire)
    }

    pub fn active_term_count_release(&self, value: i32) {
        self.layout.active_term_count.store(value, Ordering::Release);
    }

    pub fn active_term_count_plain(&self, value: i32) {
        self.layout.active_term_count.store(value, Ordering::Relaxed);
    }

    /// The raw atomic counter, for callers (the rotator) that need to CAS
    /// it directly rather than through a single named operation.
    pub fn active_term_count_atomic(&self) -> &'a AtomicI32 {
        &self.layout.active_term_count
    }

    pub fn active_term_count_cas(&self, expected: i32, new: i32) -> bool {
        self.layout
            .active_term_count
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Read the tail of the current active partition.
    ///
    /// First reads `active_term_count` with acquire ordering, derives the
    /// partition from it, then acquire-reads that partition's tail. A
    /// rotation racing between the two reads means a stale
    /// `(partition, tail)` pair may be observed, but never a torn one
    /// (spec §4.3).
    pub fn active_raw_tail_acquire(&self) -> (i32, i64) {
        let active_term_count = self.active_term_count_acquire();
        let partition = crate::position::index_by_term_count(active_term_count as i64);
        (partition, self.raw_tail(partition).read_acquire())
    }

    pub fn end_of_stream_position_acquire(&self) -> i64 {
        self.layout.end_of_stream_position.load(Ordering::Acquire)
    }

    pub fn end_of_stream_position_release(&self, value: i64) {
        self.layout.end_of_stream_position.store(value, Ordering::Release);
    }

    pub fn is_connected_acquire(&self) -> bool {
        self.layout.is_connected.load(Ordering::Acquire) != 0
    }

    pub fn is_connected_release(&self, value: bool) {
        self.layout.is_connected.store(value as i32, Ordering::Release);
    }

    pub fn active_transport_count_acquire(&self) -> i32 {
        self.layout.active_transport_count.load(Ordering::Acquire)
    }

    pub fn active_transport_count_release(&self, value: i32) {
        self.layout
            .active_transport_count
            .store(value, Ordering::Release);
    }

    pub fn correlation_id_plain(&self) -> i64 {
        self.layout.correlation_id.load(Ordering::Relaxed)
    }

    pub fn set_correlation_id_plain(&self, value: i64) {
        self.layout.correlation_id.store(value, Ordering::Relaxed);
    }

    pub fn initial_term_id_plain(&self) -> i32 {
        self.layout.initial_term_id.load(Ordering::Relaxed)
    }

    pub fn set_initial_term_id_plain(&self, value: i32) {
        self.layout.initial_term_id.store(value, Ordering::Relaxed);
    }

    pub fn default_frame_header_length_plain(&self) -> i32 {
        self.layout
            .default_frame_header_length
            .load(Ordering::Relaxed)
    }

    pub fn set_default_frame_header_length_plain(&self, value: i32) {
        self.layout
            .default_frame_header_length
            .store(value, Ordering::Relaxed);
    }

    pub fn mtu_length_plain(&self) -> i32 {
        self.layout.mtu_length.load(Ordering::Relaxed)
    }

    pub fn set_mtu_length_plain(&self, value: i32) {
        self.layout.mtu_length.store(value, Ordering::Relaxed);
    }

    pub fn term_length_plain(&self) -> i32 {
        self.layout.term_length.load(Ordering::Relaxed)
    }

    pub fn set_term_length_plain(&self, value: i32) {
        self.layout.term_length.store(value, Ordering::Relaxed);
    }

    pub fn page_size_plain(&self) -> i32 {
        self.layout.page_size.load(Ordering::Relaxed)
    }

    pub fn set_page_size_plain(&self, value: i32) {
        self.layout.page_size.store(value, Ordering::Relaxed);
    }

    pub fn publication_window_length_plain(&self) -> i32 {
        self.layout
            .publication_window_length
            .load(Ordering::Relaxed)
    }

    pub fn set_publication_window_length_plain(&self, value: i32) {
        self.layout
            .publication_window_length
            .store(value, Ordering::Relaxed);
    }

    pub fn receiver_window_length_plain(&self) -> i32 {
        self.layout.receiver_window_length.load(Ordering::Relaxed)
    }

    pub fn set_receiver_window_length_plain(&self, value: i32) {
        self.layout
            .receiver_window_length
            .store(value, Ordering::Relaxed);
    }

    pub fn socket_send_buffer_length_plain(&self) -> i32 {
        self.layout
            .socket_send_buffer_length
            .load(Ordering::Relaxed)
    }

    pub fn set_socket_send_buffer_length_plain(&self, value: i32) {
        self.layout
            .socket_send_buffer_length
            .store(value, Ordering::Relaxed);
    }

    pub fn os_default_socket_send_buffer_length_plain(&self) -> i32 {
        self.layout
            .os_default_socket_send_buffer_length
            .load(Ordering::Relaxed)
    }

    pub fn set_os_default_socket_send_buffer_length_plain(&self, value: i32) {
        self.layout
            .os_default_socket_send_buffer_length
            .store(value, Ordering::Relaxed);
    }

    pub fn os_max_socket_send_buffer_length_plain(&self) -> i32 {
        self.layout
            .os_max_socket_send_buffer_length
            .load(Ordering::Relaxed)
    }

    pub fn set_os_max_socket_send_buffer_length_plain(&self, value: i32) {
        self.layout
            .os_max_socket_send_buffer_length
            .store(value, Ordering::Relaxed);
    }

    pub fn socket_recv_buffer_length_plain(&self) -> i32 {
        self.layout
            .socket_recv_buffer_length
            .load(Ordering::Relaxed)
    }

    pub fn set_socket_recv_buffer_length_plain(&self, value: i32) {
        self.layout
            .socket_recv_buffer_length
            .store(value, Ordering::Relaxed);
    }

    pub fn os_default_socket_recv_buffer_length_plain(&self) -> i32 {
        self.layout
            .os_default_socket_recv_buffer_length
            .load(Ordering::Relaxed)
    }

    pub fn set_os_default_socket_recv_buffer_length_plain(&self, value: i32) {
        self.layout
            .os_default_socket_recv_buffer_length
            .store(value, Ordering::Relaxed);
    }

    pub fn os_max_socket_recv_buffer_length_plain(&self) -> i32 {
        self.layout
            .os_max_socket_recv_buffer_length
            .load(Ordering::Relaxed)
    }

    pub fn set_os_max_socket_recv_buffer_length_plain(&self, value: i32) {
        self.layout
            .os_max_socket_recv_buffer_length
            .store(value, Ordering::Relaxed);
    }

    pub fn max_resend_plain(&self) -> i32 {
        self.layout.max_resend.load(Ordering::Relaxed)
    }

    pub fn set_max_resend_plain(&self, value: i32) {
        self.layout.max_resend.store(value, Ordering::Relaxed);
    }

    pub fn entity_tag_plain(&self) -> i64 {
        self.layout.entity_tag.load(Ordering::Relaxed)
    }

    pub fn set_entity_tag_plain(&self, value: i64) {
        self.layout.entity_tag.store(value, Ordering::Relaxed);
    }

    pub fn response_correlation_id_plain(&self) -> i64 {
        self.layout.response_correlation_id.load(Ordering::Relaxed)
    }

    pub fn set_response_correlation_id_plain(&self, value: i64) {
        self.layout
            .response_correlation_id
            .store(value, Ordering::Relaxed);
    }

    pub fn linger_timeout_ns_plain(&self) -> i64 {
        self.layout.linger_timeout_ns.load(Ordering::Relaxed)
    }

    pub fn set_linger_timeout_ns_plain(&self, value: i64) {
        self.layout
            .linger_timeout_ns
            .store(value, Ordering::Relaxed);
    }

    pub fn untethered_window_limit_timeout_ns_plain(&self) -> i64 {
        self.layout
            .untethered_window_limit_timeout_ns
            .load(Ordering::Relaxed)
    }

    pub fn set_untethered_window_limit_timeout_ns_plain(&self, value: i64) {
        self.layout
            .untethered_window_limit_timeout_ns
            .store(value, Ordering::Relaxed);
    }

    pub fn untethered_resting_timeout_ns_plain(&self) -> i64 {
        self.layout
            .untethered_resting_timeout_ns
            .load(Ordering::Relaxed)
    }

    pub fn set_untethered_resting_timeout_ns_plain(&self, value: i64) {
        self.layout
            .untethered_resting_timeout_ns
            .store(value, Ordering::Relaxed);
    }

    /// Plain, unaligned access — see the comment on the struct field.
    pub fn untethered_linger_timeout_ns_plain(&self) -> i64 {
        let ptr = self.layout.untethered_linger_timeout_ns.get() as *const u8;
        let bytes: [u8; 8] = unsafe { ptr::read_unaligned(ptr as *const [u8; 8]) };
        i64::from_ne_bytes(bytes)
    }

    pub fn set_untethered_linger_timeout_ns_plain(&self, value: i64) {
        let ptr = self.layout.untethered_linger_timeout_ns.get() as *mut u8;
        unsafe { ptr::write_unaligned(ptr as *mut [u8; 8], value.to_ne_bytes()) };
    }

    pub fn group_plain(&self) -> bool {
        self.layout.group.load(Ordering::Relaxed) != 0
    }

    pub fn set_group_plain(&self, value: bool) {
        self.layout.group.store(value as u8, Ordering::Relaxed);
    }

    pub fn is_response_plain(&self) -> bool {
        self.layout.is_response.load(Ordering::Relaxed) != 0
    }

    pub fn set_is_response_plain(&self, value: bool) {
        self.layout.is_response.store(value as u8, Ordering::Relaxed);
    }

    pub fn rejoin_plain(&self) -> bool {
        self.layout.rejoin.load(Ordering::Relaxed) != 0
    }

    pub fn set_rejoin_plain(&self, value: bool) {
        self.layout.rejoin.store(value as u8, Ordering::Relaxed);
    }

    pub fn reliable_plain(&self) -> bool {
        self.layout.reliable.load(Ordering::Relaxed) != 0
    }

    pub fn set_reliable_plain(&self, value: bool) {
        self.layout.reliable.store(value as u8, Ordering::Relaxed);
    }

    pub fn sparse_plain(&self) -> bool {
        self.layout.sparse.load(Ordering::Relaxed) != 0
    }

    pub fn set_sparse_plain(&self, value: bool) {
        self.layout.sparse.store(value as u8, Ordering::Relaxed);
    }

    pub fn signal_eos_plain(&self) -> bool {
        self.layout.signal_eos.load(Ordering::Relaxed) != 0
    }

    pub fn set_signal_eos_plain(&self, value: bool) {
        self.layout.signal_eos.store(value as u8, Ordering::Relaxed);
    }

    pub fn spies_simulate_connection_plain(&self) -> bool {
        self.layout
            .spies_simulate_connection
            .load(Ordering::Relaxed)
            != 0
    }

    pub fn set_spies_simulate_connection_plain(&self, value: bool) {
        self.layout
            .spies_simulate_connection
            .store(value as u8, Ordering::Relaxed);
    }

    pub fn tether_plain(&self) -> bool {
        self.layout.tether.load(Ordering::Relaxed) != 0
    }

    pub fn set_tether_plain(&self, value: bool) {
        self.layout.tether.store(value as u8, Ordering::Relaxed);
    }

    pub fn is_publication_revoked_plain(&self) -> bool {
        self.layout.is_publication_revoked.load(Ordering::Relaxed) != 0
    }

    pub fn set_is_publication_revoked_plain(&self, value: bool) {
        self.layout
            .is_publication_revoked
            .store(value as u8, Ordering::Relaxed);
    }

    /// Store the prototype data-frame header applied on every append
    /// (spec §4.6). Rejects anything but exactly `HEADER_LENGTH` bytes.
    pub fn set_default_header(&self, header: &[u8]) -> Result<(), LogBufferError> {
        if header.len() != HEADER_LENGTH {
            return Err(LogBufferError::OutOfRange);
        }
        // Safety: single writer by contract (producer only, set once
        // before publish); readers only ever read the fully-written slot.
        let slot = unsafe { &mut *self.layout.default_frame_header_bytes.get() };
        slot[..HEADER_LENGTH].copy_from_slice(header);
        Ok(())
    }

    pub fn default_header(&self) -> [u8; HEADER_LENGTH] {
        let slot = unsafe { &*self.layout.default_frame_header_bytes.get() };
        let mut out = [0u8; HEADER_LENGTH];
        out.copy_from_slice(&slot[..HEADER_LENGTH]);
        out
    }

    /// Initialise a freshly-created log buffer's metadata per the
    /// lifecycle in spec §3: configuration scalars, then the three raw
    /// tails primed with `initial_term_id + 0/1/2`, then
    /// `active_term_count = 0`.
    pub fn initialize(
        &self,
        initial_term_id: i32,
        term_length: i32,
        page_size: i32,
        mtu_length: i32,
        correlation_id: i64,
    ) {
        self.set_initial_term_id_plain(initial_term_id);
        self.set_term_length_plain(term_length);
        self.set_page_size_plain(page_size);
        self.set_mtu_length_plain(mtu_length);
        self.set_default_frame_header_length_plain(HEADER_LENGTH as i32);
        self.set_correlation_id_plain(correlation_id);

        for partition in 0..3i32 {
            self.raw_tail(partition)
                .write_plain(pack_tail(initial_term_id.wrapping_add(partition), 0));
        }
        self.active_term_count_plain(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_bytes() -> Vec<u8> {
        vec![0u8; METADATA_LENGTH]
    }

    #[test]
    fn struct_size_matches_metadata_length() {
        assert_eq!(std::mem::size_of::<MetadataLayout>(), METADATA_LENGTH);
    }

    // S1: initialisation primes the three tails and position zero.
    #[test]
    fn s1_initialize_primes_tails() {
        let bytes = fresh_bytes();
        let metadata = Metadata::from_bytes(&bytes);
        metadata.initialize(7, 65536, 4096, 1408, 42);

        assert_eq!(metadata.raw_tail(0).read_plain(), pack_tail(7, 0));
        assert_eq!(metadata.raw_tail(1).read_plain(), pack_tail(8, 0));
        assert_eq!(metadata.raw_tail(2).read_plain(), pack_tail(9, 0));
        assert_eq!(metadata.active_term_count_acquire(), 0);
        assert_eq!(metadata.initial_term_id_plain(), 7);
        assert_eq!(metadata.correlation_id_plain(), 42);
    }

    // S5: default header round-trip.
    #[test]
    fn s5_default_header_round_trip() {
        let bytes = fresh_bytes();
        let metadata = Metadata::from_bytes(&bytes);
        let header: [u8; HEADER_LENGTH] = std::array::from_fn(|i| i as u8);

        metadata.set_default_header(&header).unwrap();
        assert_eq!(metadata.default_header(), header);
    }

    #[test]
    fn set_default_header_rejects_wrong_length() {
        let bytes = fresh_bytes();
        let metadata = Metadata::from_bytes(&bytes);
        assert!(matches!(
            metadata.set_default_header(&[0u8; HEADER_LENGTH - 1]),
            Err(LogBufferError::OutOfRange)
        ));
    }

    #[test]
    fn untethered_linger_timeout_round_trips_despite_misalignment() {
        let bytes = fresh_bytes();
        let metadata = Metadata::from_bytes(&bytes);
        metadata.set_untethered_linger_timeout_ns_plain(123_456_789);
        assert_eq!(metadata.untethered_linger_timeout_ns_plain(), 123_456_789);
    }

    #[test]
    fn boolean_fields_round_trip() {
        let bytes = fresh_bytes();
        let metadata = Metadata::from_bytes(&bytes);
        metadata.set_tether_plain(true);
        metadata.set_sparse_plain(false);
        assert!(metadata.tether_plain());
        assert!(!metadata.sparse_plain());
    }

    #[test]
    fn active_raw_tail_acquire_tracks_rotation() {
        let bytes = fresh_bytes();
        let metadata = Metadata::from_bytes(&bytes);
        metadata.initialize(7, 65536, 4096, 1408, 0);

        let (partition, raw) = metadata.active_raw_tail_acquire();
        assert_eq!(partition, 0);
        assert_eq!(raw, pack_tail(7, 0));

        metadata.active_term_count_release(1);
        let (partition, raw) = metadata.active_raw_tail_acquire();
        assert_eq!(partition, 1);
        assert_eq!(raw, pack_tail(8, 0));
    }
}
