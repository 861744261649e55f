//! `LogBuffer`: ties the memory map, the three term partitions, and the
//! metadata section together into the facade described in spec §3.
use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapRaw;

use crate::error::LogBufferError;
use crate::layout::{
    check_page_size, check_term_length, file_length, metadata_offset_in_file, term_offset_in_file,
};
use crate::metadata::{Metadata, HEADER_LENGTH, METADATA_LENGTH};
use crate::rotate::{rotate_term, RawTails};

/// A memory-mapped log buffer: three term partitions plus a metadata
/// section (spec §2).
pub struct LogBuffer {
    mmap: MmapRaw,
    term_length: i32,
}

impl LogBuffer {
    /// Create a new log buffer file, zero-initialized by the OS, with its
    /// metadata primed per the lifecycle in spec §3.
    pub fn create(
        path: impl AsRef<Path>,
        term_length: i32,
        page_size: i32,
        initial_term_id: i32,
        mtu_length: i32,
        correlation_id: i64,
    ) -> Result<Self, LogBufferError> {
        check_term_length(term_length)?;
        check_page_size(page_size)?;
        let total_length = file_length(term_length, page_size)?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.set_len(total_length)?;

        let mmap = MmapRaw::map_raw(&file)?;
        let buffer = LogBuffer { mmap, term_length };
        buffer.metadata().initialize(
            initial_term_id,
            term_length,
            page_size,
            mtu_length,
            correlation_id,
        );

        #[cfg(feature = "tracing")]
        tracing::info!(term_length, page_size, initial_term_id, "created log buffer");

        Ok(buffer)
    }

    /// Map an existing log buffer file.
    ///
    /// `expected_term_length` is supplied by the caller out-of-band (a
    /// media driver communicates term length to subscribers before they
    /// ever map the file themselves — discovering it from the file alone
    /// is not possible, since the metadata section's own offset depends
    /// on the term length). Resolves spec §9's open question: the term
    /// length stored in metadata, and the file's actual length, are both
    /// cross-checked against `expected_term_length` and a mismatch is
    /// surfaced as `CorruptLayout` rather than silently trusted.
    pub fn open(path: impl AsRef<Path>, expected_term_length: i32) -> Result<Self, LogBufferError> {
        check_term_length(expected_term_length)?;

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let actual_length = file.metadata()?.len();

        let mmap = MmapRaw::map_raw(&file)?;
        let buffer = LogBuffer {
            mmap,
            term_length: expected_term_length,
        };

        let metadata = buffer.metadata();
        let stored_term_length = metadata.term_length_plain();
        let stored_page_size = metadata.page_size_plain();

        if stored_term_length != expected_term_length {
            return Err(LogBufferError::CorruptLayout);
        }

        let expected_length = file_length(stored_term_length, stored_page_size)?;
        if expected_length != actual_length {
            return Err(LogBufferError::CorruptLayout);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(term_length = stored_term_length, "opened log buffer");

        Ok(buffer)
    }

    pub fn term_length(&self) -> i32 {
        self.term_length
    }

    /// A view over the metadata section.
    pub fn metadata(&self) -> Metadata<'_> {
        let offset = metadata_offset_in_file(self.term_length) as usize;
        // Safety: `offset..offset+METADATA_LENGTH` is in-bounds by
        // construction of `file_length`, and the mapping outlives every
        // borrow derived from `&self`.
        let bytes = unsafe {
            std::slice::from_raw_parts(self.mmap.as_ptr().add(offset), METADATA_LENGTH)
        };
        Metadata::from_bytes(bytes)
    }

    /// A read-only view of term partition `index` (`0..3`).
    pub fn term(&self, index: i32) -> &[u8] {
        let offset = term_offset_in_file(index, self.term_length) as usize;
        // Safety: `offset..offset+term_length` is in-bounds by
        // construction.
        unsafe { std::slice::from_raw_parts(self.mmap.as_ptr().add(offset), self.term_length as usize) }
    }

    /// A mutable view of term partition `index` (`0..3`).
    ///
    /// # Safety
    ///
    /// The log buffer is shared, possibly-cross-process memory: the
    /// caller must ensure it is the sole producer for the byte range it
    /// writes, and that any consumer only reads bytes after observing the
    /// corresponding raw-tail release-store (I6). This mirrors the
    /// producer/consumer contract of spec §5, which this type cannot
    /// enforce on its own.
    pub unsafe fn term_mut(&self, index: i32) -> &mut [u8] {
        let offset = term_offset_in_file(index, self.term_length) as usize;
        std::slice::from_raw_parts_mut(self.mmap.as_mut_ptr().add(offset), self.term_length as usize)
    }

    /// Copy the prototype frame header (spec §4.6) into the start of the
    /// frame at `frame_offset` within term partition `index`.
    ///
    /// # Safety
    ///
    /// Same contract as `term_mut`: the caller must be the sole producer
    /// for this frame.
    pub unsafe fn apply_default_header(&self, index: i32, frame_offset: i32) {
        let header = self.metadata().default_header();
        let term = self.term_mut(index);
        let start = frame_offset as usize;
        term[start..start + HEADER_LENGTH].copy_from_slice(&header);
    }

    /// Advance the log from `term_count`/`term_id` to the next term
    /// (spec §4.4). See `rotate::rotate_term` for the algorithm and its
    /// safety/progress/lazy-coupling properties.
    pub fn rotate(&self, term_count: i32, term_id: i32) -> bool {
        let metadata = self.metadata();
        let tails = RawTails::new([
            metadata.raw_tail(0),
            metadata.raw_tail(1),
            metadata.raw_tail(2),
        ]);
        rotate_term(
            &tails,
            metadata.active_term_count_atomic(),
            term_count,
            term_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tail::pack_tail;
    use tempfile::NamedTempFile;

    fn temp_path() -> std::path::PathBuf {
        NamedTempFile::new().unwrap().into_temp_path().to_path_buf()
    }

    #[test]
    fn create_then_open_round_trips_configuration() {
        let path = temp_path();
        {
            let created = LogBuffer::create(&path, 65536, 4096, 7, 1408, 42).unwrap();
            assert_eq!(created.term_length(), 65536);
            assert_eq!(created.metadata().initial_term_id_plain(), 7);
        }

        let opened = LogBuffer::open(&path, 65536).unwrap();
        assert_eq!(opened.metadata().initial_term_id_plain(), 7);
        assert_eq!(opened.metadata().mtu_length_plain(), 1408);
        assert_eq!(opened.metadata().raw_tail(0).read_plain(), pack_tail(7, 0));
        assert_eq!(opened.metadata().raw_tail(1).read_plain(), pack_tail(8, 0));
        assert_eq!(opened.metadata().raw_tail(2).read_plain(), pack_tail(9, 0));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_rejects_wrong_term_length_as_corrupt() {
        let path = temp_path();
        LogBuffer::create(&path, 65536, 4096, 7, 1408, 0).unwrap();

        let err = LogBuffer::open(&path, 1 << 17).unwrap_err();
        assert!(matches!(err, LogBufferError::CorruptLayout));

        let _ = std::fs::remove_file(&path);
    }

    // S5 continued: applying the default header to a term buffer.
    #[test]
    fn s5_default_header_applied_to_term() {
        let path = temp_path();
        let buffer = LogBuffer::create(&path, 65536, 4096, 7, 1408, 0).unwrap();
        let header: [u8; HEADER_LENGTH] = std::array::from_fn(|i| i as u8);
        buffer.metadata().set_default_header(&header).unwrap();

        unsafe { buffer.apply_default_header(0, 128) };
        assert_eq!(&buffer.term(0)[128..128 + HEADER_LENGTH], &header[..]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rotate_through_the_facade_matches_metadata_state() {
        let path = temp_path();
        let buffer = LogBuffer::create(&path, 65536, 4096, 7, 1408, 0).unwrap();

        // Simulate the producer having filled term 0 to the end.
        buffer
            .metadata()
            .raw_tail(0)
            .write_release(pack_tail(7, 65536));

        assert!(buffer.rotate(0, 7));
        assert_eq!(buffer.metadata().active_term_count_acquire(), 1);
        assert_eq!(
            buffer.metadata().raw_tail(1).read_acquire(),
            pack_tail(8, 0)
        );

        let _ = std::fs::remove_file(&path);
    }
}
