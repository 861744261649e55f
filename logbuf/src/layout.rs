//! File-level layout and validation (spec §4.7, §6): how big a log buffer
//! file needs to be, and the bounds a term length / page size must
//! satisfy to be usable at all.
use crate::error::LogBufferError;
use crate::metadata::METADATA_LENGTH;
use crate::position::{is_permitted_term_length, MAX_TERM_LENGTH, MIN_TERM_LENGTH};

/// Smallest permitted file page size: 4 KiB (the metadata section length).
pub const MIN_PAGE_SIZE: i32 = METADATA_LENGTH as i32;
/// Largest permitted file page size: 1 GiB.
pub const MAX_PAGE_SIZE: i32 = 1 << 30;

/// `checkTermLength`: reject anything that is not a power of two in
/// `[64 KiB, 1 GiB]`.
pub fn check_term_length(term_length: i32) -> Result<(), LogBufferError> {
    if is_permitted_term_length(term_length) {
        Ok(())
    } else {
        Err(LogBufferError::InvalidLength)
    }
}

/// `checkPageSize`: reject anything that is not a power of two in
/// `[4 KiB, 1 GiB]`.
pub fn check_page_size(page_size: i32) -> Result<(), LogBufferError> {
    if page_size >= MIN_PAGE_SIZE
        && page_size <= MAX_PAGE_SIZE
        && (page_size as u32).is_power_of_two()
    {
        Ok(())
    } else {
        Err(LogBufferError::InvalidLength)
    }
}

/// `fileLength = align(3*termLength + METADATA_LENGTH, filePageSize)`.
pub fn file_length(term_length: i32, file_page_size: i32) -> Result<u64, LogBufferError> {
    check_term_length(term_length)?;
    check_page_size(file_page_size)?;

    let unaligned = 3u64 * term_length as u64 + METADATA_LENGTH as u64;
    let page_size = file_page_size as u64;
    Ok((unaligned + page_size - 1) / page_size * page_size)
}

/// Byte offset of term `index` (`0..3`) within the file.
pub fn term_offset_in_file(index: i32, term_length: i32) -> u64 {
    index as u64 * term_length as u64
}

/// Byte offset of the metadata section within the file.
pub fn metadata_offset_in_file(term_length: i32) -> u64 {
    3 * term_length as u64
}
