//! A lock-free, memory-mapped log buffer: a single producer and many
//! concurrent consumers exchange a stream of length-prefixed frames
//! through three rotating term partitions and a shared metadata section,
//! without taking a lock.
//!
//! See [`buffer::LogBuffer`] for the entry point.

pub mod buffer;
pub mod error;
pub mod frame;
pub mod layout;
pub mod metadata;
pub mod position;
pub mod rotate;
pub mod tail;

pub use buffer::LogBuffer;
pub use error::LogBufferError;
pub use metadata::{Metadata, DEFAULT_HEADER_SLOT_LENGTH, HEADER_LENGTH, METADATA_LENGTH};
