use std::fmt;

/// The three synchronous failure kinds the core can raise, plus the two
/// that only arise at the file boundary (`create`/`open`).
///
/// The rotator (`rotate::rotate_term`) never produces one of these: it
/// reports progress through its `bool` return value instead.
#[derive(Debug)]
pub enum LogBufferError {
    /// A term length, page size, or default header length failed its
    /// validity predicate (not a power of two, or out of the permitted
    /// range).
    InvalidLength,
    /// `position_bits_to_shift` (or anything built on it) was called with
    /// a term length that is not one of the 15 permitted powers of two.
    InvalidArgument,
    /// A caller-supplied buffer is the wrong size for the field being
    /// accessed.
    OutOfRange,
    /// The `termLength` recorded in a log buffer's metadata does not match
    /// the layout inferred from the file's actual length.
    CorruptLayout,
    /// Filesystem or memory-mapping failure while creating or opening a
    /// log buffer file.
    Io(std::io::Error),
}

impl fmt::Display for LogBufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogBufferError::InvalidLength => {
                write!(f, "length is not a power of two within the permitted range")
            }
            LogBufferError::InvalidArgument => {
                write!(f, "argument does not correspond to a permitted term length")
            }
            LogBufferError::OutOfRange => write!(f, "buffer is the wrong size for this field"),
            LogBufferError::CorruptLayout => write!(
                f,
                "metadata term length disagrees with the file's actual layout"
            ),
            LogBufferError::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for LogBufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogBufferError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LogBufferError {
    fn from(err: std::io::Error) -> Self {
        LogBufferError::Io(err)
    }
}
