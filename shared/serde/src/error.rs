use thiserror::Error;

/// Errors that can occur while reading values back out of a [`DataIStream`]
///
/// [`DataIStream`]: crate::DataIStream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Attempted to read more bytes than remain in the stream
    #[error("Read of {requested} bytes past the end of the stream ({remaining} bytes remaining)")]
    OutOfRange { requested: usize, remaining: usize },

    /// A length prefix does not fit into the address space of this platform
    #[error("Length prefix {length} is too large for this platform")]
    LengthOverflow { length: u64 },

    /// Decoded bytes are not a legal value of the requested type
    #[error("Invalid encoding for {type_name}: {value}")]
    InvalidValue {
        type_name: &'static str,
        value: u64,
    },

    /// A string field does not hold valid UTF-8
    #[error("String field of {length} bytes is not valid UTF-8")]
    InvalidUtf8 { length: usize },

    /// The reader finished but bytes were left over
    #[error("{remaining} bytes were left unread in the stream")]
    TrailingBytes { remaining: usize },
}
