//! Encode/decode error.

/// Wire encode/decode errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer did not contain enough bytes to decode the requested type.
    Truncated {
        /// Number of bytes required.
        needed: usize,
        /// Number of bytes available.
        available: usize,
    },
    /// A string payload was not valid, NUL-terminated UTF-8.
    InvalidString,
    /// A type tag did not match any known elementary type.
    UnknownType(u8),
    /// The destination buffer was too small to hold the packed representation.
    BufferTooSmall,
}

impl std::error::Error for WireError {}

impl core::fmt::Display for WireError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WireError::Truncated { needed, available } => write!(
                f,
                "truncated value: needed {needed} bytes, only {available} available"
            ),
            WireError::InvalidString => f.write_str("invalid NUL-terminated UTF-8 string"),
            WireError::UnknownType(tag) => write!(f, "unknown elementary type tag {tag:#04x}"),
            WireError::BufferTooSmall => f.write_str("destination buffer too small"),
        }
    }
}
