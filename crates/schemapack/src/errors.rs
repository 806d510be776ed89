//! Error types for SchemaPack buffers and codecs

use std::string::String;

/// Result type for SchemaPack operations
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while encoding or decoding a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A fixed-width read ran past the end of the buffer
    OutOfBounds {
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },
    /// Decoding finished before the end of the buffer
    TrailingBytes {
        /// Reader position when decoding finished
        position: usize,
        /// Total buffer length
        len: usize,
    },
    /// The bytes do not follow the expected layout
    InvalidFormat(String),
    /// A string contained an unpaired UTF-16 surrogate
    InvalidUtf16,
    /// Unknown enum label, enum ordinal, or union tag
    TypeNotFound(String),
    /// The value does not have the shape the schema expects
    InvalidValue(String),
    /// The encoder wrote a different number of bytes than the size pass computed
    SizeMismatch {
        /// Size computed before encoding
        expected: usize,
        /// Bytes actually written
        actual: usize,
    },
    /// Custom error message
    Custom(String),
}

impl Error {
    /// Whether this error means the buffer does not match the schema
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::OutOfBounds { .. }
                | Error::TrailingBytes { .. }
                | Error::InvalidFormat(_)
                | Error::InvalidUtf16
        )
    }

    /// Whether this error is an unknown enum or union discriminant
    pub fn is_type_not_found(&self) -> bool {
        matches!(self, Error::TypeNotFound(_))
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::OutOfBounds { needed, available } => write!(
                f,
                "Buffer out of bounds: need {} bytes, have {}",
                needed, available
            ),
            Error::TrailingBytes { position, len } => write!(
                f,
                "Bad input size: decoding stopped at byte {} of {}",
                position, len
            ),
            Error::InvalidFormat(msg) => write!(f, "Invalid data format: {}", msg),
            Error::InvalidUtf16 => write!(f, "Invalid UTF-16 string"),
            Error::TypeNotFound(what) => write!(f, "Type not found: {}", what),
            Error::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            Error::SizeMismatch { expected, actual } => write!(
                f,
                "Size mismatch: computed {} bytes, encoded {}",
                expected, actual
            ),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::string::FromUtf16Error> for Error {
    fn from(_: std::string::FromUtf16Error) -> Self {
        Error::InvalidUtf16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::OutOfBounds { needed: 2, available: 1 }.is_format_error());
        assert!(Error::TrailingBytes { position: 1, len: 2 }.is_format_error());
        assert!(!Error::TypeNotFound("7".into()).is_format_error());
        assert!(Error::TypeNotFound("7".into()).is_type_not_found());
    }

    #[test]
    fn test_display() {
        let err = Error::TrailingBytes { position: 3, len: 5 };
        assert_eq!(err.to_string(), "Bad input size: decoding stopped at byte 3 of 5");
    }
}
