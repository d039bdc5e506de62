//! Error types shared by every component of the table-build pipeline.

use std::fmt;
use std::io;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for storage-engine operations.
///
/// Builders and writers keep one of these as a sticky status: once a
/// mutator observes a non-`Ok` status it stops doing I/O and every
/// subsequent call returns the same error.
#[derive(Debug, Clone)]
pub enum Error {
    /// An I/O error occurred while talking to the environment layer.
    Io(String),

    /// Data corruption was detected (bad checksum, bad length, out-of-order
    /// fragment, truncated footer, ...).
    Corruption(String),

    /// The requested key was not present.
    NotFound(String),

    /// The requested operation or configuration is not supported.
    NotSupported(String),

    /// An invalid argument was provided by the caller.
    InvalidArgument(String),
}

impl Error {
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Error::NotSupported(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(msg) => write!(f, "IO error: {}", msg),
            Error::Corruption(msg) => write!(f, "corruption: {}", msg),
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::NotSupported(msg) => write!(f, "not supported: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        log::error!("io error: {}", err);
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_each_variant() {
        assert_eq!(
            Error::corruption("bad crc").to_string(),
            "corruption: bad crc"
        );
        assert_eq!(
            Error::not_found("key missing").to_string(),
            "not found: key missing"
        );
    }

    #[test]
    fn from_io_error_wraps_message() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn is_not_found_helper() {
        assert!(Error::not_found("x").is_not_found());
        assert!(!Error::corruption("x").is_not_found());
    }
}
