//! Error types and handling for bucketsync
//!
//! A backup pass can fail in four ways, and the run controller cares about
//! exactly one distinction: fatal errors abort the current pass (and trigger
//! the whole-pass retry loop), while fingerprint bookkeeping failures are
//! logged and swallowed because the upload they follow already succeeded.

/// Main error type for bucketsync operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration; reported before a run starts
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Local filesystem failure during enumeration or fingerprint reads
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Authentication, listing, or transfer failure against the object store
    #[error("remote store error: {message}")]
    Remote {
        /// Error message from the remote operation
        message: String,
    },

    /// Failure persisting a fingerprint after a successful upload; non-fatal
    #[error("fingerprint write failed: {message}")]
    FingerprintWrite {
        /// Error message from the fingerprint store
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration errors
    Config,
    /// Local I/O errors
    Io,
    /// Remote store errors
    Remote,
    /// Fingerprint bookkeeping errors
    FingerprintWrite,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::FingerprintWrite { .. } => ErrorKind::FingerprintWrite,
        }
    }

    /// Whether this error must abort the current pass.
    ///
    /// Everything except [`Error::FingerprintWrite`] is fatal: the fingerprint
    /// store is an optimization cache, and a failed cache write after a
    /// confirmed upload only costs a re-upload on some future pass.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FingerprintWrite { .. })
    }

    /// Whether restarting the pass from scratch might succeed.
    ///
    /// Configuration errors are deterministic; retrying without operator
    /// intervention cannot fix them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Remote { .. })
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new local I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new remote store error
    pub fn remote<S: Into<String>>(message: S) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a new fingerprint write error
    pub fn fingerprint_write<S: Into<String>>(message: S) -> Self {
        Self::FingerprintWrite {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::config("missing bucket").kind(), ErrorKind::Config);
        assert_eq!(Error::io("unreadable").kind(), ErrorKind::Io);
        assert_eq!(Error::remote("403").kind(), ErrorKind::Remote);
        assert_eq!(
            Error::fingerprint_write("ENOTSUP").kind(),
            ErrorKind::FingerprintWrite
        );
    }

    #[test]
    fn test_fatality() {
        assert!(Error::config("x").is_fatal());
        assert!(Error::io("x").is_fatal());
        assert!(Error::remote("x").is_fatal());
        assert!(!Error::fingerprint_write("x").is_fatal());
    }

    #[test]
    fn test_retry_classification() {
        // A config error is deterministic: retrying the pass cannot fix it.
        assert!(!Error::config("x").is_retryable());
        assert!(Error::io("x").is_retryable());
        assert!(Error::remote("x").is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "test file");
        let error = Error::from(io_error);

        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(error.to_string().contains("test file"));
    }
}
