//! Unified error types for outpost.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the outpost crates.
///
/// A store lookup that finds nothing is `Ok(None)`, never an error; these
/// variants cover faults only.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Unrecognized HTTP method.
    #[error("INVALID_METHOD: {0}")]
    InvalidMethod(String),

    /// The transport failed to produce a resolved response.
    #[error("UNREACHABLE: {0}")]
    Unreachable(String),

    /// Response body exceeded the configured size cap.
    #[error("RESPONSE_TOO_LARGE: {0}")]
    TooLarge(String),

    /// Store operation failed.
    #[error("STORE_ERROR: {0}")]
    Store(String),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            other => Error::Store(other.to_string()),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Unreachable("connection refused".to_string());
        assert!(err.to_string().contains("UNREACHABLE"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_store_error_display() {
        let err = Error::Store("disk full".to_string());
        assert!(err.to_string().starts_with("STORE_ERROR"));
    }
}
