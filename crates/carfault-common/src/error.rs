//! Common error types used throughout carfault.
//!
//! The variants mirror the failure classes of the backup engines: external
//! storage I/O, malformed documents, missing bundle parts, invalid records,
//! and record/reference store failures.

/// Common error type for carfault.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An expected document, folder, or record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation on local or external storage failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A record failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new Io error from a message (for facade failures without an OS error).
    pub fn io<S: Into<String>>(msg: S) -> Self {
        Self::Io(std::io::Error::other(msg.into()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("images folder");
        assert_eq!(err.to_string(), "Not found: images folder");

        let err = Error::database("connection failed");
        assert_eq!(err.to_string(), "Database error: connection failed");

        let err = Error::parse("unexpected end of input");
        assert_eq!(err.to_string(), "Parse error: unexpected end of input");

        let err = Error::validation("brand is required");
        assert_eq!(err.to_string(), "Validation error: brand is required");

        let err = Error::Cancelled;
        assert_eq!(err.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_io_constructor() {
        let err = Error::io("target is read-only");
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("target is read-only"));
    }
}
