//! Application-level error types for the Coral inspector.

use thiserror::Error;

use crate::store::StoreError;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("operation failed: {0}")]
    Operation(#[from] OperationError),

    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("file error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("logging setup failed: {0}")]
    LoggingSetup(String),
}

/// Broad category of a failed write-path operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Store,
    InvalidPayload,
    InvalidTtl,
    UnsupportedType,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Store => "store",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::InvalidTtl => "invalid_ttl",
            ErrorKind::UnsupportedType => "unsupported_type",
        }
    }
}

/// Failure of an import, export or delete operation.
///
/// The `Display` output is exactly the text the flat "OK or message" channel
/// carried, so callers that still need that shape can use [`status_text`].
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    InvalidTtl(String),

    #[error("unsupported value type {0:?}")]
    UnsupportedType(String),
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Store(_) => ErrorKind::Store,
            OperationError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            OperationError::InvalidTtl(_) => ErrorKind::InvalidTtl,
            OperationError::UnsupportedType(_) => ErrorKind::UnsupportedType,
        }
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(err: serde_json::Error) -> Self {
        OperationError::InvalidPayload(err.to_string())
    }
}

/// Render a write-path outcome as `"OK"` or the error message.
pub fn status_text<T>(result: &std::result::Result<T, OperationError>) -> String {
    match result {
        Ok(_) => "OK".to_string(),
        Err(e) => e.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_ok() {
        let result: std::result::Result<(), OperationError> = Ok(());
        assert_eq!(status_text(&result), "OK");
    }

    #[test]
    fn test_status_text_carries_message() {
        let result: std::result::Result<(), OperationError> =
            Err(OperationError::InvalidTtl("time: invalid duration \"x\"".to_string()));
        assert_eq!(status_text(&result), "time: invalid duration \"x\"");

        let store: std::result::Result<(), OperationError> = Err(StoreError::CommandFailed(
            "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
        )
        .into());
        assert_eq!(
            status_text(&store),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            OperationError::UnsupportedType("stream".to_string()).kind(),
            ErrorKind::UnsupportedType
        );
        let parse_err = serde_json::from_str::<String>("nope").unwrap_err();
        assert_eq!(OperationError::from(parse_err).kind(), ErrorKind::InvalidPayload);
    }
}
