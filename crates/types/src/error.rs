//! Error types for the JD bridge

use thiserror::Error;

/// Coarse classification used by callers to decide between buffering,
/// surfacing, and failing hard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty or malformed input, rejected before touching the buffer or network
    InvalidSubmission,
    /// Network failure or timeout talking to the downloader
    Unreachable,
    /// Downloader reachable but refused the submission
    RemoteRejected,
    /// Buffer entry does not exist
    NotFound,
    /// Persistent storage failure
    Storage,
    /// Configuration problem
    Config,
    /// Missing or wrong bearer token
    Authentication,
    /// Anything else
    Internal,
}

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Submission rejected during validation
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// Downloader could not be reached
    #[error("Downloader unreachable: {target}: {message}")]
    Unreachable { target: String, message: String },

    /// Downloader answered with a semantic error
    #[error("Downloader rejected submission: {target}: {reason}")]
    RemoteRejected { target: String, reason: String },

    /// Not found errors
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Database operation errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication/authorization errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidSubmission(_) => ErrorKind::InvalidSubmission,
            BridgeError::Unreachable { .. } => ErrorKind::Unreachable,
            BridgeError::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            BridgeError::NotFound { .. } => ErrorKind::NotFound,
            BridgeError::Storage(_) => ErrorKind::Storage,
            BridgeError::Config(_) => ErrorKind::Config,
            BridgeError::Authentication(_) => ErrorKind::Authentication,
            BridgeError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        BridgeError::NotFound {
            resource: resource.into(),
        }
    }
}

/// Errors produced by a single delivery attempt against the downloader
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Deadline elapsed before the downloader answered
    #[error("Connection timeout to downloader: {target}")]
    ConnectionTimeout { target: String },

    /// Connection refused, reset, DNS failure and the like
    #[error("Connection to downloader {target} failed: {message}")]
    ConnectionFailed { target: String, message: String },

    /// Non-success HTTP status
    #[error("HTTP error from downloader {target}: {status}")]
    HttpError { target: String, status: u16 },

    /// Body could not be interpreted as an acknowledgement
    #[error("Invalid response format from downloader {target}: {message}")]
    InvalidResponse { target: String, message: String },

    /// Downloader explicitly refused the submission
    #[error("Submission rejected by downloader {target}: {reason}")]
    Rejected { target: String, reason: String },
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Timeouts, connection failures and server-side 5xx are transient;
    /// everything else means retrying the same payload would not help.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::ConnectionTimeout { .. } | GatewayError::ConnectionFailed { .. } => {
                ErrorKind::Unreachable
            }
            GatewayError::HttpError { status, .. } if *status >= 500 || *status == 0 => {
                ErrorKind::Unreachable
            }
            GatewayError::HttpError { .. }
            | GatewayError::InvalidResponse { .. }
            | GatewayError::Rejected { .. } => ErrorKind::RemoteRejected,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.kind() == ErrorKind::Unreachable
    }
}

/// Database specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Connection failed
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Transaction failed
    #[error("Database transaction failed: {0}")]
    TransactionFailed(String),

    /// Stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: String, message: String },

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),
}

/// Configuration specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Parse error
    #[error("Configuration parse error: {0}")]
    ParseError(String),

    /// Validation error
    #[error("Configuration validation error: {field}: {message}")]
    ValidationError { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },
}

impl From<GatewayError> for BridgeError {
    fn from(err: GatewayError) -> Self {
        let kind = err.kind();
        match err {
            GatewayError::ConnectionTimeout { target } => BridgeError::Unreachable {
                target,
                message: "Connection timeout".to_string(),
            },
            GatewayError::ConnectionFailed { target, message } => {
                BridgeError::Unreachable { target, message }
            }
            GatewayError::HttpError { target, status } if kind == ErrorKind::Unreachable => {
                BridgeError::Unreachable {
                    target,
                    message: format!("HTTP error: {}", status),
                }
            }
            GatewayError::HttpError { target, status } => BridgeError::RemoteRejected {
                target,
                reason: format!("HTTP error: {}", status),
            },
            GatewayError::InvalidResponse { target, message } => BridgeError::RemoteRejected {
                target,
                reason: message,
            },
            GatewayError::Rejected { target, reason } => {
                BridgeError::RemoteRejected { target, reason }
            }
        }
    }
}

impl From<DatabaseError> for BridgeError {
    fn from(err: DatabaseError) -> Self {
        BridgeError::Storage(err.to_string())
    }
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_classification() {
        let timeout = GatewayError::ConnectionTimeout {
            target: "jd".to_string(),
        };
        assert_eq!(timeout.kind(), ErrorKind::Unreachable);

        let bad_gateway = GatewayError::HttpError {
            target: "jd".to_string(),
            status: 502,
        };
        assert!(bad_gateway.is_unreachable());

        let bad_request = GatewayError::HttpError {
            target: "jd".to_string(),
            status: 400,
        };
        assert_eq!(bad_request.kind(), ErrorKind::RemoteRejected);
    }

    #[test]
    fn test_conversion_keeps_kind() {
        let err: BridgeError = GatewayError::ConnectionTimeout {
            target: "jd".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Unreachable);

        let err: BridgeError = GatewayError::Rejected {
            target: "jd".to_string(),
            reason: "BAD_PARAMETERS".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::RemoteRejected);
        assert!(err.to_string().contains("BAD_PARAMETERS"));
    }
}
