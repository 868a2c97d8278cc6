use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("Missing required reference: {0}")]
    MissingReference(String),

    #[error("Unresolved reference {field}: {value}")]
    UnresolvedReference { field: String, value: String },

    #[error("Record {0} is already delivered and cannot be queued")]
    AlreadyDelivered(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Json(e.to_string())
    }
}

/// Closed classification of backend failures.
///
/// Every backend adapter maps its transport and response errors onto one of
/// these, so the dispatcher and queue processor never inspect raw messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Timeout, DNS failure, connection refused. Always retried later.
    Network,
    /// Uniqueness violation reported by the backend.
    Constraint,
    /// The backend rejected the payload as malformed or incomplete.
    Validation,
    Unknown,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackendErrorKind::Network => "network",
            BackendErrorKind::Constraint => "constraint",
            BackendErrorKind::Validation => "validation",
            BackendErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, message)
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Constraint, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Validation, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unknown, message)
    }

    pub fn is_network(&self) -> bool {
        self.kind == BackendErrorKind::Network
    }

    pub fn is_constraint(&self) -> bool {
        self.kind == BackendErrorKind::Constraint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_includes_kind() {
        let err = BackendError::constraint("duplicate key value violates unique constraint");
        assert_eq!(
            err.to_string(),
            "constraint error: duplicate key value violates unique constraint"
        );
        assert!(err.is_constraint());
        assert!(!err.is_network());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SyncError = io.into();
        assert!(matches!(err, SyncError::Io(msg) if msg.contains("gone")));
    }
}
