//! Maps transport and HTTP failures onto [`BackendErrorKind`].

use super::types::PostgrestError;
use reqwest::StatusCode;
use rollsync::{BackendError, BackendErrorKind};

/// Postgres `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";
/// Postgres `not_null_violation`.
pub const NOT_NULL_VIOLATION: &str = "23502";

pub fn from_transport(service: &str, err: &reqwest::Error) -> BackendError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        BackendError::network(format!("{} unreachable: {}", service, err))
    } else {
        BackendError::unknown(format!("{} request failed: {}", service, err))
    }
}

/// Classify a non-success PostgREST answer from its status and body.
pub fn from_postgrest(status: StatusCode, body: &str) -> BackendError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body.trim()));

    let code = parsed.code.as_deref().unwrap_or_default();
    let kind = if code == UNIQUE_VIOLATION || mentions_duplicate(body) {
        BackendErrorKind::Constraint
    } else if code == NOT_NULL_VIOLATION || status == StatusCode::UNPROCESSABLE_ENTITY {
        BackendErrorKind::Validation
    } else {
        status_kind(status)
    };
    BackendError::new(kind, message)
}

/// Classify a spreadsheet failure reported in its JSON body.
pub fn from_sheet_error(message: &str) -> BackendError {
    let lower = message.to_lowercase();
    if lower.contains("incomplete data") || lower.contains("dados incompletos") {
        BackendError::validation(message)
    } else {
        BackendError::unknown(message)
    }
}

/// Gateway and throttling statuses are transient.
pub fn status_kind(status: StatusCode) -> BackendErrorKind {
    match status {
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => BackendErrorKind::Network,
        _ => BackendErrorKind::Unknown,
    }
}

fn mentions_duplicate(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("duplicate key") || lower.contains("duplicata_bloqueada")
}
