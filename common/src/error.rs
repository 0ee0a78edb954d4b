use actix_web::{ResponseError, HttpResponse};
use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Why a request failed authentication.
///
/// Every variant surfaces to the caller as a 401 with the snake_case code as
/// the error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingHeaders,
    TimestampDrift,
    ReplayDetected,
    UnknownDevice,
    InvalidSignature,
    StoreUnavailable,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingHeaders => "missing_headers",
            RejectReason::TimestampDrift => "timestamp_drift",
            RejectReason::ReplayDetected => "replay_detected",
            RejectReason::UnknownDevice => "unknown_device",
            RejectReason::InvalidSignature => "invalid_signature",
            RejectReason::StoreUnavailable => "store_unavailable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Rewrite error: {0}")]
    RewriteError(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(RejectReason),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::NetworkError(err.to_string())
    }
}

impl From<RejectReason> for GatewayError {
    fn from(reason: RejectReason) -> Self {
        GatewayError::Unauthorized(reason)
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ConfigError(_) |
            Self::NetworkError(_) |
            Self::StorageError(_) |
            Self::RewriteError(_) |
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal details stay in the logs, callers only see a short code.
        let error = match self {
            Self::Unauthorized(reason) => reason.as_str(),
            _ => "Internal server error",
        };
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": error,
        }))
    }
}
