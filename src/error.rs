//! Error types for the webhook store, live API and HTTP surface
//!
//! Errors are classified by recoverability:
//! - Retryable: Network issues, timeouts, rate limits
//! - NonRetryable: Bad payloads, storage failures, missing confirmation
//! - RequiresUserAction: Missing or rejected Sahha credentials

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::sahha_api::SahhaApiError;
use crate::webhook::db::DbError;

#[derive(Debug, Error)]
pub enum PulseError {
    // Retryable errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Sahha API rate limit exceeded")]
    ApiRateLimit,

    // Non-retryable errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Confirmation required: pass ?confirm=true to delete all stored profiles")]
    ConfirmationRequired,

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),

    // Requires user action
    #[error("Sahha credentials not configured")]
    MissingCredentials,

    #[error("Sahha rejected the configured credentials")]
    Unauthorized,
}

impl PulseError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PulseError::Network(_) | PulseError::Timeout(_) | PulseError::ApiRateLimit
        )
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(self, PulseError::MissingCredentials | PulseError::Unauthorized)
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PulseError::Network(_) => "Check your internet connection; demo data is shown meanwhile.",
            PulseError::Timeout(_) => "The refresh took too long. The next poll will try again.",
            PulseError::ApiRateLimit => "Wait a few minutes before the next refresh.",
            PulseError::Configuration(_) => "Check your configuration in ~/.sahha-pulse/config.json",
            PulseError::InvalidPayload(_) => {
                "Send a JSON body of the form {event, timestamp, data: {profiles: [...]}}."
            }
            PulseError::ConfirmationRequired => "Repeat the request with ?confirm=true.",
            PulseError::ProfileNotFound(_) => "Refresh the profile list and try again.",
            PulseError::Storage(_) => "Check that ~/.sahha-pulse is writable.",
            PulseError::Parse(_) => "The Sahha API returned an unexpected shape.",
            PulseError::Io(_) => "Check file permissions and disk space.",
            PulseError::MissingCredentials => {
                "Add clientId and clientSecret to ~/.sahha-pulse/config.json"
            }
            PulseError::Unauthorized => "Verify the Sahha client credentials and environment.",
        }
    }

    /// HTTP status used when this error crosses the HTTP boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PulseError::InvalidPayload(_) | PulseError::ConfirmationRequired => {
                StatusCode::BAD_REQUEST
            }
            PulseError::ProfileNotFound(_) => StatusCode::NOT_FOUND,
            PulseError::ApiRateLimit => StatusCode::TOO_MANY_REQUESTS,
            PulseError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            PulseError::Network(_) | PulseError::Unauthorized | PulseError::Parse(_) => {
                StatusCode::BAD_GATEWAY
            }
            PulseError::MissingCredentials => StatusCode::SERVICE_UNAVAILABLE,
            PulseError::Configuration(_) | PulseError::Storage(_) | PulseError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<std::io::Error> for PulseError {
    fn from(err: std::io::Error) -> Self {
        PulseError::Io(err.to_string())
    }
}

impl From<DbError> for PulseError {
    fn from(err: DbError) -> Self {
        PulseError::Storage(err.to_string())
    }
}

impl From<SahhaApiError> for PulseError {
    fn from(err: SahhaApiError) -> Self {
        match err {
            SahhaApiError::MissingCredentials => PulseError::MissingCredentials,
            SahhaApiError::Unauthorized => PulseError::Unauthorized,
            SahhaApiError::RateLimited => PulseError::ApiRateLimit,
            SahhaApiError::Http(e) if e.is_timeout() => {
                PulseError::Timeout(crate::sahha_api::REQUEST_TIMEOUT_SECS)
            }
            SahhaApiError::Http(e) => PulseError::Network(e.to_string()),
            SahhaApiError::Status { status, body } => {
                PulseError::Network(format!("HTTP {status}: {body}"))
            }
            SahhaApiError::Decode(msg) => PulseError::Parse(msg),
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for PulseError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        PulseError::InvalidPayload(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for PulseError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        PulseError::InvalidPayload(rejection.body_text())
    }
}

/// Serializable error representation for API consumers
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&PulseError> for ErrorReport {
    fn from(err: &PulseError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        ErrorReport {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

/// Wire shape for failed requests: `{ success: false, error, details }`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub details: ErrorReport,
}

impl IntoResponse for PulseError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected: {}", self);
        }
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            details: ErrorReport::from(&self),
        };
        (status, Json(body)).into_response()
    }
}
