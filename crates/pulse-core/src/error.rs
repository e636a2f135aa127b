//! Error types and result handling for webhook processing.
//!
//! Splits failures into storage-level errors raised by the repositories and
//! request-level errors raised while dispatching one webhook. Every
//! request-level error carries a stable code so logs can be correlated
//! without leaking details to the webhook sender.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::ConstraintViolation(format!("check constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Request-level errors raised while processing a webhook.
#[derive(Debug, Error)]
pub enum PulseError {
    /// HMAC signature missing or mismatched (P1001).
    #[error("[P1001] Invalid signature: {reason}")]
    InvalidSignature {
        /// Why the signature was rejected
        reason: String,
    },

    /// Inbound body is not valid JSON (P1002).
    #[error("[P1002] Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Upstream API answered with a non-success status (P2001).
    #[error("[P2001] Upstream {service} returned HTTP {status}")]
    UpstreamStatus {
        /// Name of the upstream service
        service: &'static str,
        /// HTTP status code returned
        status: u16,
    },

    /// Upstream API answered with a body we cannot interpret (P2002).
    #[error("[P2002] Upstream {service} sent an unexpected body: {message}")]
    UpstreamFormat {
        /// Name of the upstream service
        service: &'static str,
        /// What was wrong with the body
        message: String,
    },

    /// Transport-level HTTP failure (P2003).
    #[error("[P2003] HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store operation failed (P3001).
    #[error("[P3001] Storage error: {0}")]
    Storage(#[from] CoreError),
}

impl PulseError {
    /// Creates an invalid-signature error.
    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature { reason: reason.into() }
    }

    /// Creates an upstream-format error for the named service.
    pub fn upstream_format(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamFormat { service, message: message.into() }
    }

    /// Returns the error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature { .. } => "P1001",
            Self::MalformedPayload(_) => "P1002",
            Self::UpstreamStatus { .. } => "P2001",
            Self::UpstreamFormat { .. } => "P2002",
            Self::Http(_) => "P2003",
            Self::Storage(_) => "P3001",
        }
    }

    /// Returns whether the sender is at fault rather than this service or
    /// one of its dependencies.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidSignature { .. })
    }

    /// HTTP status the webhook sender receives for this error.
    pub const fn status_code(&self) -> u16 {
        if self.is_client_error() {
            401
        } else {
            500
        }
    }
}
