//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passkey_core::{CeremonyFailure, VerifierError};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registration ended unverified
    #[error("{0}")]
    Registration(CeremonyFailure),

    /// Authentication ended unverified
    #[error("{0}")]
    Authentication(CeremonyFailure),

    /// Ceremony core fault or refusal
    #[error(transparent)]
    Core(#[from] passkey_core::Error),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Registration(failure) => match failure {
                CeremonyFailure::UserNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Core(e) => match e {
                passkey_core::Error::UsernameTaken(_) => StatusCode::CONFLICT,
                passkey_core::Error::UnsupportedOperation(_) => StatusCode::NOT_IMPLEMENTED,
                // External service failures → 503
                passkey_core::Error::Verifier(_) => StatusCode::SERVICE_UNAVAILABLE,
                passkey_core::Error::Repository(_) | passkey_core::Error::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Registration(failure) | Self::Authentication(failure) => failure.code(),
            Self::Core(e) => match e {
                passkey_core::Error::UsernameTaken(_) => "USERNAME_TAKEN",
                passkey_core::Error::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
                passkey_core::Error::Verifier(VerifierError::InvalidResponse(_)) => {
                    "VERIFIER_INVALID_RESPONSE"
                }
                passkey_core::Error::Verifier(_) => "VERIFIER_UNAVAILABLE",
                passkey_core::Error::Repository(_) => "STORAGE_ERROR",
                passkey_core::Error::Config(_) => "CONFIG_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Core(e) => match e {
                passkey_core::Error::Verifier(_) => "Verification service unavailable".to_string(),
                passkey_core::Error::Repository(_) => "Credential storage error".to_string(),
                passkey_core::Error::Config(_) => "Server misconfigured".to_string(),
                _ => e.to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Whether the body should carry `verified: false`
    fn is_ceremony_failure(&self) -> bool {
        matches!(self, Self::Registration(_) | Self::Authentication(_))
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Registration(_) => "registration",
            Self::Authentication(_) => "authentication",
            Self::Core(_) => "core",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Authentication error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = if self.is_ceremony_failure() {
            serde_json::json!({
                "verified": false,
                "error": client_message,
                "code": code,
            })
        } else {
            serde_json::json!({
                "error": client_message,
                "code": code,
            })
        };

        (status, Json(body)).into_response()
    }
}
