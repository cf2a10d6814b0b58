//! Error types for the SIWF Gateway

use crate::types::ErrorBody;
use actix_web::http::StatusCode;
use siwf_auth::error::{ErrorKind, SiwfError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    SignIn(#[from] SiwfError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatewayError::InvalidRequest(err.to_string())
    }
}

/// Status for a sign-in error kind
pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MalformedPayload | ErrorKind::ParseError => StatusCode::BAD_REQUEST,
        ErrorKind::PolicyViolation
        | ErrorKind::IdentityNotFound
        | ErrorKind::NonceAlreadyUsed
        | ErrorKind::NonceNotFound
        | ErrorKind::SessionInvalid
        | ErrorKind::AuthenticationFailed
        | ErrorKind::SignatureInvalid
        | ErrorKind::IdentityUnregistered
        | ErrorKind::SignerNotAuthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::IdentityMismatch => StatusCode::FORBIDDEN,
        ErrorKind::OracleUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::StorageUnavailable
        | ErrorKind::CredentialIssuanceFailed
        | ErrorKind::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl GatewayError {
    /// Client-facing body. Internal detail never leaves the server.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::SignIn(err) => {
                let status = status_for_kind(err.public_kind());
                let reason = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
                    "Internal error".to_string()
                } else {
                    err.public_reason()
                };
                ErrorBody {
                    error: err.public_kind().as_str().to_string(),
                    reason,
                    retryable: err.is_retryable(),
                    policy_reason: err.policy_reason(),
                }
            }
            Self::InvalidRequest(detail) => ErrorBody::new("invalid_request", detail.clone()),
            Self::Unauthorized(detail) => ErrorBody::new("unauthorized", detail.clone()),
            Self::DatabaseError(_) | Self::InternalError(_) => {
                ErrorBody::new("internal_error", "Internal error")
            }
        }
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::SignIn(err) => status_for_kind(err.public_kind()),
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        actix_web::HttpResponse::build(self.status_code()).json(self.body())
    }
}
