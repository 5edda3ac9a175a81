use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use sickfits_auth::{AuthzError, PasswordError, SessionTokenError};
use sickfits_core::DomainError;
use sickfits_infra::{MailError, StoreError};

/// Every failure an API operation can report.
///
/// The first seven variants carry the human-readable message the client
/// sees. Collaborator failures are logged in full and reported generically.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidCredential(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidOrExpired(String),

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidOrExpired(_) => StatusCode::BAD_REQUEST,
            AppError::ConstraintViolation(_) => StatusCode::CONFLICT,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Mail(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidCredential(_) => "invalid_credential",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidOrExpired(_) => "invalid_or_expired",
            AppError::ConstraintViolation(_) => "constraint_violation",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::Store(_) => "store_error",
            AppError::Mail(_) => "mail_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::ConstraintViolation(msg),
            other => AppError::Store(other),
        }
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => AppError::Unauthenticated(err.to_string()),
            AuthzError::Forbidden { .. } => AppError::Forbidden(err.to_string()),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<SessionTokenError> for AppError {
    fn from(err: SessionTokenError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            AppError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                "Something went wrong on our end.".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                "Something went wrong on our end.".to_string()
            }
            AppError::Mail(e) => {
                tracing::error!(error = %e, "mail failure");
                "Could not send email.".to_string()
            }
            other => other.to_string(),
        };
        json_error(status, self.code(), message)
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
