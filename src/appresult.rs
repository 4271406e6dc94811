use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("login required")]
    Unauthenticated,
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("you can not follow yourself")]
    SelfFollow,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    pub fn permission_denied() -> Self {
        Self::PermissionDenied("permission denied".to_owned())
    }

    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Validation(_) | SelfFollow => StatusCode::UNPROCESSABLE_ENTITY,
            InvalidCredentials | Unauthenticated => StatusCode::UNAUTHORIZED,
            PermissionDenied(_) => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            AlreadyExists(_) | Conflict(_) => StatusCode::CONFLICT,
            Upstream(_) => StatusCode::BAD_GATEWAY,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable kind, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        use AppError::*;
        match self {
            Validation(_) => "validation_error",
            InvalidCredentials => "invalid_credentials",
            Unauthenticated => "unauthenticated",
            PermissionDenied(_) => "permission_denied",
            NotFound(_) => "not_found",
            AlreadyExists(_) => "already_exists",
            SelfFollow => "self_follow",
            Conflict(_) => "conflict",
            Upstream(_) => "upstream_error",
            Internal(_) => "internal_error",
        }
    }

    /// Message safe to show to the requester. Internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "internal error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(err) = &self {
            tracing::error!(error = %err, backtrace = %err.backtrace(), "request failed");
        }

        let mut body = json!({
            "status": "error",
            "code": self.code(),
            "message": self.public_message(),
        });
        if let AppError::Validation(errors) = &self {
            body["errors"] = json!(errors);
        }

        (self.status(), Json(body)).into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::Internal(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::Internal(anyhow::Error::msg(err.to_owned()))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(sqlx::migrate::MigrateError);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(jsonwebtoken::errors::Error);
apperr_impl!(std::io::Error);
