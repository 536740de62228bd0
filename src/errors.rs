use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    // One opaque message for every token failure mode, so callers cannot
    // distinguish tampering from expiry.
    #[error("invalid or expired link")]
    InvalidToken,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("that date is not available")]
    DateUnavailable,

    #[error("booking is already paid")]
    AlreadyPaid,

    #[error("booking is already cancelled")]
    AlreadyCancelled,

    #[error("too many requests, try again shortly")]
    RateLimited,

    #[error("payment provider error: {0}")]
    Payment(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DateUnavailable => StatusCode::CONFLICT,
            AppError::AlreadyPaid => StatusCode::CONFLICT,
            AppError::AlreadyCancelled => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
