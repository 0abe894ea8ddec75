use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::error;

use crate::users::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::ConstraintViolation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        let body = match &self {
            AppError::Validation(errors) => json!({
                "message": "Validation failed",
                "status": status.as_u16(),
                "timestamp": timestamp,
                "errors": errors.fields(),
            }),
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                json!({
                    "message": "An internal error occurred",
                    "status": status.as_u16(),
                    "timestamp": timestamp,
                })
            }
            other => json!({
                "message": other.to_string(),
                "status": status.as_u16(),
                "timestamp": timestamp,
            }),
        };

        (status, Json(body)).into_response()
    }
}
