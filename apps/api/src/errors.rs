use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::email::EmailError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload or patch violates the record schema.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An identifier that is not a syntactically valid store id.
    #[error("Cast error: {0}")]
    Cast(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn farmer_not_found() -> Self {
        AppError::NotFound("Farmer Not Found".to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => AppError::Validation(msg),
            StoreError::Cast(msg) => AppError::Cast(msg),
            StoreError::Database(e) => AppError::Database(e.to_string()),
            StoreError::Corrupt(msg) => AppError::Database(msg),
        }
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::Email(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// `Json` extractor whose rejections use the `AppError` body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Maps an error to its HTTP status and stable error code.
///
/// Every handler funnels failures through here, so 400 vs 404 vs 500 is
/// decided in exactly one place.
pub fn classify(err: &AppError) -> (StatusCode, &'static str) {
    match err {
        AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        AppError::Cast(_) => (StatusCode::BAD_REQUEST, "CAST_ERROR"),
        AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        AppError::Email(_) => (StatusCode::BAD_GATEWAY, "EMAIL_ERROR"),
        AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = classify(&self);

        let message = match &self {
            AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Cast(msg)
            | AppError::Database(msg)
            | AppError::Email(msg) => msg.clone(),
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::Internal(e) => format!("{e:#}"),
        };

        if status.is_server_error() {
            tracing::error!("{code}: {message}");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
