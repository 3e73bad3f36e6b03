use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::Value;

use crate::email::EmailError;
use crate::errors::AppError;
use crate::state::AppState;

/// POST /email
/// Requires a session; forwards the body to the email provider.
/// Provider failures surface as 502 (and are logged by `AppError`).
pub async fn handle_send_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    // Session check precedes body parsing.
    state.sessions.require(&headers)?;

    let message: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))?;

    let mailer = state.mailer.as_ref().ok_or(EmailError::NotConfigured)?;
    Ok(Json(mailer.send(&message).await?))
}
