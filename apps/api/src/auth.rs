//! Session check for endpoints that need a signed-in caller.
//!
//! Session issuance lives outside this service; callers present the session
//! token as `Authorization: Bearer <token>`.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::errors::AppError;

#[derive(Debug, Clone, Default)]
pub struct SessionValidator {
    tokens: Arc<HashSet<String>>,
}

impl SessionValidator {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: Arc::new(tokens.into_iter().collect()),
        }
    }

    /// Succeeds when the request carries a known session token.
    pub fn require(&self, headers: &HeaderMap) -> Result<(), AppError> {
        match extract_token_from_header(headers) {
            Some(token) if self.tokens.contains(token) => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }
}

pub fn extract_token_from_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
