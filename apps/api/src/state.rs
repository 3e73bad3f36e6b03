use std::sync::Arc;

use crate::auth::SessionValidator;
use crate::email::Mailer;
use crate::store::FarmerStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Mongo in production; in-memory when no `MONGODB_URI` is set.
    pub store: Arc<dyn FarmerStore>,
    /// `None` when no provider key is configured.
    pub mailer: Option<Arc<dyn Mailer>>,
    pub sessions: SessionValidator,
}
