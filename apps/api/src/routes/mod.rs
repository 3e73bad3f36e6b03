pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::email::handlers::handle_send_email;
use crate::farmers::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Farmers
        .route(
            "/farmers",
            get(handlers::handle_list_farmers).post(handlers::handle_create_farmer),
        )
        .route(
            "/farmers/:id",
            get(handlers::handle_get_farmer).put(handlers::handle_update_farmer),
        )
        // Embedded farms and comments
        .route(
            "/farmers/:id/farms",
            get(handlers::handle_list_farms).post(handlers::handle_create_farm),
        )
        .route("/farms/:farm_id", put(handlers::handle_update_farm))
        .route(
            "/farmers/:id/comments",
            get(handlers::handle_list_comments).post(handlers::handle_create_comment),
        )
        // Memberships
        .route(
            "/farmers/:id/memberships",
            post(handlers::handle_create_membership),
        )
        .route(
            "/farmers/:id/memberships/active",
            get(handlers::handle_active_membership),
        )
        .route(
            "/farmers/:id/memberships/:member_id",
            put(handlers::handle_update_membership),
        )
        // Email proxy
        .route("/email", post(handle_send_email))
        .with_state(state)
}
