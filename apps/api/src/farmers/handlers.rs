use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::{AppError, AppJson};
use crate::farmers::records;
use crate::models::farmer::{store_now, Comment, Farm, Farmer, Fields, UpdateSummary};
use crate::state::AppState;
use crate::store::Criteria;

/// GET /farmers
pub async fn handle_list_farmers(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Farmer>>, AppError> {
    let criteria = Criteria::from_query(params)?;
    let farmers = records::list_farmers(state.store.as_ref(), &criteria).await?;
    Ok(Json(farmers))
}

/// POST /farmers
pub async fn handle_create_farmer(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Fields>,
) -> Result<Json<Farmer>, AppError> {
    let farmer = records::create_farmer(state.store.as_ref(), payload, store_now()).await?;
    Ok(Json(farmer))
}

/// GET /farmers/:id
pub async fn handle_get_farmer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Farmer>, AppError> {
    Ok(Json(records::get_farmer_by_id(state.store.as_ref(), &id).await?))
}

/// PUT /farmers/:id
pub async fn handle_update_farmer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(patch): AppJson<Fields>,
) -> Result<Json<UpdateSummary>, AppError> {
    let summary = records::update_farmer_by_id(state.store.as_ref(), &id, patch).await?;
    Ok(Json(summary))
}

/// GET /farmers/:id/farms
pub async fn handle_list_farms(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Farm>>, AppError> {
    Ok(Json(records::list_farms_for_farmer(state.store.as_ref(), &id).await?))
}

/// POST /farmers/:id/farms
pub async fn handle_create_farm(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<Fields>,
) -> Result<Json<Farmer>, AppError> {
    Ok(Json(records::create_farm(state.store.as_ref(), &id, payload).await?))
}

/// PUT /farms/:farm_id
pub async fn handle_update_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
    AppJson(patch): AppJson<Fields>,
) -> Result<Json<UpdateSummary>, AppError> {
    let summary = records::update_farm_by_id(state.store.as_ref(), &farm_id, patch).await?;
    Ok(Json(summary))
}

/// GET /farmers/:id/comments
pub async fn handle_list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(records::list_comments_for_farmer(state.store.as_ref(), &id).await?))
}

/// POST /farmers/:id/comments
pub async fn handle_create_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<Fields>,
) -> Result<Json<Farmer>, AppError> {
    let farmer = records::create_farmer_comment(state.store.as_ref(), &id, payload).await?;
    Ok(Json(farmer))
}

/// POST /farmers/:id/memberships
pub async fn handle_create_membership(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<Fields>,
) -> Result<Json<Farmer>, AppError> {
    let farmer =
        records::create_membership(state.store.as_ref(), &id, payload, store_now()).await?;
    Ok(Json(farmer))
}

/// GET /farmers/:id/memberships/active
/// Responds with `{}` when no membership is in force.
pub async fn handle_active_membership(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let active = records::get_active_membership(state.store.as_ref(), &id, store_now()).await?;
    let body = match active {
        Some(membership) => serde_json::to_value(membership).map_err(anyhow::Error::from)?,
        None => json!({}),
    };
    Ok(Json(body))
}

/// PUT /farmers/:id/memberships/:member_id
pub async fn handle_update_membership(
    State(state): State<AppState>,
    Path((id, member_id)): Path<(String, String)>,
    AppJson(patch): AppJson<Fields>,
) -> Result<Json<Farmer>, AppError> {
    let farmer =
        records::update_membership(state.store.as_ref(), &id, &member_id, patch, store_now())
            .await?;
    Ok(Json(farmer))
}
