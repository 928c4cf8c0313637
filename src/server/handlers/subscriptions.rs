use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::HookdError;
use crate::models::{
    Delivery, Page, PageParams, SubscriptionInfo, SubscriptionWithSecret,
};
use crate::registry::SubscriptionUpdate;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct CreateSubscriptionRequest {
    pub name: String,
    pub url: String,
    pub events: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

// Pagination fields are inlined: serde_urlencoded cannot deserialize
// flattened numeric fields
#[derive(Deserialize)]
pub struct ListSubscriptionsQuery {
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Register a new subscription. The response is the only time the generated
/// secret is returned in full.
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionWithSecret>), HookdError> {
    let sub = state
        .registry
        .create(&req.name, &req.url, req.events, req.active)?;
    Ok((StatusCode::CREATED, Json(sub.into())))
}

pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSubscriptionsQuery>,
) -> Result<Json<Page<SubscriptionInfo>>, HookdError> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state.registry.list(query.active, params)?;
    Ok(Json(page.map(Into::into)))
}

pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SubscriptionInfo>, HookdError> {
    let sub = state.registry.get(&id)?;
    Ok(Json(sub.into()))
}

pub async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<SubscriptionUpdate>,
) -> Result<Json<SubscriptionInfo>, HookdError> {
    let sub = state.registry.update(&id, update)?;
    Ok(Json(sub.into()))
}

pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, HookdError> {
    state.registry.delete(&id)?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

/// Rotate the signing secret; in-flight deliveries keep their snapshot
pub async fn regenerate_secret(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SubscriptionWithSecret>, HookdError> {
    let sub = state.registry.regenerate_secret(&id)?;
    Ok(Json(sub.into()))
}

/// Send a synthetic test event to this subscription and report the outcome
pub async fn test_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Delivery>, HookdError> {
    let sub = state.registry.get(&id)?;
    let delivery = state.dispatcher.dispatch_test(&sub).await?;
    Ok(Json(delivery))
}
