use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::HookdError;
use crate::ledger::DeliveryFilter;
use crate::models::{Delivery, DeliveryStats, DeliveryStatus, Page, PageParams};
use crate::server::AppState;

// Pagination fields are inlined: serde_urlencoded cannot deserialize
// flattened numeric fields
#[derive(Deserialize)]
pub struct ListDeliveriesQuery {
    pub subscription_id: Option<String>,
    pub status: Option<String>,
    pub event: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub subscription_id: Option<String>,
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

pub async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<Page<Delivery>>, HookdError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            DeliveryStatus::parse(s)
                .ok_or_else(|| HookdError::Validation(format!("unknown status: {s}")))
        })
        .transpose()?;

    let filter = DeliveryFilter {
        subscription_id: query.subscription_id,
        status,
        event: query.event,
    };
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state.ledger.list(&filter, params)?;
    Ok(Json(page))
}

pub async fn delivery_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DeliveryStats>, HookdError> {
    let stats = state.ledger.stats(query.subscription_id.as_deref())?;
    Ok(Json(stats))
}

pub async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Delivery>, HookdError> {
    let delivery = state.ledger.get(&id)?;
    Ok(Json(delivery))
}

pub async fn recent_deliveries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Delivery>>, HookdError> {
    // 404 for an unknown subscription rather than an empty list
    state.registry.get(&id)?;
    let deliveries = state.ledger.recent(&id, query.limit)?;
    Ok(Json(deliveries))
}
