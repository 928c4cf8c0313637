use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::HookdError;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct EmitEventRequest {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Announce an event occurrence. Returns as soon as the event is queued;
/// delivery outcomes are observable only through the ledger endpoints.
pub async fn emit_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmitEventRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), HookdError> {
    state.emitter.emit(&req.event, req.payload)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "queued" })),
    ))
}
