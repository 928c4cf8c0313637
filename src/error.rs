use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error taxonomy for the webhook core
#[derive(Debug, thiserror::Error)]
pub enum HookdError {
    /// Malformed administrative input (bad URL, empty event list, empty update)
    #[error("validation error: {0}")]
    Validation(String),

    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("delivery not found: {0}")]
    DeliveryNotFound(String),

    /// Persistence failure; carries context from the db layer
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Standard error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

impl IntoResponse for HookdError {
    fn into_response(self) -> Response {
        let status = match &self {
            HookdError::Validation(_) => StatusCode::BAD_REQUEST,
            HookdError::SubscriptionNotFound(_) | HookdError::DeliveryNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            HookdError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
