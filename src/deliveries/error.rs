use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Error types for delivery operations
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Delivery not found")]
    NotFound,

    #[error("Delivery cannot be accepted")]
    NotAcceptable,

    #[error("Delivery was already accepted by another partner")]
    AlreadyAccepted,

    #[error("Delivery cannot be assigned in its current state")]
    NotAssignable,

    #[error("Invalid status change: {0}")]
    InvalidStatusChange(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for DeliveryError {
    fn from(err: sqlx::Error) -> Self {
        DeliveryError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            DeliveryError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            DeliveryError::NotFound => (StatusCode::NOT_FOUND, "Delivery not found".to_string()),
            DeliveryError::NotAcceptable => (
                StatusCode::BAD_REQUEST,
                "Delivery cannot be accepted".to_string(),
            ),
            // Lost race: another partner won the conditional update
            DeliveryError::AlreadyAccepted => (
                StatusCode::CONFLICT,
                "Delivery was already accepted by another partner".to_string(),
            ),
            DeliveryError::NotAssignable => (
                StatusCode::CONFLICT,
                "Delivery cannot be assigned in its current state".to_string(),
            ),
            DeliveryError::InvalidStatusChange(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            DeliveryError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            DeliveryError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
