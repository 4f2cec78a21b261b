use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Error types for order operations
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Order not found")]
    NotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Order cannot be cancelled at this stage")]
    NotCancellable,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            OrderError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            OrderError::NotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
            OrderError::EmptyCart => (
                StatusCode::BAD_REQUEST,
                "Cart is empty; add items before checkout".to_string(),
            ),
            OrderError::InvalidTransition(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            OrderError::NotCancellable => (
                StatusCode::BAD_REQUEST,
                "Order cannot be cancelled at this stage".to_string(),
            ),
            OrderError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            OrderError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
