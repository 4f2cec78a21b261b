use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

/// Error types for cart operations
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cart not found")]
    NotFound,

    #[error("Restaurant group not found in cart: {0}")]
    RestaurantGroupNotFound(Uuid),

    #[error("Cart item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Menu item not found: {0}")]
    MenuItemNotFound(Uuid),

    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(Uuid),

    #[error("Item is not available: {0}")]
    ItemUnavailable(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Cart was modified concurrently, please retry")]
    VersionConflict,

    #[error("{0}")]
    CouponRejected(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        CartError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for CartError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            CartError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            CartError::NotFound => (StatusCode::NOT_FOUND, "Cart not found".to_string()),
            CartError::RestaurantGroupNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Restaurant {} has no items in the cart", id),
            ),
            CartError::ItemNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Cart item {} not found", id),
            ),
            CartError::MenuItemNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Menu item {} not found", id),
            ),
            CartError::RestaurantNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Restaurant {} not found", id),
            ),
            CartError::ItemUnavailable(name) => (
                StatusCode::BAD_REQUEST,
                format!("'{}' is currently not available", name),
            ),
            CartError::InvalidQuantity(q) => (
                StatusCode::BAD_REQUEST,
                format!("Quantity must be at least 1, got {}", q),
            ),
            CartError::InvalidSelection(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CartError::VersionConflict => (
                StatusCode::CONFLICT,
                "Cart was modified concurrently, please retry".to_string(),
            ),
            CartError::CouponRejected(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            CartError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
