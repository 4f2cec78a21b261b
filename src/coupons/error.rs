use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::coupons::validator::CouponRejection;

/// Error types for coupon operations
#[derive(Debug, thiserror::Error)]
pub enum CouponError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid coupon code")]
    NotFound,

    #[error("Coupon not found: {0}")]
    NotFoundById(String),

    #[error("{0}")]
    Rejected(CouponRejection),

    #[error("Coupon code '{0}' already exists")]
    DuplicateCode(String),

    #[error("Usage limit reached for coupon {0}")]
    UsageCommitConflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<sqlx::Error> for CouponError {
    fn from(err: sqlx::Error) -> Self {
        CouponError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for CouponError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            CouponError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            CouponError::NotFound => (StatusCode::NOT_FOUND, "Invalid coupon code".to_string()),
            CouponError::NotFoundById(id) => (
                StatusCode::NOT_FOUND,
                format!("Coupon with id {} not found", id),
            ),
            // Rejections carry the exact user-displayable reason
            CouponError::Rejected(rejection) => (StatusCode::BAD_REQUEST, rejection.to_string()),
            CouponError::DuplicateCode(code) => (
                StatusCode::CONFLICT,
                format!("Coupon code '{}' already exists", code),
            ),
            CouponError::UsageCommitConflict(code) => (
                StatusCode::CONFLICT,
                format!("Usage limit reached for coupon {}", code),
            ),
            CouponError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CouponError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
