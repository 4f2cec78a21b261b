// HTTP handlers for coupon endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthenticatedUser, Role};
use crate::coupons::{
    Coupon, CouponError, CouponPreviewResponse, CreateCouponRequest, UpdateCouponRequest,
    ValidateCouponRequest,
};

/// Handler for POST /api/coupons/validate
/// Previews a coupon against a proposed order amount without recording usage
pub async fn validate_coupon_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<CouponPreviewResponse>, CouponError> {
    request
        .validate()
        .map_err(|e| CouponError::ValidationError(e.to_string()))?;

    let preview = state
        .coupon_service
        .preview(&request.code, user.user_id, request.order_amount)
        .await?;

    Ok(Json(preview))
}

/// Handler for GET /api/coupons
/// Lists active coupons currently inside their validity window
pub async fn list_coupons_handler(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<Coupon>>, CouponError> {
    let coupons = state.coupon_service.list_active().await?;
    Ok(Json(coupons))
}

/// Handler for POST /api/coupons
/// Creates a new coupon (admin only)
pub async fn create_coupon_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Coupon>), CouponError> {
    user.require_role(&[Role::Admin])
        .map_err(|e| CouponError::Forbidden(e.to_string()))?;

    request
        .validate()
        .map_err(|e| CouponError::ValidationError(e.to_string()))?;

    let coupon = state.coupon_service.create(request, user.user_id).await?;

    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Handler for PUT /api/coupons/{id}
/// Amends a coupon's amendable fields (admin only)
pub async fn update_coupon_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCouponRequest>,
) -> Result<Json<Coupon>, CouponError> {
    user.require_role(&[Role::Admin])
        .map_err(|e| CouponError::Forbidden(e.to_string()))?;

    request
        .validate()
        .map_err(|e| CouponError::ValidationError(e.to_string()))?;

    let coupon = state.coupon_service.update(id, request).await?;

    Ok(Json(coupon))
}

/// Handler for DELETE /api/coupons/{id}
/// Soft-deactivates a coupon; the row and its usage ledger are kept
pub async fn deactivate_coupon_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, CouponError> {
    user.require_role(&[Role::Admin])
        .map_err(|e| CouponError::Forbidden(e.to_string()))?;

    state.coupon_service.deactivate(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
