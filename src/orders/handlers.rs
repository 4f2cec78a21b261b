// HTTP handlers for order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::orders::{
    CancelOrderRequest, CheckoutRequest, OrderError, OrderListQuery, OrderListResponse,
    OrderResponse, UpdateStatusRequest,
};

/// Handler for POST /api/orders
/// Checkout: creates an order from the caller's cart
pub async fn create_order_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let order = state.order_service.checkout(&user, request).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// Handler for GET /api/orders
/// Role-scoped order listing with status filter and pagination
pub async fn list_orders_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderListResponse>, OrderError> {
    let orders = state.order_service.list(&user, query).await?;
    Ok(Json(orders))
}

/// Handler for GET /api/orders/{order_id}
pub async fn get_order_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state.order_service.get(&user, order_id).await?;
    Ok(Json(order))
}

/// Handler for PUT /api/orders/{order_id}/status
/// Vendor/delivery/admin status update, validated by the state machine
pub async fn update_order_status_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state
        .order_service
        .update_status(&user, order_id, request)
        .await?;
    Ok(Json(order))
}

/// Handler for PUT /api/orders/{order_id}/cancel
/// Customer/admin cancellation, only while pending or confirmed
pub async fn cancel_order_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<OrderResponse>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let order = state.order_service.cancel(&user, order_id, request).await?;
    Ok(Json(order))
}
