// HTTP handlers for cart endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::cart::{
    AddItemRequest, ApplyCouponRequest, Cart, CartError, RemoveItemRequest, UpdateQuantityRequest,
};

/// Handler for GET /api/cart
/// Returns the caller's cart, creating an empty one on first access
pub async fn get_cart_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Cart>, CartError> {
    let cart = state.cart_service.get_or_create(user.user_id).await?;
    Ok(Json(cart))
}

/// Handler for POST /api/cart/items
/// Adds a menu item with its selected customizations
pub async fn add_to_cart_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<Cart>, CartError> {
    request
        .validate()
        .map_err(|e| CartError::ValidationError(e.to_string()))?;

    let cart = state.cart_service.add_item(user.user_id, request).await?;
    Ok(Json(cart))
}

/// Handler for PUT /api/cart/items/{item_id}
/// Updates a line's quantity; zero or less removes it
pub async fn update_cart_item_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<Cart>, CartError> {
    let cart = state
        .cart_service
        .update_item_quantity(user.user_id, request.restaurant_id, item_id, request.quantity)
        .await?;
    Ok(Json(cart))
}

/// Handler for DELETE /api/cart/items/{item_id}
/// Removes a line from the cart
pub async fn remove_from_cart_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
    Json(request): Json<RemoveItemRequest>,
) -> Result<Json<Cart>, CartError> {
    let cart = state
        .cart_service
        .remove_item(user.user_id, request.restaurant_id, item_id)
        .await?;
    Ok(Json(cart))
}

/// Handler for DELETE /api/cart
/// Empties the cart and drops the applied coupon
pub async fn clear_cart_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Cart>, CartError> {
    let cart = state.cart_service.clear(user.user_id).await?;
    Ok(Json(cart))
}

/// Handler for POST /api/cart/apply-coupon
/// Validates a coupon against the cart and stores its snapshot
pub async fn apply_coupon_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ApplyCouponRequest>,
) -> Result<Json<Cart>, CartError> {
    request
        .validate()
        .map_err(|e| CartError::ValidationError(e.to_string()))?;

    let cart = state
        .cart_service
        .apply_coupon(user.user_id, &request.code)
        .await?;
    Ok(Json(cart))
}
