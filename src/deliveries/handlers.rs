// HTTP handlers for delivery endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::deliveries::{
    AssignPartnerRequest, Delivery, DeliveryError, DeliveryListQuery, MarkDeliveredRequest,
    NearbyDelivery, NearbyQuery, UpdateDeliveryStatusRequest, UpdateLocationRequest,
};
use crate::validation::{validate_latitude, validate_longitude};

/// Handler for GET /api/deliveries
/// Lists deliveries for the calling partner (or all, for admins)
pub async fn list_deliveries_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DeliveryListQuery>,
) -> Result<Json<Vec<Delivery>>, DeliveryError> {
    let deliveries = state.delivery_service.list(&user, query).await?;
    Ok(Json(deliveries))
}

/// Handler for GET /api/deliveries/available
/// Pending deliveries within range of the partner's reported location
pub async fn available_deliveries_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyDelivery>>, DeliveryError> {
    validate_latitude(query.latitude)
        .and_then(|_| validate_longitude(query.longitude))
        .map_err(|_| DeliveryError::ValidationError("Invalid coordinates".to_string()))?;

    let deliveries = state
        .delivery_service
        .nearby(&user, query.latitude, query.longitude)
        .await?;
    Ok(Json(deliveries))
}

/// Handler for GET /api/deliveries/{id}
pub async fn get_delivery_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, DeliveryError> {
    let delivery = state.delivery_service.get(&user, id).await?;
    Ok(Json(delivery))
}

/// Handler for PUT /api/deliveries/{id}/assign
/// Proposes a partner for a delivery (admin)
pub async fn assign_delivery_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignPartnerRequest>,
) -> Result<Json<Delivery>, DeliveryError> {
    let delivery = state
        .delivery_service
        .assign(&user, id, request.delivery_partner_id)
        .await?;
    Ok(Json(delivery))
}

/// Handler for PUT /api/deliveries/{id}/accept
/// Accepts an assigned delivery; exactly one racing partner wins
pub async fn accept_delivery_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, DeliveryError> {
    let delivery = state.delivery_service.accept(&user, id).await?;
    Ok(Json(delivery))
}

/// Handler for PUT /api/deliveries/{id}/reject
/// Declines an assignment; the delivery goes back into rotation
pub async fn reject_delivery_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, DeliveryError> {
    let delivery = state.delivery_service.reject(&user, id).await?;
    Ok(Json(delivery))
}

/// Handler for PUT /api/deliveries/{id}/location
/// Records a courier location report and broadcasts it
pub async fn update_location_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<Delivery>, DeliveryError> {
    request
        .validate()
        .map_err(|e| DeliveryError::ValidationError(e.to_string()))?;

    let delivery = state
        .delivery_service
        .update_location(&user, id, request)
        .await?;
    Ok(Json(delivery))
}

/// Handler for PUT /api/deliveries/{id}/status
/// Updates physical delivery progress
pub async fn update_delivery_status_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDeliveryStatusRequest>,
) -> Result<Json<Delivery>, DeliveryError> {
    let delivery = state
        .delivery_service
        .update_status(&user, id, request)
        .await?;
    Ok(Json(delivery))
}

/// Handler for PUT /api/deliveries/{id}/deliver
/// Completes a delivery with proof of handover
pub async fn mark_delivered_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<MarkDeliveredRequest>,
) -> Result<Json<Delivery>, DeliveryError> {
    let delivery = state
        .delivery_service
        .mark_delivered(&user, id, request)
        .await?;
    Ok(Json(delivery))
}
