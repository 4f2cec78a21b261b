use chrono::Utc;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Role};
use crate::deliveries::{
    geo, AssignmentStatus, Delivery, DeliveryError, DeliveryListQuery, DeliveryProof,
    DeliveryStatus, DeliveriesRepository, MarkDeliveredRequest, NearbyDelivery,
    UpdateDeliveryStatusRequest, UpdateLocationRequest,
};
use crate::events::{AppEvent, EventBus};
use crate::orders::{OrderStatus, OrdersRepository, StatusMachine};

/// Search radius for pending deliveries around a partner
pub const NEARBY_RADIUS_KM: f64 = 5.0;

/// Result page cap for the nearby search, bounding partner-app load
pub const NEARBY_RESULT_LIMIT: usize = 10;

/// Upper bound on candidates pulled for proximity filtering
const NEARBY_CANDIDATE_CAP: u32 = 200;

/// Service for delivery business logic
#[derive(Clone)]
pub struct DeliveryService {
    deliveries: DeliveriesRepository,
    orders: OrdersRepository,
    events: EventBus,
}

impl DeliveryService {
    /// Create a new DeliveryService
    pub fn new(
        deliveries: DeliveriesRepository,
        orders: OrdersRepository,
        events: EventBus,
    ) -> Self {
        Self {
            deliveries,
            orders,
            events,
        }
    }

    /// List deliveries: partners see their own, admins see everything
    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        query: DeliveryListQuery,
    ) -> Result<Vec<Delivery>, DeliveryError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let offset = (page - 1) * limit;

        match actor.role {
            Role::Delivery => {
                self.deliveries
                    .list_for_partner(actor.user_id, query.status, limit, offset)
                    .await
            }
            Role::Admin => self.deliveries.list_all(query.status, limit, offset).await,
            _ => Err(DeliveryError::Forbidden(
                "Only delivery partners and admins can list deliveries".to_string(),
            )),
        }
    }

    /// Fetch one delivery, visible to its partner, an admin, or the
    /// customer of the underlying order
    pub async fn get(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
    ) -> Result<Delivery, DeliveryError> {
        let delivery = self
            .deliveries
            .find_by_id(delivery_id)
            .await?
            .ok_or(DeliveryError::NotFound)?;

        let permitted = match actor.role {
            Role::Admin => true,
            Role::Delivery => delivery.delivery_partner_id == Some(actor.user_id),
            Role::Customer => {
                let order = self
                    .orders
                    .find_by_id(delivery.order_id)
                    .await
                    .map_err(|e| DeliveryError::DatabaseError(e.to_string()))?;
                order.map(|o| o.customer_id == actor.user_id).unwrap_or(false)
            }
            Role::Vendor => false,
        };

        if !permitted {
            return Err(DeliveryError::Forbidden(
                "You do not have access to this delivery".to_string(),
            ));
        }

        Ok(delivery)
    }

    /// Pending, unassigned deliveries within range of a partner's location
    ///
    /// Ordered nearest first and capped to a small page.
    pub async fn nearby(
        &self,
        actor: &AuthenticatedUser,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<NearbyDelivery>, DeliveryError> {
        if actor.role != Role::Delivery {
            return Err(DeliveryError::Forbidden(
                "Only delivery partners can search for deliveries".to_string(),
            ));
        }

        let candidates = self
            .deliveries
            .list_pending_unassigned(NEARBY_CANDIDATE_CAP)
            .await?;

        let mut nearby: Vec<NearbyDelivery> = candidates
            .into_iter()
            .map(|delivery| {
                let distance = geo::distance_km(
                    latitude,
                    longitude,
                    delivery.pickup_latitude,
                    delivery.pickup_longitude,
                );
                NearbyDelivery {
                    delivery,
                    distance_km: distance,
                }
            })
            .filter(|candidate| candidate.distance_km <= NEARBY_RADIUS_KM)
            .collect();

        nearby.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        nearby.truncate(NEARBY_RESULT_LIMIT);

        Ok(nearby)
    }

    /// Propose a partner for a delivery (admin/system operation)
    pub async fn assign(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
        partner_id: i32,
    ) -> Result<Delivery, DeliveryError> {
        if actor.role != Role::Admin {
            return Err(DeliveryError::Forbidden(
                "Only admins can assign deliveries".to_string(),
            ));
        }

        let assigned = self
            .deliveries
            .try_assign(delivery_id, partner_id, Utc::now())
            .await?;

        match assigned {
            Some(delivery) => {
                self.orders
                    .set_delivery_partner(delivery.order_id, partner_id)
                    .await
                    .map_err(|e| DeliveryError::DatabaseError(e.to_string()))?;

                tracing::info!(
                    "Assigned delivery {} to partner {}",
                    delivery.id,
                    partner_id
                );

                self.events.publish(AppEvent::DeliveryStatusChanged {
                    delivery_id: delivery.id,
                    order_id: delivery.order_id,
                    status: delivery.status,
                    timestamp: Utc::now(),
                });

                Ok(delivery)
            }
            None => match self.deliveries.find_by_id(delivery_id).await? {
                Some(_) => Err(DeliveryError::NotAssignable),
                None => Err(DeliveryError::NotFound),
            },
        }
    }

    /// Accept an assigned delivery
    ///
    /// Races between partners resolve in the repository's conditional
    /// update: exactly one accept wins, the rest see AlreadyAccepted.
    pub async fn accept(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
    ) -> Result<Delivery, DeliveryError> {
        let accepted = self
            .deliveries
            .try_accept(delivery_id, actor.user_id, Utc::now())
            .await?;

        match accepted {
            Some(delivery) => {
                tracing::info!(
                    "Partner {} accepted delivery {}",
                    actor.user_id,
                    delivery.id
                );
                Ok(delivery)
            }
            None => match self.deliveries.find_by_id(delivery_id).await? {
                Some(existing) if existing.assignment_status == AssignmentStatus::Accepted => {
                    Err(DeliveryError::AlreadyAccepted)
                }
                Some(_) => Err(DeliveryError::NotAcceptable),
                None => Err(DeliveryError::NotFound),
            },
        }
    }

    /// Decline an assignment; the delivery goes back into rotation
    pub async fn reject(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
    ) -> Result<Delivery, DeliveryError> {
        let rejected = self
            .deliveries
            .try_reject(delivery_id, actor.user_id)
            .await?;

        match rejected {
            Some(delivery) => {
                tracing::info!(
                    "Partner {} rejected delivery {}",
                    actor.user_id,
                    delivery.id
                );
                Ok(delivery)
            }
            None => match self.deliveries.find_by_id(delivery_id).await? {
                Some(_) => Err(DeliveryError::NotAcceptable),
                None => Err(DeliveryError::NotFound),
            },
        }
    }

    /// Record a courier location report and broadcast it
    pub async fn update_location(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
        request: UpdateLocationRequest,
    ) -> Result<Delivery, DeliveryError> {
        let mut delivery = self.owned_delivery(actor, delivery_id).await?;

        delivery.update_location(
            request.latitude,
            request.longitude,
            request.speed,
            request.accuracy,
            Utc::now(),
        );

        let saved = self.deliveries.save_location(&delivery).await?;

        self.events.publish(AppEvent::DeliveryLocationUpdated {
            delivery_id: saved.id,
            order_id: saved.order_id,
            latitude: request.latitude,
            longitude: request.longitude,
            timestamp: Utc::now(),
        });

        Ok(saved)
    }

    /// Update physical delivery progress
    pub async fn update_status(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
        request: UpdateDeliveryStatusRequest,
    ) -> Result<Delivery, DeliveryError> {
        let mut delivery = self.owned_delivery(actor, delivery_id).await?;

        if delivery.status.is_terminal() {
            return Err(DeliveryError::InvalidStatusChange(format!(
                "Delivery is already {}",
                delivery.status
            )));
        }

        let now = Utc::now();
        delivery.status = request.status;
        delivery.apply_status_timestamp(request.status, now);

        if request.status == DeliveryStatus::Failed {
            delivery.failure_reason = request.failure_reason;
            delivery.failure_note = request.failure_note;
        }
        if request.status == DeliveryStatus::Delivered {
            delivery.mark_as_delivered(DeliveryProof::default(), now);
        }

        let saved = self.deliveries.save_progress(&delivery).await?;

        self.events.publish(AppEvent::DeliveryStatusChanged {
            delivery_id: saved.id,
            order_id: saved.order_id,
            status: saved.status,
            timestamp: now,
        });

        if saved.status == DeliveryStatus::Delivered {
            self.complete_order(&saved).await?;
        }

        Ok(saved)
    }

    /// Complete a delivery with proof of handover
    pub async fn mark_delivered(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
        request: MarkDeliveredRequest,
    ) -> Result<Delivery, DeliveryError> {
        let mut delivery = self.owned_delivery(actor, delivery_id).await?;

        if delivery.status.is_terminal() && delivery.status != DeliveryStatus::Delivered {
            return Err(DeliveryError::InvalidStatusChange(format!(
                "Delivery is already {}",
                delivery.status
            )));
        }

        let now = Utc::now();
        delivery.mark_as_delivered(
            DeliveryProof {
                photo: request.photo,
                signature: request.signature,
                otp: request.otp,
                notes: request.notes,
            },
            now,
        );

        let saved = self.deliveries.save_progress(&delivery).await?;

        self.events.publish(AppEvent::DeliveryStatusChanged {
            delivery_id: saved.id,
            order_id: saved.order_id,
            status: saved.status,
            timestamp: now,
        });

        self.complete_order(&saved).await?;

        Ok(saved)
    }

    /// Load a delivery and check the acting partner owns it
    async fn owned_delivery(
        &self,
        actor: &AuthenticatedUser,
        delivery_id: Uuid,
    ) -> Result<Delivery, DeliveryError> {
        let delivery = self
            .deliveries
            .find_by_id(delivery_id)
            .await?
            .ok_or(DeliveryError::NotFound)?;

        if delivery.delivery_partner_id != Some(actor.user_id) && actor.role != Role::Admin {
            return Err(DeliveryError::Forbidden(
                "You are not assigned to this delivery".to_string(),
            ));
        }

        Ok(delivery)
    }

    /// Hand the order back to its lifecycle on delivery completion
    ///
    /// Marks the order delivered, derives settlement, and emits the status
    /// event. A transition the order machine refuses is logged and skipped
    /// rather than failing the courier's request.
    async fn complete_order(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        let order = match self
            .orders
            .find_by_id(delivery.order_id)
            .await
            .map_err(|e| DeliveryError::DatabaseError(e.to_string()))?
        {
            Some(order) => order,
            None => {
                tracing::warn!("Delivery {} has no backing order", delivery.id);
                return Ok(());
            }
        };

        if order.status == OrderStatus::Delivered {
            return Ok(());
        }

        if !StatusMachine::is_valid_transition(order.status, OrderStatus::Delivered) {
            tracing::warn!(
                "Order {} at {} cannot move to delivered; leaving as-is",
                order.id,
                order.status
            );
            return Ok(());
        }

        let mut updated = self
            .orders
            .update_status(order.id, OrderStatus::Delivered, None)
            .await
            .map_err(|e| DeliveryError::DatabaseError(e.to_string()))?;

        updated.delivery_earnings = delivery.total_earnings;
        updated.calculate_settlement();
        self.orders
            .settle(&updated, Utc::now())
            .await
            .map_err(|e| DeliveryError::DatabaseError(e.to_string()))?;

        self.events.publish(AppEvent::OrderStatusChanged {
            order_id: updated.id,
            customer_id: updated.customer_id,
            status: OrderStatus::Delivered,
            timestamp: Utc::now(),
        });

        Ok(())
    }
}
