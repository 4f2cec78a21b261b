use std::collections::HashMap;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Role};
use crate::cart::CartRepository;
use crate::catalog::CatalogRepository;
use crate::coupons::CouponService;
use crate::deliveries::{geo, DeliveriesRepository, NewDelivery};
use crate::events::{AppEvent, EventBus};
use crate::models::Restaurant;
use crate::orders::{
    generate_order_number, CancelOrderRequest, CancelledBy, CheckoutRequest, Order, OrderError,
    OrderItem, OrderListQuery, OrderListResponse, OrderResponse, OrderScope, OrderStatus,
    OrdersRepository, PaymentStatus, StatusMachine, UpdateStatusRequest,
};

/// Default platform commission rate in percent
const DEFAULT_COMMISSION_RATE: u32 = 15;

/// Service for order business logic
#[derive(Clone)]
pub struct OrderService {
    orders: OrdersRepository,
    carts: CartRepository,
    catalog: CatalogRepository,
    coupons: CouponService,
    deliveries: DeliveriesRepository,
    events: EventBus,
}

impl OrderService {
    /// Create a new OrderService
    pub fn new(
        orders: OrdersRepository,
        carts: CartRepository,
        catalog: CatalogRepository,
        coupons: CouponService,
        deliveries: DeliveriesRepository,
        events: EventBus,
    ) -> Self {
        Self {
            orders,
            carts,
            catalog,
            coupons,
            deliveries,
            events,
        }
    }

    /// Checkout: turn the customer's cart into an order
    ///
    /// Pricing is computed server-side from the cart snapshot and restaurant
    /// settings. The applied coupon is re-validated and committed atomically;
    /// losing the usage race drops the discount, never the order. The cart is
    /// cleared as a side effect and a delivery record is dispatched.
    pub async fn checkout(
        &self,
        actor: &AuthenticatedUser,
        request: CheckoutRequest,
    ) -> Result<OrderResponse, OrderError> {
        let now = Utc::now();

        let mut cart = self
            .carts
            .find_by_customer(actor.user_id, now)
            .await
            .map_err(|e| OrderError::DatabaseError(e.to_string()))?
            .ok_or(OrderError::EmptyCart)?;

        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        cart.recompute_summary()
            .map_err(|e| OrderError::ValidationError(e.to_string()))?;

        // Primary restaurant: the first group, as in single-vendor orders
        let primary_restaurant_id = cart.restaurants[0].restaurant_id;
        let restaurant_ids: Vec<Uuid> =
            cart.restaurants.iter().map(|g| g.restaurant_id).collect();

        let restaurants: HashMap<Uuid, Restaurant> = self
            .catalog
            .find_restaurants_by_ids(&restaurant_ids)
            .await
            .map_err(|e| OrderError::DatabaseError(format!("{:?}", e)))?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let primary = restaurants
            .get(&primary_restaurant_id)
            .ok_or_else(|| OrderError::ValidationError("Restaurant no longer exists".to_string()))?;

        let packaging_charges: Decimal = restaurant_ids
            .iter()
            .filter_map(|id| restaurants.get(id))
            .map(|r| r.packaging_charges)
            .sum();

        let items: Vec<OrderItem> = cart
            .restaurants
            .iter()
            .flat_map(|group| group.items.iter())
            .map(|line| OrderItem {
                menu_item_id: line.menu_item_id,
                name: line.name.clone(),
                image: line.image.clone(),
                price: line.price,
                quantity: line.quantity,
                selected_variants: line.selected_variants.clone(),
                selected_add_ons: line.selected_add_ons.clone(),
                instructions: line.instructions.clone(),
                subtotal: line.subtotal,
            })
            .collect();

        let items_total = cart.summary.items_total;
        let delivery_fee = cart.summary.total_delivery_fee;
        let tax_amount = Decimal::ZERO;
        let discount = Decimal::ZERO;
        let tip = request.tip.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);

        let order_id = Uuid::new_v4();

        // Two-phase coupon protocol: re-validate, then commit atomically
        // against the usage caps. A lost race costs the discount only.
        let mut coupon_discount = Decimal::ZERO;
        let mut coupon_code = None;
        if let Some(applied) = cart.applied_coupon.as_ref() {
            match self
                .coupons
                .validate_for_user(&applied.code, actor.user_id, items_total, now)
                .await
            {
                Ok((coupon, _)) => {
                    let committed = self
                        .coupons
                        .commit_usage(&coupon, actor.user_id, order_id, cart.summary.discount)
                        .await
                        .map_err(|e| OrderError::DatabaseError(e.to_string()))?;

                    if committed {
                        coupon_discount = cart.summary.discount;
                        coupon_code = Some(coupon.code);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Coupon {} no longer valid at checkout for customer {}: {}",
                        applied.code,
                        actor.user_id,
                        e
                    );
                }
            }
        }

        let total_amount = (items_total + delivery_fee + packaging_charges + tax_amount
            - discount
            - coupon_discount)
            .max(Decimal::ZERO);

        let distance = geo::distance_km(
            primary.latitude,
            primary.longitude,
            request.delivery_address.latitude,
            request.delivery_address.longitude,
        );
        let estimate_minutes = geo::estimated_delivery_minutes(
            distance,
            primary.avg_preparation_minutes as i64,
        );

        let order = Order {
            id: order_id,
            order_number: generate_order_number(now),
            customer_id: actor.user_id,
            restaurant_id: primary_restaurant_id,
            items: sqlx::types::Json(items),
            delivery_address: sqlx::types::Json(request.delivery_address.clone()),
            customer_phone: request.customer_phone.clone(),
            delivery_partner_id: None,
            items_total,
            delivery_fee,
            packaging_charges,
            tax_amount,
            discount,
            coupon_discount,
            total_amount,
            coupon_code,
            payment_method: request.payment_method,
            payment_status: PaymentStatus::Pending,
            transaction_id: request.transaction_id.clone(),
            paid_at: None,
            status: OrderStatus::Pending,
            estimated_delivery_time: now + Duration::minutes(estimate_minutes),
            accepted_at: None,
            preparing_at: None,
            ready_at: None,
            picked_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            cancelled_by: None,
            special_instructions: request.special_instructions.clone(),
            commission_rate: Decimal::from(DEFAULT_COMMISSION_RATE),
            commission_amount: Decimal::ZERO,
            vendor_earnings: Decimal::ZERO,
            delivery_earnings: delivery_fee + tip,
            is_settled: false,
            settled_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.orders.create(&order).await?;

        // Dispatch fulfilment alongside the order
        self.deliveries
            .create(&NewDelivery {
                order_id: created.id,
                pickup_restaurant_id: primary.id,
                pickup_latitude: primary.latitude,
                pickup_longitude: primary.longitude,
                drop_address: request.delivery_address,
                drop_latitude: created.delivery_address.latitude,
                drop_longitude: created.delivery_address.longitude,
                distance_km: distance,
                estimated_duration_min: estimate_minutes as i32,
                delivery_fee,
                tip,
                delivery_instructions: request.special_instructions,
            })
            .await
            .map_err(|e| OrderError::DatabaseError(e.to_string()))?;

        // Clear the cart; a concurrent device mutation just leaves the cart
        // for the customer to review, it never blocks the placed order.
        cart.clear()
            .map_err(|e| OrderError::DatabaseError(e.to_string()))?;
        cart.touch(now);
        if let Err(e) = self.carts.save(&cart).await {
            tracing::warn!(
                "Could not clear cart for customer {} after checkout: {}",
                actor.user_id,
                e
            );
        }

        self.events.publish(AppEvent::OrderCreated {
            order_id: created.id,
            order_number: created.order_number.clone(),
            customer_id: created.customer_id,
            restaurant_id: created.restaurant_id,
            total_amount: created.total_amount,
            timestamp: now,
        });

        tracing::info!(
            "Order {} placed by customer {} for {}",
            created.order_number,
            created.customer_id,
            created.total_amount
        );

        let status_history = self.orders.status_history(created.id).await?;
        Ok(OrderResponse {
            order: created,
            status_history,
        })
    }

    /// List orders scoped by the caller's role
    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        query: OrderListQuery,
    ) -> Result<OrderListResponse, OrderError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let offset = (page - 1) * limit;

        let scope = match actor.role {
            Role::Customer => OrderScope::Customer(actor.user_id),
            Role::Delivery => OrderScope::Partner(actor.user_id),
            Role::Admin => OrderScope::All,
            Role::Vendor => {
                let restaurant = self
                    .restaurant_for_owner(actor.user_id)
                    .await?
                    .ok_or_else(|| {
                        OrderError::Forbidden("No restaurant found for this vendor".to_string())
                    })?;
                OrderScope::Restaurant(restaurant.id)
            }
        };

        let orders = self.orders.list(scope, query.status, limit, offset).await?;
        let total = self.orders.count(scope, query.status).await?;

        Ok(OrderListResponse {
            orders,
            total,
            page,
            limit,
        })
    }

    /// Fetch one order with its history, enforcing ownership
    pub async fn get(
        &self,
        actor: &AuthenticatedUser,
        order_id: Uuid,
    ) -> Result<OrderResponse, OrderError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        self.authorize_view(actor, &order).await?;

        let status_history = self.orders.status_history(order.id).await?;
        Ok(OrderResponse {
            order,
            status_history,
        })
    }

    /// Update order status (vendor / delivery partner / admin)
    ///
    /// The transition is validated by the state machine; every accepted
    /// write appends one history entry, including same-status redeliveries.
    /// Settlement is derived when the order reaches delivered.
    pub async fn update_status(
        &self,
        actor: &AuthenticatedUser,
        order_id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<OrderResponse, OrderError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        self.authorize_status_update(actor, &order).await?;

        StatusMachine::transition(order.status, request.status)
            .map_err(OrderError::InvalidTransition)?;

        let mut updated = self
            .orders
            .update_status(order_id, request.status, request.note)
            .await?;

        if request.status == OrderStatus::Delivered && !updated.is_settled {
            if let Some(delivery) = self
                .deliveries
                .find_by_order(order_id)
                .await
                .map_err(|e| OrderError::DatabaseError(e.to_string()))?
            {
                updated.delivery_earnings = delivery.delivery_fee + delivery.tip;
            }
            updated.calculate_settlement();
            updated = self.orders.settle(&updated, Utc::now()).await?;
        }

        self.events.publish(AppEvent::OrderStatusChanged {
            order_id: updated.id,
            customer_id: updated.customer_id,
            status: updated.status,
            timestamp: Utc::now(),
        });

        let status_history = self.orders.status_history(updated.id).await?;
        Ok(OrderResponse {
            order: updated,
            status_history,
        })
    }

    /// Cancel an order (customer or admin)
    ///
    /// Permitted only while pending or confirmed; a rejected attempt leaves
    /// the status and history untouched.
    pub async fn cancel(
        &self,
        actor: &AuthenticatedUser,
        order_id: Uuid,
        request: CancelOrderRequest,
    ) -> Result<OrderResponse, OrderError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        let cancelled_by = match actor.role {
            Role::Customer => {
                if order.customer_id != actor.user_id {
                    return Err(OrderError::Forbidden(
                        "You do not own this order".to_string(),
                    ));
                }
                CancelledBy::Customer
            }
            Role::Admin => CancelledBy::Admin,
            _ => {
                return Err(OrderError::Forbidden(
                    "Only the customer or an admin can cancel an order".to_string(),
                ))
            }
        };

        if !order.can_be_cancelled() {
            return Err(OrderError::NotCancellable);
        }

        let cancelled = self
            .orders
            .cancel(order_id, request.reason, cancelled_by)
            .await?;

        self.events.publish(AppEvent::OrderStatusChanged {
            order_id: cancelled.id,
            customer_id: cancelled.customer_id,
            status: OrderStatus::Cancelled,
            timestamp: Utc::now(),
        });

        tracing::info!("Order {} cancelled by {:?}", cancelled.order_number, cancelled_by);

        let status_history = self.orders.status_history(cancelled.id).await?;
        Ok(OrderResponse {
            order: cancelled,
            status_history,
        })
    }

    async fn restaurant_for_owner(&self, owner_id: i32) -> Result<Option<Restaurant>, OrderError> {
        self.catalog
            .find_restaurant_by_owner(owner_id)
            .await
            .map_err(|e| OrderError::DatabaseError(format!("{:?}", e)))
    }

    async fn authorize_view(
        &self,
        actor: &AuthenticatedUser,
        order: &Order,
    ) -> Result<(), OrderError> {
        let permitted = match actor.role {
            Role::Admin => true,
            Role::Customer => order.customer_id == actor.user_id,
            Role::Delivery => order.delivery_partner_id == Some(actor.user_id),
            Role::Vendor => {
                let restaurant = self
                    .catalog
                    .find_restaurant(order.restaurant_id)
                    .await
                    .map_err(|e| OrderError::DatabaseError(format!("{:?}", e)))?;
                restaurant.map(|r| r.owner_id == actor.user_id).unwrap_or(false)
            }
        };

        if permitted {
            Ok(())
        } else {
            Err(OrderError::Forbidden(
                "Not authorized to view this order".to_string(),
            ))
        }
    }

    async fn authorize_status_update(
        &self,
        actor: &AuthenticatedUser,
        order: &Order,
    ) -> Result<(), OrderError> {
        let permitted = match actor.role {
            Role::Admin => true,
            Role::Delivery => order.delivery_partner_id == Some(actor.user_id),
            Role::Vendor => {
                let restaurant = self
                    .catalog
                    .find_restaurant(order.restaurant_id)
                    .await
                    .map_err(|e| OrderError::DatabaseError(format!("{:?}", e)))?;
                restaurant.map(|r| r.owner_id == actor.user_id).unwrap_or(false)
            }
            Role::Customer => false,
        };

        if permitted {
            Ok(())
        } else {
            Err(OrderError::Forbidden(
                "Not authorized to update this order".to_string(),
            ))
        }
    }
}
