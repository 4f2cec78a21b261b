use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::deliveries::error::DeliveryError;
use crate::deliveries::models::{Delivery, DeliveryStatus, NewDelivery};

/// Repository for delivery operations
#[derive(Clone)]
pub struct DeliveriesRepository {
    pool: PgPool,
}

impl DeliveriesRepository {
    /// Create a new DeliveriesRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a delivery record for a freshly placed order
    pub async fn create(&self, delivery: &NewDelivery) -> Result<Delivery, DeliveryError> {
        let created = sqlx::query_as::<_, Delivery>(
            r#"
            INSERT INTO deliveries (
                order_id, pickup_restaurant_id, pickup_latitude, pickup_longitude,
                drop_address, drop_latitude, drop_longitude, distance_km,
                estimated_duration_min, delivery_fee, tip, delivery_instructions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(delivery.order_id)
        .bind(delivery.pickup_restaurant_id)
        .bind(delivery.pickup_latitude)
        .bind(delivery.pickup_longitude)
        .bind(sqlx::types::Json(&delivery.drop_address))
        .bind(delivery.drop_latitude)
        .bind(delivery.drop_longitude)
        .bind(delivery.distance_km)
        .bind(delivery.estimated_duration_min)
        .bind(delivery.delivery_fee)
        .bind(delivery.tip)
        .bind(&delivery.delivery_instructions)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Find a delivery by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Delivery>, DeliveryError> {
        let delivery = sqlx::query_as::<_, Delivery>("SELECT * FROM deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(delivery)
    }

    /// Find the delivery attached to an order
    pub async fn find_by_order(&self, order_id: Uuid) -> Result<Option<Delivery>, DeliveryError> {
        let delivery =
            sqlx::query_as::<_, Delivery>("SELECT * FROM deliveries WHERE order_id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(delivery)
    }

    /// List a partner's deliveries with an optional status filter
    pub async fn list_for_partner(
        &self,
        partner_id: i32,
        status: Option<DeliveryStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Delivery>, DeliveryError> {
        let deliveries = match status {
            Some(status) => {
                sqlx::query_as::<_, Delivery>(
                    &format!(
                        "SELECT * FROM deliveries WHERE delivery_partner_id = $1 AND status = $2 \
                         ORDER BY created_at DESC LIMIT {} OFFSET {}",
                        limit, offset
                    ),
                )
                .bind(partner_id)
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Delivery>(
                    &format!(
                        "SELECT * FROM deliveries WHERE delivery_partner_id = $1 \
                         ORDER BY created_at DESC LIMIT {} OFFSET {}",
                        limit, offset
                    ),
                )
                .bind(partner_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(deliveries)
    }

    /// List all deliveries (admin view) with an optional status filter
    pub async fn list_all(
        &self,
        status: Option<DeliveryStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Delivery>, DeliveryError> {
        let deliveries = match status {
            Some(status) => {
                sqlx::query_as::<_, Delivery>(
                    &format!(
                        "SELECT * FROM deliveries WHERE status = $1 \
                         ORDER BY created_at DESC LIMIT {} OFFSET {}",
                        limit, offset
                    ),
                )
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Delivery>(
                    &format!(
                        "SELECT * FROM deliveries ORDER BY created_at DESC LIMIT {} OFFSET {}",
                        limit, offset
                    ),
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(deliveries)
    }

    /// Fetch deliveries still waiting for any partner
    ///
    /// Candidates for the nearby search: unassigned on both axes. The
    /// proximity filter runs in the service over this bounded set.
    pub async fn list_pending_unassigned(&self, cap: u32) -> Result<Vec<Delivery>, DeliveryError> {
        let deliveries = sqlx::query_as::<_, Delivery>(
            &format!(
                "SELECT * FROM deliveries \
                 WHERE assignment_status = 'pending' AND status = 'pending' \
                 ORDER BY created_at LIMIT {}",
                cap
            ),
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(deliveries)
    }

    /// Propose a partner for a delivery
    ///
    /// Conditional on the delivery still being up for assignment; both axes
    /// move to `assigned` together.
    pub async fn try_assign(
        &self,
        delivery_id: Uuid,
        partner_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Delivery>, DeliveryError> {
        let delivery = sqlx::query_as::<_, Delivery>(
            r#"
            UPDATE deliveries
            SET delivery_partner_id = $1,
                assignment_status = 'assigned',
                status = 'assigned',
                assigned_at = COALESCE(assigned_at, $2),
                attempt_count = attempt_count + 1,
                updated_at = NOW()
            WHERE id = $3
              AND assignment_status IN ('pending', 'reassigning', 'rejected')
            RETURNING *
            "#,
        )
        .bind(partner_id)
        .bind(now)
        .bind(delivery_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(delivery)
    }

    /// Accept a delivery on behalf of the assigned partner
    ///
    /// A single conditional update resolves races between partners: it only
    /// applies while both axes still read `assigned` and the row belongs to
    /// this partner. Losers see zero rows updated.
    pub async fn try_accept(
        &self,
        delivery_id: Uuid,
        partner_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Delivery>, DeliveryError> {
        let delivery = sqlx::query_as::<_, Delivery>(
            r#"
            UPDATE deliveries
            SET assignment_status = 'accepted',
                accepted_at = $1,
                updated_at = NOW()
            WHERE id = $2
              AND delivery_partner_id = $3
              AND assignment_status = 'assigned'
              AND status = 'assigned'
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(delivery_id)
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(delivery)
    }

    /// Decline an assignment; the delivery goes back into rotation
    pub async fn try_reject(
        &self,
        delivery_id: Uuid,
        partner_id: i32,
    ) -> Result<Option<Delivery>, DeliveryError> {
        let delivery = sqlx::query_as::<_, Delivery>(
            r#"
            UPDATE deliveries
            SET assignment_status = 'reassigning',
                status = 'pending',
                delivery_partner_id = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND delivery_partner_id = $2
              AND assignment_status = 'assigned'
            RETURNING *
            "#,
        )
        .bind(delivery_id)
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(delivery)
    }

    /// Persist a location report
    pub async fn save_location(&self, delivery: &Delivery) -> Result<Delivery, DeliveryError> {
        let saved = sqlx::query_as::<_, Delivery>(
            r#"
            UPDATE deliveries
            SET current_latitude = $1,
                current_longitude = $2,
                location_history = $3,
                updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(delivery.current_latitude)
        .bind(delivery.current_longitude)
        .bind(&delivery.location_history)
        .bind(delivery.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DeliveryError::NotFound)?;

        Ok(saved)
    }

    /// Persist physical-progress fields after a status change or completion
    pub async fn save_progress(&self, delivery: &Delivery) -> Result<Delivery, DeliveryError> {
        let saved = sqlx::query_as::<_, Delivery>(
            r#"
            UPDATE deliveries
            SET status = $1,
                started_at = $2,
                arrived_at_restaurant_at = $3,
                picked_up_at = $4,
                delivered_at = $5,
                actual_duration_min = $6,
                proof = $7,
                total_earnings = $8,
                failure_reason = $9,
                failure_note = $10,
                updated_at = NOW()
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(delivery.status)
        .bind(delivery.started_at)
        .bind(delivery.arrived_at_restaurant_at)
        .bind(delivery.picked_up_at)
        .bind(delivery.delivered_at)
        .bind(delivery.actual_duration_min)
        .bind(&delivery.proof)
        .bind(delivery.total_earnings)
        .bind(delivery.failure_reason)
        .bind(&delivery.failure_note)
        .bind(delivery.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DeliveryError::NotFound)?;

        Ok(saved)
    }
}
