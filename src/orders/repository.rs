use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::orders::error::OrderError;
use crate::orders::models::{CancelledBy, Order, OrderStatus, StatusEvent};

/// Whose orders a listing is scoped to
#[derive(Debug, Clone, Copy)]
pub enum OrderScope {
    Customer(i32),
    Restaurant(Uuid),
    Partner(i32),
    All,
}

/// Repository for order operations
#[derive(Clone)]
pub struct OrdersRepository {
    pool: PgPool,
}

impl OrdersRepository {
    /// Create a new OrdersRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order together with its initial status-history entry
    pub async fn create(&self, order: &Order) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id, restaurant_id, items,
                delivery_address, customer_phone, items_total, delivery_fee,
                packaging_charges, tax_amount, discount, coupon_discount,
                total_amount, coupon_code, payment_method, payment_status,
                transaction_id, status, estimated_delivery_time,
                special_instructions, commission_rate, delivery_earnings
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(order.restaurant_id)
        .bind(&order.items)
        .bind(&order.delivery_address)
        .bind(&order.customer_phone)
        .bind(order.items_total)
        .bind(order.delivery_fee)
        .bind(order.packaging_charges)
        .bind(order.tax_amount)
        .bind(order.discount)
        .bind(order.coupon_discount)
        .bind(order.total_amount)
        .bind(&order.coupon_code)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(&order.transaction_id)
        .bind(order.status)
        .bind(order.estimated_delivery_time)
        .bind(&order.special_instructions)
        .bind(order.commission_rate)
        .bind(order.delivery_earnings)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO order_status_events (order_id, status) VALUES ($1, $2)")
            .bind(created.id)
            .bind(created.status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(created)
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, OrderError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// List orders in a scope with an optional status filter, newest first
    pub async fn list(
        &self,
        scope: OrderScope,
        status: Option<OrderStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Order>, OrderError> {
        let (scope_clause, scope_param) = Self::scope_clause(&scope);

        let status_clause = if status.is_some() {
            format!(" AND status = ${}", if scope_param { 2 } else { 1 })
        } else {
            String::new()
        };

        let query_str = format!(
            "SELECT * FROM orders WHERE {}{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            scope_clause, status_clause, limit, offset
        );

        let mut query = sqlx::query_as::<_, Order>(&query_str);
        match scope {
            OrderScope::Customer(id) | OrderScope::Partner(id) => query = query.bind(id),
            OrderScope::Restaurant(id) => query = query.bind(id),
            OrderScope::All => {}
        }
        if let Some(status) = status {
            query = query.bind(status);
        }

        let orders = query.fetch_all(&self.pool).await?;
        Ok(orders)
    }

    /// Count orders in a scope with an optional status filter
    pub async fn count(
        &self,
        scope: OrderScope,
        status: Option<OrderStatus>,
    ) -> Result<i64, OrderError> {
        let (scope_clause, scope_param) = Self::scope_clause(&scope);

        let status_clause = if status.is_some() {
            format!(" AND status = ${}", if scope_param { 2 } else { 1 })
        } else {
            String::new()
        };

        let query_str = format!(
            "SELECT COUNT(*) FROM orders WHERE {}{}",
            scope_clause, status_clause
        );

        let mut query = sqlx::query_scalar::<_, i64>(&query_str);
        match scope {
            OrderScope::Customer(id) | OrderScope::Partner(id) => query = query.bind(id),
            OrderScope::Restaurant(id) => query = query.bind(id),
            OrderScope::All => {}
        }
        if let Some(status) = status {
            query = query.bind(status);
        }

        let count = query.fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Update an order's status, stamping the per-status timestamp and
    /// appending to the history in one transaction
    ///
    /// History is append-only; repeated same-status writes append duplicate
    /// entries, matching at-least-once delivery of status updates.
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        note: Option<String>,
    ) -> Result<Order, OrderError> {
        let stamp_clause = match Self::timestamp_column(new_status) {
            Some(column) => format!(", {} = COALESCE({}, NOW())", column, column),
            None => String::new(),
        };

        let query_str = format!(
            "UPDATE orders SET status = $1, updated_at = NOW(){} WHERE id = $2 RETURNING *",
            stamp_clause
        );

        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&query_str)
            .bind(new_status)
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(OrderError::NotFound)?;

        sqlx::query("INSERT INTO order_status_events (order_id, status, note) VALUES ($1, $2, $3)")
            .bind(order_id)
            .bind(new_status)
            .bind(note)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(order)
    }

    /// Cancel an order, recording reason and canceller
    pub async fn cancel(
        &self,
        order_id: Uuid,
        reason: Option<String>,
        cancelled_by: CancelledBy,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'cancelled',
                cancellation_reason = $1,
                cancelled_by = $2,
                cancelled_at = NOW(),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&reason)
        .bind(cancelled_by)
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(OrderError::NotFound)?;

        sqlx::query("INSERT INTO order_status_events (order_id, status, note) VALUES ($1, $2, $3)")
            .bind(order_id)
            .bind(OrderStatus::Cancelled)
            .bind(&reason)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(order)
    }

    /// Persist derived settlement fields
    pub async fn settle(&self, order: &Order, settled_at: DateTime<Utc>) -> Result<Order, OrderError> {
        let settled = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET commission_amount = $1,
                vendor_earnings = $2,
                delivery_earnings = $3,
                is_settled = TRUE,
                settled_at = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(order.commission_amount)
        .bind(order.vendor_earnings)
        .bind(order.delivery_earnings)
        .bind(settled_at)
        .bind(order.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrderError::NotFound)?;

        Ok(settled)
    }

    /// Assign a delivery partner reference on the order
    pub async fn set_delivery_partner(
        &self,
        order_id: Uuid,
        partner_id: i32,
    ) -> Result<(), OrderError> {
        sqlx::query("UPDATE orders SET delivery_partner_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(partner_id)
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Fetch an order's status history in append order
    pub async fn status_history(&self, order_id: Uuid) -> Result<Vec<StatusEvent>, OrderError> {
        let events = sqlx::query_as::<_, StatusEvent>(
            "SELECT status, note, recorded_at FROM order_status_events WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Column stamped when a status is first reached, if any
    fn timestamp_column(status: OrderStatus) -> Option<&'static str> {
        match status {
            OrderStatus::Confirmed => Some("accepted_at"),
            OrderStatus::Preparing => Some("preparing_at"),
            OrderStatus::Ready => Some("ready_at"),
            OrderStatus::Picked => Some("picked_at"),
            OrderStatus::Delivered => Some("delivered_at"),
            OrderStatus::Cancelled => Some("cancelled_at"),
            OrderStatus::Pending | OrderStatus::OnTheWay | OrderStatus::Rejected => None,
        }
    }

    fn scope_clause(scope: &OrderScope) -> (&'static str, bool) {
        match scope {
            OrderScope::Customer(_) => ("customer_id = $1", true),
            OrderScope::Restaurant(_) => ("restaurant_id = $1", true),
            OrderScope::Partner(_) => ("delivery_partner_id = $1", true),
            OrderScope::All => ("TRUE", false),
        }
    }
}
