use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::cart::error::CartError;
use crate::cart::models::Cart;

/// Repository for cart persistence
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    /// Create a new CartRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a customer's cart, purging it lazily if expired
    pub async fn find_by_customer(
        &self,
        customer_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Cart>, CartError> {
        let cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        match cart {
            Some(cart) if cart.is_expired(now) => {
                tracing::debug!("Purging expired cart for customer {}", customer_id);
                sqlx::query("DELETE FROM carts WHERE id = $1")
                    .bind(cart.id)
                    .execute(&self.pool)
                    .await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Insert a freshly built cart
    pub async fn create(&self, cart: &Cart) -> Result<Cart, CartError> {
        let created = sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (id, customer_id, restaurants, applied_coupon, summary, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(cart.id)
        .bind(cart.customer_id)
        .bind(&cart.restaurants)
        .bind(&cart.applied_coupon)
        .bind(&cart.summary)
        .bind(cart.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Persist cart mutations with optimistic concurrency
    ///
    /// The update only applies when the stored version still matches the one
    /// this cart was loaded at; a concurrent writer from another device loses
    /// with a VersionConflict instead of silently overwriting.
    pub async fn save(&self, cart: &Cart) -> Result<Cart, CartError> {
        let saved = sqlx::query_as::<_, Cart>(
            r#"
            UPDATE carts
            SET restaurants = $1,
                applied_coupon = $2,
                summary = $3,
                version = version + 1,
                expires_at = $4,
                updated_at = NOW()
            WHERE id = $5 AND version = $6
            RETURNING *
            "#,
        )
        .bind(&cart.restaurants)
        .bind(&cart.applied_coupon)
        .bind(&cart.summary)
        .bind(cart.expires_at)
        .bind(cart.id)
        .bind(cart.version)
        .fetch_optional(&self.pool)
        .await?;

        saved.ok_or(CartError::VersionConflict)
    }
}
