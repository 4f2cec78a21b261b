use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::coupons::error::CouponError;
use crate::coupons::models::{Coupon, CreateCouponRequest, UpdateCouponRequest};

/// Repository for coupon operations
#[derive(Clone)]
pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    /// Create a new CouponRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new coupon
    pub async fn create(
        &self,
        request: &CreateCouponRequest,
        code: &str,
        created_by: i32,
    ) -> Result<Coupon, CouponError> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            INSERT INTO coupons (
                code, title, description, discount_type, discount_value,
                max_discount_amount, min_order_amount, max_order_amount,
                valid_from, valid_until, max_usage_count, max_usage_per_user,
                applicable_to, applicable_users, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 0), $8,
                    COALESCE($9, NOW()), $10, $11, COALESCE($12, 1),
                    COALESCE($13, 'all'), COALESCE($14, '{}'), $15)
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.discount_type)
        .bind(request.discount_value)
        .bind(request.max_discount_amount)
        .bind(request.min_order_amount)
        .bind(request.max_order_amount)
        .bind(request.valid_from)
        .bind(request.valid_until)
        .bind(request.max_usage_count)
        .bind(request.max_usage_per_user)
        .bind(request.applicable_to)
        .bind(request.applicable_users.as_deref())
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Check whether a coupon code is already taken
    pub async fn code_exists(&self, code: &str) -> Result<bool, CouponError> {
        let exists: Option<bool> =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM coupons WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists.unwrap_or(false))
    }

    /// Find a coupon by its code
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, CouponError> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(coupon)
    }

    /// Find a coupon by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, CouponError> {
        let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(coupon)
    }

    /// List active coupons currently inside their validity window
    pub async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Coupon>, CouponError> {
        let coupons = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT * FROM coupons
            WHERE is_active = TRUE AND valid_from <= $1 AND valid_until >= $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons)
    }

    /// Amend a coupon's amendable fields
    pub async fn update(
        &self,
        id: Uuid,
        request: &UpdateCouponRequest,
    ) -> Result<Option<Coupon>, CouponError> {
        let existing = match self.find_by_id(id).await? {
            Some(coupon) => coupon,
            None => return Ok(None),
        };

        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            UPDATE coupons
            SET title = $1,
                description = $2,
                valid_until = $3,
                max_usage_count = $4,
                max_usage_per_user = $5,
                is_active = $6,
                updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(request.title.clone().unwrap_or(existing.title))
        .bind(request.description.clone().or(existing.description))
        .bind(request.valid_until.unwrap_or(existing.valid_until))
        .bind(request.max_usage_count.or(existing.max_usage_count))
        .bind(request.max_usage_per_user.unwrap_or(existing.max_usage_per_user))
        .bind(request.is_active.unwrap_or(existing.is_active))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(coupon))
    }

    /// Soft-deactivate a coupon
    ///
    /// Historical orders reference coupons by code; rows are never deleted.
    pub async fn deactivate(&self, id: Uuid) -> Result<bool, CouponError> {
        let result =
            sqlx::query("UPDATE coupons SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count ledger entries for one user on one coupon
    pub async fn user_usage_count(
        &self,
        coupon_id: Uuid,
        user_id: i32,
    ) -> Result<i64, CouponError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Atomically commit one coupon use
    ///
    /// The increment is conditional on the global and per-user caps still
    /// holding, so two orders racing over the last remaining use cannot both
    /// win. Returns false when the race is lost; the caller then drops the
    /// coupon from the order instead of failing it.
    pub async fn try_commit_usage(
        &self,
        coupon_id: Uuid,
        user_id: i32,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> Result<bool, CouponError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET current_usage_count = current_usage_count + 1, updated_at = NOW()
            WHERE id = $1
              AND is_active = TRUE
              AND (max_usage_count IS NULL OR current_usage_count < max_usage_count)
              AND (SELECT COUNT(*) FROM coupon_usages
                   WHERE coupon_id = $1 AND user_id = $2) < max_usage_per_user
            "#,
        )
        .bind(coupon_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Race lost or caps exhausted since validation
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO coupon_usages (coupon_id, user_id, order_id, discount_amount)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(coupon_id)
        .bind(user_id)
        .bind(order_id)
        .bind(discount_amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }
}
