use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::coupons::{
    Coupon, CouponError, CouponPreviewResponse, CouponRepository, CouponValidator,
    CreateCouponRequest, UpdateCouponRequest,
};

/// Service for coupon business logic
#[derive(Clone)]
pub struct CouponService {
    repo: CouponRepository,
}

impl CouponService {
    /// Create a new CouponService
    pub fn new(repo: CouponRepository) -> Self {
        Self { repo }
    }

    /// Validate a coupon for a user against a proposed order amount
    ///
    /// Phase one of the two-phase protocol: nothing is mutated here, so cart
    /// previews can call this any number of times. Returns the coupon and the
    /// discount it would yield.
    pub async fn validate_for_user(
        &self,
        code: &str,
        user_id: i32,
        order_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(Coupon, Decimal), CouponError> {
        let normalized = code.trim().to_uppercase();

        let coupon = self
            .repo
            .find_by_code(&normalized)
            .await?
            .ok_or(CouponError::NotFound)?;

        let user_usage_count = self.repo.user_usage_count(coupon.id, user_id).await?;

        CouponValidator::validate(&coupon, user_id, order_amount, now, user_usage_count)
            .map_err(CouponError::Rejected)?;

        let discount = CouponValidator::discount_for(&coupon, order_amount);

        Ok((coupon, discount))
    }

    /// Build a preview response for the validate endpoint
    pub async fn preview(
        &self,
        code: &str,
        user_id: i32,
        order_amount: Decimal,
    ) -> Result<CouponPreviewResponse, CouponError> {
        let (coupon, discount) = self
            .validate_for_user(code, user_id, order_amount, Utc::now())
            .await?;

        Ok(CouponPreviewResponse {
            code: coupon.code,
            title: coupon.title,
            discount_type: coupon.discount_type,
            discount_amount: discount,
            final_amount: order_amount - discount,
        })
    }

    /// Commit one use of a coupon for a confirmed order
    ///
    /// Phase two: the conditional increment either wins atomically or reports
    /// a lost race (false). Never fails the caller's order on its own.
    pub async fn commit_usage(
        &self,
        coupon: &Coupon,
        user_id: i32,
        order_id: Uuid,
        discount_amount: Decimal,
    ) -> Result<bool, CouponError> {
        let committed = self
            .repo
            .try_commit_usage(coupon.id, user_id, order_id, discount_amount)
            .await?;

        if committed {
            tracing::info!(
                "Coupon {} committed for user {} on order {}",
                coupon.code,
                user_id,
                order_id
            );
        } else {
            tracing::warn!(
                "Coupon {} usage race lost for user {} on order {}",
                coupon.code,
                user_id,
                order_id
            );
        }

        Ok(committed)
    }

    /// Create a new coupon (administrator operation)
    pub async fn create(
        &self,
        request: CreateCouponRequest,
        created_by: i32,
    ) -> Result<Coupon, CouponError> {
        let code = request.code.trim().to_uppercase();

        if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Err(CouponError::ValidationError(
                "Coupon code can only contain letters and numbers".to_string(),
            ));
        }

        if let Some(valid_from) = request.valid_from {
            if request.valid_until <= valid_from {
                return Err(CouponError::ValidationError(
                    "valid_until must be after valid_from".to_string(),
                ));
            }
        }

        if self.repo.code_exists(&code).await? {
            return Err(CouponError::DuplicateCode(code));
        }

        let coupon = self.repo.create(&request, &code, created_by).await?;
        tracing::info!("Created coupon {} ({})", coupon.code, coupon.id);

        Ok(coupon)
    }

    /// List active coupons currently inside their validity window
    pub async fn list_active(&self) -> Result<Vec<Coupon>, CouponError> {
        self.repo.list_active(Utc::now()).await
    }

    /// Amend a coupon's amendable fields
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCouponRequest,
    ) -> Result<Coupon, CouponError> {
        self.repo
            .update(id, &request)
            .await?
            .ok_or_else(|| CouponError::NotFoundById(id.to_string()))
    }

    /// Soft-deactivate a coupon
    pub async fn deactivate(&self, id: Uuid) -> Result<(), CouponError> {
        let deactivated = self.repo.deactivate(id).await?;
        if !deactivated {
            return Err(CouponError::NotFoundById(id.to_string()));
        }

        tracing::info!("Deactivated coupon {}", id);
        Ok(())
    }
}
