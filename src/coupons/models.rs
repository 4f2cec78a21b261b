use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Discount type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Flat,
    FreeDelivery,
}

impl DiscountType {
    /// Convert discount type to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Flat => "flat",
            DiscountType::FreeDelivery => "free_delivery",
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audience a coupon applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicableTo {
    All,
    SpecificUsers,
}

/// A discount coupon
///
/// Business terms are fixed at creation; only the usage counter and the
/// active flag mutate afterward. The usage ledger lives in `coupon_usages`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub max_order_amount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub max_usage_count: Option<i32>,
    pub current_usage_count: i32,
    pub max_usage_per_user: i32,
    pub applicable_to: ApplicableTo,
    pub applicable_users: Vec<i32>,
    pub is_active: bool,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in a coupon's usage ledger (append-only)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CouponUsage {
    pub id: i64,
    pub coupon_id: Uuid,
    pub user_id: i32,
    pub order_id: Uuid,
    pub discount_amount: Decimal,
    pub used_at: DateTime<Utc>,
}

/// Request DTO for creating a coupon
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 30, message = "Code must be 3-30 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[validate(custom(
        function = "crate::validation::validate_positive_amount",
        message = "Discount value must be positive"
    ))]
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub max_order_amount: Option<Decimal>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: DateTime<Utc>,
    pub max_usage_count: Option<i32>,
    #[validate(range(min = 1, message = "Per-user limit must be at least 1"))]
    pub max_usage_per_user: Option<i32>,
    pub applicable_to: Option<ApplicableTo>,
    pub applicable_users: Option<Vec<i32>>,
}

/// Request DTO for amending a coupon
///
/// Only the validity window, usage caps, display fields, and the active flag
/// are amendable; discount terms are immutable once issued.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCouponRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_usage_count: Option<i32>,
    #[validate(range(min = 1, message = "Per-user limit must be at least 1"))]
    pub max_usage_per_user: Option<i32>,
    pub is_active: Option<bool>,
}

/// Request DTO for previewing a coupon against a proposed order amount
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub code: String,
    #[validate(custom(
        function = "crate::validation::validate_non_negative_amount",
        message = "Order amount must not be negative"
    ))]
    pub order_amount: Decimal,
}

/// Response DTO for a successful coupon preview
#[derive(Debug, Serialize)]
pub struct CouponPreviewResponse {
    pub code: String,
    pub title: String,
    pub discount_type: DiscountType,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
}
