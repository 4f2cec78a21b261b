use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::coupons::{ApplicableTo, Coupon, DiscountType};

/// Why a coupon was rejected for a proposed order
///
/// Every variant renders to a user-displayable reason; callers surface the
/// exact reason rather than a generic error.
#[derive(Debug, Clone, PartialEq)]
pub enum CouponRejection {
    Inactive,
    NotYetValid,
    Expired,
    UsageLimitReached,
    BelowMinimumOrder(Decimal),
    AboveMaximumOrder(Decimal),
    NotApplicableToUser,
    PerUserLimitReached,
}

impl std::fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CouponRejection::Inactive => write!(f, "Coupon is not active"),
            CouponRejection::NotYetValid => write!(f, "Coupon is not yet valid"),
            CouponRejection::Expired => write!(f, "Coupon has expired"),
            CouponRejection::UsageLimitReached => write!(f, "Coupon usage limit reached"),
            CouponRejection::BelowMinimumOrder(min) => {
                write!(f, "Minimum order amount of {} required", min)
            }
            CouponRejection::AboveMaximumOrder(max) => {
                write!(f, "Maximum order amount of {} exceeded", max)
            }
            CouponRejection::NotApplicableToUser => {
                write!(f, "This coupon is not applicable to your account")
            }
            CouponRejection::PerUserLimitReached => {
                write!(f, "You have already used this coupon")
            }
        }
    }
}

/// Stateless coupon validation
///
/// Validation never mutates usage counters; recording a use is a separate
/// commit step performed only at order confirmation.
pub struct CouponValidator;

impl CouponValidator {
    /// Evaluate all eligibility predicates in fixed order
    ///
    /// Short-circuits on the first failure and returns its specific reason.
    /// `user_usage_count` is the number of ledger entries for this user.
    pub fn validate(
        coupon: &Coupon,
        user_id: i32,
        order_amount: Decimal,
        now: DateTime<Utc>,
        user_usage_count: i64,
    ) -> Result<(), CouponRejection> {
        if !coupon.is_active {
            return Err(CouponRejection::Inactive);
        }

        if now < coupon.valid_from {
            return Err(CouponRejection::NotYetValid);
        }
        if now > coupon.valid_until {
            return Err(CouponRejection::Expired);
        }

        if let Some(max_usage) = coupon.max_usage_count {
            if coupon.current_usage_count >= max_usage {
                return Err(CouponRejection::UsageLimitReached);
            }
        }

        if order_amount < coupon.min_order_amount {
            return Err(CouponRejection::BelowMinimumOrder(coupon.min_order_amount));
        }

        if let Some(max_order) = coupon.max_order_amount {
            if order_amount > max_order {
                return Err(CouponRejection::AboveMaximumOrder(max_order));
            }
        }

        if coupon.applicable_to == ApplicableTo::SpecificUsers
            && !coupon.applicable_users.contains(&user_id)
        {
            return Err(CouponRejection::NotApplicableToUser);
        }

        if user_usage_count >= coupon.max_usage_per_user as i64 {
            return Err(CouponRejection::PerUserLimitReached);
        }

        Ok(())
    }

    /// Calculate the discount a valid coupon yields for the given amount
    ///
    /// Percentage discounts are capped by `max_discount_amount`; free-delivery
    /// coupons contribute nothing here because their discount equals the
    /// delivery fee, which only the cart summary knows.
    pub fn discount_for(coupon: &Coupon, order_amount: Decimal) -> Decimal {
        let discount = match coupon.discount_type {
            DiscountType::Percentage => {
                let raw = order_amount * coupon.discount_value / Decimal::from(100);
                match coupon.max_discount_amount {
                    Some(cap) if raw > cap => cap,
                    _ => raw,
                }
            }
            DiscountType::Flat => coupon.discount_value,
            DiscountType::FreeDelivery => Decimal::ZERO,
        };

        discount.min(order_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            code: "TEST".to_string(),
            title: "Test coupon".to_string(),
            description: None,
            discount_type,
            discount_value: value,
            max_discount_amount: None,
            min_order_amount: dec!(0),
            max_order_amount: None,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            max_usage_count: None,
            current_usage_count: 0,
            max_usage_per_user: 1,
            applicable_to: ApplicableTo::All,
            applicable_users: vec![],
            is_active: true,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_coupon_passes() {
        let c = coupon(DiscountType::Flat, dec!(50));
        assert!(CouponValidator::validate(&c, 7, dec!(500), Utc::now(), 0).is_ok());
    }

    #[test]
    fn test_inactive_coupon_rejected_first() {
        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.is_active = false;
        // Also expired, but the inactive check comes first in the chain
        c.valid_until = Utc::now() - Duration::days(1);
        assert_eq!(
            CouponValidator::validate(&c, 7, dec!(500), Utc::now(), 0),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn test_not_yet_valid_and_expired() {
        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.valid_from = Utc::now() + Duration::days(1);
        c.valid_until = Utc::now() + Duration::days(2);
        assert_eq!(
            CouponValidator::validate(&c, 7, dec!(500), Utc::now(), 0),
            Err(CouponRejection::NotYetValid)
        );

        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.valid_until = Utc::now() - Duration::hours(1);
        assert_eq!(
            CouponValidator::validate(&c, 7, dec!(500), Utc::now(), 0),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn test_global_usage_cap() {
        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.max_usage_count = Some(100);
        c.current_usage_count = 100;
        assert_eq!(
            CouponValidator::validate(&c, 7, dec!(500), Utc::now(), 0),
            Err(CouponRejection::UsageLimitReached)
        );
    }

    // Scenario: flat coupon with a 200 minimum applied to a 180 order
    // fails with a reason that names the minimum.
    #[test]
    fn test_below_minimum_order_names_the_minimum() {
        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.min_order_amount = dec!(200);
        let rejection =
            CouponValidator::validate(&c, 7, dec!(180), Utc::now(), 0).unwrap_err();
        assert_eq!(rejection, CouponRejection::BelowMinimumOrder(dec!(200)));
        assert!(rejection.to_string().contains("200"));
    }

    #[test]
    fn test_above_maximum_order() {
        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.max_order_amount = Some(dec!(1000));
        assert_eq!(
            CouponValidator::validate(&c, 7, dec!(1500), Utc::now(), 0),
            Err(CouponRejection::AboveMaximumOrder(dec!(1000)))
        );
    }

    #[test]
    fn test_specific_users_restriction() {
        let mut c = coupon(DiscountType::Flat, dec!(50));
        c.applicable_to = ApplicableTo::SpecificUsers;
        c.applicable_users = vec![1, 2, 3];
        assert!(CouponValidator::validate(&c, 2, dec!(500), Utc::now(), 0).is_ok());
        assert_eq!(
            CouponValidator::validate(&c, 7, dec!(500), Utc::now(), 0),
            Err(CouponRejection::NotApplicableToUser)
        );
    }

    #[test]
    fn test_per_user_limit() {
        let c = coupon(DiscountType::Flat, dec!(50));
        assert_eq!(
            CouponValidator::validate(&c, 7, dec!(500), Utc::now(), 1),
            Err(CouponRejection::PerUserLimitReached)
        );
    }

    #[test]
    fn test_validation_is_repeatable_without_commit() {
        let c = coupon(DiscountType::Flat, dec!(50));
        let now = Utc::now();
        let first = CouponValidator::validate(&c, 7, dec!(500), now, 0);
        let second = CouponValidator::validate(&c, 7, dec!(500), now, 0);
        assert_eq!(first, second);
    }

    // Scenario: 20% coupon with a 150 cap on a 1000 order discounts 150.
    #[test]
    fn test_percentage_discount_capped() {
        let mut c = coupon(DiscountType::Percentage, dec!(20));
        c.max_discount_amount = Some(dec!(150));
        assert_eq!(CouponValidator::discount_for(&c, dec!(1000)), dec!(150));
    }

    #[test]
    fn test_percentage_discount_uncapped() {
        let c = coupon(DiscountType::Percentage, dec!(20));
        assert_eq!(CouponValidator::discount_for(&c, dec!(1000)), dec!(200));
    }

    #[test]
    fn test_flat_discount_never_exceeds_order_amount() {
        let c = coupon(DiscountType::Flat, dec!(50));
        assert_eq!(CouponValidator::discount_for(&c, dec!(30)), dec!(30));
    }

    #[test]
    fn test_free_delivery_contributes_no_item_discount() {
        let c = coupon(DiscountType::FreeDelivery, dec!(0));
        assert_eq!(CouponValidator::discount_for(&c, dec!(1000)), dec!(0));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn percentage_coupon(value: u32, cap: Option<u32>) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            code: "PROP".to_string(),
            title: "Property coupon".to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(value),
            max_discount_amount: cap.map(Decimal::from),
            min_order_amount: Decimal::ZERO,
            max_order_amount: None,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            max_usage_count: None,
            current_usage_count: 0,
            max_usage_per_user: 1,
            applicable_to: ApplicableTo::All,
            applicable_users: vec![],
            is_active: true,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Discounts never exceed the order amount, regardless of terms
    #[test]
    fn prop_discount_never_exceeds_order_amount() {
        proptest!(|(
            value in 1u32..=100,
            cap in proptest::option::of(1u32..=10000),
            amount_cents in 0u32..=1_000_000u32
        )| {
            let coupon = percentage_coupon(value, cap);
            let amount = Decimal::from(amount_cents) / Decimal::from(100);
            let discount = CouponValidator::discount_for(&coupon, amount);
            prop_assert!(discount <= amount);
            prop_assert!(discount >= Decimal::ZERO);
        });
    }

    /// A cap is always honored for percentage coupons
    #[test]
    fn prop_percentage_cap_is_honored() {
        proptest!(|(
            value in 1u32..=100,
            cap in 1u32..=500,
            amount_cents in 0u32..=1_000_000u32
        )| {
            let coupon = percentage_coupon(value, Some(cap));
            let amount = Decimal::from(amount_cents) / Decimal::from(100);
            let discount = CouponValidator::discount_for(&coupon, amount);
            prop_assert!(discount <= Decimal::from(cap));
        });
    }
}
