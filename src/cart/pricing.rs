use rust_decimal::Decimal;

use crate::cart::models::{AppliedCoupon, RestaurantGroup, SelectedAddOn, SelectedVariant};
use crate::coupons::DiscountType;

/// Computed price of one cart line
#[derive(Debug, Clone, PartialEq)]
pub struct LinePricing {
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    /// Set when negative deltas pushed the unit price below zero and it was
    /// clamped; the caller logs these for audit.
    pub clamped: bool,
}

/// Totals for an entire cart
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct CartSummary {
    pub total_items: i32,
    pub items_total: Decimal,
    pub total_delivery_fee: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
}

/// Pricing errors for malformed input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i32),
}

/// Service for cart and order price calculations
///
/// Pure functions over snapshots; no external state is touched.
pub struct PricingEngine;

impl PricingEngine {
    /// Calculate the price of one line
    ///
    /// unit price = base price + variant deltas + add-on deltas, clamped at
    /// zero; subtotal = unit price × quantity. Negative deltas are legal
    /// (discount variants) but can never make a line worth less than nothing.
    pub fn item_subtotal(
        base_price: Decimal,
        variants: &[SelectedVariant],
        add_ons: &[SelectedAddOn],
        quantity: i32,
    ) -> Result<LinePricing, PricingError> {
        if quantity < 1 {
            return Err(PricingError::InvalidQuantity(quantity));
        }

        let variant_total: Decimal = variants.iter().map(|v| v.price).sum();
        let add_on_total: Decimal = add_ons.iter().map(|a| a.price).sum();

        let raw_unit_price = base_price + variant_total + add_on_total;
        let clamped = raw_unit_price < Decimal::ZERO;
        let unit_price = raw_unit_price.max(Decimal::ZERO);

        Ok(LinePricing {
            unit_price,
            subtotal: unit_price * Decimal::from(quantity),
            clamped,
        })
    }

    /// Sum of the line subtotals in one restaurant group
    pub fn restaurant_subtotal(group: &RestaurantGroup) -> Decimal {
        group.items.iter().map(|item| item.subtotal).sum()
    }

    /// Discount an applied coupon yields against the given totals
    ///
    /// Free-delivery coupons discount exactly the delivery fee total; the
    /// result is always clamped so the grand total cannot go negative.
    pub fn coupon_discount(
        coupon: &AppliedCoupon,
        items_total: Decimal,
        total_delivery_fee: Decimal,
    ) -> Decimal {
        let discount = match coupon.discount_type {
            DiscountType::Percentage => {
                let raw = items_total * coupon.discount_value / Decimal::from(100);
                match coupon.max_discount_amount {
                    Some(cap) if raw > cap => cap,
                    _ => raw,
                }
            }
            DiscountType::Flat => coupon.discount_value,
            DiscountType::FreeDelivery => total_delivery_fee,
        };

        discount.min(items_total + total_delivery_fee)
    }

    /// Aggregate restaurant groups into a cart summary
    ///
    /// Assumes line and group subtotals are current; `Cart::recompute_summary`
    /// refreshes those before calling in.
    pub fn cart_summary(
        groups: &[RestaurantGroup],
        applied_coupon: Option<&AppliedCoupon>,
    ) -> CartSummary {
        let total_items: i32 = groups
            .iter()
            .flat_map(|g| g.items.iter())
            .map(|item| item.quantity)
            .sum();

        let items_total: Decimal = groups.iter().map(|g| g.subtotal).sum();
        let total_delivery_fee: Decimal = groups.iter().map(|g| g.delivery_fee).sum();

        let discount = applied_coupon
            .map(|coupon| Self::coupon_discount(coupon, items_total, total_delivery_fee))
            .unwrap_or(Decimal::ZERO);

        CartSummary {
            total_items,
            items_total,
            total_delivery_fee,
            discount,
            total_amount: items_total + total_delivery_fee - discount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::models::CartItem;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn variant(name: &str, option: &str, price: Decimal) -> SelectedVariant {
        SelectedVariant {
            name: name.to_string(),
            option: option.to_string(),
            price,
        }
    }

    fn add_on(name: &str, price: Decimal) -> SelectedAddOn {
        SelectedAddOn {
            name: name.to_string(),
            price,
        }
    }

    fn line(subtotal: Decimal, quantity: i32) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            menu_item_id: Uuid::new_v4(),
            name: "Item".to_string(),
            image: None,
            price: dec!(0),
            quantity,
            selected_variants: vec![],
            selected_add_ons: vec![],
            instructions: None,
            subtotal,
            added_at: Utc::now(),
        }
    }

    fn group(restaurant_subtotal: Decimal, delivery_fee: Decimal, items: Vec<CartItem>) -> RestaurantGroup {
        RestaurantGroup {
            restaurant_id: Uuid::new_v4(),
            items,
            subtotal: restaurant_subtotal,
            delivery_fee,
            special_instructions: None,
        }
    }

    // Scenario: base 100, one variant +20, quantity 2 yields 240.
    #[test]
    fn test_item_subtotal_with_variant() {
        let pricing = PricingEngine::item_subtotal(
            dec!(100),
            &[variant("Size", "Large", dec!(20))],
            &[],
            2,
        )
        .unwrap();
        assert_eq!(pricing.subtotal, dec!(240));
        assert!(!pricing.clamped);
    }

    #[test]
    fn test_item_subtotal_with_add_ons() {
        let pricing = PricingEngine::item_subtotal(
            dec!(100),
            &[variant("Size", "Large", dec!(20))],
            &[add_on("Extra Cheese", dec!(25)), add_on("Dip", dec!(15))],
            3,
        )
        .unwrap();
        assert_eq!(pricing.unit_price, dec!(160));
        assert_eq!(pricing.subtotal, dec!(480));
    }

    #[test]
    fn test_item_subtotal_rejects_zero_quantity() {
        assert_eq!(
            PricingEngine::item_subtotal(dec!(100), &[], &[], 0),
            Err(PricingError::InvalidQuantity(0))
        );
    }

    #[test]
    fn test_negative_deltas_clamp_at_zero() {
        let pricing = PricingEngine::item_subtotal(
            dec!(50),
            &[variant("Promo", "Mega discount", dec!(-80))],
            &[],
            2,
        )
        .unwrap();
        assert_eq!(pricing.unit_price, dec!(0));
        assert_eq!(pricing.subtotal, dec!(0));
        assert!(pricing.clamped);
    }

    #[test]
    fn test_negative_delta_without_underflow_is_not_flagged() {
        let pricing = PricingEngine::item_subtotal(
            dec!(100),
            &[variant("Promo", "Small discount", dec!(-30))],
            &[],
            1,
        )
        .unwrap();
        assert_eq!(pricing.unit_price, dec!(70));
        assert!(!pricing.clamped);
    }

    #[test]
    fn test_restaurant_subtotal_sums_lines() {
        let g = group(
            dec!(0),
            dec!(0),
            vec![line(dec!(240), 2), line(dec!(120), 1)],
        );
        assert_eq!(PricingEngine::restaurant_subtotal(&g), dec!(360));
    }

    #[test]
    fn test_cart_summary_without_coupon() {
        let groups = vec![
            group(dec!(360), dec!(40), vec![line(dec!(240), 2), line(dec!(120), 1)]),
            group(dec!(200), dec!(30), vec![line(dec!(200), 4)]),
        ];
        let summary = PricingEngine::cart_summary(&groups, None);
        assert_eq!(summary.total_items, 7);
        assert_eq!(summary.items_total, dec!(560));
        assert_eq!(summary.total_delivery_fee, dec!(70));
        assert_eq!(summary.discount, dec!(0));
        assert_eq!(summary.total_amount, dec!(630));
    }

    fn percentage_coupon(value: Decimal, cap: Option<Decimal>) -> AppliedCoupon {
        AppliedCoupon {
            code: "PCT".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: value,
            max_discount_amount: cap,
            discount_amount: Decimal::ZERO,
        }
    }

    #[test]
    fn test_cart_summary_percentage_coupon_capped() {
        let groups = vec![group(dec!(1000), dec!(50), vec![line(dec!(1000), 1)])];
        let coupon = percentage_coupon(dec!(20), Some(dec!(150)));
        let summary = PricingEngine::cart_summary(&groups, Some(&coupon));
        assert_eq!(summary.discount, dec!(150));
        assert_eq!(summary.total_amount, dec!(900));
    }

    #[test]
    fn test_cart_summary_flat_coupon() {
        let groups = vec![group(dec!(500), dec!(40), vec![line(dec!(500), 1)])];
        let coupon = AppliedCoupon {
            code: "FLAT50".to_string(),
            discount_type: DiscountType::Flat,
            discount_value: dec!(50),
            max_discount_amount: None,
            discount_amount: Decimal::ZERO,
        };
        let summary = PricingEngine::cart_summary(&groups, Some(&coupon));
        assert_eq!(summary.discount, dec!(50));
        assert_eq!(summary.total_amount, dec!(490));
    }

    #[test]
    fn test_cart_summary_free_delivery_coupon() {
        let groups = vec![
            group(dec!(300), dec!(40), vec![line(dec!(300), 1)]),
            group(dec!(200), dec!(35), vec![line(dec!(200), 1)]),
        ];
        let coupon = AppliedCoupon {
            code: "FREESHIP".to_string(),
            discount_type: DiscountType::FreeDelivery,
            discount_value: dec!(0),
            max_discount_amount: None,
            discount_amount: Decimal::ZERO,
        };
        let summary = PricingEngine::cart_summary(&groups, Some(&coupon));
        assert_eq!(summary.discount, dec!(75));
        assert_eq!(summary.total_amount, dec!(500));
    }

    #[test]
    fn test_discount_clamped_to_keep_total_non_negative() {
        let groups = vec![group(dec!(30), dec!(10), vec![line(dec!(30), 1)])];
        let coupon = AppliedCoupon {
            code: "HUGE".to_string(),
            discount_type: DiscountType::Flat,
            discount_value: dec!(500),
            max_discount_amount: None,
            discount_amount: Decimal::ZERO,
        };
        let summary = PricingEngine::cart_summary(&groups, Some(&coupon));
        assert_eq!(summary.discount, dec!(40));
        assert_eq!(summary.total_amount, dec!(0));
    }

    #[test]
    fn test_empty_cart_summary_is_zero() {
        let summary = PricingEngine::cart_summary(&[], None);
        assert_eq!(summary, CartSummary::default());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn money(cents: u32) -> Decimal {
        Decimal::from(cents) / Decimal::from(100)
    }

    /// Subtotal equals (base + deltas) × quantity and is never negative
    #[test]
    fn prop_subtotal_formula_holds() {
        proptest!(|(
            base_cents in 0u32..=100_000,
            variant_cents in proptest::collection::vec(-5_000i32..=5_000, 0..4),
            quantity in 1i32..=50
        )| {
            let base = money(base_cents);
            let variants: Vec<SelectedVariant> = variant_cents
                .iter()
                .enumerate()
                .map(|(i, &c)| SelectedVariant {
                    name: format!("v{}", i),
                    option: "o".to_string(),
                    price: Decimal::from(c) / Decimal::from(100),
                })
                .collect();

            let pricing = PricingEngine::item_subtotal(base, &variants, &[], quantity).unwrap();

            let delta: Decimal = variants.iter().map(|v| v.price).sum();
            let expected_unit = (base + delta).max(Decimal::ZERO);
            prop_assert_eq!(pricing.unit_price, expected_unit);
            prop_assert_eq!(pricing.subtotal, expected_unit * Decimal::from(quantity));
            prop_assert!(pricing.subtotal >= Decimal::ZERO);
        });
    }

    /// Total amount is never negative for any coupon terms
    #[test]
    fn prop_total_amount_never_negative() {
        proptest!(|(
            subtotal_cents in 0u32..=100_000,
            fee_cents in 0u32..=5_000,
            flat_cents in 0u32..=500_000
        )| {
            let group = RestaurantGroup {
                restaurant_id: uuid::Uuid::new_v4(),
                items: vec![],
                subtotal: money(subtotal_cents),
                delivery_fee: money(fee_cents),
                special_instructions: None,
            };
            let coupon = AppliedCoupon {
                code: "X".to_string(),
                discount_type: crate::coupons::DiscountType::Flat,
                discount_value: money(flat_cents),
                max_discount_amount: None,
                discount_amount: Decimal::ZERO,
            };
            let summary = PricingEngine::cart_summary(&[group], Some(&coupon));
            prop_assert!(summary.total_amount >= Decimal::ZERO);
        });
    }

    /// Group order does not change the summary totals
    #[test]
    fn prop_summary_is_commutative_over_groups() {
        proptest!(|(
            subtotals in proptest::collection::vec((0u32..=50_000, 0u32..=2_000), 1..6)
        )| {
            let groups: Vec<RestaurantGroup> = subtotals
                .iter()
                .map(|&(sub, fee)| RestaurantGroup {
                    restaurant_id: uuid::Uuid::new_v4(),
                    items: vec![],
                    subtotal: money(sub),
                    delivery_fee: money(fee),
                    special_instructions: None,
                })
                .collect();

            let forward = PricingEngine::cart_summary(&groups, None);
            let mut reversed = groups.clone();
            reversed.reverse();
            let backward = PricingEngine::cart_summary(&reversed, None);

            prop_assert_eq!(forward.items_total, backward.items_total);
            prop_assert_eq!(forward.total_delivery_fee, backward.total_delivery_fee);
            prop_assert_eq!(forward.total_amount, backward.total_amount);
        });
    }
}
