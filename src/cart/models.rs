use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::cart::error::CartError;
use crate::cart::pricing::{CartSummary, PricingEngine};
use crate::coupons::DiscountType;

/// Rolling cart lifetime; refreshed on every mutation
pub const CART_TTL_DAYS: i64 = 7;

/// A selected variant option, e.g. Size: Large (+30)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedVariant {
    pub name: String,
    pub option: String,
    /// Price delta contributed by this selection
    pub price: Decimal,
}

/// A selected add-on, e.g. Extra Cheese (+25)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedAddOn {
    pub name: String,
    pub price: Decimal,
}

/// One line in a cart: a menu item snapshot plus its selected customizations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    /// Base price captured at add-time; later menu edits do not touch it
    pub price: Decimal,
    pub quantity: i32,
    pub selected_variants: Vec<SelectedVariant>,
    pub selected_add_ons: Vec<SelectedAddOn>,
    pub instructions: Option<String>,
    pub subtotal: Decimal,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Canonical identity of this line's configuration
    ///
    /// Two lines with the same menu item and the same variant/add-on
    /// selections are the same configuration regardless of the order the
    /// selections were sent in.
    pub fn selection_key(&self) -> String {
        selection_key(
            self.menu_item_id,
            &self.selected_variants,
            &self.selected_add_ons,
        )
    }
}

/// Build the canonical selection key for a configuration
pub fn selection_key(
    menu_item_id: Uuid,
    variants: &[SelectedVariant],
    add_ons: &[SelectedAddOn],
) -> String {
    let mut variant_parts: Vec<String> = variants
        .iter()
        .map(|v| format!("{}={}", v.name, v.option))
        .collect();
    variant_parts.sort();

    let mut add_on_parts: Vec<String> = add_ons.iter().map(|a| a.name.clone()).collect();
    add_on_parts.sort();

    format!(
        "{}|{}|{}",
        menu_item_id,
        variant_parts.join(";"),
        add_on_parts.join(";")
    )
}

/// Cart lines for one restaurant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantGroup {
    pub restaurant_id: Uuid,
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub special_instructions: Option<String>,
}

/// Denormalized coupon snapshot stored on the cart
///
/// The displayed discount stays stable even if the coupon's terms change
/// after it was applied; usage is only recorded at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    /// Discount as last computed against this cart
    pub discount_amount: Decimal,
}

/// Input for a new cart line, built from a catalog snapshot
#[derive(Debug, Clone)]
pub struct NewCartItem {
    pub menu_item_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub selected_variants: Vec<SelectedVariant>,
    pub selected_add_ons: Vec<SelectedAddOn>,
    pub instructions: Option<String>,
}

/// A customer's cart: restaurant groups, coupon snapshot, running summary
///
/// The version column backs optimistic concurrency: every save increments it
/// and a stale writer gets a conflict instead of silently overwriting.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub customer_id: i32,
    pub restaurants: Json<Vec<RestaurantGroup>>,
    pub applied_coupon: Option<Json<AppliedCoupon>>,
    pub summary: Json<CartSummary>,
    pub version: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Build an empty cart for a customer
    pub fn new(customer_id: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            restaurants: Json(Vec::new()),
            applied_coupon: None,
            summary: Json(CartSummary::default()),
            version: 0,
            expires_at: now + Duration::days(CART_TTL_DAYS),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this cart has passed its rolling expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Refresh the rolling expiry window
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.expires_at = now + Duration::days(CART_TTL_DAYS);
    }

    /// Whether the cart holds no lines
    pub fn is_empty(&self) -> bool {
        self.restaurants.iter().all(|g| g.items.is_empty())
    }

    /// Add an item to the cart
    ///
    /// If a line with the same configuration already exists in the
    /// restaurant's group its quantity is incremented; otherwise a new line
    /// is appended. `delivery_fee` seeds a newly created group.
    pub fn add_item(
        &mut self,
        restaurant_id: Uuid,
        delivery_fee: Decimal,
        item: NewCartItem,
    ) -> Result<(), CartError> {
        if item.quantity < 1 {
            return Err(CartError::InvalidQuantity(item.quantity));
        }

        let group_index = match self
            .restaurants
            .iter()
            .position(|g| g.restaurant_id == restaurant_id)
        {
            Some(index) => index,
            None => {
                self.restaurants.push(RestaurantGroup {
                    restaurant_id,
                    items: Vec::new(),
                    subtotal: Decimal::ZERO,
                    delivery_fee,
                    special_instructions: None,
                });
                self.restaurants.len() - 1
            }
        };
        let group = &mut self.restaurants[group_index];

        let key = selection_key(item.menu_item_id, &item.selected_variants, &item.selected_add_ons);
        match group.items.iter_mut().find(|i| i.selection_key() == key) {
            Some(existing) => {
                existing.quantity += item.quantity;
            }
            None => {
                group.items.push(CartItem {
                    id: Uuid::new_v4(),
                    menu_item_id: item.menu_item_id,
                    name: item.name,
                    image: item.image,
                    price: item.price,
                    quantity: item.quantity,
                    selected_variants: item.selected_variants,
                    selected_add_ons: item.selected_add_ons,
                    instructions: item.instructions,
                    subtotal: Decimal::ZERO,
                    added_at: Utc::now(),
                });
            }
        }

        self.recompute_summary()
    }

    /// Set a line's quantity; zero or less removes the line
    pub fn update_item_quantity(
        &mut self,
        restaurant_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove_item(restaurant_id, item_id);
        }

        let group = self
            .restaurants
            .iter_mut()
            .find(|g| g.restaurant_id == restaurant_id)
            .ok_or(CartError::RestaurantGroupNotFound(restaurant_id))?;

        let item = group
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or(CartError::ItemNotFound(item_id))?;

        item.quantity = quantity;

        self.recompute_summary()
    }

    /// Remove a line; an emptied restaurant group is pruned
    pub fn remove_item(&mut self, restaurant_id: Uuid, item_id: Uuid) -> Result<(), CartError> {
        let group = self
            .restaurants
            .iter_mut()
            .find(|g| g.restaurant_id == restaurant_id)
            .ok_or(CartError::RestaurantGroupNotFound(restaurant_id))?;

        let before = group.items.len();
        group.items.retain(|i| i.id != item_id);
        if group.items.len() == before {
            return Err(CartError::ItemNotFound(item_id));
        }

        if group.items.is_empty() {
            self.restaurants.retain(|g| g.restaurant_id != restaurant_id);
        }

        self.recompute_summary()
    }

    /// Empty all groups and drop the applied coupon
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.restaurants.clear();
        self.applied_coupon = None;
        self.recompute_summary()
    }

    /// Store a coupon snapshot on the cart
    pub fn apply_coupon(&mut self, coupon: AppliedCoupon) -> Result<(), CartError> {
        self.applied_coupon = Some(Json(coupon));
        self.recompute_summary()
    }

    /// Recompute all derived money fields
    ///
    /// Explicitly invoked by every mutating operation; there is no implicit
    /// recomputation on save.
    pub fn recompute_summary(&mut self) -> Result<(), CartError> {
        for group in self.restaurants.iter_mut() {
            for item in group.items.iter_mut() {
                let pricing = PricingEngine::item_subtotal(
                    item.price,
                    &item.selected_variants,
                    &item.selected_add_ons,
                    item.quantity,
                )
                .map_err(|_| CartError::InvalidQuantity(item.quantity))?;

                if pricing.clamped {
                    tracing::warn!(
                        "Unit price clamped to zero for cart item {} ({})",
                        item.id,
                        item.name
                    );
                }

                item.subtotal = pricing.subtotal;
            }

            group.subtotal = PricingEngine::restaurant_subtotal(group);
        }

        let summary = PricingEngine::cart_summary(
            &self.restaurants,
            self.applied_coupon.as_ref().map(|c| &c.0),
        );

        if let Some(coupon) = self.applied_coupon.as_mut() {
            coupon.discount_amount = summary.discount;
        }
        self.summary = Json(summary);

        Ok(())
    }
}

/// Request DTO for adding an item to the cart
#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub restaurant_id: Uuid,
    pub menu_item_id: Uuid,
    /// Defaults to 1 when omitted
    pub quantity: Option<i32>,
    #[serde(default)]
    pub selected_variants: Vec<VariantSelection>,
    #[serde(default)]
    pub selected_add_ons: Vec<String>,
    #[validate(length(max = 500, message = "Instructions must be at most 500 characters"))]
    pub instructions: Option<String>,
}

/// A requested variant choice; the price delta is resolved from the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct VariantSelection {
    pub name: String,
    pub option: String,
}

/// Request DTO for updating a line's quantity
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub restaurant_id: Uuid,
    pub quantity: i32,
}

/// Request DTO for removing a line
#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    pub restaurant_id: Uuid,
}

/// Request DTO for applying a coupon to the cart
#[derive(Debug, Deserialize, Validate)]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_item(menu_item_id: Uuid, price: Decimal, quantity: i32) -> NewCartItem {
        NewCartItem {
            menu_item_id,
            name: "Veg Wrap".to_string(),
            image: None,
            price,
            quantity,
            selected_variants: vec![],
            selected_add_ons: vec![],
            instructions: None,
        }
    }

    #[test]
    fn test_add_item_creates_group_and_computes_totals() {
        let mut cart = Cart::new(1);
        let restaurant = Uuid::new_v4();
        cart.add_item(restaurant, dec!(40), new_item(Uuid::new_v4(), dec!(120), 2))
            .unwrap();

        assert_eq!(cart.restaurants.len(), 1);
        assert_eq!(cart.summary.items_total, dec!(240));
        assert_eq!(cart.summary.total_delivery_fee, dec!(40));
        assert_eq!(cart.summary.total_amount, dec!(280));
        assert_eq!(cart.summary.total_items, 2);
    }

    #[test]
    fn test_add_same_configuration_merges_quantity() {
        let mut cart = Cart::new(1);
        let restaurant = Uuid::new_v4();
        let menu_item = Uuid::new_v4();

        cart.add_item(restaurant, dec!(0), new_item(menu_item, dec!(100), 1))
            .unwrap();
        cart.add_item(restaurant, dec!(0), new_item(menu_item, dec!(100), 2))
            .unwrap();

        assert_eq!(cart.restaurants[0].items.len(), 1);
        assert_eq!(cart.restaurants[0].items[0].quantity, 3);
        assert_eq!(cart.summary.items_total, dec!(300));
    }

    #[test]
    fn test_selection_order_does_not_create_duplicate_lines() {
        let mut cart = Cart::new(1);
        let restaurant = Uuid::new_v4();
        let menu_item = Uuid::new_v4();

        let mut first = new_item(menu_item, dec!(100), 1);
        first.selected_add_ons = vec![
            SelectedAddOn {
                name: "Cheese".to_string(),
                price: dec!(20),
            },
            SelectedAddOn {
                name: "Dip".to_string(),
                price: dec!(10),
            },
        ];

        let mut second = new_item(menu_item, dec!(100), 1);
        second.selected_add_ons = vec![
            SelectedAddOn {
                name: "Dip".to_string(),
                price: dec!(10),
            },
            SelectedAddOn {
                name: "Cheese".to_string(),
                price: dec!(20),
            },
        ];

        cart.add_item(restaurant, dec!(0), first).unwrap();
        cart.add_item(restaurant, dec!(0), second).unwrap();

        assert_eq!(cart.restaurants[0].items.len(), 1);
        assert_eq!(cart.restaurants[0].items[0].quantity, 2);
    }

    #[test]
    fn test_different_configuration_creates_new_line() {
        let mut cart = Cart::new(1);
        let restaurant = Uuid::new_v4();
        let menu_item = Uuid::new_v4();

        cart.add_item(restaurant, dec!(0), new_item(menu_item, dec!(100), 1))
            .unwrap();

        let mut customized = new_item(menu_item, dec!(100), 1);
        customized.selected_variants = vec![SelectedVariant {
            name: "Size".to_string(),
            option: "Large".to_string(),
            price: dec!(30),
        }];
        cart.add_item(restaurant, dec!(0), customized).unwrap();

        assert_eq!(cart.restaurants[0].items.len(), 2);
    }

    #[test]
    fn test_update_quantity_to_zero_removes_line_and_group() {
        let mut cart = Cart::new(1);
        let restaurant = Uuid::new_v4();
        cart.add_item(restaurant, dec!(0), new_item(Uuid::new_v4(), dec!(100), 2))
            .unwrap();
        let item_id = cart.restaurants[0].items[0].id;

        cart.update_item_quantity(restaurant, item_id, 0).unwrap();

        assert!(cart.restaurants.is_empty());
        assert_eq!(cart.summary.total_amount, dec!(0));
    }

    #[test]
    fn test_remove_unknown_item_errors() {
        let mut cart = Cart::new(1);
        let restaurant = Uuid::new_v4();
        cart.add_item(restaurant, dec!(0), new_item(Uuid::new_v4(), dec!(100), 1))
            .unwrap();

        let missing = Uuid::new_v4();
        assert!(matches!(
            cart.remove_item(restaurant, missing),
            Err(CartError::ItemNotFound(_))
        ));
        assert!(matches!(
            cart.remove_item(Uuid::new_v4(), missing),
            Err(CartError::RestaurantGroupNotFound(_))
        ));
    }

    #[test]
    fn test_clear_drops_items_and_coupon() {
        let mut cart = Cart::new(1);
        let restaurant = Uuid::new_v4();
        cart.add_item(restaurant, dec!(0), new_item(Uuid::new_v4(), dec!(100), 1))
            .unwrap();
        cart.apply_coupon(AppliedCoupon {
            code: "FLAT50".to_string(),
            discount_type: DiscountType::Flat,
            discount_value: dec!(50),
            max_discount_amount: None,
            discount_amount: dec!(0),
        })
        .unwrap();

        cart.clear().unwrap();

        assert!(cart.is_empty());
        assert!(cart.applied_coupon.is_none());
        assert_eq!(cart.summary.total_amount, dec!(0));
    }

    #[test]
    fn test_applied_coupon_snapshot_discount_tracks_cart() {
        let mut cart = Cart::new(1);
        let restaurant = Uuid::new_v4();
        cart.add_item(restaurant, dec!(0), new_item(Uuid::new_v4(), dec!(500), 1))
            .unwrap();
        cart.apply_coupon(AppliedCoupon {
            code: "TEN".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            max_discount_amount: None,
            discount_amount: dec!(0),
        })
        .unwrap();
        assert_eq!(cart.summary.discount, dec!(50));

        // Growing the cart grows the percentage discount
        cart.add_item(restaurant, dec!(0), new_item(Uuid::new_v4(), dec!(500), 1))
            .unwrap();
        assert_eq!(cart.summary.discount, dec!(100));
        assert_eq!(
            cart.applied_coupon.as_ref().unwrap().discount_amount,
            dec!(100)
        );
    }

    #[test]
    fn test_mutation_order_of_unrelated_items_is_commutative() {
        let restaurant_a = Uuid::new_v4();
        let restaurant_b = Uuid::new_v4();
        let item_a = new_item(Uuid::new_v4(), dec!(100), 1);
        let item_b = new_item(Uuid::new_v4(), dec!(250), 2);

        let mut forward = Cart::new(1);
        forward
            .add_item(restaurant_a, dec!(40), item_a.clone())
            .unwrap();
        forward
            .add_item(restaurant_b, dec!(30), item_b.clone())
            .unwrap();

        let mut backward = Cart::new(1);
        backward.add_item(restaurant_b, dec!(30), item_b).unwrap();
        backward.add_item(restaurant_a, dec!(40), item_a).unwrap();

        assert_eq!(forward.summary.items_total, backward.summary.items_total);
        assert_eq!(forward.summary.total_amount, backward.summary.total_amount);
        assert_eq!(forward.summary.total_items, backward.summary.total_items);
    }

    #[test]
    fn test_rolling_expiry_is_refreshed() {
        let mut cart = Cart::new(1);
        let original_expiry = cart.expires_at;
        let later = Utc::now() + Duration::days(3);
        cart.touch(later);
        assert!(cart.expires_at > original_expiry);
        assert_eq!(cart.expires_at, later + Duration::days(CART_TTL_DAYS));
    }
}
