// Catalog data models: restaurants and menu items
//
// Menu items carry their customization options (variant groups and add-ons)
// as embedded documents. Availability is a soft flag; deactivated items stay
// in place so historical order snapshots keep resolvable references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::validation::{validate_latitude, validate_longitude};

/// A restaurant on the marketplace
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Restaurant {
    pub id: Uuid,
    pub owner_id: i32,
    pub name: String,
    pub logo: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub is_delivery_available: bool,
    pub delivery_radius_km: f64,
    pub min_order_amount: Decimal,
    pub delivery_fee: Decimal,
    pub packaging_charges: Decimal,
    pub avg_preparation_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One option inside a variant group, e.g. "Large" under "Size"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantOption {
    pub label: String,
    /// Price delta added to the item's base price
    pub price: Decimal,
}

/// A named group of mutually exclusive options, e.g. "Size" or "Spice Level"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantGroup {
    pub name: String,
    pub options: Vec<VariantOption>,
    #[serde(default)]
    pub is_required: bool,
}

/// A flat-priced extra, e.g. "Extra Cheese"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddOn {
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

/// A menu item with its customization options
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub base_price: Decimal,
    #[schema(value_type = Vec<VariantGroup>)]
    pub variants: Json<Vec<VariantGroup>>,
    #[schema(value_type = Vec<AddOn>)]
    pub add_ons: Json<Vec<AddOn>>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    /// Resolve the price delta of a selected variant option
    ///
    /// Returns None when the group or option does not exist on this item.
    pub fn variant_price(&self, group_name: &str, option_label: &str) -> Option<Decimal> {
        self.variants
            .iter()
            .find(|g| g.name == group_name)?
            .options
            .iter()
            .find(|o| o.label == option_label)
            .map(|o| o.price)
    }

    /// Resolve an add-on by name, requiring it to be currently available
    pub fn add_on_price(&self, name: &str) -> Option<Decimal> {
        self.add_ons
            .iter()
            .find(|a| a.name == name && a.is_available)
            .map(|a| a.price)
    }
}

/// Request DTO for creating a restaurant
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRestaurant {
    pub owner_id: i32,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub logo: Option<String>,
    #[validate(custom = "validate_latitude")]
    pub latitude: f64,
    #[validate(custom = "validate_longitude")]
    pub longitude: f64,
    pub is_delivery_available: Option<bool>,
    #[validate(range(min = 1.0, max = 50.0, message = "Delivery radius must be 1-50 km"))]
    pub delivery_radius_km: Option<f64>,
    pub min_order_amount: Option<Decimal>,
    pub delivery_fee: Option<Decimal>,
    pub packaging_charges: Option<Decimal>,
    pub avg_preparation_minutes: Option<i32>,
}

/// Request DTO for creating a menu item
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMenuItem {
    pub restaurant_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub image: Option<String>,
    #[validate(custom(
        function = "crate::validation::validate_positive_amount",
        message = "Base price must be positive"
    ))]
    pub base_price: Decimal,
    #[serde(default)]
    pub variants: Vec<VariantGroup>,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
}

/// Request DTO for updating a menu item; omitted fields keep current values
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMenuItem {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    pub image: Option<String>,
    pub base_price: Option<Decimal>,
    pub variants: Option<Vec<VariantGroup>>,
    pub add_ons: Option<Vec<AddOn>>,
    pub is_available: Option<bool>,
}

/// A restaurant annotated with distance from the caller's location
#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyRestaurant {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub distance_km: f64,
    pub estimated_delivery_minutes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_item() -> MenuItem {
        MenuItem {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            name: "Paneer Wrap".to_string(),
            image: None,
            base_price: dec!(120),
            variants: Json(vec![VariantGroup {
                name: "Size".to_string(),
                options: vec![
                    VariantOption {
                        label: "Regular".to_string(),
                        price: dec!(0),
                    },
                    VariantOption {
                        label: "Large".to_string(),
                        price: dec!(30),
                    },
                ],
                is_required: true,
            }]),
            add_ons: Json(vec![
                AddOn {
                    name: "Extra Cheese".to_string(),
                    price: dec!(25),
                    is_available: true,
                },
                AddOn {
                    name: "Seasonal Dip".to_string(),
                    price: dec!(15),
                    is_available: false,
                },
            ]),
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_variant_price_resolves_known_option() {
        let item = sample_item();
        assert_eq!(item.variant_price("Size", "Large"), Some(dec!(30)));
        assert_eq!(item.variant_price("Size", "Medium"), None);
        assert_eq!(item.variant_price("Crust", "Thin"), None);
    }

    #[test]
    fn test_add_on_price_skips_unavailable() {
        let item = sample_item();
        assert_eq!(item.add_on_price("Extra Cheese"), Some(dec!(25)));
        assert_eq!(item.add_on_price("Seasonal Dip"), None);
    }
}
