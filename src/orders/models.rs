use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::cart::{SelectedAddOn, SelectedVariant};

/// Order status enum representing the lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Picked,
    OnTheWay,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Picked => "picked",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "preparing" => Ok(OrderStatus::Preparing),
            "ready" => Ok(OrderStatus::Ready),
            "picked" => Ok(OrderStatus::Picked),
            "on_the_way" => Ok(OrderStatus::OnTheWay),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "rejected" => Ok(OrderStatus::Rejected),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment method enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Online,
    Wallet,
    Upi,
}

/// Payment status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// Who cancelled an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Customer,
    Vendor,
    Admin,
    System,
}

/// Immutable line-item snapshot frozen into the order at checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub menu_item_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub selected_variants: Vec<SelectedVariant>,
    pub selected_add_ons: Vec<SelectedAddOn>,
    pub instructions: Option<String>,
    pub subtotal: Decimal,
}

/// Delivery address snapshot with coordinates
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeliveryAddress {
    pub label: Option<String>,
    #[validate(length(min = 1, message = "Address line is required"))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Pincode is required"))]
    pub pincode: String,
    #[validate(custom = "crate::validation::validate_latitude")]
    pub latitude: f64,
    #[validate(custom = "crate::validation::validate_longitude")]
    pub longitude: f64,
}

/// An order: the long-lived record of truth created from a cart at checkout
///
/// Line items and the pricing breakdown never change after placement; only
/// the status, payment fields, and settlement fields mutate.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: i32,
    pub restaurant_id: Uuid,
    pub items: Json<Vec<OrderItem>>,
    pub delivery_address: Json<DeliveryAddress>,
    pub customer_phone: String,
    pub delivery_partner_id: Option<i32>,
    pub items_total: Decimal,
    pub delivery_fee: Decimal,
    pub packaging_charges: Decimal,
    pub tax_amount: Decimal,
    pub discount: Decimal,
    pub coupon_discount: Decimal,
    pub total_amount: Decimal,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub estimated_delivery_time: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub picked_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub special_instructions: Option<String>,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub vendor_earnings: Decimal,
    pub delivery_earnings: Decimal,
    pub is_settled: bool,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the customer may still cancel
    ///
    /// Only permitted before the kitchen starts: pending or confirmed.
    pub fn can_be_cancelled(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Derive commission and vendor earnings from the order total
    ///
    /// Idempotent: recomputing with the same inputs yields the same output.
    pub fn calculate_settlement(&mut self) {
        self.commission_amount = self.total_amount * self.commission_rate / Decimal::from(100);
        self.vendor_earnings = self.total_amount - self.commission_amount - self.delivery_earnings;
    }
}

/// One append-only entry in an order's status history
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusEvent {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Generate an order number: prefix + time-derived digits + random suffix
///
/// Uniqueness is enforced by the database constraint, not by this function.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().to_string();
    let tail = if millis.len() > 8 {
        &millis[millis.len() - 8..]
    } else {
        &millis
    };
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("ORD{}{:03}", tail, suffix)
}

/// Request DTO for checkout
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate]
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    /// Gateway reference for prepaid orders; recorded verbatim
    pub transaction_id: Option<String>,
    #[validate(length(min = 5, max = 20, message = "Phone must be 5-20 characters"))]
    pub customer_phone: String,
    #[validate(length(max = 1000, message = "Instructions must be at most 1000 characters"))]
    pub special_instructions: Option<String>,
    /// Optional tip for the delivery partner
    pub tip: Option<Decimal>,
}

/// Request DTO for updating order status
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

/// Request DTO for cancelling an order
#[derive(Debug, Deserialize, Validate)]
pub struct CancelOrderRequest {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Query parameters for order listings
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Response DTO for an order with its status history
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub status_history: Vec<StatusEvent>,
}

/// Paginated order listing
#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order_with(status: OrderStatus, total: Decimal) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: generate_order_number(now),
            customer_id: 1,
            restaurant_id: Uuid::new_v4(),
            items: Json(vec![]),
            delivery_address: Json(DeliveryAddress {
                label: None,
                address_line1: "1 Main St".to_string(),
                address_line2: None,
                city: "Pune".to_string(),
                state: "MH".to_string(),
                pincode: "411001".to_string(),
                latitude: 18.52,
                longitude: 73.85,
            }),
            customer_phone: "9999999999".to_string(),
            delivery_partner_id: None,
            items_total: total,
            delivery_fee: dec!(0),
            packaging_charges: dec!(0),
            tax_amount: dec!(0),
            discount: dec!(0),
            coupon_discount: dec!(0),
            total_amount: total,
            coupon_code: None,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            transaction_id: None,
            paid_at: None,
            status,
            estimated_delivery_time: now,
            accepted_at: None,
            preparing_at: None,
            ready_at: None,
            picked_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            cancelled_by: None,
            special_instructions: None,
            commission_rate: dec!(15),
            commission_amount: dec!(0),
            vendor_earnings: dec!(0),
            delivery_earnings: dec!(0),
            is_settled: false,
            settled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_can_be_cancelled_only_early() {
        assert!(order_with(OrderStatus::Pending, dec!(100)).can_be_cancelled());
        assert!(order_with(OrderStatus::Confirmed, dec!(100)).can_be_cancelled());
        assert!(!order_with(OrderStatus::Preparing, dec!(100)).can_be_cancelled());
        assert!(!order_with(OrderStatus::Delivered, dec!(100)).can_be_cancelled());
        assert!(!order_with(OrderStatus::Cancelled, dec!(100)).can_be_cancelled());
    }

    #[test]
    fn test_settlement_split() {
        let mut order = order_with(OrderStatus::Delivered, dec!(1000));
        order.delivery_earnings = dec!(60);
        order.calculate_settlement();
        assert_eq!(order.commission_amount, dec!(150));
        assert_eq!(order.vendor_earnings, dec!(790));
    }

    #[test]
    fn test_settlement_is_idempotent() {
        let mut order = order_with(OrderStatus::Delivered, dec!(850));
        order.delivery_earnings = dec!(40);
        order.calculate_settlement();
        let first = (order.commission_amount, order.vendor_earnings);
        order.calculate_settlement();
        assert_eq!((order.commission_amount, order.vendor_earnings), first);
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number(Utc::now());
        assert!(number.starts_with("ORD"));
        assert_eq!(number.len(), 3 + 8 + 3);
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
    }
}
