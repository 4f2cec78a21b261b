use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::orders::DeliveryAddress;

/// Location history is a bounded ring buffer, not an unbounded log
pub const MAX_LOCATION_HISTORY: usize = 100;

/// Assignment axis: how the delivery relates to a partner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Assigned,
    Accepted,
    Rejected,
    Reassigning,
}

/// Physical-progress axis: where the courier actually is in the journey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    OnTheWayToPickup,
    ArrivedAtRestaurant,
    PickedUp,
    OnTheWayToCustomer,
    Delivered,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::OnTheWayToPickup => "on_the_way_to_pickup",
            DeliveryStatus::ArrivedAtRestaurant => "arrived_at_restaurant",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::OnTheWayToCustomer => "on_the_way_to_customer",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    /// Whether this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Failed | DeliveryStatus::Cancelled
        )
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a delivery attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    CustomerUnavailable,
    WrongAddress,
    CustomerRefused,
    Accident,
    VehicleBreakdown,
    Other,
}

/// Delivery priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// One point in a courier's location history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPing {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
    /// km/h, when the device reports it
    pub speed: Option<f64>,
    /// meters, when the device reports it
    pub accuracy: Option<f64>,
}

/// Proof collected at the doorstep; partial objects merge field-by-field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryProof {
    pub photo: Option<String>,
    pub signature: Option<String>,
    pub otp: Option<String>,
    pub notes: Option<String>,
}

impl DeliveryProof {
    /// Merge provided fields into this proof, keeping existing values for
    /// anything the update omits
    pub fn merge(&mut self, other: DeliveryProof) {
        if other.photo.is_some() {
            self.photo = other.photo;
        }
        if other.signature.is_some() {
            self.signature = other.signature;
        }
        if other.otp.is_some() {
            self.otp = other.otp;
        }
        if other.notes.is_some() {
            self.notes = other.notes;
        }
    }
}

/// The fulfilment record for one order
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub delivery_partner_id: Option<i32>,
    pub assignment_status: AssignmentStatus,
    pub status: DeliveryStatus,
    pub pickup_restaurant_id: Uuid,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub drop_address: Json<DeliveryAddress>,
    pub drop_latitude: f64,
    pub drop_longitude: f64,
    pub distance_km: f64,
    pub estimated_duration_min: i32,
    pub actual_duration_min: Option<i32>,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub location_history: Json<Vec<LocationPing>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub arrived_at_restaurant_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub proof: Json<DeliveryProof>,
    pub delivery_fee: Decimal,
    pub tip: Decimal,
    pub total_earnings: Decimal,
    pub failure_reason: Option<FailureReason>,
    pub failure_note: Option<String>,
    pub attempt_count: i32,
    pub priority: Priority,
    pub delivery_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    /// Whether a partner may accept this delivery right now
    ///
    /// Both axes must agree: the partner was proposed (assignment) and the
    /// physical record is still waiting at `assigned`.
    pub fn can_be_accepted(&self) -> bool {
        self.assignment_status == AssignmentStatus::Assigned
            && self.status == DeliveryStatus::Assigned
    }

    /// Record a location report
    ///
    /// Overwrites the current location, appends to the history, and evicts
    /// the oldest points beyond `MAX_LOCATION_HISTORY`.
    pub fn update_location(
        &mut self,
        latitude: f64,
        longitude: f64,
        speed: Option<f64>,
        accuracy: Option<f64>,
        now: DateTime<Utc>,
    ) {
        self.current_latitude = Some(latitude);
        self.current_longitude = Some(longitude);

        self.location_history.push(LocationPing {
            latitude,
            longitude,
            recorded_at: now,
            speed,
            accuracy,
        });

        let len = self.location_history.len();
        if len > MAX_LOCATION_HISTORY {
            self.location_history.drain(0..len - MAX_LOCATION_HISTORY);
        }
    }

    /// Earnings once a delivery completes: fee plus tip
    pub fn calculate_earnings(&mut self) -> Decimal {
        self.total_earnings = self.delivery_fee + self.tip;
        self.total_earnings
    }

    /// Stamp the timestamp tied to a physical status, if not already set
    ///
    /// Explicit counterpart of what the old persistence hook used to do.
    pub fn apply_status_timestamp(&mut self, status: DeliveryStatus, now: DateTime<Utc>) {
        match status {
            DeliveryStatus::Assigned => {
                self.assigned_at.get_or_insert(now);
            }
            DeliveryStatus::OnTheWayToPickup => {
                self.started_at.get_or_insert(now);
            }
            DeliveryStatus::ArrivedAtRestaurant => {
                self.arrived_at_restaurant_at.get_or_insert(now);
            }
            DeliveryStatus::PickedUp => {
                self.picked_up_at.get_or_insert(now);
            }
            DeliveryStatus::Delivered => {
                self.delivered_at.get_or_insert(now);
            }
            _ => {}
        }
    }

    /// Complete the delivery: terminal status, duration, proof, earnings
    pub fn mark_as_delivered(&mut self, proof: DeliveryProof, now: DateTime<Utc>) {
        self.status = DeliveryStatus::Delivered;
        self.delivered_at = Some(now);

        if let Some(started_at) = self.started_at {
            let minutes = (now - started_at).num_minutes();
            self.actual_duration_min = Some(minutes.max(0) as i32);
        }

        self.proof.merge(proof);
        self.calculate_earnings();
    }
}

/// Input for creating a delivery record alongside an order
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub order_id: Uuid,
    pub pickup_restaurant_id: Uuid,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub drop_address: DeliveryAddress,
    pub drop_latitude: f64,
    pub drop_longitude: f64,
    pub distance_km: f64,
    pub estimated_duration_min: i32,
    pub delivery_fee: Decimal,
    pub tip: Decimal,
    pub delivery_instructions: Option<String>,
}

/// Request DTO for a courier location report
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocationRequest {
    #[validate(custom = "crate::validation::validate_latitude")]
    pub latitude: f64,
    #[validate(custom = "crate::validation::validate_longitude")]
    pub longitude: f64,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
}

/// Request DTO for updating physical delivery progress
#[derive(Debug, Deserialize)]
pub struct UpdateDeliveryStatusRequest {
    pub status: DeliveryStatus,
    pub failure_reason: Option<FailureReason>,
    pub failure_note: Option<String>,
}

/// Request DTO for assigning a partner
#[derive(Debug, Deserialize)]
pub struct AssignPartnerRequest {
    pub delivery_partner_id: i32,
}

/// Request DTO for completing a delivery with proof
#[derive(Debug, Default, Deserialize)]
pub struct MarkDeliveredRequest {
    pub photo: Option<String>,
    pub signature: Option<String>,
    pub otp: Option<String>,
    pub notes: Option<String>,
}

/// Query parameters for delivery listings
#[derive(Debug, Deserialize)]
pub struct DeliveryListQuery {
    pub status: Option<DeliveryStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Query parameters for the nearby-deliveries search
#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
}

/// A pending delivery annotated with distance from the partner
#[derive(Debug, Serialize)]
pub struct NearbyDelivery {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub distance_km: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn delivery() -> Delivery {
        let now = Utc::now();
        Delivery {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            delivery_partner_id: None,
            assignment_status: AssignmentStatus::Pending,
            status: DeliveryStatus::Pending,
            pickup_restaurant_id: Uuid::new_v4(),
            pickup_latitude: 12.97,
            pickup_longitude: 77.59,
            drop_address: Json(DeliveryAddress {
                label: None,
                address_line1: "1 Main St".to_string(),
                address_line2: None,
                city: "Bengaluru".to_string(),
                state: "KA".to_string(),
                pincode: "560001".to_string(),
                latitude: 12.99,
                longitude: 77.61,
            }),
            drop_latitude: 12.99,
            drop_longitude: 77.61,
            distance_km: 3.2,
            estimated_duration_min: 30,
            actual_duration_min: None,
            current_latitude: None,
            current_longitude: None,
            location_history: Json(vec![]),
            assigned_at: None,
            accepted_at: None,
            started_at: None,
            arrived_at_restaurant_at: None,
            picked_up_at: None,
            delivered_at: None,
            proof: Json(DeliveryProof::default()),
            delivery_fee: dec!(40),
            tip: dec!(20),
            total_earnings: dec!(0),
            failure_reason: None,
            failure_note: None,
            attempt_count: 0,
            priority: Priority::Normal,
            delivery_instructions: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_can_be_accepted_requires_both_axes() {
        let mut d = delivery();
        assert!(!d.can_be_accepted());

        d.assignment_status = AssignmentStatus::Assigned;
        assert!(!d.can_be_accepted());

        d.status = DeliveryStatus::Assigned;
        assert!(d.can_be_accepted());

        d.assignment_status = AssignmentStatus::Accepted;
        assert!(!d.can_be_accepted());
    }

    #[test]
    fn test_update_location_overwrites_current_and_appends() {
        let mut d = delivery();
        let now = Utc::now();
        d.update_location(12.98, 77.60, Some(25.0), Some(5.0), now);
        d.update_location(12.99, 77.61, None, None, now);

        assert_eq!(d.current_latitude, Some(12.99));
        assert_eq!(d.current_longitude, Some(77.61));
        assert_eq!(d.location_history.len(), 2);
        assert_eq!(d.location_history.last().unwrap().latitude, 12.99);
    }

    #[test]
    fn test_location_history_is_bounded() {
        let mut d = delivery();
        let now = Utc::now();
        for i in 0..250 {
            d.update_location(12.0 + i as f64 * 0.001, 77.0, None, None, now);
        }

        assert_eq!(d.location_history.len(), MAX_LOCATION_HISTORY);
        // Most recent point is always last; oldest were evicted first
        let last = d.location_history.last().unwrap();
        assert!((last.latitude - (12.0 + 249.0 * 0.001)).abs() < 1e-9);
        let first = d.location_history.first().unwrap();
        assert!((first.latitude - (12.0 + 150.0 * 0.001)).abs() < 1e-9);
    }

    #[test]
    fn test_proof_merges_field_by_field() {
        let mut proof = DeliveryProof {
            photo: Some("door.jpg".to_string()),
            signature: None,
            otp: Some("1234".to_string()),
            notes: None,
        };
        proof.merge(DeliveryProof {
            photo: None,
            signature: Some("sig.png".to_string()),
            otp: None,
            notes: Some("left at door".to_string()),
        });

        assert_eq!(proof.photo.as_deref(), Some("door.jpg"));
        assert_eq!(proof.signature.as_deref(), Some("sig.png"));
        assert_eq!(proof.otp.as_deref(), Some("1234"));
        assert_eq!(proof.notes.as_deref(), Some("left at door"));
    }

    #[test]
    fn test_mark_as_delivered_computes_duration_and_earnings() {
        let mut d = delivery();
        let started = Utc::now() - Duration::minutes(28);
        d.started_at = Some(started);

        d.mark_as_delivered(
            DeliveryProof {
                otp: Some("4321".to_string()),
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(d.status, DeliveryStatus::Delivered);
        assert!(d.delivered_at.is_some());
        assert_eq!(d.actual_duration_min, Some(28));
        assert_eq!(d.total_earnings, dec!(60));
        assert_eq!(d.proof.otp.as_deref(), Some("4321"));
    }

    #[test]
    fn test_mark_as_delivered_without_start_leaves_duration_unset() {
        let mut d = delivery();
        d.mark_as_delivered(DeliveryProof::default(), Utc::now());
        assert_eq!(d.actual_duration_min, None);
        assert_eq!(d.total_earnings, dec!(60));
    }

    #[test]
    fn test_status_timestamps_stamp_once() {
        let mut d = delivery();
        let first = Utc::now();
        let later = first + Duration::minutes(10);

        d.apply_status_timestamp(DeliveryStatus::PickedUp, first);
        d.apply_status_timestamp(DeliveryStatus::PickedUp, later);

        assert_eq!(d.picked_up_at, Some(first));
    }
}
