// Geodesic helpers for proximity matching and delivery-time estimates

/// Mean Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average courier speed in km/h used for time estimates
const AVG_DELIVERY_SPEED_KMH: f64 = 20.0;

/// Great-circle distance between two coordinates via the haversine formula
///
/// Returns kilometers rounded to one decimal, which is plenty for radius
/// filtering and display.
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    let distance = EARTH_RADIUS_KM * c;

    (distance * 10.0).round() / 10.0
}

/// Courier travel time in minutes for a distance, at average speed
pub fn travel_minutes(distance_km: f64) -> i64 {
    ((distance_km / AVG_DELIVERY_SPEED_KMH) * 60.0).ceil() as i64
}

/// Total delivery estimate: preparation plus travel, in minutes
pub fn estimated_delivery_minutes(distance_km: f64, preparation_minutes: i64) -> i64 {
    preparation_minutes + travel_minutes(distance_km)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Distance is non-negative and symmetric for any coordinates
    #[test]
    fn prop_distance_non_negative_and_symmetric() {
        proptest!(|(
            lat1 in -89.0f64..=89.0,
            lng1 in -179.0f64..=179.0,
            lat2 in -89.0f64..=89.0,
            lng2 in -179.0f64..=179.0
        )| {
            let forward = distance_km(lat1, lng1, lat2, lng2);
            let backward = distance_km(lat2, lng2, lat1, lng1);
            prop_assert!(forward >= 0.0);
            prop_assert_eq!(forward, backward);
        });
    }

    /// No two points on Earth are farther apart than half the circumference
    #[test]
    fn prop_distance_bounded_by_half_circumference() {
        proptest!(|(
            lat1 in -89.0f64..=89.0,
            lng1 in -179.0f64..=179.0,
            lat2 in -89.0f64..=89.0,
            lng2 in -179.0f64..=179.0
        )| {
            let d = distance_km(lat1, lng1, lat2, lng2);
            prop_assert!(d <= 20_100.0, "got {}", d);
        });
    }
}
