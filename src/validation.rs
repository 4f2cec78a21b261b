// Validation utilities module
// Provides custom validation functions for domain-specific rules

use rust_decimal::Decimal;
use validator::ValidationError;

/// Validates that a coupon code is uppercase alphanumeric
/// Matches the format enforced when coupons are created
pub fn validate_coupon_code(code: &str) -> Result<(), ValidationError> {
    let valid = !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_coupon_code"))
    }
}

/// Validates that a latitude is within [-90, 90]
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(ValidationError::new("latitude_out_of_range"))
    }
}

/// Validates that a longitude is within [-180, 180]
pub fn validate_longitude(lng: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lng) {
        Ok(())
    } else {
        Err(ValidationError::new("longitude_out_of_range"))
    }
}

/// Validates that a monetary amount is not negative
pub fn validate_non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::ZERO {
        Err(ValidationError::new("amount_must_not_be_negative"))
    } else {
        Ok(())
    }
}

/// Validates that a monetary amount is strictly positive
pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        Err(ValidationError::new("amount_must_be_positive"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_coupon_code_accepts_uppercase_alphanumeric() {
        assert!(validate_coupon_code("SAVE50").is_ok());
        assert!(validate_coupon_code("WELCOME2024").is_ok());
    }

    #[test]
    fn test_coupon_code_rejects_lowercase_and_symbols() {
        assert!(validate_coupon_code("save50").is_err());
        assert!(validate_coupon_code("SAVE-50").is_err());
        assert!(validate_coupon_code("").is_err());
    }

    #[test]
    fn test_latitude_bounds() {
        assert!(validate_latitude(0.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(90.1).is_err());
    }

    #[test]
    fn test_longitude_bounds() {
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(-180.1).is_err());
    }

    #[test]
    fn test_amount_validators() {
        assert!(validate_non_negative_amount(&dec!(0)).is_ok());
        assert!(validate_non_negative_amount(&dec!(-0.01)).is_err());
        assert!(validate_positive_amount(&dec!(0.01)).is_ok());
        assert!(validate_positive_amount(&dec!(0)).is_err());
    }
}
