// Authentication extractor for protected routes

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::auth::{error::AuthError, models::Role, token::TokenService};

/// Authenticated user extractor for protected routes
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub role: Role,
}

impl AuthenticatedUser {
    /// Check that the caller holds one of the given roles
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AuthError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden(format!(
                "Role {} is not permitted to perform this action",
                self.role
            )))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Extract Authorization header
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        // Verify Bearer token format
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        // Get JWT secret from environment
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AuthError::TokenValidationError("JWT_SECRET not configured".to_string()))?;

        // Validate token and extract identity
        let token_service = TokenService::new(jwt_secret);
        let claims = token_service.validate_token(token)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_role_accepts_listed_role() {
        let user = AuthenticatedUser {
            user_id: 1,
            role: Role::Vendor,
        };
        assert!(user.require_role(&[Role::Vendor, Role::Admin]).is_ok());
    }

    #[test]
    fn test_require_role_rejects_unlisted_role() {
        let user = AuthenticatedUser {
            user_id: 1,
            role: Role::Customer,
        };
        assert!(user.require_role(&[Role::Admin]).is_err());
    }
}
