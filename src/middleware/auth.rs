// Authenticated request context

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::auth::{AccessTokenClaims, ADMIN_ROLE},
    utils::service_error::ServiceError,
};

/// Authenticated user information extracted from JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub token_id: String,
    pub email: String,
    pub role: String,
    pub exp: u64,
}

impl AuthenticatedUser {
    /// Build the request context from validated claims.
    /// Subject and workspace must both be UUIDs.
    pub fn from_claims(claims: AccessTokenClaims) -> Result<Self, ServiceError> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("Invalid token subject".to_string()))?;
        let workspace_id = Uuid::parse_str(&claims.workspace_id)
            .map_err(|_| ServiceError::Unauthorized("Invalid token workspace".to_string()))?;

        Ok(Self {
            user_id,
            workspace_id,
            token_id: claims.jti,
            email: claims.email,
            role: claims.role,
            exp: claims.exp,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    /// Reject non-admin callers with 403
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Admin access required".to_string()))
        }
    }
}
