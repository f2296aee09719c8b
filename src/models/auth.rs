// Authentication models for the CRM backend
// Bearer token claims carry the tenant boundary (workspace) for every request

use serde::{Deserialize, Serialize};

/// Role granted to administrators (discount code management)
pub const ADMIN_ROLE: &str = "admin";

/// Access token claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// User ID (subject)
    pub sub: String,

    /// Workspace the user is acting in
    pub workspace_id: String,

    /// JWT ID, logged for traceability
    pub jti: String,

    /// User email address
    pub email: String,

    /// Workspace role (admin, agent, ...)
    pub role: String,

    /// Audience (aud)
    pub aud: String,

    /// Issuer (iss)
    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}

impl AccessTokenClaims {
    /// Check if token is expired
    pub fn is_expired(&self, now: u64) -> bool {
        self.exp <= now
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}
