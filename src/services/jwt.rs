// Bearer tokens for API callers
// HS256, bound to one audience and issuer; claims name the user, workspace and role

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use uuid::Uuid;

use crate::{app_config::JwtConfig, models::auth::AccessTokenClaims};

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Could not sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(err.to_string()),
        }
    }
}

/// Signs and verifies access tokens
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    audience: String,
    issuer: String,
    lifetime: Duration,
}

impl JwtService {
    pub fn from_config(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            audience: config.audience.clone(),
            issuer: config.issuer.clone(),
            lifetime: Duration::seconds(config.access_expiry as i64),
        }
    }

    /// Sign a token for a user acting in a workspace
    pub fn issue(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        email: &str,
        role: &str,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            workspace_id: workspace_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp() as u64,
            exp: (now + self.lifetime).timestamp() as u64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Check signature, audience, issuer and expiry
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        Ok(decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)?.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str, access_expiry: u64) -> JwtService {
        JwtService::from_config(&JwtConfig {
            secret: secret.to_string(),
            audience: "authenticated".to_string(),
            issuer: "crm-backend".to_string(),
            access_expiry,
        })
    }

    #[test]
    fn test_issued_token_verifies_with_workspace() {
        let service = service("test-secret-that-is-at-least-32-characters", 3600);
        let (user_id, workspace_id) = (Uuid::new_v4(), Uuid::new_v4());
        let token = service
            .issue(user_id, workspace_id, "agent@example.com", "agent")
            .unwrap();

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.workspace_id, workspace_id.to_string());
        assert_eq!(claims.role, "agent");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let signer = service("first-secret-that-is-at-least-32-characters", 3600);
        let verifier = service("second-secret-that-is-at-least-32-characters", 3600);
        let token = signer
            .issue(Uuid::new_v4(), Uuid::new_v4(), "a@example.com", "agent")
            .unwrap();

        assert!(matches!(verifier.verify(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = service("test-secret-that-is-at-least-32-characters", 0);
        let token = service
            .issue(Uuid::new_v4(), Uuid::new_v4(), "a@example.com", "agent")
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(matches!(service.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let service = service("test-secret-that-is-at-least-32-characters", 3600);
        assert!(service.verify("not-a-jwt").is_err());
    }
}
