// RingCentral OAuth (authorization code with PKCE), token storage and REST proxying

use std::time::Duration;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_config::RingCentralConfig,
    db::DieselPool,
    models::ringcentral_token::{NewRingCentralToken, RingCentralToken},
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::ServiceError,
    },
};

pub const TOKEN_PATH: &str = "/restapi/oauth/token";
pub const AUTHORIZE_PATH: &str = "/restapi/oauth/authorize";
pub const SMS_PATH: &str = "/restapi/v1.0/account/~/extension/~/sms";
pub const RING_OUT_PATH: &str = "/restapi/v1.0/account/~/extension/~/ring-out";

pub const NOT_AUTHENTICATED: &str = "Not authenticated with RingCentral";

// =============================================================================
// PKCE
// =============================================================================

/// 32 random bytes, base64url without padding
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 code challenge for a verifier
pub fn code_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn basic_credentials(client_id: &str, client_secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", client_id, client_secret)))
}

// =============================================================================
// TYPES
// =============================================================================

/// Token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenSet {
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + ChronoDuration::seconds(self.expires_in)
    }

    pub fn refresh_expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.refresh_token_expires_in
            .map(|secs| issued_at + ChronoDuration::seconds(secs))
    }
}

/// Authorization redirect plus the values the callback must see again
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Tokens carried in the caller's cookies
#[derive(Debug, Clone, Default)]
pub struct CookieTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Expiry in milliseconds since the Unix epoch
    pub expires_at_ms: Option<i64>,
}

/// A usable access token; `refreshed` is set when new tokens were issued
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub refreshed: Option<TokenSet>,
}

/// Decide whether the cookie access token is still usable
pub fn cookie_token_valid(cookies: &CookieTokens, now: DateTime<Utc>) -> Option<ResolvedToken> {
    let access_token = cookies.access_token.as_ref()?;
    let expires_at = DateTime::<Utc>::from_timestamp_millis(cookies.expires_at_ms?)?;
    (expires_at > now).then(|| ResolvedToken {
        access_token: access_token.clone(),
        expires_at,
        refreshed: None,
    })
}

/// Pull a human readable message out of a RingCentral error body
pub fn upstream_message(body: &Value) -> Option<String> {
    ["message", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct RingCentralService {
    client: reqwest::Client,
    config: RingCentralConfig,
    diesel_pool: DieselPool,
}

impl RingCentralService {
    pub fn new(config: RingCentralConfig, diesel_pool: DieselPool) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::ConfigurationError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            diesel_pool,
        })
    }

    fn client_credentials(&self) -> Result<(&str, &str), ServiceError> {
        match (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
        ) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(ServiceError::ConfigurationError(
                "RINGCENTRAL_CLIENT_ID and RINGCENTRAL_CLIENT_SECRET must be configured".to_string(),
            )),
        }
    }

    /// Build the authorization URL with a fresh state and PKCE verifier
    pub fn authorization_request(&self) -> Result<AuthorizationRequest, ServiceError> {
        let client_id = self.config.client_id.as_deref().ok_or_else(|| {
            ServiceError::ConfigurationError("RINGCENTRAL_CLIENT_ID not configured".to_string())
        })?;

        let state = generate_state();
        let code_verifier = generate_code_verifier();
        let challenge = code_challenge(&code_verifier);

        let url = url::Url::parse_with_params(
            &format!("{}{}", self.config.server, AUTHORIZE_PATH),
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("scope", self.config.scopes.as_str()),
            ],
        )
        .map_err(|e| ServiceError::ConfigurationError(format!("RINGCENTRAL_SERVER: {}", e)))?;

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
            code_verifier,
        })
    }

    /// Exchange an authorization code and persist the resulting tokens
    #[instrument(skip(self, code, code_verifier))]
    pub async fn exchange_code(
        &self,
        user_id: Uuid,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, ServiceError> {
        let tokens = self
            .request_tokens(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", code_verifier),
            ])
            .await?;

        self.store_tokens(user_id, &tokens).await?;

        info!(%user_id, "RingCentral account connected");
        AuditLogger::log_action(
            AuditAction::RingCentralConnected,
            user_id,
            None,
            None,
            tokens.scope.clone(),
        );

        Ok(tokens)
    }

    /// Refresh-token grant; new tokens replace the stored ones
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, user_id: Uuid, refresh_token: &str) -> Result<TokenSet, ServiceError> {
        let tokens = self
            .request_tokens(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        self.store_tokens(user_id, &tokens).await?;
        info!(%user_id, "RingCentral token refreshed");
        Ok(tokens)
    }

    /// Refresh using the cookie refresh token, else the stored one
    pub async fn refresh_for_user(
        &self,
        user_id: Uuid,
        cookie_refresh_token: Option<&str>,
    ) -> Result<TokenSet, ServiceError> {
        if let Some(refresh_token) = cookie_refresh_token {
            return self.refresh(user_id, refresh_token).await;
        }

        let stored = {
            let mut conn = self.diesel_pool.get().await?;
            RingCentralToken::find_by_user(&mut conn, user_id).await?
        };

        match stored {
            Some(stored) if stored.refresh_token_valid(Utc::now()) => {
                self.refresh(user_id, &stored.refresh_token).await
            },
            _ => Err(ServiceError::Unauthorized(NOT_AUTHENTICATED.to_string())),
        }
    }

    async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<TokenSet, ServiceError> {
        let (client_id, client_secret) = self.client_credentials()?;

        let response = self
            .client
            .post(format!("{}{}", self.config.server, TOKEN_PATH))
            .header(
                reqwest::header::AUTHORIZATION,
                basic_credentials(client_id, client_secret),
            )
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            let message = upstream_message(&body)
                .unwrap_or_else(|| format!("Token request failed with status {}", status));
            warn!(%status, "RingCentral token request rejected");
            return Err(ServiceError::UpstreamError(message));
        }

        Ok(response.json::<TokenSet>().await?)
    }

    pub async fn store_tokens(
        &self,
        user_id: Uuid,
        tokens: &TokenSet,
    ) -> Result<RingCentralToken, ServiceError> {
        let now = Utc::now();
        let mut conn = self.diesel_pool.get().await?;
        Ok(RingCentralToken::upsert(
            &mut conn,
            NewRingCentralToken {
                user_id,
                access_token: tokens.access_token.clone(),
                refresh_token: tokens.refresh_token.clone(),
                expires_at: tokens.expires_at(now),
                refresh_token_expires_at: tokens.refresh_expires_at(now),
                scope: tokens.scope.clone(),
            },
        )
        .await?)
    }

    /// Find a usable access token: cookies, then the database, refreshing when needed
    #[instrument(skip(self, cookies))]
    pub async fn resolve_access_token(
        &self,
        user_id: Uuid,
        cookies: &CookieTokens,
    ) -> Result<ResolvedToken, ServiceError> {
        let now = Utc::now();

        if let Some(resolved) = cookie_token_valid(cookies, now) {
            return Ok(resolved);
        }

        let stored = {
            let mut conn = self.diesel_pool.get().await?;
            RingCentralToken::find_by_user(&mut conn, user_id).await?
        };

        if let Some(stored) = stored {
            if stored.access_token_valid(now) {
                return Ok(ResolvedToken {
                    access_token: stored.access_token,
                    expires_at: stored.expires_at,
                    refreshed: None,
                });
            }
            if stored.refresh_token_valid(now) {
                return self.refreshed(user_id, &stored.refresh_token).await;
            }
        }

        match cookies.refresh_token.as_deref() {
            Some(refresh_token) => self.refreshed(user_id, refresh_token).await,
            None => Err(ServiceError::Unauthorized(NOT_AUTHENTICATED.to_string())),
        }
    }

    async fn refreshed(&self, user_id: Uuid, refresh_token: &str) -> Result<ResolvedToken, ServiceError> {
        let tokens = self.refresh(user_id, refresh_token).await?;
        Ok(ResolvedToken {
            access_token: tokens.access_token.clone(),
            expires_at: tokens.expires_at(Utc::now()),
            refreshed: Some(tokens),
        })
    }

    /// Forget the user's stored tokens
    pub async fn disconnect(&self, user_id: Uuid) -> Result<(), ServiceError> {
        use crate::schema::ringcentral_tokens::dsl;

        let mut conn = self.diesel_pool.get().await?;
        diesel::delete(dsl::ringcentral_tokens.filter(dsl::user_id.eq(user_id)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    // =========================================================================
    // REST PROXY
    // =========================================================================

    #[instrument(skip(self, access_token, text))]
    pub async fn send_sms(&self, access_token: &str, to: &str, text: &str) -> Result<Value, ServiceError> {
        let from = self.config.from_number.as_deref().ok_or_else(|| {
            ServiceError::BadRequest("RINGCENTRAL_FROM_NUMBER is not configured on the server".to_string())
        })?;

        let body = json!({
            "to": [{"phoneNumber": to}],
            "from": {"phoneNumber": from},
            "text": text,
        });
        self.api_call(reqwest::Method::POST, access_token, SMS_PATH, Some(&body))
            .await
    }

    #[instrument(skip(self, access_token))]
    pub async fn ring_out(
        &self,
        access_token: &str,
        to: &str,
        from: Option<&str>,
    ) -> Result<Value, ServiceError> {
        let from = from
            .or(self.config.from_number.as_deref())
            .ok_or_else(|| {
                ServiceError::BadRequest(
                    "\"from\" number is required, or RINGCENTRAL_FROM_NUMBER must be set".to_string(),
                )
            })?;

        let body = json!({
            "from": {"phoneNumber": from},
            "to": {"phoneNumber": to},
            "playPrompt": false,
        });
        self.api_call(reqwest::Method::POST, access_token, RING_OUT_PATH, Some(&body))
            .await
    }

    /// Status of a RingOut call
    #[instrument(skip(self, access_token))]
    pub async fn call_status(&self, access_token: &str, call_id: &str) -> Result<Value, ServiceError> {
        let path = format!("{}/{}", RING_OUT_PATH, urlencode_segment(call_id));
        self.api_call(reqwest::Method::GET, access_token, &path, None)
            .await
    }

    async fn api_call(
        &self,
        method: reqwest::Method,
        access_token: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ServiceError> {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.config.server, path))
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or_else(|_| json!({}));

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ServiceError::Unauthorized(
                upstream_message(&body).unwrap_or_else(|| NOT_AUTHENTICATED.to_string()),
            ));
        }
        if !status.is_success() {
            warn!(%status, path, "RingCentral API call failed");
            return Err(ServiceError::UpstreamError(
                upstream_message(&body)
                    .unwrap_or_else(|| format!("RingCentral returned status {}", status)),
            ));
        }

        Ok(body)
    }
}

fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}
