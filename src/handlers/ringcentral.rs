// RingCentral OAuth and telephony proxy endpoints
// Tokens travel in HttpOnly cookies and are mirrored in the database per user

use axum::{
    extract::{Extension, Query, State},
    response::{IntoResponse, Redirect},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde_json::json;
use time::Duration;
use tracing::warn;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::ringcentral::{
        AccessTokenResponse, AuthStartQuery, AuthStatusResponse, CallStartedResponse,
        CallStatusQuery, ExchangeCodeQuery, MessageResponse, RingOutRequest, SendSmsRequest,
        SmsSentResponse,
    },
    services::ringcentral::{CookieTokens, ResolvedToken, TokenSet},
    utils::{
        service_error::ServiceError,
        validation::{ValidatedJson, ValidatedQuery},
    },
};

pub const ACCESS_TOKEN_COOKIE: &str = "ringcentral_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "ringcentral_refresh_token";
pub const TOKEN_EXPIRY_COOKIE: &str = "ringcentral_token_expiry";
pub const CODE_VERIFIER_COOKIE: &str = "rc_code_verifier";
pub const OAUTH_STATE_COOKIE: &str = "rc_oauth_state";

const OAUTH_COOKIE_MINUTES: i64 = 10;
const REFRESH_COOKIE_DAYS: i64 = 30;

// =============================================================================
// COOKIE HELPERS
// =============================================================================

fn build_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

/// Read the RingCentral token cookies
pub fn cookie_tokens(jar: &CookieJar) -> CookieTokens {
    CookieTokens {
        access_token: jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()),
        refresh_token: jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string()),
        expires_at_ms: jar
            .get(TOKEN_EXPIRY_COOKIE)
            .and_then(|c| c.value().parse::<i64>().ok()),
    }
}

/// Set the three token cookies from a fresh token set
pub fn with_token_cookies(jar: CookieJar, tokens: &TokenSet, secure: bool) -> CookieJar {
    let expires_at = tokens.expires_at(Utc::now());
    let lifetime = Duration::seconds(tokens.expires_in.max(0));

    jar.add(build_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        lifetime,
        secure,
    ))
    .add(build_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        Duration::days(REFRESH_COOKIE_DAYS),
        secure,
    ))
    .add(build_cookie(
        TOKEN_EXPIRY_COOKIE,
        expires_at.timestamp_millis().to_string(),
        lifetime,
        secure,
    ))
}

fn without_token_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(removal_cookie(ACCESS_TOKEN_COOKIE))
        .remove(removal_cookie(REFRESH_TOKEN_COOKIE))
        .remove(removal_cookie(TOKEN_EXPIRY_COOKIE))
}

/// Resolve a usable access token, carrying refreshed tokens back into the jar
async fn access_token(
    state: &AppState,
    user: &AuthenticatedUser,
    jar: CookieJar,
) -> Result<(CookieJar, ResolvedToken), ServiceError> {
    let resolved = state
        .ringcentral_service
        .resolve_access_token(user.user_id, &cookie_tokens(&jar))
        .await?;

    let jar = match &resolved.refreshed {
        Some(tokens) => with_token_cookies(jar, tokens, state.config.security.secure_cookies),
        None => jar,
    };
    Ok((jar, resolved))
}

// =============================================================================
// OAUTH
// =============================================================================

/// Start the authorization-code flow with PKCE
#[utoipa::path(
    get,
    path = "/api/ringcentral/auth",
    tag = "RingCentral",
    operation_id = "ringCentralAuthorize",
    params(AuthStartQuery),
    responses(
        (status = 200, description = "Authorization URL when format=json"),
        (status = 307, description = "Redirect to the RingCentral login page"),
        (status = 500, description = "Client ID not configured")
    )
)]
pub async fn start_auth(
    State(state): State<AppState>,
    Query(query): Query<AuthStartQuery>,
    jar: CookieJar,
) -> impl IntoResponse {
    let request = match state.ringcentral_service.authorization_request() {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    let secure = state.config.security.secure_cookies;
    let jar = jar
        .add(build_cookie(
            OAUTH_STATE_COOKIE,
            request.state,
            Duration::minutes(OAUTH_COOKIE_MINUTES),
            secure,
        ))
        .add(build_cookie(
            CODE_VERIFIER_COOKIE,
            request.code_verifier,
            Duration::minutes(OAUTH_COOKIE_MINUTES),
            secure,
        ));

    if query.wants_json() {
        (jar, Json(json!({ "url": request.url }))).into_response()
    } else {
        (jar, Redirect::temporary(&request.url)).into_response()
    }
}

/// Finish the flow: check state, exchange the code, store the tokens
#[utoipa::path(
    get,
    path = "/api/ringcentral/auth/exchange-code",
    tag = "RingCentral",
    operation_id = "ringCentralExchangeCode",
    params(ExchangeCodeQuery),
    responses(
        (status = 200, description = "Authentication successful", body = MessageResponse),
        (status = 400, description = "Missing code, state mismatch or missing verifier"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 502, description = "Token exchange rejected by RingCentral")
    ),
    security(("bearerAuth" = []))
)]
pub async fn exchange_code(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<ExchangeCodeQuery>,
    jar: CookieJar,
) -> impl IntoResponse {
    let Some(code) = query.code.filter(|c| !c.trim().is_empty()) else {
        return ServiceError::BadRequest("Missing authorization code".to_string()).into_response();
    };

    let stored_state = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    if stored_state.is_none() || query.state != stored_state {
        warn!(user_id = %auth_user.user_id, "RingCentral OAuth state mismatch");
        return ServiceError::BadRequest("Invalid state parameter".to_string()).into_response();
    }

    let Some(code_verifier) = jar.get(CODE_VERIFIER_COOKIE).map(|c| c.value().to_string()) else {
        return ServiceError::BadRequest("Missing PKCE code verifier".to_string()).into_response();
    };

    match state
        .ringcentral_service
        .exchange_code(auth_user.user_id, &code, &code_verifier)
        .await
    {
        Ok(tokens) => {
            let jar = jar
                .remove(removal_cookie(OAUTH_STATE_COOKIE))
                .remove(removal_cookie(CODE_VERIFIER_COOKIE));
            let jar = with_token_cookies(jar, &tokens, state.config.security.secure_cookies);
            (jar, Json(MessageResponse::ok("Authentication successful"))).into_response()
        },
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/ringcentral/auth/refresh",
    tag = "RingCentral",
    operation_id = "ringCentralRefresh",
    responses(
        (status = 200, description = "Tokens refreshed", body = AccessTokenResponse),
        (status = 401, description = "No refresh token available"),
        (status = 502, description = "Refresh rejected by RingCentral")
    ),
    security(("bearerAuth" = []))
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> impl IntoResponse {
    let cookie_refresh = jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string());

    match state
        .ringcentral_service
        .refresh_for_user(auth_user.user_id, cookie_refresh.as_deref())
        .await
    {
        Ok(tokens) => {
            let body = AccessTokenResponse {
                access_token: tokens.access_token.clone(),
                expires_at: tokens.expires_at(Utc::now()),
            };
            let jar = with_token_cookies(jar, &tokens, state.config.security.secure_cookies);
            (jar, Json(body)).into_response()
        },
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/ringcentral/token",
    tag = "RingCentral",
    operation_id = "ringCentralToken",
    responses(
        (status = 200, description = "A valid access token", body = AccessTokenResponse),
        (status = 401, description = "Not authenticated with RingCentral")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_token(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> impl IntoResponse {
    match access_token(&state, &auth_user, jar).await {
        Ok((jar, resolved)) => (
            jar,
            Json(AccessTokenResponse {
                access_token: resolved.access_token,
                expires_at: resolved.expires_at,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/ringcentral/auth/status",
    tag = "RingCentral",
    operation_id = "ringCentralAuthStatus",
    responses(
        (status = 200, description = "Whether a usable token exists", body = AuthStatusResponse)
    ),
    security(("bearerAuth" = []))
)]
pub async fn auth_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> impl IntoResponse {
    match access_token(&state, &auth_user, jar).await {
        Ok((jar, _)) => (
            jar,
            Json(AuthStatusResponse {
                authenticated: true,
                message: None,
            }),
        )
            .into_response(),
        Err(ServiceError::Unauthorized(message)) | Err(ServiceError::UpstreamError(message)) => {
            Json(AuthStatusResponse {
                authenticated: false,
                message: Some(message),
            })
            .into_response()
        },
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/ringcentral/auth/logout",
    tag = "RingCentral",
    operation_id = "ringCentralLogout",
    responses(
        (status = 200, description = "Tokens cleared", body = MessageResponse),
        (status = 401, description = "Unauthorized - invalid or missing token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> impl IntoResponse {
    match state.ringcentral_service.disconnect(auth_user.user_id).await {
        Ok(()) => (
            without_token_cookies(jar),
            Json(MessageResponse::ok("Logged out successfully")),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// TELEPHONY
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/ringcentral/sms",
    tag = "RingCentral",
    operation_id = "ringCentralSendSms",
    request_body = SendSmsRequest,
    responses(
        (status = 200, description = "SMS accepted", body = SmsSentResponse),
        (status = 400, description = "Missing fields or from number"),
        (status = 401, description = "Not authenticated with RingCentral"),
        (status = 502, description = "RingCentral rejected the message")
    ),
    security(("bearerAuth" = []))
)]
pub async fn send_sms(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<SendSmsRequest>,
) -> impl IntoResponse {
    let (jar, token) = match access_token(&state, &auth_user, jar).await {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };

    match state
        .ringcentral_service
        .send_sms(&token.access_token, request.to.trim(), &request.text)
        .await
    {
        Ok(data) => (
            jar,
            Json(SmsSentResponse {
                id: data.get("id").cloned(),
                status: "Sent".to_string(),
                timestamp: Utc::now(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/ringcentral/call",
    tag = "RingCentral",
    operation_id = "ringCentralRingOut",
    request_body = RingOutRequest,
    responses(
        (status = 200, description = "Call initiated", body = CallStartedResponse),
        (status = 400, description = "Missing to or from number"),
        (status = 401, description = "Not authenticated with RingCentral"),
        (status = 502, description = "RingCentral rejected the call")
    ),
    security(("bearerAuth" = []))
)]
pub async fn ring_out(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<RingOutRequest>,
) -> impl IntoResponse {
    let (jar, token) = match access_token(&state, &auth_user, jar).await {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };

    let from = request
        .from
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    match state
        .ringcentral_service
        .ring_out(&token.access_token, request.to.trim(), from)
        .await
    {
        Ok(data) => (
            jar,
            Json(CallStartedResponse {
                success: true,
                message: "Call initiated successfully".to_string(),
                call_id: data.get("id").cloned(),
                call_details: data,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/ringcentral/call-status",
    tag = "RingCentral",
    operation_id = "ringCentralCallStatus",
    params(CallStatusQuery),
    responses(
        (status = 200, description = "RingOut call status from RingCentral"),
        (status = 400, description = "callId is required"),
        (status = 401, description = "Not authenticated with RingCentral"),
        (status = 502, description = "RingCentral request failed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn call_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    jar: CookieJar,
    ValidatedQuery(query): ValidatedQuery<CallStatusQuery>,
) -> impl IntoResponse {
    let (jar, token) = match access_token(&state, &auth_user, jar).await {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };

    match state
        .ringcentral_service
        .call_status(&token.access_token, &query.call_id)
        .await
    {
        Ok(data) => (jar, Json(data)).into_response(),
        Err(e) => e.into_response(),
    }
}
