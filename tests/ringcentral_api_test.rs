// RingCentral endpoints against a local stand-in for the RingCentral API.
// Tokens come from cookies here, so the database is never consulted.

mod common;

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use common::{setup_test_app, spawn_server, TestApp};
use serde_json::{json, Value};

const ACCESS_TOKEN: &str = "rc-access-token-123";
const FROM_NUMBER: &str = "+15550001111";

#[derive(Clone, Default)]
struct Upstream {
    bodies: Arc<Mutex<Vec<Value>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(&format!("Bearer {}", ACCESS_TOKEN))
}

async fn sms(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Token not found"})),
        );
    }
    upstream.bodies.lock().unwrap().push(body);
    (
        StatusCode::OK,
        Json(json!({"id": 98765, "messageStatus": "Queued"})),
    )
}

async fn ring_out(
    State(upstream): State<Upstream>,
    Json(body): Json<Value>,
) -> Json<Value> {
    upstream.bodies.lock().unwrap().push(body);
    Json(json!({"id": "ro-77", "status": {"callStatus": "InProgress"}}))
}

async fn ring_out_status(Path(call_id): Path<String>) -> Json<Value> {
    Json(json!({"id": call_id, "status": {"callStatus": "Success"}}))
}

async fn ringcentral_app(extra: &[(&str, &str)]) -> (TestApp, Upstream, String) {
    let upstream = Upstream::default();
    let router = Router::new()
        .route("/restapi/v1.0/account/~/extension/~/sms", post(sms))
        .route("/restapi/v1.0/account/~/extension/~/ring-out", post(ring_out))
        .route(
            "/restapi/v1.0/account/~/extension/~/ring-out/{call_id}",
            get(ring_out_status),
        )
        .with_state(upstream.clone());
    let server = spawn_server(router).await;

    let mut vars = vec![
        ("RINGCENTRAL_SERVER", server.as_str()),
        ("RINGCENTRAL_CLIENT_ID", "client-id"),
        ("RINGCENTRAL_CLIENT_SECRET", "client-secret"),
        ("REDIRECT_URI", "http://localhost:3000/oauth-callback"),
    ];
    vars.extend_from_slice(extra);
    let app = setup_test_app(&vars);
    (app, upstream, server)
}

fn token_cookies() -> String {
    let expiry = (Utc::now() + Duration::minutes(30)).timestamp_millis();
    format!(
        "ringcentral_access_token={}; ringcentral_token_expiry={}",
        ACCESS_TOKEN, expiry
    )
}

// =============================================================================
// OAUTH
// =============================================================================

#[tokio::test]
async fn test_start_auth_redirects_with_pkce_and_cookies() {
    let (app, _, server) = ringcentral_app(&[]).await;

    let response = app.get("/api/ringcentral/auth").send().await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response.header("location").unwrap();
    assert!(location.starts_with(&format!("{}/restapi/oauth/authorize?", server)));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("client_id=client-id"));
    assert!(location.contains("code_challenge_method=S256"));
    assert!(location.contains("scope=RingOut+SMS"));

    let cookies = response.cookies();
    let state = cookies
        .iter()
        .find(|c| c.starts_with("rc_oauth_state="))
        .unwrap();
    assert!(state.contains("HttpOnly"));
    assert!(state.contains("SameSite=Lax"));
    assert!(state.contains("Max-Age=600"));
    assert!(!state.contains("Secure"));

    let state_value = state
        .trim_start_matches("rc_oauth_state=")
        .split(';')
        .next()
        .unwrap();
    assert!(location.contains(&format!("state={}", state_value)));
    assert!(cookies.iter().any(|c| c.starts_with("rc_code_verifier=")));
}

#[tokio::test]
async fn test_start_auth_json_format() {
    let (app, _, server) = ringcentral_app(&[]).await;

    let response = app.get("/api/ringcentral/auth?format=json").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.cookies().len(), 2);

    let body: Value = response.json().await;
    assert!(body["url"]
        .as_str()
        .unwrap()
        .starts_with(&format!("{}/restapi/oauth/authorize?", server)));
}

#[tokio::test]
async fn test_start_auth_requires_client_id() {
    let app = setup_test_app(&[]);
    let response = app.get("/api/ringcentral/auth").send().await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_exchange_code_checks_code_state_and_verifier() {
    let (app, _, _) = ringcentral_app(&[]).await;
    let token = app.agent_token();

    let missing_code = app
        .get("/api/ringcentral/auth/exchange-code?state=abc")
        .bearer(&token)
        .header("cookie", "rc_oauth_state=abc; rc_code_verifier=v")
        .send()
        .await;
    assert_eq!(missing_code.status(), StatusCode::BAD_REQUEST);
    let body: Value = missing_code.json().await;
    assert_eq!(body["error"], "Missing authorization code");

    let wrong_state = app
        .get("/api/ringcentral/auth/exchange-code?code=c1&state=forged")
        .bearer(&token)
        .header("cookie", "rc_oauth_state=abc; rc_code_verifier=v")
        .send()
        .await;
    assert_eq!(wrong_state.status(), StatusCode::BAD_REQUEST);
    let body: Value = wrong_state.json().await;
    assert_eq!(body["error"], "Invalid state parameter");

    let no_state_cookie = app
        .get("/api/ringcentral/auth/exchange-code?code=c1&state=abc")
        .bearer(&token)
        .send()
        .await;
    assert_eq!(no_state_cookie.status(), StatusCode::BAD_REQUEST);

    let no_verifier = app
        .get("/api/ringcentral/auth/exchange-code?code=c1&state=abc")
        .bearer(&token)
        .header("cookie", "rc_oauth_state=abc")
        .send()
        .await;
    assert_eq!(no_verifier.status(), StatusCode::BAD_REQUEST);
    let body: Value = no_verifier.json().await;
    assert_eq!(body["error"], "Missing PKCE code verifier");
}

// =============================================================================
// TOKENS AND TELEPHONY
// =============================================================================

#[tokio::test]
async fn test_token_from_valid_cookie() {
    let (app, _, _) = ringcentral_app(&[]).await;

    let response = app
        .get("/api/ringcentral/token")
        .bearer(&app.agent_token())
        .header("cookie", &token_cookies())
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.cookies().is_empty());

    let body: Value = response.json().await;
    assert_eq!(body["access_token"], ACCESS_TOKEN);
}

#[tokio::test]
async fn test_auth_status_with_cookie_token() {
    let (app, _, _) = ringcentral_app(&[]).await;

    let response = app
        .get("/api/ringcentral/auth/status")
        .bearer(&app.agent_token())
        .header("cookie", &token_cookies())
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await;
    assert_eq!(body, json!({"authenticated": true}));
}

#[tokio::test]
async fn test_send_sms_uses_configured_from_number() {
    let (app, upstream, _) = ringcentral_app(&[("RINGCENTRAL_FROM_NUMBER", FROM_NUMBER)]).await;

    let response = app
        .post("/api/ringcentral/sms")
        .bearer(&app.agent_token())
        .header("cookie", &token_cookies())
        .json(&json!({"to": " +15551234567 ", "text": "Your quote is ready"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await;
    assert_eq!(body["id"], 98765);
    assert_eq!(body["status"], "Sent");

    let sent = upstream.bodies.lock().unwrap()[0].clone();
    assert_eq!(sent["from"]["phoneNumber"], FROM_NUMBER);
    assert_eq!(sent["to"][0]["phoneNumber"], "+15551234567");
    assert_eq!(sent["text"], "Your quote is ready");
}

#[tokio::test]
async fn test_send_sms_requires_from_number() {
    let (app, upstream, _) = ringcentral_app(&[]).await;

    let response = app
        .post("/api/ringcentral/sms")
        .bearer(&app.agent_token())
        .header("cookie", &token_cookies())
        .json(&json!({"to": "+15551234567", "text": "hi"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(upstream.bodies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_send_sms_rejects_long_text() {
    let (app, _, _) = ringcentral_app(&[("RINGCENTRAL_FROM_NUMBER", FROM_NUMBER)]).await;

    let response = app
        .post("/api/ringcentral/sms")
        .bearer(&app.agent_token())
        .header("cookie", &token_cookies())
        .json(&json!({"to": "+15551234567", "text": "x".repeat(1001)}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upstream_unauthorized_maps_to_401() {
    let (app, _, _) = ringcentral_app(&[("RINGCENTRAL_FROM_NUMBER", FROM_NUMBER)]).await;
    let expiry = (Utc::now() + Duration::minutes(30)).timestamp_millis();

    let response = app
        .post("/api/ringcentral/sms")
        .bearer(&app.agent_token())
        .header(
            "cookie",
            &format!(
                "ringcentral_access_token=revoked; ringcentral_token_expiry={}",
                expiry
            ),
        )
        .json(&json!({"to": "+15551234567", "text": "hi"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await;
    assert_eq!(body["error"], "Token not found");
}

#[tokio::test]
async fn test_ring_out_prefers_request_from_number() {
    let (app, upstream, _) = ringcentral_app(&[("RINGCENTRAL_FROM_NUMBER", FROM_NUMBER)]).await;

    let response = app
        .post("/api/ringcentral/call")
        .bearer(&app.agent_token())
        .header("cookie", &token_cookies())
        .json(&json!({"to": "+15551234567", "from": "+15559990000"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["callId"], "ro-77");
    assert_eq!(body["callDetails"]["status"]["callStatus"], "InProgress");

    let sent = upstream.bodies.lock().unwrap()[0].clone();
    assert_eq!(sent["from"]["phoneNumber"], "+15559990000");
    assert_eq!(sent["to"]["phoneNumber"], "+15551234567");
    assert_eq!(sent["playPrompt"], false);
}

#[tokio::test]
async fn test_ring_out_blank_from_falls_back_to_config() {
    let (app, upstream, _) = ringcentral_app(&[("RINGCENTRAL_FROM_NUMBER", FROM_NUMBER)]).await;

    let response = app
        .post("/api/ringcentral/call")
        .bearer(&app.agent_token())
        .header("cookie", &token_cookies())
        .json(&json!({"to": "+15551234567", "from": "  "}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let sent = upstream.bodies.lock().unwrap()[0].clone();
    assert_eq!(sent["from"]["phoneNumber"], FROM_NUMBER);
}

#[tokio::test]
async fn test_call_status() {
    let (app, _, _) = ringcentral_app(&[]).await;
    let token = app.agent_token();

    let missing = app
        .get("/api/ringcentral/call-status")
        .bearer(&token)
        .header("cookie", &token_cookies())
        .send()
        .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let response = app
        .get("/api/ringcentral/call-status?callId=ro-77")
        .bearer(&token)
        .header("cookie", &token_cookies())
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await;
    assert_eq!(body["id"], "ro-77");
    assert_eq!(body["status"]["callStatus"], "Success");
}
