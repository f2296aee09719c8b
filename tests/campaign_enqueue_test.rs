// Campaign step enqueue against a local stand-in for the n8n webhook.
// Step runs go to an in-memory store, so no database is needed.

mod common;

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use common::{setup_test_app, spawn_server, TestApp};
use crm_backend_core::services::dispatch::{
    verify_signature, IDEMPOTENCY_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use serde_json::{json, Value};
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "whsec_integration_test";

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(HeaderMap, String)>>>,
}

async fn accept_step(
    State(captured): State<Captured>,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    captured.requests.lock().unwrap().push((headers, body));
    Json(json!({"executionId": "exec-42"}))
}

async fn reject_step() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "workflow crashed"})),
    )
}

async fn webhook_app(router: Router) -> (TestApp, String) {
    let base = spawn_server(router).await;
    let url = format!("{}/webhook/campaign", base);
    let app = setup_test_app(&[
        ("N8N_WEBHOOK_URL", url.as_str()),
        ("N8N_WEBHOOK_SECRET", WEBHOOK_SECRET),
    ]);
    (app, url)
}

fn enqueue_body(step_id: Uuid, target_id: Uuid) -> Value {
    json!({
        "stepId": step_id,
        "targetId": target_id,
        "channel": "sms",
        "payload": {"templateVars": {"firstName": "Dana"}},
        "idempotencyKey": "campaign-step-key-0001"
    })
}

#[tokio::test]
async fn test_enqueue_delivers_signed_step() {
    let captured = Captured::default();
    let router = Router::new()
        .route("/webhook/campaign", post(accept_step))
        .with_state(captured.clone());
    let (app, _) = webhook_app(router).await;

    let (user_id, workspace_id, campaign_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (step_id, target_id) = app.step_runs.add_campaign_with_step(workspace_id, campaign_id);

    let response = app
        .post(&format!("/api/campaigns/{}/enqueue", campaign_id))
        .bearer(&app.token(user_id, workspace_id, "agent"))
        .json(&enqueue_body(step_id, target_id))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["n8n"]["executionId"], "exec-42");
    assert_eq!(body["data"]["stepRun"]["status"], "queued");
    assert_eq!(body["data"]["stepRun"]["idempotencyKey"], "campaign-step-key-0001");

    let runs = app.step_runs.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].workspace_id, workspace_id);
    assert_eq!(runs[0].resolved_payload["templateVars"]["firstName"], "Dana");

    let requests = captured.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let (headers, raw) = &requests[0];

    let timestamp = headers[TIMESTAMP_HEADER].to_str().unwrap();
    let signature = headers[SIGNATURE_HEADER].to_str().unwrap();
    assert!(verify_signature(WEBHOOK_SECRET, timestamp, raw, signature));
    assert!(!verify_signature("wrong-secret", timestamp, raw, signature));
    assert_eq!(
        headers[IDEMPOTENCY_HEADER].to_str().unwrap(),
        "campaign-step-key-0001"
    );

    let sent: Value = serde_json::from_str(raw).unwrap();
    assert_eq!(sent["campaignId"], campaign_id.to_string());
    assert_eq!(sent["stepRunId"], runs[0].id.to_string());
    assert_eq!(sent["overrides"], json!({}));
}

#[tokio::test]
async fn test_enqueue_generates_idempotency_key_when_missing() {
    let captured = Captured::default();
    let router = Router::new()
        .route("/webhook/campaign", post(accept_step))
        .with_state(captured.clone());
    let (app, _) = webhook_app(router).await;

    let (workspace_id, campaign_id) = (Uuid::new_v4(), Uuid::new_v4());
    let (step_id, target_id) = app.step_runs.add_campaign_with_step(workspace_id, campaign_id);

    let response = app
        .post(&format!("/api/campaigns/{}/enqueue", campaign_id))
        .bearer(&app.token(Uuid::new_v4(), workspace_id, "agent"))
        .json(&json!({
            "stepId": step_id,
            "targetId": target_id,
            "channel": "email"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let key = app.step_runs.runs()[0].idempotency_key.clone();
    assert!(Uuid::parse_str(&key).is_ok());

    let requests = captured.requests.lock().unwrap().clone();
    assert_eq!(requests[0].0[IDEMPOTENCY_HEADER].to_str().unwrap(), key);
}

#[tokio::test]
async fn test_enqueue_non_2xx_keeps_run_and_warns() {
    let router = Router::new().route("/webhook/campaign", post(reject_step));
    let (app, _) = webhook_app(router).await;

    let (workspace_id, campaign_id) = (Uuid::new_v4(), Uuid::new_v4());
    let (step_id, target_id) = app.step_runs.add_campaign_with_step(workspace_id, campaign_id);

    let response = app
        .post(&format!("/api/campaigns/{}/enqueue", campaign_id))
        .bearer(&app.token(Uuid::new_v4(), workspace_id, "agent"))
        .json(&enqueue_body(step_id, target_id))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body: Value = response.json().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["warning"], "n8n returned non-2xx");
    assert_eq!(body["data"]["status"], "queued");
    assert_eq!(app.step_runs.runs().len(), 1);
}

#[tokio::test]
async fn test_enqueue_unreachable_webhook_keeps_run() {
    let app = setup_test_app(&[
        ("N8N_WEBHOOK_URL", "http://127.0.0.1:9/webhook/campaign"),
        ("N8N_WEBHOOK_SECRET", WEBHOOK_SECRET),
    ]);

    let (workspace_id, campaign_id) = (Uuid::new_v4(), Uuid::new_v4());
    let (step_id, target_id) = app.step_runs.add_campaign_with_step(workspace_id, campaign_id);

    let response = app
        .post(&format!("/api/campaigns/{}/enqueue", campaign_id))
        .bearer(&app.token(Uuid::new_v4(), workspace_id, "agent"))
        .json(&enqueue_body(step_id, target_id))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body: Value = response.json().await;
    assert!(body["warning"]
        .as_str()
        .unwrap()
        .starts_with("n8n webhook request failed"));
    assert_eq!(app.step_runs.runs().len(), 1);
}

#[tokio::test]
async fn test_enqueue_without_webhook_config_fails() {
    let app = setup_test_app(&[]);
    let (workspace_id, campaign_id) = (Uuid::new_v4(), Uuid::new_v4());
    let (step_id, target_id) = app.step_runs.add_campaign_with_step(workspace_id, campaign_id);

    let response = app
        .post(&format!("/api/campaigns/{}/enqueue", campaign_id))
        .bearer(&app.token(Uuid::new_v4(), workspace_id, "agent"))
        .json(&enqueue_body(step_id, target_id))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json().await;
    assert_eq!(body["code"], "CONFIGURATION_ERROR");
    assert!(app.step_runs.runs().is_empty());
}

#[tokio::test]
async fn test_enqueue_validates_body_before_config() {
    let app = setup_test_app(&[]);
    let response = app
        .post(&format!("/api/campaigns/{}/enqueue", Uuid::new_v4()))
        .bearer(&app.agent_token())
        .json(&json!({
            "stepId": Uuid::new_v4(),
            "targetId": Uuid::new_v4(),
            "channel": "",
            "idempotencyKey": "short"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await;
    assert!(body["details"]["channel"].is_array());
    assert!(body["details"]["idempotency_key"].is_array());
}

#[tokio::test]
async fn test_enqueue_for_other_workspace_campaign_is_not_found() {
    let router = Router::new().route("/webhook/campaign", post(reject_step));
    let (app, _) = webhook_app(router).await;

    let campaign_id = Uuid::new_v4();
    app.step_runs.add_campaign(Uuid::new_v4(), campaign_id);

    let response = app
        .post(&format!("/api/campaigns/{}/enqueue", campaign_id))
        .bearer(&app.agent_token())
        .json(&enqueue_body(Uuid::new_v4(), Uuid::new_v4()))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.step_runs.runs().is_empty());
}

#[tokio::test]
async fn test_enqueue_rejects_step_or_target_outside_campaign() {
    let captured = Captured::default();
    let router = Router::new()
        .route("/webhook/campaign", post(accept_step))
        .with_state(captured.clone());
    let (app, _) = webhook_app(router).await;

    let workspace_id = Uuid::new_v4();
    let (own_campaign, other_campaign) = (Uuid::new_v4(), Uuid::new_v4());
    let (own_step, own_target) = app.step_runs.add_campaign_with_step(workspace_id, own_campaign);
    let (other_step, other_target) = app
        .step_runs
        .add_campaign_with_step(Uuid::new_v4(), other_campaign);
    let token = app.token(Uuid::new_v4(), workspace_id, "agent");

    for (step_id, target_id) in [(other_step, own_target), (own_step, other_target)] {
        let response = app
            .post(&format!("/api/campaigns/{}/enqueue", own_campaign))
            .bearer(&token)
            .json(&enqueue_body(step_id, target_id))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    assert!(app.step_runs.runs().is_empty());
    assert!(captured.requests.lock().unwrap().is_empty());
}
