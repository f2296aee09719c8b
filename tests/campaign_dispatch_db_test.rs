// Campaign step enqueue with step runs persisted in Postgres

mod common;

use axum::{http::StatusCode, routing::post, Json, Router};
use common::{setup_database_dispatch_app, spawn_server, TestApp};
use crm_backend_core::models::campaign::CampaignStepRun;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "whsec_database_test";

struct Enrolled {
    campaign_id: String,
    step_id: String,
    target_id: String,
}

/// Campaign with one step and one enrolled lead, all in the token's workspace
async fn enrolled_campaign(app: &TestApp, token: &str) -> Enrolled {
    let campaign: Value = app
        .post("/api/campaigns")
        .bearer(token)
        .json(&json!({"name": "Renewals", "campaignType": "sms"}))
        .send()
        .await
        .json()
        .await;
    let campaign_id = campaign["data"]["id"].as_str().unwrap().to_string();

    let step: Value = app
        .post(&format!("/api/campaigns/{}/steps", campaign_id))
        .bearer(token)
        .json(&json!({"stepNumber": 1}))
        .send()
        .await
        .json()
        .await;

    let lead: Value = app
        .post("/api/leads")
        .bearer(token)
        .json(&json!({"first_name": "Casey"}))
        .send()
        .await
        .json()
        .await;

    let target: Value = app
        .post(&format!("/api/campaigns/{}/targets", campaign_id))
        .bearer(token)
        .json(&json!({"leadId": lead["id"]}))
        .send()
        .await
        .json()
        .await;

    Enrolled {
        campaign_id,
        step_id: step["data"]["id"].as_str().unwrap().to_string(),
        target_id: target["data"]["id"].as_str().unwrap().to_string(),
    }
}

async fn stored_runs(app: &TestApp, campaign_id: &str) -> Vec<CampaignStepRun> {
    use crm_backend_core::schema::campaign_step_runs::dsl;

    let campaign_id = Uuid::parse_str(campaign_id).unwrap();
    let mut conn = app.state.diesel_pool.get().await.unwrap();
    dsl::campaign_step_runs
        .filter(dsl::campaign_id.eq(campaign_id))
        .select(CampaignStepRun::as_select())
        .load(&mut conn)
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_enqueue_persists_queued_run_when_webhook_unreachable() {
    let Some(app) = setup_database_dispatch_app(&[
        ("N8N_WEBHOOK_URL", "http://127.0.0.1:9/webhook/campaign"),
        ("N8N_WEBHOOK_SECRET", WEBHOOK_SECRET),
    ])
    .await
    else {
        return;
    };
    let token = app.agent_token();
    let enrolled = enrolled_campaign(&app, &token).await;

    let response = app
        .post(&format!("/api/campaigns/{}/enqueue", enrolled.campaign_id))
        .bearer(&token)
        .json(&json!({
            "stepId": enrolled.step_id,
            "targetId": enrolled.target_id,
            "channel": "sms",
            "idempotencyKey": "renewal-step-0001"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let runs = stored_runs(&app, &enrolled.campaign_id).await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "queued");
    assert_eq!(runs[0].idempotency_key, "renewal-step-0001");
    assert_eq!(runs[0].step_id.to_string(), enrolled.step_id);
    assert_eq!(runs[0].target_id.to_string(), enrolled.target_id);
}

#[tokio::test]
#[serial]
async fn test_enqueue_rejects_step_and_target_from_other_workspace() {
    let router = Router::new().route(
        "/webhook/campaign",
        post(|| async { Json(json!({"ok": true})) }),
    );
    let base = spawn_server(router).await;
    let url = format!("{}/webhook/campaign", base);
    let Some(app) = setup_database_dispatch_app(&[
        ("N8N_WEBHOOK_URL", url.as_str()),
        ("N8N_WEBHOOK_SECRET", WEBHOOK_SECRET),
    ])
    .await
    else {
        return;
    };

    let own_token = app.agent_token();
    let own = enrolled_campaign(&app, &own_token).await;
    let foreign = enrolled_campaign(&app, &app.agent_token()).await;

    for (step_id, target_id) in [
        (&foreign.step_id, &foreign.target_id),
        (&foreign.step_id, &own.target_id),
        (&own.step_id, &foreign.target_id),
    ] {
        let response = app
            .post(&format!("/api/campaigns/{}/enqueue", own.campaign_id))
            .bearer(&own_token)
            .json(&json!({"stepId": step_id, "targetId": target_id, "channel": "sms"}))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
    assert!(stored_runs(&app, &own.campaign_id).await.is_empty());

    let allowed = app
        .post(&format!("/api/campaigns/{}/enqueue", own.campaign_id))
        .bearer(&own_token)
        .json(&json!({"stepId": own.step_id, "targetId": own.target_id, "channel": "sms"}))
        .send()
        .await;
    assert_eq!(allowed.status(), StatusCode::CREATED);
    assert_eq!(stored_runs(&app, &own.campaign_id).await.len(), 1);
}
