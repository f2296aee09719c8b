// Campaign lifecycle, steps and targets against Postgres

mod common;

use axum::http::StatusCode;
use common::{setup_database_app, TestApp};
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

async fn create_campaign(app: &TestApp, token: &str, name: &str) -> Value {
    let response = app
        .post("/api/campaigns")
        .bearer(token)
        .json(&json!({"name": name, "campaignType": "sms", "objective": "nurture"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await;
    assert_eq!(body["success"], true);
    body["data"].clone()
}

async fn set_status(app: &TestApp, token: &str, id: &str, status: &str) -> StatusCode {
    app.put(&format!("/api/campaigns/{}/status", id))
        .bearer(token)
        .json(&json!({"status": status}))
        .send()
        .await
        .status()
}

#[tokio::test]
#[serial]
async fn test_campaign_detail_with_steps_and_targets() {
    let Some(app) = setup_database_app().await else {
        return;
    };
    let token = app.agent_token();
    let campaign = create_campaign(&app, &token, "Renewal reminders").await;
    let id = campaign["id"].as_str().unwrap();
    assert_eq!(campaign["status"], "draft");
    assert_eq!(campaign["totalTargeted"], 0);

    let empty: Value = app
        .get(&format!("/api/campaigns/{}", id))
        .bearer(&token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(empty["data"]["hasSteps"], false);
    assert_eq!(empty["data"]["targets"], json!([]));

    let step = app
        .post(&format!("/api/campaigns/{}/steps", id))
        .bearer(&token)
        .json(&json!({"stepNumber": 1, "waitAfterMs": 86400000, "branchLabel": " intro "}))
        .send()
        .await;
    assert_eq!(step.status(), StatusCode::CREATED);
    let step: Value = step.json().await;
    assert_eq!(step["data"]["branchLabel"], "intro");
    assert_eq!(step["data"]["condition"], json!({}));

    let lead: Value = app
        .post("/api/leads")
        .bearer(&token)
        .json(&json!({"first_name": "Jordan"}))
        .send()
        .await
        .json()
        .await;

    let target = app
        .post(&format!("/api/campaigns/{}/targets", id))
        .bearer(&token)
        .json(&json!({"leadId": lead["id"]}))
        .send()
        .await;
    assert_eq!(target.status(), StatusCode::CREATED);
    let target: Value = target.json().await;
    assert_eq!(target["data"]["state"], "pending");
    assert_eq!(target["data"]["nextStepNumber"], 1);

    let detail: Value = app
        .get(&format!("/api/campaigns/{}", id))
        .bearer(&token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(detail["data"]["hasSteps"], true);
    assert_eq!(detail["data"]["hasTargets"], true);
    assert_eq!(detail["data"]["campaign"]["totalTargeted"], 1);

    let unknown_lead = app
        .post(&format!("/api/campaigns/{}/targets", id))
        .bearer(&token)
        .json(&json!({"leadId": Uuid::new_v4()}))
        .send()
        .await;
    assert_eq!(unknown_lead.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_campaign_status_lifecycle() {
    let Some(app) = setup_database_app().await else {
        return;
    };
    let token = app.agent_token();
    let campaign = create_campaign(&app, &token, "Spring push").await;
    let id = campaign["id"].as_str().unwrap();

    assert_eq!(set_status(&app, &token, id, "paused").await, StatusCode::CONFLICT);
    assert_eq!(set_status(&app, &token, id, "active").await, StatusCode::OK);
    assert_eq!(set_status(&app, &token, id, "paused").await, StatusCode::OK);
    assert_eq!(set_status(&app, &token, id, "cancelled").await, StatusCode::OK);
    assert_eq!(set_status(&app, &token, id, "active").await, StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
async fn test_list_campaigns_scoped_and_filtered() {
    let Some(app) = setup_database_app().await else {
        return;
    };
    let token = app.agent_token();
    let first = create_campaign(&app, &token, "Auto quotes").await;
    create_campaign(&app, &token, "Home quotes").await;
    set_status(&app, &token, first["id"].as_str().unwrap(), "active").await;

    let all: Value = app
        .get("/api/campaigns?sortBy=name&sortOrder=asc")
        .bearer(&token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(all["pagination"]["totalCount"], 2);
    assert_eq!(all["data"][0]["name"], "Auto quotes");

    let active: Value = app
        .get("/api/campaigns?status=active&search=auto")
        .bearer(&token)
        .send()
        .await
        .json()
        .await;
    assert_eq!(active["data"].as_array().unwrap().len(), 1);

    let other: Value = app
        .get("/api/campaigns")
        .bearer(&app.agent_token())
        .send()
        .await
        .json()
        .await;
    assert_eq!(other["pagination"]["totalCount"], 0);
}
