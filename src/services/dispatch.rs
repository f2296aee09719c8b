// Campaign step dispatch to the n8n workflow runner
// The step run is persisted first; delivery to n8n is best effort

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use diesel::{dsl::exists, prelude::*};
use diesel_async::RunQueryDsl;
use ring::hmac;
use serde::Serialize;
use serde_json::{json, Map, Value};
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_config::WebhookConfig,
    db::DieselPool,
    models::campaign::{
        Campaign, CampaignStepRun, EnqueueStepRequest, NewCampaignStepRun, StepRunStatus,
    },
    services::campaign::campaign_not_found,
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::ServiceError,
    },
};

pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";
pub const SIGNATURE_HEADER: &str = "X-Signature";

const NON_2XX_WARNING: &str = "n8n returned non-2xx";

// =============================================================================
// SIGNING
// =============================================================================

/// Lowercase hex HMAC-SHA256 over `{timestamp}.{body}`
pub fn sign_payload(secret: &str, timestamp: &str, body: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let message = format!("{}.{}", timestamp, body);
    let tag = hmac::sign(&key, message.as_bytes());
    hex::encode(tag.as_ref())
}

/// Constant-time check of a received signature
pub fn verify_signature(secret: &str, timestamp: &str, body: &str, signature: &str) -> bool {
    let expected = sign_payload(secret, timestamp, body);
    let provided = signature.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

// =============================================================================
// PERSISTENCE PORT
// =============================================================================

/// Storage used by the dispatcher; a Diesel adapter backs it in production
#[async_trait]
pub trait StepRunRepository: Send + Sync {
    async fn campaign_exists(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<bool, ServiceError>;

    /// Whether the step is part of this workspace's campaign
    async fn step_in_campaign(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
        step_id: Uuid,
    ) -> Result<bool, ServiceError>;

    /// Whether the target is enrolled in this workspace's campaign
    async fn target_in_campaign(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, ServiceError>;

    async fn insert_step_run(
        &self,
        step_run: NewCampaignStepRun,
    ) -> Result<CampaignStepRun, ServiceError>;
}

#[derive(Clone)]
pub struct DieselStepRunRepository {
    diesel_pool: DieselPool,
}

impl DieselStepRunRepository {
    pub fn new(diesel_pool: DieselPool) -> Self {
        Self { diesel_pool }
    }
}

#[async_trait]
impl StepRunRepository for DieselStepRunRepository {
    async fn campaign_exists(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Campaign::find_in_workspace(&mut conn, workspace_id, campaign_id)
            .await?
            .is_some())
    }

    async fn step_in_campaign(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
        step_id: Uuid,
    ) -> Result<bool, ServiceError> {
        use crate::schema::campaign_steps::dsl;

        let mut conn = self.diesel_pool.get().await?;
        Ok(diesel::select(exists(
            dsl::campaign_steps
                .filter(dsl::id.eq(step_id))
                .filter(dsl::campaign_id.eq(campaign_id))
                .filter(dsl::workspace_id.eq(workspace_id)),
        ))
        .get_result(&mut conn)
        .await?)
    }

    async fn target_in_campaign(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, ServiceError> {
        use crate::schema::campaign_targets::dsl;

        let mut conn = self.diesel_pool.get().await?;
        Ok(diesel::select(exists(
            dsl::campaign_targets
                .filter(dsl::id.eq(target_id))
                .filter(dsl::campaign_id.eq(campaign_id))
                .filter(dsl::workspace_id.eq(workspace_id)),
        ))
        .get_result(&mut conn)
        .await?)
    }

    async fn insert_step_run(
        &self,
        step_run: NewCampaignStepRun,
    ) -> Result<CampaignStepRun, ServiceError> {
        use crate::schema::campaign_step_runs::dsl;

        let mut conn = self.diesel_pool.get().await?;
        Ok(diesel::insert_into(dsl::campaign_step_runs)
            .values(&step_run)
            .returning(CampaignStepRun::as_returning())
            .get_result(&mut conn)
            .await?)
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

/// Body POSTed to the workflow runner; field order is part of the signature
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundStep<'a> {
    campaign_id: Uuid,
    step_id: Uuid,
    target_id: Uuid,
    channel: &'a str,
    payload: &'a Value,
    overrides: &'a Value,
    step_run_id: Uuid,
    idempotency_key: &'a str,
}

/// Result of an enqueue; the step run exists in both cases
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Delivered {
        step_run: CampaignStepRun,
        n8n: Value,
    },
    Undelivered {
        step_run: CampaignStepRun,
        warning: String,
    },
}

impl DispatchOutcome {
    pub fn step_run(&self) -> &CampaignStepRun {
        match self {
            DispatchOutcome::Delivered { step_run, .. }
            | DispatchOutcome::Undelivered { step_run, .. } => step_run,
        }
    }
}

pub struct CampaignDispatcher {
    repository: Arc<dyn StepRunRepository>,
    client: reqwest::Client,
    webhook: WebhookConfig,
}

impl CampaignDispatcher {
    pub fn new(
        repository: Arc<dyn StepRunRepository>,
        webhook: WebhookConfig,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(webhook.timeout_secs))
            .build()
            .map_err(|e| ServiceError::ConfigurationError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            repository,
            client,
            webhook,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook.credentials().is_some()
    }

    /// Persist a queued step run, then sign and POST it to the webhook
    #[instrument(skip(self, request), fields(step_id = %request.step_id, target_id = %request.target_id))]
    pub async fn enqueue(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        campaign_id: Uuid,
        request: EnqueueStepRequest,
    ) -> Result<DispatchOutcome, ServiceError> {
        let (url, secret) = self.webhook.credentials().ok_or_else(|| {
            ServiceError::ConfigurationError("N8N webhook not configured".to_string())
        })?;

        if !self
            .repository
            .campaign_exists(workspace_id, campaign_id)
            .await?
        {
            return Err(campaign_not_found(campaign_id));
        }

        if !self
            .repository
            .step_in_campaign(workspace_id, campaign_id, request.step_id)
            .await?
        {
            return Err(ServiceError::NotFound(format!(
                "Campaign step with ID {} not found",
                request.step_id
            )));
        }

        if !self
            .repository
            .target_in_campaign(workspace_id, campaign_id, request.target_id)
            .await?
        {
            return Err(ServiceError::NotFound(format!(
                "Campaign target with ID {} not found",
                request.target_id
            )));
        }

        let idempotency_key = request
            .idempotency_key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let payload = Value::Object(request.payload.unwrap_or_default());
        let overrides = Value::Object(request.overrides.unwrap_or_else(Map::new));

        let step_run = self
            .repository
            .insert_step_run(NewCampaignStepRun {
                workspace_id,
                campaign_id,
                target_id: request.target_id,
                step_id: request.step_id,
                channel: request.channel.clone(),
                resolved_payload: payload.clone(),
                idempotency_key: idempotency_key.clone(),
                status: StepRunStatus::Queued.as_str().to_string(),
            })
            .await?;

        info!(step_run_id = %step_run.id, "Step run queued");
        AuditLogger::log_action(
            AuditAction::CampaignStepEnqueued,
            user_id,
            Some(workspace_id),
            Some(step_run.id.to_string()),
            Some(format!("campaign {} channel {}", campaign_id, step_run.channel)),
        );

        let body = serde_json::to_string(&OutboundStep {
            campaign_id,
            step_id: request.step_id,
            target_id: request.target_id,
            channel: &request.channel,
            payload: &payload,
            overrides: &overrides,
            step_run_id: step_run.id,
            idempotency_key: &idempotency_key,
        })
        .map_err(|e| ServiceError::InternalError(format!("Failed to encode step: {}", e)))?;

        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = sign_payload(secret, &timestamp, &body);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, &timestamp)
            .header(IDEMPOTENCY_HEADER, &idempotency_key)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                let n8n = res.json::<Value>().await.unwrap_or_else(|_| json!({}));
                info!(step_run_id = %step_run.id, "Step delivered to n8n");
                Ok(DispatchOutcome::Delivered { step_run, n8n })
            },
            Ok(res) => {
                warn!(step_run_id = %step_run.id, status = %res.status(), "n8n rejected step");
                Ok(DispatchOutcome::Undelivered {
                    step_run,
                    warning: NON_2XX_WARNING.to_string(),
                })
            },
            Err(e) => {
                warn!(step_run_id = %step_run.id, error = %e, "n8n webhook unreachable");
                Ok(DispatchOutcome::Undelivered {
                    step_run,
                    warning: format!("n8n webhook request failed: {}", e),
                })
            },
        }
    }
}
