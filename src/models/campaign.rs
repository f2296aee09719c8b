// Campaigns, their steps and targets, and dispatched step runs

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    schema::{campaign_step_runs, campaign_steps, campaign_targets, campaigns},
    utils::validation::page_offset,
};

// =============================================================================
// ENUMS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CampaignStatus::Draft),
            "active" => Some(CampaignStatus::Active),
            "paused" => Some(CampaignStatus::Paused),
            "completed" => Some(CampaignStatus::Completed),
            "cancelled" => Some(CampaignStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    /// Allowed lifecycle moves; completed and cancelled are terminal
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Draft, Cancelled)
                | (Active, Paused)
                | (Active, Completed)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Email,
    Sms,
    Phone,
    Social,
    DirectMail,
    #[default]
    MultiChannel,
    AiAutomated,
    AiNurture,
    OnHold,
    Reengagement,
}

impl CampaignType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignType::Email => "email",
            CampaignType::Sms => "sms",
            CampaignType::Phone => "phone",
            CampaignType::Social => "social",
            CampaignType::DirectMail => "direct_mail",
            CampaignType::MultiChannel => "multi_channel",
            CampaignType::AiAutomated => "ai_automated",
            CampaignType::AiNurture => "ai_nurture",
            CampaignType::OnHold => "on_hold",
            CampaignType::Reengagement => "reengagement",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CampaignObjective {
    LeadGeneration,
    Nurture,
    Conversion,
    Retention,
    Winback,
    AiQualification,
    AiNurture,
    HoldManagement,
    Reengagement,
}

impl CampaignObjective {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignObjective::LeadGeneration => "lead_generation",
            CampaignObjective::Nurture => "nurture",
            CampaignObjective::Conversion => "conversion",
            CampaignObjective::Retention => "retention",
            CampaignObjective::Winback => "winback",
            CampaignObjective::AiQualification => "ai_qualification",
            CampaignObjective::AiNurture => "ai_nurture",
            CampaignObjective::HoldManagement => "hold_management",
            CampaignObjective::Reengagement => "reengagement",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Pending,
    InProgress,
    Completed,
    Suppressed,
    Failed,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Pending => "pending",
            TargetState::InProgress => "in_progress",
            TargetState::Completed => "completed",
            TargetState::Suppressed => "suppressed",
            TargetState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepRunStatus {
    Queued,
    Sent,
    Bounced,
    Failed,
    Skipped,
}

impl StepRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepRunStatus::Queued => "queued",
            StepRunStatus::Sent => "sent",
            StepRunStatus::Bounced => "bounced",
            StepRunStatus::Failed => "failed",
            StepRunStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum CampaignSortBy {
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "startDate")]
    StartDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

// =============================================================================
// DATABASE MODELS
// =============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = campaigns)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub campaign_type: String,
    pub objective: Option<String>,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub total_targeted: i32,
    pub total_sent: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = campaigns)]
pub struct NewCampaign {
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub campaign_type: String,
    pub objective: Option<String>,
    pub status: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(
    Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize, ToSchema,
)]
#[diesel(table_name = campaign_steps)]
#[diesel(belongs_to(Campaign))]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CampaignStep {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub step_number: i32,
    pub template_id: Option<Uuid>,
    pub wait_after_ms: i32,
    #[schema(value_type = Object)]
    pub condition: JsonValue,
    pub branch_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = campaign_steps)]
pub struct NewCampaignStep {
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub step_number: i32,
    pub template_id: Option<Uuid>,
    pub wait_after_ms: i32,
    pub condition: JsonValue,
    pub branch_label: Option<String>,
}

#[derive(
    Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize, ToSchema,
)]
#[diesel(table_name = campaign_targets)]
#[diesel(belongs_to(Campaign))]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CampaignTarget {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub state: String,
    pub next_step_number: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = campaign_targets)]
pub struct NewCampaignTarget {
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub state: String,
    pub next_step_number: i32,
}

/// Persisted record of one dispatch attempt; never updated after insert
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = campaign_step_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CampaignStepRun {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub target_id: Uuid,
    pub step_id: Uuid,
    pub channel: String,
    #[schema(value_type = Object)]
    pub resolved_payload: JsonValue,
    pub idempotency_key: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = campaign_step_runs)]
pub struct NewCampaignStepRun {
    pub workspace_id: Uuid,
    pub campaign_id: Uuid,
    pub target_id: Uuid,
    pub step_id: Uuid,
    pub channel: String,
    pub resolved_payload: JsonValue,
    pub idempotency_key: String,
    pub status: String,
}

/// Campaign with its steps and targets for the detail view
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDetail {
    pub campaign: Campaign,
    pub steps: Vec<CampaignStep>,
    pub targets: Vec<CampaignTarget>,
    pub has_steps: bool,
    pub has_targets: bool,
}

impl CampaignDetail {
    pub fn new(campaign: Campaign, steps: Vec<CampaignStep>, targets: Vec<CampaignTarget>) -> Self {
        Self {
            has_steps: !steps.is_empty(),
            has_targets: !targets.is_empty(),
            campaign,
            steps,
            targets,
        }
    }
}

impl Campaign {
    pub async fn find_in_workspace(
        conn: &mut AsyncPgConnection,
        workspace_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::campaigns::dsl;

        dsl::campaigns
            .filter(dsl::id.eq(campaign_id))
            .filter(dsl::workspace_id.eq(workspace_id))
            .select(Campaign::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub fn current_status(&self) -> Option<CampaignStatus> {
        CampaignStatus::from_string(&self.status)
    }
}

// =============================================================================
// REQUEST DTOs
// =============================================================================

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

fn default_sort_by() -> CampaignSortBy {
    CampaignSortBy::CreatedAt
}

fn default_sort_order() -> SortOrder {
    SortOrder::Desc
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListCampaignsQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, max = 1000000, message = "Page must be between 1 and 1000000"))]
    pub page: i64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: i64,

    pub search: Option<String>,

    pub status: Option<CampaignStatus>,

    pub campaign_type: Option<CampaignType>,

    #[serde(default = "default_sort_by")]
    pub sort_by: CampaignSortBy,

    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
}

impl ListCampaignsQuery {
    pub fn offset(&self) -> i64 {
        page_offset(self.page, self.limit)
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "name": "Spring renewal outreach",
    "campaignType": "sms",
    "objective": "retention"
}))]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,

    #[serde(default)]
    pub campaign_type: CampaignType,

    pub objective: Option<CampaignObjective>,

    #[validate(length(max = 1000, message = "Description must be less than 1000 characters"))]
    pub description: Option<String>,

    pub status: Option<CampaignStatus>,

    pub start_date: Option<DateTime<Utc>>,

    pub end_date: Option<DateTime<Utc>>,
}

impl CreateCampaignRequest {
    pub fn validate_dates(&self) -> Result<(), String> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end < start => {
                Err("End date must not be before start date".to_string())
            },
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"status": "active"}))]
pub struct UpdateCampaignStatusRequest {
    pub status: CampaignStatus,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignStepRequest {
    #[validate(range(min = 1, message = "Step number must be at least 1"))]
    pub step_number: i32,

    pub template_id: Option<Uuid>,

    #[serde(default)]
    #[validate(range(min = 0, message = "Wait must not be negative"))]
    pub wait_after_ms: i32,

    #[schema(value_type = Option<Object>)]
    pub condition: Option<serde_json::Map<String, JsonValue>>,

    #[validate(length(max = 100, message = "Branch label must be less than 100 characters"))]
    pub branch_label: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddCampaignTargetRequest {
    pub lead_id: Uuid,
}

/// Queue one campaign step for one target
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "stepId": "7b0c7f7e-3b1e-4a8f-9a55-0d6f7b5c2a10",
    "targetId": "0f1e2d3c-4b5a-4978-8695-a4b3c2d1e0f9",
    "channel": "sms",
    "payload": {"templateVars": {"firstName": "Dana"}}
}))]
pub struct EnqueueStepRequest {
    pub step_id: Uuid,

    pub target_id: Uuid,

    #[validate(length(min = 1, message = "Channel is required"))]
    pub channel: String,

    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub payload: Option<serde_json::Map<String, JsonValue>>,

    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub overrides: Option<serde_json::Map<String, JsonValue>>,

    #[validate(length(min = 10, message = "Idempotency key must be at least 10 characters"))]
    pub idempotency_key: Option<String>,
}

// =============================================================================
// RESPONSE DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        Self {
            page,
            limit,
            total_count,
            total_pages: if limit > 0 {
                (total_count + limit - 1) / limit
            } else {
                0
            },
        }
    }
}

/// `{success, data}` wrapper used by every campaign endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CampaignEnvelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> CampaignEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignListResponse {
    pub success: bool,
    pub data: Vec<Campaign>,
    pub pagination: Pagination,
}
