// Leads positioned in a pipeline
// The status id is the single source of truth; the status name is derived on read

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{schema::leads, utils::validation::page_offset};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = leads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Lead {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub lead_type: Option<String>,
    pub pipeline_id: Option<i32>,
    pub pipeline_status_id: Option<i32>,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = leads)]
pub struct NewLead {
    pub workspace_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub lead_type: Option<String>,
    pub pipeline_id: Option<i32>,
    pub pipeline_status_id: Option<i32>,
    pub status_changed_at: Option<DateTime<Utc>>,
}

/// Lead as returned by the API, with the status name resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadView {
    #[serde(flatten)]
    pub lead: Lead,
    pub status: Option<String>,
}

/// One page of leads
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadListResponse {
    pub leads: Vec<LeadView>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Response for a lead moved to a new pipeline stage
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeadPipelineUpdateResponse {
    pub message: String,
    pub lead: LeadView,
}

impl Lead {
    pub async fn find_in_workspace(
        conn: &mut AsyncPgConnection,
        workspace_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::leads::dsl;

        dsl::leads
            .filter(dsl::id.eq(lead_id))
            .filter(dsl::workspace_id.eq(workspace_id))
            .select(Lead::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Number of leads currently in a pipeline
    pub async fn count_in_pipeline(
        conn: &mut AsyncPgConnection,
        pipeline_id: i32,
    ) -> Result<i64, diesel::result::Error> {
        use crate::schema::leads::dsl;

        dsl::leads
            .filter(dsl::pipeline_id.eq(pipeline_id))
            .count()
            .get_result(conn)
            .await
    }

    /// Number of leads currently at a status
    pub async fn count_at_status(
        conn: &mut AsyncPgConnection,
        status_id: i32,
    ) -> Result<i64, diesel::result::Error> {
        use crate::schema::leads::dsl;

        dsl::leads
            .filter(dsl::pipeline_status_id.eq(status_id))
            .count()
            .get_result(conn)
            .await
    }
}

// =============================================================================
// REQUEST DTOs
// =============================================================================

/// Move a lead to a pipeline stage
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"pipelineId": 1, "statusId": 3}))]
pub struct UpdateLeadPipelineRequest {
    #[validate(range(min = 1, message = "Pipeline ID must be a positive integer"))]
    pub pipeline_id: i32,

    #[validate(range(min = 1, message = "Status ID must be a positive integer"))]
    pub status_id: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateLeadRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,

    #[validate(length(max = 100, message = "Last name must be less than 100 characters"))]
    pub last_name: Option<String>,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    #[validate(length(max = 30, message = "Phone must be less than 30 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 50, message = "Lead type must be less than 50 characters"))]
    pub lead_type: Option<String>,

    #[validate(range(min = 1, message = "Pipeline ID must be a positive integer"))]
    pub pipeline_id: Option<i32>,

    #[validate(range(min = 1, message = "Status ID must be a positive integer"))]
    pub status_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListLeadsQuery {
    pub pipeline_id: Option<i32>,
    pub status_id: Option<i32>,
    #[validate(range(min = 1, max = 1000000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

impl ListLeadsQuery {
    pub const DEFAULT_LIMIT: i64 = 20;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        page_offset(self.page(), self.limit())
    }
}
