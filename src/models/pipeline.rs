// Pipelines and their ordered statuses

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::schema::{pipeline_statuses, pipelines};
use crate::utils::validation::validate_color_hex;

// =============================================================================
// DATABASE MODELS
// =============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = pipelines)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Pipeline {
    pub id: i32,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub lead_type: Option<String>,
    pub is_default: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize, ToSchema,
)]
#[diesel(table_name = pipeline_statuses)]
#[diesel(belongs_to(Pipeline))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PipelineStatus {
    pub id: i32,
    pub pipeline_id: i32,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Terminal stage (won, lost, ...)
    pub is_final: bool,
    /// Initial stage for new leads
    pub is_default: bool,
    pub display_order: i32,
    pub color_hex: Option<String>,
    pub icon_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pipelines)]
pub struct NewPipeline {
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub lead_type: Option<String>,
    pub is_default: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pipeline_statuses)]
pub struct NewPipelineStatus {
    pub pipeline_id: i32,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_final: bool,
    pub is_default: bool,
    pub display_order: i32,
    pub color_hex: Option<String>,
    pub icon_name: Option<String>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = pipelines)]
pub struct UpdatePipeline {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub lead_type: Option<Option<String>>,
    pub is_default: Option<bool>,
    pub display_order: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = pipeline_statuses)]
pub struct UpdatePipelineStatus {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_final: Option<bool>,
    pub is_default: Option<bool>,
    pub display_order: Option<i32>,
    pub color_hex: Option<Option<String>>,
    pub icon_name: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Pipeline with its statuses sorted by display order
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PipelineWithStatuses {
    #[serde(flatten)]
    pub pipeline: Pipeline,
    pub pipeline_statuses: Vec<PipelineStatus>,
}

impl Pipeline {
    /// Find a pipeline within a workspace
    pub async fn find_in_workspace(
        conn: &mut AsyncPgConnection,
        workspace_id: Uuid,
        pipeline_id: i32,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::pipelines::dsl;

        dsl::pipelines
            .filter(dsl::id.eq(pipeline_id))
            .filter(dsl::workspace_id.eq(workspace_id))
            .select(Pipeline::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// The workspace default pipeline, if one is set
    pub async fn find_default(
        conn: &mut AsyncPgConnection,
        workspace_id: Uuid,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::pipelines::dsl;

        dsl::pipelines
            .filter(dsl::workspace_id.eq(workspace_id))
            .filter(dsl::is_default.eq(true))
            .select(Pipeline::as_select())
            .first(conn)
            .await
            .optional()
    }

    /// Statuses of this pipeline ordered by display order, then id
    pub async fn statuses(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<PipelineStatus>, diesel::result::Error> {
        PipelineStatus::list_for_pipeline(conn, self.id).await
    }
}

impl PipelineStatus {
    pub async fn list_for_pipeline(
        conn: &mut AsyncPgConnection,
        pipeline_id: i32,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::pipeline_statuses::dsl;

        dsl::pipeline_statuses
            .filter(dsl::pipeline_id.eq(pipeline_id))
            .order((dsl::display_order.asc(), dsl::id.asc()))
            .select(PipelineStatus::as_select())
            .load(conn)
            .await
    }

    /// Find a status within a workspace
    pub async fn find_in_workspace(
        conn: &mut AsyncPgConnection,
        workspace_id: Uuid,
        status_id: i32,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::pipeline_statuses::dsl;

        dsl::pipeline_statuses
            .filter(dsl::id.eq(status_id))
            .filter(dsl::workspace_id.eq(workspace_id))
            .select(PipelineStatus::as_select())
            .first(conn)
            .await
            .optional()
    }
}

// =============================================================================
// REQUEST DTOs
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Auto Insurance",
    "description": "Personal auto quotes",
    "lead_type": "auto",
    "is_default": true,
    "statuses": [
        {"name": "New", "is_default": true, "color_hex": "#3B82F6"},
        {"name": "Quoted"},
        {"name": "Sold", "is_final": true}
    ]
}))]
pub struct CreatePipelineRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be less than 500 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 50, message = "Lead type must be less than 50 characters"))]
    pub lead_type: Option<String>,

    #[serde(default)]
    pub is_default: bool,

    #[validate(range(min = 0, message = "Display order cannot be negative"))]
    pub display_order: Option<i32>,

    #[serde(default)]
    #[validate]
    pub statuses: Vec<CreateStatusRequest>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePipelineRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be less than 500 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 50, message = "Lead type must be less than 50 characters"))]
    pub lead_type: Option<String>,

    pub is_default: Option<bool>,

    #[validate(range(min = 0, message = "Display order cannot be negative"))]
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateStatusRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be less than 500 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub is_final: bool,

    #[serde(default)]
    pub is_default: bool,

    #[validate(range(min = 0, message = "Display order cannot be negative"))]
    pub display_order: Option<i32>,

    #[validate(custom = "validate_color_hex")]
    pub color_hex: Option<String>,

    #[validate(length(max = 50, message = "Icon name must be less than 50 characters"))]
    pub icon_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be less than 500 characters"))]
    pub description: Option<String>,

    pub is_final: Option<bool>,

    pub is_default: Option<bool>,

    #[validate(range(min = 0, message = "Display order cannot be negative"))]
    pub display_order: Option<i32>,

    #[validate(custom = "validate_color_hex")]
    pub color_hex: Option<String>,

    #[validate(length(max = 50, message = "Icon name must be less than 50 characters"))]
    pub icon_name: Option<String>,
}

/// Persist a full status order (display order = 1-based position)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"status_ids": [4, 1, 2, 3]}))]
pub struct ReorderStatusesRequest {
    #[validate(length(min = 1, message = "At least one status ID is required"))]
    pub status_ids: Vec<i32>,
}

/// Drag one status onto another's position
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"source_status_id": 4, "target_status_id": 1}))]
pub struct MoveStatusRequest {
    #[validate(range(min = 1, message = "Source status ID must be a positive integer"))]
    pub source_status_id: i32,

    #[validate(range(min = 1, message = "Target status ID must be a positive integer"))]
    pub target_status_id: i32,
}

impl UpdatePipelineRequest {
    /// Build the changeset, trimming text and treating blank optionals as cleared
    pub fn into_changeset(self, now: DateTime<Utc>) -> UpdatePipeline {
        UpdatePipeline {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description.as_ref().map(|d| non_blank(d)),
            lead_type: self.lead_type.as_ref().map(|t| non_blank(t)),
            is_default: self.is_default,
            display_order: self.display_order,
            updated_at: Some(now),
        }
    }
}

impl UpdateStatusRequest {
    pub fn into_changeset(self, now: DateTime<Utc>) -> UpdatePipelineStatus {
        UpdatePipelineStatus {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description.as_ref().map(|d| non_blank(d)),
            is_final: self.is_final,
            is_default: self.is_default,
            display_order: self.display_order,
            color_hex: self.color_hex.as_ref().map(|c| non_blank(c)),
            icon_name: self.icon_name.as_ref().map(|i| non_blank(i)),
            updated_at: Some(now),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    crate::utils::trim_optional_field(Some(&value.to_string()))
}
