// Lead listing, creation and pipeline stage assignment

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::AuthenticatedUser,
    models::{
        lead::{
            CreateLeadRequest, Lead, LeadListResponse, LeadView, ListLeadsQuery, NewLead,
            UpdateLeadPipelineRequest,
        },
        pipeline::{Pipeline, PipelineStatus},
    },
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::ServiceError,
        trim_optional_field,
    },
};

pub const LEAD_PIPELINE_UPDATED_MESSAGE: &str = "Lead pipeline and status updated successfully";

/// Pick the stage a new lead lands on: the default status, else the first one
pub fn initial_status(statuses: &[PipelineStatus]) -> Option<&PipelineStatus> {
    statuses
        .iter()
        .find(|s| s.is_default)
        .or_else(|| statuses.first())
}

pub struct LeadService {
    diesel_pool: DieselPool,
}

impl LeadService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_leads(
        &self,
        workspace_id: Uuid,
        query: &ListLeadsQuery,
    ) -> Result<LeadListResponse, ServiceError> {
        use crate::schema::leads::dsl;
        use crate::schema::pipeline_statuses;

        let mut conn = self.diesel_pool.get().await?;

        let mut rows_query = dsl::leads
            .left_join(pipeline_statuses::table)
            .filter(dsl::workspace_id.eq(workspace_id))
            .select((Lead::as_select(), pipeline_statuses::name.nullable()))
            .into_boxed();
        let mut count_query = dsl::leads
            .filter(dsl::workspace_id.eq(workspace_id))
            .into_boxed();

        if let Some(pipeline_id) = query.pipeline_id {
            rows_query = rows_query.filter(dsl::pipeline_id.eq(pipeline_id));
            count_query = count_query.filter(dsl::pipeline_id.eq(pipeline_id));
        }

        if let Some(status_id) = query.status_id {
            rows_query = rows_query.filter(dsl::pipeline_status_id.eq(status_id));
            count_query = count_query.filter(dsl::pipeline_status_id.eq(status_id));
        }

        let total = count_query.count().get_result::<i64>(&mut conn).await?;

        let rows: Vec<(Lead, Option<String>)> = rows_query
            .order((dsl::created_at.desc(), dsl::id.asc()))
            .limit(query.limit())
            .offset(query.offset())
            .load(&mut conn)
            .await?;

        let per_page = query.limit();
        Ok(LeadListResponse {
            leads: rows
                .into_iter()
                .map(|(lead, status)| LeadView { lead, status })
                .collect(),
            total,
            page: query.page(),
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_lead(&self, workspace_id: Uuid, lead_id: Uuid) -> Result<LeadView, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        let lead = Lead::find_in_workspace(&mut conn, workspace_id, lead_id)
            .await?
            .ok_or_else(|| lead_not_found(lead_id))?;
        to_view(&mut conn, lead).await
    }

    /// Create a lead in the requested or default pipeline
    #[instrument(skip(self, user, request), fields(workspace_id = %user.workspace_id))]
    pub async fn create_lead(
        &self,
        user: &AuthenticatedUser,
        request: CreateLeadRequest,
    ) -> Result<LeadView, ServiceError> {
        let workspace_id = user.workspace_id;
        let mut conn = self.diesel_pool.get().await?;

        let pipeline = match request.pipeline_id {
            Some(pipeline_id) => Some(
                Pipeline::find_in_workspace(&mut conn, workspace_id, pipeline_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Pipeline with ID {} not found", pipeline_id))
                    })?,
            ),
            None => Pipeline::find_default(&mut conn, workspace_id).await?,
        };

        let status_id = match (&pipeline, request.status_id) {
            (Some(pipeline), Some(status_id)) => {
                let status = PipelineStatus::find_in_workspace(&mut conn, workspace_id, status_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Status with ID {} not found", status_id))
                    })?;
                ensure_status_in_pipeline(&status, pipeline.id)?;
                Some(status.id)
            },
            (Some(pipeline), None) => {
                let statuses = pipeline.statuses(&mut conn).await?;
                initial_status(&statuses).map(|s| s.id)
            },
            (None, Some(_)) => {
                return Err(ServiceError::BadRequest(
                    "A status requires a pipeline and no default pipeline exists".to_string(),
                ));
            },
            (None, None) => {
                warn!("Creating lead without a pipeline; workspace has no default pipeline");
                None
            },
        };

        let new_lead = NewLead {
            workspace_id,
            first_name: request.first_name.trim().to_string(),
            last_name: trim_optional_field(request.last_name.as_ref()),
            email: trim_optional_field(request.email.as_ref()).map(|e| e.to_lowercase()),
            phone: trim_optional_field(request.phone.as_ref()),
            lead_type: trim_optional_field(request.lead_type.as_ref()),
            pipeline_id: pipeline.as_ref().map(|p| p.id),
            pipeline_status_id: status_id,
            status_changed_at: status_id.map(|_| Utc::now()),
        };

        let lead = {
            use crate::schema::leads::dsl;
            diesel::insert_into(dsl::leads)
                .values(&new_lead)
                .returning(Lead::as_returning())
                .get_result(&mut conn)
                .await?
        };

        info!(lead_id = %lead.id, "Lead created");
        AuditLogger::log_action(
            AuditAction::LeadCreated,
            user.user_id,
            Some(workspace_id),
            Some(lead.id.to_string()),
            lead.pipeline_id.map(|id| format!("pipeline {}", id)),
        );

        to_view(&mut conn, lead).await
    }

    /// Move a lead to a pipeline and one of that pipeline's statuses
    #[instrument(skip(self, user), fields(workspace_id = %user.workspace_id))]
    pub async fn update_lead_pipeline(
        &self,
        user: &AuthenticatedUser,
        lead_id: Uuid,
        request: UpdateLeadPipelineRequest,
    ) -> Result<LeadView, ServiceError> {
        use crate::schema::leads::dsl;

        let workspace_id = user.workspace_id;
        let mut conn = self.diesel_pool.get().await?;

        Lead::find_in_workspace(&mut conn, workspace_id, lead_id)
            .await?
            .ok_or_else(|| lead_not_found(lead_id))?;

        let pipeline = Pipeline::find_in_workspace(&mut conn, workspace_id, request.pipeline_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Pipeline with ID {} not found",
                    request.pipeline_id
                ))
            })?;

        let status = PipelineStatus::find_in_workspace(&mut conn, workspace_id, request.status_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Status with ID {} not found", request.status_id))
            })?;

        ensure_status_in_pipeline(&status, pipeline.id)?;

        let now = Utc::now();
        let lead = diesel::update(dsl::leads.find(lead_id))
            .set((
                dsl::pipeline_id.eq(pipeline.id),
                dsl::pipeline_status_id.eq(status.id),
                dsl::status_changed_at.eq(now),
                dsl::updated_at.eq(now),
            ))
            .returning(Lead::as_returning())
            .get_result(&mut conn)
            .await?;

        info!(%lead_id, pipeline_id = pipeline.id, status_id = status.id, "Lead moved");
        AuditLogger::log_action(
            AuditAction::LeadMoved,
            user.user_id,
            Some(workspace_id),
            Some(lead_id.to_string()),
            Some(format!("pipeline {} status {}", pipeline.id, status.id)),
        );

        Ok(LeadView {
            lead,
            status: Some(status.name),
        })
    }
}

fn lead_not_found(lead_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Lead with ID {} not found", lead_id))
}

fn ensure_status_in_pipeline(status: &PipelineStatus, pipeline_id: i32) -> Result<(), ServiceError> {
    if status.pipeline_id != pipeline_id {
        return Err(ServiceError::BadRequest(format!(
            "Status {} does not belong to pipeline {}",
            status.id, pipeline_id
        )));
    }
    Ok(())
}

async fn to_view(conn: &mut AsyncPgConnection, lead: Lead) -> Result<LeadView, ServiceError> {
    use crate::schema::pipeline_statuses::dsl;

    let status = match lead.pipeline_status_id {
        Some(status_id) => dsl::pipeline_statuses
            .find(status_id)
            .select(dsl::name)
            .first::<String>(conn)
            .await
            .optional()?,
        None => None,
    };

    Ok(LeadView { lead, status })
}
