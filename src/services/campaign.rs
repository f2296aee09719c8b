// Campaign management: lifecycle, steps, targets and run history

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::AuthenticatedUser,
    models::{
        campaign::{
            AddCampaignTargetRequest, Campaign, CampaignDetail, CampaignSortBy, CampaignStatus,
            CampaignStep, CampaignStepRun, CampaignTarget, CreateCampaignRequest,
            CreateCampaignStepRequest, ListCampaignsQuery, NewCampaign, NewCampaignStep,
            NewCampaignTarget, Pagination, SortOrder, TargetState,
        },
        lead::Lead,
    },
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::ServiceError,
        trim_optional_field,
    },
};

pub fn campaign_not_found(campaign_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Campaign with ID {} not found", campaign_id))
}

/// Check a lifecycle move, returning 409 when it is not allowed
pub fn check_transition(current: CampaignStatus, next: CampaignStatus) -> Result<(), ServiceError> {
    if current.can_transition_to(next) {
        return Ok(());
    }

    let reason = if current.is_terminal() {
        format!("Campaign is {} and can no longer change status", current.as_str())
    } else {
        format!(
            "Cannot change campaign status from {} to {}",
            current.as_str(),
            next.as_str()
        )
    };
    Err(ServiceError::Conflict(reason))
}

pub struct CampaignService {
    diesel_pool: DieselPool,
}

impl CampaignService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    /// Filtered, sorted and paginated campaign list
    #[instrument(skip(self, params))]
    pub async fn list_campaigns(
        &self,
        workspace_id: Uuid,
        params: &ListCampaignsQuery,
    ) -> Result<(Vec<Campaign>, Pagination), ServiceError> {
        use crate::schema::campaigns::dsl;

        let mut conn = self.diesel_pool.get().await?;

        let mut query = dsl::campaigns
            .filter(dsl::workspace_id.eq(workspace_id))
            .select(Campaign::as_select())
            .into_boxed();
        let mut count_query = dsl::campaigns
            .filter(dsl::workspace_id.eq(workspace_id))
            .into_boxed();

        if let Some(search) = trim_optional_field(params.search.as_ref()) {
            let pattern = format!("%{}%", search);
            query = query.filter(dsl::name.ilike(pattern.clone()));
            count_query = count_query.filter(dsl::name.ilike(pattern));
        }

        if let Some(status) = params.status {
            query = query.filter(dsl::status.eq(status.as_str()));
            count_query = count_query.filter(dsl::status.eq(status.as_str()));
        }

        if let Some(campaign_type) = params.campaign_type {
            query = query.filter(dsl::campaign_type.eq(campaign_type.as_str()));
            count_query = count_query.filter(dsl::campaign_type.eq(campaign_type.as_str()));
        }

        let total = count_query.count().get_result::<i64>(&mut conn).await?;

        query = match (params.sort_by, params.sort_order) {
            (CampaignSortBy::CreatedAt, SortOrder::Asc) => query.order(dsl::created_at.asc()),
            (CampaignSortBy::CreatedAt, SortOrder::Desc) => query.order(dsl::created_at.desc()),
            (CampaignSortBy::Name, SortOrder::Asc) => query.order(dsl::name.asc()),
            (CampaignSortBy::Name, SortOrder::Desc) => query.order(dsl::name.desc()),
            (CampaignSortBy::StartDate, SortOrder::Asc) => {
                query.order(dsl::start_date.asc().nulls_last())
            },
            (CampaignSortBy::StartDate, SortOrder::Desc) => {
                query.order(dsl::start_date.desc().nulls_last())
            },
        };

        let campaigns = query
            .then_order_by(dsl::id.asc())
            .limit(params.limit)
            .offset(params.offset())
            .load(&mut conn)
            .await?;

        Ok((campaigns, Pagination::new(params.page, params.limit, total)))
    }

    #[instrument(skip(self, user, request), fields(workspace_id = %user.workspace_id))]
    pub async fn create_campaign(
        &self,
        user: &AuthenticatedUser,
        request: CreateCampaignRequest,
    ) -> Result<Campaign, ServiceError> {
        use crate::schema::campaigns::dsl;

        request.validate_dates().map_err(ServiceError::ValidationError)?;

        let new_campaign = NewCampaign {
            workspace_id: user.workspace_id,
            name: request.name.trim().to_string(),
            description: trim_optional_field(request.description.as_ref()),
            campaign_type: request.campaign_type.as_str().to_string(),
            objective: request.objective.map(|o| o.as_str().to_string()),
            status: request
                .status
                .unwrap_or(CampaignStatus::Draft)
                .as_str()
                .to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
        };

        let mut conn = self.diesel_pool.get().await?;
        let campaign = diesel::insert_into(dsl::campaigns)
            .values(&new_campaign)
            .returning(Campaign::as_returning())
            .get_result(&mut conn)
            .await?;

        info!(campaign_id = %campaign.id, "Campaign created");
        AuditLogger::log_action(
            AuditAction::CampaignCreated,
            user.user_id,
            Some(user.workspace_id),
            Some(campaign.id.to_string()),
            Some(campaign.name.clone()),
        );

        Ok(campaign)
    }

    /// Campaign with its steps and targets; empty lists are valid
    #[instrument(skip(self))]
    pub async fn get_campaign_detail(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<CampaignDetail, ServiceError> {
        use crate::schema::{campaign_steps, campaign_targets};

        let mut conn = self.diesel_pool.get().await?;
        let campaign = Campaign::find_in_workspace(&mut conn, workspace_id, campaign_id)
            .await?
            .ok_or_else(|| campaign_not_found(campaign_id))?;

        let steps = CampaignStep::belonging_to(&campaign)
            .order(campaign_steps::step_number.asc())
            .select(CampaignStep::as_select())
            .load(&mut conn)
            .await?;

        let targets = CampaignTarget::belonging_to(&campaign)
            .order(campaign_targets::created_at.asc())
            .select(CampaignTarget::as_select())
            .load(&mut conn)
            .await?;

        Ok(CampaignDetail::new(campaign, steps, targets))
    }

    #[instrument(skip(self, user), fields(workspace_id = %user.workspace_id))]
    pub async fn update_status(
        &self,
        user: &AuthenticatedUser,
        campaign_id: Uuid,
        next: CampaignStatus,
    ) -> Result<Campaign, ServiceError> {
        use crate::schema::campaigns::dsl;

        let mut conn = self.diesel_pool.get().await?;
        let campaign = Campaign::find_in_workspace(&mut conn, user.workspace_id, campaign_id)
            .await?
            .ok_or_else(|| campaign_not_found(campaign_id))?;

        let current = campaign.current_status().ok_or_else(|| {
            ServiceError::InternalError(format!("Unknown campaign status '{}'", campaign.status))
        })?;
        check_transition(current, next)?;

        // Guard on the old status so a concurrent change is not overwritten
        let updated = diesel::update(
            dsl::campaigns
                .filter(dsl::id.eq(campaign_id))
                .filter(dsl::status.eq(current.as_str())),
        )
        .set((dsl::status.eq(next.as_str()), dsl::updated_at.eq(Utc::now())))
        .returning(Campaign::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| {
            ServiceError::Conflict("Campaign status changed concurrently".to_string())
        })?;

        info!(%campaign_id, from = current.as_str(), to = next.as_str(), "Campaign status changed");
        AuditLogger::log_action(
            AuditAction::CampaignStatusChanged,
            user.user_id,
            Some(user.workspace_id),
            Some(campaign_id.to_string()),
            Some(format!("{} -> {}", current.as_str(), next.as_str())),
        );

        Ok(updated)
    }

    // =========================================================================
    // STEPS
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn list_steps(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Vec<CampaignStep>, ServiceError> {
        use crate::schema::campaign_steps::dsl;

        let mut conn = self.diesel_pool.get().await?;
        let campaign = Campaign::find_in_workspace(&mut conn, workspace_id, campaign_id)
            .await?
            .ok_or_else(|| campaign_not_found(campaign_id))?;

        Ok(CampaignStep::belonging_to(&campaign)
            .order((dsl::step_number.asc(), dsl::created_at.asc()))
            .select(CampaignStep::as_select())
            .load(&mut conn)
            .await?)
    }

    #[instrument(skip(self, user, request), fields(workspace_id = %user.workspace_id))]
    pub async fn create_step(
        &self,
        user: &AuthenticatedUser,
        campaign_id: Uuid,
        request: CreateCampaignStepRequest,
    ) -> Result<CampaignStep, ServiceError> {
        use crate::schema::campaign_steps::dsl;

        let mut conn = self.diesel_pool.get().await?;
        Campaign::find_in_workspace(&mut conn, user.workspace_id, campaign_id)
            .await?
            .ok_or_else(|| campaign_not_found(campaign_id))?;

        let new_step = NewCampaignStep {
            workspace_id: user.workspace_id,
            campaign_id,
            step_number: request.step_number,
            template_id: request.template_id,
            wait_after_ms: request.wait_after_ms,
            condition: serde_json::Value::Object(request.condition.unwrap_or_default()),
            branch_label: trim_optional_field(request.branch_label.as_ref()),
        };

        let step = diesel::insert_into(dsl::campaign_steps)
            .values(&new_step)
            .returning(CampaignStep::as_returning())
            .get_result(&mut conn)
            .await?;

        AuditLogger::log_action(
            AuditAction::CampaignStepCreated,
            user.user_id,
            Some(user.workspace_id),
            Some(step.id.to_string()),
            Some(format!("campaign {} step {}", campaign_id, step.step_number)),
        );

        Ok(step)
    }

    // =========================================================================
    // TARGETS
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn list_targets(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Vec<CampaignTarget>, ServiceError> {
        use crate::schema::campaign_targets::dsl;

        let mut conn = self.diesel_pool.get().await?;
        let campaign = Campaign::find_in_workspace(&mut conn, workspace_id, campaign_id)
            .await?
            .ok_or_else(|| campaign_not_found(campaign_id))?;

        Ok(CampaignTarget::belonging_to(&campaign)
            .order(dsl::created_at.asc())
            .select(CampaignTarget::as_select())
            .load(&mut conn)
            .await?)
    }

    /// Add a lead as a target and bump the campaign's targeted counter
    #[instrument(skip(self, user, request), fields(workspace_id = %user.workspace_id))]
    pub async fn add_target(
        &self,
        user: &AuthenticatedUser,
        campaign_id: Uuid,
        request: AddCampaignTargetRequest,
    ) -> Result<CampaignTarget, ServiceError> {
        let workspace_id = user.workspace_id;
        let lead_id = request.lead_id;
        let mut conn = self.diesel_pool.get().await?;

        let target = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    use crate::schema::campaign_targets::dsl as target_dsl;
                    use crate::schema::campaigns::dsl;

                    Campaign::find_in_workspace(conn, workspace_id, campaign_id)
                        .await?
                        .ok_or_else(|| campaign_not_found(campaign_id))?;

                    Lead::find_in_workspace(conn, workspace_id, lead_id)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Lead with ID {} not found", lead_id))
                        })?;

                    let target = diesel::insert_into(target_dsl::campaign_targets)
                        .values(&NewCampaignTarget {
                            workspace_id,
                            campaign_id,
                            lead_id,
                            state: TargetState::Pending.as_str().to_string(),
                            next_step_number: 1,
                        })
                        .returning(CampaignTarget::as_returning())
                        .get_result(conn)
                        .await?;

                    diesel::update(dsl::campaigns.find(campaign_id))
                        .set((
                            dsl::total_targeted.eq(dsl::total_targeted + 1),
                            dsl::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(target)
                })
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::CampaignTargetAdded,
            user.user_id,
            Some(workspace_id),
            Some(target.id.to_string()),
            Some(format!("campaign {} lead {}", campaign_id, lead_id)),
        );

        Ok(target)
    }

    /// Step runs for a campaign, newest first
    #[instrument(skip(self))]
    pub async fn list_runs(
        &self,
        workspace_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<Vec<CampaignStepRun>, ServiceError> {
        use crate::schema::campaign_step_runs::dsl;

        let mut conn = self.diesel_pool.get().await?;
        Campaign::find_in_workspace(&mut conn, workspace_id, campaign_id)
            .await?
            .ok_or_else(|| campaign_not_found(campaign_id))?;

        Ok(dsl::campaign_step_runs
            .filter(dsl::campaign_id.eq(campaign_id))
            .filter(dsl::workspace_id.eq(workspace_id))
            .order(dsl::created_at.desc())
            .select(CampaignStepRun::as_select())
            .load(&mut conn)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transition_passes() {
        assert!(check_transition(CampaignStatus::Draft, CampaignStatus::Active).is_ok());
        assert!(check_transition(CampaignStatus::Paused, CampaignStatus::Active).is_ok());
    }

    #[test]
    fn test_illegal_transition_is_conflict() {
        let err = check_transition(CampaignStatus::Draft, CampaignStatus::Completed).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Cannot change campaign status from draft to completed");
    }

    #[test]
    fn test_terminal_status_message() {
        let err = check_transition(CampaignStatus::Cancelled, CampaignStatus::Active).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(err.to_string().contains("cancelled"));
    }
}
