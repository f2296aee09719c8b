// Campaign endpoints, including step enqueue to the workflow runner

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::campaign::{
        AddCampaignTargetRequest, Campaign, CampaignDetail, CampaignEnvelope,
        CampaignListResponse, CampaignStep, CampaignStepRun, CampaignTarget,
        CreateCampaignRequest, CreateCampaignStepRequest, EnqueueStepRequest,
        ListCampaignsQuery, UpdateCampaignStatusRequest,
    },
    services::{campaign::CampaignService, dispatch::DispatchOutcome},
    utils::validation::{ValidatedJson, ValidatedQuery},
};

// =============================================================================
// CAMPAIGNS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/campaigns",
    tag = "Campaigns",
    operation_id = "listCampaigns",
    params(ListCampaignsQuery),
    responses(
        (status = 200, description = "One page of campaigns", body = CampaignListResponse),
        (status = 400, description = "Bad request - invalid query"),
        (status = 401, description = "Unauthorized - invalid or missing token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedQuery(query): ValidatedQuery<ListCampaignsQuery>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .list_campaigns(auth_user.workspace_id, &query)
        .await
    {
        Ok((data, pagination)) => Json(CampaignListResponse {
            success: true,
            data,
            pagination,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/campaigns",
    tag = "Campaigns",
    operation_id = "createCampaign",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created, wrapped in {success, data}", body = Campaign),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<CreateCampaignRequest>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .create_campaign(&auth_user, request)
        .await
    {
        Ok(campaign) => (StatusCode::CREATED, Json(CampaignEnvelope::ok(campaign))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/campaigns/{id}",
    tag = "Campaigns",
    operation_id = "getCampaign",
    params(("id" = Uuid, Path, description = "Campaign ID (UUID)")),
    responses(
        (status = 200, description = "Campaign with steps and targets, wrapped in {success, data}", body = CampaignDetail),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Campaign not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_campaign(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .get_campaign_detail(auth_user.workspace_id, campaign_id)
        .await
    {
        Ok(detail) => Json(CampaignEnvelope::ok(detail)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/campaigns/{id}/status",
    tag = "Campaigns",
    operation_id = "updateCampaignStatus",
    params(("id" = Uuid, Path, description = "Campaign ID (UUID)")),
    request_body = UpdateCampaignStatusRequest,
    responses(
        (status = 200, description = "Status changed, wrapped in {success, data}", body = Campaign),
        (status = 400, description = "Bad request - unknown status"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Campaign not found"),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_campaign_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCampaignStatusRequest>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .update_status(&auth_user, campaign_id, request.status)
        .await
    {
        Ok(campaign) => Json(CampaignEnvelope::ok(campaign)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// STEPS, TARGETS, RUNS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/campaigns/{id}/steps",
    tag = "Campaigns",
    operation_id = "listCampaignSteps",
    params(("id" = Uuid, Path, description = "Campaign ID (UUID)")),
    responses(
        (status = 200, description = "Steps by step number, wrapped in {success, data}", body = [CampaignStep]),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Campaign not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_steps(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .list_steps(auth_user.workspace_id, campaign_id)
        .await
    {
        Ok(steps) => Json(CampaignEnvelope::ok(steps)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/campaigns/{id}/steps",
    tag = "Campaigns",
    operation_id = "createCampaignStep",
    params(("id" = Uuid, Path, description = "Campaign ID (UUID)")),
    request_body = CreateCampaignStepRequest,
    responses(
        (status = 201, description = "Step created, wrapped in {success, data}", body = CampaignStep),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Campaign not found"),
        (status = 409, description = "Step number already used")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_step(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateCampaignStepRequest>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .create_step(&auth_user, campaign_id, request)
        .await
    {
        Ok(step) => (StatusCode::CREATED, Json(CampaignEnvelope::ok(step))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/campaigns/{id}/targets",
    tag = "Campaigns",
    operation_id = "listCampaignTargets",
    params(("id" = Uuid, Path, description = "Campaign ID (UUID)")),
    responses(
        (status = 200, description = "Targets, wrapped in {success, data}", body = [CampaignTarget]),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Campaign not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_targets(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .list_targets(auth_user.workspace_id, campaign_id)
        .await
    {
        Ok(targets) => Json(CampaignEnvelope::ok(targets)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/campaigns/{id}/targets",
    tag = "Campaigns",
    operation_id = "addCampaignTarget",
    params(("id" = Uuid, Path, description = "Campaign ID (UUID)")),
    request_body = AddCampaignTargetRequest,
    responses(
        (status = 201, description = "Lead targeted, wrapped in {success, data}", body = CampaignTarget),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Campaign or lead not found"),
        (status = 409, description = "Lead already targeted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_target(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AddCampaignTargetRequest>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .add_target(&auth_user, campaign_id, request)
        .await
    {
        Ok(target) => (StatusCode::CREATED, Json(CampaignEnvelope::ok(target))).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/campaigns/{id}/runs",
    tag = "Campaigns",
    operation_id = "listCampaignRuns",
    params(("id" = Uuid, Path, description = "Campaign ID (UUID)")),
    responses(
        (status = 200, description = "Step runs, newest first, wrapped in {success, data}", body = [CampaignStepRun]),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Campaign not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_runs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
) -> impl IntoResponse {
    match CampaignService::new(&state)
        .list_runs(auth_user.workspace_id, campaign_id)
        .await
    {
        Ok(runs) => Json(CampaignEnvelope::ok(runs)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// ENQUEUE
// =============================================================================

/// Queue a step for a target and hand it to the workflow runner.
/// The run is stored even when delivery fails; that case answers 202.
#[utoipa::path(
    post,
    path = "/api/campaigns/{id}/enqueue",
    tag = "Campaigns",
    operation_id = "enqueueCampaignStep",
    params(("id" = Uuid, Path, description = "Campaign ID (UUID)")),
    request_body = EnqueueStepRequest,
    responses(
        (status = 201, description = "Step run stored and delivered: {success, data: {stepRun, n8n}}"),
        (status = 202, description = "Step run stored, delivery failed: {success, data, warning}", body = CampaignStepRun),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Campaign not found"),
        (status = 500, description = "Webhook not configured")
    ),
    security(("bearerAuth" = []))
)]
pub async fn enqueue_step(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(campaign_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<EnqueueStepRequest>,
) -> impl IntoResponse {
    let outcome = state
        .campaign_dispatcher
        .enqueue(
            auth_user.workspace_id,
            auth_user.user_id,
            campaign_id,
            request,
        )
        .await;

    match outcome {
        Ok(DispatchOutcome::Delivered { step_run, n8n }) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "data": { "stepRun": step_run, "n8n": n8n }
            })),
        )
            .into_response(),
        Ok(DispatchOutcome::Undelivered { step_run, warning }) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "data": step_run,
                "warning": warning
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
