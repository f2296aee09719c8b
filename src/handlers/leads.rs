// Lead endpoints

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::lead::{
        CreateLeadRequest, LeadListResponse, LeadPipelineUpdateResponse, LeadView, ListLeadsQuery,
        UpdateLeadPipelineRequest,
    },
    services::lead::{LeadService, LEAD_PIPELINE_UPDATED_MESSAGE},
    utils::validation::{ValidatedJson, ValidatedQuery},
};

#[utoipa::path(
    get,
    path = "/api/leads",
    tag = "Leads",
    operation_id = "listLeads",
    params(ListLeadsQuery),
    responses(
        (status = 200, description = "One page of leads", body = LeadListResponse),
        (status = 400, description = "Bad request - invalid query"),
        (status = 401, description = "Unauthorized - invalid or missing token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_leads(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedQuery(query): ValidatedQuery<ListLeadsQuery>,
) -> impl IntoResponse {
    match LeadService::new(&state)
        .list_leads(auth_user.workspace_id, &query)
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    operation_id = "createLead",
    request_body = CreateLeadRequest,
    responses(
        (status = 201, description = "Lead created", body = LeadView),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline or status not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_lead(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<CreateLeadRequest>,
) -> impl IntoResponse {
    match LeadService::new(&state).create_lead(&auth_user, request).await {
        Ok(lead) => (StatusCode::CREATED, Json(lead)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    operation_id = "getLead",
    params(("id" = Uuid, Path, description = "Lead ID (UUID)")),
    responses(
        (status = 200, description = "Lead with its status name", body = LeadView),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Lead not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_lead(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(lead_id): Path<Uuid>,
) -> impl IntoResponse {
    match LeadService::new(&state)
        .get_lead(auth_user.workspace_id, lead_id)
        .await
    {
        Ok(lead) => Json(lead).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Move a lead to a pipeline and status
#[utoipa::path(
    put,
    path = "/api/leads/{id}/pipeline",
    tag = "Leads",
    operation_id = "updateLeadPipeline",
    params(("id" = Uuid, Path, description = "Lead ID (UUID)")),
    request_body = UpdateLeadPipelineRequest,
    responses(
        (status = 200, description = "Lead moved", body = LeadPipelineUpdateResponse),
        (status = 400, description = "Invalid IDs or status outside the pipeline"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Lead, pipeline or status not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_lead_pipeline(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(lead_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateLeadPipelineRequest>,
) -> impl IntoResponse {
    match LeadService::new(&state)
        .update_lead_pipeline(&auth_user, lead_id, request)
        .await
    {
        Ok(lead) => Json(LeadPipelineUpdateResponse {
            message: LEAD_PIPELINE_UPDATED_MESSAGE.to_string(),
            lead,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}
