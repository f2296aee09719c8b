// Pipeline and status endpoints

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::pipeline::{
        CreatePipelineRequest, CreateStatusRequest, MoveStatusRequest, Pipeline, PipelineStatus,
        PipelineWithStatuses, ReorderStatusesRequest, UpdatePipelineRequest, UpdateStatusRequest,
    },
    services::pipeline::PipelineService,
    utils::validation::ValidatedJson,
};

// =============================================================================
// PIPELINES
// =============================================================================

/// List the workspace's pipelines with their statuses
#[utoipa::path(
    get,
    path = "/api/pipelines",
    tag = "Pipelines",
    operation_id = "listPipelines",
    responses(
        (status = 200, description = "Pipelines ordered by display order", body = [PipelineWithStatuses]),
        (status = 401, description = "Unauthorized - invalid or missing token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_pipelines(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .list_pipelines(auth_user.workspace_id)
        .await
    {
        Ok(pipelines) => Json(pipelines).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/pipelines",
    tag = "Pipelines",
    operation_id = "createPipeline",
    request_body = CreatePipelineRequest,
    responses(
        (status = 201, description = "Pipeline created", body = PipelineWithStatuses),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 409, description = "Conflict - concurrent default change")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_pipeline(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<CreatePipelineRequest>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .create_pipeline(&auth_user, request)
        .await
    {
        Ok(pipeline) => (StatusCode::CREATED, Json(pipeline)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/pipelines/default",
    tag = "Pipelines",
    operation_id = "getDefaultPipeline",
    responses(
        (status = 200, description = "The workspace default pipeline", body = PipelineWithStatuses),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "No default pipeline found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_default_pipeline(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .get_default_pipeline(auth_user.workspace_id)
        .await
    {
        Ok(pipeline) => Json(pipeline).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/pipelines/{id}",
    tag = "Pipelines",
    operation_id = "getPipeline",
    params(("id" = i32, Path, description = "Pipeline ID")),
    responses(
        (status = 200, description = "Pipeline with statuses", body = PipelineWithStatuses),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_pipeline(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(pipeline_id): Path<i32>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .get_pipeline(auth_user.workspace_id, pipeline_id)
        .await
    {
        Ok(pipeline) => Json(pipeline).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/pipelines/{id}",
    tag = "Pipelines",
    operation_id = "updatePipeline",
    params(("id" = i32, Path, description = "Pipeline ID")),
    request_body = UpdatePipelineRequest,
    responses(
        (status = 200, description = "Pipeline updated", body = Pipeline),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_pipeline(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(pipeline_id): Path<i32>,
    ValidatedJson(request): ValidatedJson<UpdatePipelineRequest>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .update_pipeline(&auth_user, pipeline_id, request)
        .await
    {
        Ok(pipeline) => Json(pipeline).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/pipelines/{id}",
    tag = "Pipelines",
    operation_id = "deletePipeline",
    params(("id" = i32, Path, description = "Pipeline ID")),
    responses(
        (status = 204, description = "Pipeline deleted"),
        (status = 400, description = "Default pipeline or pipeline still holding leads"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(pipeline_id): Path<i32>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .delete_pipeline(&auth_user, pipeline_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// STATUSES
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/pipelines/{id}/statuses",
    tag = "Pipelines",
    operation_id = "createPipelineStatus",
    params(("id" = i32, Path, description = "Pipeline ID")),
    request_body = CreateStatusRequest,
    responses(
        (status = 201, description = "Status created", body = PipelineStatus),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(pipeline_id): Path<i32>,
    ValidatedJson(request): ValidatedJson<CreateStatusRequest>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .create_status(&auth_user, pipeline_id, request)
        .await
    {
        Ok(status) => (StatusCode::CREATED, Json(status)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/pipelines/{id}/statuses/{status_id}",
    tag = "Pipelines",
    operation_id = "updatePipelineStatus",
    params(
        ("id" = i32, Path, description = "Pipeline ID"),
        ("status_id" = i32, Path, description = "Status ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = PipelineStatus),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline or status not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path((pipeline_id, status_id)): Path<(i32, i32)>,
    ValidatedJson(request): ValidatedJson<UpdateStatusRequest>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .update_status(&auth_user, pipeline_id, status_id, request)
        .await
    {
        Ok(status) => Json(status).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/pipelines/{id}/statuses/{status_id}",
    tag = "Pipelines",
    operation_id = "deletePipelineStatus",
    params(
        ("id" = i32, Path, description = "Pipeline ID"),
        ("status_id" = i32, Path, description = "Status ID")
    ),
    responses(
        (status = 204, description = "Status deleted"),
        (status = 400, description = "Status still holds leads"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline or status not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path((pipeline_id, status_id)): Path<(i32, i32)>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .delete_status(&auth_user, pipeline_id, status_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Persist a complete status order
#[utoipa::path(
    put,
    path = "/api/pipelines/{id}/statuses/order",
    tag = "Pipelines",
    operation_id = "reorderPipelineStatuses",
    params(("id" = i32, Path, description = "Pipeline ID")),
    request_body = ReorderStatusesRequest,
    responses(
        (status = 204, description = "Order saved"),
        (status = 400, description = "IDs do not match the pipeline's statuses"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reorder_statuses(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(pipeline_id): Path<i32>,
    ValidatedJson(request): ValidatedJson<ReorderStatusesRequest>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .reorder_statuses(&auth_user, pipeline_id, request.status_ids)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Drop one status onto another's position and return the new order
#[utoipa::path(
    post,
    path = "/api/pipelines/{id}/statuses/move",
    tag = "Pipelines",
    operation_id = "movePipelineStatus",
    params(("id" = i32, Path, description = "Pipeline ID")),
    request_body = MoveStatusRequest,
    responses(
        (status = 200, description = "Statuses in their new order", body = [PipelineStatus]),
        (status = 400, description = "Unknown source or target status"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Pipeline not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn move_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(pipeline_id): Path<i32>,
    ValidatedJson(request): ValidatedJson<MoveStatusRequest>,
) -> impl IntoResponse {
    match PipelineService::new(&state)
        .move_status(
            &auth_user,
            pipeline_id,
            request.source_status_id,
            request.target_status_id,
        )
        .await
    {
        Ok(statuses) => Json(statuses).into_response(),
        Err(e) => e.into_response(),
    }
}
