// Pipeline and status management
// Ordering, drag-and-drop reorder, and the single-default invariant

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::AuthenticatedUser,
    models::{
        lead::Lead,
        pipeline::{
            CreatePipelineRequest, CreateStatusRequest, NewPipeline, NewPipelineStatus, Pipeline,
            PipelineStatus, PipelineWithStatuses, UpdatePipelineRequest, UpdateStatusRequest,
        },
    },
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::ServiceError,
        trim_optional_field,
    },
};

// =============================================================================
// REORDER
// =============================================================================

/// Move `dragged` to the position currently held by `target`.
///
/// The dragged item is removed first and then inserted at the target's
/// original index, so dragging downwards lands after the target and dragging
/// upwards lands before it. Returns `None` when either id is missing.
pub fn reorder_after_drag<T: PartialEq + Copy>(order: &[T], dragged: T, target: T) -> Option<Vec<T>> {
    let from = order.iter().position(|id| *id == dragged)?;
    let to = order.iter().position(|id| *id == target)?;

    let mut reordered = order.to_vec();
    if from == to {
        return Some(reordered);
    }

    let item = reordered.remove(from);
    reordered.insert(to, item);
    Some(reordered)
}

/// True when `proposed` is a permutation of `current`
fn is_same_status_set(current: &[i32], proposed: &[i32]) -> bool {
    let mut a = current.to_vec();
    let mut b = proposed.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

fn pipeline_not_found(pipeline_id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Pipeline with ID {} not found", pipeline_id))
}

fn status_not_found(status_id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Status with ID {} not found", status_id))
}

// =============================================================================
// PIPELINE SERVICE
// =============================================================================

pub struct PipelineService {
    diesel_pool: DieselPool,
}

impl PipelineService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
        }
    }

    /// All workspace pipelines with their ordered statuses
    #[instrument(skip(self))]
    pub async fn list_pipelines(
        &self,
        workspace_id: Uuid,
    ) -> Result<Vec<PipelineWithStatuses>, ServiceError> {
        use crate::schema::pipeline_statuses::dsl as status_dsl;
        use crate::schema::pipelines::dsl;

        let mut conn = self.diesel_pool.get().await?;

        let pipelines = dsl::pipelines
            .filter(dsl::workspace_id.eq(workspace_id))
            .order((dsl::display_order.asc(), dsl::id.asc()))
            .select(Pipeline::as_select())
            .load(&mut conn)
            .await?;

        let statuses = PipelineStatus::belonging_to(&pipelines)
            .order((status_dsl::display_order.asc(), status_dsl::id.asc()))
            .select(PipelineStatus::as_select())
            .load(&mut conn)
            .await?;

        Ok(statuses
            .grouped_by(&pipelines)
            .into_iter()
            .zip(pipelines)
            .map(|(pipeline_statuses, pipeline)| PipelineWithStatuses {
                pipeline,
                pipeline_statuses,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_pipeline(
        &self,
        workspace_id: Uuid,
        pipeline_id: i32,
    ) -> Result<PipelineWithStatuses, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        let pipeline = Pipeline::find_in_workspace(&mut conn, workspace_id, pipeline_id)
            .await?
            .ok_or_else(|| pipeline_not_found(pipeline_id))?;
        let pipeline_statuses = pipeline.statuses(&mut conn).await?;

        Ok(PipelineWithStatuses {
            pipeline,
            pipeline_statuses,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_default_pipeline(
        &self,
        workspace_id: Uuid,
    ) -> Result<PipelineWithStatuses, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        let pipeline = Pipeline::find_default(&mut conn, workspace_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No default pipeline found".to_string()))?;
        let pipeline_statuses = pipeline.statuses(&mut conn).await?;

        Ok(PipelineWithStatuses {
            pipeline,
            pipeline_statuses,
        })
    }

    /// Create a pipeline and its initial statuses in one transaction
    #[instrument(skip(self, user, request), fields(workspace_id = %user.workspace_id))]
    pub async fn create_pipeline(
        &self,
        user: &AuthenticatedUser,
        request: CreatePipelineRequest,
    ) -> Result<PipelineWithStatuses, ServiceError> {
        if request.statuses.iter().filter(|s| s.is_default).count() > 1 {
            return Err(ServiceError::ValidationError(
                "Only one status can be the default".to_string(),
            ));
        }

        let workspace_id = user.workspace_id;
        let mut conn = self.diesel_pool.get().await?;

        let created = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    use crate::schema::pipelines::dsl;

                    if request.is_default {
                        clear_default_pipeline(conn, workspace_id, None).await?;
                    }

                    let display_order = match request.display_order {
                        Some(order) => order,
                        None => next_pipeline_order(conn, workspace_id).await?,
                    };

                    let pipeline = diesel::insert_into(dsl::pipelines)
                        .values(&NewPipeline {
                            workspace_id,
                            name: request.name.trim().to_string(),
                            description: trim_optional_field(request.description.as_ref()),
                            lead_type: trim_optional_field(request.lead_type.as_ref()),
                            is_default: request.is_default,
                            display_order,
                        })
                        .returning(Pipeline::as_returning())
                        .get_result(conn)
                        .await?;

                    let mut pipeline_statuses = Vec::with_capacity(request.statuses.len());
                    for (index, status) in request.statuses.into_iter().enumerate() {
                        let order = status.display_order.unwrap_or(index as i32 + 1);
                        let new_status = new_status_row(&pipeline, status, order);
                        pipeline_statuses.push(insert_status(conn, &new_status).await?);
                    }

                    Ok(PipelineWithStatuses {
                        pipeline,
                        pipeline_statuses,
                    })
                })
            })
            .await?;

        info!(pipeline_id = created.pipeline.id, "Pipeline created");
        AuditLogger::log_action(
            AuditAction::PipelineCreated,
            user.user_id,
            Some(workspace_id),
            Some(created.pipeline.id.to_string()),
            Some(created.pipeline.name.clone()),
        );

        Ok(created)
    }

    /// Update a pipeline; setting it as default clears the previous default
    #[instrument(skip(self, user, request), fields(workspace_id = %user.workspace_id))]
    pub async fn update_pipeline(
        &self,
        user: &AuthenticatedUser,
        pipeline_id: i32,
        request: UpdatePipelineRequest,
    ) -> Result<Pipeline, ServiceError> {
        let workspace_id = user.workspace_id;
        let make_default = request.is_default == Some(true);
        let changeset = request.into_changeset(Utc::now());
        let mut conn = self.diesel_pool.get().await?;

        let updated = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    use crate::schema::pipelines::dsl;

                    Pipeline::find_in_workspace(conn, workspace_id, pipeline_id)
                        .await?
                        .ok_or_else(|| pipeline_not_found(pipeline_id))?;

                    if make_default {
                        clear_default_pipeline(conn, workspace_id, Some(pipeline_id)).await?;
                    }

                    let pipeline = diesel::update(dsl::pipelines.find(pipeline_id))
                        .set(&changeset)
                        .returning(Pipeline::as_returning())
                        .get_result(conn)
                        .await?;

                    Ok(pipeline)
                })
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::PipelineUpdated,
            user.user_id,
            Some(workspace_id),
            Some(pipeline_id.to_string()),
            make_default.then(|| "set as default".to_string()),
        );

        Ok(updated)
    }

    /// Delete a pipeline that is neither the default nor holding leads
    #[instrument(skip(self, user), fields(workspace_id = %user.workspace_id))]
    pub async fn delete_pipeline(
        &self,
        user: &AuthenticatedUser,
        pipeline_id: i32,
    ) -> Result<(), ServiceError> {
        use crate::schema::pipelines::dsl;

        let mut conn = self.diesel_pool.get().await?;
        let pipeline = Pipeline::find_in_workspace(&mut conn, user.workspace_id, pipeline_id)
            .await?
            .ok_or_else(|| pipeline_not_found(pipeline_id))?;

        if pipeline.is_default {
            return Err(ServiceError::BadRequest(
                "Cannot delete the default pipeline. Set another pipeline as default first."
                    .to_string(),
            ));
        }

        let lead_count = Lead::count_in_pipeline(&mut conn, pipeline_id).await?;
        if lead_count > 0 {
            return Err(ServiceError::BadRequest(format!(
                "Cannot delete pipeline with {} leads. Reassign leads first.",
                lead_count
            )));
        }

        diesel::delete(dsl::pipelines.find(pipeline_id))
            .execute(&mut conn)
            .await?;

        info!(pipeline_id, "Pipeline deleted");
        AuditLogger::log_action(
            AuditAction::PipelineDeleted,
            user.user_id,
            Some(user.workspace_id),
            Some(pipeline_id.to_string()),
            Some(pipeline.name),
        );

        Ok(())
    }

    // =========================================================================
    // STATUSES
    // =========================================================================

    #[instrument(skip(self, user, request), fields(workspace_id = %user.workspace_id))]
    pub async fn create_status(
        &self,
        user: &AuthenticatedUser,
        pipeline_id: i32,
        request: CreateStatusRequest,
    ) -> Result<PipelineStatus, ServiceError> {
        let workspace_id = user.workspace_id;
        let mut conn = self.diesel_pool.get().await?;

        let status = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    let pipeline = Pipeline::find_in_workspace(conn, workspace_id, pipeline_id)
                        .await?
                        .ok_or_else(|| pipeline_not_found(pipeline_id))?;

                    if request.is_default {
                        clear_default_status(conn, pipeline_id, None).await?;
                    }

                    let order = match request.display_order {
                        Some(order) => order,
                        None => next_status_order(conn, pipeline_id).await?,
                    };

                    let new_status = new_status_row(&pipeline, request, order);
                    Ok(insert_status(conn, &new_status).await?)
                })
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::StatusCreated,
            user.user_id,
            Some(workspace_id),
            Some(status.id.to_string()),
            Some(format!("pipeline {}", pipeline_id)),
        );

        Ok(status)
    }

    #[instrument(skip(self, user, request), fields(workspace_id = %user.workspace_id))]
    pub async fn update_status(
        &self,
        user: &AuthenticatedUser,
        pipeline_id: i32,
        status_id: i32,
        request: UpdateStatusRequest,
    ) -> Result<PipelineStatus, ServiceError> {
        let workspace_id = user.workspace_id;
        let make_default = request.is_default == Some(true);
        let changeset = request.into_changeset(Utc::now());
        let mut conn = self.diesel_pool.get().await?;

        let status = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    use crate::schema::pipeline_statuses::dsl;

                    find_status_in_pipeline(conn, workspace_id, pipeline_id, status_id).await?;

                    if make_default {
                        clear_default_status(conn, pipeline_id, Some(status_id)).await?;
                    }

                    let status = diesel::update(dsl::pipeline_statuses.find(status_id))
                        .set(&changeset)
                        .returning(PipelineStatus::as_returning())
                        .get_result(conn)
                        .await?;

                    Ok(status)
                })
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::StatusUpdated,
            user.user_id,
            Some(workspace_id),
            Some(status_id.to_string()),
            None,
        );

        Ok(status)
    }

    #[instrument(skip(self, user), fields(workspace_id = %user.workspace_id))]
    pub async fn delete_status(
        &self,
        user: &AuthenticatedUser,
        pipeline_id: i32,
        status_id: i32,
    ) -> Result<(), ServiceError> {
        use crate::schema::pipeline_statuses::dsl;

        let mut conn = self.diesel_pool.get().await?;
        find_status_in_pipeline(&mut conn, user.workspace_id, pipeline_id, status_id).await?;

        let lead_count = Lead::count_at_status(&mut conn, status_id).await?;
        if lead_count > 0 {
            return Err(ServiceError::BadRequest(format!(
                "Cannot delete status with {} leads. Move leads first.",
                lead_count
            )));
        }

        diesel::delete(dsl::pipeline_statuses.find(status_id))
            .execute(&mut conn)
            .await?;

        AuditLogger::log_action(
            AuditAction::StatusDeleted,
            user.user_id,
            Some(user.workspace_id),
            Some(status_id.to_string()),
            Some(format!("pipeline {}", pipeline_id)),
        );

        Ok(())
    }

    /// Persist a complete status order; positions become 1..n
    #[instrument(skip(self, user, status_ids), fields(workspace_id = %user.workspace_id))]
    pub async fn reorder_statuses(
        &self,
        user: &AuthenticatedUser,
        pipeline_id: i32,
        status_ids: Vec<i32>,
    ) -> Result<(), ServiceError> {
        let workspace_id = user.workspace_id;
        let mut conn = self.diesel_pool.get().await?;

        conn.build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    Pipeline::find_in_workspace(conn, workspace_id, pipeline_id)
                        .await?
                        .ok_or_else(|| pipeline_not_found(pipeline_id))?;

                    let current: Vec<i32> = PipelineStatus::list_for_pipeline(conn, pipeline_id)
                        .await?
                        .iter()
                        .map(|s| s.id)
                        .collect();

                    if !is_same_status_set(&current, &status_ids) {
                        return Err(ServiceError::BadRequest(format!(
                            "Status IDs must match the statuses of pipeline {}",
                            pipeline_id
                        )));
                    }

                    persist_status_order(conn, &status_ids).await
                })
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::StatusesReordered,
            user.user_id,
            Some(workspace_id),
            Some(pipeline_id.to_string()),
            None,
        );

        Ok(())
    }

    /// Apply a drag of one status onto another and return the new order
    #[instrument(skip(self, user), fields(workspace_id = %user.workspace_id))]
    pub async fn move_status(
        &self,
        user: &AuthenticatedUser,
        pipeline_id: i32,
        source_status_id: i32,
        target_status_id: i32,
    ) -> Result<Vec<PipelineStatus>, ServiceError> {
        let workspace_id = user.workspace_id;
        let mut conn = self.diesel_pool.get().await?;

        let statuses = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    Pipeline::find_in_workspace(conn, workspace_id, pipeline_id)
                        .await?
                        .ok_or_else(|| pipeline_not_found(pipeline_id))?;

                    let current: Vec<i32> = PipelineStatus::list_for_pipeline(conn, pipeline_id)
                        .await?
                        .iter()
                        .map(|s| s.id)
                        .collect();

                    let reordered =
                        reorder_after_drag(&current, source_status_id, target_status_id)
                            .ok_or_else(|| {
                                ServiceError::BadRequest(format!(
                                    "Statuses {} and {} must both belong to pipeline {}",
                                    source_status_id, target_status_id, pipeline_id
                                ))
                            })?;

                    if reordered != current {
                        persist_status_order(conn, &reordered).await?;
                    }

                    Ok(PipelineStatus::list_for_pipeline(conn, pipeline_id).await?)
                })
            })
            .await?;

        AuditLogger::log_action(
            AuditAction::StatusesReordered,
            user.user_id,
            Some(workspace_id),
            Some(pipeline_id.to_string()),
            Some(format!("moved {} onto {}", source_status_id, target_status_id)),
        );

        Ok(statuses)
    }
}

// =============================================================================
// QUERY HELPERS
// =============================================================================

/// Clear the workspace default, optionally keeping one pipeline untouched
async fn clear_default_pipeline(
    conn: &mut AsyncPgConnection,
    workspace_id: Uuid,
    keep: Option<i32>,
) -> Result<usize, diesel::result::Error> {
    use crate::schema::pipelines::dsl;

    let keep_id = keep.unwrap_or(0);
    diesel::update(
        dsl::pipelines
            .filter(dsl::workspace_id.eq(workspace_id))
            .filter(dsl::is_default.eq(true))
            .filter(dsl::id.ne(keep_id)),
    )
    .set((dsl::is_default.eq(false), dsl::updated_at.eq(Utc::now())))
    .execute(conn)
    .await
}

/// Clear the pipeline's default status, optionally keeping one status untouched
async fn clear_default_status(
    conn: &mut AsyncPgConnection,
    pipeline_id: i32,
    keep: Option<i32>,
) -> Result<usize, diesel::result::Error> {
    use crate::schema::pipeline_statuses::dsl;

    let keep_id = keep.unwrap_or(0);
    diesel::update(
        dsl::pipeline_statuses
            .filter(dsl::pipeline_id.eq(pipeline_id))
            .filter(dsl::is_default.eq(true))
            .filter(dsl::id.ne(keep_id)),
    )
    .set((dsl::is_default.eq(false), dsl::updated_at.eq(Utc::now())))
    .execute(conn)
    .await
}

async fn next_pipeline_order(
    conn: &mut AsyncPgConnection,
    workspace_id: Uuid,
) -> Result<i32, diesel::result::Error> {
    use crate::schema::pipelines::dsl;

    let max: Option<i32> = dsl::pipelines
        .filter(dsl::workspace_id.eq(workspace_id))
        .select(diesel::dsl::max(dsl::display_order))
        .first(conn)
        .await?;
    Ok(max.unwrap_or(0) + 1)
}

async fn next_status_order(
    conn: &mut AsyncPgConnection,
    pipeline_id: i32,
) -> Result<i32, diesel::result::Error> {
    use crate::schema::pipeline_statuses::dsl;

    let max: Option<i32> = dsl::pipeline_statuses
        .filter(dsl::pipeline_id.eq(pipeline_id))
        .select(diesel::dsl::max(dsl::display_order))
        .first(conn)
        .await?;
    Ok(max.unwrap_or(0) + 1)
}

async fn find_status_in_pipeline(
    conn: &mut AsyncPgConnection,
    workspace_id: Uuid,
    pipeline_id: i32,
    status_id: i32,
) -> Result<PipelineStatus, ServiceError> {
    Pipeline::find_in_workspace(conn, workspace_id, pipeline_id)
        .await?
        .ok_or_else(|| pipeline_not_found(pipeline_id))?;

    PipelineStatus::find_in_workspace(conn, workspace_id, status_id)
        .await?
        .filter(|s| s.pipeline_id == pipeline_id)
        .ok_or_else(|| status_not_found(status_id))
}

fn new_status_row(pipeline: &Pipeline, request: CreateStatusRequest, order: i32) -> NewPipelineStatus {
    NewPipelineStatus {
        pipeline_id: pipeline.id,
        workspace_id: pipeline.workspace_id,
        name: request.name.trim().to_string(),
        description: trim_optional_field(request.description.as_ref()),
        is_final: request.is_final,
        is_default: request.is_default,
        display_order: order,
        color_hex: trim_optional_field(request.color_hex.as_ref()),
        icon_name: trim_optional_field(request.icon_name.as_ref()),
    }
}

async fn insert_status(
    conn: &mut AsyncPgConnection,
    new_status: &NewPipelineStatus,
) -> Result<PipelineStatus, diesel::result::Error> {
    use crate::schema::pipeline_statuses::dsl;

    diesel::insert_into(dsl::pipeline_statuses)
        .values(new_status)
        .returning(PipelineStatus::as_returning())
        .get_result(conn)
        .await
}

async fn persist_status_order(
    conn: &mut AsyncPgConnection,
    status_ids: &[i32],
) -> Result<(), ServiceError> {
    use crate::schema::pipeline_statuses::dsl;

    let now = Utc::now();
    for (index, status_id) in status_ids.iter().enumerate() {
        diesel::update(dsl::pipeline_statuses.find(*status_id))
            .set((
                dsl::display_order.eq(index as i32 + 1),
                dsl::updated_at.eq(now),
            ))
            .execute(conn)
            .await?;
    }
    Ok(())
}
