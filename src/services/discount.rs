// Discount code validation, redemption and admin management

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app::AppState,
    app_config::Environment,
    db::DieselPool,
    middleware::AuthenticatedUser,
    models::discount::{
        evaluate_discount, generate_code, validate_type_fields, CodeRedemption,
        CreateDiscountCodeRequest, DiscountCode, DiscountCodeDetail, DiscountCodeListResponse,
        DiscountRejection, DiscountType, DiscountValidation, GenerateDiscountCodesRequest,
        ListDiscountCodesQuery, NewCodeRedemption, NewDiscountCode, RedeemDiscountRequest,
        UpdateDiscountCodeRequest,
    },
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::ServiceError,
        trim_optional_field,
    },
};

diesel::define_sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);

/// Attempts per generated code before giving up on finding a free one
const MAX_GENERATE_ATTEMPTS: usize = 10;

fn code_not_found(code_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Discount code with ID {} not found", code_id))
}

async fn find_by_code(
    conn: &mut AsyncPgConnection,
    code: &str,
) -> Result<Option<DiscountCode>, diesel::result::Error> {
    use crate::schema::discount_codes::dsl;

    dsl::discount_codes
        .filter(lower(dsl::code).eq(code.trim().to_lowercase()))
        .select(DiscountCode::as_select())
        .first(conn)
        .await
        .optional()
}

pub struct DiscountService {
    diesel_pool: DieselPool,
    environment: Environment,
}

impl DiscountService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
            environment: state.config.server.environment,
        }
    }

    /// Check a checkout code; the inner result carries the rejection reason
    #[instrument(skip(self))]
    pub async fn validate_code(
        &self,
        code: &str,
    ) -> Result<Result<DiscountValidation, DiscountRejection>, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        let found = find_by_code(&mut conn, code).await?;

        let result = evaluate_discount(found.as_ref(), Utc::now(), self.environment);
        if let Err(rejection) = &result {
            warn!(reason = rejection.message(), "Discount code rejected");
        }
        Ok(result)
    }

    /// Record a redemption and bump the usage counter together
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn redeem_code(
        &self,
        user: &AuthenticatedUser,
        request: RedeemDiscountRequest,
    ) -> Result<CodeRedemption, ServiceError> {
        let user_id = user.user_id;
        let code_id = request.discount_code_id;
        let order_id = trim_optional_field(request.order_id.as_ref());
        let environment = self.environment;
        let mut conn = self.diesel_pool.get().await?;

        let redemption = conn
            .build_transaction()
            .run::<_, ServiceError, _>(|conn| {
                Box::pin(async move {
                    use crate::schema::code_redemptions::dsl as redemption_dsl;
                    use crate::schema::discount_codes::dsl;

                    let code = dsl::discount_codes
                        .find(code_id)
                        .select(DiscountCode::as_select())
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or_else(|| code_not_found(code_id))?;

                    evaluate_discount(Some(&code), Utc::now(), environment)
                        .map_err(|rejection| ServiceError::BadRequest(rejection.message().to_string()))?;

                    let redemption = diesel::insert_into(redemption_dsl::code_redemptions)
                        .values(&NewCodeRedemption {
                            discount_code_id: code_id,
                            user_id,
                            order_id,
                        })
                        .returning(CodeRedemption::as_returning())
                        .get_result(conn)
                        .await?;

                    diesel::update(dsl::discount_codes.find(code_id))
                        .set((
                            dsl::current_uses.eq(dsl::current_uses + 1),
                            dsl::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(redemption)
                })
            })
            .await?;

        info!(%code_id, "Discount code redeemed");
        AuditLogger::log_action(
            AuditAction::DiscountCodeRedeemed,
            user_id,
            None,
            Some(code_id.to_string()),
            redemption.order_id.clone(),
        );

        Ok(redemption)
    }

    // =========================================================================
    // ADMIN
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn list_codes(
        &self,
        query: &ListDiscountCodesQuery,
    ) -> Result<DiscountCodeListResponse, ServiceError> {
        use crate::schema::discount_codes::dsl;

        let mut conn = self.diesel_pool.get().await?;

        let mut rows_query = dsl::discount_codes
            .select(DiscountCode::as_select())
            .into_boxed();
        let mut count_query = dsl::discount_codes.into_boxed();

        if let Some(active) = query.filter_active {
            rows_query = rows_query.filter(dsl::is_active.eq(active));
            count_query = count_query.filter(dsl::is_active.eq(active));
        }

        if let Some(search) = trim_optional_field(query.search.as_ref()) {
            let pattern = format!("%{}%", search);
            rows_query = rows_query.filter(dsl::code.ilike(pattern.clone()));
            count_query = count_query.filter(dsl::code.ilike(pattern));
        }

        let total = count_query.count().get_result::<i64>(&mut conn).await?;

        let page = query.page();
        let page_size = query.page_size();
        let codes = rows_query
            .order((dsl::created_at.desc(), dsl::id.asc()))
            .limit(page_size)
            .offset(query.offset())
            .load(&mut conn)
            .await?;

        Ok(DiscountCodeListResponse {
            codes,
            total,
            page,
            page_size,
            total_pages: (total + page_size - 1) / page_size,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_code(&self, code_id: Uuid) -> Result<DiscountCodeDetail, ServiceError> {
        use crate::schema::code_redemptions::dsl as redemption_dsl;
        use crate::schema::discount_codes::dsl;

        let mut conn = self.diesel_pool.get().await?;
        let code = dsl::discount_codes
            .find(code_id)
            .select(DiscountCode::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| code_not_found(code_id))?;

        let redemptions = redemption_dsl::code_redemptions
            .filter(redemption_dsl::discount_code_id.eq(code_id))
            .order(redemption_dsl::redeemed_at.desc())
            .select(CodeRedemption::as_select())
            .load(&mut conn)
            .await?;

        Ok(DiscountCodeDetail { code, redemptions })
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn create_code(
        &self,
        user: &AuthenticatedUser,
        request: CreateDiscountCodeRequest,
    ) -> Result<DiscountCode, ServiceError> {
        use crate::schema::discount_codes::dsl;

        request
            .validate_type_fields()
            .map_err(ServiceError::ValidationError)?;
        let code = request
            .normalized_code()
            .map_err(ServiceError::ValidationError)?;

        let mut conn = self.diesel_pool.get().await?;

        if find_by_code(&mut conn, &code).await?.is_some() {
            return Err(ServiceError::Conflict("Discount code already exists".to_string()));
        }

        let created = diesel::insert_into(dsl::discount_codes)
            .values(&NewDiscountCode {
                code,
                description: trim_optional_field(request.description.as_ref()),
                discount_type: request.discount_type.as_str().to_string(),
                discount_percent: request.discount_percent,
                discount_amount_cents: request.discount_amount_cents,
                max_uses: request.max_uses,
                expires_at: request.expires_at,
                is_active: request.is_active,
                development_only: request.development_only,
            })
            .returning(DiscountCode::as_returning())
            .get_result(&mut conn)
            .await?;

        AuditLogger::log_action(
            AuditAction::DiscountCodeCreated,
            user.user_id,
            None,
            Some(created.id.to_string()),
            Some(created.code.clone()),
        );

        Ok(created)
    }

    /// Generate a batch of unique random codes with shared settings
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id, count = request.count))]
    pub async fn generate_codes(
        &self,
        user: &AuthenticatedUser,
        request: GenerateDiscountCodesRequest,
    ) -> Result<Vec<DiscountCode>, ServiceError> {
        use crate::schema::discount_codes::dsl;

        validate_type_fields(
            request.discount_type,
            request.discount_percent,
            request.discount_amount_cents,
        )
        .map_err(ServiceError::ValidationError)?;

        let prefix = request.prefix.trim().to_uppercase();
        let mut conn = self.diesel_pool.get().await?;
        let mut rows: Vec<NewDiscountCode> = Vec::with_capacity(request.count as usize);

        for _ in 0..request.count {
            let mut candidate = None;
            for _ in 0..MAX_GENERATE_ATTEMPTS {
                let code = generate_code(&prefix, request.code_length);
                let taken_locally = rows.iter().any(|r| r.code.eq_ignore_ascii_case(&code));
                if !taken_locally && find_by_code(&mut conn, &code).await?.is_none() {
                    candidate = Some(code);
                    break;
                }
            }

            let code = candidate.ok_or_else(|| {
                ServiceError::InternalError(
                    "Failed to generate unique codes after multiple attempts".to_string(),
                )
            })?;
            rows.push(request.new_code(code));
        }

        let created = diesel::insert_into(dsl::discount_codes)
            .values(&rows)
            .returning(DiscountCode::as_returning())
            .get_results(&mut conn)
            .await?;

        info!(count = created.len(), "Discount codes generated");
        AuditLogger::log_action(
            AuditAction::DiscountCodeCreated,
            user.user_id,
            None,
            None,
            Some(format!("generated {} codes", created.len())),
        );

        Ok(created)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn update_code(
        &self,
        user: &AuthenticatedUser,
        code_id: Uuid,
        request: UpdateDiscountCodeRequest,
    ) -> Result<DiscountCode, ServiceError> {
        use crate::schema::discount_codes::dsl;

        let mut conn = self.diesel_pool.get().await?;
        let existing = dsl::discount_codes
            .find(code_id)
            .select(DiscountCode::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| code_not_found(code_id))?;

        // Check the type fields against the merged result
        let merged_type = request
            .discount_type
            .or_else(|| DiscountType::from_string(&existing.discount_type));
        if let Some(discount_type) = merged_type {
            validate_type_fields(
                discount_type,
                request.discount_percent.or(existing.discount_percent),
                request
                    .discount_amount_cents
                    .or(existing.discount_amount_cents),
            )
            .map_err(ServiceError::ValidationError)?;
        }

        let updated = diesel::update(dsl::discount_codes.find(code_id))
            .set(&request.into_changeset(Utc::now()))
            .returning(DiscountCode::as_returning())
            .get_result(&mut conn)
            .await?;

        AuditLogger::log_action(
            AuditAction::DiscountCodeUpdated,
            user.user_id,
            None,
            Some(code_id.to_string()),
            None,
        );

        Ok(updated)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete_code(&self, user: &AuthenticatedUser, code_id: Uuid) -> Result<(), ServiceError> {
        use crate::schema::discount_codes::dsl;

        let mut conn = self.diesel_pool.get().await?;
        let deleted = diesel::delete(dsl::discount_codes.find(code_id))
            .execute(&mut conn)
            .await?;

        if deleted == 0 {
            return Err(code_not_found(code_id));
        }

        AuditLogger::log_action(
            AuditAction::DiscountCodeDeleted,
            user.user_id,
            None,
            Some(code_id.to_string()),
            None,
        );

        Ok(())
    }
}
