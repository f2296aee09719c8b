// Discount code endpoints: public validation, redemption and admin management

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
    models::discount::{
        CodeRedemption, CreateDiscountCodeRequest, DiscountCode, DiscountCodeDetail,
        DiscountCodeListResponse, DiscountValidation, DiscountValidationFailure,
        GenerateDiscountCodesRequest, ListDiscountCodesQuery, RedeemDiscountRequest,
        UpdateDiscountCodeRequest, ValidateDiscountRequest,
    },
    services::discount::DiscountService,
    utils::validation::{ValidatedJson, ValidatedQuery},
};

/// Check a code at checkout
#[utoipa::path(
    post,
    path = "/api/validate-discount",
    tag = "Discounts",
    operation_id = "validateDiscount",
    request_body = ValidateDiscountRequest,
    responses(
        (status = 200, description = "Code accepted", body = DiscountValidation),
        (status = 400, description = "Code rejected or request invalid", body = DiscountValidationFailure)
    )
)]
pub async fn validate_discount(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ValidateDiscountRequest>,
) -> impl IntoResponse {
    match DiscountService::new(&state).validate_code(&request.code).await {
        Ok(Ok(validation)) => Json(validation).into_response(),
        Ok(Err(rejection)) => (
            StatusCode::BAD_REQUEST,
            Json(DiscountValidationFailure::from(rejection)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/discount-codes/redeem",
    tag = "Discounts",
    operation_id = "redeemDiscount",
    request_body = RedeemDiscountRequest,
    responses(
        (status = 201, description = "Redemption recorded", body = CodeRedemption),
        (status = 400, description = "Code no longer usable"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Discount code not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn redeem_discount(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<RedeemDiscountRequest>,
) -> impl IntoResponse {
    match DiscountService::new(&state)
        .redeem_code(&auth_user, request)
        .await
    {
        Ok(redemption) => (StatusCode::CREATED, Json(redemption)).into_response(),
        Err(e) => e.into_response(),
    }
}

// =============================================================================
// ADMIN
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/admin/discount-codes",
    tag = "Discount Admin",
    operation_id = "listDiscountCodes",
    params(ListDiscountCodesQuery),
    responses(
        (status = 200, description = "One page of codes", body = DiscountCodeListResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_codes(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedQuery(query): ValidatedQuery<ListDiscountCodesQuery>,
) -> impl IntoResponse {
    if let Err(e) = auth_user.require_admin() {
        return e.into_response();
    }

    match DiscountService::new(&state).list_codes(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/discount-codes",
    tag = "Discount Admin",
    operation_id = "createDiscountCode",
    request_body = CreateDiscountCodeRequest,
    responses(
        (status = 201, description = "Code created", body = DiscountCode),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Admin access required"),
        (status = 409, description = "Discount code already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_code(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<CreateDiscountCodeRequest>,
) -> impl IntoResponse {
    if let Err(e) = auth_user.require_admin() {
        return e.into_response();
    }

    match DiscountService::new(&state)
        .create_code(&auth_user, request)
        .await
    {
        Ok(code) => (StatusCode::CREATED, Json(code)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Create a batch of random codes sharing one configuration
#[utoipa::path(
    post,
    path = "/api/admin/discount-codes/generate",
    tag = "Discount Admin",
    operation_id = "generateDiscountCodes",
    request_body = GenerateDiscountCodesRequest,
    responses(
        (status = 201, description = "Codes created", body = [DiscountCode]),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearerAuth" = []))
)]
pub async fn generate_codes(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<GenerateDiscountCodesRequest>,
) -> impl IntoResponse {
    if let Err(e) = auth_user.require_admin() {
        return e.into_response();
    }

    match DiscountService::new(&state)
        .generate_codes(&auth_user, request)
        .await
    {
        Ok(codes) => (StatusCode::CREATED, Json(codes)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/discount-codes/{id}",
    tag = "Discount Admin",
    operation_id = "getDiscountCode",
    params(("id" = Uuid, Path, description = "Discount code ID (UUID)")),
    responses(
        (status = 200, description = "Code with its redemptions", body = DiscountCodeDetail),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Discount code not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_code(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(code_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(e) = auth_user.require_admin() {
        return e.into_response();
    }

    match DiscountService::new(&state).get_code(code_id).await {
        Ok(detail) => Json(detail).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/discount-codes/{id}",
    tag = "Discount Admin",
    operation_id = "updateDiscountCode",
    params(("id" = Uuid, Path, description = "Discount code ID (UUID)")),
    request_body = UpdateDiscountCodeRequest,
    responses(
        (status = 200, description = "Code updated", body = DiscountCode),
        (status = 400, description = "Bad request - validation failed"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Discount code not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_code(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(code_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateDiscountCodeRequest>,
) -> impl IntoResponse {
    if let Err(e) = auth_user.require_admin() {
        return e.into_response();
    }

    match DiscountService::new(&state)
        .update_code(&auth_user, code_id, request)
        .await
    {
        Ok(code) => Json(code).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/discount-codes/{id}",
    tag = "Discount Admin",
    operation_id = "deleteDiscountCode",
    params(("id" = Uuid, Path, description = "Discount code ID (UUID)")),
    responses(
        (status = 204, description = "Code deleted"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Discount code not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_code(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(code_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(e) = auth_user.require_admin() {
        return e.into_response();
    }

    match DiscountService::new(&state)
        .delete_code(&auth_user, code_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
