// OpenAPI document for the CRM API

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::{
    models::{
        campaign::{
            AddCampaignTargetRequest, Campaign, CampaignDetail, CampaignListResponse,
            CampaignObjective, CampaignSortBy, CampaignStatus, CampaignStep, CampaignStepRun,
            CampaignTarget, CampaignType, CreateCampaignRequest, CreateCampaignStepRequest,
            EnqueueStepRequest, Pagination, SortOrder, StepRunStatus, TargetState,
            UpdateCampaignStatusRequest,
        },
        discount::{
            CodeRedemption, CreateDiscountCodeRequest, DiscountCode, DiscountCodeDetail,
            DiscountCodeListResponse, DiscountType, DiscountValidation,
            DiscountValidationFailure, GenerateDiscountCodesRequest, RedeemDiscountRequest,
            UpdateDiscountCodeRequest, ValidateDiscountRequest,
        },
        lead::{
            CreateLeadRequest, Lead, LeadListResponse, LeadPipelineUpdateResponse, LeadView,
            UpdateLeadPipelineRequest,
        },
        pipeline::{
            CreatePipelineRequest, CreateStatusRequest, MoveStatusRequest, Pipeline,
            PipelineStatus, PipelineWithStatuses, ReorderStatusesRequest, UpdatePipelineRequest,
            UpdateStatusRequest,
        },
        ringcentral::{
            AccessTokenResponse, AuthStatusResponse, CallStartedResponse, MessageResponse,
            RingOutRequest, SendSmsRequest, SmsSentResponse,
        },
    },
};

/// Registers the bearer JWT scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "CRM Backend API",
        description = "Pipelines, leads, campaigns, discount codes and RingCentral telephony."
    ),
    paths(
        crate::health_check,
        crate::handlers::pipelines::list_pipelines,
        crate::handlers::pipelines::create_pipeline,
        crate::handlers::pipelines::get_default_pipeline,
        crate::handlers::pipelines::get_pipeline,
        crate::handlers::pipelines::update_pipeline,
        crate::handlers::pipelines::delete_pipeline,
        crate::handlers::pipelines::create_status,
        crate::handlers::pipelines::update_status,
        crate::handlers::pipelines::delete_status,
        crate::handlers::pipelines::reorder_statuses,
        crate::handlers::pipelines::move_status,
        crate::handlers::leads::list_leads,
        crate::handlers::leads::create_lead,
        crate::handlers::leads::get_lead,
        crate::handlers::leads::update_lead_pipeline,
        crate::handlers::campaigns::list_campaigns,
        crate::handlers::campaigns::create_campaign,
        crate::handlers::campaigns::get_campaign,
        crate::handlers::campaigns::update_campaign_status,
        crate::handlers::campaigns::list_steps,
        crate::handlers::campaigns::create_step,
        crate::handlers::campaigns::list_targets,
        crate::handlers::campaigns::add_target,
        crate::handlers::campaigns::list_runs,
        crate::handlers::campaigns::enqueue_step,
        crate::handlers::discounts::validate_discount,
        crate::handlers::discounts::redeem_discount,
        crate::handlers::discounts::list_codes,
        crate::handlers::discounts::create_code,
        crate::handlers::discounts::generate_codes,
        crate::handlers::discounts::get_code,
        crate::handlers::discounts::update_code,
        crate::handlers::discounts::delete_code,
        crate::handlers::ringcentral::start_auth,
        crate::handlers::ringcentral::exchange_code,
        crate::handlers::ringcentral::refresh_token,
        crate::handlers::ringcentral::get_token,
        crate::handlers::ringcentral::auth_status,
        crate::handlers::ringcentral::logout,
        crate::handlers::ringcentral::send_sms,
        crate::handlers::ringcentral::ring_out,
        crate::handlers::ringcentral::call_status,
    ),
    components(
        schemas(
            Pipeline,
            PipelineStatus,
            PipelineWithStatuses,
            CreatePipelineRequest,
            UpdatePipelineRequest,
            CreateStatusRequest,
            UpdateStatusRequest,
            ReorderStatusesRequest,
            MoveStatusRequest,
            Lead,
            LeadView,
            LeadListResponse,
            LeadPipelineUpdateResponse,
            CreateLeadRequest,
            UpdateLeadPipelineRequest,
            Campaign,
            CampaignDetail,
            CampaignListResponse,
            CampaignStatus,
            CampaignType,
            CampaignObjective,
            CampaignStep,
            CampaignTarget,
            CampaignStepRun,
            TargetState,
            StepRunStatus,
            CampaignSortBy,
            SortOrder,
            Pagination,
            CreateCampaignRequest,
            UpdateCampaignStatusRequest,
            CreateCampaignStepRequest,
            AddCampaignTargetRequest,
            EnqueueStepRequest,
            DiscountCode,
            DiscountType,
            CodeRedemption,
            DiscountCodeListResponse,
            DiscountCodeDetail,
            DiscountValidation,
            DiscountValidationFailure,
            ValidateDiscountRequest,
            RedeemDiscountRequest,
            CreateDiscountCodeRequest,
            UpdateDiscountCodeRequest,
            GenerateDiscountCodesRequest,
            AccessTokenResponse,
            AuthStatusResponse,
            MessageResponse,
            SmsSentResponse,
            CallStartedResponse,
            SendSmsRequest,
            RingOutRequest,
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Pipelines", description = "Sales pipelines and their statuses"),
        (name = "Leads", description = "Leads and pipeline assignment"),
        (name = "Campaigns", description = "Outreach campaigns and step dispatch"),
        (name = "Discounts", description = "Checkout discount codes"),
        (name = "Discount Admin", description = "Discount code administration"),
        (name = "RingCentral", description = "RingCentral OAuth, SMS and RingOut")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI JSON document at /api/docs/openapi.json
pub async fn serve_openapi_spec() -> Response {
    match ApiDoc::openapi().to_json() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to render OpenAPI document: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}
