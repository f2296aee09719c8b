// HTTP handlers and their route builders
// Builders return routers meant to be nested under /api/<resource>

pub mod campaigns;
pub mod discounts;
pub mod docs;
pub mod leads;
pub mod pipelines;
pub mod ringcentral;

use crate::app::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

// Pipeline and status routes
pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(pipelines::list_pipelines).post(pipelines::create_pipeline),
        )
        .route("/default", get(pipelines::get_default_pipeline))
        .route(
            "/{id}",
            get(pipelines::get_pipeline)
                .put(pipelines::update_pipeline)
                .delete(pipelines::delete_pipeline),
        )
        .route("/{id}/statuses", post(pipelines::create_status))
        .route("/{id}/statuses/order", put(pipelines::reorder_statuses))
        .route("/{id}/statuses/move", post(pipelines::move_status))
        .route(
            "/{id}/statuses/{status_id}",
            put(pipelines::update_status).delete(pipelines::delete_status),
        )
}

// Lead routes
pub fn lead_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(leads::list_leads).post(leads::create_lead))
        .route("/{id}", get(leads::get_lead))
        .route("/{id}/pipeline", put(leads::update_lead_pipeline))
}

// Campaign routes
pub fn campaign_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route("/{id}", get(campaigns::get_campaign))
        .route("/{id}/status", put(campaigns::update_campaign_status))
        .route(
            "/{id}/steps",
            get(campaigns::list_steps).post(campaigns::create_step),
        )
        .route(
            "/{id}/targets",
            get(campaigns::list_targets).post(campaigns::add_target),
        )
        .route("/{id}/runs", get(campaigns::list_runs))
        .route("/{id}/enqueue", post(campaigns::enqueue_step))
}

// Authenticated discount routes
pub fn discount_routes() -> Router<AppState> {
    Router::new().route("/redeem", post(discounts::redeem_discount))
}

// Admin discount management; handlers enforce the admin role
pub fn admin_discount_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(discounts::list_codes).post(discounts::create_code))
        .route("/generate", post(discounts::generate_codes))
        .route(
            "/{id}",
            get(discounts::get_code)
                .put(discounts::update_code)
                .delete(discounts::delete_code),
        )
}

// Authenticated RingCentral routes
pub fn ringcentral_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/exchange-code", get(ringcentral::exchange_code))
        .route("/auth/refresh", post(ringcentral::refresh_token))
        .route("/auth/status", get(ringcentral::auth_status))
        .route("/auth/logout", post(ringcentral::logout))
        .route("/token", get(ringcentral::get_token))
        .route("/sms", post(ringcentral::send_sms))
        .route("/call", post(ringcentral::ring_out))
        .route("/call-status", get(ringcentral::call_status))
}
