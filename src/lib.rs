// Library exports for the CRM backend
// main.rs and the integration tests build the router through these functions

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::DieselPool;
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use services::{
    CampaignDispatcher, DieselStepRunRepository, DispatchOutcome, JwtService, StepRunRepository,
};

/// Build the pool, run embedded migrations when enabled and wire every service
pub async fn initialize_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    info!("Initializing database pool...");
    let diesel_pool = db::connect(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Database pool creation failed: {}", e))?;

    migrations::prepare_schema(config)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    let step_runs = Arc::new(DieselStepRunRepository::new(diesel_pool.clone()));
    let state = AppState::new(Arc::new(config.clone()), diesel_pool, step_runs)?;

    if !state.campaign_dispatcher.is_configured() {
        tracing::warn!("N8N_WEBHOOK_URL/N8N_WEBHOOK_SECRET not set; campaign enqueue will fail");
    }

    Ok(state)
}

/// Assemble the full API router
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/api/pipelines", handlers::pipeline_routes())
        .nest("/api/leads", handlers::lead_routes())
        .nest("/api/campaigns", handlers::campaign_routes())
        .nest("/api/discount-codes", handlers::discount_routes())
        .nest("/api/admin/discount-codes", handlers::admin_discount_routes())
        .nest("/api/ringcentral", handlers::ringcentral_routes())
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let mut public = Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/validate-discount",
            post(handlers::discounts::validate_discount),
        )
        .route(
            "/api/ringcentral/auth",
            get(handlers::ringcentral::start_auth),
        );

    if state.config.features.enable_openapi {
        public = public.route(
            "/api/docs/openapi.json",
            get(handlers::docs::serve_openapi_spec),
        );
    }

    public
        .merge(protected)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::dynamic_cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Health check handler
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    operation_id = "healthCheck",
    responses(
        (status = 200, description = "All components healthy"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let (healthy, postgres_health) = match db::ping(&state.diesel_pool).await {
        Ok(()) => (
            true,
            serde_json::json!({
                "status": "healthy",
                "max_connections": state.config.database.max_connections,
                "error": null
            }),
        ),
        Err(e) => {
            error!("Health check database failure: {}", e);
            (
                false,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": format!("Database connection failed: {}", e)
                }),
            )
        },
    };

    let response = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "crm-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "n8n_webhook": if state.campaign_dispatcher.is_configured() { "configured" } else { "missing" }
        }
    });

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
