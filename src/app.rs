// Application state shared across handlers
use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::DieselPool,
    services::{
        CampaignDispatcher, JwtService, RingCentralService, StepRunRepository,
    },
    utils::service_error::ServiceError,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub jwt_service: Arc<JwtService>,
    pub campaign_dispatcher: Arc<CampaignDispatcher>,
    pub ringcentral_service: Arc<RingCentralService>,
}

impl AppState {
    /// Wire services from config, a pool and the step-run store used for dispatch
    pub fn new(
        config: Arc<AppConfig>,
        diesel_pool: DieselPool,
        step_runs: Arc<dyn StepRunRepository>,
    ) -> Result<Self, ServiceError> {
        let jwt_service = Arc::new(JwtService::from_config(&config.jwt));
        let campaign_dispatcher =
            Arc::new(CampaignDispatcher::new(step_runs, config.webhook.clone())?);
        let ringcentral_service = Arc::new(RingCentralService::new(
            config.ringcentral.clone(),
            diesel_pool.clone(),
        )?);

        Ok(Self {
            config,
            diesel_pool,
            jwt_service,
            campaign_dispatcher,
            ringcentral_service,
        })
    }
}
