// Data models for the CRM backend

pub mod auth;
pub mod campaign;
pub mod discount;
pub mod lead;
pub mod pipeline;
pub mod ringcentral;
pub mod ringcentral_token;

pub use auth::AccessTokenClaims;
pub use campaign::{
    Campaign, CampaignDetail, CampaignStatus, CampaignStep, CampaignStepRun, CampaignTarget,
    NewCampaignStepRun,
};
pub use discount::{CodeRedemption, DiscountCode, DiscountType};
pub use lead::{Lead, LeadView};
pub use pipeline::{Pipeline, PipelineStatus, PipelineWithStatuses};
pub use ringcentral_token::RingCentralToken;
