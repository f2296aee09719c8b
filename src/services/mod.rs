// Services module for the CRM backend
// Business logic layer for the application

pub mod campaign;
pub mod discount;
pub mod dispatch;
pub mod jwt;
pub mod lead;
pub mod pipeline;
pub mod ringcentral;

// Re-export commonly used services
pub use campaign::CampaignService;
pub use discount::DiscountService;
pub use dispatch::{
    sign_payload, verify_signature, CampaignDispatcher, DieselStepRunRepository,
    DispatchOutcome, StepRunRepository,
};
pub use jwt::{JwtError, JwtService};
pub use lead::LeadService;
pub use pipeline::{reorder_after_drag, PipelineService};
pub use ringcentral::{CookieTokens, RingCentralService, TokenSet};
