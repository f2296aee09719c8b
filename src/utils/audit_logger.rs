// Audit logging for CRM mutations
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditAction {
    PipelineCreated,
    PipelineUpdated,
    PipelineDeleted,
    StatusCreated,
    StatusUpdated,
    StatusDeleted,
    StatusesReordered,
    LeadCreated,
    LeadMoved,
    CampaignCreated,
    CampaignStatusChanged,
    CampaignStepCreated,
    CampaignTargetAdded,
    CampaignStepEnqueued,
    DiscountCodeCreated,
    DiscountCodeUpdated,
    DiscountCodeDeleted,
    DiscountCodeRedeemed,
    RingCentralConnected,
}

impl AuditAction {
    /// Resource family the action belongs to
    pub fn resource_type(&self) -> &'static str {
        match self {
            AuditAction::PipelineCreated
            | AuditAction::PipelineUpdated
            | AuditAction::PipelineDeleted => "pipeline",
            AuditAction::StatusCreated
            | AuditAction::StatusUpdated
            | AuditAction::StatusDeleted
            | AuditAction::StatusesReordered => "pipeline_status",
            AuditAction::LeadCreated | AuditAction::LeadMoved => "lead",
            AuditAction::CampaignCreated
            | AuditAction::CampaignStatusChanged
            | AuditAction::CampaignStepCreated
            | AuditAction::CampaignTargetAdded => "campaign",
            AuditAction::CampaignStepEnqueued => "campaign_step_run",
            AuditAction::DiscountCodeCreated
            | AuditAction::DiscountCodeUpdated
            | AuditAction::DiscountCodeDeleted
            | AuditAction::DiscountCodeRedeemed => "discount_code",
            AuditAction::RingCentralConnected => "ringcentral_token",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub user_id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct AuditLogger;

impl AuditLogger {
    /// Log an audit event for a CRM mutation
    pub fn log_action(
        action: AuditAction,
        user_id: Uuid,
        workspace_id: Option<Uuid>,
        resource_id: Option<String>,
        details: Option<String>,
    ) {
        let audit_log = AuditLog {
            id: Uuid::new_v4(),
            action,
            user_id,
            workspace_id,
            resource_id,
            resource_type: action.resource_type().to_string(),
            details,
            timestamp: Utc::now(),
        };

        let json_log = serde_json::to_string(&audit_log).unwrap_or_else(|e| {
            warn!("Failed to serialize audit log: {}", e);
            format!("{:?}", audit_log)
        });

        info!(target: "audit", "{}", json_log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_types() {
        assert_eq!(AuditAction::LeadMoved.resource_type(), "lead");
        assert_eq!(
            AuditAction::StatusesReordered.resource_type(),
            "pipeline_status"
        );
        assert_eq!(
            AuditAction::CampaignStepEnqueued.resource_type(),
            "campaign_step_run"
        );
    }
}
