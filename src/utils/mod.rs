// Utility modules for the CRM backend

pub mod audit_logger;
pub mod service_error;
pub mod validation;

pub use audit_logger::{AuditAction, AuditLogger};
pub use service_error::{ServiceError, ServiceErrorResponse, ServiceResult};
pub use validation::{trim_and_validate_field, trim_optional_field, ValidatedJson, ValidatedQuery};
