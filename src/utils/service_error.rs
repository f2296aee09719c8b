// Service error type shared by every handler and service
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Validation failed")]
    InvalidFields(validator::ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

#[derive(Debug, Serialize)]
pub struct ServiceErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ServiceError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ValidationError(_)
            | ServiceError::InvalidFields(_)
            | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,

            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,

            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,

            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::Conflict(_) => StatusCode::CONFLICT,

            ServiceError::UpstreamError(_) => StatusCode::BAD_GATEWAY,

            ServiceError::ConfigurationError(_)
            | ServiceError::DatabaseError(_)
            | ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API response
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::ValidationError(_) | ServiceError::InvalidFields(_) => {
                "VALIDATION_ERROR"
            },
            ServiceError::BadRequest(_) => "BAD_REQUEST",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            ServiceError::UpstreamError(_) => "UPSTREAM_ERROR",
            ServiceError::DatabaseError(_) => "DATABASE_ERROR",
            ServiceError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Create error response
    pub fn to_response(&self) -> ServiceErrorResponse {
        let status = self.status_code();

        // Internal details stay in the logs
        let message = match self {
            ServiceError::DatabaseError(_) | ServiceError::InternalError(_) => {
                "Internal server error".to_string()
            },
            other => other.to_string(),
        };

        let details = match self {
            ServiceError::InvalidFields(errors) => Some(field_error_details(errors)),
            _ => None,
        };

        ServiceErrorResponse {
            success: false,
            error: message,
            code: self.error_code().to_string(),
            status: status.as_u16(),
            details,
        }
    }
}

/// Flatten validator errors into `{field: [messages]}`
fn field_error_details(errors: &validator::ValidationErrors) -> Value {
    let mut details = serde_json::Map::new();
    for (field, field_errors) in errors.field_errors() {
        let messages: Vec<Value> = field_errors
            .iter()
            .map(|e| {
                Value::String(
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                )
            })
            .collect();
        details.insert(field.to_string(), Value::Array(messages));
    }
    Value::Object(details)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), "Request failed: {}", self);
        }

        (status, Json(self.to_response())).into_response()
    }
}

// =============================================================================
// ERROR CONVERSIONS
// =============================================================================

impl From<diesel::result::Error> for ServiceError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => {
                ServiceError::NotFound("Resource not found".to_string())
            },
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                warn!(
                    constraint = info.constraint_name().unwrap_or("unknown"),
                    "Unique violation: {}",
                    info.message()
                );
                ServiceError::Conflict("Resource already exists or conflicts".to_string())
            },
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                warn!(
                    constraint = info.constraint_name().unwrap_or("unknown"),
                    "Foreign key violation: {}",
                    info.message()
                );
                ServiceError::BadRequest("Referenced resource does not exist".to_string())
            },
            _ => ServiceError::DatabaseError(error.to_string()),
        }
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for ServiceError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        ServiceError::DatabaseError(format!("Failed to get connection: {}", error))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::InvalidFields(error)
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::ValidationError(rejection.body_text())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        ServiceError::UpstreamError(error.to_string())
    }
}

// =============================================================================
// RESULT TYPE
// =============================================================================

pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// TESTS
// =============================================================================
