// Request and response DTOs for the RingCentral endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AuthStartQuery {
    /// `json` returns the authorization URL instead of redirecting
    pub format: Option<String>,
}

impl AuthStartQuery {
    pub fn wants_json(&self) -> bool {
        self.format.as_deref() == Some("json")
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ExchangeCodeQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct CallStatusQuery {
    #[validate(length(min = 1, message = "callId is required"))]
    pub call_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"to": "+15551234567", "text": "Your quote is ready"}))]
pub struct SendSmsRequest {
    #[validate(length(min = 1, message = "\"to\" and \"text\" are required"))]
    pub to: String,

    #[validate(length(
        min = 1,
        max = 1000,
        message = "\"text\" is required and must be at most 1000 characters"
    ))]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"to": "+15551234567"}))]
pub struct RingOutRequest {
    #[validate(length(min = 1, message = "\"to\" number is required"))]
    pub to: String,

    pub from: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SmsSentResponse {
    pub id: Option<Value>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallStartedResponse {
    pub success: bool,
    pub message: String,
    pub call_id: Option<Value>,
    #[schema(value_type = Object)]
    pub call_details: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sms_request_requires_fields() {
        let empty = SendSmsRequest {
            to: String::new(),
            text: "hi".to_string(),
        };
        assert!(empty.validate().is_err());

        let ok = SendSmsRequest {
            to: "+15551234567".to_string(),
            text: "hi".to_string(),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_call_status_query_uses_camel_case() {
        let query: CallStatusQuery = serde_json::from_str(r#"{"callId":"abc"}"#).unwrap();
        assert_eq!(query.call_id, "abc");
    }

    #[test]
    fn test_auth_start_format() {
        assert!(AuthStartQuery {
            format: Some("json".to_string())
        }
        .wants_json());
        assert!(!AuthStartQuery::default().wants_json());
    }
}
