// Checkout discount codes and their redemptions

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::app_config::Environment;
use crate::schema::{code_redemptions, discount_codes};
use crate::utils::validation::{page_offset, trim_and_validate_field};

/// Characters used for generated codes; look-alikes (0/O, 1/I) are left out
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
    FreeTrial,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::FixedAmount => "fixed_amount",
            DiscountType::FreeTrial => "free_trial",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountType::Percentage),
            "fixed_amount" => Some(DiscountType::FixedAmount),
            "free_trial" => Some(DiscountType::FreeTrial),
            _ => None,
        }
    }
}

// =============================================================================
// DATABASE MODELS
// =============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = discount_codes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DiscountCode {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_percent: Option<i32>,
    /// Fixed discount in cents
    pub discount_amount_cents: Option<i32>,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub development_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = discount_codes)]
pub struct NewDiscountCode {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_percent: Option<i32>,
    pub discount_amount_cents: Option<i32>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub development_only: bool,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = discount_codes)]
pub struct UpdateDiscountCode {
    pub description: Option<Option<String>>,
    pub discount_type: Option<String>,
    pub discount_percent: Option<Option<i32>>,
    pub discount_amount_cents: Option<Option<i32>>,
    pub max_uses: Option<Option<i32>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub development_only: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = code_redemptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CodeRedemption {
    pub id: Uuid,
    pub discount_code_id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<String>,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = code_redemptions)]
pub struct NewCodeRedemption {
    pub discount_code_id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<String>,
}

/// One page of discount codes for the admin view
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DiscountCodeListResponse {
    pub codes: Vec<DiscountCode>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// A code with its redemption history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DiscountCodeDetail {
    #[serde(flatten)]
    pub code: DiscountCode,
    pub redemptions: Vec<CodeRedemption>,
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Why a code cannot be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountRejection {
    Unknown,
    Expired,
    Exhausted,
    DevelopmentOnly,
}

impl DiscountRejection {
    pub fn message(&self) -> &'static str {
        match self {
            DiscountRejection::Unknown => "Invalid discount code",
            DiscountRejection::Expired => "Discount code has expired",
            DiscountRejection::Exhausted => "Discount code has reached maximum uses",
            DiscountRejection::DevelopmentOnly => "This discount code is not valid in production",
        }
    }
}

/// Successful validation payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DiscountValidation {
    pub valid: bool,
    pub discount_percent: i32,
    pub discount_type: String,
    pub discount_amount_cents: Option<i32>,
    pub code_id: Uuid,
    pub message: String,
    pub discount_message: String,
}

/// Rejected validation payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DiscountValidationFailure {
    pub valid: bool,
    pub message: String,
}

impl From<DiscountRejection> for DiscountValidationFailure {
    fn from(rejection: DiscountRejection) -> Self {
        Self {
            valid: false,
            message: rejection.message().to_string(),
        }
    }
}

/// Apply the checkout rules to a code found by lookup.
///
/// Order matters: expiry is reported before usage, and development-only codes
/// are checked last so a dev code that is also expired reports the expiry.
pub fn evaluate_discount(
    code: Option<&DiscountCode>,
    now: DateTime<Utc>,
    environment: Environment,
) -> Result<DiscountValidation, DiscountRejection> {
    let code = match code {
        Some(code) if code.is_active => code,
        _ => return Err(DiscountRejection::Unknown),
    };

    if matches!(code.expires_at, Some(expires_at) if expires_at < now) {
        return Err(DiscountRejection::Expired);
    }

    if matches!(code.max_uses, Some(max) if code.current_uses >= max) {
        return Err(DiscountRejection::Exhausted);
    }

    if code.development_only && environment != Environment::Development {
        return Err(DiscountRejection::DevelopmentOnly);
    }

    let (discount_percent, discount_message) = match DiscountType::from_string(&code.discount_type)
    {
        Some(DiscountType::Percentage) => {
            let percent = code.discount_percent.unwrap_or(0);
            (percent, format!("{}% discount", percent))
        },
        // The client recalculates the real percentage from the amount
        Some(DiscountType::FixedAmount) => {
            let cents = code.discount_amount_cents.unwrap_or(0);
            (100, format!("${} discount", format_cents(cents)))
        },
        Some(DiscountType::FreeTrial) => (100, "Free trial".to_string()),
        None => (0, String::new()),
    };

    Ok(DiscountValidation {
        valid: true,
        discount_percent,
        discount_type: code.discount_type.clone(),
        discount_amount_cents: code.discount_amount_cents,
        code_id: code.id,
        message: "Discount code applied successfully".to_string(),
        discount_message,
    })
}

/// Render cents as dollars with two decimals
pub fn format_cents(cents: i32) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = i64::from(cents).abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Random code drawn from an unambiguous alphabet
pub fn generate_code(prefix: &str, length: usize) -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", prefix, body)
}

// =============================================================================
// REQUEST DTOs
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"code": "SPRING25"}))]
pub struct ValidateDiscountRequest {
    #[validate(length(min = 1, max = 50, message = "Discount code must be 1-50 characters"))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RedeemDiscountRequest {
    pub discount_code_id: Uuid,

    #[validate(length(max = 100, message = "Order ID must be less than 100 characters"))]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDiscountCodeRequest {
    #[validate(length(min = 1, max = 50, message = "Discount code must be 1-50 characters"))]
    pub code: String,

    #[validate(length(max = 500, message = "Description must be less than 500 characters"))]
    pub description: Option<String>,

    pub discount_type: DiscountType,

    #[validate(range(min = 1, max = 100, message = "Discount percent must be 1-100"))]
    pub discount_percent: Option<i32>,

    #[validate(range(min = 1, message = "Discount amount must be positive"))]
    pub discount_amount_cents: Option<i32>,

    #[validate(range(min = 1, message = "Max uses must be positive"))]
    pub max_uses: Option<i32>,

    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub development_only: bool,
}

impl CreateDiscountCodeRequest {
    /// Trimmed, uppercased code; blank input is rejected
    pub fn normalized_code(&self) -> Result<String, String> {
        trim_and_validate_field(&self.code, true)
            .map(|code| code.to_uppercase())
            .map_err(|_| "Discount code is required".to_string())
    }

    /// Type-specific fields must be present for the chosen type
    pub fn validate_type_fields(&self) -> Result<(), String> {
        validate_type_fields(
            self.discount_type,
            self.discount_percent,
            self.discount_amount_cents,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDiscountCodeRequest {
    #[validate(length(max = 500, message = "Description must be less than 500 characters"))]
    pub description: Option<String>,

    pub discount_type: Option<DiscountType>,

    #[validate(range(min = 1, max = 100, message = "Discount percent must be 1-100"))]
    pub discount_percent: Option<i32>,

    #[validate(range(min = 1, message = "Discount amount must be positive"))]
    pub discount_amount_cents: Option<i32>,

    #[validate(range(min = 1, message = "Max uses must be positive"))]
    pub max_uses: Option<i32>,

    pub expires_at: Option<DateTime<Utc>>,

    pub is_active: Option<bool>,

    pub development_only: Option<bool>,
}

impl UpdateDiscountCodeRequest {
    pub fn into_changeset(self, now: DateTime<Utc>) -> UpdateDiscountCode {
        UpdateDiscountCode {
            description: self.description.map(|d| Some(d.trim().to_string())),
            discount_type: self.discount_type.map(|t| t.as_str().to_string()),
            discount_percent: self.discount_percent.map(Some),
            discount_amount_cents: self.discount_amount_cents.map(Some),
            max_uses: self.max_uses.map(Some),
            expires_at: self.expires_at.map(Some),
            is_active: self.is_active,
            development_only: self.development_only,
            updated_at: Some(now),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GenerateDiscountCodesRequest {
    #[serde(default = "default_generate_count")]
    #[validate(range(min = 1, max = 100, message = "Count must be between 1 and 100"))]
    pub count: u32,

    #[serde(default)]
    #[validate(length(max = 20, message = "Prefix must be less than 20 characters"))]
    pub prefix: String,

    #[serde(default = "default_code_length")]
    #[validate(range(min = 4, max = 20, message = "Code length must be between 4 and 20"))]
    pub code_length: usize,

    #[serde(default = "default_generated_type")]
    pub discount_type: DiscountType,

    #[serde(default = "default_generated_percent")]
    #[validate(range(min = 1, max = 100, message = "Discount percent must be 1-100"))]
    pub discount_percent: Option<i32>,

    #[validate(range(min = 1, message = "Discount amount must be positive"))]
    pub discount_amount_cents: Option<i32>,

    #[validate(range(min = 1, message = "Max uses must be positive"))]
    pub max_uses: Option<i32>,

    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default = "default_generated_description")]
    pub description: String,
}

impl GenerateDiscountCodesRequest {
    /// Row for one generated code; type fields not used by the type are dropped
    pub fn new_code(&self, code: String) -> NewDiscountCode {
        NewDiscountCode {
            code,
            description: Some(self.description.trim().to_string()).filter(|d| !d.is_empty()),
            discount_type: self.discount_type.as_str().to_string(),
            discount_percent: match self.discount_type {
                DiscountType::Percentage => self.discount_percent,
                _ => None,
            },
            discount_amount_cents: match self.discount_type {
                DiscountType::FixedAmount => self.discount_amount_cents,
                _ => None,
            },
            max_uses: self.max_uses,
            expires_at: self.expires_at,
            is_active: true,
            development_only: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListDiscountCodesQuery {
    #[validate(range(min = 1, max = 1000000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "Page size must be between 1 and 100"))]
    pub page_size: Option<i64>,

    pub filter_active: Option<bool>,

    #[validate(length(max = 50, message = "Search must be less than 50 characters"))]
    pub search: Option<String>,
}

impl ListDiscountCodesQuery {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        page_offset(self.page(), self.page_size())
    }
}

pub fn validate_type_fields(
    discount_type: DiscountType,
    percent: Option<i32>,
    amount_cents: Option<i32>,
) -> Result<(), String> {
    match discount_type {
        DiscountType::Percentage if percent.is_none() => {
            Err("Percentage codes require discount_percent".to_string())
        },
        DiscountType::FixedAmount if amount_cents.is_none() => {
            Err("Fixed amount codes require discount_amount_cents".to_string())
        },
        _ => Ok(()),
    }
}

fn default_true() -> bool {
    true
}

fn default_generate_count() -> u32 {
    1
}

fn default_code_length() -> usize {
    8
}

fn default_generated_type() -> DiscountType {
    DiscountType::Percentage
}

fn default_generated_percent() -> Option<i32> {
    Some(10)
}

fn default_generated_description() -> String {
    "Generated code".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_create_request_normalizes_code() {
        let request: CreateDiscountCodeRequest = serde_json::from_value(serde_json::json!({
            "code": "  spring25 ",
            "discount_type": "percentage",
            "discount_percent": 25
        }))
        .unwrap();
        assert_eq!(request.normalized_code().unwrap(), "SPRING25");

        let blank = CreateDiscountCodeRequest {
            code: "   ".to_string(),
            ..request
        };
        assert!(blank.validate().is_ok());
        assert!(blank.normalized_code().is_err());
    }

    #[test]
    fn test_list_query_page_bounds() {
        let query: ListDiscountCodesQuery =
            serde_json::from_str(r#"{"page": 9223372036854775807, "page_size": 100}"#).unwrap();
        assert!(query.validate().is_err());
        assert_eq!(query.offset(), i64::MAX);

        let query: ListDiscountCodesQuery = serde_json::from_str(r#"{"page": 2}"#).unwrap();
        assert!(query.validate().is_ok());
        assert_eq!(query.offset(), 10);
    }

    fn code(discount_type: &str) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: Uuid::new_v4(),
            code: "SPRING25".to_string(),
            description: None,
            discount_type: discount_type.to_string(),
            discount_percent: Some(25),
            discount_amount_cents: Some(1999),
            max_uses: None,
            current_uses: 0,
            expires_at: None,
            is_active: true,
            development_only: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_percentage_code() {
        let c = code("percentage");
        let result = evaluate_discount(Some(&c), Utc::now(), Environment::Production).unwrap();
        assert!(result.valid);
        assert_eq!(result.discount_percent, 25);
        assert_eq!(result.discount_message, "25% discount");
        assert_eq!(result.message, "Discount code applied successfully");
        assert_eq!(result.code_id, c.id);
    }

    #[test]
    fn test_fixed_amount_uses_placeholder_percent() {
        let c = code("fixed_amount");
        let result = evaluate_discount(Some(&c), Utc::now(), Environment::Production).unwrap();
        assert_eq!(result.discount_percent, 100);
        assert_eq!(result.discount_message, "$19.99 discount");
        assert_eq!(result.discount_amount_cents, Some(1999));
    }

    #[test]
    fn test_free_trial() {
        let c = code("free_trial");
        let result = evaluate_discount(Some(&c), Utc::now(), Environment::Production).unwrap();
        assert_eq!(result.discount_percent, 100);
        assert_eq!(result.discount_message, "Free trial");
    }

    #[test]
    fn test_unknown_or_inactive_code() {
        assert_eq!(
            evaluate_discount(None, Utc::now(), Environment::Development),
            Err(DiscountRejection::Unknown)
        );

        let mut c = code("percentage");
        c.is_active = false;
        assert_eq!(
            evaluate_discount(Some(&c), Utc::now(), Environment::Development),
            Err(DiscountRejection::Unknown)
        );
    }

    #[test]
    fn test_expired_code_is_never_valid() {
        let now = Utc::now();
        let mut c = code("percentage");
        c.expires_at = Some(now - Duration::minutes(1));

        assert_eq!(
            evaluate_discount(Some(&c), now, Environment::Development),
            Err(DiscountRejection::Expired)
        );

        c.is_active = false;
        assert!(evaluate_discount(Some(&c), now, Environment::Development).is_err());
    }

    #[test]
    fn test_exhausted_code() {
        let mut c = code("percentage");
        c.max_uses = Some(5);
        c.current_uses = 5;
        assert_eq!(
            evaluate_discount(Some(&c), Utc::now(), Environment::Production),
            Err(DiscountRejection::Exhausted)
        );

        c.current_uses = 4;
        assert!(evaluate_discount(Some(&c), Utc::now(), Environment::Production).is_ok());
    }

    #[test]
    fn test_development_only_code() {
        let mut c = code("percentage");
        c.development_only = true;
        assert_eq!(
            evaluate_discount(Some(&c), Utc::now(), Environment::Production),
            Err(DiscountRejection::DevelopmentOnly)
        );
        assert_eq!(
            DiscountRejection::DevelopmentOnly.message(),
            "This discount code is not valid in production"
        );
        assert!(evaluate_discount(Some(&c), Utc::now(), Environment::Development).is_ok());
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(500), "5.00");
        assert_eq!(format_cents(1999), "19.99");
        assert_eq!(format_cents(7), "0.07");
    }

    #[test]
    fn test_generate_code_shape() {
        let generated = generate_code("VIP-", 8);
        assert!(generated.starts_with("VIP-"));
        assert_eq!(generated.len(), 12);
        assert!(generated[4..]
            .bytes()
            .all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_type_fields_required() {
        assert!(validate_type_fields(DiscountType::Percentage, None, None).is_err());
        assert!(validate_type_fields(DiscountType::FixedAmount, Some(10), None).is_err());
        assert!(validate_type_fields(DiscountType::FreeTrial, None, None).is_ok());
    }
}
