// Validation utilities: request extractors and string field helpers

use axum::{
    extract::{FromRequest, FromRequestParts, Json, Query, Request},
    http::request::Parts,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::utils::service_error::ServiceError;

/// JSON body extractor that runs `validator` rules after deserializing.
/// Malformed bodies and rule violations both become 400 responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Query string extractor with the same validation behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

/// Trim and validate string fields
///
/// # Arguments
/// * `field` - The string field to validate
/// * `required` - Whether the field is required (cannot be empty)
///
/// # Returns
/// * `Ok(String)` - The trimmed string if valid
/// * `Err(String)` - Error message if validation fails
pub fn trim_and_validate_field(field: &str, required: bool) -> Result<String, String> {
    let trimmed = field.trim().to_string();
    if trimmed.is_empty() && required {
        Err("Field cannot be empty".to_string())
    } else {
        Ok(trimmed)
    }
}

/// Trim an optional string field, mapping blank values to `None`
pub fn trim_optional_field(field: Option<&String>) -> Option<String> {
    field.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

lazy_static! {
    static ref COLOR_HEX_REGEX: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
}

/// Validator for `#RRGGBB` color strings
pub fn validate_color_hex(value: &str) -> Result<(), validator::ValidationError> {
    if COLOR_HEX_REGEX.is_match(value) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("color_hex");
        err.message = Some("Color must be a #RRGGBB hex value".into());
        Err(err)
    }
}

/// Row offset for a 1-based page; never overflows
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    page.max(1).saturating_sub(1).saturating_mul(per_page.max(0))
}
