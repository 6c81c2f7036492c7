//! Validating JSON extractor and custom field validators.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::web::error::ApiError;

/// A JSON extractor that runs `validator` checks after deserializing.
///
/// Malformed JSON is a 400, an oversized body a 413, and failed field
/// checks a 422 listing the offending fields.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| match e.status() {
                StatusCode::PAYLOAD_TOO_LARGE => ApiError::payload_too_large(e.body_text()),
                _ => ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())),
            })?;

        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(ValidatedJson(value))
    }
}

/// Reject strings that are empty after trimming whitespace.
pub fn not_empty_trimmed(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("not_empty_trimmed")
            .with_message("Must not be empty".into()));
    }
    Ok(())
}

/// Reject control characters, including NUL.
pub fn no_control_chars(value: &str) -> Result<(), validator::ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(validator::ValidationError::new("no_control_chars")
            .with_message("Must not contain control characters".into()));
    }
    Ok(())
}

/// Node names: non-blank and free of control characters.
pub fn node_name(value: &str) -> Result<(), validator::ValidationError> {
    not_empty_trimmed(value)?;
    no_control_chars(value)
}

/// Usernames: ASCII letters, digits, `_`, `-` and `.`.
pub fn username_chars(value: &str) -> Result<(), validator::ValidationError> {
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(validator::ValidationError::new("username_chars").with_message(
            "Only letters, digits, '_', '-' and '.' are allowed".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_trimmed() {
        assert!(not_empty_trimmed("Docs").is_ok());
        assert!(not_empty_trimmed("  a  ").is_ok());
        assert!(not_empty_trimmed("").is_err());
        assert!(not_empty_trimmed(" \t\n").is_err());
    }

    #[test]
    fn test_no_control_chars() {
        assert!(no_control_chars("report 2024.pdf").is_ok());
        assert!(no_control_chars("a\x00b").is_err());
        assert!(no_control_chars("line\nbreak").is_err());
    }

    #[test]
    fn test_node_name() {
        assert!(node_name("a.txt").is_ok());
        assert!(node_name("   ").is_err());
        assert!(node_name("tab\there").is_err());
    }

    #[test]
    fn test_username_chars() {
        assert!(username_chars("alice_01").is_ok());
        assert!(username_chars("first.last-2").is_ok());
        assert!(username_chars("bad name").is_err());
        assert!(username_chars("ユーザー").is_err());
    }
}
