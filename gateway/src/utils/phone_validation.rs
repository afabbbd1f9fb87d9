//! Phone number validation for outbound calls
//!
//! Twilio accepts E.164 numbers (`+` followed by up to 15 digits). Callers
//! often paste numbers with spaces, dashes, dots or parentheses, so those are
//! stripped before the check and the normalized form is what gets dialed.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

// Country codes never start with 0
static E164_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("valid E.164 pattern"));

static FORMATTING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-\.\(\)]").expect("valid formatting pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneValidationError {
    #[error("phone number is empty")]
    Empty,
    #[error("phone number must be in E.164 format (e.g. +14155551234), got '{0}'")]
    NotE164(String),
}

/// Validate and normalize a phone number to E.164.
pub fn validate_phone_number(input: &str) -> Result<String, PhoneValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PhoneValidationError::Empty);
    }

    let normalized = FORMATTING_RE.replace_all(trimmed, "");
    if E164_RE.is_match(&normalized) {
        Ok(normalized.into_owned())
    } else {
        Err(PhoneValidationError::NotE164(trimmed.to_string()))
    }
}
