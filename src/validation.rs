//! Field checks applied to incoming form payloads

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Fields every submission has to carry, in reporting order.
pub const REQUIRED_FIELDS: [&str; 3] = ["username", "email", "password"];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Loose `local@domain.tld` check. Deliberately not RFC 5322.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Names of required fields that are absent, null, non-string or empty.
pub fn missing_fields(payload: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|name| match payload.get(*name) {
            Some(Value::String(s)) => s.is_empty(),
            _ => true,
        })
        .collect()
}

/// Run the required-field check, then the email check. First failure wins.
pub fn validate(payload: &Map<String, Value>) -> Result<()> {
    let missing = missing_fields(payload);
    if !missing.is_empty() {
        return Err(Error::MissingFields(missing));
    }

    let email = payload.get("email").and_then(Value::as_str).unwrap_or_default();
    if !is_valid_email(email) {
        return Err(Error::InvalidEmail);
    }

    Ok(())
}
