use thiserror::Error;

use super::{Cents, ParseCentsError, format_cents};

/// A missing or malformed field in submitted form data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid record kind: {0} (expected income or expense)")]
    InvalidKind(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<ParseCentsError> for ValidationError {
    fn from(err: ParseCentsError) -> Self {
        ValidationError::InvalidAmount(err.to_string())
    }
}

/// Return the trimmed value, or an error when it is absent or blank.
pub fn require_text(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Accepts `local@domain.tld`: no whitespace, exactly one `@`, and a dot
/// inside the domain with text on both sides.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidEmail(email.to_string());

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Largest accepted amount: ten billion units.
pub const MAX_AMOUNT_CENTS: Cents = 1_000_000_000_000;

pub fn validate_positive(amount: Cents) -> Result<Cents, ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    if amount > MAX_AMOUNT_CENTS {
        return Err(ValidationError::InvalidAmount(format!(
            "Amount must not exceed {}",
            format_cents(MAX_AMOUNT_CENTS)
        )));
    }
    Ok(amount)
}
