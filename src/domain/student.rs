use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ValidationError, require_text, validate_email};

pub type StudentId = i64;

/// A person tracked for billing and ledger purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub active: bool,
}

/// Student fields as submitted by a create or edit form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Validated, normalized student fields ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentFields {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
}

impl StudentInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Trim text fields, drop blank optionals and check the required ones.
    /// A missing `active` flag means active.
    pub fn validate(&self) -> Result<StudentFields, ValidationError> {
        let name = require_text("name", self.name.as_deref())?;
        let email = non_blank(self.email.as_deref());
        if let Some(email) = &email {
            validate_email(email)?;
        }

        Ok(StudentFields {
            name,
            email,
            phone: non_blank(self.phone.as_deref()),
            active: self.active != Some(false),
        })
    }
}

/// Filters for listing students.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentFilter {
    /// Case-insensitive substring of the student's name.
    pub search: Option<String>,
    pub active: Option<bool>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
