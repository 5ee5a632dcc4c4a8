use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    AmountInput, Cents, StudentId, ValidationError, require_text, validate_positive,
};

/// Ledger record identity: a prefixed timestamp token such as `REG-1705312800000`.
pub type RecordId = String;

pub type UserId = i64;

/// Owner used when a form does not say who recorded the entry.
pub const DEFAULT_USER_ID: UserId = 1;

const RECORD_ID_PREFIX: &str = "REG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[serde(alias = "ingreso")]
    Income,
    #[serde(alias = "egreso")]
    Expense,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Income => "income",
            RecordKind::Expense => "expense",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" | "ingreso" => Some(RecordKind::Income),
            "expense" | "egreso" => Some(RecordKind::Expense),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One income or expense entry associated with a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub student_id: StudentId,
    pub description: String,
    pub kind: RecordKind,
    pub amount_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
    pub document_name: Option<String>,
    pub document_path: Option<String>,
}

impl LedgerRecord {
    pub fn new(id: RecordId, fields: RecordFields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: fields.user_id,
            student_id: fields.student_id,
            description: fields.description,
            kind: fields.kind,
            amount_cents: fields.amount_cents,
            created_at: fields.created_at.unwrap_or(now),
            updated_at: now,
            metadata: fields.metadata,
            document_name: fields.document_name,
            document_path: fields.document_path,
        }
    }

    pub fn is_income(&self) -> bool {
        self.kind == RecordKind::Income
    }
}

/// A ledger record joined with its student's display name.
///
/// `student_name` is `None` when the student reference is dangling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecordWithStudent {
    #[serde(flatten)]
    pub record: LedgerRecord,
    pub student_name: Option<String>,
}

impl LedgerRecordWithStudent {
    pub fn new(record: LedgerRecord, student_name: Option<String>) -> Self {
        Self {
            record,
            student_name,
        }
    }
}

/// Ledger record fields as submitted by a create or edit form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordInput {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub student_id: Option<StudentId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub document_path: Option<String>,
}

/// Validated ledger record fields ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    pub user_id: UserId,
    pub student_id: StudentId,
    pub description: String,
    pub kind: RecordKind,
    pub amount_cents: Cents,
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub document_name: Option<String>,
    pub document_path: Option<String>,
}

impl RecordInput {
    pub fn new(
        student_id: StudentId,
        description: impl Into<String>,
        kind: RecordKind,
        amount: impl Into<AmountInput>,
    ) -> Self {
        Self {
            student_id: Some(student_id),
            description: Some(description.into()),
            kind: Some(kind.as_str().to_string()),
            amount: Some(amount.into()),
            ..Default::default()
        }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_document(mut self, name: impl Into<String>, path: Option<String>) -> Self {
        self.document_name = Some(name.into());
        self.document_path = path;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check required fields, coerce the amount and require it to be positive.
    pub fn validate(&self) -> Result<RecordFields, ValidationError> {
        let student_id = self
            .student_id
            .ok_or(ValidationError::MissingField("student_id"))?;
        let description = require_text("description", self.description.as_deref())?;
        let kind_str = require_text("kind", self.kind.as_deref())?;
        let kind =
            RecordKind::from_str(&kind_str).ok_or(ValidationError::InvalidKind(kind_str))?;
        let amount = self
            .amount
            .as_ref()
            .ok_or(ValidationError::MissingField("amount"))?;
        let amount_cents = validate_positive(amount.to_cents()?)?;

        Ok(RecordFields {
            user_id: self.user_id.unwrap_or(DEFAULT_USER_ID),
            student_id,
            description,
            kind,
            amount_cents,
            created_at: self.created_at,
            metadata: self.metadata.clone().filter(|m| !m.is_null()),
            document_name: self.document_name.clone().filter(|d| !d.trim().is_empty()),
            document_path: self.document_path.clone().filter(|d| !d.trim().is_empty()),
        })
    }
}

/// Source of ledger record identities.
///
/// `primary` is tried first; `fallback` supplies a fresh token after a
/// uniqueness conflict and must not repeat `primary` for the same instant.
pub trait RecordIdSource: Send + Sync {
    fn primary(&self, now: DateTime<Utc>) -> RecordId;
    fn fallback(&self, now: DateTime<Utc>) -> RecordId;
}

/// `REG-<unix millis>`, falling back to `REG-<unix millis>-<random suffix>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampIds;

impl RecordIdSource for TimestampIds {
    fn primary(&self, now: DateTime<Utc>) -> RecordId {
        format!("{}-{}", RECORD_ID_PREFIX, now.timestamp_millis())
    }

    fn fallback(&self, now: DateTime<Utc>) -> RecordId {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            RECORD_ID_PREFIX,
            now.timestamp_millis(),
            &suffix[..8]
        )
    }
}
