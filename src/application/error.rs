use thiserror::Error;
use tracing::{error, warn};

use crate::domain::{RecordId, StudentId, ValidationError};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Student not found: {0}")]
    StudentNotFound(StudentId),

    #[error("Ledger record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Email already registered for another student: {0}")]
    DuplicateEmail(String),

    #[error("Ledger record id already exists: {id}")]
    DuplicateRecordId { id: RecordId, suggested_id: RecordId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => {
                warn!(%constraint, "store rejected write");
                AppError::Conflict(constraint)
            }
            StoreError::Backend(err) => {
                error!(error = ?err, "data access failed");
                AppError::Database(err)
            }
        }
    }
}

/// Coarse classification used by the outer surfaces (HTTP status, exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::InvalidId(_) => ErrorKind::Validation,
            AppError::StudentNotFound(_) | AppError::RecordNotFound(_) => ErrorKind::NotFound,
            AppError::DuplicateEmail(_)
            | AppError::DuplicateRecordId { .. }
            | AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Database(_) => ErrorKind::Internal,
        }
    }
}
