use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{
    LedgerRecord, LedgerRecordWithStudent, RecordFields, RecordId, RecordIdSource, RecordInput,
    Student, StudentFilter, StudentId, StudentInput, TimestampIds,
};
use crate::storage::{Repository, StoreError};

use super::AppError;
use super::reporting::{self, LedgerOverview};

/// How many ids `create_record` tries before reporting the conflict.
pub const CREATE_RECORD_ATTEMPTS: usize = 2;

/// Application service providing the operations behind every surface
/// (HTTP API, CLI reports, exports).
#[derive(Clone)]
pub struct SchoolService {
    repo: Repository,
    ids: Arc<dyn RecordIdSource>,
}

/// Outcome of deleting a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StudentDeletion {
    /// The student had ledger records and was flagged inactive instead.
    Deactivated { student: Student, record_count: i64 },
    /// The student had no ledger records and was removed.
    Deleted { id: StudentId },
}

/// Dashboard totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardOverview {
    #[serde(flatten)]
    pub ledger: LedgerOverview,
    pub student_count: i64,
}

impl SchoolService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            ids: Arc::new(TimestampIds),
        }
    }

    /// Replace the source of ledger record ids.
    pub fn with_id_source(mut self, ids: impl RecordIdSource + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Initialize a database at the given path, creating it if needed.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Student operations
    // ========================

    pub async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, AppError> {
        Ok(self.repo.list_students(filter).await?)
    }

    pub async fn get_student(&self, id: StudentId) -> Result<Student, AppError> {
        self.repo
            .get_student(id)
            .await?
            .ok_or(AppError::StudentNotFound(id))
    }

    /// Register a new student.
    pub async fn create_student(&self, input: &StudentInput) -> Result<Student, AppError> {
        let fields = input.validate()?;

        let student = self
            .repo
            .insert_student(&fields, Utc::now())
            .await
            .map_err(|e| duplicate_email(e, fields.email.as_deref()))?;

        info!(student_id = student.id, name = %student.name, "student created");
        Ok(student)
    }

    /// Replace a student's name, contact details and active flag.
    pub async fn update_student(
        &self,
        id: StudentId,
        input: &StudentInput,
    ) -> Result<Student, AppError> {
        // Unknown ids are reported before validation problems
        self.get_student(id).await?;
        let fields = input.validate()?;

        let student = self
            .repo
            .update_student(id, &fields)
            .await
            .map_err(|e| duplicate_email(e, fields.email.as_deref()))?
            .ok_or(AppError::StudentNotFound(id))?;

        info!(student_id = id, "student updated");
        Ok(student)
    }

    /// Delete a student. Students referenced by ledger records are kept
    /// and flagged inactive; the others are removed.
    pub async fn delete_student(&self, id: StudentId) -> Result<StudentDeletion, AppError> {
        let record_count = self.repo.count_records_for_student(id).await?;

        if record_count > 0 {
            let student = self
                .repo
                .set_student_active(id, false)
                .await?
                .ok_or(AppError::StudentNotFound(id))?;
            info!(student_id = id, record_count, "student deactivated");
            return Ok(StudentDeletion::Deactivated {
                student,
                record_count,
            });
        }

        if !self.repo.delete_student(id).await? {
            return Err(AppError::StudentNotFound(id));
        }
        info!(student_id = id, "student deleted");
        Ok(StudentDeletion::Deleted { id })
    }

    // ========================
    // Ledger record operations
    // ========================

    /// All ledger records, newest first.
    pub async fn list_records(&self) -> Result<Vec<LedgerRecord>, AppError> {
        Ok(self.repo.list_records().await?)
    }

    /// All ledger records with their student's name, newest first.
    pub async fn list_records_with_student(
        &self,
    ) -> Result<Vec<LedgerRecordWithStudent>, AppError> {
        Ok(self.repo.list_records_with_student().await?)
    }

    pub async fn get_record(&self, id: &str) -> Result<LedgerRecordWithStudent, AppError> {
        self.repo
            .get_record(id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound(id.to_string()))
    }

    /// Create a ledger record with a server-generated id.
    ///
    /// The first attempt uses the primary id; if that id is taken the
    /// suggested replacement is tried once more.
    pub async fn create_record(
        &self,
        input: &RecordInput,
    ) -> Result<LedgerRecordWithStudent, AppError> {
        let fields = input.validate()?;
        let now = Utc::now();
        let mut id = self.ids.primary(now);
        let mut attempt = 1;

        loop {
            match self.insert_record(&fields, id, now).await {
                Err(AppError::DuplicateRecordId {
                    id: taken,
                    suggested_id,
                }) if attempt < CREATE_RECORD_ATTEMPTS => {
                    warn!(%taken, %suggested_id, attempt, "record id taken, retrying");
                    id = suggested_id;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Create a ledger record with a caller-chosen id, without retrying.
    pub async fn create_record_with_id(
        &self,
        input: &RecordInput,
        id: RecordId,
    ) -> Result<LedgerRecordWithStudent, AppError> {
        let fields = input.validate()?;
        self.insert_record(&fields, id, Utc::now()).await
    }

    async fn insert_record(
        &self,
        fields: &RecordFields,
        id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<LedgerRecordWithStudent, AppError> {
        let record = LedgerRecord::new(id, fields.clone(), now);

        match self.repo.insert_record(&record).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(AppError::DuplicateRecordId {
                    suggested_id: self.ids.fallback(now),
                    id: record.id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            record_id = %record.id,
            kind = %record.kind,
            amount_cents = record.amount_cents,
            "ledger record created"
        );

        // Read back so the caller sees stored precision and the student's name
        self.repo
            .get_record(&record.id)
            .await?
            .ok_or(AppError::RecordNotFound(record.id))
    }

    /// Replace a ledger record's fields. The creation time is kept unless
    /// the input carries one.
    pub async fn update_record(
        &self,
        id: &str,
        input: &RecordInput,
    ) -> Result<LedgerRecordWithStudent, AppError> {
        let fields = input.validate()?;

        let record = self
            .repo
            .update_record(id, &fields, Utc::now())
            .await?
            .ok_or_else(|| AppError::RecordNotFound(id.to_string()))?;

        info!(record_id = %id, "ledger record updated");
        Ok(record)
    }

    pub async fn delete_record(&self, id: &str) -> Result<(), AppError> {
        if !self.repo.delete_record(id).await? {
            return Err(AppError::RecordNotFound(id.to_string()));
        }
        info!(record_id = %id, "ledger record deleted");
        Ok(())
    }

    // ========================
    // Reporting
    // ========================

    /// Snapshot of every record with its student's name, for the reporting
    /// functions in [`reporting`].
    pub async fn report_snapshot(&self) -> Result<Vec<LedgerRecordWithStudent>, AppError> {
        self.list_records_with_student().await
    }

    pub async fn dashboard_overview(&self) -> Result<DashboardOverview, AppError> {
        let records = self.report_snapshot().await?;
        let student_count = self.repo.count_students().await?;

        Ok(DashboardOverview {
            ledger: reporting::overview(&records),
            student_count,
        })
    }
}

fn duplicate_email(err: StoreError, email: Option<&str>) -> AppError {
    match (err, email) {
        (StoreError::Conflict(_), Some(email)) => AppError::DuplicateEmail(email.to_string()),
        (err, _) => err.into(),
    }
}
