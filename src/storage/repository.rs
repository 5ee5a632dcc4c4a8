use anyhow::{Context, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::debug;

use crate::domain::{
    LedgerRecord, LedgerRecordWithStudent, RecordFields, RecordKind, Student, StudentFields,
    StudentFilter, StudentId,
};

use super::MIGRATION_001_INITIAL;

/// Failure of a single statement against the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const STUDENT_COLUMNS: &str = "id, name, email, phone, registered_at, active";

const RECORD_COLUMNS: &str = "rp.id, rp.user_id, rp.student_id, rp.description, rp.kind, rp.amount_cents, rp.created_at, rp.updated_at, rp.metadata, rp.document_name, rp.document_path";

/// Repository for persisting and querying students and ledger records.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> StoreResult<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Student operations
    // ========================

    /// Insert a student and return it with its assigned id.
    pub async fn insert_student(
        &self,
        fields: &StudentFields,
        registered_at: DateTime<Utc>,
    ) -> StoreResult<Student> {
        let result = sqlx::query(
            r#"
            INSERT INTO students (name, email, phone, registered_at, active)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(timestamp(registered_at))
        .bind(fields.active)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "Failed to save student"))?;

        let id = result.last_insert_rowid();
        debug!(student_id = id, "student inserted");

        self.get_student(id)
            .await?
            .ok_or_else(|| anyhow!("Student {} vanished after insert", id).into())
    }

    /// Get a student by ID.
    pub async fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM students WHERE id = ?",
            STUDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch student")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_student(&row)?)),
            None => Ok(None),
        }
    }

    /// List students, active first and then by name.
    pub async fn list_students(&self, filter: &StudentFilter) -> StoreResult<Vec<Student>> {
        let mut query = format!("SELECT {} FROM students WHERE 1=1", STUDENT_COLUMNS);
        if filter.active.is_some() {
            query.push_str(" AND active = ?");
        }
        query.push_str(" ORDER BY active DESC, name COLLATE NOCASE ASC");

        let mut sql_query = sqlx::query(&query);
        if let Some(active) = filter.active {
            sql_query = sql_query.bind(active);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list students")?;

        let students = rows
            .iter()
            .map(Self::row_to_student)
            .collect::<anyhow::Result<Vec<_>>>()?;

        // SQLite's LOWER/LIKE only fold ASCII, so the name match runs here
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        Ok(match needle {
            Some(needle) => students
                .into_iter()
                .filter(|s| name_matches(&s.name, &needle))
                .collect(),
            None => students,
        })
    }

    /// Overwrite a student's editable fields. Returns `None` when the id is unknown.
    pub async fn update_student(
        &self,
        id: StudentId,
        fields: &StudentFields,
    ) -> StoreResult<Option<Student>> {
        let result = sqlx::query(
            r#"
            UPDATE students
            SET name = ?, email = ?, phone = ?, active = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(fields.active)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "Failed to update student"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_student(id).await
    }

    /// Flip a student's active flag. Returns `None` when the id is unknown.
    pub async fn set_student_active(
        &self,
        id: StudentId,
        active: bool,
    ) -> StoreResult<Option<Student>> {
        let result = sqlx::query("UPDATE students SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update student status")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_student(id).await
    }

    /// Delete a student row. Returns whether a row was removed.
    pub async fn delete_student(&self, id: StudentId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete student")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_students(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM students")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count students")?
            .get("count");
        Ok(count)
    }

    /// Number of ledger records referencing a student.
    pub async fn count_records_for_student(&self, id: StudentId) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM ledger_records WHERE student_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count records for student")?
                .get("count");
        Ok(count)
    }

    fn row_to_student(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Student> {
        let registered_at_str: String = row.get("registered_at");

        Ok(Student {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            phone: row.get("phone"),
            registered_at: parse_timestamp(&registered_at_str)
                .context("Invalid registered_at timestamp")?,
            active: row.get::<i32, _>("active") != 0,
        })
    }

    // ========================
    // Ledger record operations
    // ========================

    /// Insert a ledger record. A duplicate id yields [`StoreError::Conflict`].
    pub async fn insert_record(&self, record: &LedgerRecord) -> StoreResult<()> {
        let metadata_json = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode record metadata")?;

        sqlx::query(
            r#"
            INSERT INTO ledger_records (id, user_id, student_id, description, kind, amount_cents, created_at, updated_at, metadata, document_name, document_path)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.user_id)
        .bind(record.student_id)
        .bind(&record.description)
        .bind(record.kind.as_str())
        .bind(record.amount_cents)
        .bind(timestamp(record.created_at))
        .bind(timestamp(record.updated_at))
        .bind(metadata_json)
        .bind(&record.document_name)
        .bind(&record.document_path)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "Failed to save ledger record"))?;

        debug!(record_id = %record.id, "ledger record inserted");
        Ok(())
    }

    /// Get a ledger record by ID, joined with its student's name.
    pub async fn get_record(&self, id: &str) -> StoreResult<Option<LedgerRecordWithStudent>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}, a.name as student_name
            FROM ledger_records rp
            LEFT JOIN students a ON rp.student_id = a.id
            WHERE rp.id = ?
            "#,
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch ledger record")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_record_with_student(&row)?)),
            None => Ok(None),
        }
    }

    /// List all ledger records, newest first.
    pub async fn list_records(&self) -> StoreResult<Vec<LedgerRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ledger_records rp ORDER BY rp.created_at DESC",
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger records")?;

        Ok(rows
            .iter()
            .map(Self::row_to_record)
            .collect::<anyhow::Result<_>>()?)
    }

    /// List all ledger records with their student's name, newest first.
    /// Records whose student no longer exists are kept with no name.
    pub async fn list_records_with_student(&self) -> StoreResult<Vec<LedgerRecordWithStudent>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}, a.name as student_name
            FROM ledger_records rp
            LEFT JOIN students a ON rp.student_id = a.id
            ORDER BY rp.created_at DESC
            "#,
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger records with student names")?;

        Ok(rows
            .iter()
            .map(Self::row_to_record_with_student)
            .collect::<anyhow::Result<_>>()?)
    }

    /// Overwrite a ledger record's fields. Returns `None` when the id is unknown.
    pub async fn update_record(
        &self,
        id: &str,
        fields: &RecordFields,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<LedgerRecordWithStudent>> {
        let metadata_json = fields
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode record metadata")?;

        let result = sqlx::query(
            r#"
            UPDATE ledger_records
            SET user_id = ?, student_id = ?, description = ?, kind = ?, amount_cents = ?,
                created_at = COALESCE(?, created_at), updated_at = ?,
                metadata = ?, document_name = ?, document_path = ?
            WHERE id = ?
            "#,
        )
        .bind(fields.user_id)
        .bind(fields.student_id)
        .bind(&fields.description)
        .bind(fields.kind.as_str())
        .bind(fields.amount_cents)
        .bind(fields.created_at.map(timestamp))
        .bind(timestamp(updated_at))
        .bind(metadata_json)
        .bind(&fields.document_name)
        .bind(&fields.document_path)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "Failed to update ledger record"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_record(id).await
    }

    /// Delete a ledger record. Returns whether a row was removed.
    pub async fn delete_record(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM ledger_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete ledger record")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<LedgerRecord> {
        let kind_str: String = row.get("kind");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");
        let metadata_json: Option<String> = row.get("metadata");

        Ok(LedgerRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            student_id: row.get("student_id"),
            description: row.get("description"),
            kind: RecordKind::from_str(&kind_str)
                .ok_or_else(|| anyhow!("Invalid record kind: {}", kind_str))?,
            amount_cents: row.get("amount_cents"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at")?,
            metadata: metadata_json
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .context("Invalid record metadata")?,
            document_name: row.get("document_name"),
            document_path: row.get("document_path"),
        })
    }

    fn row_to_record_with_student(
        row: &sqlx::sqlite::SqliteRow,
    ) -> anyhow::Result<LedgerRecordWithStudent> {
        Ok(LedgerRecordWithStudent::new(
            Self::row_to_record(row)?,
            row.get("student_name"),
        ))
    }
}

/// Fixed-width RFC 3339 so that text ordering in SQL matches time ordering.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Case-insensitive substring match; `needle` must already be lowercase.
fn name_matches(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(needle)
}

fn classify(err: sqlx::Error, action: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.message().to_string());
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context(action))
}
