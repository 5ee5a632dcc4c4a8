// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use bursar::application::SchoolService;
use bursar::domain::{
    LedgerRecordWithStudent, RecordInput, RecordKind, Student, StudentId, StudentInput,
};
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(SchoolService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = SchoolService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Test fixture: a small class of students
pub struct Roster {
    pub ana: Student,
    pub luis: Student,
}

impl Roster {
    /// Register Ana and Luis
    pub async fn create(service: &SchoolService) -> Result<Self> {
        let ana = service
            .create_student(&StudentInput::new("Ana").with_email("ana@example.com"))
            .await?;
        let luis = service
            .create_student(&StudentInput::new("Luis").with_phone("555-0101"))
            .await?;
        Ok(Self { ana, luis })
    }
}

/// Record an income or expense for a student at a given date
pub async fn record_at(
    service: &SchoolService,
    student_id: StudentId,
    kind: RecordKind,
    amount_cents: i64,
    date: DateTime<Utc>,
) -> Result<LedgerRecordWithStudent> {
    let input = RecordInput::new(student_id, "test entry", kind, amount_cents).at(date);
    Ok(service.create_record(&input).await?)
}
