use anyhow::Result;
use std::io::Write;

use crate::application::SchoolService;
use crate::domain::{Locale, StudentFilter, format_cents};

/// Exporter for writing ledger data as CSV.
pub struct Exporter<'a> {
    service: &'a SchoolService,
    locale: Locale,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a SchoolService, locale: Locale) -> Self {
        Self { service, locale }
    }

    /// Export ledger records, newest first, with their student's name.
    pub async fn export_records_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let records = self.service.list_records_with_student().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "created_at",
            "updated_at",
            "kind",
            "amount",
            "amount_cents",
            "student_id",
            "student",
            "user_id",
            "description",
            "document_name",
            "document_path",
            "metadata",
        ])?;

        for entry in &records {
            let record = &entry.record;
            let student = entry
                .student_name
                .as_deref()
                .unwrap_or(self.locale.unassigned_label());

            csv_writer.write_record([
                record.id.clone(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
                record.kind.to_string(),
                format_cents(record.amount_cents),
                record.amount_cents.to_string(),
                record.student_id.to_string(),
                student.to_string(),
                record.user_id.to_string(),
                record.description.clone(),
                record.document_name.clone().unwrap_or_default(),
                record.document_path.clone().unwrap_or_default(),
                record
                    .metadata
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(records.len())
    }

    /// Export every student, active first.
    pub async fn export_students_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let students = self.service.list_students(&StudentFilter::default()).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "name", "email", "phone", "registered_at", "active"])?;

        for student in &students {
            csv_writer.write_record([
                student.id.to_string(),
                student.name.clone(),
                student.email.clone().unwrap_or_default(),
                student.phone.clone().unwrap_or_default(),
                student.registered_at.to_rfc3339(),
                student.active.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(students.len())
    }
}
