mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use bursar::application::AppError;
use bursar::domain::{
    AmountInput, RecordId, RecordIdSource, RecordInput, RecordKind, ValidationError,
};
use chrono::{DateTime, Utc};
use common::{Roster, parse_date, record_at, test_service};
use serde_json::json;

/// Always hands out the same primary id, then `<primary>-a`, `<primary>-b`...
struct FixedIds {
    primary: &'static str,
    fallbacks: AtomicUsize,
}

impl FixedIds {
    fn new(primary: &'static str) -> Self {
        Self {
            primary,
            fallbacks: AtomicUsize::new(0),
        }
    }
}

impl RecordIdSource for FixedIds {
    fn primary(&self, _now: DateTime<Utc>) -> RecordId {
        self.primary.to_string()
    }

    fn fallback(&self, _now: DateTime<Utc>) -> RecordId {
        let n = self.fallbacks.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.primary, (b'a' + n as u8) as char)
    }
}

#[tokio::test]
async fn test_create_record() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;

    let input = RecordInput::new(roster.ana.id, "Cuota marzo", RecordKind::Income, 15050_i64)
        .at(parse_date("2024-03-10"))
        .with_document("recibo.pdf", Some("/uploads/recibo.pdf".into()))
        .with_metadata(json!({ "method": "cash" }));
    let created = service.create_record(&input).await?;

    assert!(created.record.id.starts_with("REG-"));
    assert_eq!(created.record.kind, RecordKind::Income);
    assert_eq!(created.record.amount_cents, 15050);
    assert_eq!(created.record.user_id, 1);
    assert_eq!(created.record.created_at, parse_date("2024-03-10"));
    assert_eq!(created.record.document_name.as_deref(), Some("recibo.pdf"));
    assert_eq!(
        created.record.document_path.as_deref(),
        Some("/uploads/recibo.pdf")
    );
    assert_eq!(created.record.metadata, Some(json!({ "method": "cash" })));
    assert_eq!(created.student_name.as_deref(), Some("Ana"));

    let fetched = service.get_record(&created.record.id).await?;
    assert_eq!(fetched, created);

    Ok(())
}

#[tokio::test]
async fn test_create_record_coerces_text_amount_and_spanish_kind() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;

    let input = RecordInput {
        student_id: Some(roster.luis.id),
        description: Some("Material".into()),
        kind: Some("egreso".into()),
        amount: Some(AmountInput::Text("42.5".into())),
        ..Default::default()
    };
    let created = service.create_record(&input).await?;

    assert_eq!(created.record.kind, RecordKind::Expense);
    assert_eq!(created.record.amount_cents, 4250);
    assert_eq!(created.record.created_at, created.record.updated_at);

    Ok(())
}

#[tokio::test]
async fn test_create_record_rejects_invalid_input() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;

    let zero = RecordInput::new(roster.ana.id, "Nada", RecordKind::Income, 0_i64);
    assert!(matches!(
        service.create_record(&zero).await,
        Err(AppError::Validation(ValidationError::InvalidAmount(_)))
    ));

    let negative = RecordInput::new(roster.ana.id, "Nada", RecordKind::Income, -500_i64);
    assert!(matches!(
        service.create_record(&negative).await,
        Err(AppError::Validation(ValidationError::InvalidAmount(_)))
    ));

    let mut bad_kind = RecordInput::new(roster.ana.id, "Beca", RecordKind::Income, 100_i64);
    bad_kind.kind = Some("donation".into());
    assert!(matches!(
        service.create_record(&bad_kind).await,
        Err(AppError::Validation(ValidationError::InvalidKind(_)))
    ));

    let missing = RecordInput::default();
    assert!(matches!(
        service.create_record(&missing).await,
        Err(AppError::Validation(ValidationError::MissingField(_)))
    ));

    assert!(service.list_records().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create_record_rejects_oversized_amounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;

    for amount in [
        AmountInput::Text("99999999999999999".into()),
        AmountInput::Number(9.0e16),
        AmountInput::Number(1.0e30),
        AmountInput::Text("10000000000.01".into()),
    ] {
        let mut input = RecordInput::new(roster.ana.id, "Cuota", RecordKind::Income, 100_i64);
        input.amount = Some(amount);
        assert!(matches!(
            service.create_record(&input).await,
            Err(AppError::Validation(ValidationError::InvalidAmount(_)))
        ));
    }

    // The largest accepted amount still goes through
    let mut input = RecordInput::new(roster.ana.id, "Cuota", RecordKind::Income, 100_i64);
    input.amount = Some(AmountInput::Text("10000000000.00".into()));
    let created = service.create_record(&input).await?;
    assert_eq!(created.record.amount_cents, 1_000_000_000_000);

    assert_eq!(service.list_records().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_create_record_retries_with_fallback_id() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = service.with_id_source(FixedIds::new("REG-1"));
    let roster = Roster::create(&service).await?;

    let first = service
        .create_record(&RecordInput::new(roster.ana.id, "Cuota", RecordKind::Income, 1000_i64))
        .await?;
    assert_eq!(first.record.id, "REG-1");

    // Same primary id again: the retry uses the fallback
    let second = service
        .create_record(&RecordInput::new(roster.ana.id, "Cuota", RecordKind::Income, 1000_i64))
        .await?;
    assert_eq!(second.record.id, "REG-1-a");

    assert_eq!(service.list_records().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_create_record_gives_up_after_second_conflict() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;
    let input = RecordInput::new(roster.ana.id, "Cuota", RecordKind::Income, 1000_i64);

    service
        .create_record_with_id(&input, "REG-1".to_string())
        .await?;
    service
        .create_record_with_id(&input, "REG-1-a".to_string())
        .await?;

    let service = service.with_id_source(FixedIds::new("REG-1"));
    match service.create_record(&input).await {
        Err(AppError::DuplicateRecordId { id, suggested_id }) => {
            assert_eq!(id, "REG-1-a");
            assert_eq!(suggested_id, "REG-1-b");
        }
        other => panic!("expected duplicate id error, got {:?}", other),
    }

    assert_eq!(service.list_records().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_create_record_with_taken_id_suggests_another() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;
    let input = RecordInput::new(roster.ana.id, "Cuota", RecordKind::Income, 1000_i64);

    service
        .create_record_with_id(&input, "REG-42".to_string())
        .await?;

    match service
        .create_record_with_id(&input, "REG-42".to_string())
        .await
    {
        Err(AppError::DuplicateRecordId { id, suggested_id }) => {
            assert_eq!(id, "REG-42");
            assert!(suggested_id.starts_with("REG-"));
            assert_ne!(suggested_id, id);
        }
        other => panic!("expected duplicate id error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_rapid_creates_get_distinct_ids() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;

    let mut ids = Vec::new();
    for _ in 0..5 {
        let record = service
            .create_record(&RecordInput::new(roster.ana.id, "Cuota", RecordKind::Income, 100_i64))
            .await?;
        ids.push(record.record.id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_record_for_unknown_student_has_no_name() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let created = service
        .create_record(&RecordInput::new(999, "Huérfano", RecordKind::Income, 500_i64))
        .await?;
    assert_eq!(created.student_name, None);

    let records = service.list_records_with_student().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].student_name, None);

    Ok(())
}

#[tokio::test]
async fn test_list_records_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;

    for date in ["2024-02-01", "2024-04-01", "2024-03-01"] {
        record_at(&service, roster.ana.id, RecordKind::Income, 100, parse_date(date)).await?;
    }

    let dates: Vec<String> = service
        .list_records()
        .await?
        .iter()
        .map(|r| r.created_at.date_naive().to_string())
        .collect();
    assert_eq!(dates, vec!["2024-04-01", "2024-03-01", "2024-02-01"]);

    Ok(())
}

#[tokio::test]
async fn test_update_record() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;

    let created = record_at(
        &service,
        roster.ana.id,
        RecordKind::Income,
        1000,
        parse_date("2024-01-15"),
    )
    .await?;

    // Without created_at the original date is kept
    let updated = service
        .update_record(
            &created.record.id,
            &RecordInput::new(roster.luis.id, "Cuota corregida", RecordKind::Expense, 2000_i64),
        )
        .await?;
    assert_eq!(updated.record.id, created.record.id);
    assert_eq!(updated.record.student_id, roster.luis.id);
    assert_eq!(updated.record.description, "Cuota corregida");
    assert_eq!(updated.record.kind, RecordKind::Expense);
    assert_eq!(updated.record.amount_cents, 2000);
    assert_eq!(updated.record.created_at, parse_date("2024-01-15"));
    assert!(updated.record.updated_at >= created.record.updated_at);
    assert_eq!(updated.student_name.as_deref(), Some("Luis"));

    let moved = service
        .update_record(
            &created.record.id,
            &RecordInput::new(roster.luis.id, "Cuota corregida", RecordKind::Expense, 2000_i64)
                .at(parse_date("2024-02-01")),
        )
        .await?;
    assert_eq!(moved.record.created_at, parse_date("2024-02-01"));

    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_unknown_record() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let input = RecordInput::new(1, "x", RecordKind::Income, 100_i64);
    assert!(matches!(
        service.update_record("REG-0", &input).await,
        Err(AppError::RecordNotFound(ref id)) if id == "REG-0"
    ));
    assert!(matches!(
        service.delete_record("REG-0").await,
        Err(AppError::RecordNotFound(_))
    ));
    assert!(matches!(
        service.get_record("REG-0").await,
        Err(AppError::RecordNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_delete_record() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let roster = Roster::create(&service).await?;

    let created = record_at(
        &service,
        roster.ana.id,
        RecordKind::Income,
        1000,
        parse_date("2024-01-15"),
    )
    .await?;

    service.delete_record(&created.record.id).await?;
    assert!(service.list_records().await?.is_empty());

    // With no records left the student can be removed outright
    assert!(matches!(
        service.delete_student(roster.ana.id).await?,
        bursar::application::StudentDeletion::Deleted { .. }
    ));

    Ok(())
}
