mod common;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use bursar::domain::{Locale, RecordInput, RecordKind, StudentInput};
use bursar::io::rest::ErrorBody;
use bursar::io::{AppState, create_router};
use chrono::{Datelike, Utc};
use serde_json::{Value, json};
use tower::util::ServiceExt; // for `oneshot`

use common::test_service;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn error_body(value: Value) -> ErrorBody {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_student_crud_over_http() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let app = create_router(AppState::new(service, Locale::Es), None);

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/students",
        Some(json!({ "name": " Ana ", "email": "ana@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Ana");
    assert_eq!(created["active"], true);
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = send(&app, Method::GET, &format!("/api/students/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/students/{}", id),
        Some(json!({ "name": "Ana Pérez", "phone": "555-0101", "active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Ana Pérez");
    assert_eq!(updated["email"], Value::Null);
    assert_eq!(updated["active"], false);

    let (status, list) = send(&app, Method::GET, "/api/students?active=false", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, outcome) =
        send(&app, Method::DELETE, &format!("/api/students/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome, json!({ "outcome": "deleted", "id": id }));

    let (status, body) = send(&app, Method::GET, &format!("/api/students/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error_body(body).error.contains("not found"));

    Ok(())
}

#[tokio::test]
async fn test_student_errors_over_http() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let app = create_router(AppState::new(service, Locale::Es), None);

    let (status, body) = send(&app, Method::POST, "/api/students", Some(json!({ "email": "x@y.z" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = error_body(body);
    assert_eq!(body.error, "Validation failed");
    assert!(body.details.unwrap().contains("name"));

    let (status, _) = send(&app, Method::POST, "/api/students", Some(json!({ "name": "Ana", "email": "a@b.co" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, Method::POST, "/api/students", Some(json!({ "name": "Otra", "email": "a@b.co" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(error_body(body).error.contains("a@b.co"));

    let (status, _) = send(&app, Method::GET, "/api/students/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Malformed JSON gets the same error shape
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/students")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.error, "Invalid request body");

    Ok(())
}

#[tokio::test]
async fn test_record_crud_over_http() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ana = service.create_student(&StudentInput::new("Ana")).await?;
    let app = create_router(AppState::new(service, Locale::Es), None);

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/records",
        Some(json!({
            "student_id": ana.id,
            "description": "Cuota",
            "kind": "ingreso",
            "amount": "150.50",
            "document_name": "recibo.pdf"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["kind"], "income");
    assert_eq!(created["amount_cents"], 15050);
    assert_eq!(created["student_name"], "Ana");
    let id = created["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("REG-"));

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/records/{}", id),
        Some(json!({
            "student_id": ana.id,
            "description": "Cuota",
            "kind": "expense",
            "amount": 20
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["kind"], "expense");
    assert_eq!(updated["amount_cents"], 2000);
    assert_eq!(updated["created_at"], created["created_at"]);

    let (status, list) = send(&app, Method::GET, "/api/records", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["student_name"], "Ana");

    let (status, plain) = send(&app, Method::GET, "/api/records?with_student=false", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(plain[0].get("student_name").is_none());

    // The student has a record now, so delete deactivates it
    let (status, outcome) =
        send(&app, Method::DELETE, &format!("/api/students/{}", ana.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "deactivated");
    assert_eq!(outcome["student"]["active"], false);
    assert_eq!(outcome["record_count"], 1);

    let (status, body) = send(&app, Method::DELETE, &format!("/api/records/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, &format!("/api/records/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_record_errors_over_http() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .create_record_with_id(
            &RecordInput::new(1, "Cuota", RecordKind::Income, 100_i64),
            "REG-7".to_string(),
        )
        .await?;
    let app = create_router(AppState::new(service, Locale::Es), None);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/records",
        Some(json!({ "student_id": 1, "description": "x", "kind": "income", "amount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_body(body).details.unwrap().contains("positive"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/records",
        Some(json!({ "student_id": 1, "description": "x", "kind": "gift", "amount": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/records/REG-0",
        Some(json!({ "student_id": 1, "description": "x", "kind": "income", "amount": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/api/records/REG-0", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_reports_over_http() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let app = create_router(AppState::new(service.clone(), Locale::En), None);

    let (status, empty) = send(&app, Method::GET, "/api/reports/monthly", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["has_data"], false);
    assert_eq!(empty["data"].as_array().unwrap().len(), 12);

    let (_, empty) = send(&app, Method::GET, "/api/reports/students", None).await;
    assert_eq!(empty["has_data"], false);

    let ana = service.create_student(&StudentInput::new("Ana")).await?;
    let when = Utc::now();
    service
        .create_record(&RecordInput::new(ana.id, "Cuota", RecordKind::Income, 10000_i64).at(when))
        .await?;
    service
        .create_record(&RecordInput::new(ana.id, "Libros", RecordKind::Expense, 4000_i64).at(when))
        .await?;
    service
        .create_record(&RecordInput::new(404, "Beca", RecordKind::Income, 2500_i64).at(when))
        .await?;

    let (status, overview) = send(&app, Method::GET, "/api/reports/overview", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["total_income"], 12500);
    assert_eq!(overview["total_expense"], 4000);
    assert_eq!(overview["balance"], 8500);
    assert_eq!(overview["record_count"], 3);
    assert_eq!(overview["student_count"], 1);

    let (status, monthly) = send(&app, Method::GET, "/api/reports/monthly?window=3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(monthly["has_data"], true);
    let months = monthly["data"].as_array().unwrap();
    assert_eq!(months.len(), 3);
    // Look the month up by the records' date; the window may have rolled over since
    let current = months
        .iter()
        .find(|m| m["year"] == when.year() && m["month"] == when.month())
        .expect("record month in window");
    assert_eq!(current["income"], 12500);
    assert_eq!(current["net"], 8500);

    let (status, history) = send(&app, Method::GET, "/api/reports/monthly/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"].as_array().unwrap().len(), 1);

    let (status, students) =
        send(&app, Method::GET, "/api/reports/students?kind=combined", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        students["data"][0],
        json!({ "student": "Ana", "income": 10000, "expense": 4000, "balance": 6000 })
    );
    assert_eq!(students["data"][1]["student"], "Unassigned");

    let (_, ranked) = send(&app, Method::GET, "/api/reports/students?limit=1", None).await;
    assert_eq!(ranked["data"].as_array().unwrap().len(), 1);
    assert_eq!(ranked["data"][0]["rank"], 1);
    assert!((ranked["data"][0]["share_of_total"].as_f64().unwrap() - 80.0).abs() < 1e-9);

    let (status, matrix) =
        send(&app, Method::GET, "/api/reports/matrix?scope=history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(matrix["has_data"], true);
    assert_eq!(matrix["data"]["grand_total"], 12500);
    assert_eq!(matrix["data"]["rows"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, Method::GET, "/api/reports/monthly?window=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::GET, "/api/reports/students?kind=tips", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::GET, "/api/reports/matrix?scope=weekly", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::GET, "/api/reports/monthly?window=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}
