//! # REST API for Ledger Records
//!
//! Endpoints for listing, creating, editing and deleting income/expense records.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use super::{ApiResult, AppState};
use crate::domain::RecordInput;

/// Query parameters for the record listing API
#[derive(Debug, Default, Deserialize)]
pub struct RecordListQuery {
    /// Join each record with its student's name (default true).
    pub with_student: Option<bool>,
}

/// List ledger records, newest first
pub async fn list_records(
    State(state): State<AppState>,
    query: Result<Query<RecordListQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    info!("GET /api/records - query: {:?}", query);

    if query.with_student.unwrap_or(true) {
        let records = state.service.list_records_with_student().await?;
        Ok(Json(records).into_response())
    } else {
        let records = state.service.list_records().await?;
        Ok(Json(records).into_response())
    }
}

/// Get a ledger record by ID
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    info!("GET /api/records/{}", id);

    let record = state.service.get_record(&id).await?;
    Ok(Json(record))
}

/// Create a ledger record; the server assigns its id
pub async fn create_record(
    State(state): State<AppState>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    info!("POST /api/records - request: {:?}", input);

    let record = state.service.create_record(&input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Update a ledger record
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    info!("PUT /api/records/{} - request: {:?}", id, input);

    let record = state.service.update_record(&id, &input).await?;
    Ok(Json(record))
}

/// Delete a ledger record
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    info!("DELETE /api/records/{}", id);

    state.service.delete_record(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
