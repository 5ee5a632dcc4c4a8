//! # REST API for Students
//!
//! Endpoints for creating, retrieving, updating and deleting students.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use super::{ApiResult, AppState};
use crate::application::AppError;
use crate::domain::{StudentFilter, StudentId, StudentInput};

/// Query parameters for the student listing API
#[derive(Debug, Default, Deserialize)]
pub struct StudentListQuery {
    pub search: Option<String>,
    pub active: Option<bool>,
}

pub(super) fn parse_student_id(raw: &str) -> Result<StudentId, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::InvalidId(raw.to_string()))
}

/// List students, optionally filtered by name and active flag
pub async fn list_students(
    State(state): State<AppState>,
    query: Result<Query<StudentListQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    info!("GET /api/students - query: {:?}", query);

    let filter = StudentFilter {
        search: query.search,
        active: query.active,
    };
    let students = state.service.list_students(&filter).await?;
    Ok(Json(students))
}

/// Get a student by ID
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    info!("GET /api/students/{}", id);

    let student = state.service.get_student(parse_student_id(&id)?).await?;
    Ok(Json(student))
}

/// Create a new student
pub async fn create_student(
    State(state): State<AppState>,
    payload: Result<Json<StudentInput>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    info!("POST /api/students - request: {:?}", input);

    let student = state.service.create_student(&input).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// Update a student
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StudentInput>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    info!("PUT /api/students/{} - request: {:?}", id, input);

    let student = state
        .service
        .update_student(parse_student_id(&id)?, &input)
        .await?;
    Ok(Json(student))
}

/// Delete a student, or deactivate it when ledger records reference it
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    info!("DELETE /api/students/{}", id);

    let outcome = state.service.delete_student(parse_student_id(&id)?).await?;
    Ok(Json(outcome))
}
