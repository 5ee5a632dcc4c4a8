//! # REST API for Reports
//!
//! Each endpoint loads one snapshot of the ledger and runs the pure
//! aggregations over it with the current time.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{ApiResult, AppState};
use crate::application::AppError;
use crate::application::reporting::{self, DEFAULT_WINDOW_MONTHS};
use crate::domain::ValidationError;
use crate::io::views::{
    ReportView, matrix_view, monthly_view, ranked_view, summary_view,
};

/// Largest trailing window accepted, in months.
pub const MAX_WINDOW_MONTHS: u32 = 120;

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub window: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentReportQuery {
    /// income, expense or combined (default income)
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MatrixQuery {
    /// trailing or history (default trailing)
    pub scope: Option<String>,
    pub window: Option<u32>,
}

pub(crate) fn window_months(window: Option<u32>) -> Result<u32, AppError> {
    let months = window.unwrap_or(DEFAULT_WINDOW_MONTHS);
    if months == 0 || months > MAX_WINDOW_MONTHS {
        return Err(ValidationError::InvalidParameter(format!(
            "window must be between 1 and {} months",
            MAX_WINDOW_MONTHS
        ))
        .into());
    }
    Ok(months)
}

/// Dashboard totals
pub async fn get_overview(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    info!("GET /api/reports/overview");

    let overview = state.service.dashboard_overview().await?;
    Ok(Json(overview))
}

/// Income and expense per month over the trailing window
pub async fn get_trailing_monthly(
    State(state): State<AppState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    info!("GET /api/reports/monthly - query: {:?}", query);

    let months = window_months(query.window)?;
    let records = state.service.report_snapshot().await?;
    let totals = reporting::trailing_monthly_totals(&records, Utc::now(), months);
    let has_data = totals.iter().any(|m| m.income != 0 || m.expense != 0);

    Ok(Json(ReportView::new(
        has_data,
        monthly_view(&totals, state.locale),
    )))
}

/// Income and expense for every month that has records
pub async fn get_monthly_history(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    info!("GET /api/reports/monthly/history");

    let records = state.service.report_snapshot().await?;
    let history = reporting::monthly_history(&records);

    Ok(Json(ReportView::new(
        !history.is_empty(),
        monthly_view(&history, state.locale),
    )))
}

/// Per-student income, expense or combined totals
pub async fn get_student_totals(
    State(state): State<AppState>,
    query: Result<Query<StudentReportQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    info!("GET /api/reports/students - query: {:?}", query);

    let limit = query.limit.unwrap_or(usize::MAX);
    let records = state.service.report_snapshot().await?;

    let response = match query.kind.as_deref().unwrap_or("income") {
        "income" => {
            let totals = reporting::student_income_totals(&records);
            let ranked = reporting::rank_students(&totals, limit);
            Json(ReportView::new(
                !ranked.is_empty(),
                ranked_view(&ranked, state.locale),
            ))
            .into_response()
        }
        "expense" => {
            let totals = reporting::student_expense_totals(&records);
            let ranked = reporting::rank_students(&totals, limit);
            Json(ReportView::new(
                !ranked.is_empty(),
                ranked_view(&ranked, state.locale),
            ))
            .into_response()
        }
        "combined" => {
            let mut summaries = reporting::student_summaries(&records);
            summaries.truncate(limit);
            Json(ReportView::new(
                !summaries.is_empty(),
                summary_view(&summaries, state.locale),
            ))
            .into_response()
        }
        other => {
            return Err(AppError::from(ValidationError::InvalidParameter(format!(
                "unknown kind '{}', expected income, expense or combined",
                other
            )))
            .into());
        }
    };

    Ok(response)
}

/// Income broken down by month and student
pub async fn get_matrix(
    State(state): State<AppState>,
    query: Result<Query<MatrixQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    info!("GET /api/reports/matrix - query: {:?}", query);

    let records = state.service.report_snapshot().await?;
    let matrix = match query.scope.as_deref().unwrap_or("trailing") {
        "trailing" => {
            let months = window_months(query.window)?;
            reporting::trailing_month_student_matrix(&records, Utc::now(), months)
        }
        "history" => reporting::history_month_student_matrix(&records),
        other => {
            return Err(AppError::from(ValidationError::InvalidParameter(format!(
                "unknown scope '{}', expected trailing or history",
                other
            )))
            .into());
        }
    };

    Ok(Json(ReportView::new(
        !matrix.is_empty(),
        matrix_view(&matrix, state.locale),
    )))
}
