//! # REST API
//!
//! HTTP endpoints for students, ledger records and reports. Handlers only
//! translate: they parse the request, call [`SchoolService`] or the pure
//! reporting functions, and turn [`AppError`] into a status code plus a
//! `{ "error": ..., "details"?: ... }` body.

pub mod record_apis;
pub mod report_apis;
pub mod student_apis;

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::application::{AppError, ErrorKind, SchoolService};
use crate::domain::Locale;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: SchoolService,
    pub locale: Locale,
}

impl AppState {
    pub fn new(service: SchoolService, locale: Locale) -> Self {
        Self { service, locale }
    }
}

/// Build the router with every API route. `allow_origin` enables CORS for
/// a browser front end served from another origin.
pub fn create_router(state: AppState, allow_origin: Option<HeaderValue>) -> Router {
    let api_routes = Router::new()
        .route(
            "/students",
            get(student_apis::list_students).post(student_apis::create_student),
        )
        .route(
            "/students/:id",
            get(student_apis::get_student)
                .put(student_apis::update_student)
                .delete(student_apis::delete_student),
        )
        .route(
            "/records",
            get(record_apis::list_records).post(record_apis::create_record),
        )
        .route(
            "/records/:id",
            get(record_apis::get_record)
                .put(record_apis::update_record)
                .delete(record_apis::delete_record),
        )
        .route("/reports/overview", get(report_apis::get_overview))
        .route("/reports/monthly", get(report_apis::get_trailing_monthly))
        .route("/reports/monthly/history", get(report_apis::get_monthly_history))
        .route("/reports/students", get(report_apis::get_student_totals))
        .route("/reports/matrix", get(report_apis::get_matrix));

    let mut router = Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = allow_origin {
        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// Error payload returned by every endpoint on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Replacement id offered when a ledger record id is already taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_id: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: error.into(),
                details,
                suggested_id: None,
            },
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &err {
            AppError::Validation(inner) => ErrorBody {
                error: "Validation failed".to_string(),
                details: Some(inner.to_string()),
                suggested_id: None,
            },
            AppError::DuplicateRecordId { suggested_id, .. } => ErrorBody {
                error: err.to_string(),
                details: None,
                suggested_id: Some(suggested_id.clone()),
            },
            AppError::Database(inner) => {
                error!(error = ?inner, "request failed");
                ErrorBody {
                    error: "Internal server error".to_string(),
                    details: Some(format!("{:#}", inner)),
                    suggested_id: None,
                }
            }
            _ => ErrorBody {
                error: err.to_string(),
                details: None,
                suggested_id: None,
            },
        };

        if status.is_client_error() {
            warn!(%status, error = %body.error, "request rejected");
        }
        Self { status, body }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Invalid request body", Some(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("Invalid query string", Some(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
