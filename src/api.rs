// Credit Plans - REST API with Axum
// Handlers hold the connection guard only for synchronous store work

use crate::config::Config;
use crate::error::Error;
use crate::ingest;
use crate::reports::{self, CreditView, MonthlyPerformanceView, PlanPerformanceView};
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error as ThisError;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    /// Connection for the duration of one request; released when the guard drops.
    fn conn(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database connection poisoned".to_string()))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(ThisError, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Core(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Core(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// Extractor rejections reuse the `{code, message}` body instead of axum's plain text.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Deserialize)]
pub struct PlansPerformanceParams {
    /// `DD/MM/YYYY`
    pub check_date: String,
}

#[derive(Deserialize)]
pub struct YearPerformanceParams {
    pub year: i32,
}

#[derive(Serialize, Deserialize)]
pub struct InsertResponse {
    pub message: String,
    pub inserted: usize,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET / - Service banner
async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Credit Plans API" }))
}

/// GET /user_credits/:user_id - Credit history of a user
async fn user_credits(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<CreditView>>> {
    let Path(user_id) = user_id?;
    let conn = state.conn()?;
    let credits = reports::get_user_credits(&conn, user_id)?;
    if credits.is_empty() {
        return Err(ApiError::NotFound("User not found or no credits".to_string()));
    }
    Ok(Json(credits))
}

/// POST /plans_insert - Upload a plan table (multipart field `file`)
async fn plans_insert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<InsertResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read uploaded file: {}", e)))?;
        upload = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing file in multipart request".to_string()))?;

    let conn = state.conn()?;
    let inserted = ingest::import_plan_file(&conn, &file_name, &bytes)?;

    Ok(Json(InsertResponse {
        message: format!("Successfully inserted {} plans", inserted),
        inserted,
    }))
}

/// GET /plans_performance?check_date=DD/MM/YYYY - Plan completion for a month
async fn plans_performance(
    State(state): State<AppState>,
    params: Result<Query<PlansPerformanceParams>, QueryRejection>,
) -> ApiResult<Json<Vec<PlanPerformanceView>>> {
    let Query(params) = params?;
    let check_date = NaiveDate::parse_from_str(params.check_date.trim(), "%d/%m/%Y")
        .map_err(|_| {
            ApiError::BadRequest(format!(
                "check_date must be DD/MM/YYYY, got '{}'",
                params.check_date
            ))
        })?;

    let conn = state.conn()?;
    Ok(Json(reports::get_plans_performance(&conn, check_date)?))
}

/// GET /year_performance?year=YYYY - Month-by-month plan vs actual
async fn year_performance(
    State(state): State<AppState>,
    params: Result<Query<YearPerformanceParams>, QueryRejection>,
) -> ApiResult<Json<Vec<MonthlyPerformanceView>>> {
    let Query(params) = params?;
    let conn = state.conn()?;
    Ok(Json(reports::get_year_performance(&conn, params.year)?))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/user_credits/:user_id", get(user_credits))
        .route("/plans_insert", post(plans_insert))
        .route("/plans_performance", get(plans_performance))
        .route("/year_performance", get(year_performance))
        .with_state(state)
}

/// Router with request tracing, timeout and CORS applied.
pub fn app(state: AppState, config: &Config) -> Router {
    router(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(CorsLayer::permissive())
}
