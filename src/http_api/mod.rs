use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, NaiveTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::persistence::PersistenceError;
use crate::{
    AttendanceBucket, AttendanceRecord, AttendanceTransition, CommitSummary, PreviewRequest,
    PreviewSession, ReconcileSummary, RescheduleOutcome, RescheduleProposal, Scheduler,
    SchedulerError, ShiftCalendarSync, ShiftCalendarView, VacationWindow,
};

#[derive(Clone)]
pub struct AppState {
    scheduler: Arc<Scheduler>,
    previews: Arc<RwLock<BTreeMap<String, PreviewSession>>>,
}

impl AppState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self::with_shared(Arc::new(scheduler))
    }

    pub fn with_shared(scheduler: Arc<Scheduler>) -> Self {
        Self {
            scheduler,
            previews: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<SchedulerError> for ApiError {
    fn from(value: SchedulerError) -> Self {
        let message = value.to_string();
        match value {
            SchedulerError::InvalidTimeRange { .. }
            | SchedulerError::InvalidCount { .. }
            | SchedulerError::InvalidInput(_)
            | SchedulerError::InvalidTransition { .. } => ApiError::Invalid(message),
            SchedulerError::PartialReconciliation { .. } => ApiError::Conflict(message),
            SchedulerError::Persistence(PersistenceError::NotFound(_)) => {
                ApiError::NotFound(message)
            }
            SchedulerError::Persistence(PersistenceError::InvalidData(_)) => {
                ApiError::Invalid(message)
            }
            SchedulerError::CalendarSourceUnavailable(_)
            | SchedulerError::ScopeViolation(_)
            | SchedulerError::Persistence(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ShiftDaysPayload {
    #[serde(default)]
    dates: Vec<NaiveDate>,
    #[serde(default)]
    start_time: Option<NaiveTime>,
    #[serde(default)]
    end_time: Option<NaiveTime>,
    #[serde(default)]
    operator: String,
}

#[derive(Debug, Deserialize)]
struct OperatorQuery {
    #[serde(default)]
    operator: String,
}

#[derive(Debug, Deserialize)]
struct TransitionPayload {
    name: String,
    from: AttendanceBucket,
    to: AttendanceBucket,
    #[serde(default)]
    operator: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/previews", post(create_preview))
        .route("/previews/:key", get(get_preview))
        .route("/previews/:key/toggle/:index", post(toggle_occurrence))
        .route("/previews/:key/commit", post(commit_preview))
        .route(
            "/shifts/:staff/:year/:month",
            get(get_shift_calendar).put(sync_shift_calendar),
        )
        .route("/attendance/:date", get(get_attendance))
        .route("/attendance/:date/transitions", post(transition_attendance))
        .route("/vacations", post(record_vacation))
        .route("/vacations/confirm", post(confirm_reschedule))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, scheduler: Scheduler) -> std::io::Result<()> {
    let state = AppState::new(scheduler);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn create_preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Result<(StatusCode, Json<PreviewSession>), ApiError> {
    let session = state.scheduler().generate_preview(&request)?;
    state
        .previews
        .write()
        .insert(session.key().to_string(), session.clone());
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_preview(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PreviewSession>, ApiError> {
    let previews = state.previews.read();
    previews
        .get(&key)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("preview {key} not found")))
}

async fn toggle_occurrence(
    State(state): State<AppState>,
    Path((key, index)): Path<(String, usize)>,
) -> Result<Json<PreviewSession>, ApiError> {
    let mut previews = state.previews.write();
    let session = previews
        .get_mut(&key)
        .ok_or_else(|| ApiError::not_found(format!("preview {key} not found")))?;
    session.toggle(index)?;
    Ok(Json(session.clone()))
}

async fn commit_preview(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CommitSummary>, ApiError> {
    let scheduler = state.scheduler();
    let mut previews = state.previews.write();
    let session = previews
        .get_mut(&key)
        .ok_or_else(|| ApiError::not_found(format!("preview {key} not found")))?;
    let summary = scheduler.commit_preview(session)?;
    previews.remove(&key);
    Ok(Json(summary))
}

async fn get_shift_calendar(
    State(state): State<AppState>,
    Path((staff, year, month)): Path<(String, i32, u32)>,
) -> Result<Json<ShiftCalendarView>, ApiError> {
    let view = state.scheduler().shift_calendar_view(&staff, year, month)?;
    Ok(Json(view))
}

async fn sync_shift_calendar(
    State(state): State<AppState>,
    Path((staff, year, month)): Path<(String, i32, u32)>,
    Json(payload): Json<ShiftDaysPayload>,
) -> Result<Json<ReconcileSummary>, ApiError> {
    let request = ShiftCalendarSync {
        staff,
        year,
        month,
        dates: payload.dates.into_iter().collect(),
        start_time: payload.start_time,
        end_time: payload.end_time,
        operator: payload.operator,
    };
    let summary = state.scheduler().sync_shift_calendar(&request)?;
    Ok(Json(summary))
}

async fn get_attendance(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<OperatorQuery>,
) -> Result<Json<AttendanceRecord>, ApiError> {
    let date = parse_date(&date)?;
    let record = state.scheduler().get_attendance_view(date, &query.operator)?;
    Ok(Json(record))
}

async fn transition_attendance(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(payload): Json<TransitionPayload>,
) -> Result<Json<AttendanceRecord>, ApiError> {
    let date = parse_date(&date)?;
    let transition = AttendanceTransition::new(payload.from, payload.to);
    let record = state.scheduler().transition_attendance(
        date,
        payload.name.trim(),
        transition,
        &payload.operator,
    )?;
    Ok(Json(record))
}

async fn record_vacation(
    State(state): State<AppState>,
    Json(window): Json<VacationWindow>,
) -> Result<(StatusCode, Json<RescheduleProposal>), ApiError> {
    let proposal = state.scheduler().record_vacation(&window)?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

async fn confirm_reschedule(
    State(state): State<AppState>,
    Json(proposal): Json<RescheduleProposal>,
) -> Result<Json<RescheduleOutcome>, ApiError> {
    let outcome = state.scheduler().confirm_reschedule(&proposal)?;
    Ok(Json(outcome))
}

fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(format!("invalid date '{value}' (expected YYYY-MM-DD)")))
}
