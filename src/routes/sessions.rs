use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::db;
use crate::error::{ApiError, ApiResult, StorageError};
use crate::models::{
    CreateSessionRequest, NewSession, RescheduleSessionRequest, ScheduleCheckRequest, Session,
    SessionQuery, SessionStatus, SetStatusRequest,
};
use crate::schedule::{self, ConflictCheck, ConflictPolicy, ProposedSlot, DEFAULT_DURATION_MINUTES};
use crate::state::AppState;
use crate::validation::Validator;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/schedule/check", post(check_schedule))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session)
                .put(reschedule_session)
                .delete(delete_session),
        )
        .route("/api/sessions/{id}/status", put(set_status))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Run the overlap check for a write and apply the conflict policy.
///
/// Conflicts block the write unless `allow_conflict` is set. An unverified
/// check blocks it only under [`ConflictPolicy::FailClosed`].
async fn admit(
    state: &AppState,
    slot: &ProposedSlot,
    allow_conflict: bool,
) -> ApiResult<ConflictCheck> {
    let check = schedule::check_schedule(&state.pool, slot).await;

    if !check.verified && state.conflict_policy == ConflictPolicy::FailClosed {
        return Err(ApiError::Unverified);
    }
    if check.has_conflict {
        if !allow_conflict {
            return Err(ApiError::Conflict(check));
        }
        tracing::warn!(
            teacher_id = %slot.teacher_id,
            date = %slot.date,
            "Booking over {} conflicting sessions",
            check.conflicting_sessions.len()
        );
    }
    Ok(check)
}

/// POST /api/schedule/check - Report conflicts for a proposed slot.
async fn check_schedule(
    State(state): State<AppState>,
    Json(req): Json<ScheduleCheckRequest>,
) -> ApiResult<Json<ConflictCheck>> {
    Validator::validate_required("teacher_id", &req.teacher_id)?;
    let start_time = Validator::parse_time(&req.start_time)?;
    Validator::validate_slot(start_time, req.duration_minutes)?;
    let slot = ProposedSlot {
        teacher_id: req.teacher_id,
        date: Validator::parse_date(&req.date)?,
        start_time,
        duration_minutes: req.duration_minutes,
        exclude_session_id: non_empty(req.exclude_session_id),
    };

    Ok(Json(schedule::check_schedule(&state.pool, &slot).await))
}

/// POST /api/sessions - Book a lesson.
async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    Validator::validate_required("teacher_id", &req.teacher_id)?;
    let student_id = non_empty(req.student_id);
    let group_id = non_empty(req.group_id);
    Validator::validate_attendee(student_id.as_deref(), group_id.as_deref())?;
    let date = Validator::parse_date(&req.date)?;
    let start_time = Validator::parse_time(&req.start_time)?;
    Validator::validate_slot(start_time, req.duration_minutes)?;

    let teacher = db::get_teacher(&state.pool, &req.teacher_id).await?;
    if let Some(id) = &student_id {
        db::get_student(&state.pool, id).await?;
    }
    if let Some(id) = &group_id {
        db::get_group(&state.pool, id).await?;
    }

    let slot = ProposedSlot {
        teacher_id: teacher.id.clone(),
        date,
        start_time,
        duration_minutes: req.duration_minutes,
        exclude_session_id: None,
    };
    admit(&state, &slot, req.allow_conflict).await?;

    let school_id =
        state.school_or_default(req.school_id.as_deref().or(Some(teacher.school_id.as_str())));
    let session = db::insert_session(
        &state.pool,
        &NewSession {
            school_id,
            teacher_id: teacher.id,
            student_id,
            group_id,
            subscription_id: None,
            date,
            start_time,
            duration_minutes: req.duration_minutes,
        },
    )
    .await?;

    tracing::info!(session_id = %session.id, "Created session");
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/sessions?teacher_id=...&date=...&status=...
async fn list_sessions(
    State(state): State<AppState>,
    Query(mut query): Query<SessionQuery>,
) -> ApiResult<Json<Vec<Session>>> {
    if let Some(date) = query.date.take() {
        query.date = Some(db::format_date(Validator::parse_date(&date)?));
    }
    Ok(Json(db::list_sessions(&state.pool, &query).await?))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    Ok(Json(db::get_session(&state.pool, &id).await?))
}

/// PUT /api/sessions/{id} - Move a scheduled session.
async fn reschedule_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RescheduleSessionRequest>,
) -> ApiResult<Json<Session>> {
    let session = db::get_session(&state.pool, &id).await?;
    if session.status != SessionStatus::Scheduled {
        return Err(ApiError::BadRequest(
            "Only scheduled sessions can be rescheduled".to_string(),
        ));
    }

    let date = Validator::parse_date(req.date.as_deref().unwrap_or(&session.date))?;
    let start_time =
        Validator::parse_time(req.start_time.as_deref().unwrap_or(&session.start_time))?;
    let duration_minutes = req
        .duration_minutes
        .or(session.duration_minutes)
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    Validator::validate_slot(start_time, duration_minutes)?;

    let slot = ProposedSlot {
        teacher_id: session.teacher_id.clone(),
        date,
        start_time,
        duration_minutes,
        exclude_session_id: Some(session.id.clone()),
    };
    admit(&state, &slot, req.allow_conflict).await?;

    let updated =
        db::update_session_slot(&state.pool, &session.id, date, start_time, duration_minutes)
            .await?;
    tracing::info!(session_id = %updated.id, "Rescheduled session");
    Ok(Json(updated))
}

/// PUT /api/sessions/{id}/status
///
/// Returning a session to `scheduled` re-runs the overlap check.
async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<Session>> {
    let session = db::get_session(&state.pool, &id).await?;

    if req.status == SessionStatus::Scheduled && session.status != SessionStatus::Scheduled {
        let slot = ProposedSlot {
            teacher_id: session.teacher_id.clone(),
            date: Validator::parse_date(&session.date)?,
            start_time: Validator::parse_time(&session.start_time)?,
            duration_minutes: session
                .duration_minutes
                .unwrap_or(DEFAULT_DURATION_MINUTES),
            exclude_session_id: Some(session.id.clone()),
        };
        admit(&state, &slot, req.allow_conflict).await?;
    }

    let updated = db::set_session_status(&state.pool, &session.id, req.status).await?;
    tracing::info!(session_id = %updated.id, status = ?updated.status, "Updated session status");
    Ok(Json(updated))
}

/// DELETE /api/sessions/{id}
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !db::delete_session(&state.pool, &id).await? {
        return Err(StorageError::NotFound("Session", id).into());
    }
    tracing::info!(session_id = %id, "Deleted session");
    Ok(StatusCode::NO_CONTENT)
}
