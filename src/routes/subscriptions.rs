use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CancelSubscriptionRequest, CancelSubscriptionResponse, CreateSubscriptionRequest,
    DeleteResponse, MaterializeRequest, MaterializeResponse, NewSubscription, Subscription,
};
use crate::state::AppState;
use crate::subscriptions::{self, MaterializeError};
use crate::validation::Validator;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/subscriptions", post(create_subscription))
        .route(
            "/api/subscriptions/{id}",
            get(get_subscription).delete(delete_subscription),
        )
        .route(
            "/api/subscriptions/{id}/materialize",
            post(materialize_subscription),
        )
        .route("/api/subscriptions/{id}/cancel", post(cancel_subscription))
}

impl From<MaterializeError> for ApiError {
    fn from(e: MaterializeError) -> Self {
        match e {
            MaterializeError::Validation(e) => ApiError::Validation(e),
            MaterializeError::Storage(e) => ApiError::Storage(e),
            MaterializeError::Cancelled(_) => ApiError::BadRequest(e.to_string()),
            MaterializeError::Unverified(_) => ApiError::Unverified,
        }
    }
}

/// POST /api/subscriptions
async fn create_subscription(
    State(state): State<AppState>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    Validator::validate_required("teacher_id", &req.teacher_id)?;
    let student_id = req.student_id.filter(|s| !s.trim().is_empty());
    let group_id = req.group_id.filter(|g| !g.trim().is_empty());
    Validator::validate_attendee(student_id.as_deref(), group_id.as_deref())?;
    Validator::validate_weekday(req.weekday)?;
    let start_time = Validator::parse_time(&req.start_time)?;
    Validator::validate_slot(start_time, req.duration_minutes)?;
    let start_date = Validator::parse_date(&req.start_date)?;
    let end_date = req
        .end_date
        .as_deref()
        .map(Validator::parse_date)
        .transpose()?;
    if let Some(end) = end_date {
        Validator::validate_range(start_date, end)?;
    }

    let teacher = db::get_teacher(&state.pool, &req.teacher_id).await?;
    if let Some(id) = &student_id {
        db::get_student(&state.pool, id).await?;
    }
    if let Some(id) = &group_id {
        db::get_group(&state.pool, id).await?;
    }

    let school_id =
        state.school_or_default(req.school_id.as_deref().or(Some(teacher.school_id.as_str())));
    let subscription = db::insert_subscription(
        &state.pool,
        &NewSubscription {
            school_id,
            teacher_id: teacher.id,
            student_id,
            group_id,
            weekday: req.weekday,
            start_time,
            duration_minutes: req.duration_minutes,
            start_date,
            end_date,
        },
    )
    .await?;

    tracing::info!(subscription_id = %subscription.id, "Created subscription");
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Subscription>> {
    Ok(Json(db::get_subscription(&state.pool, &id).await?))
}

/// POST /api/subscriptions/{id}/materialize - Expand into sessions.
async fn materialize_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MaterializeRequest>,
) -> ApiResult<Json<MaterializeResponse>> {
    let from = Validator::parse_date(&req.from)?;
    let to = Validator::parse_date(&req.to)?;
    let subscription = db::get_subscription(&state.pool, &id).await?;

    let response =
        subscriptions::materialize(&state.pool, &subscription, from, to, state.conflict_policy)
            .await?;
    Ok(Json(response))
}

/// POST /api/subscriptions/{id}/cancel
async fn cancel_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CancelSubscriptionRequest>>,
) -> ApiResult<Json<CancelSubscriptionResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let effective_from = match req.effective_from.as_deref() {
        Some(date) => Validator::parse_date(date)?,
        None => Local::now().date_naive(),
    };

    let (subscription, removed_sessions) =
        subscriptions::cancel(&state.pool, &id, effective_from).await?;
    Ok(Json(CancelSubscriptionResponse {
        subscription,
        removed_sessions,
    }))
}

/// DELETE /api/subscriptions/{id}
async fn delete_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let removed_sessions = db::delete_subscription(&state.pool, &id).await?;
    tracing::info!(subscription_id = %id, removed_sessions, "Deleted subscription");
    Ok(Json(DeleteResponse {
        id,
        removed_sessions,
    }))
}
