use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

use lessonbook::{
    create_router, init_pool, run_migrations, AppState, ConflictPolicy, RateCache, RateError,
    RateSource,
};

/// Create a test pool with an in-memory database.
async fn create_test_pool() -> SqlitePool {
    let pool = init_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Create a test app with in-memory database.
async fn create_test_app() -> Router {
    let pool = create_test_pool().await;
    create_router(AppState::new(pool, "default", ConflictPolicy::FailOpen))
}

/// Helper to get response body as string.
async fn body_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Send a request and decode the JSON response body (`Null` when empty).
async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = body_string(response.into_body()).await;
    if body.is_empty() {
        return (status, Value::Null);
    }
    (status, serde_json::from_str(&body).unwrap())
}

async fn create_teacher(app: &Router, name: &str) -> String {
    let (status, json) = send(app, "POST", "/api/teachers", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

async fn create_student(app: &Router, name: &str) -> String {
    let (status, json) = send(app, "POST", "/api/students", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

async fn book(app: &Router, teacher: &str, student: &str, time: &str, duration: i64) -> Value {
    let (status, json) = send(
        app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "date": "2026-10-19",
            "start_time": time,
            "duration_minutes": duration,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "booking {} failed: {}", time, json);
    json
}

// ============================================================================
// Health endpoint tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response.into_body()).await;
    assert_eq!(body, "OK");
}

// ============================================================================
// People endpoint tests
// ============================================================================

#[tokio::test]
async fn test_create_and_get_teacher() {
    let app = create_test_app().await;

    let id = create_teacher(&app, "Ada").await;
    let (status, json) = send(&app, "GET", &format!("/api/teachers/{}", id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Ada");
    assert_eq!(json["school_id"], "default");
}

#[tokio::test]
async fn test_list_students_filtered_by_school() {
    let app = create_test_app().await;

    create_student(&app, "Default pupil").await;
    let (status, json) = send(
        &app,
        "POST",
        "/api/students",
        Some(json!({ "name": "North pupil", "school_id": "north", "phone": " 912 34 567 " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["phone"], "912 34 567");

    let (_, all) = send(&app, "GET", "/api/students", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, north) = send(&app, "GET", "/api/students?school_id=north", None).await;
    let north = north.as_array().unwrap();
    assert_eq!(north.len(), 1);
    assert_eq!(north[0]["name"], "North pupil");
}

#[tokio::test]
async fn test_create_teacher_empty_name() {
    let app = create_test_app().await;

    let (status, json) = send(&app, "POST", "/api/teachers", Some(json!({ "name": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_get_unknown_group() {
    let app = create_test_app().await;

    let (status, json) = send(&app, "GET", "/api/groups/missing", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

// ============================================================================
// Schedule check tests
// ============================================================================

#[tokio::test]
async fn test_schedule_check_reports_group_conflict() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let (_, group) = send(&app, "POST", "/api/groups", Some(json!({ "name": "Choir" }))).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "group_id": group["id"],
            "date": "2026-10-19",
            "start_time": "14:00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(
        &app,
        "POST",
        "/api/schedule/check",
        Some(json!({
            "teacher_id": teacher,
            "date": "2026-10-19",
            "start_time": "14:30",
            "duration_minutes": 30,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["has_conflict"], true);
    assert_eq!(json["verified"], true);
    assert_eq!(json["conflicting_sessions"][0]["time_range"], "14:00-15:00");
    assert_eq!(json["conflicting_sessions"][0]["counterparty"], "Choir");
    assert_eq!(json["conflicting_sessions"][0]["is_group"], true);
    assert_eq!(
        json["message"],
        "The teacher already has a session at this time:\n- 14:00-15:00 with Choir (group)"
    );
}

#[tokio::test]
async fn test_schedule_check_other_day_is_clear() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    book(&app, &teacher, &student, "10:00", 60).await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/schedule/check",
        Some(json!({
            "teacher_id": teacher,
            "date": "2026-10-20",
            "start_time": "10:00",
            "duration_minutes": 60,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["has_conflict"], false);
    assert!(json["message"].is_null());
    assert_eq!(json["conflicting_sessions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_schedule_check_invalid_time() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/schedule/check",
        Some(json!({
            "teacher_id": "t1",
            "date": "2026-10-19",
            "start_time": "25:00",
            "duration_minutes": 60,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_schedule_check_huge_duration() {
    let app = create_test_app().await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/schedule/check",
        Some(json!({
            "teacher_id": "t1",
            "date": "2026-10-19",
            "start_time": "10:00",
            "duration_minutes": i64::MAX,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_schedule_check_unreadable_store_is_unverified() {
    let pool = create_test_pool().await;
    let app = create_router(AppState::new(pool.clone(), "default", ConflictPolicy::FailOpen));
    sqlx::query("DROP TABLE sessions")
        .execute(&pool)
        .await
        .unwrap();

    let (status, json) = send(
        &app,
        "POST",
        "/api/schedule/check",
        Some(json!({
            "teacher_id": "t1",
            "date": "2026-10-19",
            "start_time": "10:00",
            "duration_minutes": 60,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["has_conflict"], false);
    assert_eq!(json["verified"], false);
}

// ============================================================================
// Session endpoint tests
// ============================================================================

#[tokio::test]
async fn test_create_session_conflict() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    let existing = book(&app, &teacher, &student, "10:00", 60).await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "date": "2026-10-19",
            "start_time": "10:30",
            "duration_minutes": 30,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["has_conflict"], true);
    assert_eq!(json["conflicting_sessions"][0]["session_id"], existing["id"]);
    assert_eq!(json["conflicting_sessions"][0]["counterparty"], "Bo");
}

#[tokio::test]
async fn test_create_session_adjacent_is_allowed() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;

    book(&app, &teacher, &student, "10:00", 60).await;
    let session = book(&app, &teacher, &student, "11:00", 30).await;

    assert_eq!(session["start_time"], "11:00");
    assert_eq!(session["status"], "scheduled");
    assert_eq!(session["school_id"], "default");
}

#[tokio::test]
async fn test_create_session_allow_conflict() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    book(&app, &teacher, &student, "10:00", 120).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "date": "2026-10-19",
            "start_time": "10:30",
            "duration_minutes": 15,
            "allow_conflict": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, sessions) = send(
        &app,
        "GET",
        &format!("/api/sessions?teacher_id={}&date=2026-10-19", teacher),
        None,
    )
    .await;
    assert_eq!(sessions.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_session_defaults_duration() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "date": "2026-10-19",
            "start_time": "09:00",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["duration_minutes"], 60);
}

#[tokio::test]
async fn test_create_session_requires_one_attendee() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "date": "2026-10-19",
            "start_time": "09:00",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        "Exactly one of student_id or group_id must be set"
    );
}

#[tokio::test]
async fn test_create_session_unknown_teacher() {
    let app = create_test_app().await;
    let student = create_student(&app, "Bo").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": "missing",
            "student_id": student,
            "date": "2026-10-19",
            "start_time": "09:00",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_session_zero_duration() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "date": "2026-10-19",
            "start_time": "09:00",
            "duration_minutes": 0,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_session_past_midnight_rejected() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "date": "2026-10-19",
            "start_time": "23:00",
            "duration_minutes": 600,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        "A lesson starting at 23:00 cannot last 600 minutes: it would run past midnight"
    );

    // Ending exactly at midnight is fine.
    book(&app, &teacher, &student, "23:00", 60).await;

    let (_, sessions) = send(
        &app,
        "GET",
        &format!("/api/sessions?teacher_id={}", teacher),
        None,
    )
    .await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reschedule_past_midnight_rejected() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    let session = book(&app, &teacher, &student, "10:00", 90).await;
    let uri = format!("/api/sessions/{}", session["id"].as_str().unwrap());

    let (status, _) = send(&app, "PUT", &uri, Some(json!({ "start_time": "23:00" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, unchanged) = send(&app, "GET", &uri, None).await;
    assert_eq!(unchanged["start_time"], "10:00");
}

#[tokio::test]
async fn test_reschedule_excludes_itself() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    let first = book(&app, &teacher, &student, "10:00", 60).await;
    let second = book(&app, &teacher, &student, "12:00", 60).await;

    // Overlaps only its own old slot.
    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}", first["id"].as_str().unwrap()),
        Some(json!({ "start_time": "10:30" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["start_time"], "10:30");
    assert_eq!(json["duration_minutes"], 60);

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}", second["id"].as_str().unwrap()),
        Some(json!({ "start_time": "11:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["conflicting_sessions"][0]["session_id"], first["id"]);
}

#[tokio::test]
async fn test_cancelled_session_frees_slot_and_rescheduling_rechecks() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    let first = book(&app, &teacher, &student, "10:00", 60).await;
    let status_uri = format!("/api/sessions/{}/status", first["id"].as_str().unwrap());

    let (status, json) = send(&app, "PUT", &status_uri, Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");

    book(&app, &teacher, &student, "10:00", 60).await;

    let (status, _) = send(&app, "PUT", &status_uri, Some(json!({ "status": "scheduled" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "PUT",
        &status_uri,
        Some(json!({ "status": "scheduled", "allow_conflict": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reschedule_cancelled_session_rejected() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    let session = book(&app, &teacher, &student, "10:00", 60).await;
    let id = session["id"].as_str().unwrap();

    send(
        &app,
        "PUT",
        &format!("/api/sessions/{}/status", id),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}", id),
        Some(json!({ "start_time": "15:00" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_session() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    let session = book(&app, &teacher, &student, "10:00", 60).await;
    let uri = format!("/api/sessions/{}", session["id"].as_str().unwrap());

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fail_closed_refuses_unverified_booking() {
    let pool = create_test_pool().await;
    let app = create_router(AppState::new(pool.clone(), "default", ConflictPolicy::FailClosed));
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    sqlx::query("DROP TABLE sessions")
        .execute(&pool)
        .await
        .unwrap();

    let (status, json) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "date": "2026-10-19",
            "start_time": "10:00",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SCHEDULE_UNVERIFIED");
}

// ============================================================================
// Subscription endpoint tests
// ============================================================================

#[tokio::test]
async fn test_subscription_materialize_and_cancel() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;
    let other = create_student(&app, "Cy").await;

    // Blocks the second Monday.
    let (status, blocker) = send(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": other,
            "date": "2026-10-26",
            "start_time": "16:30",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, subscription) = send(
        &app,
        "POST",
        "/api/subscriptions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "weekday": 0,
            "start_time": "16:00",
            "duration_minutes": 45,
            "start_date": "2026-10-01",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(subscription["status"], "active");
    let id = subscription["id"].as_str().unwrap();

    let range = json!({ "from": "2026-10-19", "to": "2026-11-01" });
    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/subscriptions/{}/materialize", id),
        Some(range.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["created"].as_array().unwrap().len(), 1);
    assert_eq!(json["created"][0]["date"], "2026-10-19");
    assert_eq!(json["created"][0]["subscription_id"], id);
    assert_eq!(json["conflicts"][0]["date"], "2026-10-26");
    assert_eq!(
        json["conflicts"][0]["conflicting_sessions"][0]["session_id"],
        blocker["id"]
    );

    // Second run creates nothing new.
    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/subscriptions/{}/materialize", id),
        Some(range.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["created"].as_array().unwrap().len(), 0);
    assert_eq!(json["already_present"], 1);

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/subscriptions/{}/cancel", id),
        Some(json!({ "effective_from": "2026-10-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subscription"]["status"], "cancelled");
    assert_eq!(json["removed_sessions"], 1);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/subscriptions/{}/materialize", id),
        Some(range),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_subscription_removes_scheduled_sessions() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;

    let (_, subscription) = send(
        &app,
        "POST",
        "/api/subscriptions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "weekday": 2,
            "start_time": "08:00",
            "start_date": "2026-10-19",
            "end_date": "2026-11-30",
        })),
    )
    .await;
    let uri = format!("/api/subscriptions/{}", subscription["id"].as_str().unwrap());

    let (_, json) = send(
        &app,
        "POST",
        &format!("{}/materialize", uri),
        Some(json!({ "from": "2026-10-19", "to": "2026-11-08" })),
    )
    .await;
    assert_eq!(json["created"].as_array().unwrap().len(), 3);

    let (status, json) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed_sessions"], 3);

    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_subscription_past_midnight_rejected() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/subscriptions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "weekday": 4,
            "start_time": "23:30",
            "duration_minutes": 60,
            "start_date": "2026-10-19",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_materialize_window_too_wide() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;

    let (_, subscription) = send(
        &app,
        "POST",
        "/api/subscriptions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "weekday": 0,
            "start_time": "16:00",
            "start_date": "2026-10-19",
        })),
    )
    .await;

    let (status, json) = send(
        &app,
        "POST",
        &format!(
            "/api/subscriptions/{}/materialize",
            subscription["id"].as_str().unwrap()
        ),
        Some(json!({ "from": "0001-01-01", "to": "9999-12-31" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        "Date range 0001-01-01 to 9999-12-31 is longer than 366 days"
    );

    let (_, sessions) = send(
        &app,
        "GET",
        &format!("/api/sessions?teacher_id={}", teacher),
        None,
    )
    .await;
    assert_eq!(sessions.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_subscription_invalid_weekday() {
    let app = create_test_app().await;
    let teacher = create_teacher(&app, "Ada").await;
    let student = create_student(&app, "Bo").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/subscriptions",
        Some(json!({
            "teacher_id": teacher,
            "student_id": student,
            "weekday": 7,
            "start_time": "08:00",
            "start_date": "2026-10-19",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Rates endpoint tests
// ============================================================================

struct FixedRates;

#[async_trait]
impl RateSource for FixedRates {
    async fn fetch(&self, base: &str) -> Result<BTreeMap<String, f64>, RateError> {
        match base {
            "USD" => Ok(BTreeMap::from([
                ("EUR".to_string(), 0.5),
                ("NOK".to_string(), 10.0),
            ])),
            other => Err(RateError::Source(format!("no table for {}", other))),
        }
    }
}

async fn create_rates_app() -> Router {
    let pool = create_test_pool().await;
    let rates = Arc::new(RateCache::new(Arc::new(FixedRates), Duration::from_secs(60)));
    create_router(AppState::new(pool, "default", ConflictPolicy::FailOpen).with_rates(rates))
}

#[tokio::test]
async fn test_get_rates() {
    let app = create_rates_app().await;

    let (status, json) = send(&app, "GET", "/api/rates/usd", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["base"], "USD");
    assert_eq!(json["rates"]["NOK"], 10.0);
}

#[tokio::test]
async fn test_convert() {
    let app = create_rates_app().await;

    let (status, json) = send(&app, "GET", "/api/convert?amount=100&from=usd&to=EUR", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["from"], "USD");
    assert_eq!(json["to"], "EUR");
    assert_eq!(json["rate"], 0.5);
    assert_eq!(json["converted"], 50.0);
}

#[tokio::test]
async fn test_convert_unknown_quote() {
    let app = create_rates_app().await;

    let (status, _) = send(&app, "GET", "/api/convert?amount=1&from=USD&to=JPY", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rates_source_failure() {
    let app = create_rates_app().await;

    let (status, json) = send(&app, "GET", "/api/rates/GBP", None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "RATES_UNAVAILABLE");
}

#[tokio::test]
async fn test_rates_not_configured() {
    let app = create_test_app().await;

    let (status, json) = send(&app, "GET", "/api/rates/USD", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "RATES_UNAVAILABLE");
}

#[tokio::test]
async fn test_rates_invalid_currency() {
    let app = create_rates_app().await;

    let (status, _) = send(&app, "GET", "/api/rates/US1", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
