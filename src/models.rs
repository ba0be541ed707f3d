use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schedule::ConflictingSession;

/// Lifecycle of a single lesson occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Teacher {
    pub id: String,
    pub school_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: String,
    pub school_id: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: String,
    pub school_id: String,
    pub name: String,
}

/// One scheduled lesson occurrence for a teacher and a student or group.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub school_id: String,
    pub teacher_id: String,
    pub student_id: Option<String>,
    pub group_id: Option<String>,
    pub subscription_id: Option<String>,
    #[sqlx(rename = "session_date")]
    pub date: String,
    pub start_time: String,
    pub duration_minutes: Option<i64>,
    pub status: SessionStatus,
}

/// A recurring weekly lesson, materialized into sessions on demand.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    pub school_id: String,
    pub teacher_id: String,
    pub student_id: Option<String>,
    pub group_id: Option<String>,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: i64,
    pub start_time: String,
    pub duration_minutes: i64,
    pub start_date: String,
    pub end_date: Option<String>,
    pub status: SubscriptionStatus,
}

/// Parsed, validated values for a session insert.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub school_id: String,
    pub teacher_id: String,
    pub student_id: Option<String>,
    pub group_id: Option<String>,
    pub subscription_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub school_id: String,
    pub teacher_id: String,
    pub student_id: Option<String>,
    pub group_id: Option<String>,
    pub weekday: i64,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Filter for listing sessions.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub school_id: Option<String>,
    pub teacher_id: Option<String>,
    pub date: Option<String>,
    pub status: Option<SessionStatus>,
}

/// Query parameters for list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub school_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeacherRequest {
    pub school_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub school_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub school_id: Option<String>,
    pub name: String,
}

/// Request body for the standalone schedule check.
#[derive(Debug, Deserialize)]
pub struct ScheduleCheckRequest {
    pub teacher_id: String,
    pub date: String,
    pub start_time: String,
    pub duration_minutes: i64,
    pub exclude_session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub school_id: Option<String>,
    pub teacher_id: String,
    pub student_id: Option<String>,
    pub group_id: Option<String>,
    pub date: String,
    pub start_time: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub allow_conflict: bool,
}

fn default_duration() -> i64 {
    crate::schedule::DEFAULT_DURATION_MINUTES
}

/// Partial update of a session's slot. Omitted fields keep their value.
#[derive(Debug, Deserialize)]
pub struct RescheduleSessionRequest {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub allow_conflict: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: SessionStatus,
    #[serde(default)]
    pub allow_conflict: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub school_id: Option<String>,
    pub teacher_id: String,
    pub student_id: Option<String>,
    pub group_id: Option<String>,
    pub weekday: i64,
    pub start_time: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    pub start_date: String,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MaterializeRequest {
    pub from: String,
    pub to: String,
}

/// An occurrence that was not created because it clashes with the schedule.
#[derive(Debug, Serialize)]
pub struct SkippedOccurrence {
    pub date: String,
    pub message: Option<String>,
    pub conflicting_sessions: Vec<ConflictingSession>,
}

#[derive(Debug, Serialize)]
pub struct MaterializeResponse {
    pub subscription_id: String,
    pub created: Vec<Session>,
    pub already_present: usize,
    pub conflicts: Vec<SkippedOccurrence>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelSubscriptionRequest {
    /// Scheduled sessions on or after this date are removed. Defaults to today.
    pub effective_from: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelSubscriptionResponse {
    pub subscription: Subscription,
    pub removed_sessions: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: String,
    pub removed_sessions: u64,
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub converted: f64,
}
