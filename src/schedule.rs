//! Teacher schedule overlap detection.
//!
//! A proposed lesson slot is checked against the teacher's other `scheduled`
//! sessions on the same date. Sessions occupy the half-open interval
//! `[start, start + duration)`, so back-to-back lessons never conflict.
//!
//! The check is advisory and not atomic with the write that follows it: two
//! bookings racing for the same slot can both pass.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::validation::{Validator, MINUTES_PER_DAY};

/// Duration assumed for sessions stored without one.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// An existing scheduled session as returned by the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScheduledSession {
    pub id: String,
    pub start_time: String,
    pub duration_minutes: Option<i64>,
    pub student_name: Option<String>,
    pub group_id: Option<String>,
    pub group_name: Option<String>,
}

impl ScheduledSession {
    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// Student name, or the group name for group lessons.
    pub fn counterparty(&self) -> &str {
        let name = if self.is_group() {
            self.group_name.as_deref()
        } else {
            self.student_name.as_deref()
        };
        name.unwrap_or("Unknown")
    }
}

/// The slot being booked or rescheduled.
#[derive(Debug, Clone)]
pub struct ProposedSlot {
    pub teacher_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    /// Session being rescheduled; never compared against itself.
    pub exclude_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingSession {
    pub session_id: String,
    pub start_time: String,
    pub end_time: String,
    pub time_range: String,
    pub counterparty: String,
    pub is_group: bool,
}

/// Outcome of a schedule check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    /// False when the session store could not be queried. The check then
    /// reports no conflict.
    pub verified: bool,
    pub message: Option<String>,
    pub conflicting_sessions: Vec<ConflictingSession>,
}

impl ConflictCheck {
    pub fn clear() -> Self {
        Self {
            has_conflict: false,
            verified: true,
            message: None,
            conflicting_sessions: Vec::new(),
        }
    }

    pub fn unverified() -> Self {
        Self {
            verified: false,
            ..Self::clear()
        }
    }

    pub fn from_conflicts(conflicts: Vec<ConflictingSession>) -> Self {
        if conflicts.is_empty() {
            return Self::clear();
        }
        Self {
            has_conflict: true,
            verified: true,
            message: Some(conflict_message(&conflicts)),
            conflicting_sessions: conflicts,
        }
    }
}

/// What the booking endpoints do when the check itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Proceed as though the schedule were clear.
    #[default]
    FailOpen,
    /// Refuse the write until the schedule can be verified.
    FailClosed,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-open" | "open" => Ok(ConflictPolicy::FailOpen),
            "fail-closed" | "closed" => Ok(ConflictPolicy::FailClosed),
            other => Err(format!("unknown conflict policy: {}", other)),
        }
    }
}

/// Read access to a teacher's scheduled sessions.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Sessions with status `scheduled` for `teacher_id` on `date`, minus
    /// `exclude` if given, ordered by start time.
    async fn scheduled_sessions(
        &self,
        teacher_id: &str,
        date: NaiveDate,
        exclude: Option<&str>,
    ) -> Result<Vec<ScheduledSession>, StorageError>;
}

pub fn minutes_since_midnight(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

/// Half-open interval intersection. Touching endpoints do not overlap.
pub fn intervals_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    a_start < b_end && a_end > b_start
}

/// Render minutes since midnight as `HH:MM`, wrapping past midnight.
pub fn format_minutes(minutes: i64) -> String {
    let m = minutes.rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Every session in `existing` whose interval intersects
/// `[start, start + duration)`, in the order given.
pub fn find_conflicts(
    start: NaiveTime,
    duration_minutes: i64,
    existing: &[ScheduledSession],
) -> Vec<ConflictingSession> {
    let candidate_start = minutes_since_midnight(start);
    let candidate_end = candidate_start.saturating_add(duration_minutes);

    existing
        .iter()
        .filter_map(|session| {
            let existing_start = match Validator::parse_time(&session.start_time) {
                Ok(t) => minutes_since_midnight(t),
                Err(e) => {
                    tracing::warn!("Skipping session {} in overlap check: {}", session.id, e);
                    return None;
                }
            };
            let existing_end = existing_start
                .saturating_add(session.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES));

            if !intervals_overlap(candidate_start, candidate_end, existing_start, existing_end) {
                return None;
            }

            let start_time = format_minutes(existing_start);
            let end_time = format_minutes(existing_end);
            Some(ConflictingSession {
                session_id: session.id.clone(),
                time_range: format!("{}-{}", start_time, end_time),
                start_time,
                end_time,
                counterparty: session.counterparty().to_string(),
                is_group: session.is_group(),
            })
        })
        .collect()
}

fn conflict_message(conflicts: &[ConflictingSession]) -> String {
    let mut message = if conflicts.len() == 1 {
        "The teacher already has a session at this time:".to_string()
    } else {
        format!(
            "The teacher already has {} sessions at this time:",
            conflicts.len()
        )
    };
    for conflict in conflicts {
        let kind = if conflict.is_group { " (group)" } else { "" };
        message.push_str(&format!(
            "\n- {} with {}{}",
            conflict.time_range, conflict.counterparty, kind
        ));
    }
    message
}

/// Check a proposed slot against the teacher's schedule.
///
/// A failed store query is logged and reported as no conflict with
/// `verified: false`; the caller's [`ConflictPolicy`] decides what to do.
pub async fn check_schedule<S>(source: &S, slot: &ProposedSlot) -> ConflictCheck
where
    S: SessionSource + ?Sized,
{
    let exclude = slot.exclude_session_id.as_deref();
    let existing = match source
        .scheduled_sessions(&slot.teacher_id, slot.date, exclude)
        .await
    {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::error!(
                teacher_id = %slot.teacher_id,
                date = %slot.date,
                "Schedule check failed, treating as clear: {}",
                e
            );
            return ConflictCheck::unverified();
        }
    };

    let existing: Vec<ScheduledSession> = existing
        .into_iter()
        .filter(|s| Some(s.id.as_str()) != exclude)
        .collect();

    let conflicts = find_conflicts(slot.start_time, slot.duration_minutes, &existing);
    if !conflicts.is_empty() {
        tracing::debug!(
            teacher_id = %slot.teacher_id,
            date = %slot.date,
            "Found {} conflicting sessions",
            conflicts.len()
        );
    }
    ConflictCheck::from_conflicts(conflicts)
}
