//! Recurring weekly lessons and their expansion into dated sessions.

use std::collections::HashSet;

use chrono::{Datelike, Days, NaiveDate};
use sqlx::SqlitePool;

use crate::db;
use crate::error::{StorageError, ValidationError};
use crate::models::{
    MaterializeResponse, NewSession, SkippedOccurrence, Subscription, SubscriptionStatus,
};
use crate::schedule::{self, ConflictPolicy, ProposedSlot};
use crate::validation::Validator;

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Subscription {0} is cancelled")]
    Cancelled(String),

    #[error("Schedule could not be verified for {0}")]
    Unverified(NaiveDate),
}

/// Dates in `[from, to]` falling on `weekday` (0 = Monday) and inside the
/// subscription's own `[start, end]` window.
pub fn occurrences(
    weekday: u32,
    start: NaiveDate,
    end: Option<NaiveDate>,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<NaiveDate> {
    let first = from.max(start);
    let last = match end {
        Some(end) => to.min(end),
        None => to,
    };
    if first > last {
        return Vec::new();
    }

    let offset = (7 + weekday - first.weekday().num_days_from_monday()) % 7;
    let mut dates = Vec::new();
    let mut current = first.checked_add_days(Days::new(u64::from(offset)));
    while let Some(date) = current {
        if date > last {
            break;
        }
        dates.push(date);
        current = date.checked_add_days(Days::new(7));
    }
    dates
}

/// Create a session for every occurrence of `subscription` in `[from, to]`.
///
/// Dates that already have a session from this subscription are left alone,
/// so running it twice over the same range creates nothing new. Occurrences
/// that clash with the teacher's schedule are skipped and reported.
pub async fn materialize(
    pool: &SqlitePool,
    subscription: &Subscription,
    from: NaiveDate,
    to: NaiveDate,
    policy: ConflictPolicy,
) -> Result<MaterializeResponse, MaterializeError> {
    Validator::validate_window(from, to)?;
    if subscription.status == SubscriptionStatus::Cancelled {
        return Err(MaterializeError::Cancelled(subscription.id.clone()));
    }

    let start_time = Validator::parse_time(&subscription.start_time)?;
    let start_date = Validator::parse_date(&subscription.start_date)?;
    let end_date = subscription
        .end_date
        .as_deref()
        .map(Validator::parse_date)
        .transpose()?;
    Validator::validate_weekday(subscription.weekday)?;

    let existing: HashSet<String> = db::subscription_session_dates(pool, &subscription.id)
        .await?
        .into_iter()
        .collect();

    let mut response = MaterializeResponse {
        subscription_id: subscription.id.clone(),
        created: Vec::new(),
        already_present: 0,
        conflicts: Vec::new(),
    };

    for date in occurrences(subscription.weekday as u32, start_date, end_date, from, to) {
        if existing.contains(&db::format_date(date)) {
            response.already_present += 1;
            continue;
        }

        let slot = ProposedSlot {
            teacher_id: subscription.teacher_id.clone(),
            date,
            start_time,
            duration_minutes: subscription.duration_minutes,
            exclude_session_id: None,
        };
        let check = schedule::check_schedule(pool, &slot).await;
        if !check.verified && policy == ConflictPolicy::FailClosed {
            return Err(MaterializeError::Unverified(date));
        }
        if check.has_conflict {
            response.conflicts.push(SkippedOccurrence {
                date: db::format_date(date),
                message: check.message,
                conflicting_sessions: check.conflicting_sessions,
            });
            continue;
        }

        let session = db::insert_session(
            pool,
            &NewSession {
                school_id: subscription.school_id.clone(),
                teacher_id: subscription.teacher_id.clone(),
                student_id: subscription.student_id.clone(),
                group_id: subscription.group_id.clone(),
                subscription_id: Some(subscription.id.clone()),
                date,
                start_time,
                duration_minutes: subscription.duration_minutes,
            },
        )
        .await?;
        response.created.push(session);
    }

    tracing::info!(
        subscription_id = %subscription.id,
        created = response.created.len(),
        skipped = response.conflicts.len(),
        "Materialized subscription"
    );
    Ok(response)
}

/// Mark a subscription cancelled and drop its scheduled sessions from
/// `effective_from` on. Past and completed lessons are kept.
pub async fn cancel(
    pool: &SqlitePool,
    subscription_id: &str,
    effective_from: NaiveDate,
) -> Result<(Subscription, u64), StorageError> {
    let (subscription, removed) =
        db::cancel_subscription(pool, subscription_id, effective_from).await?;

    tracing::info!(
        subscription_id = %subscription_id,
        removed,
        "Cancelled subscription"
    );
    Ok((subscription, removed))
}
