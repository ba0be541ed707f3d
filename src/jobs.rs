//! Operational batch jobs.
//!
//! Every job runs inside one transaction that is rolled back in dry-run
//! mode, so a dry run reports exactly what a real run would change. Jobs are
//! idempotent: a second real run changes nothing.

use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::StorageError;

/// Tables carrying a `school_id` tenant column.
const TENANT_TABLES: [&str; 5] = [
    "teachers",
    "students",
    "student_groups",
    "subscriptions",
    "sessions",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job: &'static str,
    pub dry_run: bool,
    pub examined: u64,
    pub changed: u64,
    pub skipped: u64,
}

impl JobReport {
    fn new(job: &'static str, dry_run: bool) -> Self {
        Self {
            job,
            dry_run,
            examined: 0,
            changed: 0,
            skipped: 0,
        }
    }
}

async fn finish(tx: Transaction<'_, Sqlite>, report: &JobReport) -> Result<(), StorageError> {
    if report.dry_run {
        tx.rollback().await?;
    } else {
        tx.commit().await?;
    }
    tracing::info!(
        job = report.job,
        dry_run = report.dry_run,
        examined = report.examined,
        changed = report.changed,
        skipped = report.skipped,
        "Job finished"
    );
    Ok(())
}

/// Normalize a phone number to `+<country code><number>`.
///
/// Formatting characters (spaces, dashes, dots, slashes, parentheses) are
/// dropped. A `00` prefix becomes `+`; a leading trunk `0` is replaced by
/// `+<country_code>`; bare digits that already start with the country code
/// get a `+`, any other bare digits get `+<country_code>`. Returns None for
/// input that is not a plausible phone number.
pub fn normalize_phone(raw: &str, country_code: &str) -> Option<String> {
    let country_code = country_code.trim().trim_start_matches('+');
    if country_code.is_empty() || !country_code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let trimmed = raw.trim();
    let (has_plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '/' | '(' | ')' => {}
            _ => return None,
        }
    }

    let international = if has_plus {
        digits
    } else if let Some(stripped) = digits.strip_prefix("00") {
        stripped.to_string()
    } else if let Some(stripped) = digits.strip_prefix('0') {
        format!("{}{}", country_code, stripped)
    } else if digits.starts_with(country_code) {
        digits
    } else {
        format!("{}{}", country_code, digits)
    };

    // E.164 allows at most 15 digits.
    if !(8..=15).contains(&international.len()) {
        return None;
    }
    Some(format!("+{}", international))
}

/// Rewrite every student phone number into normalized form.
pub async fn normalize_phones(
    pool: &SqlitePool,
    country_code: &str,
    dry_run: bool,
) -> Result<JobReport, StorageError> {
    let mut report = JobReport::new("normalize-phones", dry_run);
    let mut tx = pool.begin().await?;

    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT id, phone FROM students WHERE phone IS NOT NULL AND phone != ''")
            .fetch_all(&mut *tx)
            .await?;

    for (id, phone) in rows {
        report.examined += 1;
        let Some(normalized) = normalize_phone(&phone, country_code) else {
            tracing::warn!(student_id = %id, "Cannot normalize phone number {:?}", phone);
            report.skipped += 1;
            continue;
        };
        if normalized == phone {
            continue;
        }

        tracing::debug!(student_id = %id, "{} -> {}", phone, normalized);
        sqlx::query("UPDATE students SET phone = ? WHERE id = ?")
            .bind(&normalized)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        report.changed += 1;
    }

    finish(tx, &report).await?;
    Ok(report)
}

/// Assign `school_id` to every row whose tenant column is empty.
pub async fn backfill_school_id(
    pool: &SqlitePool,
    school_id: &str,
    dry_run: bool,
) -> Result<JobReport, StorageError> {
    let mut report = JobReport::new("backfill-school-id", dry_run);
    let mut tx = pool.begin().await?;

    for table in TENANT_TABLES {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&mut *tx)
            .await?;
        report.examined += total as u64;

        let result = sqlx::query(&format!(
            "UPDATE {} SET school_id = ? WHERE school_id IS NULL OR school_id = ''",
            table
        ))
        .bind(school_id)
        .execute(&mut *tx)
        .await?;
        report.changed += result.rows_affected();
    }

    finish(tx, &report).await?;
    Ok(report)
}

/// Remove sessions left behind by cancelled or deleted subscriptions.
///
/// Scheduled sessions of a cancelled subscription are deleted, as is every
/// session pointing at a subscription that no longer exists. Completed and
/// cancelled sessions of existing subscriptions are kept as history.
pub async fn cleanup_subscriptions(
    pool: &SqlitePool,
    dry_run: bool,
) -> Result<JobReport, StorageError> {
    let mut report = JobReport::new("cleanup-subscriptions", dry_run);
    let mut tx = pool.begin().await?;

    let examined: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE subscription_id IS NOT NULL")
            .fetch_one(&mut *tx)
            .await?;
    report.examined = examined as u64;

    let cancelled = sqlx::query(
        r#"
        DELETE FROM sessions
        WHERE status = 'scheduled'
          AND subscription_id IN (SELECT id FROM subscriptions WHERE status = 'cancelled')
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let orphaned = sqlx::query(
        r#"
        DELETE FROM sessions
        WHERE subscription_id IS NOT NULL
          AND subscription_id NOT IN (SELECT id FROM subscriptions)
        "#,
    )
    .execute(&mut *tx)
    .await?;

    report.changed = cancelled.rows_affected() + orphaned.rows_affected();

    finish(tx, &report).await?;
    Ok(report)
}
