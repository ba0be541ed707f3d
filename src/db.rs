use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{
    Group, NewSession, NewSubscription, Session, SessionQuery, SessionStatus, Student,
    Subscription, SubscriptionStatus, Teacher,
};
use crate::schedule::{ScheduledSession, SessionSource};

/// Initialize database connection pool with recommended pragmas.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5))
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
}

/// Run database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../migrations/001_create_school_tables.sql"))
        .execute(pool)
        .await?;
    Ok(())
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

// ---------------------------------------------------------------------------
// Teachers, students, groups
// ---------------------------------------------------------------------------

pub async fn insert_teacher(
    pool: &SqlitePool,
    school_id: &str,
    name: &str,
) -> Result<Teacher, StorageError> {
    let id = new_id();
    sqlx::query("INSERT INTO teachers (id, school_id, name) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(school_id)
        .bind(name.trim())
        .execute(pool)
        .await?;

    get_teacher(pool, &id).await
}

pub async fn get_teacher(pool: &SqlitePool, id: &str) -> Result<Teacher, StorageError> {
    sqlx::query_as::<_, Teacher>("SELECT id, school_id, name FROM teachers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StorageError::NotFound("Teacher", id.to_string()))
}

pub async fn list_teachers(
    pool: &SqlitePool,
    school_id: Option<&str>,
) -> Result<Vec<Teacher>, StorageError> {
    let teachers = sqlx::query_as::<_, Teacher>(
        r#"
        SELECT id, school_id, name
        FROM teachers
        WHERE (?1 IS NULL OR school_id = ?1)
        ORDER BY name ASC
        "#,
    )
    .bind(school_id)
    .fetch_all(pool)
    .await?;

    Ok(teachers)
}

pub async fn insert_student(
    pool: &SqlitePool,
    school_id: &str,
    name: &str,
    phone: Option<&str>,
) -> Result<Student, StorageError> {
    let id = new_id();
    sqlx::query("INSERT INTO students (id, school_id, name, phone) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(school_id)
        .bind(name.trim())
        .bind(phone)
        .execute(pool)
        .await?;

    get_student(pool, &id).await
}

pub async fn get_student(pool: &SqlitePool, id: &str) -> Result<Student, StorageError> {
    sqlx::query_as::<_, Student>("SELECT id, school_id, name, phone FROM students WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StorageError::NotFound("Student", id.to_string()))
}

pub async fn list_students(
    pool: &SqlitePool,
    school_id: Option<&str>,
) -> Result<Vec<Student>, StorageError> {
    let students = sqlx::query_as::<_, Student>(
        r#"
        SELECT id, school_id, name, phone
        FROM students
        WHERE (?1 IS NULL OR school_id = ?1)
        ORDER BY name ASC
        "#,
    )
    .bind(school_id)
    .fetch_all(pool)
    .await?;

    Ok(students)
}

pub async fn insert_group(
    pool: &SqlitePool,
    school_id: &str,
    name: &str,
) -> Result<Group, StorageError> {
    let id = new_id();
    sqlx::query("INSERT INTO student_groups (id, school_id, name) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(school_id)
        .bind(name.trim())
        .execute(pool)
        .await?;

    get_group(pool, &id).await
}

pub async fn get_group(pool: &SqlitePool, id: &str) -> Result<Group, StorageError> {
    sqlx::query_as::<_, Group>("SELECT id, school_id, name FROM student_groups WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StorageError::NotFound("Group", id.to_string()))
}

pub async fn list_groups(
    pool: &SqlitePool,
    school_id: Option<&str>,
) -> Result<Vec<Group>, StorageError> {
    let groups = sqlx::query_as::<_, Group>(
        r#"
        SELECT id, school_id, name
        FROM student_groups
        WHERE (?1 IS NULL OR school_id = ?1)
        ORDER BY name ASC
        "#,
    )
    .bind(school_id)
    .fetch_all(pool)
    .await?;

    Ok(groups)
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

const SESSION_COLUMNS: &str = "id, school_id, teacher_id, student_id, group_id, subscription_id, \
     session_date, start_time, duration_minutes, status";

/// Insert a new session with status `scheduled`.
pub async fn insert_session(pool: &SqlitePool, new: &NewSession) -> Result<Session, StorageError> {
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO sessions (id, school_id, teacher_id, student_id, group_id, subscription_id,
                              session_date, start_time, duration_minutes, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.school_id)
    .bind(&new.teacher_id)
    .bind(&new.student_id)
    .bind(&new.group_id)
    .bind(&new.subscription_id)
    .bind(format_date(new.date))
    .bind(format_time(new.start_time))
    .bind(new.duration_minutes)
    .bind(SessionStatus::Scheduled)
    .execute(pool)
    .await?;

    get_session(pool, &id).await
}

pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<Session, StorageError> {
    sqlx::query_as::<_, Session>(&format!(
        "SELECT {} FROM sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StorageError::NotFound("Session", id.to_string()))
}

/// List sessions matching every filter that is set, ordered by date and time.
pub async fn list_sessions(
    pool: &SqlitePool,
    query: &SessionQuery,
) -> Result<Vec<Session>, StorageError> {
    let sessions = sqlx::query_as::<_, Session>(&format!(
        r#"
        SELECT {}
        FROM sessions
        WHERE (?1 IS NULL OR school_id = ?1)
          AND (?2 IS NULL OR teacher_id = ?2)
          AND (?3 IS NULL OR session_date = ?3)
          AND (?4 IS NULL OR status = ?4)
        ORDER BY session_date ASC, start_time ASC
        "#,
        SESSION_COLUMNS
    ))
    .bind(&query.school_id)
    .bind(&query.teacher_id)
    .bind(&query.date)
    .bind(query.status)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

/// Move a session to a new date, start time and duration.
pub async fn update_session_slot(
    pool: &SqlitePool,
    id: &str,
    date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: i64,
) -> Result<Session, StorageError> {
    let result = sqlx::query(
        "UPDATE sessions SET session_date = ?, start_time = ?, duration_minutes = ? WHERE id = ?",
    )
    .bind(format_date(date))
    .bind(format_time(start_time))
    .bind(duration_minutes)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound("Session", id.to_string()));
    }
    get_session(pool, id).await
}

pub async fn set_session_status(
    pool: &SqlitePool,
    id: &str,
    status: SessionStatus,
) -> Result<Session, StorageError> {
    let result = sqlx::query("UPDATE sessions SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound("Session", id.to_string()));
    }
    get_session(pool, id).await
}

/// Delete a session. Returns false if it did not exist.
pub async fn delete_session(pool: &SqlitePool, id: &str) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Scheduled sessions of a teacher on one date, with the student or group
/// name resolved for display.
pub async fn scheduled_sessions_for(
    pool: &SqlitePool,
    teacher_id: &str,
    date: NaiveDate,
    exclude: Option<&str>,
) -> Result<Vec<ScheduledSession>, StorageError> {
    let sessions = sqlx::query_as::<_, ScheduledSession>(
        r#"
        SELECT s.id, s.start_time, s.duration_minutes,
               st.name AS student_name, s.group_id, g.name AS group_name
        FROM sessions s
        LEFT JOIN students st ON st.id = s.student_id
        LEFT JOIN student_groups g ON g.id = s.group_id
        WHERE s.teacher_id = ?1
          AND s.session_date = ?2
          AND s.status = 'scheduled'
          AND (?3 IS NULL OR s.id != ?3)
        ORDER BY s.start_time ASC, s.rowid ASC
        "#,
    )
    .bind(teacher_id)
    .bind(format_date(date))
    .bind(exclude)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

#[async_trait]
impl SessionSource for SqlitePool {
    async fn scheduled_sessions(
        &self,
        teacher_id: &str,
        date: NaiveDate,
        exclude: Option<&str>,
    ) -> Result<Vec<ScheduledSession>, StorageError> {
        scheduled_sessions_for(self, teacher_id, date, exclude).await
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

const SUBSCRIPTION_COLUMNS: &str = "id, school_id, teacher_id, student_id, group_id, weekday, \
     start_time, duration_minutes, start_date, end_date, status";

pub async fn insert_subscription(
    pool: &SqlitePool,
    new: &NewSubscription,
) -> Result<Subscription, StorageError> {
    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, school_id, teacher_id, student_id, group_id, weekday,
                                   start_time, duration_minutes, start_date, end_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.school_id)
    .bind(&new.teacher_id)
    .bind(&new.student_id)
    .bind(&new.group_id)
    .bind(new.weekday)
    .bind(format_time(new.start_time))
    .bind(new.duration_minutes)
    .bind(format_date(new.start_date))
    .bind(new.end_date.map(format_date))
    .bind(SubscriptionStatus::Active)
    .execute(pool)
    .await?;

    get_subscription(pool, &id).await
}

pub async fn get_subscription(pool: &SqlitePool, id: &str) -> Result<Subscription, StorageError> {
    sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {} FROM subscriptions WHERE id = ?",
        SUBSCRIPTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StorageError::NotFound("Subscription", id.to_string()))
}

/// Dates for which a subscription already has a session, in any status.
pub async fn subscription_session_dates(
    pool: &SqlitePool,
    subscription_id: &str,
) -> Result<Vec<String>, StorageError> {
    let dates = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT session_date FROM sessions WHERE subscription_id = ?",
    )
    .bind(subscription_id)
    .fetch_all(pool)
    .await?;

    Ok(dates)
}

/// Mark a subscription cancelled and delete its `scheduled` sessions dated
/// on or after `from`, in one transaction. Returns the updated subscription
/// and the number of sessions removed.
pub async fn cancel_subscription(
    pool: &SqlitePool,
    id: &str,
    from: NaiveDate,
) -> Result<(Subscription, u64), StorageError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("UPDATE subscriptions SET status = ? WHERE id = ?")
        .bind(SubscriptionStatus::Cancelled)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(StorageError::NotFound("Subscription", id.to_string()));
    }

    let removed = sqlx::query(
        r#"
        DELETE FROM sessions
        WHERE subscription_id = ?1
          AND status = 'scheduled'
          AND session_date >= ?2
        "#,
    )
    .bind(id)
    .bind(format_date(from))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok((get_subscription(pool, id).await?, removed))
}

/// Delete a subscription together with its scheduled sessions.
/// Returns the number of sessions removed.
pub async fn delete_subscription(pool: &SqlitePool, id: &str) -> Result<u64, StorageError> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM sessions WHERE subscription_id = ? AND status = 'scheduled'")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(StorageError::NotFound("Subscription", id.to_string()));
    }

    tx.commit().await?;
    Ok(removed)
}
