use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::error::ValidationError;

/// Maximum length of a person or group name.
pub const MAX_NAME_LEN: usize = 200;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Widest date window a subscription can be expanded over in one call.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Input validation shared by the HTTP handlers and the batch jobs.
pub struct Validator;

impl Validator {
    /// Parse a calendar date in `YYYY-MM-DD` form.
    pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| ValidationError::InvalidDate(value.to_string()))
    }

    /// Parse a 24-hour time of day. Accepts `HH:MM` and `HH:MM:SS`.
    pub fn parse_time(value: &str) -> Result<NaiveTime, ValidationError> {
        let value_trimmed = value.trim();
        NaiveTime::parse_from_str(value_trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value_trimmed, "%H:%M:%S"))
            .map_err(|_| ValidationError::InvalidTime(value.to_string()))
    }

    pub fn validate_duration(minutes: i64) -> Result<(), ValidationError> {
        if !(1..=MINUTES_PER_DAY).contains(&minutes) {
            return Err(ValidationError::InvalidDuration(minutes));
        }
        Ok(())
    }

    /// A lesson must end by midnight of the day it starts.
    pub fn validate_slot(start: NaiveTime, minutes: i64) -> Result<(), ValidationError> {
        Self::validate_duration(minutes)?;
        let start_minutes = i64::from(start.num_seconds_from_midnight() / 60);
        if start_minutes + minutes > MINUTES_PER_DAY {
            return Err(ValidationError::PastMidnight(
                start.format("%H:%M").to_string(),
                minutes,
            ));
        }
        Ok(())
    }

    pub fn validate_weekday(weekday: i64) -> Result<(), ValidationError> {
        if !(0..=6).contains(&weekday) {
            return Err(ValidationError::InvalidWeekday(weekday));
        }
        Ok(())
    }

    /// Non-empty after trimming.
    pub fn validate_required(field: &'static str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::Missing(field));
        }
        Ok(())
    }

    pub fn validate_name(name: &str) -> Result<(), ValidationError> {
        Self::validate_required("name", name)?;
        let len = name.chars().count();
        if len > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong(len));
        }
        Ok(())
    }

    /// A lesson belongs to exactly one student or exactly one group.
    pub fn validate_attendee(
        student_id: Option<&str>,
        group_id: Option<&str>,
    ) -> Result<(), ValidationError> {
        let has_student = student_id.is_some_and(|s| !s.trim().is_empty());
        let has_group = group_id.is_some_and(|g| !g.trim().is_empty());
        if has_student == has_group {
            return Err(ValidationError::AmbiguousAttendee);
        }
        Ok(())
    }

    pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), ValidationError> {
        if from > to {
            return Err(ValidationError::InvalidRange(from.to_string(), to.to_string()));
        }
        Ok(())
    }

    /// `from..=to` in order and at most [`MAX_WINDOW_DAYS`] days long.
    pub fn validate_window(from: NaiveDate, to: NaiveDate) -> Result<(), ValidationError> {
        Self::validate_range(from, to)?;
        let days = (to - from).num_days() + 1;
        if days > MAX_WINDOW_DAYS {
            return Err(ValidationError::RangeTooWide(
                from.to_string(),
                to.to_string(),
                MAX_WINDOW_DAYS,
            ));
        }
        Ok(())
    }

    /// Normalize a currency code to upper case. Must be three ASCII letters.
    pub fn normalize_currency(code: &str) -> Result<String, ValidationError> {
        let code_trimmed = code.trim();
        if code_trimmed.len() != 3 || !code_trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(code.to_string()));
        }
        Ok(code_trimmed.to_ascii_uppercase())
    }
}
