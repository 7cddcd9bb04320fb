pub mod auth;
pub mod availability;
pub mod bookings;
pub mod calendar;
pub mod health;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::errors::AppError;

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{field} must be a YYYY-MM-DD date")))
}

/// Accepts `HH:MM` (or `HH:MM:SS`) and drops any seconds.
pub(crate) fn parse_time(field: &str, value: &str) -> Result<NaiveTime, AppError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
        .and_then(|t| NaiveTime::from_hms_opt(t.hour(), t.minute(), 0))
        .ok_or_else(|| AppError::Validation(format!("{field} must be an HH:MM time")))
}
