use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde_json::json;

use crate::error::{AppError, AppResult};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

// Postgres `timestamptz` text output, e.g. `2025-05-01 09:00:00+00`.
const OFFSET_TIMESTAMP_FORMATS: [&str; 1] = ["%Y-%m-%d %H:%M:%S%.f%#z"];

const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

pub fn parse_time(value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|err| {
        AppError::validation_with_details(
            "invalid HH:MM time",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn minutes_from_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

pub fn to_naive_time(total_minutes: u32) -> AppResult<NaiveTime> {
    NaiveTime::from_hms_opt(total_minutes / 60, total_minutes % 60, 0).ok_or_else(|| {
        AppError::validation_with_details(
            "minute offset falls outside a single day",
            json!({"minutes": total_minutes}),
        )
    })
}

pub fn format_minutes(total_minutes: u32) -> AppResult<String> {
    Ok(format_time(to_naive_time(total_minutes)?))
}

/// Shifts an `HH:MM` time by `delta` minutes. Crossing midnight in either
/// direction is an error; the caller owns any day rollover.
pub fn add_minutes(time: &str, delta: i64) -> AppResult<String> {
    let base = minutes_from_midnight(parse_time(time)?) as i64;
    let total = base + delta;
    if total < 0 || total >= MINUTES_PER_DAY as i64 {
        return Err(AppError::validation_with_details(
            "time arithmetic crosses midnight",
            json!({"time": time, "delta": delta}),
        ));
    }
    format_minutes(total as u32)
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn add_days(date: NaiveDate, days: i64) -> AppResult<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| AppError::validation("date arithmetic out of range"))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Wall-clock date and time written in a timestamp. Offsets are not applied:
/// an item belongs to the day its timestamp names.
pub fn parse_timestamp(value: &str) -> AppResult<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }
    if let Some(dt) = OFFSET_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(trimmed, format).ok())
    {
        return Ok(dt.naive_local());
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| {
            AppError::validation_with_details("invalid timestamp", json!({"value": value}))
        })
}

pub fn day_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Half-open interval overlap on minute offsets.
pub fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}
