//! Shared helpers for command handlers.

use std::io::IsTerminal;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};

use crate::error::CliError;

/// Parse a `YYYY-MM-DD` date flag.
pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("invalid date '{value}' (use YYYY-MM-DD)"),
    })
}

/// Parse an `HH:MM` time-of-day flag.
pub fn parse_time(value: &str, field: &str) -> Result<NaiveTime, CliError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("invalid time '{value}' (use HH:MM)"),
    })
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `2024-03-10 08:00:00` in the local timezone.
pub fn local_datetime(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `08:00:00` in the local timezone.
pub fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
