//! Commands embedded in task comments and descriptions.
//!
//! A comment starting with the command prefix (`existio:` by default) or a
//! task description starting with `/` carries one command on its first
//! line:
//!
//! ```text
//! existio: +Daily Walk     bind the task to the `daily_walk` tag
//! existio: release         unbind and remove all sync comments
//! existio: update          regenerate the stats window
//! existio: yesterday       mark yesterday as done
//! /on:2024-01-05           mark a date as done
//! /off:today               mark a date as not done
//! ```

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::store::normalize_tag;

/// Prefix of a command carried in a task description
pub const DESCRIPTION_PREFIX: char = '/';

/// A parsed user command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bind the task to a (normalized) tag
    Bind(String),
    /// Unbind the task and delete sync comments
    Release,
    /// Regenerate every month in the window
    Update,
    /// Mark yesterday as done
    Yesterday,
    /// Set the value for a single day
    SetDay { day: DaySpec, success: bool },
}

/// Day argument of `on:` / `off:`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySpec {
    Today,
    Yesterday,
    Date(NaiveDate),
}

impl DaySpec {
    /// Resolve against the effective `today`.
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            DaySpec::Today => today,
            DaySpec::Yesterday => today - Duration::days(1),
            DaySpec::Date(date) => date,
        }
    }
}

/// A command that could not be understood; reported back to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),

    #[error("cannot parse date `{0}`, expected yesterday, today or YYYY-MM-DD")]
    InvalidDate(String),

    #[error("tag name cannot be empty")]
    EmptyTag,
}

impl Command {
    /// Parse command text with the prefix already stripped.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.trim().to_lowercase();

        if let Some(tag) = text.strip_prefix('+') {
            return normalize_tag(tag)
                .map(Command::Bind)
                .ok_or(CommandError::EmptyTag);
        }
        if let Some(day) = text.strip_prefix("on:") {
            return Ok(Command::SetDay {
                day: parse_day(day)?,
                success: true,
            });
        }
        if let Some(day) = text.strip_prefix("off:") {
            return Ok(Command::SetDay {
                day: parse_day(day)?,
                success: false,
            });
        }

        match text.as_str() {
            "release" => Ok(Command::Release),
            "update" => Ok(Command::Update),
            "yesterday" => Ok(Command::Yesterday),
            _ => Err(CommandError::Unknown(text)),
        }
    }

    /// Whether the command needs an existing binding
    pub fn requires_binding(&self) -> bool {
        !matches!(self, Command::Bind(_))
    }
}

fn parse_day(raw: &str) -> Result<DaySpec, CommandError> {
    match raw.trim() {
        "today" => Ok(DaySpec::Today),
        "yesterday" => Ok(DaySpec::Yesterday),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .map(DaySpec::Date)
            .map_err(|_| CommandError::InvalidDate(other.to_string())),
    }
}

/// Command text of a comment, if it starts with `prefix`.
pub fn comment_command<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let first_line = content.trim_start().lines().next()?;
    first_line.strip_prefix(prefix).map(str::trim)
}

/// Command text of a task description, if it starts with `/`.
pub fn description_command(description: &str) -> Option<&str> {
    let first_line = description.trim_start().lines().next()?;
    first_line.strip_prefix(DESCRIPTION_PREFIX).map(str::trim)
}
