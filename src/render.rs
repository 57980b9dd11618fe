//! Month calendar rendering.
//!
//! A rendered month looks like:
//!
//! ```text
//! # January 2024 📊
//! 🟩🟩🟥🟩🟩🟩🟩
//! 🟩🟥🟥🟩🟩🟩🟩
//! ...
//! 🟩 24  🟥 7
//! ```
//!
//! Weeks start on Monday; the first row is padded so that day 1 lands in
//! its weekday column.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::calendar::{first_of_month, month_end};
use crate::clients::TrackingClient;
use crate::error::Result;

/// Marks stats comments; part of every month header
pub const STATS_EMOJI: &str = "📊";

pub const GLYPH_SUCCEEDED: &str = "🟩";
pub const GLYPH_FAILED: &str = "🟥";
pub const GLYPH_UNKNOWN: &str = "⬜";
pub const GLYPH_TODAY: &str = "🟨";
pub const GLYPH_EMPTY: &str = "⬛";

/// Status of one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Succeeded,
    Failed,
    /// Day in the future
    Unknown,
    /// Today, nothing recorded yet
    Today,
}

impl DayStatus {
    pub fn glyph(self) -> &'static str {
        match self {
            DayStatus::Succeeded => GLYPH_SUCCEEDED,
            DayStatus::Failed => GLYPH_FAILED,
            DayStatus::Unknown => GLYPH_UNKNOWN,
            DayStatus::Today => GLYPH_TODAY,
        }
    }
}

/// Classify `day` given the recorded values.
pub fn classify(day: NaiveDate, today: NaiveDate, values: &BTreeMap<NaiveDate, i64>) -> DayStatus {
    if day > today {
        return DayStatus::Unknown;
    }
    match values.get(&day) {
        Some(value) if *value > 0 => DayStatus::Succeeded,
        None if day == today => DayStatus::Today,
        _ => DayStatus::Failed,
    }
}

/// A rendered month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCalendar {
    pub month: NaiveDate,
    pub succeeded: u32,
    pub failed: u32,
    /// Only set for the current month
    pub unknown: Option<u32>,
    pub text: String,
}

/// Header line identifying the stats comment of `month`.
pub fn month_header(month: NaiveDate) -> String {
    format!("# {} {STATS_EMOJI}", month.format("%B %Y"))
}

/// Render the calendar of `month` from already fetched values.
pub fn render_month(
    month: NaiveDate,
    today: NaiveDate,
    values: &BTreeMap<NaiveDate, i64>,
) -> MonthCalendar {
    let month = first_of_month(month);
    let end = month_end(month);

    let mut grid = String::new();
    for _ in 0..month.weekday().num_days_from_monday() {
        grid.push_str(GLYPH_EMPTY);
    }

    let (mut succeeded, mut failed, mut unknown) = (0u32, 0u32, 0u32);
    let mut day = month;
    while day <= end {
        let status = classify(day, today, values);
        match status {
            DayStatus::Succeeded => succeeded += 1,
            DayStatus::Failed => failed += 1,
            DayStatus::Unknown | DayStatus::Today => unknown += 1,
        }
        grid.push_str(status.glyph());
        if day.weekday() == Weekday::Sun {
            grid.push('\n');
        }
        day += Duration::days(1);
    }
    if !grid.ends_with('\n') {
        grid.push('\n');
    }

    // Past months are fully resolved, so their unknown count is dropped.
    let unknown = (month == first_of_month(today)).then_some(unknown);

    let mut summary = format!("{GLYPH_SUCCEEDED} {succeeded}  {GLYPH_FAILED} {failed}");
    if let Some(unknown) = unknown {
        summary.push_str(&format!("  {GLYPH_UNKNOWN} {unknown}"));
    }

    MonthCalendar {
        month,
        succeeded,
        failed,
        unknown,
        text: format!("{}\n{grid}{summary}", month_header(month)),
    }
}

/// Fetch the values of `tag` for `month` and render its calendar.
pub async fn render(
    tracking: &dyn TrackingClient,
    tag: &str,
    month: NaiveDate,
    today: NaiveDate,
) -> Result<MonthCalendar> {
    let month = first_of_month(month);
    let values = tracking.values(tag, month, month_end(month)).await?;
    Ok(render_month(month, today, &values))
}
