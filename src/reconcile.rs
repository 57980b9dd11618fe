//! Stats comment reconciliation.
//!
//! Stats comments are found again on every run by scanning comment text for
//! month headers; no comment ids are stored. For each month of the window:
//!
//! - months that need a fresh post (current month, previous month before
//!   the cutoff day, or forced) have their old comments deleted and are
//!   regenerated,
//! - other months are only generated when no comment carries their header,
//! - a full refresh also drops calendars of months outside the window.
//!
//! Nothing is posted for months before tracking began: a generated month is
//! posted once it, or an older generated month, has a success. A fresh
//! month that loses its last success is deleted and not posted again. All
//! deletions happen before any comment is added.

use chrono::{Datelike, NaiveDate};

use crate::calendar::{first_of_month, months_before, window_months};
use crate::clients::{Comment, TaskClient, TrackingClient};
use crate::error::Result;
use crate::render::{month_header, render, MonthCalendar, STATS_EMOJI};

/// Which months are regenerated regardless of existing comments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Current month, and the previous one before the cutoff day
    Normal,
    /// Every month of the window
    All,
    /// `Normal` plus the given month
    Month(NaiveDate),
}

/// Inputs of a reconciliation run
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    pub today: NaiveDate,
    /// Months before the current one to consider
    pub update_window: u32,
    /// The previous month is refreshed while today's day-of-month is below this
    pub cutoff_day: u32,
    pub refresh: Refresh,
}

/// Comments to delete and months to generate, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub delete: Vec<String>,
    pub generate: Vec<NaiveDate>,
}

/// Whether `month` must be deleted and posted again.
pub fn needs_fresh_post(month: NaiveDate, options: &ReconcileOptions) -> bool {
    let current = first_of_month(options.today);
    if month == current {
        return true;
    }
    if month == months_before(options.today, 1) && options.today.day() < options.cutoff_day {
        return true;
    }
    match options.refresh {
        Refresh::Normal => false,
        Refresh::All => true,
        Refresh::Month(forced) => first_of_month(forced) == month,
    }
}

/// Decide what to delete and what to generate given the task's comments.
///
/// `Refresh::All` also deletes stats comments of months outside the window.
pub fn plan(options: &ReconcileOptions, comments: &[Comment]) -> ReconcilePlan {
    let mut result = ReconcilePlan::default();
    if options.refresh == Refresh::All {
        result.delete = comments
            .iter()
            .filter(|comment| comment.content.contains(STATS_EMOJI))
            .map(|comment| comment.id.clone())
            .collect();
    }
    for month in window_months(options.today, options.update_window) {
        let header = month_header(month);
        let existing = comments
            .iter()
            .filter(|comment| comment.content.contains(&header));

        if needs_fresh_post(month, options) {
            for comment in existing {
                if !result.delete.contains(&comment.id) {
                    result.delete.push(comment.id.clone());
                }
            }
            result.generate.push(month);
        } else if existing.count() == 0 {
            result.generate.push(month);
        }
    }
    result
}

/// Drop months older than the first one with a success.
///
/// `calendars` must be ordered oldest first.
pub fn select_for_posting(calendars: Vec<MonthCalendar>) -> Vec<MonthCalendar> {
    let mut tracking_started = false;
    calendars
        .into_iter()
        .filter(|calendar| {
            tracking_started |= calendar.succeeded > 0;
            tracking_started
        })
        .collect()
}

/// Bring the stats comments of `task_id` up to date; returns posted months.
pub async fn reconcile(
    tracking: &dyn TrackingClient,
    tasks: &dyn TaskClient,
    task_id: &str,
    tag: &str,
    options: &ReconcileOptions,
) -> Result<Vec<MonthCalendar>> {
    let comments = tasks.comments(task_id).await?;
    let plan = plan(options, &comments);
    tracing::debug!(
        task_id,
        delete = plan.delete.len(),
        generate = plan.generate.len(),
        "reconcile plan"
    );

    for comment_id in &plan.delete {
        tasks.delete_comment(comment_id).await?;
    }

    let mut calendars = Vec::with_capacity(plan.generate.len());
    for month in &plan.generate {
        calendars.push(render(tracking, tag, *month, options.today).await?);
    }

    let posted = select_for_posting(calendars);
    for calendar in &posted {
        tasks.add_comment(task_id, &calendar.text).await?;
    }
    Ok(posted)
}
