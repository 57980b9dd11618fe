//! exsync update-all / update-task command implementation
//!
//! Batch refresh of stats comments, meant to be run from cron.

use crate::config::{Config, MAX_UPDATE_WINDOW};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::reconcile::Refresh;
use crate::sync::{BatchReport, JobReport};

/// Options shared by both update commands
pub struct UpdateOptions {
    pub force: bool,
    pub update_months: Option<u32>,
    pub config: Config,
    pub output: OutputOptions,
}

impl UpdateOptions {
    /// Window and refresh mode; `--force` widens the default window.
    fn plan(&self) -> Result<(u32, Refresh)> {
        if let Some(months) = self.update_months {
            if months > MAX_UPDATE_WINDOW {
                return Err(Error::InvalidArgument(format!(
                    "--update-months must be <= {MAX_UPDATE_WINDOW}, got {months}"
                )));
            }
        }
        let sync = &self.config.sync;
        Ok(if self.force {
            (
                self.update_months.unwrap_or(sync.force_update_window),
                Refresh::All,
            )
        } else {
            (
                self.update_months.unwrap_or(sync.update_window),
                Refresh::Normal,
            )
        })
    }
}

pub fn run_all(options: UpdateOptions) -> Result<()> {
    let (window, refresh) = options.plan()?;
    let syncer = super::build_syncer(&options.config)?;
    let report = super::runtime()?.block_on(syncer.refresh_all(window, refresh))?;

    let total = report.succeeded.len() + report.failed.len();
    let mut human = HumanOutput::new(format!("exsync update-all: {total} tasks refreshed"));
    human.push_summary("window", format!("{window} months"));
    human.push_summary("force", options.force.to_string());
    human.push_summary("succeeded", report.succeeded.len().to_string());
    human.push_summary("failed", report.failed.len().to_string());
    push_jobs(&mut human, &report);

    emit_success(options.output, "update-all", &report, Some(&human))
}

pub fn run_task(task_id: String, options: UpdateOptions) -> Result<()> {
    let (window, refresh) = options.plan()?;
    let syncer = super::build_syncer(&options.config)?;
    let job = super::runtime()?.block_on(syncer.refresh_task(&task_id, window, refresh))?;

    let mut human = HumanOutput::new(format!("exsync update-task: {task_id}"));
    human.push_summary("tag", job.tag.clone());
    human.push_summary("window", format!("{window} months"));
    push_job(&mut human, &job);

    emit_success(options.output, "update-task", &job, Some(&human))
}

fn push_jobs(human: &mut HumanOutput, report: &BatchReport) {
    for job in report.succeeded.iter().chain(&report.failed) {
        push_job(human, job);
    }
}

fn push_job(human: &mut HumanOutput, job: &JobReport) {
    match &job.error {
        Some(error) => human.push_warning(format!("{} ({}): {error}", job.task_id, job.tag)),
        None if job.posted.is_empty() => {
            human.push_detail(format!("{} ({}): up to date", job.task_id, job.tag))
        }
        None => human.push_detail(format!(
            "{} ({}): posted {}",
            job.task_id,
            job.tag,
            job.posted.join(", ")
        )),
    }
}
