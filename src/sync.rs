//! Event dispatch and the handlers behind it.
//!
//! [`Syncer`] owns the tag store and both service clients. Every inbound
//! event is handled on its own: look up the binding, write to Exist, then
//! reconcile the stats comments on the task. Remote calls for one task are
//! strictly sequential; batch refreshes run one job per task concurrently.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;

use crate::calendar::{effective_date, Clock, SystemClock};
use crate::clients::existio::TAG_URL_FRAGMENT;
use crate::clients::{AttributeValue, TaskClient, TrackingClient};
use crate::command::{comment_command, description_command, Command, DaySpec};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::reconcile::{reconcile, ReconcileOptions, Refresh};
use crate::render::{MonthCalendar, STATS_EMOJI};
use crate::store::TagStore;
use crate::webhook::{InboundEvent, Note, Task};

/// Where a command came from; replies go back to the same surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A comment, deleted once the command succeeded
    Comment { comment_id: String },
    /// The task description, cleared once the command succeeded
    Description,
}

/// Result of one refresh job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub task_id: String,
    pub tag: String,
    /// Headers of the months posted
    pub posted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a batch refresh
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<JobReport>,
    pub failed: Vec<JobReport>,
}

/// Event dispatcher and sync engine
pub struct Syncer {
    store: Arc<TagStore>,
    tracking: Arc<dyn TrackingClient>,
    tasks: Arc<dyn TaskClient>,
    clock: Arc<dyn Clock>,
    settings: SyncConfig,
    debug: bool,
}

impl Syncer {
    pub fn new(
        store: Arc<TagStore>,
        tracking: Arc<dyn TrackingClient>,
        tasks: Arc<dyn TaskClient>,
        settings: SyncConfig,
    ) -> Self {
        Self {
            store,
            tracking,
            tasks,
            clock: Arc::new(SystemClock),
            settings,
            debug: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// In debug mode job failures are returned instead of only logged.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn store(&self) -> &TagStore {
        &self.store
    }

    pub fn settings(&self) -> &SyncConfig {
        &self.settings
    }

    /// Effective date, honoring the configured day boundary.
    pub fn today(&self) -> NaiveDate {
        effective_date(self.clock.now(), self.settings.day_boundary_hour)
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    /// Route an event to its handler.
    pub async fn handle(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::CommentAdded(note) => self.comment_added(note).await,
            InboundEvent::TaskUpdated(task) => self.task_updated(task).await,
            InboundEvent::TaskCompleted(task) => self.task_completed(task, true).await,
            InboundEvent::TaskUncompleted(task) => self.task_completed(task, false).await,
            InboundEvent::TaskDeleted(task) => self.task_deleted(task).await,
        }
    }

    /// Handle an event as a top-level job: failures are logged, and only
    /// returned in debug mode.
    pub async fn run_event(&self, event: InboundEvent) -> Result<()> {
        let kind = event.kind();
        let task_id = event.task_id().to_string();
        tracing::info!(%kind, %task_id, "handling event");
        match self.handle(event).await {
            Ok(()) => {
                tracing::info!(%kind, %task_id, "SUCCESS");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%kind, %task_id, "FAILURE");
                if self.debug {
                    return Err(err);
                }
                tracing::error!(%kind, %task_id, error = %err, "event failed");
                Ok(())
            }
        }
    }

    async fn comment_added(&self, note: Note) -> Result<()> {
        let Some(text) = comment_command(&note.content, &self.settings.command_prefix) else {
            return Ok(());
        };
        let origin = Origin::Comment {
            comment_id: note.id.clone(),
        };
        self.run_command(&note.item_id, text, origin).await
    }

    async fn task_updated(&self, task: Task) -> Result<()> {
        let Some(text) = description_command(&task.description) else {
            return Ok(());
        };
        self.run_command(&task.id, text, Origin::Description).await
    }

    async fn task_completed(&self, task: Task, success: bool) -> Result<()> {
        let Some(tag) = self.store.get(&task.id) else {
            tracing::debug!(task_id = %task.id, "task is not linked, skipping");
            return Ok(());
        };
        let today = self.today();
        self.tracking
            .update(&[AttributeValue::new(tag.as_str(), today, success)])
            .await?;
        self.post_stats(&task.id, &tag, self.settings.update_window, Refresh::Normal)
            .await?;
        Ok(())
    }

    async fn task_deleted(&self, task: Task) -> Result<()> {
        // Comments are gone together with the task.
        self.release(&task.id, None).await?;
        Ok(())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Parse and execute a command for `task_id`, replying on `origin`.
    pub async fn run_command(&self, task_id: &str, text: &str, origin: Origin) -> Result<()> {
        let command = match Command::parse(text) {
            Ok(command) => command,
            Err(err) => {
                tracing::info!(task_id, text, error = %err, "rejected command");
                return self.reply_error(task_id, &origin, &err.to_string()).await;
            }
        };

        let tag = self.store.get(task_id);
        if command.requires_binding() && tag.is_none() {
            let message = format!(
                "this task is not linked to a tag yet, comment `{} +<tag>` first",
                self.settings.command_prefix
            );
            return self.reply_error(task_id, &origin, &message).await;
        }

        tracing::info!(task_id, ?command, "running command");
        let today = self.today();
        let window = self.settings.update_window;
        let mut origin_deleted = false;

        match (command, tag) {
            (Command::Bind(new_tag), _) => {
                self.bind(task_id, &new_tag, &origin).await?;
            }
            (Command::Release, _) => {
                self.release(task_id, Some(&origin)).await?;
                origin_deleted = matches!(origin, Origin::Comment { .. });
            }
            (Command::Update, Some(tag)) => {
                self.post_stats(task_id, &tag, window, Refresh::All).await?;
            }
            (Command::Yesterday, Some(tag)) => {
                let day = DaySpec::Yesterday.resolve(today);
                self.set_day(task_id, &tag, day, true).await?;
            }
            (Command::SetDay { day, success }, Some(tag)) => {
                self.set_day(task_id, &tag, day.resolve(today), success).await?;
            }
            (_, None) => return Ok(()),
        }

        if !origin_deleted {
            self.acknowledge(task_id, &origin).await?;
        }
        Ok(())
    }

    async fn bind(&self, task_id: &str, tag: &str, origin: &Origin) -> Result<()> {
        let previous = {
            let (task_id, tag) = (task_id.to_string(), tag.to_string());
            self.write_store(move |store| store.bind(&task_id, &tag)).await?
        };
        tracing::info!(task_id, tag, ?previous, "bound task");

        if let Some(previous) = previous.filter(|previous| previous != tag) {
            self.delete_sync_comments(task_id, Some(origin)).await?;
            self.release_attribute(task_id, &previous).await?;
        }

        self.tracking.acquire(&[tag.to_string()]).await?;

        let url = self.tracking.tag_url(tag);
        let comments = self.tasks.comments(task_id).await?;
        if !comments.iter().any(|comment| comment.content.contains(&url)) {
            let link = format!(
                "🔗 {} tracking [{tag}]({url})",
                self.settings.command_prefix
            );
            self.tasks.add_comment(task_id, &link).await?;
        }

        self.post_stats(task_id, tag, self.settings.update_window, Refresh::Normal)
            .await?;
        Ok(())
    }

    async fn set_day(&self, task_id: &str, tag: &str, day: NaiveDate, success: bool) -> Result<()> {
        self.tracking
            .update(&[AttributeValue::new(tag, day, success)])
            .await?;
        self.post_stats(task_id, tag, self.settings.update_window, Refresh::Month(day))
            .await?;
        Ok(())
    }

    /// Unbind `task_id`; with an origin, also delete every sync comment.
    ///
    /// Returns the tag that was bound.
    pub async fn release(&self, task_id: &str, origin: Option<&Origin>) -> Result<Option<String>> {
        let owned_id = task_id.to_string();
        let unbound = self
            .write_store(move |store| store.unbind(&owned_id))
            .await?;
        let Some(tag) = unbound else {
            return Ok(None);
        };
        tracing::info!(task_id, %tag, "released task");
        self.release_attribute(task_id, &tag).await?;
        if origin.is_some() {
            self.delete_sync_comments(task_id, None).await?;
        }
        Ok(Some(tag))
    }

    /// Run a store rewrite on the blocking pool; it may wait on the file lock.
    async fn write_store<T, F>(&self, write: F) -> Result<T>
    where
        F: FnOnce(&TagStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || write(&store)).await?
    }

    async fn release_attribute(&self, task_id: &str, tag: &str) -> Result<()> {
        if self.store.is_tag_in_use(tag, task_id) {
            tracing::debug!(tag, "tag still used by another task");
            return Ok(());
        }
        self.tracking.release(&[tag.to_string()]).await
    }

    /// Whether a comment was produced by (or addressed to) this service.
    pub fn is_sync_comment(&self, content: &str) -> bool {
        content.contains(self.settings.command_prefix.as_str())
            || content.contains(STATS_EMOJI)
            || content.contains(TAG_URL_FRAGMENT)
    }

    /// Delete sync comments, keeping the origin comment if given.
    async fn delete_sync_comments(&self, task_id: &str, keep: Option<&Origin>) -> Result<usize> {
        let keep_id = match keep {
            Some(Origin::Comment { comment_id }) => Some(comment_id.as_str()),
            _ => None,
        };
        let comments = self.tasks.comments(task_id).await?;
        let mut deleted = 0;
        for comment in comments {
            if Some(comment.id.as_str()) == keep_id || !self.is_sync_comment(&comment.content) {
                continue;
            }
            self.tasks.delete_comment(&comment.id).await?;
            deleted += 1;
        }
        tracing::debug!(task_id, deleted, "deleted sync comments");
        Ok(deleted)
    }

    async fn reply_error(&self, task_id: &str, origin: &Origin, message: &str) -> Result<()> {
        let text = format!("⚠️ {} {message}", self.settings.command_prefix);
        match origin {
            Origin::Comment { .. } => {
                self.tasks.add_comment(task_id, &text).await?;
            }
            Origin::Description => {
                self.tasks.update_description(task_id, &text).await?;
            }
        }
        Ok(())
    }

    async fn acknowledge(&self, task_id: &str, origin: &Origin) -> Result<()> {
        match origin {
            Origin::Comment { comment_id } => self.tasks.delete_comment(comment_id).await,
            Origin::Description => self.tasks.update_description(task_id, "").await,
        }
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// Reconcile the stats comments of a bound task.
    pub async fn post_stats(
        &self,
        task_id: &str,
        tag: &str,
        window: u32,
        refresh: Refresh,
    ) -> Result<Vec<MonthCalendar>> {
        let options = ReconcileOptions {
            today: self.today(),
            update_window: window,
            cutoff_day: self.settings.prior_month_cutoff_day,
            refresh,
        };
        let posted = reconcile(
            self.tracking.as_ref(),
            self.tasks.as_ref(),
            task_id,
            tag,
            &options,
        )
        .await?;
        tracing::debug!(
            task_id,
            tag,
            "stats:\n{}\n",
            posted
                .iter()
                .map(|calendar| calendar.text.as_str())
                .collect::<Vec<_>>()
                .join("\n--\n")
        );
        Ok(posted)
    }

    /// Refresh one bound task.
    pub async fn refresh_task(&self, task_id: &str, window: u32, refresh: Refresh) -> Result<JobReport> {
        let tag = self
            .store
            .get(task_id)
            .ok_or_else(|| Error::TagNotBound(task_id.to_string()))?;
        let (report, error) = self.run_job(task_id, &tag, window, refresh).await;
        match error {
            Some(err) if self.debug => Err(err),
            _ => Ok(report),
        }
    }

    /// Refresh every bound task concurrently.
    pub async fn refresh_all(&self, window: u32, refresh: Refresh) -> Result<BatchReport> {
        let bindings = self.store.all();
        let jobs = bindings
            .iter()
            .map(|(task_id, tag)| self.run_job(task_id, tag, window, refresh));
        let outcomes = join_all(jobs).await;

        let mut report = BatchReport::default();
        let mut first_error = None;
        for (job, error) in outcomes {
            match error {
                Some(err) => {
                    first_error.get_or_insert(err);
                    report.failed.push(job);
                }
                None => report.succeeded.push(job),
            }
        }
        match first_error {
            Some(err) if self.debug => Err(err),
            _ => Ok(report),
        }
    }

    async fn run_job(
        &self,
        task_id: &str,
        tag: &str,
        window: u32,
        refresh: Refresh,
    ) -> (JobReport, Option<Error>) {
        tracing::info!(task_id, tag, "starting");
        let result = self.post_stats(task_id, tag, window, refresh).await;
        tracing::info!(task_id, tag, "finished");

        let mut report = JobReport {
            task_id: task_id.to_string(),
            tag: tag.to_string(),
            posted: Vec::new(),
            error: None,
        };
        match result {
            Ok(posted) => {
                tracing::info!(task_id, tag, "SUCCESS");
                report.posted = posted
                    .iter()
                    .map(|calendar| crate::render::month_header(calendar.month))
                    .collect();
                (report, None)
            }
            Err(err) => {
                tracing::warn!(task_id, tag, "FAILURE");
                tracing::error!(task_id, tag, error = %err, "job failed");
                report.error = Some(err.to_string());
                (report, Some(err))
            }
        }
    }
}
