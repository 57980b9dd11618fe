//! Remote service clients.
//!
//! The sync engine only talks to the two services through the
//! [`TrackingClient`] and [`TaskClient`] traits, so handlers can be driven
//! by in-memory fakes in tests.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod existio;
pub mod todoist;

pub use existio::ExistClient;
pub use todoist::TodoistClient;

/// Maximum number of objects per Exist.io write request
pub const MAX_OBJECTS_PER_REQUEST: usize = 35;

/// Maximum span of a single values query, in days
pub const MAX_VALUES_RANGE_DAYS: i64 = 100;

/// A value pushed to the tracking service for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub name: String,
    pub date: NaiveDate,
    pub value: i64,
}

impl AttributeValue {
    pub fn new(name: impl Into<String>, date: NaiveDate, success: bool) -> Self {
        Self {
            name: name.into(),
            date,
            value: i64::from(success),
        }
    }
}

/// Quantified-self tracking service (Exist.io)
#[async_trait]
pub trait TrackingClient: Send + Sync {
    /// Recorded values of `attribute` in `[date_min, date_max]`.
    /// Days without data are absent from the map.
    async fn values(
        &self,
        attribute: &str,
        date_min: NaiveDate,
        date_max: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, i64>>;

    /// Take ownership of attributes, creating the ones that do not exist.
    async fn acquire(&self, names: &[String]) -> Result<()>;

    /// Give up ownership of attributes.
    async fn release(&self, names: &[String]) -> Result<()>;

    /// Create manual boolean attributes.
    async fn create(&self, names: &[String]) -> Result<()>;

    /// Push values, acquiring their attributes first.
    async fn update(&self, values: &[AttributeValue]) -> Result<()>;

    /// Public trends page of a tag.
    fn tag_url(&self, tag: &str) -> String {
        existio::tag_url(tag)
    }
}

/// A comment on a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Task-tracking service (Todoist)
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Comments of a task, oldest first.
    async fn comments(&self, task_id: &str) -> Result<Vec<Comment>>;

    async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment>;

    async fn update_comment(&self, comment_id: &str, content: &str) -> Result<Comment>;

    async fn delete_comment(&self, comment_id: &str) -> Result<()>;

    async fn update_description(&self, task_id: &str, description: &str) -> Result<()>;
}

/// Shared reqwest client with the configured request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("exsync/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Join a base URL and a relative path with exactly one slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
