#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use exsync::calendar::FixedClock;
use exsync::clients::{AttributeValue, Comment, TaskClient, TrackingClient};
use exsync::config::SyncConfig;
use exsync::store::TagStore;
use exsync::sync::Syncer;
use exsync::{Error, Result};
use tempfile::TempDir;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at(y: i32, m: u32, d: u32, hour: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(hour, 0, 0).expect("valid time")
}

/// In-memory Exist.io
#[derive(Default)]
pub struct FakeTracking {
    pub values: Mutex<BTreeMap<String, BTreeMap<NaiveDate, i64>>>,
    pub owned: Mutex<BTreeSet<String>>,
    pub released: Mutex<Vec<String>>,
    /// Every `values` query, as (attribute, date_min, date_max)
    pub queries: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    pub fail_values_for: Mutex<Option<String>>,
}

impl FakeTracking {
    pub fn set(&self, tag: &str, day: NaiveDate, value: i64) {
        self.values
            .lock()
            .unwrap()
            .entry(tag.to_string())
            .or_default()
            .insert(day, value);
    }

    pub fn value(&self, tag: &str, day: NaiveDate) -> Option<i64> {
        self.values
            .lock()
            .unwrap()
            .get(tag)
            .and_then(|days| days.get(&day).copied())
    }

    pub fn owns(&self, tag: &str) -> bool {
        self.owned.lock().unwrap().contains(tag)
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }

    pub fn fail_values_for(&self, tag: &str) {
        *self.fail_values_for.lock().unwrap() = Some(tag.to_string());
    }
}

#[async_trait]
impl TrackingClient for FakeTracking {
    async fn values(
        &self,
        attribute: &str,
        date_min: NaiveDate,
        date_max: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, i64>> {
        if self.fail_values_for.lock().unwrap().as_deref() == Some(attribute) {
            return Err(Error::Api {
                service: "existio",
                status: 500,
                message: "boom".to_string(),
            });
        }
        self.queries
            .lock()
            .unwrap()
            .push((attribute.to_string(), date_min, date_max));
        let values = self.values.lock().unwrap();
        Ok(values
            .get(attribute)
            .map(|days| {
                days.range(date_min..=date_max)
                    .map(|(day, value)| (*day, *value))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn acquire(&self, names: &[String]) -> Result<()> {
        self.owned.lock().unwrap().extend(names.iter().cloned());
        Ok(())
    }

    async fn release(&self, names: &[String]) -> Result<()> {
        let mut owned = self.owned.lock().unwrap();
        for name in names {
            owned.remove(name);
        }
        self.released.lock().unwrap().extend(names.iter().cloned());
        Ok(())
    }

    async fn create(&self, names: &[String]) -> Result<()> {
        self.acquire(names).await
    }

    async fn update(&self, values: &[AttributeValue]) -> Result<()> {
        let names: Vec<String> = values.iter().map(|value| value.name.clone()).collect();
        self.acquire(&names).await?;
        for value in values {
            self.set(&value.name, value.date, value.value);
        }
        Ok(())
    }
}

/// In-memory Todoist comments and descriptions
#[derive(Default)]
pub struct FakeTasks {
    pub comments: Mutex<Vec<Comment>>,
    pub descriptions: Mutex<BTreeMap<String, String>>,
    pub deleted: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
}

impl FakeTasks {
    /// Seed a comment as if the user had posted it.
    pub fn seed(&self, task_id: &str, content: &str) -> String {
        let id = self.next_id();
        self.comments.lock().unwrap().push(Comment {
            id: id.clone(),
            task_id: Some(task_id.to_string()),
            content: content.to_string(),
        });
        id
    }

    pub fn contents(&self, task_id: &str) -> Vec<String> {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.task_id.as_deref() == Some(task_id))
            .map(|comment| comment.content.clone())
            .collect()
    }

    pub fn description(&self, task_id: &str) -> Option<String> {
        self.descriptions.lock().unwrap().get(task_id).cloned()
    }

    pub fn was_deleted(&self, comment_id: &str) -> bool {
        self.deleted.lock().unwrap().iter().any(|id| id == comment_id)
    }

    fn next_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("c{next}")
    }
}

#[async_trait]
impl TaskClient for FakeTasks {
    async fn comments(&self, task_id: &str) -> Result<Vec<Comment>> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.task_id.as_deref() == Some(task_id))
            .cloned()
            .collect())
    }

    async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment> {
        let comment = Comment {
            id: self.next_id(),
            task_id: Some(task_id.to_string()),
            content: content.to_string(),
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, comment_id: &str, content: &str) -> Result<Comment> {
        let mut comments = self.comments.lock().unwrap();
        let comment = comments
            .iter_mut()
            .find(|comment| comment.id == comment_id)
            .ok_or_else(|| Error::Api {
                service: "todoist",
                status: 404,
                message: "not found".to_string(),
            })?;
        comment.content = content.to_string();
        Ok(comment.clone())
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|comment| comment.id != comment_id);
        if comments.len() == before {
            return Err(Error::Api {
                service: "todoist",
                status: 404,
                message: "not found".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(comment_id.to_string());
        Ok(())
    }

    async fn update_description(&self, task_id: &str, description: &str) -> Result<()> {
        self.descriptions
            .lock()
            .unwrap()
            .insert(task_id.to_string(), description.to_string());
        Ok(())
    }
}

/// A syncer wired to fakes, with a fixed clock and a temp bindings file.
pub struct Harness {
    pub syncer: Syncer,
    pub store: Arc<TagStore>,
    pub tracking: Arc<FakeTracking>,
    pub tasks: Arc<FakeTasks>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(now: NaiveDateTime) -> Self {
        Self::with_settings(now, SyncConfig::default())
    }

    pub fn with_settings(now: NaiveDateTime, settings: SyncConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(TagStore::load(dir.path().join("data.txt")).expect("store"));
        let tracking = Arc::new(FakeTracking::default());
        let tasks = Arc::new(FakeTasks::default());
        let syncer = Syncer::new(
            Arc::clone(&store),
            tracking.clone(),
            tasks.clone(),
            settings,
        )
        .with_clock(Arc::new(FixedClock(now)));
        Self {
            syncer,
            store,
            tracking,
            tasks,
            dir,
        }
    }

    /// Bind directly in the store, bypassing the command flow.
    pub fn bind(&self, task_id: &str, tag: &str) {
        self.store.bind(task_id, tag).expect("bind");
    }

    /// Headers of the stats comments currently on `task_id`.
    pub fn stats_headers(&self, task_id: &str) -> Vec<String> {
        self.tasks
            .contents(task_id)
            .iter()
            .filter(|content| content.contains(exsync::render::STATS_EMOJI))
            .filter_map(|content| content.lines().next().map(str::to_string))
            .collect()
    }
}
