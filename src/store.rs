//! Task -> tag binding store
//!
//! Bindings live in a plain text file, one `task_id:tag` record per line.
//! The file is read once by [`TagStore::load`] and rewritten in full after
//! every mutation.
//!
//! ```text
//! 2995104339:daily_walk
//! 2995104512:read_book
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Normalize a user supplied tag name into an attribute name.
///
/// Lowercases, trims, and replaces spaces with underscores. Returns `None`
/// for an empty tag.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().to_lowercase().replace(' ', "_");
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// Parse the store file format. Blank and malformed lines are skipped.
pub fn parse_bindings(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let (task_id, tag) = line.trim().split_once(':')?;
            let (task_id, tag) = (task_id.trim(), tag.trim());
            if task_id.is_empty() || tag.is_empty() {
                return None;
            }
            Some((task_id.to_string(), tag.to_string()))
        })
        .collect()
}

/// Render bindings into the store file format.
pub fn format_bindings(bindings: &BTreeMap<String, String>) -> String {
    bindings
        .iter()
        .map(|(task_id, tag)| format!("{task_id}:{tag}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Process-wide tag binding store
#[derive(Debug)]
pub struct TagStore {
    path: PathBuf,
    bindings: RwLock<BTreeMap<String, String>>,
}

impl TagStore {
    /// Load the store from `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bindings = match lock::read_locked_str(&path, DEFAULT_LOCK_TIMEOUT_MS)? {
            Some(content) => parse_bindings(&content),
            None => BTreeMap::new(),
        };
        tracing::debug!(path = %path.display(), count = bindings.len(), "loaded tag bindings");
        Ok(Self {
            path,
            bindings: RwLock::new(bindings),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tag bound to `task_id`, if any
    pub fn get(&self, task_id: &str) -> Option<String> {
        self.read().get(task_id).cloned()
    }

    /// Snapshot of every binding
    pub fn all(&self) -> BTreeMap<String, String> {
        self.read().clone()
    }

    /// Whether any task other than `except_task` is bound to `tag`
    pub fn is_tag_in_use(&self, tag: &str, except_task: &str) -> bool {
        self.read()
            .iter()
            .any(|(task_id, bound)| bound == tag && task_id != except_task)
    }

    /// Bind `task_id` to `tag`, returning the previous tag.
    pub fn bind(&self, task_id: &str, tag: &str) -> Result<Option<String>> {
        let mut bindings = self.write();
        let previous = bindings.insert(task_id.to_string(), tag.to_string());
        self.save(&bindings)?;
        Ok(previous)
    }

    /// Remove the binding for `task_id`, returning the removed tag.
    pub fn unbind(&self, task_id: &str) -> Result<Option<String>> {
        let mut bindings = self.write();
        let removed = bindings.remove(task_id);
        if removed.is_some() {
            self.save(&bindings)?;
        }
        Ok(removed)
    }

    fn save(&self, bindings: &BTreeMap<String, String>) -> Result<()> {
        let content = format_bindings(bindings);
        lock::write_atomic_locked(&self.path, content.as_bytes(), DEFAULT_LOCK_TIMEOUT_MS)
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.bindings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.bindings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
