//! Task registry
//!
//! Ordered list of generation task records, newest first. Records are only
//! ever removed by an explicit [`TaskRegistry::remove`] or
//! [`TaskRegistry::clear`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use tunesmith_common::config::write_atomically;
use tunesmith_common::{Error, Result};

use crate::api::TaskResult;

/// What a task generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Music,
    Lyrics,
}

/// Lifecycle stage of a task record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Music => "music",
            TaskKind::Lyrics => "lyrics",
        })
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "music" => Ok(TaskKind::Music),
            "lyrics" => Ok(TaskKind::Lyrics),
            other => Err(format!("unknown task kind '{}' (expected music or lyrics)", other)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        })
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "success" => Ok(TaskStatus::Success),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!(
                "unknown task status '{}' (expected pending, success or failed)",
                other
            )),
        }
    }
}

/// One generation request and its lifecycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Upstream task id
    pub id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Task fields supplied by the caller; `created_at` is assigned on add
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub prompt: String,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
}

impl NewTask {
    /// Freshly submitted task
    pub fn pending(id: impl Into<String>, kind: TaskKind, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            status: TaskStatus::Pending,
            prompt: prompt.into(),
            result: None,
            error: None,
        }
    }
}

/// Partial update merged into an existing record; `None` fields are kept
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub prompt: Option<String>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn succeeded(result: Option<TaskResult>) -> Self {
        Self {
            status: Some(TaskStatus::Success),
            result,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// In-memory task registry
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a record stamped with the current time
    ///
    /// A record with the same id is replaced so ids stay unique.
    pub fn add(&mut self, task: NewTask) -> &Task {
        self.tasks.retain(|t| t.id != task.id);
        self.tasks.insert(
            0,
            Task {
                id: task.id,
                kind: task.kind,
                status: task.status,
                prompt: task.prompt,
                result: task.result,
                error: task.error,
                created_at: tunesmith_common::time::now(),
            },
        );
        debug!(task_id = %self.tasks[0].id, kind = %self.tasks[0].kind, "Task added");
        &self.tasks[0]
    }

    /// Merge `update` into the record with `id`
    ///
    /// Returns whether a record matched; a missing id changes nothing.
    pub fn update(&mut self, id: &str, update: TaskUpdate) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(task_id = id, "Update for unknown task ignored");
            return false;
        };

        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(prompt) = update.prompt {
            task.prompt = prompt;
        }
        if let Some(result) = update.result {
            task.result = Some(result);
        }
        if let Some(error) = update.error {
            task.error = Some(error);
        }
        true
    }

    /// Remove the record with `id`; returns whether one was removed
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        before != self.tasks.len()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn by_kind(&self, kind: TaskKind) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.kind == kind).collect()
    }

    pub fn by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    /// All records, newest first
    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Restore a registry snapshot; a missing file yields an empty registry
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        let tasks: Vec<Task> = serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("Parse task history {} failed: {}", path.display(), e))
        })?;
        debug!(count = tasks.len(), "Task history loaded");
        Ok(Self { tasks })
    }

    /// Restore a snapshot, moving an unparsable file out of the way
    ///
    /// A file that fails to parse is renamed to `<name>.bad` and an empty
    /// registry returned, so a later [`TaskRegistry::save`] cannot overwrite
    /// the user's history. Read and rename failures are returned.
    pub fn load_or_set_aside(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(Error::Storage(reason)) => {
                let mut backup = path.as_os_str().to_owned();
                backup.push(".bad");
                let backup = PathBuf::from(backup);
                std::fs::rename(path, &backup)?;
                warn!(
                    "Task history unreadable ({}), moved to {}",
                    reason,
                    backup.display()
                );
                Ok(Self::new())
            }
            other => other,
        }
    }

    /// Write a registry snapshot (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.tasks)
            .map_err(|e| Error::Storage(format!("Serialize task history failed: {}", e)))?;
        write_atomically(path, content.as_bytes())
    }
}
