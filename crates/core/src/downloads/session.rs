//! Per-session task lists.
//!
//! Every session's tasks sit behind one async mutex. Callers never get the
//! list itself, only the atomic operations below, so a handler appending a
//! task and a background watcher updating one cannot lose each other's
//! writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::types::{DownloadError, DownloadTask, TaskUpdate};

/// Result of [`SessionTasks::append`].
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Added(DownloadTask),
    /// The magnet was already tracked in this session.
    Existing(DownloadTask),
}

/// The ordered task list of one session.
#[derive(Debug)]
pub struct SessionTasks {
    session_id: String,
    tasks: Mutex<Vec<DownloadTask>>,
}

impl SessionTasks {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Append `task` unless its magnet is already present.
    pub async fn append(&self, task: DownloadTask) -> AppendOutcome {
        let mut tasks = self.tasks.lock().await;
        if let Some(existing) = tasks.iter().find(|t| t.magnet == task.magnet) {
            return AppendOutcome::Existing(existing.clone());
        }
        tasks.push(task.clone());
        AppendOutcome::Added(task)
    }

    /// Apply `update` to the task with `magnet`. Returns the task after the
    /// update, or `None` if the session has no such task.
    pub async fn apply(&self, magnet: &str, update: TaskUpdate) -> Option<DownloadTask> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.iter_mut().find(|t| t.magnet == magnet)?;
        task.apply(update);
        Some(task.clone())
    }

    pub async fn get(&self, magnet: &str) -> Option<DownloadTask> {
        self.tasks
            .lock()
            .await
            .iter()
            .find(|t| t.magnet == magnet)
            .cloned()
    }

    /// Snapshot of every task, in insertion order.
    pub async fn list(&self) -> Vec<DownloadTask> {
        self.tasks.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

/// Storage for session task lists. Session lifecycle is owned elsewhere.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The task list for `session_id`, created empty on first use.
    async fn session(&self, session_id: &str) -> Result<Arc<SessionTasks>, DownloadError>;

    /// The task list for `session_id`, if the session has one.
    async fn existing(&self, session_id: &str) -> Result<Option<Arc<SessionTasks>>, DownloadError>;

    /// Every known session id.
    async fn session_ids(&self) -> Result<Vec<String>, DownloadError>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionTasks>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn session(&self, session_id: &str) -> Result<Arc<SessionTasks>, DownloadError> {
        if let Some(tasks) = self.sessions.read().await.get(session_id) {
            return Ok(Arc::clone(tasks));
        }
        let mut sessions = self.sessions.write().await;
        let tasks = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(SessionTasks::new(session_id)));
        Ok(Arc::clone(tasks))
    }

    async fn existing(&self, session_id: &str) -> Result<Option<Arc<SessionTasks>>, DownloadError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn session_ids(&self) -> Result<Vec<String>, DownloadError> {
        Ok(self.sessions.read().await.keys().cloned().collect())
    }
}
