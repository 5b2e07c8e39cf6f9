//! Download task records and their state machine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::TransferStats;

/// Lifecycle of a download task.
///
/// `Initiated -> Downloading -> Completed | Error`. A task may also fail
/// straight from `Initiated` (engine rejected the magnet, no playable file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Initiated,
    Downloading,
    Completed,
    Error,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Initiated => "initiated",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Error => "error",
        }
    }

    /// Completed and errored tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Error)
    }

    fn can_become(&self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Initiated, Downloading | Error) => true,
            (Downloading, Completed | Error) => true,
            _ => false,
        }
    }
}

/// A task-scoped failure. Its message becomes the task's `error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("failed to add torrent: {0}")]
    EngineAdd(String),

    #[error("no playable video file found")]
    NoPlayableFile,

    #[error("{0}")]
    Engine(String),

    #[error("download cancelled")]
    Cancelled,

    #[error("torrent is already being downloaded by another session")]
    TransferInUse,
}

/// Errors returned to the caller of the download orchestrator.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Failed to create session directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid session id: {0:?}")]
    InvalidSession(String),

    #[error("Invalid magnet URI: {0}")]
    InvalidMagnet(String),

    #[error("No download for {magnet} in session {session_id}")]
    NotFound { session_id: String, magnet: String },

    #[error("Session store error: {0}")]
    Store(String),
}

/// One download inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: Uuid,
    pub session_id: String,
    pub magnet: String,
    /// Assigned once the engine resolves the magnet.
    pub info_hash: Option<String>,
    pub status: DownloadStatus,
    /// Percent complete (0-100). Never decreases.
    pub progress: u8,
    /// Bytes per second.
    pub download_speed: u64,
    pub peer_count: u32,
    /// Selected media file, once metadata is known.
    pub file_path: Option<PathBuf>,
    pub file_name: Option<String>,
    pub size_bytes: Option<u64>,
    pub title: Option<String>,
    pub quality: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only when `status` is `Error`.
    pub error: Option<String>,
}

impl DownloadTask {
    pub fn new(session_id: impl Into<String>, magnet: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            magnet: magnet.into(),
            info_hash: None,
            status: DownloadStatus::Initiated,
            progress: 0,
            download_speed: 0,
            peer_count: 0,
            file_path: None,
            file_name: None,
            size_bytes: None,
            title: None,
            quality: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Apply an update, honouring the task invariants:
    /// terminal tasks are frozen, status only moves forward, progress
    /// never decreases. Returns whether anything changed.
    pub fn apply(&mut self, update: TaskUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let before = self.clone();

        if let Some(hash) = update.info_hash {
            self.info_hash = Some(hash);
        }
        if let Some(path) = update.file_path {
            self.file_path = Some(path);
        }
        if let Some(name) = update.file_name {
            self.file_name = Some(name);
        }
        if let Some(size) = update.size_bytes {
            self.size_bytes = Some(size);
        }
        if let Some(speed) = update.download_speed {
            self.download_speed = speed;
        }
        if let Some(peers) = update.peer_count {
            self.peer_count = peers;
        }
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }

        if let Some(next) = update.status {
            if self.status.can_become(next) {
                self.status = next;
                match next {
                    DownloadStatus::Completed => {
                        self.progress = 100;
                        self.download_speed = 0;
                        self.completed_at = Some(Utc::now());
                    }
                    DownloadStatus::Error => {
                        self.download_speed = 0;
                        self.error = Some(
                            update
                                .error
                                .unwrap_or_else(|| "download failed".to_string()),
                        );
                    }
                    _ => {}
                }
            }
        }

        *self != before
    }
}

/// A partial change to a [`DownloadTask`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<DownloadStatus>,
    pub progress: Option<u8>,
    pub download_speed: Option<u64>,
    pub peer_count: Option<u32>,
    pub info_hash: Option<String>,
    pub file_path: Option<PathBuf>,
    pub file_name: Option<String>,
    pub size_bytes: Option<u64>,
    pub error: Option<String>,
}

impl TaskUpdate {
    /// The engine resolved the magnet.
    pub fn resolved(info_hash: impl Into<String>) -> Self {
        Self {
            info_hash: Some(info_hash.into()),
            ..Default::default()
        }
    }

    /// A playable file was selected and the transfer is running.
    pub fn downloading(file_path: PathBuf, size_bytes: u64) -> Self {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            status: Some(DownloadStatus::Downloading),
            file_path: Some(file_path),
            file_name,
            size_bytes: Some(size_bytes),
            ..Default::default()
        }
    }

    /// New counters from the engine.
    pub fn progress(stats: &TransferStats) -> Self {
        Self {
            progress: Some(progress_percent(stats.progress)),
            download_speed: Some(stats.download_speed),
            peer_count: Some(stats.peers),
            ..Default::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(DownloadStatus::Completed),
            progress: Some(100),
            ..Default::default()
        }
    }

    pub fn failed(failure: &TaskFailure) -> Self {
        Self {
            status: Some(DownloadStatus::Error),
            error: Some(failure.to_string()),
            ..Default::default()
        }
    }
}

/// Engine ratio (0.0 - 1.0) to a whole percent, rounded down.
pub fn progress_percent(ratio: f64) -> u8 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0;
    }
    (ratio * 100.0).floor().min(100.0) as u8
}

/// Fields accepted by `start_download`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDownload {
    pub magnet: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

impl StartDownload {
    pub fn new(magnet: impl Into<String>) -> Self {
        Self {
            magnet: magnet.into(),
            ..Default::default()
        }
    }
}
