//! Types for the torrent engine abstraction.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during torrent engine operations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Engine initialization failed: {0}")]
    Init(String),

    #[error("{0}")]
    Add(String),

    #[error("Transfer {0} is already managed by the engine")]
    AlreadyManaged(String),

    #[error("Timed out after {0}s waiting for torrent metadata")]
    AddTimeout(u64),

    #[error("Transfer not found: {0}")]
    TransferNotFound(String),

    #[error("Failed to remove transfer: {0}")]
    Remove(String),

    #[error("Engine error: {0}")]
    Internal(String),
}

/// Options for adding a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Directory the transfer's files are written into.
    pub output_dir: PathBuf,
}

/// One file inside a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFile {
    /// Index of the file in the torrent.
    pub index: usize,
    /// Path relative to the output directory.
    pub path: PathBuf,
    /// File length in bytes.
    pub length: u64,
}

/// Point-in-time counters for one transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferStats {
    /// Info hash (lowercase hex).
    pub info_hash: String,
    pub name: String,
    /// Completion ratio (0.0 - 1.0).
    pub progress: f64,
    /// Download speed in bytes/sec.
    pub download_speed: u64,
    /// Upload speed in bytes/sec.
    pub upload_speed: u64,
    /// Connected peers.
    pub peers: u32,
    /// All wanted pieces are on disk.
    pub finished: bool,
}

/// Notification pushed by the engine for one transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// New counters are available.
    Progress(TransferStats),
    /// The transfer finished.
    Done,
    /// The transfer failed and will not make further progress.
    Error(String),
}

/// A transfer the engine accepted, with its resolved metadata.
///
/// `events` is closed by the engine after `Done` or `Error`.
#[derive(Debug)]
pub struct TransferHandle {
    pub info_hash: String,
    pub name: String,
    pub files: Vec<TransferFile>,
    pub events: mpsc::Receiver<TransferEvent>,
}

/// A process-wide torrent engine shared by every session.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Add a magnet and resolve its metadata.
    ///
    /// Returns once the file list is known. Progress, completion and
    /// failure are then delivered through the handle's event channel.
    async fn add(&self, magnet: &str, options: AddOptions) -> Result<TransferHandle, EngineError>;

    /// Current counters for one transfer.
    async fn stats(&self, info_hash: &str) -> Result<TransferStats, EngineError>;

    /// Counters for every transfer the engine holds.
    async fn list(&self) -> Result<Vec<TransferStats>, EngineError>;

    /// Release a transfer, optionally deleting its files.
    async fn remove(&self, info_hash: &str, delete_files: bool) -> Result<(), EngineError>;

    /// Stop every transfer and release engine resources.
    async fn stop(&self);
}
