//! Mock torrent engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::engine::{
    AddOptions, EngineError, TorrentEngine, TransferEvent, TransferFile, TransferHandle,
    TransferStats,
};
use crate::searcher::info_hash_from_magnet;

/// A recorded `add` call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAdd {
    pub magnet: String,
    pub options: AddOptions,
}

/// Mock implementation of the TorrentEngine trait.
///
/// Provides controllable behavior for testing:
/// - Script the file list each magnet resolves to
/// - Push progress, completion and failure events into live transfers
/// - Track adds and removals for assertions
/// - Simulate failures and slow metadata resolution
///
/// # Example
///
/// ```rust,ignore
/// let engine = Arc::new(MockTorrentEngine::new());
/// let magnet = fixtures::magnet('a');
///
/// // ... start a download through the orchestrator ...
///
/// let hash = "a".repeat(40);
/// engine.emit_progress(&hash, 0.5).await;
/// engine.emit(&hash, TransferEvent::Done).await;
///
/// assert_eq!(engine.added().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockTorrentEngine {
    /// Live transfers, in insertion order.
    transfers: Arc<RwLock<Vec<TransferStats>>>,
    /// Event senders of transfers started through `add`.
    senders: Arc<RwLock<HashMap<String, mpsc::Sender<TransferEvent>>>>,
    /// Scripted file lists by magnet.
    files: Arc<RwLock<HashMap<String, Vec<TransferFile>>>>,
    added: Arc<RwLock<Vec<RecordedAdd>>>,
    removals: Arc<RwLock<Vec<(String, bool)>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<EngineError>>>,
    add_delay: Arc<RwLock<Option<Duration>>>,
    stopped: Arc<RwLock<bool>>,
}

impl Default for MockTorrentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentEngine {
    pub fn new() -> Self {
        Self {
            transfers: Arc::new(RwLock::new(Vec::new())),
            senders: Arc::new(RwLock::new(HashMap::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            removals: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            add_delay: Arc::new(RwLock::new(None)),
            stopped: Arc::new(RwLock::new(false)),
        }
    }

    /// Files `magnet` resolves to. Unscripted magnets resolve to a single `.mkv`.
    pub async fn set_files(&self, magnet: &str, files: Vec<TransferFile>) {
        self.files.write().await.insert(magnet.to_string(), files);
    }

    /// Delay metadata resolution of every `add`.
    pub async fn set_add_delay(&self, delay: Duration) {
        *self.add_delay.write().await = Some(delay);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: EngineError) {
        *self.next_error.write().await = Some(error);
    }

    /// Pre-populate a transfer that has no event channel.
    pub async fn insert_transfer(&self, stats: TransferStats) {
        let mut transfers = self.transfers.write().await;
        transfers.retain(|t| t.info_hash != stats.info_hash);
        transfers.push(stats);
    }

    /// Change the counters reported by `stats` and `list` without emitting
    /// an event.
    pub async fn set_progress(&self, info_hash: &str, progress: f64) {
        if let Some(t) = self
            .transfers
            .write()
            .await
            .iter_mut()
            .find(|t| t.info_hash == info_hash)
        {
            t.progress = progress;
            t.finished = progress >= 1.0;
        }
    }

    /// Push an event into a transfer's channel.
    ///
    /// `Progress` also updates the stored counters. `Done` and `Error` close
    /// the channel afterwards. Returns false if nobody is listening.
    pub async fn emit(&self, info_hash: &str, event: TransferEvent) -> bool {
        match &event {
            TransferEvent::Progress(stats) => {
                let mut stats = stats.clone();
                stats.info_hash = info_hash.to_string();
                self.insert_transfer(stats).await;
            }
            TransferEvent::Done => self.set_progress(info_hash, 1.0).await,
            TransferEvent::Error(_) => {}
        }

        let closes = !matches!(event, TransferEvent::Progress(_));
        let sender = if closes {
            self.senders.write().await.remove(info_hash)
        } else {
            self.senders.read().await.get(info_hash).cloned()
        };
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Emit a `Progress` event carrying `progress` and the stored counters.
    pub async fn emit_progress(&self, info_hash: &str, progress: f64) -> bool {
        let mut stats = self
            .find(info_hash)
            .await
            .unwrap_or_else(|| TransferStats {
                info_hash: info_hash.to_string(),
                ..Default::default()
            });
        stats.progress = progress;
        stats.finished = progress >= 1.0;
        self.emit(info_hash, TransferEvent::Progress(stats)).await
    }

    /// Drop a transfer's event channel without a final event.
    pub async fn close_events(&self, info_hash: &str) {
        self.senders.write().await.remove(info_hash);
    }

    /// Every recorded `add` call.
    pub async fn added(&self) -> Vec<RecordedAdd> {
        self.added.read().await.clone()
    }

    /// Every recorded `remove` call as `(info_hash, delete_files)`.
    pub async fn recorded_removals(&self) -> Vec<(String, bool)> {
        self.removals.read().await.clone()
    }

    pub async fn has_transfer(&self, info_hash: &str) -> bool {
        self.find(info_hash).await.is_some()
    }

    pub async fn is_stopped(&self) -> bool {
        *self.stopped.read().await
    }

    async fn find(&self, info_hash: &str) -> Option<TransferStats> {
        self.transfers
            .read()
            .await
            .iter()
            .find(|t| t.info_hash == info_hash)
            .cloned()
    }

    async fn take_error(&self) -> Option<EngineError> {
        self.next_error.write().await.take()
    }

    /// Display name from the magnet's `dn` parameter.
    fn display_name(magnet: &str) -> Option<String> {
        magnet.split(['?', '&']).find_map(|part| {
            let name = part.strip_prefix("dn=")?;
            urlencoding::decode(name).ok().map(|n| n.replace('+', " "))
        })
    }
}

#[async_trait]
impl TorrentEngine for MockTorrentEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add(&self, magnet: &str, options: AddOptions) -> Result<TransferHandle, EngineError> {
        self.added.write().await.push(RecordedAdd {
            magnet: magnet.to_string(),
            options: options.clone(),
        });

        let delay = *self.add_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.take_error().await {
            return Err(error);
        }

        let info_hash = info_hash_from_magnet(magnet)
            .ok_or_else(|| EngineError::Add(format!("Invalid magnet link: {magnet}")))?;
        if self.find(&info_hash).await.is_some() {
            return Err(EngineError::AlreadyManaged(info_hash));
        }
        let name = Self::display_name(magnet).unwrap_or_else(|| info_hash.clone());
        let files = match self.files.read().await.get(magnet) {
            Some(files) => files.clone(),
            None => vec![TransferFile {
                index: 0,
                path: PathBuf::from(&name).join(format!("{name}.mkv")),
                length: 1024 * 1024 * 700,
            }],
        };

        let (tx, rx) = mpsc::channel(64);
        self.senders.write().await.insert(info_hash.clone(), tx);
        self.insert_transfer(TransferStats {
            info_hash: info_hash.clone(),
            name: name.clone(),
            ..Default::default()
        })
        .await;

        Ok(TransferHandle {
            info_hash,
            name,
            files,
            events: rx,
        })
    }

    async fn stats(&self, info_hash: &str) -> Result<TransferStats, EngineError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        self.find(info_hash)
            .await
            .ok_or_else(|| EngineError::TransferNotFound(info_hash.to_string()))
    }

    async fn list(&self) -> Result<Vec<TransferStats>, EngineError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        Ok(self.transfers.read().await.clone())
    }

    async fn remove(&self, info_hash: &str, delete_files: bool) -> Result<(), EngineError> {
        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        self.removals
            .write()
            .await
            .push((info_hash.to_string(), delete_files));
        self.senders.write().await.remove(info_hash);

        let mut transfers = self.transfers.write().await;
        let before = transfers.len();
        transfers.retain(|t| t.info_hash != info_hash);
        if transfers.len() == before {
            return Err(EngineError::TransferNotFound(info_hash.to_string()));
        }
        Ok(())
    }

    async fn stop(&self) {
        *self.stopped.write().await = true;
        self.senders.write().await.clear();
    }
}
