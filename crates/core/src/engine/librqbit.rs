//! Embedded librqbit torrent engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session, SessionOptions,
    SessionPersistenceConfig,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;

use super::{
    AddOptions, EngineError, TorrentEngine, TransferEvent, TransferFile, TransferHandle,
    TransferStats,
};

/// How often a transfer's watcher publishes counters.
const EVENT_INTERVAL: Duration = Duration::from_secs(1);
const EVENT_BUFFER: usize = 32;

/// Embedded librqbit session shared by every download session.
pub struct LibrqbitEngine {
    session: Arc<Session>,
}

impl LibrqbitEngine {
    /// Start a librqbit session. `default_dir` is used for transfers added
    /// without an explicit output directory.
    pub async fn new(config: &EngineConfig, default_dir: &Path) -> Result<Self, EngineError> {
        std::fs::create_dir_all(default_dir).map_err(|e| {
            EngineError::Init(format!("Failed to create download directory: {}", e))
        })?;

        let mut opts = SessionOptions::default();

        if !config.enable_dht {
            opts.disable_dht = true;
        }

        // Range, not RangeInclusive
        if let Some(port) = config.listen_port {
            opts.listen_port_range = Some(port..(port + 1));
        }

        if let Some(ref persistence_dir) = config.persistence_path {
            std::fs::create_dir_all(persistence_dir).map_err(|e| {
                EngineError::Init(format!("Failed to create persistence directory: {}", e))
            })?;
            opts.persistence = Some(SessionPersistenceConfig::Json {
                folder: Some(persistence_dir.clone()),
            });
        }

        info!(
            download_path = %default_dir.display(),
            dht_enabled = !opts.disable_dht,
            "Initializing librqbit session"
        );

        let session = Session::new_with_opts(default_dir.to_path_buf(), opts)
            .await
            .map_err(|e| {
                EngineError::Init(format!("Failed to initialize librqbit session: {}", describe(e)))
            })?;

        if let Some(port) = session.tcp_listen_port() {
            info!(port = port, "librqbit listening on TCP port");
        }

        Ok(Self { session })
    }

    fn format_hash(hash: &librqbit_core::Id20) -> String {
        hash.as_string()
    }

    fn find_transfer(&self, info_hash: &str) -> Option<Arc<ManagedTorrent>> {
        let wanted = info_hash.to_lowercase();
        self.session.with_torrents(|iter| {
            for (_, torrent) in iter {
                if Self::format_hash(&torrent.info_hash()) == wanted {
                    return Some(torrent.clone());
                }
            }
            None
        })
    }

    fn transfer_files(handle: &ManagedTorrent) -> Result<Vec<TransferFile>, EngineError> {
        handle
            .with_metadata(|metadata| {
                metadata
                    .file_infos
                    .iter()
                    .enumerate()
                    .map(|(index, file)| TransferFile {
                        index,
                        path: PathBuf::from(&file.relative_filename),
                        length: file.len,
                    })
                    .collect()
            })
            .map_err(|e| EngineError::Add(format!("torrent metadata unavailable: {}", describe(e))))
    }

    /// Forward counters and the terminal outcome of one transfer into `tx`
    /// until it finishes, fails, or nobody is listening any more.
    fn spawn_watcher(handle: Arc<ManagedTorrent>, tx: mpsc::Sender<TransferEvent>) {
        tokio::spawn(async move {
            let hash = Self::format_hash(&handle.info_hash());
            let completed = handle.wait_until_completed();
            tokio::pin!(completed);
            let mut ticker = tokio::time::interval(EVENT_INTERVAL);

            loop {
                tokio::select! {
                    outcome = &mut completed => {
                        let event = match outcome {
                            Ok(()) => {
                                let _ = tx.send(TransferEvent::Progress(stats_of(&handle))).await;
                                TransferEvent::Done
                            }
                            Err(e) => TransferEvent::Error(describe(e)),
                        };
                        let _ = tx.send(event).await;
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Some(error) = handle.stats().error {
                            let _ = tx.send(TransferEvent::Error(error)).await;
                            break;
                        }
                        if tx.send(TransferEvent::Progress(stats_of(&handle))).await.is_err() {
                            debug!(info_hash = %hash, "Transfer watcher detached");
                            break;
                        }
                    }
                }
            }
        });
    }
}

/// Flatten a librqbit error and its context chain into one message.
fn describe(e: impl Into<anyhow::Error>) -> String {
    format!("{:#}", e.into())
}

/// Convert librqbit stats into [`TransferStats`].
fn stats_of(torrent: &ManagedTorrent) -> TransferStats {
    let info_hash = LibrqbitEngine::format_hash(&torrent.info_hash());
    let stats = torrent.stats();

    let name = torrent
        .name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("torrent-{}", &info_hash[..8]));

    let progress = if stats.finished {
        1.0
    } else if stats.total_bytes > 0 {
        stats.progress_bytes as f64 / stats.total_bytes as f64
    } else {
        0.0
    };

    let (download_speed, upload_speed, peers) = stats
        .live
        .as_ref()
        .map(|live| {
            // librqbit's "mbps" is MiB/s
            (
                (live.download_speed.mbps * 1024.0 * 1024.0) as u64,
                (live.upload_speed.mbps * 1024.0 * 1024.0) as u64,
                live.snapshot.peer_stats.live as u32,
            )
        })
        .unwrap_or((0, 0, 0));

    TransferStats {
        info_hash,
        name,
        progress,
        download_speed,
        upload_speed,
        peers,
        finished: stats.finished,
    }
}

#[async_trait]
impl TorrentEngine for LibrqbitEngine {
    fn name(&self) -> &str {
        "librqbit"
    }

    async fn add(&self, magnet: &str, options: AddOptions) -> Result<TransferHandle, EngineError> {
        let opts = AddTorrentOptions {
            output_folder: Some(options.output_dir.to_string_lossy().into_owned()),
            overwrite: true,
            ..Default::default()
        };

        let response = self
            .session
            .add_torrent(AddTorrent::from_url(magnet), Some(opts))
            .await
            .map_err(|e| EngineError::Add(describe(e)))?;

        let handle = match response {
            AddTorrentResponse::Added(_, handle) => handle,
            AddTorrentResponse::AlreadyManaged(_, handle) => {
                // Its files live in whichever directory the first add chose.
                let info_hash = Self::format_hash(&handle.info_hash());
                warn!(info_hash = %info_hash, "Torrent already managed by engine");
                return Err(EngineError::AlreadyManaged(info_hash));
            }
            AddTorrentResponse::ListOnly(_) => {
                return Err(EngineError::Add(
                    "torrent was added in list-only mode".to_string(),
                ));
            }
        };

        let info_hash = Self::format_hash(&handle.info_hash());
        let files = Self::transfer_files(&handle)?;
        let name = handle
            .name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("torrent-{}", &info_hash[..8]));

        debug!(info_hash = %info_hash, name = %name, files = files.len(), "Torrent added");

        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        Self::spawn_watcher(handle, tx);

        Ok(TransferHandle {
            info_hash,
            name,
            files,
            events,
        })
    }

    async fn stats(&self, info_hash: &str) -> Result<TransferStats, EngineError> {
        let torrent = self
            .find_transfer(info_hash)
            .ok_or_else(|| EngineError::TransferNotFound(info_hash.to_string()))?;
        Ok(stats_of(&torrent))
    }

    async fn list(&self) -> Result<Vec<TransferStats>, EngineError> {
        let all: Vec<Arc<ManagedTorrent>> = self
            .session
            .with_torrents(|iter| iter.map(|(_, t)| t.clone()).collect());
        Ok(all.iter().map(|t| stats_of(t)).collect())
    }

    async fn remove(&self, info_hash: &str, delete_files: bool) -> Result<(), EngineError> {
        let torrent = self
            .find_transfer(info_hash)
            .ok_or_else(|| EngineError::TransferNotFound(info_hash.to_string()))?;

        self.session
            .delete(torrent.id().into(), delete_files)
            .await
            .map_err(|e| EngineError::Remove(describe(e)))?;

        debug!(info_hash = %info_hash, delete_files = delete_files, "Transfer removed");
        Ok(())
    }

    async fn stop(&self) {
        info!("Stopping librqbit session");
        self.session.stop().await;
    }
}
