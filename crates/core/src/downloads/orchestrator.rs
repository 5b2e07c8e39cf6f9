//! Download orchestration.
//!
//! `start_download` records an `initiated` task and returns at once. A
//! background watcher per task then drives it through the engine:
//! - add the magnet into the session's own directory
//! - claim the transfer for the session, so no other session shares it
//! - pick the first playable file
//! - merge engine events and a fixed-interval stats sample into the task
//! - finish as `completed` or `error`

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::DownloadsConfig;
use crate::engine::{AddOptions, EngineError, TorrentEngine, TransferEvent};
use crate::metrics;
use crate::searcher::info_hash_from_magnet;

use super::media::select_playable_file;
use super::owners::TransferOwners;
use super::session::{AppendOutcome, SessionStore, SessionTasks};
use super::types::{DownloadError, DownloadTask, StartDownload, TaskFailure, TaskUpdate};

type WatchKey = (String, String);

/// Starts, tracks and cancels session-scoped downloads.
pub struct DownloadOrchestrator {
    engine: Arc<dyn TorrentEngine>,
    store: Arc<dyn SessionStore>,
    config: DownloadsConfig,
    owners: TransferOwners,
    watchers: Mutex<HashMap<WatchKey, JoinHandle<()>>>,
}

/// Everything a watcher needs, detached from the orchestrator.
struct TransferJob {
    engine: Arc<dyn TorrentEngine>,
    session: Arc<SessionTasks>,
    owners: TransferOwners,
    magnet: String,
    output_dir: PathBuf,
    sample_interval: Duration,
    add_timeout: Duration,
    extensions: Vec<String>,
}

impl DownloadOrchestrator {
    pub fn new(
        engine: Arc<dyn TorrentEngine>,
        store: Arc<dyn SessionStore>,
        config: DownloadsConfig,
    ) -> Self {
        Self {
            engine,
            store,
            config,
            owners: TransferOwners::new(),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Registry of which session holds each engine transfer.
    pub fn owners(&self) -> &TransferOwners {
        &self.owners
    }

    /// Directory that holds every file of `session_id`.
    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf, DownloadError> {
        validate_session_id(session_id)?;
        Ok(self.config.root_dir.join(session_id))
    }

    /// Begin a download and return the `initiated` task.
    ///
    /// A magnet already tracked in the session returns the existing task
    /// without starting a second transfer.
    pub async fn start_download(
        &self,
        session_id: &str,
        request: StartDownload,
    ) -> Result<DownloadTask, DownloadError> {
        let magnet = request.magnet.trim().to_string();
        if !magnet.starts_with("magnet:?") {
            return Err(DownloadError::InvalidMagnet(magnet));
        }

        let output_dir = self.session_dir(session_id)?;
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| DownloadError::Directory {
                path: output_dir.clone(),
                source,
            })?;

        let session = self.store.session(session_id).await?;

        let mut task = DownloadTask::new(session_id, magnet.clone());
        task.title = request.title;
        task.quality = request.quality;

        let task = match session.append(task).await {
            AppendOutcome::Existing(existing) => {
                debug!(session_id = %session_id, magnet = %magnet, "Download already tracked");
                return Ok(existing);
            }
            AppendOutcome::Added(task) => task,
        };

        metrics::DOWNLOADS_STARTED.inc();
        info!(session_id = %session_id, task_id = %task.id, "Download initiated");

        let job = TransferJob {
            engine: Arc::clone(&self.engine),
            session,
            owners: self.owners.clone(),
            magnet: magnet.clone(),
            output_dir,
            sample_interval: Duration::from_millis(self.config.sample_interval_ms),
            add_timeout: Duration::from_secs(self.config.add_timeout_secs),
            extensions: self.config.playable_extensions.clone(),
        };
        let handle = tokio::spawn(job.run());

        let mut watchers = self.watchers.lock().await;
        watchers.retain(|_, h| !h.is_finished());
        watchers.insert((session_id.to_string(), magnet), handle);

        Ok(task)
    }

    /// Every task of a session, in start order. Unknown sessions have none.
    pub async fn list_downloads(&self, session_id: &str) -> Result<Vec<DownloadTask>, DownloadError> {
        match self.store.existing(session_id).await? {
            Some(session) => Ok(session.list().await),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_download(
        &self,
        session_id: &str,
        magnet: &str,
    ) -> Result<Option<DownloadTask>, DownloadError> {
        match self.store.existing(session_id).await? {
            Some(session) => Ok(session.get(magnet.trim()).await),
            None => Ok(None),
        }
    }

    /// Stop a download and release its transfer.
    ///
    /// A task that already finished keeps its terminal state. The engine
    /// transfer is only removed when this session holds it.
    pub async fn cancel_download(
        &self,
        session_id: &str,
        magnet: &str,
    ) -> Result<DownloadTask, DownloadError> {
        let magnet = magnet.trim();
        let not_found = || DownloadError::NotFound {
            session_id: session_id.to_string(),
            magnet: magnet.to_string(),
        };

        let session = self.store.existing(session_id).await?.ok_or_else(not_found)?;
        if session.get(magnet).await.is_none() {
            return Err(not_found());
        }

        if let Some(handle) = self
            .watchers
            .lock()
            .await
            .remove(&(session_id.to_string(), magnet.to_string()))
        {
            handle.abort();
        }

        let task = session
            .apply(magnet, TaskUpdate::failed(&TaskFailure::Cancelled))
            .await
            .ok_or_else(not_found)?;

        let info_hash = task
            .info_hash
            .clone()
            .or_else(|| info_hash_from_magnet(magnet));
        if let Some(info_hash) = info_hash {
            if self.owners.release_if_owner(&info_hash, session_id).await {
                match self.engine.remove(&info_hash, false).await {
                    Ok(()) | Err(EngineError::TransferNotFound(_)) => {}
                    Err(e) => {
                        warn!(info_hash = %info_hash, error = %e, "Failed to release cancelled transfer");
                    }
                }
            }
        }

        info!(session_id = %session_id, task_id = %task.id, status = task.status.as_str(), "Download cancelled");
        Ok(task)
    }

    /// Number of downloads whose watcher is still running.
    pub async fn active_count(&self) -> usize {
        let mut watchers = self.watchers.lock().await;
        watchers.retain(|_, h| !h.is_finished());
        watchers.len()
    }

    /// Abort every watcher. Engine transfers are left to the engine's own
    /// shutdown.
    pub async fn shutdown(&self) {
        let mut watchers = self.watchers.lock().await;
        let count = watchers.len();
        for (_, handle) in watchers.drain() {
            handle.abort();
        }
        if count > 0 {
            info!(count, "Aborted download watchers");
        }
    }
}

/// Session ids become directory names; reject anything that could
/// escape `root_dir` or alias another session.
fn validate_session_id(session_id: &str) -> Result<(), DownloadError> {
    let invalid = || DownloadError::InvalidSession(session_id.to_string());
    if session_id.trim().is_empty() || session_id.contains(['/', '\\']) || session_id.contains("..")
    {
        return Err(invalid());
    }
    let mut components = Path::new(session_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

impl TransferJob {
    async fn run(self) {
        let started = Instant::now();
        match self.drive().await {
            Ok(()) => {
                metrics::DOWNLOADS_COMPLETED.inc();
                metrics::DOWNLOAD_DURATION
                    .with_label_values(&["success"])
                    .observe(started.elapsed().as_secs_f64());
                info!(session_id = %self.session.session_id(), magnet = %self.magnet, "Download completed");
            }
            Err(failure) => {
                metrics::DOWNLOADS_FAILED.inc();
                metrics::DOWNLOAD_DURATION
                    .with_label_values(&["failed"])
                    .observe(started.elapsed().as_secs_f64());
                warn!(
                    session_id = %self.session.session_id(),
                    magnet = %self.magnet,
                    error = %failure,
                    "Download failed"
                );
                self.session
                    .apply(&self.magnet, TaskUpdate::failed(&failure))
                    .await;
            }
        }
    }

    async fn drive(&self) -> Result<(), TaskFailure> {
        let session_id = self.session.session_id();

        // Claim up front when the magnet names its hash, so a concurrent
        // start in another session never reaches the engine.
        let claimed = info_hash_from_magnet(&self.magnet);
        if let Some(ref hash) = claimed {
            if !self.owners.claim(hash, session_id).await {
                return Err(TaskFailure::TransferInUse);
            }
        }

        let add = self.engine.add(
            &self.magnet,
            AddOptions {
                output_dir: self.output_dir.clone(),
            },
        );
        let added = match tokio::time::timeout(self.add_timeout, add).await {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(EngineError::AlreadyManaged(_))) => Err(TaskFailure::TransferInUse),
            Ok(Err(e)) => Err(TaskFailure::EngineAdd(e.to_string())),
            Err(_) => Err(TaskFailure::EngineAdd(
                EngineError::AddTimeout(self.add_timeout.as_secs()).to_string(),
            )),
        };
        let handle = match added {
            Ok(handle) => handle,
            Err(failure) => {
                if let Some(ref hash) = claimed {
                    self.owners.release_if_owner(hash, session_id).await;
                }
                return Err(failure);
            }
        };

        let info_hash = handle.info_hash.clone();
        if claimed.as_deref() != Some(info_hash.as_str()) {
            if let Some(ref hash) = claimed {
                self.owners.release_if_owner(hash, session_id).await;
            }
            if !self.owners.claim(&info_hash, session_id).await {
                return Err(TaskFailure::TransferInUse);
            }
        }
        self.session
            .apply(&self.magnet, TaskUpdate::resolved(info_hash.clone()))
            .await;

        let Some(file) = select_playable_file(&handle.files, &self.extensions) else {
            if let Err(e) = self.engine.remove(&info_hash, true).await {
                warn!(info_hash = %info_hash, error = %e, "Failed to release transfer without media");
            }
            self.owners.release_if_owner(&info_hash, session_id).await;
            return Err(TaskFailure::NoPlayableFile);
        };

        debug!(info_hash = %info_hash, file = %file.path.display(), "Selected playable file");
        self.session
            .apply(
                &self.magnet,
                TaskUpdate::downloading(self.output_dir.join(&file.path), file.length),
            )
            .await;

        let mut events = handle.events;
        let mut sampler = tokio::time::interval(self.sample_interval);
        sampler.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the task was just updated.
        sampler.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(TransferEvent::Progress(stats)) => {
                        self.session.apply(&self.magnet, TaskUpdate::progress(&stats)).await;
                    }
                    Some(TransferEvent::Done) => {
                        self.session.apply(&self.magnet, TaskUpdate::completed()).await;
                        return Ok(());
                    }
                    Some(TransferEvent::Error(message)) => {
                        return Err(TaskFailure::Engine(message));
                    }
                    None => {
                        return Err(TaskFailure::Engine(
                            "transfer ended without completing".to_string(),
                        ));
                    }
                },
                _ = sampler.tick() => match self.engine.stats(&info_hash).await {
                    Ok(stats) => {
                        self.session.apply(&self.magnet, TaskUpdate::progress(&stats)).await;
                    }
                    Err(e) => debug!(info_hash = %info_hash, error = %e, "Progress sample failed"),
                },
            }
        }
    }
}
