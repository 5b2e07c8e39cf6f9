//! Periodic release of finished transfers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::TorrentEngine;
use crate::metrics;

use super::owners::TransferOwners;

/// Frees engine resources held by transfers that reached 100%, whichever
/// session started them, and drops the session's claim on them. Files
/// stay on disk.
pub struct CleanupReaper {
    engine: Arc<dyn TorrentEngine>,
    owners: TransferOwners,
}

impl CleanupReaper {
    pub fn new(engine: Arc<dyn TorrentEngine>, owners: TransferOwners) -> Self {
        Self { engine, owners }
    }

    /// Run one sweep. Returns how many transfers were released; failures
    /// are logged and skipped.
    pub async fn sweep_once(&self) -> usize {
        let transfers = match self.engine.list().await {
            Ok(transfers) => transfers,
            Err(e) => {
                warn!(engine = %self.engine.name(), error = %e, "Cleanup sweep could not list transfers");
                return 0;
            }
        };

        let mut released = 0;
        for transfer in transfers.iter().filter(|t| t.progress >= 1.0) {
            match self.engine.remove(&transfer.info_hash, false).await {
                Ok(()) => {
                    self.owners.release(&transfer.info_hash).await;
                    released += 1;
                    debug!(info_hash = %transfer.info_hash, name = %transfer.name, "Released finished transfer");
                }
                Err(e) => {
                    warn!(info_hash = %transfer.info_hash, error = %e, "Failed to release finished transfer");
                }
            }
        }

        if released > 0 {
            metrics::REAPER_RELEASED.inc_by(released as u64);
            info!(released, "Cleanup sweep released finished transfers");
        }
        released
    }

    /// Sweep every `interval` until `shutdown` fires. The first sweep runs
    /// one full interval after spawning.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Cleanup reaper started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("Cleanup reaper received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        self.sweep_once().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::testing::{fixtures, MockTorrentEngine};

    #[tokio::test]
    async fn test_sweep_releases_only_finished_transfers() {
        let engine = Arc::new(MockTorrentEngine::new());
        engine.insert_transfer(fixtures::transfer_stats(&"a".repeat(40), 1.0)).await;
        engine.insert_transfer(fixtures::transfer_stats(&"b".repeat(40), 0.4)).await;
        engine.insert_transfer(fixtures::transfer_stats(&"c".repeat(40), 1.0)).await;

        let reaper = CleanupReaper::new(engine.clone(), TransferOwners::new());
        assert_eq!(reaper.sweep_once().await, 2);

        let remaining = engine.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].info_hash, "b".repeat(40));

        let removed = engine.recorded_removals().await;
        assert!(removed.iter().all(|(_, delete_files)| !delete_files));
    }

    #[tokio::test]
    async fn test_sweep_drops_claims_of_released_transfers() {
        let engine = Arc::new(MockTorrentEngine::new());
        let done = "e".repeat(40);
        let running = "f".repeat(40);
        engine.insert_transfer(fixtures::transfer_stats(&done, 1.0)).await;
        engine.insert_transfer(fixtures::transfer_stats(&running, 0.5)).await;

        let owners = TransferOwners::new();
        owners.claim(&done, "alice").await;
        owners.claim(&running, "bob").await;

        let reaper = CleanupReaper::new(engine.clone(), owners.clone());
        assert_eq!(reaper.sweep_once().await, 1);
        assert!(owners.owner(&done).await.is_none());
        assert_eq!(owners.owner(&running).await.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_sweep_survives_list_failure() {
        let engine = Arc::new(MockTorrentEngine::new());
        engine
            .set_next_error(EngineError::Internal("session poisoned".to_string()))
            .await;
        let reaper = CleanupReaper::new(engine.clone(), TransferOwners::new());
        assert_eq!(reaper.sweep_once().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_reaper_runs_on_schedule_and_stops() {
        let engine = Arc::new(MockTorrentEngine::new());
        engine.insert_transfer(fixtures::transfer_stats(&"d".repeat(40), 1.0)).await;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let reaper = Arc::new(CleanupReaper::new(engine.clone(), TransferOwners::new()));
        let handle = reaper.spawn(Duration::from_secs(3600), shutdown_rx);

        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert_eq!(engine.list().await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(1801)).await;
        assert!(engine.list().await.unwrap().is_empty());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
