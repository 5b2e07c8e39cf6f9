//! Testing utilities and mock implementations.
//!
//! Mocks for the two external seams, torrent indexes and the torrent
//! engine, so search and download flows can be exercised without network
//! access.
//!
//! # Example
//!
//! ```rust,ignore
//! use seedscout_core::testing::{fixtures, MockProvider, MockTorrentEngine};
//!
//! let provider = Arc::new(MockProvider::new("yts"));
//! provider.set_results(vec![fixtures::candidate("Movie.1080p", "yts", &fixtures::magnet('a'), 10)]).await;
//!
//! let engine = Arc::new(MockTorrentEngine::new());
//! engine.emit_progress(&"a".repeat(40), 0.5).await;
//! ```

mod mock_engine;
mod mock_provider;

pub use mock_engine::{MockTorrentEngine, RecordedAdd};
pub use mock_provider::MockProvider;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::engine::{TransferFile, TransferStats};
    use crate::searcher::TorrentCandidate;

    /// Magnet whose info hash is `c` repeated 40 times.
    pub fn magnet(c: char) -> String {
        format!("magnet:?xt=urn:btih:{}", c.to_string().repeat(40))
    }

    /// Create a provider listing with reasonable defaults.
    pub fn candidate(title: &str, provider: &str, magnet_uri: &str, seeds: u32) -> TorrentCandidate {
        TorrentCandidate {
            title: title.to_string(),
            magnet_uri: magnet_uri.to_string(),
            size_bytes: 1024 * 1024 * 1024, // 1 GiB
            seeds,
            peers: seeds / 4,
            provider: provider.to_string(),
        }
    }

    /// Counters for a transfer at `progress`.
    pub fn transfer_stats(info_hash: &str, progress: f64) -> TransferStats {
        TransferStats {
            info_hash: info_hash.to_string(),
            name: format!("transfer-{}", info_hash.chars().take(8).collect::<String>()),
            progress,
            download_speed: if progress < 1.0 { 512 * 1024 } else { 0 },
            upload_speed: 0,
            peers: 5,
            finished: progress >= 1.0,
        }
    }

    pub fn transfer_file(index: usize, path: &str, length: u64) -> TransferFile {
        TransferFile {
            index,
            path: PathBuf::from(path),
            length,
        }
    }
}
