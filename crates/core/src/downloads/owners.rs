//! Which session holds each engine transfer.
//!
//! The engine keys transfers by info hash alone, so two sessions asking
//! for the same torrent would otherwise share one transfer writing into
//! the first session's directory. A transfer belongs to exactly one
//! session from the moment it is claimed until it leaves the engine.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Shared info hash -> session id registry.
#[derive(Debug, Clone, Default)]
pub struct TransferOwners {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl TransferOwners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `info_hash` for `session_id`. Returns false if another session
    /// holds it; claiming a hash the session already holds succeeds.
    pub async fn claim(&self, info_hash: &str, session_id: &str) -> bool {
        let mut owners = self.inner.lock().await;
        match owners.get(info_hash) {
            Some(owner) => owner == session_id,
            None => {
                owners.insert(info_hash.to_string(), session_id.to_string());
                true
            }
        }
    }

    pub async fn owner(&self, info_hash: &str) -> Option<String> {
        self.inner.lock().await.get(info_hash).cloned()
    }

    /// Drop the claim only if `session_id` holds it. Returns whether it did.
    pub async fn release_if_owner(&self, info_hash: &str, session_id: &str) -> bool {
        let mut owners = self.inner.lock().await;
        if owners.get(info_hash).map(String::as_str) == Some(session_id) {
            owners.remove(info_hash);
            true
        } else {
            false
        }
    }

    /// Drop the claim whoever holds it.
    pub async fn release(&self, info_hash: &str) {
        self.inner.lock().await.remove(info_hash);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
