//! Session-isolated downloads.
//!
//! Each session owns a task list (see [`SessionTasks`]) and a directory
//! under the configured root. The [`DownloadOrchestrator`] runs one
//! background watcher per task against the shared torrent engine, and
//! [`TransferOwners`] keeps each engine transfer bound to one session. The
//! [`CleanupReaper`] releases finished transfers on its own schedule.

mod media;
mod orchestrator;
mod owners;
mod reaper;
mod session;
mod types;

pub use media::select_playable_file;
pub use orchestrator::DownloadOrchestrator;
pub use owners::TransferOwners;
pub use reaper::CleanupReaper;
pub use session::{AppendOutcome, InMemorySessionStore, SessionStore, SessionTasks};
pub use types::*;
