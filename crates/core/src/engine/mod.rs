//! Torrent engine abstraction.
//!
//! The engine is a single process-wide service shared by every download
//! session. `add` resolves a magnet into a [`TransferHandle`] whose event
//! channel carries progress, completion and failure notifications.

mod librqbit;
mod types;

pub use librqbit::LibrqbitEngine;
pub use types::*;
