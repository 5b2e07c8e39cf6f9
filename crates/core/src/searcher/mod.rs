//! Torrent discovery.
//!
//! A search flows through the [`ResultCache`] first; on a miss the
//! [`FallbackSearcher`] drives the [`FanOutSearcher`] over every registered
//! [`TorrentProvider`] once per query reformulation. Raw candidates are
//! classified (see [`classify`]) and deduplicated before they are returned
//! or cached.

mod cache;
mod classifier;
mod coordinator;
mod dedup;
mod fallback;
pub mod providers;
mod service;
mod types;

pub use cache::ResultCache;
pub use classifier::{classify, normalize, Classification, RuleTable, DEFAULT_LANGUAGE};
pub use coordinator::{DegradedProvider, FanOutResult, FanOutSearcher};
pub use dedup::deduplicate_results;
pub use fallback::{reformulate, FallbackOutcome, FallbackSearcher, NoResultsError, FALLBACK_STEPS};
pub use service::{select_best, SearchError, SearchResponse, SearchService};
pub use types::*;
