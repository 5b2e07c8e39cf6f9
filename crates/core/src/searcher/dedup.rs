//! Deduplication of normalized search results by identity key.

use std::collections::HashSet;

use super::NormalizedResult;

/// Deduplicate results by info hash (or magnet URI when no hash is known).
///
/// The first occurrence of each identity key is kept and the input order
/// is otherwise preserved, so provider registration order decides which
/// listing survives.
pub fn deduplicate_results(results: Vec<NormalizedResult>) -> Vec<NormalizedResult> {
    let mut seen: HashSet<String> = HashSet::with_capacity(results.len());
    results
        .into_iter()
        .filter(|r| seen.insert(r.identity_key()))
        .collect()
}
