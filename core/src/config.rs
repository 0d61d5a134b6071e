//! Indexing configuration.
//!
//! Defaults live here as constants; the `indexer` binary overrides them from CLI flags.
//! The effective configuration is recorded in `meta.json` when the index is finalized.

use serde::{Deserialize, Serialize};

/// Accepted documents held in memory before the partial index spills to disk.
pub const DEFAULT_SPILL_THRESHOLD: usize = 15_000;

/// Maximum Hamming distance at which two fingerprints count as near-duplicates.
pub const DEFAULT_HAMMING_DISTANCE: u32 = 2;

/// Shingle width, in characters, used for fingerprinting.
pub const SHINGLE_WIDTH: usize = 3;

/// Number of results the query engine returns by default.
pub const DEFAULT_RESULT_LIMIT: usize = 5;

/// A group of tags sharing the same weighting.
///
/// A stem found in one of these tags gets `weight = (weight + bonus) * multiplier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagGroup {
    pub tags: Vec<String>,
    pub bonus: f64,
    pub multiplier: f64,
}

impl TagGroup {
    pub fn new(tags: &[&str], bonus: f64, multiplier: f64) -> Self {
        Self { tags: tags.iter().map(|t| t.to_string()).collect(), bonus, multiplier }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub spill_threshold: usize,
    pub hamming_distance: u32,
    /// Upper bound on stored fingerprints. `None` means unbounded.
    pub fingerprint_budget: Option<usize>,
    /// Weighted tag groups in increasing order of importance.
    pub tag_groups: Vec<TagGroup>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            hamming_distance: DEFAULT_HAMMING_DISTANCE,
            fingerprint_budget: None,
            tag_groups: vec![
                TagGroup::new(&["a", "b", "strong", "h2", "h3", "h4", "h5", "h6"], 2.5, 1.5),
                TagGroup::new(&["title", "h1"], 5.0, 3.0),
            ],
        }
    }
}
