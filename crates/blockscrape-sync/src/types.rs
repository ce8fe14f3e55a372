//! Common types for blockscrape-sync

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One block record as returned by the remote API.
///
/// Only `height` and `n_tx` are interpreted by this crate; every other
/// field rides along in `extra` and is written back out verbatim. Two
/// records at the same height with different payloads are fork siblings
/// and compare unequal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub height: u64,
    #[serde(default)]
    pub n_tx: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockRecord {
    pub fn new(height: u64, n_tx: u64) -> Self {
        Self {
            height,
            n_tx,
            extra: Map::new(),
        }
    }
}

/// Deduplication policy applied when merging a window's results into
/// the accumulated set.
///
/// Resuming re-fetches the store's maximum height, so without
/// deduplication every restart appends that height's records again.
/// `DropKnown` makes the re-fetch idempotent; `AllowDuplicates`
/// preserves the raw append-everything behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    #[default]
    DropKnown,
    AllowDuplicates,
}

/// Configuration for the crawl process
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Window size and concurrency bound (fetches in flight)
    pub workers: usize,
    /// Optional exit height; the crawler stops once the window start
    /// reaches it
    pub exit_at: Option<u64>,
    /// How duplicate records are handled on merge
    pub dedup: DedupPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            exit_at: None,
            dedup: DedupPolicy::default(),
        }
    }
}

/// Result of fetching one height within a window
#[derive(Debug)]
pub enum HeightResult {
    /// Fetch succeeded (the vec may be empty past the chain tip)
    Fetched(u64, Vec<BlockRecord>),
    /// Fetch failed; the height is skipped for this run
    Failed(u64, String),
}

/// Summary produced by a successful integrity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub total_blocks: usize,
    pub multi_tx_blocks: usize,
}

/// Crawler status snapshot
#[derive(Debug, Clone)]
pub struct CrawlerStatus {
    pub is_running: bool,
    pub current_height: u64,
    pub records_accumulated: usize,
    pub windows_completed: u64,
}
