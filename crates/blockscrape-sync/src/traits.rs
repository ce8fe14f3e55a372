//! # Adapter Traits for the Crawl Framework
//!
//! The crawler is generic over two seams, following the adapter pattern:
//!
//! ### [`BlockSource`]
//! Abstracts the remote block API. The production implementation talks
//! HTTP to a blockchain.info-style `block-height` endpoint; tests use an
//! in-memory mock with failure injection.
//!
//! ### [`BlockStore`]
//! Abstracts the persisted collection of fetched records. The production
//! implementation is a single JSON array on disk; tests use an in-memory
//! store that can model a missing file.
//!
//! Both traits are async-first so implementations can block on network
//! or file I/O without stalling the coordinator.

use crate::{BlockRecord, CrawlError, CrawlResult};
use async_trait::async_trait;

/// Trait for block sources that provide chain data by height.
///
/// # Errors
///
/// `get_blocks_at_height` returns [`CrawlError::Fetch`] for transport or
/// protocol failures. "No blocks at this height" is not an error: the
/// method returns an empty vec and the height still counts as processed.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Get all block records at a height.
    ///
    /// More than one record means the chain forked at that height; the
    /// caller treats the siblings as independent records.
    async fn get_blocks_at_height(&self, height: u64) -> CrawlResult<Vec<BlockRecord>>;

    /// Check if the source is reachable and responsive.
    ///
    /// Should be fast and must not error, only return boolean status.
    async fn is_connected(&self) -> bool;
}

/// Trait for stores that persist the accumulated block records.
///
/// The store is one collection read and rewritten as a whole. There is
/// no partial write and no locking against concurrent writers; callers
/// are expected to be the only writer.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Read the full persisted sequence.
    ///
    /// Returns [`CrawlError::StoreNotFound`] if nothing has been
    /// persisted yet. An empty store loads as an empty sequence.
    async fn load(&self) -> CrawlResult<Vec<BlockRecord>>;

    /// Overwrite the store with `records` verbatim, no sorting.
    async fn persist(&mut self, records: &[BlockRecord]) -> CrawlResult<()>;

    /// Load, stable-sort by ascending height, rewrite, and return the
    /// sorted sequence.
    ///
    /// Fork siblings keep their relative input order. Propagates
    /// [`CrawlError::StoreNotFound`] from `load`.
    async fn sort_and_persist(&mut self) -> CrawlResult<Vec<BlockRecord>> {
        let mut records = self.load().await?;
        records.sort_by_key(|record| record.height);
        self.persist(&records).await?;
        log::debug!("blocks sorted by height ({} records)", records.len());
        Ok(records)
    }
}

/// Scan a sequence for the desired store invariant: non-decreasing
/// heights across consecutive records.
///
/// Fails on the first inversion with the two offending heights. Used by
/// the integrity checker after sorting; factored out so the violation
/// path is testable on raw sequences.
pub fn verify_ordering(records: &[BlockRecord]) -> CrawlResult<()> {
    let mut prev: Option<u64> = None;
    for record in records {
        if let Some(prev_height) = prev {
            if prev_height > record.height {
                return Err(CrawlError::OrderingViolation {
                    prev: prev_height,
                    next: record.height,
                });
            }
        }
        prev = Some(record.height);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryStore;

    fn record(height: u64, tag: &str) -> BlockRecord {
        let mut r = BlockRecord::new(height, 1);
        r.extra
            .insert("hash".to_string(), serde_json::Value::String(tag.into()));
        r
    }

    #[tokio::test]
    async fn sort_is_idempotent_on_sorted_store() {
        let mut store = MemoryStore::with_records(vec![
            record(0, "a"),
            record(1, "b"),
            record(2, "c"),
        ]);
        let first = store.sort_and_persist().await.unwrap();
        let second = store.sort_and_persist().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn sort_preserves_fork_sibling_order() {
        let mut store = MemoryStore::with_records(vec![
            record(5, "late"),
            record(3, "first-sibling"),
            record(3, "second-sibling"),
            record(1, "early"),
        ]);
        let sorted = store.sort_and_persist().await.unwrap();
        let heights: Vec<u64> = sorted.iter().map(|r| r.height).collect();
        assert_eq!(heights, vec![1, 3, 3, 5]);
        // stable sort keeps the sibling order from the input
        assert_eq!(sorted[1], record(3, "first-sibling"));
        assert_eq!(sorted[2], record(3, "second-sibling"));
    }

    #[tokio::test]
    async fn sort_propagates_missing_store() {
        let mut store = MemoryStore::missing();
        match store.sort_and_persist().await {
            Err(CrawlError::StoreNotFound(_)) => {}
            other => panic!("expected StoreNotFound, got {:?}", other),
        }
    }

    #[test]
    fn verify_ordering_reports_first_inversion() {
        let records = vec![record(0, "a"), record(2, "b"), record(1, "c")];
        match verify_ordering(&records) {
            Err(CrawlError::OrderingViolation { prev, next }) => {
                assert_eq!(prev, 2);
                assert_eq!(next, 1);
            }
            other => panic!("expected OrderingViolation, got {:?}", other),
        }
    }

    #[test]
    fn verify_ordering_accepts_duplicates() {
        let records = vec![record(0, "a"), record(1, "b"), record(1, "c")];
        assert!(verify_ordering(&records).is_ok());
    }
}
