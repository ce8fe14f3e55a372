//! # Batch Crawler
//!
//! [`BlockCrawler`] walks the height space in fixed-size windows: fan
//! out one fetch task per height in `[current, current + workers)`,
//! fan in as tasks complete, merge the results into the accumulated
//! set, persist the whole store, then advance to the next window.
//! Windows run strictly sequentially, so at most `workers` requests are
//! in flight at any time.
//!
//! On startup the crawler sorts and reloads the store and resumes from
//! the maximum persisted height. That height is fetched again in the
//! first window; under the default [`DedupPolicy::DropKnown`] the
//! re-fetch is idempotent.
//!
//! Per-height fetch failures are logged and skipped for the run. Only
//! persist failures are fatal.

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::{
    BlockRecord, BlockSource, BlockStore, CrawlError, CrawlResult, CrawlerConfig, CrawlerStatus,
    DedupPolicy, HeightResult,
};

/// Cloneable handle for stopping and observing a running crawler.
///
/// `stop` takes effect at the next window boundary; a window already in
/// flight always completes and persists first.
#[derive(Debug, Clone)]
pub struct CrawlerHandle {
    is_running: Arc<AtomicBool>,
    current_height: Arc<AtomicU64>,
}

impl CrawlerHandle {
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn current_height(&self) -> u64 {
        self.current_height.load(Ordering::SeqCst)
    }
}

/// Incremental block crawler over a [`BlockSource`] and a [`BlockStore`]
pub struct BlockCrawler<N, S>
where
    N: BlockSource,
    S: BlockStore,
{
    source: Arc<N>,
    store: S,
    config: CrawlerConfig,
    accumulated: Vec<BlockRecord>,
    is_running: Arc<AtomicBool>,
    current_height: Arc<AtomicU64>,
    windows_completed: u64,
}

impl<N, S> BlockCrawler<N, S>
where
    N: BlockSource + 'static,
    S: BlockStore,
{
    pub fn new(source: N, store: S, config: CrawlerConfig) -> Self {
        Self {
            source: Arc::new(source),
            store,
            config,
            accumulated: Vec::new(),
            is_running: Arc::new(AtomicBool::new(true)),
            current_height: Arc::new(AtomicU64::new(0)),
            windows_completed: 0,
        }
    }

    /// Get a stop/inspect handle for this crawler
    pub fn handle(&self) -> CrawlerHandle {
        CrawlerHandle {
            is_running: self.is_running.clone(),
            current_height: self.current_height.clone(),
        }
    }

    pub fn status(&self) -> CrawlerStatus {
        CrawlerStatus {
            is_running: self.is_running.load(Ordering::SeqCst),
            current_height: self.current_height.load(Ordering::SeqCst),
            records_accumulated: self.accumulated.len(),
            windows_completed: self.windows_completed,
        }
    }

    /// Records merged so far this run (loaded records plus fetched ones)
    pub fn accumulated(&self) -> &[BlockRecord] {
        &self.accumulated
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resume from the persisted store.
    ///
    /// Sorts and reloads the store, seeds the accumulated set from it,
    /// and positions the crawler at the maximum persisted height (which
    /// the first window will fetch again). A missing or empty store
    /// starts a fresh crawl from height 0.
    pub async fn init(&mut self) -> CrawlResult<()> {
        match self.store.sort_and_persist().await {
            Ok(records) => {
                let resume_height = records.last().map(|record| record.height).unwrap_or(0);
                if records.is_empty() {
                    info!("store is empty, starting crawl from height 0");
                } else {
                    info!(
                        "resuming from height {} ({} records loaded)",
                        resume_height,
                        records.len()
                    );
                }
                self.accumulated = records;
                self.current_height.store(resume_height, Ordering::SeqCst);
                Ok(())
            }
            Err(CrawlError::StoreNotFound(path)) => {
                info!("no store at {}, starting crawl from height 0", path);
                self.accumulated = Vec::new();
                self.current_height.store(0, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run the crawl loop until stopped or `exit_at` is reached.
    ///
    /// Initializes from the store first, so a bare `run` resumes
    /// correctly after interruption.
    pub async fn run(&mut self) -> CrawlResult<()> {
        if self.config.workers == 0 {
            return Err(CrawlError::Config("workers must be at least 1".to_string()));
        }

        self.init().await?;

        if !self.source.is_connected().await {
            warn!("block source is not responding; per-height fetches will fail until it recovers");
        }

        while self.is_running.load(Ordering::SeqCst) {
            let window_start = self.current_height.load(Ordering::SeqCst);

            if let Some(exit_at) = self.config.exit_at {
                if window_start >= exit_at {
                    info!("reached exit height {}", exit_at);
                    break;
                }
            }

            let results = self.run_window(window_start).await;
            for result in results {
                match result {
                    HeightResult::Fetched(height, blocks) if !blocks.is_empty() => {
                        let added = self.merge(blocks);
                        info!("block height {} fetched ({} new records)", height, added);
                    }
                    HeightResult::Fetched(height, _) => {
                        debug!("no blocks at height {}", height);
                    }
                    HeightResult::Failed(height, message) => {
                        error!("block height {} failed: {}", height, message);
                    }
                }
            }

            let next_height = window_start + self.config.workers as u64;
            self.current_height.store(next_height, Ordering::SeqCst);
            self.windows_completed += 1;

            // Persist failure is the one fatal path in the loop
            self.store.persist(&self.accumulated).await?;
            info!(
                "block height {}: store updated ({} records)",
                next_height,
                self.accumulated.len()
            );
        }

        self.is_running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Fetch one window of heights concurrently, collecting results in
    /// completion order. Every height in the window is dispatched
    /// exactly once; the barrier at the end means the window never
    /// overlaps its successor.
    async fn run_window(&self, window_start: u64) -> Vec<HeightResult> {
        let window_end = window_start + self.config.workers as u64;
        let mut tasks = FuturesUnordered::new();

        for height in window_start..window_end {
            let source = self.source.clone();
            let task = tokio::spawn(async move {
                match source.get_blocks_at_height(height).await {
                    Ok(blocks) => HeightResult::Fetched(height, blocks),
                    Err(e) => HeightResult::Failed(height, e.to_string()),
                }
            });
            tasks.push(async move {
                match task.await {
                    Ok(result) => result,
                    Err(e) => HeightResult::Failed(height, format!("fetch task failed: {}", e)),
                }
            });
        }

        let mut results = Vec::with_capacity(self.config.workers);
        while let Some(result) = tasks.next().await {
            results.push(result);
        }
        results
    }

    /// Merge fetched records into the accumulated set under the
    /// configured dedup policy, returning how many were appended.
    fn merge(&mut self, blocks: Vec<BlockRecord>) -> usize {
        let before = self.accumulated.len();
        match self.config.dedup {
            DedupPolicy::AllowDuplicates => self.accumulated.extend(blocks),
            DedupPolicy::DropKnown => {
                for block in blocks {
                    let known = self
                        .accumulated
                        .iter()
                        .any(|existing| existing.height == block.height && *existing == block);
                    if !known {
                        self.accumulated.push(block);
                    }
                }
            }
        }
        self.accumulated.len() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemoryStore, MockBlockSource};

    fn config(workers: usize, exit_at: u64) -> CrawlerConfig {
        CrawlerConfig {
            workers,
            exit_at: Some(exit_at),
            dedup: DedupPolicy::DropKnown,
        }
    }

    fn heights(records: &[BlockRecord]) -> Vec<u64> {
        let mut hs: Vec<u64> = records.iter().map(|r| r.height).collect();
        hs.sort();
        hs
    }

    #[tokio::test]
    async fn fresh_store_starts_at_zero_and_dispatches_first_window() {
        let source = MockBlockSource::new();
        source.seed_chain(3);
        let mut crawler = BlockCrawler::new(source.clone(), MemoryStore::missing(), config(4, 1));

        crawler.run().await.unwrap();

        let mut dispatched = source.dispatched_heights();
        dispatched.sort();
        assert_eq!(dispatched, vec![0, 1, 2, 3]);
        // only heights with non-empty results end up in the store
        let persisted = crawler.store().snapshot().await.unwrap();
        assert_eq!(heights(&persisted), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn resume_starts_at_max_height_and_refetches_it() {
        let source = MockBlockSource::new();
        source.seed_chain(6);
        let store = MemoryStore::with_records(vec![
            BlockRecord::new(0, 1),
            BlockRecord::new(2, 1),
            BlockRecord::new(1, 1),
        ]);
        let mut crawler = BlockCrawler::new(source.clone(), store, config(4, 3));

        crawler.init().await.unwrap();
        assert_eq!(crawler.handle().current_height(), 2);

        crawler.run().await.unwrap();
        let mut dispatched = source.dispatched_heights();
        dispatched.sort();
        // first (and only) window is [2, 6): the max known height is included
        assert_eq!(dispatched, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn window_dispatches_each_height_exactly_once() {
        let source = MockBlockSource::new();
        source.seed_chain(8);
        let mut crawler = BlockCrawler::new(source.clone(), MemoryStore::missing(), config(8, 1));

        crawler.run().await.unwrap();

        let mut dispatched = source.dispatched_heights();
        dispatched.sort();
        assert_eq!(dispatched, (0..8).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn fetch_failure_is_isolated_to_its_height() {
        let source = MockBlockSource::new();
        source.seed_chain(3);
        source.fail_height(1);
        let mut crawler = BlockCrawler::new(source, MemoryStore::missing(), config(3, 1));

        crawler.run().await.unwrap();

        assert_eq!(heights(crawler.accumulated()), vec![0, 2]);
    }

    #[tokio::test]
    async fn resume_does_not_duplicate_tip_records() {
        let source = MockBlockSource::new();
        source.seed_chain(4);
        let store = MemoryStore::with_records(vec![
            BlockRecord::new(0, 1),
            BlockRecord::new(1, 1),
        ]);
        let mut crawler = BlockCrawler::new(source, store, config(4, 2));

        crawler.run().await.unwrap();

        // height 1 was re-fetched but merged idempotently
        assert_eq!(heights(crawler.accumulated()), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn allow_duplicates_policy_appends_refetched_tip() {
        let source = MockBlockSource::new();
        source.seed_chain(2);
        let store = MemoryStore::with_records(vec![
            BlockRecord::new(0, 1),
            BlockRecord::new(1, 1),
        ]);
        let mut crawler = BlockCrawler::new(
            source,
            store,
            CrawlerConfig {
                workers: 2,
                exit_at: Some(2),
                dedup: DedupPolicy::AllowDuplicates,
            },
        );

        crawler.run().await.unwrap();

        assert_eq!(heights(crawler.accumulated()), vec![0, 1, 1]);
    }

    #[tokio::test]
    async fn stop_before_run_prevents_any_window() {
        let source = MockBlockSource::new();
        source.seed_chain(4);
        let store = MemoryStore::missing();
        let mut crawler = BlockCrawler::new(
            source.clone(),
            store,
            CrawlerConfig {
                workers: 4,
                exit_at: None,
                dedup: DedupPolicy::DropKnown,
            },
        );

        crawler.handle().stop();
        crawler.run().await.unwrap();

        assert!(source.dispatched_heights().is_empty());
    }

    #[tokio::test]
    async fn stop_signal_halts_an_unbounded_run() {
        let source = MockBlockSource::new();
        let store = MemoryStore::missing();
        let mut crawler = BlockCrawler::new(
            source,
            store,
            CrawlerConfig {
                workers: 2,
                exit_at: None,
                dedup: DedupPolicy::DropKnown,
            },
        );
        let handle = crawler.handle();

        let run = tokio::spawn(async move { crawler.run().await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.stop();

        tokio::time::timeout(std::time::Duration::from_secs(5), run)
            .await
            .expect("crawler did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn disconnected_source_fails_heights_but_not_the_run() {
        let source = MockBlockSource::new();
        source.seed_chain(4);
        source.set_connected(false);
        let mut crawler = BlockCrawler::new(source.clone(), MemoryStore::missing(), config(4, 1));

        crawler.run().await.unwrap();

        // every height failed its fetch, so nothing accumulated, but
        // the window still completed and persisted
        assert!(crawler.accumulated().is_empty());
        assert_eq!(crawler.store().persist_count(), 1);
        assert!(!source.is_connected().await);
    }

    #[tokio::test]
    async fn persist_failure_is_fatal() {
        let source = MockBlockSource::new();
        source.seed_chain(2);
        let store = MemoryStore::with_records(Vec::new());
        store.set_fail_persist(true);
        let mut crawler = BlockCrawler::new(source, store, config(2, 1));

        match crawler.run().await {
            Err(CrawlError::Store(_)) => {}
            other => panic!("expected Store error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_workers_is_a_config_error() {
        let source = MockBlockSource::new();
        let mut crawler = BlockCrawler::new(source, MemoryStore::missing(), config(0, 1));
        match crawler.run().await {
            Err(CrawlError::Config(_)) => {}
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_windows_past_the_tip_still_persist() {
        let source = MockBlockSource::new();
        source.seed_chain(2);
        let store = MemoryStore::with_records(Vec::new());
        let mut crawler = BlockCrawler::new(source, store, config(4, 8));

        crawler.run().await.unwrap();

        assert_eq!(crawler.status().windows_completed, 2);
        assert_eq!(crawler.store().persist_count(), 3); // init sort + two windows
        assert_eq!(heights(crawler.accumulated()), vec![0, 1]);
    }
}
