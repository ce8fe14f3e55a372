//! Mock implementations for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::{BlockRecord, BlockSource, BlockStore, CrawlError, CrawlResult};

/// Mock block source for testing
#[derive(Debug, Clone)]
pub struct MockBlockSource {
    blocks: Arc<RwLock<HashMap<u64, Vec<BlockRecord>>>>,
    failing_heights: Arc<RwLock<HashSet<u64>>>,
    dispatched: Arc<RwLock<Vec<u64>>>,
    connected: Arc<RwLock<bool>>,
}

impl MockBlockSource {
    pub fn new() -> Self {
        Self {
            blocks: Arc::new(RwLock::new(HashMap::new())),
            failing_heights: Arc::new(RwLock::new(HashSet::new())),
            dispatched: Arc::new(RwLock::new(Vec::new())),
            connected: Arc::new(RwLock::new(true)),
        }
    }

    pub fn add_block(&self, record: BlockRecord) {
        let mut blocks = self.blocks.write().unwrap();
        blocks.entry(record.height).or_default().push(record);
    }

    /// Seed one single-record block per height in `0..count`
    pub fn seed_chain(&self, count: u64) {
        for height in 0..count {
            self.add_block(BlockRecord::new(height, 1));
        }
    }

    /// Make fetches of `height` fail with a transport error
    pub fn fail_height(&self, height: u64) {
        self.failing_heights.write().unwrap().insert(height);
    }

    pub fn set_connected(&self, connected: bool) {
        *self.connected.write().unwrap() = connected;
    }

    /// Every height requested so far, in request order
    pub fn dispatched_heights(&self) -> Vec<u64> {
        self.dispatched.read().unwrap().clone()
    }
}

impl Default for MockBlockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockSource for MockBlockSource {
    async fn get_blocks_at_height(&self, height: u64) -> CrawlResult<Vec<BlockRecord>> {
        self.dispatched.write().unwrap().push(height);
        if !*self.connected.read().unwrap() {
            return Err(CrawlError::Fetch {
                height,
                message: "source not connected".to_string(),
            });
        }
        if self.failing_heights.read().unwrap().contains(&height) {
            return Err(CrawlError::Fetch {
                height,
                message: "injected failure".to_string(),
            });
        }
        let blocks = self.blocks.read().unwrap();
        Ok(blocks.get(&height).cloned().unwrap_or_default())
    }

    async fn is_connected(&self) -> bool {
        *self.connected.read().unwrap()
    }
}

/// In-memory block store for testing.
///
/// `None` models a store that has never been persisted (a missing
/// file); persist failures can be injected to exercise the fatal path.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: Arc<Mutex<Option<Vec<BlockRecord>>>>,
    fail_persist: Arc<RwLock<bool>>,
    persist_count: Arc<RwLock<u64>>,
}

impl MemoryStore {
    /// A store with no persisted blob yet
    pub fn missing() -> Self {
        Self {
            records: Arc::new(Mutex::new(None)),
            fail_persist: Arc::new(RwLock::new(false)),
            persist_count: Arc::new(RwLock::new(0)),
        }
    }

    pub fn with_records(records: Vec<BlockRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Some(records))),
            fail_persist: Arc::new(RwLock::new(false)),
            persist_count: Arc::new(RwLock::new(0)),
        }
    }

    pub fn set_fail_persist(&self, fail: bool) {
        *self.fail_persist.write().unwrap() = fail;
    }

    pub fn persist_count(&self) -> u64 {
        *self.persist_count.read().unwrap()
    }

    /// Current persisted contents, if any
    pub async fn snapshot(&self) -> Option<Vec<BlockRecord>> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn load(&self) -> CrawlResult<Vec<BlockRecord>> {
        match self.records.lock().await.as_ref() {
            Some(records) => Ok(records.clone()),
            None => Err(CrawlError::StoreNotFound("memory store".to_string())),
        }
    }

    async fn persist(&mut self, records: &[BlockRecord]) -> CrawlResult<()> {
        if *self.fail_persist.read().unwrap() {
            return Err(CrawlError::Store("injected persist failure".to_string()));
        }
        *self.records.lock().await = Some(records.to_vec());
        *self.persist_count.write().unwrap() += 1;
        Ok(())
    }
}
