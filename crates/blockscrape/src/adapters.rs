//! Adapter implementations for blockscrape: the blockchain.info block
//! source and the single-file JSON store.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use blockscrape_sync::{BlockRecord, BlockSource, BlockStore, CrawlError, CrawlResult};

/// Response shape of `GET /block-height/{height}?format=json`
#[derive(Deserialize)]
struct BlockHeightResponse {
    blocks: Option<Vec<BlockRecord>>,
}

/// Block source backed by a blockchain.info-style REST API.
///
/// A non-2xx status or a response without a `blocks` field is treated
/// as "no blocks at this height", not as an error; only transport
/// failures (including the per-request timeout) surface as
/// [`CrawlError::Fetch`].
#[derive(Clone)]
pub struct BlockchainInfoSource {
    base_url: String,
    client: reqwest::Client,
}

impl BlockchainInfoSource {
    pub fn new(base_url: String, request_timeout: Duration) -> CrawlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CrawlError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl BlockSource for BlockchainInfoSource {
    async fn get_blocks_at_height(&self, height: u64) -> CrawlResult<Vec<BlockRecord>> {
        let url = format!("{}/block-height/{}?format=json", self.base_url, height);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CrawlError::Fetch {
                height,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            debug!(
                "height {} returned status {}, treating as no blocks",
                height,
                response.status()
            );
            return Ok(Vec::new());
        }

        let body: BlockHeightResponse =
            response.json().await.map_err(|e| CrawlError::Fetch {
                height,
                message: format!("invalid response body: {}", e),
            })?;
        Ok(body.blocks.unwrap_or_default())
    }

    async fn is_connected(&self) -> bool {
        self.get_blocks_at_height(0).await.is_ok()
    }
}

/// Store persisting all records as one JSON array in a single file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl BlockStore for JsonFileStore {
    async fn load(&self) -> CrawlResult<Vec<BlockRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CrawlError::StoreNotFound(self.path.display().to_string()));
            }
            Err(e) => {
                return Err(CrawlError::Store(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            CrawlError::Serialization(format!("malformed store {}: {}", self.path.display(), e))
        })
    }

    async fn persist(&mut self, records: &[BlockRecord]) -> CrawlResult<()> {
        let body = serde_json::to_vec(records)
            .map_err(|e| CrawlError::Serialization(format!("failed to encode store: {}", e)))?;
        tokio::fs::write(&self.path, body).await.map_err(|e| {
            CrawlError::Store(format!(
                "failed to write {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}
