//! Error types for blockscrape-sync

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("fetch error at height {height}: {message}")]
    Fetch { height: u64, message: String },

    #[error("store not found: {0}")]
    StoreNotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("heights not in order: {prev} and {next}")]
    OrderingViolation { prev: u64, next: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

pub type CrawlResult<T> = Result<T, CrawlError>;
