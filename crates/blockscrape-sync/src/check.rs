//! # Integrity Checker
//!
//! Read-only diagnostic over a [`BlockStore`]: sort the store, reload
//! it, verify non-decreasing heights, and summarize what it holds. No
//! repair capability; the first inversion aborts the check.

use log::info;

use crate::{verify_ordering, BlockStore, CrawlResult, IntegrityReport};

/// Sort the store, then verify height ordering across consecutive
/// records and report summary statistics.
///
/// Fails with [`CrawlError::OrderingViolation`](crate::CrawlError) on
/// the first out-of-order pair, naming both offending heights; no
/// partial report is produced in that case. A missing store propagates
/// [`CrawlError::StoreNotFound`](crate::CrawlError).
pub async fn check_store<S: BlockStore>(store: &mut S) -> CrawlResult<IntegrityReport> {
    store.sort_and_persist().await?;
    let records = store.load().await?;

    verify_ordering(&records)?;

    let multi_tx_blocks = records.iter().filter(|record| record.n_tx > 1).count();
    let report = IntegrityReport {
        total_blocks: records.len(),
        multi_tx_blocks,
    };
    info!(
        "blocks in store: {}, blocks with more than 1 transaction: {}, all blocks in order",
        report.total_blocks, report.multi_tx_blocks
    );
    Ok(report)
}
