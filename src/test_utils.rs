//! Builders for block records and seeded sources used across the
//! integration tests.

use blockscrape_sync::mock::MockBlockSource;
use blockscrape_sync::BlockRecord;
use serde_json::Value;

/// A block record with a distinguishing `hash` passthrough field, the
/// way the remote API labels fork siblings.
pub fn block_with_hash(height: u64, n_tx: u64, hash: &str) -> BlockRecord {
    let mut record = BlockRecord::new(height, n_tx);
    record
        .extra
        .insert("hash".to_string(), Value::String(hash.to_string()));
    record
}

/// A source seeded with one block per height in `0..tip`, each carrying
/// a deterministic hash and `n_tx = height + 1`.
pub fn seeded_source(tip: u64) -> MockBlockSource {
    let source = MockBlockSource::new();
    for height in 0..tip {
        source.add_block(block_with_hash(height, height + 1, &format!("hash-{}", height)));
    }
    source
}
