//! Shared helpers for the blockscrape integration test suite

pub mod test_utils;
