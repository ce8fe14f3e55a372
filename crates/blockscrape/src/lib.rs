pub mod adapters;

pub use adapters::{BlockchainInfoSource, JsonFileStore};
