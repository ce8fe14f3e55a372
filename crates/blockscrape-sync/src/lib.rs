pub mod check;
pub mod crawler;
pub mod error;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use check::*;
pub use crawler::*;
pub use error::*;
pub use traits::*;
pub use types::*;
