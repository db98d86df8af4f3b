pub mod ai;
pub mod config;
pub mod conversation;
pub mod error;
pub mod secret;
pub mod storage;

// Re-export common error type
pub use error::{FolioError, Result};
