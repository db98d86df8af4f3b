//! Storage layer for atomic file operations.

mod atomic_file;
mod kv;

pub use atomic_file::{AtomicFile, AtomicFileError};
pub use kv::FileKeyValueStore;
