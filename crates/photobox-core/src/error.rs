//! Domain-specific error types following panic-free policy.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing the image store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store directory could not be listed
    #[error("Cannot read image store {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A new image could not be written into the store
    #[error("Cannot write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No sequence number follows the highest one in the store
    #[error("Image numbering exhausted in {root}: nothing follows {last}")]
    Exhausted { root: PathBuf, last: String },

    /// The allocated name is held by an entry the store does not count
    #[error("Cannot store image: {path} already exists")]
    NameTaken { path: PathBuf },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
