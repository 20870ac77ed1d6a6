//! Error types for the keydex engine
//!
//! Node-level operations report "does not fit" through plain return values
//! because running out of room in a page is what drives a split, not a
//! failure. Everything that reaches the public surface is an `IndexError`.

use thiserror::Error;

use crate::storage::{KEY_MAX_LEN, KEY_MIN_LEN, MAX_DEPTH};

/// Main error type for the keydex engine
#[derive(Error, Debug)]
pub enum IndexError {
    /// Key length outside the supported range
    #[error("key length {len} outside allowed range [{KEY_MIN_LEN}, {KEY_MAX_LEN}]")]
    BadKey { len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a keydex index (bad magic, impossible header)
    #[error("invalid index file: {0}")]
    InvalidFormat(String),

    /// The file claims something that cannot be true (bad page offset,
    /// unknown node kind, cursor past the end of a leaf)
    #[error("corrupt index: {0}")]
    Corruption(String),

    /// Descent would exceed the configured depth bound
    #[error("tree depth exceeds {MAX_DEPTH}")]
    DepthExceeded,
}

/// Result type for keydex operations
pub type IndexResult<T> = Result<T, IndexError>;
