//! Storage layer for the keydex index file format
//!
//! This module handles the low-level binary format of index files:
//! - File header (page 0)
//! - Common node header and node kinds
//! - Leaf nodes (key/data-offset entries, sibling links, tombstones)
//! - Inner nodes (separator/child routing)
//! - Key comparison

pub mod header;
pub mod inner;
pub mod key;
pub mod leaf;
pub mod node;

pub use header::{HeaderMut, HeaderView, HEADER_SIZE, MAGIC};
pub use inner::{InnerMut, InnerView};
pub use key::{validate_key_len, BytewiseComparator, KeyComparator};
pub use leaf::{LeafMut, LeafView};
pub use node::NodeKind;

/// Size of every page (node) in the file, in bytes
pub const PAGE_SIZE: usize = 4096;

/// Minimum supported key length in bytes
pub const KEY_MIN_LEN: usize = 1;

/// Maximum supported key length in bytes
pub const KEY_MAX_LEN: usize = 512;

/// Safety bound on the insert descent stack
pub const MAX_DEPTH: usize = 1024;

/// Number of pages the file is grown by at a time (doubled as needed)
pub const INITIAL_ALLOC: usize = 1024;
