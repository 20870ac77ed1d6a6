//! Cursor - a position within the leaf chain
//!
//! A cursor carries only the leaf offset and a slot index. Every access
//! re-derives the leaf view from the current mapping base, so a cursor
//! held across operations that grow the file stays valid for read-only
//! use. Mutating the tree between cursor steps is undefined: a split can
//! move entries to a page the cursor has never seen.

/// A position in the index, produced by `begin`, `end` or `seek` and
/// advanced by `next`/`previous`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub(crate) leaf_off: u64,
    pub(crate) pos: usize,
}

impl Cursor {
    /// Offset of the leaf page the cursor points into
    pub fn leaf_offset(&self) -> u64 {
        self.leaf_off
    }

    /// Slot index within the leaf
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// One live index entry, resolved from a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    /// The key bytes, borrowed from the mapping
    pub key: &'a [u8],
    /// The data offset stored with the key
    pub data_offset: u64,
}
