//! File header - page 0 of a keydex index file
//!
//! Layout (little-endian):
//! - bytes 0..8:   magic "INDEXIDX"
//! - bytes 8..16:  nnodes (u64) - allocated data pages, excluding page 0
//! - bytes 16..24: nkeys (u64) - live (non-tombstoned) keys
//! - bytes 24..32: root (u64) - byte offset of the root page, 0 if empty
//! - bytes 32..4095: reserved, zero
//!
//! The header is updated in place through the mapping; there is no
//! separate write-back step.

use std::io::Cursor;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{IndexError, IndexResult};
use crate::storage::node::{read_u64, write_u64};
use crate::storage::PAGE_SIZE;

/// Magic bytes identifying a keydex index file
pub const MAGIC: [u8; 8] = *b"INDEXIDX";

/// Size of the used portion of the header in bytes
pub const HEADER_SIZE: usize = 32;

const NNODES_OFFSET: usize = 8;
const NKEYS_OFFSET: usize = 16;
const ROOT_OFFSET: usize = 24;

/// Read-only view of the file header
pub struct HeaderView<'a> {
    buf: &'a [u8],
}

impl<'a> HeaderView<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        debug_assert!(buf.len() >= HEADER_SIZE);
        HeaderView { buf }
    }

    pub fn nnodes(&self) -> u64 {
        read_u64(self.buf, NNODES_OFFSET)
    }

    pub fn nkeys(&self) -> u64 {
        read_u64(self.buf, NKEYS_OFFSET)
    }

    pub fn root(&self) -> u64 {
        read_u64(self.buf, ROOT_OFFSET)
    }

    /// Validate the magic and that every claimed page fits in the file
    pub fn validate(&self, file_size: u64) -> IndexResult<()> {
        if self.buf[..MAGIC.len()] != MAGIC {
            return Err(IndexError::InvalidFormat(
                "bad magic, not a keydex index file".to_string(),
            ));
        }

        let needed = (self.nnodes() + 1) * PAGE_SIZE as u64;
        if needed > file_size {
            return Err(IndexError::InvalidFormat(format!(
                "header claims {} pages but the file holds only {} bytes",
                self.nnodes() + 1,
                file_size
            )));
        }

        Ok(())
    }
}

/// Mutable view of the file header
pub struct HeaderMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> HeaderMut<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        debug_assert!(buf.len() >= HEADER_SIZE);
        HeaderMut { buf }
    }

    /// Write a fresh header for an empty index
    pub fn init(&mut self) {
        self.buf[..MAGIC.len()].copy_from_slice(&MAGIC);

        let mut cursor = Cursor::new(&mut self.buf[MAGIC.len()..HEADER_SIZE]);
        cursor.write_u64::<LittleEndian>(0).unwrap(); // nnodes
        cursor.write_u64::<LittleEndian>(0).unwrap(); // nkeys
        cursor.write_u64::<LittleEndian>(0).unwrap(); // root
    }

    pub fn set_nnodes(&mut self, nnodes: u64) {
        write_u64(self.buf, NNODES_OFFSET, nnodes);
    }

    pub fn set_nkeys(&mut self, nkeys: u64) {
        write_u64(self.buf, NKEYS_OFFSET, nkeys);
    }

    pub fn set_root(&mut self, root: u64) {
        write_u64(self.buf, ROOT_OFFSET, root);
    }
}
