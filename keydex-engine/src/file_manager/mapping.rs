//! Backing file and memory mapping lifecycle
//!
//! The whole index file is mapped read/write (MAP_SHARED); pages are
//! plain byte slices of the mapping. Growing the file truncates it to
//! the new size and maps it again - the base address may move, so no
//! reference into the old mapping survives a call to `grow`. Callers
//! keep page offsets, never pointers, across anything that can grow
//! the file.
//!
//! The mapping and the file descriptor are released when the `Mapping`
//! is dropped. No fsync is performed; writeback is left to the kernel.

use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::MmapMut;
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::storage::{HEADER_SIZE, INITIAL_ALLOC, PAGE_SIZE};

/// The backing file and its current mapping
pub struct Mapping {
    file: File,
    mmap: MmapMut,
}

impl Mapping {
    /// Create a fresh index file sized at `INITIAL_ALLOC` pages (header
    /// page included) and map it.
    pub fn create<P: AsRef<Path>>(path: P) -> IndexResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(INITIAL_ALLOC as u64 * PAGE_SIZE as u64)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        debug!(path = %path.display(), pages = INITIAL_ALLOC, "created index file");

        Ok(Mapping { file, mmap })
    }

    /// Open and map an existing index file. The caller validates the
    /// header against the mapped size.
    pub fn open<P: AsRef<Path>>(path: P) -> IndexResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let size = file.metadata()?.len();
        if size < PAGE_SIZE as u64 {
            return Err(IndexError::InvalidFormat(format!(
                "file is {size} bytes, smaller than one page"
            )));
        }

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        debug!(path = %path.display(), size, "opened index file");

        Ok(Mapping { file, mmap })
    }

    /// Current mapped length in bytes (equals the file length)
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Grow the file and map it again. Every slice previously handed out
    /// refers to the old mapping and must be re-derived.
    pub fn grow(&mut self, new_len: u64) -> IndexResult<()> {
        debug_assert!(new_len > self.len());
        self.file.set_len(new_len)?;
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };
        debug!(new_len, "grew and remapped index file");
        Ok(())
    }

    /// The file header region at the start of page 0
    pub fn header(&self) -> &[u8] {
        &self.mmap[..HEADER_SIZE]
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[..HEADER_SIZE]
    }

    fn check_page_off(&self, off: u64) -> IndexResult<()> {
        if off == 0 || off % PAGE_SIZE as u64 != 0 || off + PAGE_SIZE as u64 > self.len() {
            return Err(IndexError::Corruption(format!(
                "invalid page offset {off} (file is {} bytes)",
                self.len()
            )));
        }
        Ok(())
    }

    /// One page as a shared slice
    pub fn page(&self, off: u64) -> IndexResult<&[u8]> {
        self.check_page_off(off)?;
        let off = off as usize;
        Ok(&self.mmap[off..off + PAGE_SIZE])
    }

    /// One page as an exclusive slice
    pub fn page_mut(&mut self, off: u64) -> IndexResult<&mut [u8]> {
        self.check_page_off(off)?;
        let off = off as usize;
        Ok(&mut self.mmap[off..off + PAGE_SIZE])
    }

    /// Two distinct pages as exclusive slices, in argument order. Used by
    /// splits, which rewrite a node and its new sibling together.
    pub fn page_pair_mut(&mut self, a: u64, b: u64) -> IndexResult<(&mut [u8], &mut [u8])> {
        self.check_page_off(a)?;
        self.check_page_off(b)?;
        if a == b {
            return Err(IndexError::Corruption(format!(
                "page {a} requested twice in a pair"
            )));
        }

        let (low, high) = (a.min(b) as usize, a.max(b) as usize);
        let (head, tail) = self.mmap.split_at_mut(high);
        let low_page = &mut head[low..low + PAGE_SIZE];
        let high_page = &mut tail[..PAGE_SIZE];

        if a < b {
            Ok((low_page, high_page))
        } else {
            Ok((high_page, low_page))
        }
    }
}
