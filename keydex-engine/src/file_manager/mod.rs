//! File manager for keydex index files
//!
//! Owns the backing file and its memory mapping, and hands out page
//! slices by validated offset.

pub mod mapping;

pub use mapping::Mapping;
