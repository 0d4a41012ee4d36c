//! Backing storage for stored pages.
//!
//! Compressed objects live in a [`SlotAllocator`], a variable-size allocator
//! that hands out byte ranges from large backing chunks. Incompressible pages
//! bypass it and are held as whole raw pages from [`alloc_raw_page`].

mod arena;

pub use arena::{ArenaAllocator, ARENA_CHUNK_SIZE, MIN_OBJECT_CLASS};

use crate::{Error, Result, PAGE_SIZE};
use std::fmt;

/// Opaque reference to an allocated object: backing chunk plus byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    chunk: u32,
    offset: u32,
}

impl Location {
    /// Create a location from its chunk index and byte offset.
    #[must_use]
    pub const fn new(chunk: u32, offset: u32) -> Self {
        Self { chunk, offset }
    }

    /// Index of the backing chunk.
    #[must_use]
    pub const fn chunk(self) -> u32 {
        self.chunk
    }

    /// Byte offset within the backing chunk.
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.offset
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}", self.chunk, self.offset)
    }
}

/// Point-in-time allocator usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorUsage {
    /// Number of live objects.
    pub objects: u64,
    /// Sum of the requested sizes of live objects.
    pub object_bytes: u64,
    /// Bytes held in backing chunks, including slack and free slots.
    pub reserved_bytes: u64,
}

/// Contract the store engine requires from its variable-size allocator.
///
/// Implementations synchronize internally: [`read`](Self::read) may run
/// concurrently with allocation and free of other objects.
pub trait SlotAllocator: Send + Sync {
    /// Allocate an object of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] when no backing storage is available and
    /// [`Error::InvalidInput`] for sizes of zero or above one page.
    fn allocate(&self, size: usize) -> Result<Location>;

    /// Release an object. Freeing an unknown location is ignored.
    fn free(&self, location: Location);

    /// Size the object was allocated with, or 0 for an unknown location.
    fn size_of(&self, location: Location) -> usize;

    /// Copy `data` into the object. `data` must not exceed the object's size.
    fn write(&self, location: Location, data: &[u8]);

    /// Run `f` over the object's bytes.
    fn read(&self, location: Location, f: &mut dyn FnMut(&[u8]));

    /// Current usage totals.
    fn usage(&self) -> AllocatorUsage;
}

/// Allocate a raw page and copy `data` into it.
///
/// # Errors
///
/// Returns [`Error::OutOfMemory`] if the page cannot be allocated.
pub fn alloc_raw_page(data: &[u8]) -> Result<Box<[u8]>> {
    debug_assert_eq!(data.len(), PAGE_SIZE);
    let mut page = Vec::new();
    page.try_reserve_exact(PAGE_SIZE)
        .map_err(|e| Error::OutOfMemory(format!("raw page allocation failed: {e}")))?;
    page.extend_from_slice(data);
    Ok(page.into_boxed_slice())
}
