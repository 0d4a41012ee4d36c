//! Per-page slot table.
//!
//! One [`Slot`] per logical page records where the page's data lives, if
//! anywhere. Each slot carries its own lock so that reads and frees of distinct
//! pages never contend.

use crate::alloc::{Location, SlotAllocator};
use crate::stats::Stats;
use crate::{Error, Result};
use bitflags::bitflags;
use parking_lot::RwLock;

bitflags! {
    /// Per-slot metadata flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PageFlags: u8 {
        /// Page is all zeros; no backing storage.
        const ZERO = 1 << 0;
        /// Page is held verbatim as a raw page outside the arena.
        const UNCOMPRESSED = 1 << 1;
    }
}

/// Backing storage for an occupied slot.
#[derive(Debug)]
pub(crate) enum Backing {
    /// Compressed object in the slot allocator.
    Object(Location),
    /// Raw page that did not compress below the threshold.
    Raw(Box<[u8]>),
}

/// Metadata for one logical page.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) flags: PageFlags,
    pub(crate) backing: Option<Backing>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.backing.is_none() && !self.flags.contains(PageFlags::ZERO)
    }
}

/// Fixed-length table of page slots.
#[derive(Debug)]
pub struct SlotTable {
    slots: Box<[RwLock<Slot>]>,
}

impl SlotTable {
    /// Allocate a table of `num_pages` empty slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the table cannot be allocated.
    pub fn new(num_pages: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(num_pages)
            .map_err(|e| Error::OutOfMemory(format!("slot table of {num_pages} pages: {e}")))?;
        slots.resize_with(num_pages, RwLock::default);
        Ok(Self { slots: slots.into_boxed_slice() })
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots.
    #[must_use]
    pub fn is_empty_table(&self) -> bool {
        self.slots.is_empty()
    }

    /// Test a flag on slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; callers validate indices first.
    #[must_use]
    pub fn test_flag(&self, index: usize, flag: PageFlags) -> bool {
        self.slots[index].read().flags.contains(flag)
    }

    /// Set a flag on slot `index`.
    pub fn set_flag(&self, index: usize, flag: PageFlags) {
        self.slots[index].write().flags.insert(flag);
    }

    /// Clear a flag on slot `index`.
    pub fn clear_flag(&self, index: usize, flag: PageFlags) {
        self.slots[index].write().flags.remove(flag);
    }

    /// Whether slot `index` holds neither data nor the zero flag.
    #[must_use]
    pub fn is_empty(&self, index: usize) -> bool {
        self.slots[index].read().is_empty()
    }

    /// Whether slot `index` holds a backing location.
    #[must_use]
    pub fn has_backing(&self, index: usize) -> bool {
        self.slots[index].read().backing.is_some()
    }

    /// Release whatever slot `index` holds and update the page counters.
    ///
    /// Idempotent: freeing an empty slot only clears stray flags.
    pub fn free_page(&self, index: usize, allocator: &dyn SlotAllocator, stats: &Stats) {
        let mut slot = self.slots[index].write();
        match slot.backing.take() {
            None if slot.flags.contains(PageFlags::ZERO) => stats.dec_zero(),
            None => {}
            Some(Backing::Raw(page)) => {
                drop(page);
                stats.dec_expand();
            }
            Some(Backing::Object(location)) => {
                let size = allocator.size_of(location);
                allocator.free(location);
                stats.record_freed(size);
            }
        }
        slot.flags = PageFlags::empty();
    }

    /// Mark slot `index` as an all-zero page.
    pub(crate) fn store_zero(&self, index: usize, stats: &Stats) {
        let mut slot = self.slots[index].write();
        debug_assert!(slot.is_empty());
        slot.flags = PageFlags::ZERO;
        stats.inc_zero();
    }

    /// Install a compressed object of `size` bytes at slot `index`.
    pub(crate) fn store_object(&self, index: usize, location: Location, size: usize, stats: &Stats) {
        let mut slot = self.slots[index].write();
        debug_assert!(slot.is_empty());
        slot.flags = PageFlags::empty();
        slot.backing = Some(Backing::Object(location));
        stats.record_stored(size);
    }

    /// Install a raw page at slot `index`.
    pub(crate) fn store_raw(&self, index: usize, page: Box<[u8]>, stats: &Stats) {
        let mut slot = self.slots[index].write();
        debug_assert!(slot.is_empty());
        slot.flags = PageFlags::UNCOMPRESSED;
        slot.backing = Some(Backing::Raw(page));
        stats.inc_expand();
    }

    /// Run `f` with shared access to slot `index`.
    pub(crate) fn with_slot<R>(&self, index: usize, f: impl FnOnce(&Slot) -> R) -> R {
        f(&self.slots[index].read())
    }
}
