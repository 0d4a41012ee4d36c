//! Request validation and the read, write and discard paths.
//!
//! Requests address the device in bytes and must cover whole, aligned pages.
//! Every request runs to completion on the calling thread.
//!
//! Writes to a page serialize on the device's I/O lock, which guards the
//! shared compression scratch buffer. Reads take only the per-slot lock, so a
//! read racing a write to the same page may observe the previous content, the
//! new content, or the all-zero page in between. Callers that need a defined
//! result must not issue both at once.

use crate::alloc::alloc_raw_page;
use crate::codec::expect_full_page;
use crate::device::{Device, Store};
use crate::page::{is_zero_page, zero_fill};
use crate::stats::Stats;
use crate::table::Backing;
use crate::{Error, Result, PAGE_SIZE, PAGE_SIZE_U64};
use std::ops::Range;

/// Kind of block request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read pages into a buffer.
    Read,
    /// Write pages from a buffer.
    Write,
    /// Drop the contents of a page range.
    Discard,
}

/// A block request against a device.
#[derive(Debug)]
pub enum IoRequest<'a> {
    /// Read `buf.len()` bytes starting at `offset`.
    Read {
        /// Byte offset.
        offset: u64,
        /// Destination buffer.
        buf: &'a mut [u8],
    },
    /// Write `buf` starting at `offset`.
    Write {
        /// Byte offset.
        offset: u64,
        /// Source buffer.
        buf: &'a [u8],
    },
    /// Discard `len` bytes starting at `offset`.
    Discard {
        /// Byte offset.
        offset: u64,
        /// Length in bytes.
        len: u64,
    },
}

impl IoRequest<'_> {
    /// The request's operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Read { .. } => Operation::Read,
            Self::Write { .. } => Operation::Write,
            Self::Discard { .. } => Operation::Discard,
        }
    }

    /// Starting byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Read { offset, .. } | Self::Write { offset, .. } | Self::Discard { offset, .. } => {
                *offset
            }
        }
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Read { buf, .. } => buf.len() as u64,
            Self::Write { buf, .. } => buf.len() as u64,
            Self::Discard { len, .. } => *len,
        }
    }

    /// Whether the request covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Page index range of `offset..offset + len` within `store`.
///
/// Requests are validated against the capacity before the store is fetched,
/// and a reset plus resize in between can leave that check stale.
fn page_range(store: &Store, offset: u64, len: u64) -> Result<Range<usize>> {
    let pages = store.table.len();
    let first = usize::try_from(offset / PAGE_SIZE_U64).ok();
    let count = usize::try_from(len / PAGE_SIZE_U64).ok();
    match first.zip(count).and_then(|(first, count)| Some(first..first.checked_add(count)?)) {
        Some(range) if range.end <= pages => Ok(range),
        _ => Err(Error::InvalidRequest(format!(
            "range {offset}+{len} exceeds {pages} initialized pages"
        ))),
    }
}

impl Device {
    /// Check that `offset..offset + len` is page aligned and in range.
    ///
    /// Pure: does not touch the `invalid_io` counter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] describing the violation.
    pub fn validate(&self, offset: u64, len: u64) -> Result<()> {
        if offset % PAGE_SIZE_U64 != 0 {
            return Err(Error::InvalidRequest(format!("offset {offset} is not page aligned")));
        }
        if len % PAGE_SIZE_U64 != 0 {
            return Err(Error::InvalidRequest(format!(
                "length {len} is not a multiple of {PAGE_SIZE}"
            )));
        }
        let capacity = self.capacity();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(Error::InvalidRequest(format!(
                "range {offset}+{len} exceeds capacity {capacity}"
            ))),
        }
    }

    /// Validate and execute a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for rejected requests, or the error
    /// that failed the first bad page. Pages before it in the same request
    /// stay written.
    pub fn submit(&self, request: IoRequest<'_>) -> Result<()> {
        if let Err(e) = self.validate(request.offset(), request.len()) {
            self.stats.inc_invalid_io();
            tracing::warn!(
                device = self.id(),
                op = ?request.operation(),
                error = %e,
                "rejected request"
            );
            return Err(e);
        }

        match request {
            IoRequest::Read { offset, buf } => self.read_pages(offset, buf),
            IoRequest::Write { offset, buf } => self.write_pages(offset, buf),
            IoRequest::Discard { offset, len } => self.discard_pages(offset, len),
        }
    }

    /// Read `buf.len()` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.submit(IoRequest::Read { offset, buf })
    }

    /// Write `buf` at `offset`, initializing the device if needed.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        self.submit(IoRequest::Write { offset, buf })
    }

    /// Discard `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for rejected ranges.
    pub fn discard(&self, offset: u64, len: u64) -> Result<()> {
        self.submit(IoRequest::Discard { offset, len })
    }

    /// Free one page whose contents the caller no longer needs.
    ///
    /// Ignored for out-of-range indices and uninitialized devices.
    pub fn slot_free_notify(&self, index: usize) {
        let Some(store) = self.store() else {
            return;
        };
        if index >= store.table.len() {
            return;
        }
        store.table.free_page(index, store.allocator.as_ref(), &self.stats);
        self.stats.inc_notify_free();
    }

    fn store_range(&self, store: &Store, offset: u64, len: u64) -> Result<Range<usize>> {
        page_range(store, offset, len).map_err(|e| {
            self.stats.inc_invalid_io();
            tracing::warn!(device = self.id(), error = %e, "request outlived its capacity check");
            e
        })
    }

    fn read_pages(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let Some(store) = self.store() else {
            tracing::debug!(device = self.id(), offset, "read from uninitialized device");
            zero_fill(buf);
            self.stats.inc_reads();
            return Ok(());
        };

        let pages = self.store_range(&store, offset, buf.len() as u64)?;
        for (index, page) in pages.zip(buf.chunks_exact_mut(PAGE_SIZE)) {
            if let Err(e) = store.read_page(index, page) {
                self.stats.inc_failed_reads();
                tracing::error!(device = self.id(), index, error = %e, "decompression failed");
                return Err(e);
            }
        }
        self.stats.inc_reads();
        Ok(())
    }

    fn write_pages(&self, offset: u64, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            self.stats.inc_writes();
            return Ok(());
        }

        let store = self.initialized_store().map_err(|e| {
            self.stats.inc_failed_writes();
            e
        })?;

        let pages = self.store_range(&store, offset, buf.len() as u64)?;
        for (index, page) in pages.zip(buf.chunks_exact(PAGE_SIZE)) {
            if let Err(e) = store.write_page(index, page, &self.stats) {
                self.stats.inc_failed_writes();
                tracing::warn!(device = self.id(), index, error = %e, "write failed");
                return Err(e);
            }
        }
        self.stats.inc_writes();
        Ok(())
    }

    fn discard_pages(&self, offset: u64, len: u64) -> Result<()> {
        if let Some(store) = self.store() {
            for index in self.store_range(&store, offset, len)? {
                store.table.free_page(index, store.allocator.as_ref(), &self.stats);
            }
        }
        self.stats.inc_discard();
        Ok(())
    }
}

impl Store {
    fn read_page(&self, index: usize, page: &mut [u8]) -> Result<()> {
        self.table.with_slot(index, |slot| match &slot.backing {
            None => {
                if slot.flags.is_empty() {
                    tracing::debug!(device = self.device, index, "read before write");
                }
                zero_fill(page);
                Ok(())
            }
            Some(Backing::Raw(raw)) => {
                page.copy_from_slice(raw);
                Ok(())
            }
            Some(Backing::Object(location)) => {
                let mut result = Err(Error::Codec(format!("object {location} missing")));
                self.allocator.read(*location, &mut |src| {
                    result = self.codec.decompress(src, page).and_then(expect_full_page);
                });
                result
            }
        })
    }

    fn write_page(&self, index: usize, page: &[u8], stats: &Stats) -> Result<()> {
        let mut io = self.io.lock();
        self.table.free_page(index, self.allocator.as_ref(), stats);

        if is_zero_page(page) {
            tracing::debug!(device = self.device, index, "zero page");
            self.table.store_zero(index, stats);
            return Ok(());
        }

        let size = self.codec.compress(page, &mut io.scratch)?;
        if size > self.max_compressed_size {
            let raw = alloc_raw_page(page)?;
            self.table.store_raw(index, raw, stats);
        } else {
            let location = self.allocator.allocate(size)?;
            self.allocator.write(location, &io.scratch[..size]);
            self.table.store_object(index, location, size, stats);
        }
        Ok(())
    }
}
