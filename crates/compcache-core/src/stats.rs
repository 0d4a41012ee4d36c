//! Device statistics.
//!
//! Wide 64-bit counters, including the running total of compressed bytes, are
//! kept together under their own lock, independent from the I/O path's lock.
//! Per-page counters are plain atomics updated without mutual exclusion.

use crate::{GOOD_COMPRESS_SIZE, PAGE_SIZE_U64};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default, Clone, Copy)]
struct WideCounters {
    num_reads: u64,
    num_writes: u64,
    failed_reads: u64,
    failed_writes: u64,
    invalid_io: u64,
    discard: u64,
    notify_free: u64,
    compr_data_size: u64,
}

/// Live counters for one device.
#[derive(Debug, Default)]
pub struct Stats {
    wide: Mutex<WideCounters>,
    pages_zero: AtomicU32,
    pages_stored: AtomicU32,
    pages_expand: AtomicU32,
    good_compress: AtomicU32,
}

impl Stats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, f: impl FnOnce(&mut WideCounters)) {
        f(&mut self.wide.lock());
    }

    pub(crate) fn inc_reads(&self) {
        self.bump(|w| w.num_reads += 1);
    }

    pub(crate) fn inc_writes(&self) {
        self.bump(|w| w.num_writes += 1);
    }

    pub(crate) fn inc_failed_reads(&self) {
        self.bump(|w| w.failed_reads += 1);
    }

    pub(crate) fn inc_failed_writes(&self) {
        self.bump(|w| w.failed_writes += 1);
    }

    pub(crate) fn inc_invalid_io(&self) {
        self.bump(|w| w.invalid_io += 1);
    }

    pub(crate) fn inc_discard(&self) {
        self.bump(|w| w.discard += 1);
    }

    pub(crate) fn inc_notify_free(&self) {
        self.bump(|w| w.notify_free += 1);
    }

    pub(crate) fn add_compressed(&self, size: usize) {
        self.bump(|w| w.compr_data_size += size as u64);
    }

    pub(crate) fn sub_compressed(&self, size: usize) {
        self.bump(|w| {
            debug_assert!(w.compr_data_size >= size as u64);
            w.compr_data_size = w.compr_data_size.saturating_sub(size as u64);
        });
    }

    pub(crate) fn inc_zero(&self) {
        self.pages_zero.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dec_zero(&self) {
        self.pages_zero.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_expand(&self) {
        self.pages_expand.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dec_expand(&self) {
        self.pages_expand.fetch_sub(1, Ordering::Relaxed);
    }

    /// Account a newly stored compressed object of `size` bytes.
    pub(crate) fn record_stored(&self, size: usize) {
        self.add_compressed(size);
        self.pages_stored.fetch_add(1, Ordering::Relaxed);
        if size <= GOOD_COMPRESS_SIZE {
            self.good_compress.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Reverse of [`record_stored`](Self::record_stored).
    pub(crate) fn record_freed(&self, size: usize) {
        self.sub_compressed(size);
        self.pages_stored.fetch_sub(1, Ordering::Relaxed);
        if size <= GOOD_COMPRESS_SIZE {
            self.good_compress.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        *self.wide.lock() = WideCounters::default();
        self.pages_zero.store(0, Ordering::Relaxed);
        self.pages_stored.store(0, Ordering::Relaxed);
        self.pages_expand.store(0, Ordering::Relaxed);
        self.good_compress.store(0, Ordering::Relaxed);
    }

    /// Take a read-only snapshot.
    ///
    /// `mem_used_total` is left at zero; the owning device fills it in from
    /// its allocator.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let wide = *self.wide.lock();
        StatsSnapshot {
            num_reads: wide.num_reads,
            num_writes: wide.num_writes,
            failed_reads: wide.failed_reads,
            failed_writes: wide.failed_writes,
            invalid_io: wide.invalid_io,
            discard: wide.discard,
            notify_free: wide.notify_free,
            compr_data_size: wide.compr_data_size,
            pages_zero: u64::from(self.pages_zero.load(Ordering::Relaxed)),
            pages_stored: u64::from(self.pages_stored.load(Ordering::Relaxed)),
            pages_expand: u64::from(self.pages_expand.load(Ordering::Relaxed)),
            good_compress: u64::from(self.good_compress.load(Ordering::Relaxed)),
            mem_used_total: 0,
        }
    }
}

/// Read-only copy of a device's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successful read requests.
    pub num_reads: u64,
    /// Successful write requests.
    pub num_writes: u64,
    /// Read requests failed by a decompression error.
    pub failed_reads: u64,
    /// Write requests failed by allocation or compression errors.
    pub failed_writes: u64,
    /// Requests rejected by validation.
    pub invalid_io: u64,
    /// Discard requests.
    pub discard: u64,
    /// Slot free notifications.
    pub notify_free: u64,
    /// Pages recorded as all zero.
    pub pages_zero: u64,
    /// Pages held as compressed objects.
    pub pages_stored: u64,
    /// Pages held uncompressed because they did not compress enough.
    pub pages_expand: u64,
    /// Stored pages that compressed to half a page or less.
    pub good_compress: u64,
    /// Total size of compressed objects in bytes.
    pub compr_data_size: u64,
    /// Memory held for page data: arena chunks plus uncompressed pages.
    pub mem_used_total: u64,
}

impl StatsSnapshot {
    /// Uncompressed size of all data held by the device.
    #[must_use]
    pub fn orig_data_size(&self) -> u64 {
        (self.pages_zero + self.pages_stored + self.pages_expand) * PAGE_SIZE_U64
    }

    /// Bytes of page data actually held: compressed objects plus raw pages.
    #[must_use]
    pub fn stored_data_size(&self) -> u64 {
        self.compr_data_size + self.pages_expand * PAGE_SIZE_U64
    }

    /// Ratio of original to stored size; 0.0 when nothing is stored.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        let stored = self.stored_data_size();
        if stored == 0 {
            0.0
        } else {
            self.orig_data_size() as f64 / stored as f64
        }
    }

    /// Percentage of good compressions among stored pages.
    #[must_use]
    pub fn good_compress_percent(&self) -> f64 {
        if self.pages_stored == 0 {
            0.0
        } else {
            self.good_compress as f64 * 100.0 / self.pages_stored as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reads, {} writes ({} failed), {} zero / {} stored / {} expanded pages, \
             {}B compressed ({:.2}x)",
            self.num_reads,
            self.num_writes,
            self.failed_reads + self.failed_writes,
            self.pages_zero,
            self.pages_stored,
            self.pages_expand,
            self.compr_data_size,
            self.compression_ratio()
        )
    }
}
