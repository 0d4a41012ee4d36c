//! Device state and lifecycle.
//!
//! A [`Device`] starts unconfigured. Its backing store (slot table, arena,
//! codec and scratch buffer) is built lazily by the first write, or by an
//! explicit [`Device::ensure_initialized`], and torn down by
//! [`Device::reset`]. Initialization and reset are serialized by the device's
//! state lock, which is distinct from both the write path's I/O lock and the
//! stats lock.

use crate::alloc::{ArenaAllocator, SlotAllocator};
use crate::codec::{Algorithm, Codec, ZstdCodec};
use crate::size::{page_align_down, page_align_up};
use crate::stats::{Stats, StatsSnapshot};
use crate::table::SlotTable;
use crate::{Error, Result, PAGE_SIZE, PAGE_SIZE_U64, SCRATCH_SIZE};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

/// Default compressed-size threshold: pages that compress to more than three
/// quarters of a page are stored raw.
pub const DEFAULT_MAX_COMPRESSED_SIZE: usize = PAGE_SIZE / 4 * 3;

/// Default disk size as a percentage of total memory.
pub const DEFAULT_DISKSIZE_PERCENT: u32 = 25;

/// Device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Disk size in bytes; 0 derives it from total memory at initialization.
    pub disksize: u64,
    /// Largest compressed size stored as an object; larger pages are kept raw.
    pub max_compressed_size: usize,
    /// Compression algorithm.
    pub algorithm: Algorithm,
    /// Optional cap on arena memory in bytes.
    pub mem_limit: Option<u64>,
    /// Percentage of total memory used when `disksize` is 0.
    pub default_disksize_percent: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            disksize: 0,
            max_compressed_size: DEFAULT_MAX_COMPRESSED_SIZE,
            algorithm: Algorithm::default(),
            mem_limit: None,
            default_disksize_percent: DEFAULT_DISKSIZE_PERCENT,
        }
    }
}

impl DeviceConfig {
    /// Check every field for a usable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.max_compressed_size == 0 || self.max_compressed_size >= PAGE_SIZE {
            return Err(Error::InvalidInput(format!(
                "max_compressed_size must be in 1..{PAGE_SIZE}, got {}",
                self.max_compressed_size
            )));
        }
        if self.default_disksize_percent == 0 || self.default_disksize_percent > 100 {
            return Err(Error::InvalidInput(format!(
                "default_disksize_percent must be in 1..=100, got {}",
                self.default_disksize_percent
            )));
        }
        if let Algorithm::Zstd { level } = self.algorithm {
            ZstdCodec::check_level(level)?;
        }
        Ok(())
    }
}

/// Codec and allocator a store is built with.
pub struct Backends {
    /// Page codec.
    pub codec: Box<dyn Codec>,
    /// Allocator for compressed objects.
    pub allocator: Box<dyn SlotAllocator>,
}

impl Backends {
    /// The configured algorithm and an arena capped at `mem_limit`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the codec cannot be built.
    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        let allocator: Box<dyn SlotAllocator> = match config.mem_limit {
            Some(limit) => Box::new(ArenaAllocator::with_limit(limit)),
            None => Box::new(ArenaAllocator::new()),
        };
        Ok(Self { codec: config.algorithm.build()?, allocator })
    }
}

/// Builds fresh [`Backends`] every time a device initializes.
pub type BackendFactory = Box<dyn Fn(&DeviceConfig) -> Result<Backends> + Send + Sync>;

/// Resources built at initialization and dropped at reset.
pub(crate) struct Store {
    pub(crate) device: u32,
    pub(crate) table: SlotTable,
    pub(crate) allocator: Box<dyn SlotAllocator>,
    pub(crate) codec: Box<dyn Codec>,
    /// The I/O scope: serializes use of the scratch buffer on the write path.
    pub(crate) io: Mutex<IoScope>,
    pub(crate) max_compressed_size: usize,
}

pub(crate) struct IoScope {
    pub(crate) scratch: Box<[u8]>,
}

struct DeviceState {
    disksize: u64,
    store: Option<Arc<Store>>,
}

/// One compressed block device.
pub struct Device {
    id: u32,
    config: DeviceConfig,
    total_memory: u64,
    state: RwLock<DeviceState>,
    backends: BackendFactory,
    pub(crate) stats: Stats,
}

impl Device {
    /// Create an unconfigured device.
    ///
    /// `total_memory` is the system memory size used to derive the default
    /// disk size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the configuration is invalid or the
    /// disk size overflows when rounded up to a page.
    pub fn new(id: u32, config: DeviceConfig, total_memory: u64) -> Result<Self> {
        Self::with_backends(id, config, total_memory, Box::new(Backends::from_config))
    }

    /// Create an unconfigured device whose codec and allocator come from
    /// `backends` instead of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the configuration is invalid or the
    /// disk size overflows when rounded up to a page.
    pub fn with_backends(
        id: u32,
        config: DeviceConfig,
        total_memory: u64,
        backends: BackendFactory,
    ) -> Result<Self> {
        config.validate()?;
        let disksize = aligned_disksize(config.disksize)?;
        Ok(Self {
            id,
            config,
            total_memory,
            state: RwLock::new(DeviceState { disksize, store: None }),
            backends,
            stats: Stats::new(),
        })
    }

    /// Device id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Device name, `compcacheN`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("compcache{}", self.id)
    }

    /// Configuration the device was created with.
    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Whether the backing store has been built.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.read().store.is_some()
    }

    /// Explicitly set disk size, or 0 if unset.
    #[must_use]
    pub fn disksize(&self) -> u64 {
        self.state.read().disksize
    }

    /// Disk size derived from total memory.
    #[must_use]
    pub fn default_disksize(&self) -> u64 {
        let percent = u64::from(self.config.default_disksize_percent);
        page_align_down(self.total_memory.saturating_mul(percent) / 100)
    }

    /// Addressable size in bytes: the set disk size, or the default.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        match self.disksize() {
            0 => self.default_disksize(),
            size => size,
        }
    }

    /// Set disk size, rounded up to a page boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] once the device is initialized; reset first.
    /// Returns [`Error::InvalidInput`] if `bytes` overflows when rounded up.
    pub fn set_disksize(&self, bytes: u64) -> Result<()> {
        let disksize = aligned_disksize(bytes)?;
        let mut state = self.state.write();
        if state.store.is_some() {
            return Err(Error::Busy(format!(
                "{} is initialized; reset before changing disksize",
                self.name()
            )));
        }
        state.disksize = disksize;
        tracing::debug!(device = self.id, disksize = state.disksize, "disksize set");
        Ok(())
    }

    pub(crate) fn store(&self) -> Option<Arc<Store>> {
        self.state.read().store.clone()
    }

    /// Build the backing store if it does not exist yet.
    ///
    /// Safe to call from many threads; exactly one builds the store. On
    /// failure nothing is kept and the device stays unconfigured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if any part of the store cannot be
    /// allocated, or [`Error::InvalidInput`] for a zero-sized device.
    pub fn ensure_initialized(&self) -> Result<()> {
        self.initialized_store().map(|_| ())
    }

    pub(crate) fn initialized_store(&self) -> Result<Arc<Store>> {
        if let Some(store) = self.store() {
            return Ok(store);
        }

        let mut state = self.state.write();
        if let Some(store) = &state.store {
            return Ok(Arc::clone(store));
        }

        if state.disksize == 0 {
            state.disksize = self.default_disksize();
        }
        match self.build_store(state.disksize) {
            Ok(store) => {
                let store = Arc::new(store);
                state.store = Some(Arc::clone(&store));
                tracing::info!(
                    device = self.id,
                    disksize = state.disksize,
                    pages = store.table.len(),
                    algorithm = %self.config.algorithm,
                    "device initialized"
                );
                Ok(store)
            }
            Err(e) => {
                state.disksize = 0;
                tracing::warn!(device = self.id, error = %e, "device initialization failed");
                Err(e)
            }
        }
    }

    fn build_store(&self, disksize: u64) -> Result<Store> {
        if disksize == 0 {
            return Err(Error::InvalidInput(format!("{} has zero disksize", self.name())));
        }
        let num_pages = usize::try_from(disksize / PAGE_SIZE_U64)
            .map_err(|_| Error::OutOfMemory(format!("disksize {disksize} too large")))?;

        let table = SlotTable::new(num_pages)?;
        let Backends { codec, allocator } = (self.backends)(&self.config)?;

        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(SCRATCH_SIZE)
            .map_err(|e| Error::OutOfMemory(format!("scratch buffer: {e}")))?;
        scratch.resize(SCRATCH_SIZE, 0);

        Ok(Store {
            device: self.id,
            table,
            allocator,
            codec,
            io: Mutex::new(IoScope { scratch: scratch.into_boxed_slice() }),
            max_compressed_size: self.config.max_compressed_size,
        })
    }

    /// Free every page, drop the backing store, zero the stats and unset the
    /// disk size.
    ///
    /// Callers must quiesce I/O first; requests still running against the old
    /// store finish against it and are then discarded.
    pub fn reset(&self) {
        let mut state = self.state.write();
        if let Some(store) = state.store.take() {
            for index in 0..store.table.len() {
                store.table.free_page(index, store.allocator.as_ref(), &self.stats);
            }
        }
        self.stats.reset();
        state.disksize = 0;
        tracing::info!(device = self.id, "device reset");
    }

    /// Snapshot of the device counters, with memory usage filled in.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.stats.snapshot();
        if let Some(store) = self.store() {
            snapshot.mem_used_total =
                store.allocator.usage().reserved_bytes + snapshot.pages_expand * PAGE_SIZE_U64;
        }
        snapshot
    }
}

fn aligned_disksize(bytes: u64) -> Result<u64> {
    page_align_up(bytes)
        .ok_or_else(|| Error::InvalidInput(format!("disksize {bytes} overflows page alignment")))
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("disksize", &self.disksize())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
