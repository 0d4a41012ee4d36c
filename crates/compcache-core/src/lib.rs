//! Compressed in-memory block store.
//!
//! A [`Device`] presents a fixed-size, page-addressed block device whose pages
//! are kept compressed in RAM. All-zero pages are recorded as a flag, pages
//! that compress well are stored as variable-size objects in an arena, and
//! pages that do not are kept verbatim.
//!
//! # Example
//!
//! ```
//! use compcache_core::{Device, DeviceConfig, PAGE_SIZE};
//!
//! let config = DeviceConfig { disksize: 1 << 20, ..Default::default() };
//! let device = Device::new(0, config, 1 << 30).unwrap();
//!
//! let page = [b'A'; PAGE_SIZE];
//! device.write(0, &page).unwrap();
//!
//! let mut out = [0u8; PAGE_SIZE];
//! device.read(0, &mut out).unwrap();
//! assert_eq!(page, out);
//!
//! let stats = device.stats();
//! assert_eq!(stats.pages_stored, 1);
//! ```

#![deny(missing_docs)]
#![deny(clippy::panic)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alloc;
pub mod codec;
mod device;
mod error;
mod io;
mod page;
pub mod registry;
pub mod size;
mod stats;
pub mod table;

pub use codec::{Algorithm, Codec};
pub use device::{
    BackendFactory, Backends, Device, DeviceConfig, DEFAULT_DISKSIZE_PERCENT,
    DEFAULT_MAX_COMPRESSED_SIZE,
};
pub use error::{Error, Result};
pub use io::{IoRequest, Operation};
pub use page::{is_zero_page, zero_fill, GOOD_COMPRESS_SIZE, PAGE_SIZE, PAGE_SIZE_U64, SCRATCH_SIZE};
pub use registry::{Registry, RegistryConfig, MAX_NUM_DEVICES};
pub use stats::{Stats, StatsSnapshot};
pub use table::{PageFlags, SlotTable};
