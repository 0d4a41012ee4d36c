//! # compcache
//!
//! Compressed in-memory block store: a page-addressed block device whose
//! pages are held compressed in RAM.
//!
//! This is the workspace root crate that re-exports core functionality.
//! For direct usage, depend on individual sub-crates:
//!
//! - [`compcache-core`] - Store engine (slot table, codecs, arena, devices)
//! - [`compcache-cli`] - CLI tool (`compcache` binary)
//!
//! [`compcache-core`]: compcache_core
//! [`compcache-cli`]: https://docs.rs/compcache-cli

pub use compcache_core::*;
