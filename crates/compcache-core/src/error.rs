//! Error types for compcache-core.

use thiserror::Error;

/// Errors that can occur while servicing a request or configuring a device.
#[derive(Debug, Error)]
pub enum Error {
    /// Request is misaligned, not a whole number of pages, or out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Backing storage (arena or raw page) could not be allocated.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Compression or decompression failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Configuration value is invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation is not permitted in the device's current state.
    #[error("device busy: {0}")]
    Busy(String),

    /// No device with the given id exists in the registry.
    #[error("no such device: {0}")]
    NoDevice(u32),

    /// I/O error (reading system memory information).
    #[error("I/O error: {0}")]
    IoError(String),
}

impl Error {
    /// Whether retrying the same request later could succeed.
    ///
    /// Only allocation failures depend on transient memory pressure; every
    /// other error is a property of the request or the stored data.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OutOfMemory(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;
