//! Zstandard codec.

use super::{Algorithm, Codec};
use crate::{Error, Result};

/// Zstandard codec using single-shot bulk compression.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// Create a codec at the given compression level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `level` is outside 1-22.
    pub fn new(level: i32) -> Result<Self> {
        Self::check_level(level)?;
        Ok(Self { level })
    }

    /// Compression level in use.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }

    pub(crate) fn check_level(level: i32) -> Result<()> {
        if (1..=22).contains(&level) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!("zstd level must be 1-22, got {level}")))
        }
    }
}

impl Codec for ZstdCodec {
    fn compress(&self, page: &[u8], dst: &mut [u8]) -> Result<usize> {
        ::zstd::bulk::compress_to_buffer(page, dst, self.level)
            .map_err(|e| Error::Codec(format!("zstd compression failed: {e}")))
    }

    fn decompress(&self, src: &[u8], page: &mut [u8]) -> Result<usize> {
        ::zstd::bulk::decompress_to_buffer(src, page)
            .map_err(|e| Error::Codec(format!("zstd decompression failed: {e}")))
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Zstd { level: self.level }
    }
}
