//! Pluggable page codecs.
//!
//! A device picks one [`Algorithm`] at initialization and holds the resulting
//! [`Codec`] for its whole lifetime. The store engine only needs the two
//! operations below; everything about the compressed format belongs to the
//! codec.

mod lz4;
mod zstd;

pub use self::lz4::Lz4Codec;
pub use self::zstd::ZstdCodec;

use crate::{Error, Result, PAGE_SIZE};
use std::fmt;
use std::str::FromStr;

/// Default Zstandard compression level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Trait for page codec implementations.
pub trait Codec: Send + Sync {
    /// Compress one page into `dst`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if the codec fails or `dst` is too small.
    fn compress(&self, page: &[u8], dst: &mut [u8]) -> Result<usize>;

    /// Decompress `src` into `page`, returning the number of bytes produced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if `src` is corrupted or does not fit in `page`.
    fn decompress(&self, src: &[u8], page: &mut [u8]) -> Result<usize>;

    /// The algorithm this codec implements.
    fn algorithm(&self) -> Algorithm;
}

/// Compression algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// LZ4 fast compression.
    #[default]
    Lz4,
    /// Zstandard with configurable level.
    Zstd {
        /// Compression level (1-22).
        level: i32,
    },
}

impl Algorithm {
    /// Build the codec for this algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the Zstandard level is out of range.
    pub fn build(self) -> Result<Box<dyn Codec>> {
        match self {
            Self::Lz4 => Ok(Box::new(Lz4Codec::new())),
            Self::Zstd { level } => Ok(Box::new(ZstdCodec::new(level)?)),
        }
    }

    /// Short name as accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Lz4 => "lz4",
            Self::Zstd { .. } => "zstd",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lz4 => write!(f, "lz4"),
            Self::Zstd { level } => write!(f, "zstd{level}"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Parse `lz4`, `zstd` (default level) or `zstdN` / `zstd:N`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "lz4" {
            return Ok(Self::Lz4);
        }
        let Some(rest) = s.strip_prefix("zstd") else {
            return Err(Error::InvalidInput(format!("unknown algorithm: {s}")));
        };
        let rest = rest.strip_prefix(':').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::Zstd { level: DEFAULT_ZSTD_LEVEL });
        }
        let level = rest
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid zstd level: {rest}")))?;
        ZstdCodec::check_level(level)?;
        Ok(Self::Zstd { level })
    }
}

/// Verify a decompressed length covers exactly one page.
pub(crate) fn expect_full_page(len: usize) -> Result<()> {
    if len == PAGE_SIZE {
        Ok(())
    } else {
        Err(Error::Codec(format!(
            "decompressed size mismatch: expected {PAGE_SIZE}, got {len}"
        )))
    }
}
