//! LZ4 block codec.

use super::{Algorithm, Codec};
use crate::{Error, Result};

/// LZ4 block-format codec backed by `lz4_flex`.
///
/// Pages are stored as raw blocks without a size prefix; the decompressed
/// length is always one page.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Codec;

impl Lz4Codec {
    /// Create a new LZ4 codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for Lz4Codec {
    fn compress(&self, page: &[u8], dst: &mut [u8]) -> Result<usize> {
        let bound = lz4_flex::block::get_maximum_output_size(page.len());
        if dst.len() < bound {
            return Err(Error::Codec(format!(
                "lz4 output buffer too small: need {bound} bytes, have {}",
                dst.len()
            )));
        }
        lz4_flex::block::compress_into(page, dst)
            .map_err(|e| Error::Codec(format!("lz4 compression failed: {e}")))
    }

    fn decompress(&self, src: &[u8], page: &mut [u8]) -> Result<usize> {
        lz4_flex::block::decompress_into(src, page)
            .map_err(|e| Error::Codec(format!("lz4 decompression failed: {e}")))
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Lz4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PAGE_SIZE, SCRATCH_SIZE};

    #[test]
    fn test_scratch_covers_worst_case() {
        assert!(lz4_flex::block::get_maximum_output_size(PAGE_SIZE) <= SCRATCH_SIZE);
    }

    #[test]
    fn test_small_output_buffer_rejected() {
        let codec = Lz4Codec::new();
        let page = [7u8; PAGE_SIZE];
        let mut dst = [0u8; 16];
        let err = codec.compress(&page, &mut dst).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn test_truncated_input_fails() {
        let codec = Lz4Codec::new();
        let page: Vec<u8> = (0..PAGE_SIZE).map(|i| (i % 251) as u8).collect();
        let mut dst = vec![0u8; SCRATCH_SIZE];
        let clen = codec.compress(&page, &mut dst).unwrap();
        let mut out = vec![0u8; PAGE_SIZE];
        let result = codec.decompress(&dst[..clen / 2], &mut out);
        assert!(result.map_or(true, |len| len != PAGE_SIZE));
    }
}
