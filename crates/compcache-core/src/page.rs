//! Page constants and zero-page detection.
//!
//! Freshly zeroed memory is by far the most common page content handed to a
//! compressed RAM store. Recognizing it before compression lets the write path
//! record a flag instead of running the codec or touching the allocator.

/// Logical page size in bytes.
pub const PAGE_SIZE: usize = 4096;

/// [`PAGE_SIZE`] as a `u64`, for byte-offset arithmetic.
pub const PAGE_SIZE_U64: u64 = PAGE_SIZE as u64;

/// Size of the shared compression scratch buffer.
///
/// Codecs may emit more than one page for incompressible input, so the
/// staging area is two pages wide.
pub const SCRATCH_SIZE: usize = 2 * PAGE_SIZE;

/// Compressed objects at or below this size count as good compression.
pub const GOOD_COMPRESS_SIZE: usize = PAGE_SIZE / 2;

/// Check if a page consists entirely of zero bytes.
///
/// Compares eight bytes at a time, rejecting early on the first and last word
/// before scanning the rest.
#[must_use]
pub fn is_zero_page(page: &[u8]) -> bool {
    debug_assert_eq!(page.len(), PAGE_SIZE);

    let mut chunks = page.chunks_exact(8);
    let remainder = chunks.remainder();

    let word = |chunk: &[u8]| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(chunk);
        u64::from_ne_bytes(bytes)
    };

    if page.len() >= 16 {
        let last = page.len() - page.len() % 8 - 8;
        if word(&page[..8]) != 0 || word(&page[last..last + 8]) != 0 {
            return false;
        }
    }

    chunks.all(|chunk| word(chunk) == 0) && remainder.iter().all(|&b| b == 0)
}

/// Fill a page buffer with zeros.
#[inline]
pub fn zero_fill(page: &mut [u8]) {
    page.fill(0);
}
