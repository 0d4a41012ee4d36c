//! Size strings and system memory detection.

use crate::{Error, Result, PAGE_SIZE_U64};

/// Parse size string (e.g., "4G", "512M", "ram/2") to bytes.
///
/// `ram/N` reads total memory from `/proc/meminfo`; use
/// [`parse_size_with_ram`] to supply it explicitly.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for malformed strings and
/// [`Error::IoError`] if `ram/N` is used and memory cannot be detected.
pub fn parse_size(size: &str) -> Result<u64> {
    parse_size_with(size, total_memory)
}

/// Parse size string, resolving `ram/N` against `total_ram` bytes.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for malformed strings.
pub fn parse_size_with_ram(size: &str, total_ram: u64) -> Result<u64> {
    parse_size_with(size, || Ok(total_ram))
}

fn parse_size_with(size: &str, total_ram: impl FnOnce() -> Result<u64>) -> Result<u64> {
    let size = size.trim().to_uppercase();

    if let Some(divisor) = size.strip_prefix("RAM/") {
        let divisor: u64 = divisor
            .parse()
            .ok()
            .filter(|&d| d > 0)
            .ok_or_else(|| Error::InvalidInput(format!("invalid RAM divisor: {divisor}")))?;
        return Ok(total_ram()? / divisor);
    }

    let (num_str, multiplier) = match size.chars().last() {
        Some('K') => (&size[..size.len() - 1], 1024u64),
        Some('M') => (&size[..size.len() - 1], 1024u64 * 1024),
        Some('G') => (&size[..size.len() - 1], 1024u64 * 1024 * 1024),
        Some('T') => (&size[..size.len() - 1], 1024u64 * 1024 * 1024 * 1024),
        _ => (size.as_str(), 1u64),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid size number: {num_str}")))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| Error::InvalidInput(format!("size overflows: {size}")))
}

/// Format bytes as human-readable string.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;

    if bytes >= GB {
        format!("{:.1}G", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}M", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}K", bytes as f64 / KB as f64)
    } else if bytes > 0 {
        format!("{bytes}B")
    } else {
        "0".to_string()
    }
}

/// Total system RAM in bytes, from `/proc/meminfo`.
///
/// # Errors
///
/// Returns [`Error::IoError`] if the file cannot be read and
/// [`Error::InvalidInput`] if it has no usable `MemTotal` line.
pub fn total_memory() -> Result<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo")
        .map_err(|e| Error::IoError(format!("failed to read /proc/meminfo: {e}")))?;
    parse_meminfo(&meminfo)
}

fn parse_meminfo(meminfo: &str) -> Result<u64> {
    let line = meminfo
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .ok_or_else(|| Error::InvalidInput("could not determine total RAM".to_string()))?;
    let kb: u64 = line
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::InvalidInput("invalid MemTotal value".to_string()))?;
    Ok(kb * 1024)
}

/// Round `bytes` up to a whole number of pages, or `None` if that overflows.
#[must_use]
pub const fn page_align_up(bytes: u64) -> Option<u64> {
    bytes.div_ceil(PAGE_SIZE_U64).checked_mul(PAGE_SIZE_U64)
}

/// Round `bytes` down to a whole number of pages.
#[must_use]
pub const fn page_align_down(bytes: u64) -> u64 {
    bytes - bytes % PAGE_SIZE_U64
}
