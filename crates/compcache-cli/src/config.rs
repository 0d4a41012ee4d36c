//! Configuration file parsing.
//!
//! ```toml
//! total_memory = "16G"
//!
//! [[devices]]
//! disksize = "1G"
//! algorithm = "zstd:3"
//! mem_limit = "256M"
//! ```

use anyhow::{Context, Result};
use compcache_core::size::parse_size;
use compcache_core::{
    Algorithm, DeviceConfig, Registry, DEFAULT_DISKSIZE_PERCENT, DEFAULT_MAX_COMPRESSED_SIZE,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Disk size with optional suffix (K, M, G, T, ram/N); unset derives it
    /// from total memory.
    #[serde(default)]
    pub disksize: Option<String>,

    /// Compression algorithm.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Largest compressed size stored as an object.
    #[serde(default = "default_max_compressed_size")]
    pub max_compressed_size: usize,

    /// Optional arena memory cap.
    #[serde(default)]
    pub mem_limit: Option<String>,

    /// Percentage of total memory used when `disksize` is unset.
    #[serde(default = "default_disksize_percent")]
    pub default_disksize_percent: u32,
}

fn default_algorithm() -> String {
    "lz4".to_string()
}

fn default_max_compressed_size() -> usize {
    DEFAULT_MAX_COMPRESSED_SIZE
}

fn default_disksize_percent() -> u32 {
    DEFAULT_DISKSIZE_PERCENT
}

impl Default for DeviceEntry {
    fn default() -> Self {
        Self {
            disksize: None,
            algorithm: default_algorithm(),
            max_compressed_size: default_max_compressed_size(),
            mem_limit: None,
            default_disksize_percent: default_disksize_percent(),
        }
    }
}

impl DeviceEntry {
    /// Resolve size strings and the algorithm name.
    pub fn to_device_config(&self) -> Result<DeviceConfig> {
        let disksize = self
            .disksize
            .as_deref()
            .map(parse_size)
            .transpose()
            .context("invalid disksize")?
            .unwrap_or(0);
        let mem_limit = self
            .mem_limit
            .as_deref()
            .map(parse_size)
            .transpose()
            .context("invalid mem_limit")?;
        let algorithm: Algorithm = self.algorithm.parse()?;
        Ok(DeviceConfig {
            disksize,
            max_compressed_size: self.max_compressed_size,
            algorithm,
            mem_limit,
            default_disksize_percent: self.default_disksize_percent,
        })
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Total memory override; detected from `/proc/meminfo` when unset.
    #[serde(default)]
    pub total_memory: Option<String>,

    /// Devices to create, in id order.
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceEntry>,
}

fn default_devices() -> Vec<DeviceEntry> {
    vec![DeviceEntry::default()]
}

impl Default for Config {
    fn default() -> Self {
        Self { total_memory: None, devices: default_devices() }
    }
}

impl Config {
    /// Create the registry described by this configuration.
    pub fn build_registry(&self) -> Result<Registry> {
        let total_memory = self
            .total_memory
            .as_deref()
            .map(parse_size)
            .transpose()
            .context("invalid total_memory")?;
        let configs = self
            .devices
            .iter()
            .enumerate()
            .map(|(id, entry)| {
                entry.to_device_config().with_context(|| format!("device {id}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Registry::with_devices(configs, total_memory)?)
    }
}

/// Standard configuration locations, searched in order.
const CONFIG_PATHS: [&str; 2] = ["/etc/compcache.toml", "/usr/lib/compcache.toml"];

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

/// Load configuration from `path`, or from standard locations.
///
/// Falls back to the default configuration when no explicit path is given
/// and no standard file exists.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return parse_config(&content).with_context(|| format!("failed to parse {}", path.display()));
    }

    for path_str in CONFIG_PATHS {
        let path = Path::new(path_str);
        if path.is_file() {
            tracing::debug!(path = path_str, "loading configuration");
            let content = std::fs::read_to_string(path)?;
            return parse_config(&content).with_context(|| format!("failed to parse {path_str}"));
        }
    }

    Ok(Config::default())
}
