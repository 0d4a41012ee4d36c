//! Device registry.
//!
//! The set of devices is fixed when the registry is built. Callers hold the
//! registry (or clones of the device handles it returns) and pass it where
//! it is needed.

use crate::device::{Device, DeviceConfig};
use crate::{size, Error, Result};
use std::sync::Arc;

/// Upper bound on devices per registry.
pub const MAX_NUM_DEVICES: u32 = 32;

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Number of devices to create.
    pub num_devices: u32,
    /// Configuration applied to every device.
    pub device: DeviceConfig,
    /// Total system memory in bytes; detected from `/proc/meminfo` when unset.
    pub total_memory: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { num_devices: 1, device: DeviceConfig::default(), total_memory: None }
    }
}

/// Fixed collection of devices indexed by id.
#[derive(Debug)]
pub struct Registry {
    devices: Vec<Arc<Device>>,
    total_memory: u64,
}

impl Registry {
    /// Create `num_devices` devices sharing one configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a device count outside
    /// `1..=MAX_NUM_DEVICES` or an invalid device configuration, and
    /// [`Error::IoError`] if total memory must be detected and cannot be.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let count = config.num_devices.min(MAX_NUM_DEVICES + 1) as usize;
        Self::with_devices(vec![config.device; count], config.total_memory)
    }

    /// Create one device per entry in `configs`; device ids follow their
    /// position.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_devices(configs: Vec<DeviceConfig>, total_memory: Option<u64>) -> Result<Self> {
        if configs.is_empty() || configs.len() > MAX_NUM_DEVICES as usize {
            return Err(Error::InvalidInput(format!(
                "number of devices must be in 1..={MAX_NUM_DEVICES}, got {}",
                configs.len()
            )));
        }
        let total_memory = match total_memory {
            Some(bytes) => bytes,
            None => size::total_memory()?,
        };

        let devices = configs
            .into_iter()
            .zip(0u32..)
            .map(|(config, id)| Device::new(id, config, total_memory).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            devices = devices.len(),
            total_memory = %size::format_size(total_memory),
            "registry created"
        );
        Ok(Self { devices, total_memory })
    }

    /// Look up a device by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDevice`] for unknown ids.
    pub fn get(&self, id: u32) -> Result<Arc<Device>> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.devices.get(i))
            .cloned()
            .ok_or(Error::NoDevice(id))
    }

    /// Number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Always false: a registry holds at least one device.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate over devices in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    /// Total memory the default disk sizes derive from.
    #[must_use]
    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }

    /// Reset every device.
    pub fn reset_all(&self) {
        for device in &self.devices {
            device.reset();
        }
    }
}
