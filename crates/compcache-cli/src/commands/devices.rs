//! Devices command: show the resolved configuration of every device.

use crate::output::OutputFormat;
use anyhow::Result;
use clap::Args;
use compcache_core::size::format_size;
use compcache_core::{Device, Registry};
use serde::Serialize;

/// Arguments for devices command.
#[derive(Args)]
pub struct DevicesArgs {
    /// Specific device to show (omit for all devices).
    #[arg(short, long)]
    pub device: Option<u32>,
}

/// Serializable device description for JSON output.
#[derive(Debug, Serialize)]
struct DeviceOutput {
    device: u32,
    name: String,
    disksize: u64,
    algorithm: String,
    max_compressed_size: usize,
    mem_limit: Option<u64>,
    initialized: bool,
}

impl From<&Device> for DeviceOutput {
    fn from(dev: &Device) -> Self {
        let config = dev.config();
        Self {
            device: dev.id(),
            name: dev.name(),
            disksize: dev.capacity(),
            algorithm: config.algorithm.to_string(),
            max_compressed_size: config.max_compressed_size,
            mem_limit: config.mem_limit,
            initialized: dev.is_initialized(),
        }
    }
}

/// Show device configuration.
pub fn devices(args: &DevicesArgs, registry: &Registry, format: OutputFormat) -> Result<()> {
    let outputs: Vec<DeviceOutput> = match args.device {
        Some(id) => vec![DeviceOutput::from(registry.get(id)?.as_ref())],
        None => registry.iter().map(|dev| DeviceOutput::from(dev.as_ref())).collect(),
    };

    match format {
        OutputFormat::Table => print_table(&outputs),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outputs)?),
        OutputFormat::Raw => {
            for d in &outputs {
                println!(
                    "{} {} {} {} {}",
                    d.device,
                    d.disksize,
                    d.algorithm,
                    d.max_compressed_size,
                    d.mem_limit.unwrap_or(0)
                );
            }
        }
    }
    Ok(())
}

fn print_table(outputs: &[DeviceOutput]) {
    println!(
        "{:<12} {:>10} {:>8} {:>8} {:>10}",
        "NAME", "DISKSIZE", "ALGO", "MAXCOMP", "MEMLIMIT"
    );
    for d in outputs {
        println!(
            "{:<12} {:>10} {:>8} {:>8} {:>10}",
            d.name,
            format_size(d.disksize),
            d.algorithm,
            d.max_compressed_size,
            d.mem_limit.map_or_else(|| "-".to_string(), format_size)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compcache_core::{DeviceConfig, RegistryConfig};

    fn registry() -> Registry {
        Registry::new(RegistryConfig {
            num_devices: 2,
            device: DeviceConfig { disksize: 1 << 20, mem_limit: Some(1 << 16), ..Default::default() },
            total_memory: Some(1 << 30),
        })
        .unwrap()
    }

    #[test]
    fn test_device_output() {
        let registry = registry();
        let out = DeviceOutput::from(registry.get(1).unwrap().as_ref());
        assert_eq!(out.device, 1);
        assert_eq!(out.name, "compcache1");
        assert_eq!(out.disksize, 1 << 20);
        assert_eq!(out.algorithm, "lz4");
        assert_eq!(out.mem_limit, Some(1 << 16));
        assert!(!out.initialized);
    }

    #[test]
    fn test_devices_all_formats() {
        let registry = registry();
        let args = DevicesArgs { device: None };
        for format in [OutputFormat::Table, OutputFormat::Json, OutputFormat::Raw] {
            devices(&args, &registry, format).unwrap();
        }
    }

    #[test]
    fn test_devices_unknown_id() {
        let registry = registry();
        let args = DevicesArgs { device: Some(9) };
        assert!(devices(&args, &registry, OutputFormat::Table).is_err());
    }
}
