//! CLI command implementations.

mod bench;
mod devices;

pub use bench::{bench, BenchArgs};
pub use devices::{devices, DevicesArgs};
