//! Output formatting for CLI.

use clap::ValueEnum;
use compcache_core::size::format_size;
use compcache_core::StatsSnapshot;
use serde::Serialize;

/// Output format selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output.
    Json,
    /// Raw values (for scripting).
    Raw,
}

/// Serializable device counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOutput {
    pub num_reads: u64,
    pub num_writes: u64,
    pub failed_reads: u64,
    pub failed_writes: u64,
    pub invalid_io: u64,
    pub discard: u64,
    pub notify_free: u64,
    pub pages_zero: u64,
    pub pages_stored: u64,
    pub pages_expand: u64,
    pub good_compress: u64,
    pub orig_data_size: u64,
    pub compr_data_size: u64,
    pub mem_used_total: u64,
    pub ratio: f64,
}

impl From<&StatsSnapshot> for StatsOutput {
    fn from(s: &StatsSnapshot) -> Self {
        Self {
            num_reads: s.num_reads,
            num_writes: s.num_writes,
            failed_reads: s.failed_reads,
            failed_writes: s.failed_writes,
            invalid_io: s.invalid_io,
            discard: s.discard,
            notify_free: s.notify_free,
            pages_zero: s.pages_zero,
            pages_stored: s.pages_stored,
            pages_expand: s.pages_expand,
            good_compress: s.good_compress,
            orig_data_size: s.orig_data_size(),
            compr_data_size: s.compr_data_size,
            mem_used_total: s.mem_used_total,
            ratio: s.compression_ratio(),
        }
    }
}

impl StatsOutput {
    /// Print as an aligned two-column table.
    pub fn print_table(&self) {
        let rows = [
            ("reads", self.num_reads.to_string()),
            ("writes", self.num_writes.to_string()),
            ("failed reads", self.failed_reads.to_string()),
            ("failed writes", self.failed_writes.to_string()),
            ("invalid io", self.invalid_io.to_string()),
            ("discards", self.discard.to_string()),
            ("notify free", self.notify_free.to_string()),
            ("zero pages", self.pages_zero.to_string()),
            ("stored pages", self.pages_stored.to_string()),
            ("expanded pages", self.pages_expand.to_string()),
            ("good compress", self.good_compress.to_string()),
            ("orig data", format_size(self.orig_data_size)),
            ("compr data", format_size(self.compr_data_size)),
            ("mem used", format_size(self.mem_used_total)),
            ("ratio", format!("{:.2}x", self.ratio)),
        ];
        for (name, value) in rows {
            println!("{name:<16} {value:>12}");
        }
    }

    /// Print as one line of space-separated values.
    pub fn print_raw(&self) {
        println!(
            "{} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            self.num_reads,
            self.num_writes,
            self.failed_reads,
            self.failed_writes,
            self.invalid_io,
            self.discard,
            self.notify_free,
            self.pages_zero,
            self.pages_stored,
            self.pages_expand,
            self.good_compress,
            self.orig_data_size,
            self.compr_data_size,
            self.mem_used_total
        );
    }
}
