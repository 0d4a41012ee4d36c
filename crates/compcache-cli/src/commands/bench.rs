//! Bench command: drive a synthetic workload through a device.
//!
//! Pages are written and read back in parallel batches, each batch one
//! multi-page request, then compared against the source data.

use crate::output::{OutputFormat, StatsOutput};
use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use compcache_core::{Device, Registry, PAGE_SIZE, PAGE_SIZE_U64};
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Data pattern for generated pages.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// All-zero pages.
    Zero,
    /// Repeating text.
    Text,
    /// Pseudo-random bytes.
    Random,
    /// Rotating mix of zero, random, sequential and text pages.
    #[default]
    Mixed,
}

/// Arguments for bench command.
#[derive(Args)]
pub struct BenchArgs {
    /// Device to run against.
    #[arg(short, long, default_value = "0")]
    pub device: u32,

    /// Number of pages to write.
    #[arg(short, long, default_value = "10000")]
    pub pages: usize,

    /// Data pattern.
    #[arg(short = 'P', long, value_enum, default_value_t = Pattern::Mixed)]
    pub pattern: Pattern,

    /// Worker threads (defaults to the number of CPUs).
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Pages per request.
    #[arg(short, long, default_value = "16")]
    pub batch: usize,

    /// Skip read-back verification.
    #[arg(long)]
    pub no_verify: bool,

    /// Discard all written pages at the end.
    #[arg(long)]
    pub discard: bool,
}

/// Serializable benchmark report.
#[derive(Debug, Serialize)]
struct BenchReport {
    device: u32,
    algorithm: String,
    pattern: Pattern,
    pages: usize,
    threads: usize,
    write_secs: f64,
    write_mbps: f64,
    read_secs: Option<f64>,
    read_mbps: Option<f64>,
    verified: bool,
    stats: StatsOutput,
}

/// Run the benchmark.
pub fn bench(args: &BenchArgs, registry: &Registry, format: OutputFormat) -> Result<()> {
    if args.pages == 0 || args.batch == 0 {
        bail!("pages and batch must be positive");
    }
    let device = registry.get(args.device)?;
    let total = args
        .pages
        .checked_mul(PAGE_SIZE)
        .and_then(|bytes| u64::try_from(bytes).ok())
        .with_context(|| format!("{} pages overflow the addressable byte range", args.pages))?;
    if total > device.capacity() {
        bail!(
            "{} pages exceed {} capacity of {} bytes",
            args.pages,
            device.name(),
            device.capacity()
        );
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = args.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build().context("failed to build thread pool")?;

    let data = generate_pages(args.pages, args.pattern);
    tracing::info!(device = args.device, pages = args.pages, pattern = ?args.pattern, "bench start");

    let write_time = pool.install(|| write_all(&device, &data, args.batch))?;

    let read_time = if args.no_verify {
        None
    } else {
        Some(pool.install(|| verify_all(&device, &data, args.batch))?)
    };

    if args.discard {
        device.discard(0, total)?;
    }

    let report = BenchReport {
        device: args.device,
        algorithm: device.config().algorithm.to_string(),
        pattern: args.pattern,
        pages: args.pages,
        threads: pool.current_num_threads(),
        write_secs: write_time.as_secs_f64(),
        write_mbps: throughput_mbps(total, write_time),
        read_secs: read_time.map(|t| t.as_secs_f64()),
        read_mbps: read_time.map(|t| throughput_mbps(total, t)),
        verified: read_time.is_some(),
        stats: StatsOutput::from(&device.stats()),
    };
    print_report(&report, format)
}

fn write_all(device: &Device, data: &[u8], batch: usize) -> Result<Duration> {
    let start = Instant::now();
    data.par_chunks(batch * PAGE_SIZE)
        .enumerate()
        .try_for_each(|(i, chunk)| device.write(batch_offset(i, batch), chunk))?;
    Ok(start.elapsed())
}

fn verify_all(device: &Device, data: &[u8], batch: usize) -> Result<Duration> {
    let start = Instant::now();
    let mismatches: usize = data
        .par_chunks(batch * PAGE_SIZE)
        .enumerate()
        .map(|(i, chunk)| -> Result<usize> {
            let mut out = vec![0u8; chunk.len()];
            device.read(batch_offset(i, batch), &mut out)?;
            Ok(out
                .chunks_exact(PAGE_SIZE)
                .zip(chunk.chunks_exact(PAGE_SIZE))
                .filter(|(got, want)| got != want)
                .count())
        })
        .sum::<Result<usize>>()?;
    let elapsed = start.elapsed();
    if mismatches > 0 {
        bail!("{mismatches} pages did not read back intact");
    }
    Ok(elapsed)
}

fn batch_offset(index: usize, batch: usize) -> u64 {
    (index * batch) as u64 * PAGE_SIZE_U64
}

fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs / 1e6
    } else {
        0.0
    }
}

fn print_report(report: &BenchReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Raw => {
            println!(
                "{} {} {:.6} {:.6}",
                report.pages,
                report.threads,
                report.write_secs,
                report.read_secs.unwrap_or(0.0)
            );
            report.stats.print_raw();
        }
        OutputFormat::Table => {
            println!("compcache bench");
            println!("===============");
            println!("Device:    compcache{} ({})", report.device, report.algorithm);
            println!("Pattern:   {:?}", report.pattern);
            println!("Pages:     {} on {} threads", report.pages, report.threads);
            println!("Write:     {:.2} MB/s", report.write_mbps);
            match report.read_mbps {
                Some(mbps) => println!("Read:      {mbps:.2} MB/s (verified)"),
                None => println!("Read:      skipped"),
            }
            println!();
            report.stats.print_table();
        }
    }
    Ok(())
}

fn generate_pages(count: usize, pattern: Pattern) -> Vec<u8> {
    let mut data = vec![0u8; count * PAGE_SIZE];
    let mut rng_state = 12345u64;
    let mut random_fill = |page: &mut [u8]| {
        for byte in page {
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *byte = (rng_state >> 33) as u8;
        }
    };
    let text_fill = |page: &mut [u8], text: &[u8]| {
        for (j, byte) in page.iter_mut().enumerate() {
            *byte = text[j % text.len()];
        }
    };

    for (i, page) in data.chunks_exact_mut(PAGE_SIZE).enumerate() {
        match pattern {
            Pattern::Zero => {}
            Pattern::Random => random_fill(page),
            Pattern::Text => text_fill(page, b"The quick brown fox jumps over the lazy dog. "),
            Pattern::Mixed => match i % 4 {
                0 => {}
                1 => random_fill(page),
                2 => {
                    for (j, byte) in page.iter_mut().enumerate() {
                        *byte = (j % 16) as u8;
                    }
                }
                _ => text_fill(page, b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. "),
            },
        }
    }
    data
}
