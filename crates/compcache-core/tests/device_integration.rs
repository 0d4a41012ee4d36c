//! Integration tests for device I/O, lifecycle and concurrency.

use compcache_core::{
    Device, DeviceConfig, Error, IoRequest, Registry, RegistryConfig, StatsSnapshot, PAGE_SIZE,
    PAGE_SIZE_U64,
};

fn device(pages: u64) -> Device {
    let config = DeviceConfig { disksize: pages * PAGE_SIZE_U64, ..Default::default() };
    Device::new(0, config, 1 << 30).expect("valid config")
}

/// Deterministic high-entropy page.
fn noise_page(seed: u64) -> Vec<u8> {
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
    (0..PAGE_SIZE)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}

fn text_page(tag: usize) -> Vec<u8> {
    format!("page {tag}: the quick brown fox jumps over the lazy dog. ")
        .repeat(PAGE_SIZE / 16)
        .into_bytes()[..PAGE_SIZE]
        .to_vec()
}

fn offset(index: u64) -> u64 {
    index * PAGE_SIZE_U64
}

#[test]
fn test_four_page_scenario() {
    let dev = device(4);

    dev.write(offset(0), &[0u8; PAGE_SIZE]).unwrap();
    assert_eq!(dev.stats().pages_zero, 1);

    dev.write(offset(1), &[b'A'; PAGE_SIZE]).unwrap();
    let snap = dev.stats();
    assert_eq!(snap.pages_stored, 1);
    assert_eq!(snap.good_compress, 1);

    dev.write(offset(2), &noise_page(2)).unwrap();
    assert_eq!(dev.stats().pages_expand, 1);

    dev.discard(offset(1), PAGE_SIZE_U64).unwrap();
    let snap = dev.stats();
    assert_eq!(snap.pages_stored, 0);
    assert_eq!(snap.good_compress, 0);
    assert_eq!(snap.compr_data_size, 0);

    let mut out = vec![0xEEu8; PAGE_SIZE];
    dev.read(offset(0), &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 0));

    out.fill(0xEE);
    dev.read(offset(3), &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 0));

    dev.read(offset(2), &mut out).unwrap();
    assert_eq!(out, noise_page(2));

    let snap = dev.stats();
    assert_eq!(snap.num_writes, 3);
    assert_eq!(snap.num_reads, 3);
    assert_eq!(snap.discard, 1);
    assert_eq!(snap.orig_data_size(), 2 * PAGE_SIZE_U64);
}

#[test]
fn test_roundtrip_all_page_kinds() {
    let dev = device(8);
    let pages = [vec![0u8; PAGE_SIZE], vec![0x41; PAGE_SIZE], text_page(7), noise_page(11)];
    for (i, page) in pages.iter().enumerate() {
        dev.write(offset(i as u64), page).unwrap();
    }
    for (i, page) in pages.iter().enumerate() {
        let mut out = vec![0u8; PAGE_SIZE];
        dev.read(offset(i as u64), &mut out).unwrap();
        assert_eq!(&out, page, "page {i}");
    }
}

#[test]
fn test_submit_dispatches_requests() {
    let dev = device(4);
    let page = text_page(1);
    dev.submit(IoRequest::Write { offset: 0, buf: &page }).unwrap();

    let mut out = vec![0u8; PAGE_SIZE];
    dev.submit(IoRequest::Read { offset: 0, buf: &mut out }).unwrap();
    assert_eq!(out, page);

    dev.submit(IoRequest::Discard { offset: 0, len: PAGE_SIZE_U64 }).unwrap();
    dev.submit(IoRequest::Read { offset: 0, buf: &mut out }).unwrap();
    assert!(out.iter().all(|&b| b == 0));
}

#[test]
fn test_invalid_requests_mutate_nothing() {
    let dev = device(4);
    dev.write(0, &text_page(0)).unwrap();
    let before = dev.stats();

    let page = text_page(1);
    let mut out = vec![0u8; PAGE_SIZE];
    let attempts: Vec<Error> = vec![
        dev.write(1, &page).unwrap_err(),
        dev.write(0, &page[..PAGE_SIZE - 1]).unwrap_err(),
        dev.write(offset(4), &page).unwrap_err(),
        dev.read(offset(3) + 8, &mut out).unwrap_err(),
        dev.discard(offset(2), 3 * PAGE_SIZE_U64).unwrap_err(),
    ];
    assert!(attempts.iter().all(|e| matches!(e, Error::InvalidRequest(_))));

    let after = dev.stats();
    assert_eq!(after.invalid_io, 5);
    assert_eq!(StatsSnapshot { invalid_io: 0, ..after }, before);

    dev.read(0, &mut out).unwrap();
    assert_eq!(out, text_page(0));
}

#[test]
fn test_overwrite_does_not_leak() {
    let dev = device(2);
    for round in 0..200 {
        let page = match round % 3 {
            0 => text_page(round),
            1 => noise_page(round as u64),
            _ => vec![0u8; PAGE_SIZE],
        };
        dev.write(0, &page).unwrap();
    }
    dev.write(0, &[b'Z'; PAGE_SIZE]).unwrap();

    let snap = dev.stats();
    assert_eq!(snap.pages_stored, 1);
    assert_eq!(snap.pages_zero, 0);
    assert_eq!(snap.pages_expand, 0);
    assert_eq!(snap.mem_used_total, compcache_core::alloc::ARENA_CHUNK_SIZE as u64);

    dev.discard(0, PAGE_SIZE_U64).unwrap();
    let snap = dev.stats();
    assert_eq!(snap.compr_data_size, 0);
    assert_eq!(snap.mem_used_total, 0);
}

#[test]
fn test_reset_zeroes_everything() {
    let dev = device(16);
    for i in 0..16 {
        let page = if i % 2 == 0 { text_page(i) } else { noise_page(i as u64) };
        dev.write(offset(i as u64), &page).unwrap();
    }
    dev.reset();
    assert_eq!(dev.stats(), StatsSnapshot::default());
    assert!(!dev.is_initialized());

    dev.set_disksize(16 * PAGE_SIZE_U64).unwrap();
    let mut out = vec![0xAAu8; 16 * PAGE_SIZE];
    dev.read(0, &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 0));

    dev.write(0, &text_page(3)).unwrap();
    let mut out = vec![0u8; PAGE_SIZE];
    dev.read(0, &mut out).unwrap();
    assert_eq!(out, text_page(3));
}

#[test]
fn test_partial_write_failure_keeps_earlier_pages() {
    let config = DeviceConfig {
        disksize: 4 * PAGE_SIZE_U64,
        mem_limit: Some(0),
        ..Default::default()
    };
    let dev = Device::new(0, config, 1 << 30).unwrap();

    let mut buf = vec![0u8; 3 * PAGE_SIZE];
    buf[PAGE_SIZE..2 * PAGE_SIZE].copy_from_slice(&noise_page(4));
    buf[2 * PAGE_SIZE..].copy_from_slice(&text_page(4));
    let err = dev.write(0, &buf).unwrap_err();
    assert!(matches!(err, Error::OutOfMemory(_)));

    let snap = dev.stats();
    assert_eq!(snap.pages_zero, 1);
    assert_eq!(snap.pages_expand, 1);
    assert_eq!(snap.pages_stored, 0);
    assert_eq!(snap.failed_writes, 1);
    assert_eq!(snap.num_writes, 0);

    let mut out = vec![0xFFu8; 3 * PAGE_SIZE];
    dev.read(0, &mut out).unwrap();
    assert_eq!(&out[..2 * PAGE_SIZE], &buf[..2 * PAGE_SIZE]);
    assert!(out[2 * PAGE_SIZE..].iter().all(|&b| b == 0));
}

#[test]
fn test_concurrent_writers_distinct_pages() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 32;
    let dev = device(THREADS * PER_THREAD);

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let dev = &dev;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let index = t * PER_THREAD + i;
                    let page = if index % 4 == 3 { noise_page(index) } else { text_page(index as usize) };
                    dev.write(offset(index), &page).unwrap();
                }
            });
        }
    });

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let dev = &dev;
            s.spawn(move || {
                let mut out = vec![0u8; PAGE_SIZE];
                for i in 0..PER_THREAD {
                    let index = t * PER_THREAD + i;
                    let expected =
                        if index % 4 == 3 { noise_page(index) } else { text_page(index as usize) };
                    dev.read(offset(index), &mut out).unwrap();
                    assert_eq!(out, expected, "page {index}");
                }
            });
        }
    });

    let snap = dev.stats();
    assert_eq!(snap.num_writes, THREADS * PER_THREAD);
    assert_eq!(snap.pages_expand, THREADS * PER_THREAD / 4);
    assert_eq!(snap.pages_stored, THREADS * PER_THREAD * 3 / 4);
}

#[test]
fn test_concurrent_overwrites_same_page() {
    let dev = device(1);
    let candidates: Vec<Vec<u8>> =
        vec![text_page(1), noise_page(1), vec![0u8; PAGE_SIZE], vec![b'q'; PAGE_SIZE]];

    std::thread::scope(|s| {
        for t in 0..4 {
            let dev = &dev;
            let candidates = &candidates;
            s.spawn(move || {
                for round in 0..100 {
                    dev.write(0, &candidates[(t + round) % candidates.len()]).unwrap();
                }
            });
        }
        s.spawn(|| {
            let mut out = vec![0u8; PAGE_SIZE];
            for _ in 0..200 {
                dev.read(0, &mut out).unwrap();
            }
        });
    });

    let snap = dev.stats();
    assert_eq!(snap.pages_zero + snap.pages_stored + snap.pages_expand, 1);

    let mut out = vec![0u8; PAGE_SIZE];
    dev.read(0, &mut out).unwrap();
    assert!(candidates.contains(&out));
}

#[test]
fn test_concurrent_lazy_init_and_writes() {
    let dev = device(64);
    std::thread::scope(|s| {
        for t in 0..8u64 {
            let dev = &dev;
            s.spawn(move || dev.write(offset(t), &text_page(t as usize)).unwrap());
        }
    });
    assert!(dev.is_initialized());
    assert_eq!(dev.stats().pages_stored, 8);
}

#[test]
fn test_registry_devices() {
    let registry = Registry::new(RegistryConfig {
        num_devices: 3,
        device: DeviceConfig { disksize: 1 << 20, ..Default::default() },
        total_memory: Some(1 << 30),
    })
    .unwrap();

    for device in registry.iter() {
        device.write(0, &text_page(device.id() as usize)).unwrap();
    }
    let mut out = vec![0u8; PAGE_SIZE];
    registry.get(2).unwrap().read(0, &mut out).unwrap();
    assert_eq!(out, text_page(2));
    assert!(matches!(registry.get(3), Err(Error::NoDevice(3))));
}

#[test]
fn test_zstd_device_roundtrip() {
    let config = DeviceConfig {
        disksize: 4 * PAGE_SIZE_U64,
        algorithm: "zstd:5".parse().unwrap(),
        ..Default::default()
    };
    let dev = Device::new(0, config, 1 << 30).unwrap();
    dev.write(0, &text_page(9)).unwrap();
    dev.write(offset(1), &noise_page(9)).unwrap();

    let mut out = vec![0u8; 2 * PAGE_SIZE];
    dev.read(0, &mut out).unwrap();
    assert_eq!(&out[..PAGE_SIZE], &text_page(9)[..]);
    assert_eq!(&out[PAGE_SIZE..], &noise_page(9)[..]);

    let snap = dev.stats();
    assert_eq!(snap.pages_stored, 1);
    assert_eq!(snap.pages_expand, 1);
}
