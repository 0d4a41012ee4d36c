//! Property tests: a device behaves like a plain array of pages.

use compcache_core::{
    is_zero_page, Algorithm, Device, DeviceConfig, DEFAULT_MAX_COMPRESSED_SIZE, PAGE_SIZE,
    PAGE_SIZE_U64, SCRATCH_SIZE,
};
use proptest::prelude::*;

const PAGES: usize = 8;

#[derive(Debug, Clone)]
enum Content {
    Zero,
    Fill(u8),
    Text(u16),
    Noise(u64),
}

impl Content {
    fn render(&self) -> Vec<u8> {
        match self {
            Self::Zero => vec![0; PAGE_SIZE],
            Self::Fill(b) => vec![*b; PAGE_SIZE],
            Self::Text(n) => format!("record {n} status=ok; ")
                .repeat(PAGE_SIZE / 8)
                .into_bytes()[..PAGE_SIZE]
                .to_vec(),
            Self::Noise(seed) => {
                let mut state = *seed | 1;
                (0..PAGE_SIZE)
                    .map(|_| {
                        state ^= state << 13;
                        state ^= state >> 7;
                        state ^= state << 17;
                        (state >> 24) as u8
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Write(usize, Content),
    Read(usize),
    Discard(usize, usize),
    Notify(usize),
}

fn content() -> impl Strategy<Value = Content> {
    prop_oneof![
        Just(Content::Zero),
        any::<u8>().prop_map(Content::Fill),
        any::<u16>().prop_map(Content::Text),
        any::<u64>().prop_map(Content::Noise),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..PAGES, content()).prop_map(|(i, c)| Op::Write(i, c)),
        3 => (0..PAGES).prop_map(Op::Read),
        1 => (0..PAGES, 1..=3usize).prop_map(|(i, n)| Op::Discard(i, n)),
        1 => (0..PAGES).prop_map(Op::Notify),
    ]
}

/// Expected compressed size of a page, or None if it is not stored as an
/// object.
fn object_size(page: &[u8]) -> Option<usize> {
    if is_zero_page(page) {
        return None;
    }
    let codec = Algorithm::Lz4.build().unwrap();
    let mut scratch = vec![0u8; SCRATCH_SIZE];
    let size = codec.compress(page, &mut scratch).unwrap();
    (size <= DEFAULT_MAX_COMPRESSED_SIZE).then_some(size)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_device_matches_model(ops in prop::collection::vec(op(), 1..40)) {
        let config = DeviceConfig { disksize: PAGES as u64 * PAGE_SIZE_U64, ..Default::default() };
        let dev = Device::new(0, config, 1 << 30).unwrap();
        let mut model: Vec<Option<Vec<u8>>> = vec![None; PAGES];
        let mut out = vec![0u8; PAGE_SIZE];

        for op in ops {
            match op {
                Op::Write(i, c) => {
                    let page = c.render();
                    dev.write(i as u64 * PAGE_SIZE_U64, &page).unwrap();
                    model[i] = Some(page);
                }
                Op::Read(i) => {
                    dev.read(i as u64 * PAGE_SIZE_U64, &mut out).unwrap();
                    match &model[i] {
                        Some(page) => {
                            prop_assert_eq!(&out, page);
                        }
                        None => {
                            prop_assert!(out.iter().all(|&b| b == 0));
                        }
                    }
                }
                Op::Discard(i, n) => {
                    let n = n.min(PAGES - i);
                    dev.discard(i as u64 * PAGE_SIZE_U64, n as u64 * PAGE_SIZE_U64).unwrap();
                    model[i..i + n].fill(None);
                }
                Op::Notify(i) => {
                    dev.slot_free_notify(i);
                    if dev.is_initialized() {
                        model[i] = None;
                    }
                }
            }

            let snap = dev.stats();
            let held: Vec<&Vec<u8>> = model.iter().flatten().collect();
            let zero = held.iter().filter(|p| is_zero_page(p)).count() as u64;
            let sizes: Vec<usize> = held.iter().filter_map(|p| object_size(p)).collect();

            prop_assert_eq!(snap.pages_zero, zero);
            prop_assert_eq!(snap.pages_stored, sizes.len() as u64);
            prop_assert_eq!(snap.pages_expand, held.len() as u64 - zero - sizes.len() as u64);
            prop_assert_eq!(snap.compr_data_size, sizes.iter().sum::<usize>() as u64);
            prop_assert_eq!(
                snap.good_compress,
                sizes.iter().filter(|&&s| s <= PAGE_SIZE / 2).count() as u64
            );
        }
    }

    #[test]
    fn prop_misaligned_requests_rejected(offset in 1u64..PAGE_SIZE_U64, pages in 1usize..4) {
        let config = DeviceConfig { disksize: PAGES as u64 * PAGE_SIZE_U64, ..Default::default() };
        let dev = Device::new(0, config, 1 << 30).unwrap();
        let buf = vec![7u8; pages * PAGE_SIZE];

        prop_assert!(dev.write(offset, &buf).is_err());
        prop_assert!(dev.write(0, &buf[..buf.len() - 1]).is_err());
        prop_assert!(dev.discard(PAGES as u64 * PAGE_SIZE_U64, offset).is_err());

        let snap = dev.stats();
        prop_assert_eq!(snap.invalid_io, 3);
        prop_assert_eq!(snap.num_writes, 0);
        prop_assert!(!dev.is_initialized());
    }

    #[test]
    fn prop_free_is_idempotent(content in content(), repeats in 1usize..4) {
        let config = DeviceConfig { disksize: PAGE_SIZE_U64, ..Default::default() };
        let dev = Device::new(0, config, 1 << 30).unwrap();
        dev.write(0, &content.render()).unwrap();
        for _ in 0..repeats {
            dev.discard(0, PAGE_SIZE_U64).unwrap();
        }
        let snap = dev.stats();
        prop_assert_eq!(snap.pages_zero + snap.pages_stored + snap.pages_expand, 0);
        prop_assert_eq!(snap.compr_data_size, 0);
        prop_assert_eq!(snap.mem_used_total, 0);
        prop_assert_eq!(snap.discard, repeats as u64);
    }
}
