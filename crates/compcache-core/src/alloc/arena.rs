//! Size-class arena allocator.
//!
//! Objects are rounded up to a power-of-two size class between
//! [`MIN_OBJECT_CLASS`] and one page. Each class carves fixed-size slots out of
//! [`ARENA_CHUNK_SIZE`] chunks and keeps a free list of vacant slots. A chunk
//! whose last object is freed goes back to the system.

use super::{AllocatorUsage, Location, SlotAllocator};
use crate::{Error, Result, PAGE_SIZE};
use parking_lot::RwLock;

/// Size of each backing chunk.
pub const ARENA_CHUNK_SIZE: usize = 4 * PAGE_SIZE;

/// Smallest size class in bytes.
pub const MIN_OBJECT_CLASS: usize = 32;

const NUM_CLASSES: usize = (PAGE_SIZE / MIN_OBJECT_CLASS).trailing_zeros() as usize + 1;

#[inline]
fn class_index(size: usize) -> usize {
    (size.max(MIN_OBJECT_CLASS).next_power_of_two().trailing_zeros()
        - MIN_OBJECT_CLASS.trailing_zeros()) as usize
}

#[inline]
fn class_size(class: usize) -> usize {
    MIN_OBJECT_CLASS << class
}

struct Chunk {
    class: usize,
    data: Box<[u8]>,
    /// Stored object length per slot; 0 marks a vacant slot.
    lens: Box<[u16]>,
    live: u32,
}

impl Chunk {
    fn slot_of(&self, location: Location) -> Option<usize> {
        let size = class_size(self.class);
        let offset = location.offset() as usize;
        let slot = offset / size;
        (offset % size == 0 && slot < self.lens.len()).then_some(slot)
    }
}

#[derive(Default)]
struct ArenaInner {
    chunks: Vec<Option<Chunk>>,
    vacant: Vec<u32>,
    free_slots: [Vec<Location>; NUM_CLASSES],
    live_chunks: usize,
    objects: u64,
    object_bytes: u64,
}

impl ArenaInner {
    fn chunk(&self, location: Location) -> Option<&Chunk> {
        self.chunks.get(location.chunk() as usize)?.as_ref()
    }

    fn grow(&mut self, class: usize, max_chunks: Option<usize>) -> Result<Location> {
        if max_chunks.is_some_and(|max| self.live_chunks >= max) {
            return Err(Error::OutOfMemory(format!(
                "arena limit of {} chunks reached",
                self.live_chunks
            )));
        }

        let mut data = Vec::new();
        data.try_reserve_exact(ARENA_CHUNK_SIZE)
            .map_err(|e| Error::OutOfMemory(format!("arena chunk allocation failed: {e}")))?;
        data.resize(ARENA_CHUNK_SIZE, 0);

        let size = class_size(class);
        let slots = ARENA_CHUNK_SIZE / size;
        let chunk = Chunk {
            class,
            data: data.into_boxed_slice(),
            lens: vec![0; slots].into_boxed_slice(),
            live: 0,
        };

        let index = if let Some(index) = self.vacant.pop() {
            self.chunks[index as usize] = Some(chunk);
            index
        } else {
            let index = u32::try_from(self.chunks.len())
                .map_err(|_| Error::OutOfMemory("arena chunk index overflow".to_string()))?;
            self.chunks.push(Some(chunk));
            index
        };
        self.live_chunks += 1;

        // Slot 0 is handed out now; the rest pop in ascending offset order.
        for slot in (1..slots).rev() {
            self.free_slots[class].push(Location::new(index, (slot * size) as u32));
        }
        Ok(Location::new(index, 0))
    }

    fn release_chunk(&mut self, index: u32, class: usize) {
        self.chunks[index as usize] = None;
        self.vacant.push(index);
        self.live_chunks -= 1;
        self.free_slots[class].retain(|loc| loc.chunk() != index);
    }
}

/// Arena allocator with power-of-two size classes.
pub struct ArenaAllocator {
    inner: RwLock<ArenaInner>,
    max_chunks: Option<usize>,
}

impl Default for ArenaAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaAllocator {
    /// Create an unbounded arena.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: RwLock::new(ArenaInner::default()), max_chunks: None }
    }

    /// Create an arena that reserves at most `limit` bytes of chunks.
    #[must_use]
    pub fn with_limit(limit: u64) -> Self {
        let max_chunks = usize::try_from(limit / ARENA_CHUNK_SIZE as u64).unwrap_or(usize::MAX);
        Self { inner: RwLock::new(ArenaInner::default()), max_chunks: Some(max_chunks) }
    }

    /// Size class an object of `size` bytes is rounded up to.
    #[must_use]
    pub fn class_for(size: usize) -> usize {
        class_size(class_index(size))
    }
}

impl SlotAllocator for ArenaAllocator {
    fn allocate(&self, size: usize) -> Result<Location> {
        if size == 0 || size > PAGE_SIZE {
            return Err(Error::InvalidInput(format!(
                "object size must be 1-{PAGE_SIZE} bytes, got {size}"
            )));
        }
        let class = class_index(size);

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let location = match inner.free_slots[class].pop() {
            Some(location) => location,
            None => inner.grow(class, self.max_chunks)?,
        };

        let chunk = inner.chunks[location.chunk() as usize]
            .as_mut()
            .ok_or_else(|| Error::OutOfMemory(format!("free list points at released chunk {location}")))?;
        let slot = location.offset() as usize / class_size(class);
        chunk.lens[slot] = size as u16;
        chunk.live += 1;
        inner.objects += 1;
        inner.object_bytes += size as u64;
        Ok(location)
    }

    fn free(&self, location: Location) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let Some(chunk) = inner.chunks.get_mut(location.chunk() as usize).and_then(Option::as_mut)
        else {
            tracing::warn!(%location, "free of unknown arena chunk");
            return;
        };
        let Some(slot) = chunk.slot_of(location) else {
            tracing::warn!(%location, "free of misaligned arena location");
            return;
        };
        let len = chunk.lens[slot];
        if len == 0 {
            tracing::warn!(%location, "double free of arena object ignored");
            return;
        }

        chunk.lens[slot] = 0;
        chunk.live -= 1;
        let class = chunk.class;
        let now_empty = chunk.live == 0;
        inner.objects -= 1;
        inner.object_bytes -= u64::from(len);

        if now_empty {
            inner.release_chunk(location.chunk(), class);
        } else {
            inner.free_slots[class].push(location);
        }
    }

    fn size_of(&self, location: Location) -> usize {
        let inner = self.inner.read();
        inner
            .chunk(location)
            .and_then(|chunk| chunk.slot_of(location).map(|slot| chunk.lens[slot] as usize))
            .unwrap_or(0)
    }

    fn write(&self, location: Location, data: &[u8]) {
        let mut inner = self.inner.write();
        let Some(chunk) = inner.chunks.get_mut(location.chunk() as usize).and_then(Option::as_mut)
        else {
            tracing::warn!(%location, "write to unknown arena chunk");
            return;
        };
        let Some(slot) = chunk.slot_of(location) else {
            return;
        };
        debug_assert!(data.len() <= chunk.lens[slot] as usize);
        let len = data.len().min(chunk.lens[slot] as usize);
        let start = location.offset() as usize;
        chunk.data[start..start + len].copy_from_slice(&data[..len]);
    }

    fn read(&self, location: Location, f: &mut dyn FnMut(&[u8])) {
        let inner = self.inner.read();
        let Some(chunk) = inner.chunk(location) else {
            f(&[]);
            return;
        };
        match chunk.slot_of(location) {
            Some(slot) => {
                let start = location.offset() as usize;
                f(&chunk.data[start..start + chunk.lens[slot] as usize]);
            }
            None => f(&[]),
        }
    }

    fn usage(&self) -> AllocatorUsage {
        let inner = self.inner.read();
        AllocatorUsage {
            objects: inner.objects,
            object_bytes: inner.object_bytes,
            reserved_bytes: (inner.live_chunks * ARENA_CHUNK_SIZE) as u64,
        }
    }
}
