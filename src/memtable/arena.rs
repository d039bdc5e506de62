//! Bump allocator backing memtable entries (component F's arena).
//!
//! Entries are never freed individually; the whole arena is released when
//! the owning [`super::MemTable`] is dropped. Rather than reach for a
//! separate arena crate, this leans on `bytes::BytesMut`'s own split
//! semantics: each chunk is grown in place and sliced off as an
//! immutable, reference-counted [`Bytes`] the moment an entry is written,
//! so concurrent readers hold views into the same backing allocation
//! without copying.

use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

/// Chunks are allocated in units of this size; an entry larger than one
/// chunk gets its own oversized chunk.
const BLOCK_SIZE: usize = 4096;

/// A monotonic bump allocator. Entries allocated from it stay valid for
/// as long as the `Arena` (or any `Bytes` handed out by it) is alive.
pub struct Arena {
    current: Mutex<BytesMut>,
    memory_usage: AtomicUsize,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(BytesMut::new()),
            memory_usage: AtomicUsize::new(0),
        }
    }

    /// Copies `bytes` into the arena and returns an owning, non-owning-of-
    /// the-arena handle to it (an independent refcount on the chunk).
    pub fn allocate(&self, bytes: &[u8]) -> Bytes {
        let mut current = self.current.lock();
        if current.capacity() - current.len() < bytes.len() {
            let chunk_size = bytes.len().max(BLOCK_SIZE);
            *current = BytesMut::with_capacity(chunk_size);
            self.memory_usage.fetch_add(chunk_size, Ordering::Relaxed);
        }
        current.extend_from_slice(bytes);
        current.split().freeze()
    }

    /// Total bytes ever reserved across all chunks (this is the arena's
    /// footprint, not the sum of live entry lengths, mirroring the
    /// source's `ApproximateMemoryUsage`).
    pub fn memory_usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
