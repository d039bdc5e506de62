//! Table cache (component K): a bounded pool of already-opened
//! [`SSTableReader`]s keyed by file number.
//!
//! The table-build driver warms this cache right after finishing a file
//! so the first read against a brand-new table doesn't pay to re-open
//! and re-parse its footer and index block. Eviction and opening are the
//! only two concerns here; deciding *which* tables to keep resident
//! across reads, compaction, or a version change is out of scope.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::sstable::SSTableReader;

struct Inner {
    capacity: usize,
    entries: HashMap<u64, Arc<SSTableReader>>,
    /// Recency order, oldest first. A file number may appear once; a hit
    /// moves it to the back.
    recency: Vec<u64>,
}

impl Inner {
    fn touch(&mut self, file_number: u64) {
        if let Some(pos) = self.recency.iter().position(|&n| n == file_number) {
            self.recency.remove(pos);
        }
        self.recency.push(file_number);
    }

    fn evict_if_needed(&mut self) {
        while self.entries.len() > self.capacity && !self.recency.is_empty() {
            let oldest = self.recency.remove(0);
            self.entries.remove(&oldest);
            log::debug!("table cache evicted file {}", oldest);
        }
    }
}

/// A bounded, file-number-keyed cache of opened table readers.
///
/// Cloning shares the underlying cache: every clone sees the same
/// entries and contends on the same lock.
#[derive(Clone)]
pub struct TableCache {
    inner: Arc<Mutex<Inner>>,
}

impl TableCache {
    /// Creates an empty cache holding at most `capacity` open tables.
    /// A capacity of zero disables caching: every lookup opens fresh.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity,
                entries: HashMap::new(),
                recency: Vec::new(),
            })),
        }
    }

    /// Returns the reader for `file_number`, opening `path` on a miss and
    /// inserting the result (subject to eviction).
    pub fn get_or_open<P: AsRef<Path>>(&self, file_number: u64, path: P) -> Result<Arc<SSTableReader>> {
        {
            let mut inner = self.inner.lock();
            if let Some(reader) = inner.entries.get(&file_number).cloned() {
                inner.touch(file_number);
                return Ok(reader);
            }
        }

        let reader = Arc::new(SSTableReader::open(path)?);
        self.insert(file_number, Arc::clone(&reader));
        Ok(reader)
    }

    /// Inserts an already-open reader, as the table-build driver does
    /// right after finishing a new file.
    pub fn insert(&self, file_number: u64, reader: Arc<SSTableReader>) {
        let mut inner = self.inner.lock();
        inner.entries.insert(file_number, reader);
        inner.touch(file_number);
        inner.evict_if_needed();
    }

    /// Drops a specific file from the cache, e.g. after it is deleted by
    /// a higher-level caller.
    pub fn evict(&self, file_number: u64) {
        let mut inner = self.inner.lock();
        inner.entries.remove(&file_number);
        if let Some(pos) = inner.recency.iter().position(|&n| n == file_number) {
            inner.recency.remove(pos);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
