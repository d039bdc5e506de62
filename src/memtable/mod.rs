//! Memtable (component F): an in-memory ordered multiset of internal-key
//! entries, arena-backed and served by a concurrent skip list.
//!
//! Entries are laid out exactly as stored: `varint(ikey_len) ||
//! internal_key || varint(value_len) || value`, allocated once from the
//! arena and never mutated again. The skip list orders these buffers by
//! their embedded internal key, not by their raw bytes.

mod arena;
mod internal_key;

pub use arena::Arena;
pub use internal_key::{
    append_internal_key, compare_internal_keys, extract_user_key, internal_key as encode_internal_key,
    lookup_key, pack_tag, split_internal_key, unpack_tag, ValueType, MAX_SEQUENCE_NUMBER,
};

use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::codec::{get_varint32, put_varint32};
use crate::comparator::{BytewiseComparator, Comparator};

/// An arena-allocated entry buffer, ordered by its embedded internal key.
///
/// `crossbeam_skiplist::SkipMap` orders keys via `Ord`, so the pluggable
/// [`Comparator`] only applies at construction time: every entry and every
/// lookup probe built against one `MemTable` must go through the same
/// comparator, which this type captures once at `MemTable::with_comparator`.
#[derive(Clone)]
struct EntryKey {
    data: Bytes,
    comparator: Arc<dyn Comparator>,
}

impl EntryKey {
    fn internal_key(&self) -> &[u8] {
        let (ikey_len, rest) = get_varint32(&self.data).expect("well-formed entry header");
        &rest[..ikey_len as usize]
    }

    fn value(&self) -> &[u8] {
        let (ikey_len, rest) = get_varint32(&self.data).expect("well-formed entry header");
        let rest = &rest[ikey_len as usize..];
        let (value_len, rest) = get_varint32(rest).expect("well-formed entry header");
        &rest[..value_len as usize]
    }
}

impl PartialEq for EntryKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for EntryKey {}
impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_internal_keys(self.comparator.as_ref(), self.internal_key(), other.internal_key())
    }
}

/// The outcome of a [`MemTable::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// The key was found with a live value.
    Found(Vec<u8>),
    /// The key was found but the newest visible version is a tombstone.
    Deleted,
    /// No visible version of the key exists in this memtable.
    NotFound,
}

/// An in-memory, arena-backed, multi-version ordered buffer of writes.
pub struct MemTable {
    comparator: Arc<dyn Comparator>,
    arena: Arena,
    table: SkipMap<EntryKey, ()>,
}

impl MemTable {
    /// Creates an empty memtable using the default bytewise comparator.
    pub fn new() -> Self {
        Self::with_comparator(Arc::new(BytewiseComparator))
    }

    /// Creates an empty memtable ordered by a custom comparator.
    pub fn with_comparator(comparator: Arc<dyn Comparator>) -> Self {
        Self { comparator, arena: Arena::new(), table: SkipMap::new() }
    }

    fn probe_key(&self, data: Bytes) -> EntryKey {
        EntryKey { data, comparator: Arc::clone(&self.comparator) }
    }

    /// Inserts `user_key -> value` tagged with `sequence`/`value_type`.
    /// Never fails: the arena grows on demand.
    pub fn add(&self, sequence: u64, value_type: ValueType, user_key: &[u8], value: &[u8]) {
        let ikey_len = user_key.len() + 8;
        let mut buf = Vec::with_capacity(
            crate::codec::varint_length(ikey_len as u64)
                + ikey_len
                + crate::codec::varint_length(value.len() as u64)
                + value.len(),
        );
        put_varint32(&mut buf, ikey_len as u32);
        append_internal_key(&mut buf, user_key, sequence, value_type);
        put_varint32(&mut buf, value.len() as u32);
        buf.extend_from_slice(value);

        let entry = self.arena.allocate(&buf);
        self.table.insert(self.probe_key(entry), ());
    }

    /// Looks up the newest version of `user_key` visible as of `sequence`.
    ///
    /// Sequence numbers on the matched entry are not re-checked past the
    /// seek: the lookup key's own sequence already bounds the search to the
    /// first entry whose internal key is `>=` it, and descending-sequence
    /// ordering guarantees that entry is the visible one.
    pub fn get(&self, user_key: &[u8], sequence: u64) -> LookupResult {
        let probe = self.probe_key(Bytes::from(lookup_key(user_key, sequence)));
        match self.table.range(probe..).next() {
            Some(found) => {
                let key = found.key();
                let (found_user_key, _, value_type) =
                    split_internal_key(key.internal_key()).expect("well-formed internal key");
                if found_user_key != user_key {
                    return LookupResult::NotFound;
                }
                match value_type {
                    ValueType::Put => LookupResult::Found(key.value().to_vec()),
                    ValueType::Delete => LookupResult::Deleted,
                }
            }
            None => LookupResult::NotFound,
        }
    }

    /// Iterates every live entry in ascending internal-key order, yielding
    /// `(internal_key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)> + '_ {
        self.table.iter().map(|entry| {
            let key = entry.key();
            (key.internal_key().to_vec(), key.value().to_vec())
        })
    }

    /// Bytes held by the arena backing this memtable.
    pub fn approximate_memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memtable_is_empty() {
        let memtable = MemTable::new();
        assert!(memtable.is_empty());
        assert_eq!(memtable.len(), 0);
    }

    #[test]
    fn add_and_get_round_trip() {
        let memtable = MemTable::new();
        memtable.add(1, ValueType::Put, b"key1", b"value1");
        memtable.add(2, ValueType::Put, b"key2", b"value2");

        assert_eq!(memtable.get(b"key1", 100), LookupResult::Found(b"value1".to_vec()));
        assert_eq!(memtable.get(b"key2", 100), LookupResult::Found(b"value2".to_vec()));
        assert_eq!(memtable.get(b"key3", 100), LookupResult::NotFound);
        assert_eq!(memtable.len(), 2);
    }

    #[test]
    fn delete_tombstones_a_key() {
        let memtable = MemTable::new();
        memtable.add(1, ValueType::Put, b"key1", b"value1");
        assert_eq!(memtable.get(b"key1", 100), LookupResult::Found(b"value1".to_vec()));

        memtable.add(2, ValueType::Delete, b"key1", b"");
        assert_eq!(memtable.get(b"key1", 100), LookupResult::Deleted);
        assert_eq!(memtable.len(), 2);
    }

    #[test]
    fn mvcc_returns_the_version_visible_at_each_sequence() {
        let memtable = MemTable::new();
        memtable.add(1, ValueType::Put, b"key1", b"value1");
        memtable.add(2, ValueType::Put, b"key1", b"value2");
        memtable.add(3, ValueType::Put, b"key1", b"value3");

        assert_eq!(memtable.get(b"key1", 1), LookupResult::Found(b"value1".to_vec()));
        assert_eq!(memtable.get(b"key1", 2), LookupResult::Found(b"value2".to_vec()));
        assert_eq!(memtable.get(b"key1", 100), LookupResult::Found(b"value3".to_vec()));
    }

    #[test]
    fn memory_usage_grows_on_writes() {
        let memtable = MemTable::new();
        let before = memtable.approximate_memory_usage();
        memtable.add(1, ValueType::Put, b"key1", b"value1");
        assert!(memtable.approximate_memory_usage() > before);
    }

    #[test]
    fn iterator_visits_entries_in_ascending_internal_key_order() {
        let memtable = MemTable::new();
        memtable.add(1, ValueType::Put, b"key1", b"value1");
        memtable.add(2, ValueType::Put, b"key2", b"value2");
        memtable.add(3, ValueType::Put, b"key3", b"value3");

        let entries: Vec<_> = memtable.iter().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(extract_user_key(&entries[0].0), b"key1");
        assert_eq!(extract_user_key(&entries[1].0), b"key2");
        assert_eq!(extract_user_key(&entries[2].0), b"key3");
    }

    #[test]
    fn overwrite_keeps_both_versions_but_get_prefers_newest() {
        let memtable = MemTable::new();
        memtable.add(1, ValueType::Put, b"key1", b"value1");
        memtable.add(2, ValueType::Put, b"key1", b"value2");

        assert_eq!(memtable.get(b"key1", 100), LookupResult::Found(b"value2".to_vec()));
        assert_eq!(memtable.len(), 2);
    }

    #[test]
    fn concurrent_writers_and_readers_observe_a_consistent_table() {
        use std::thread;

        let memtable = Arc::new(MemTable::new());
        let mut handles = vec![];

        for i in 0..10 {
            let mt = Arc::clone(&memtable);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let seq = (i * 100 + j) as u64;
                    let key = format!("key{}", i * 100 + j);
                    let value = format!("value{}", i * 100 + j);
                    mt.add(seq, ValueType::Put, key.as_bytes(), value.as_bytes());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(memtable.len(), 1000);

        let mut handles = vec![];
        for i in 0..10 {
            let mt = Arc::clone(&memtable);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key{}", i * 100 + j);
                    let expected = format!("value{}", i * 100 + j);
                    assert_eq!(
                        mt.get(key.as_bytes(), u64::MAX),
                        LookupResult::Found(expected.into_bytes())
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
