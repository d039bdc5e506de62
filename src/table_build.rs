//! Table-build driver (component G): drains a sorted key-value iterator
//! into one finished SSTable file, warms the table cache, and cleans up
//! after a failed or empty build.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::TableCache;
use crate::comparator::Comparator;
use crate::config::Options;
use crate::env::{table_file_name, PosixWritableFile};
use crate::error::Result;
use crate::filter_policy::FilterPolicy;
use crate::memtable::{extract_user_key, split_internal_key, ValueType};
use crate::sstable::SSTableBuilder;

/// Summary of one finished table, handed back to whatever tracks the
/// set of live files (a version, a manifest entry, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetaData {
    pub number: u64,
    pub file_size: u64,
    pub smallest: Vec<u8>,
    pub largest: Vec<u8>,
}

/// Builds `{dbname}/{file_number:06}.ldb` from `entries`, an iterator
/// yielding `(key, value)` pairs in ascending order.
///
/// Returns `None` if `entries` was empty (nothing is written, no file is
/// left behind). On any failure the partially written file is removed
/// and the error is propagated. `options` is validated up front, before
/// anything is written.
pub fn build_table<I>(
    dbname: &str,
    file_number: u64,
    options: &Options,
    comparator: Option<Arc<dyn Comparator>>,
    filter_policy: Option<Arc<dyn FilterPolicy>>,
    table_cache: Option<&TableCache>,
    mut entries: I,
) -> Result<Option<FileMetaData>>
where
    I: Iterator<Item = (Vec<u8>, Vec<u8>)>,
{
    options.validate()?;

    let first = match entries.next() {
        Some(first) => first,
        None => {
            log::debug!("build_table: empty input, nothing to write");
            return Ok(None);
        }
    };

    let path = PathBuf::from(table_file_name(dbname, file_number));
    let result = build_table_inner(&path, options, comparator, filter_policy, first, entries);

    match result {
        Ok(mut meta) => {
            meta.number = file_number;
            if let Some(cache) = table_cache {
                if let Err(e) = warm_cache(cache, &path, file_number) {
                    log::warn!("failed to warm table cache for file {}: {}", file_number, e);
                    let _ = std::fs::remove_file(&path);
                    return Err(e);
                }
            }
            log::info!(
                "built table {} ({} bytes, {} to {})",
                file_number,
                meta.file_size,
                String::from_utf8_lossy(&meta.smallest),
                String::from_utf8_lossy(&meta.largest),
            );
            Ok(Some(meta))
        }
        Err(e) => {
            log::warn!("build_table failed for file {}: {}", file_number, e);
            let _ = std::fs::remove_file(&path);
            Err(e)
        }
    }
}

fn build_table_inner<I>(
    path: &PathBuf,
    options: &Options,
    comparator: Option<Arc<dyn Comparator>>,
    filter_policy: Option<Arc<dyn FilterPolicy>>,
    first: (Vec<u8>, Vec<u8>),
    rest: I,
) -> Result<FileMetaData>
where
    I: Iterator<Item = (Vec<u8>, Vec<u8>)>,
{
    let file = PosixWritableFile::create(path)?;
    let mut builder = SSTableBuilder::new(file, options, comparator, filter_policy);

    let smallest = first.0.clone();
    let mut largest = first.0.clone();

    builder.add(&first.0, &first.1)?;
    for (key, value) in rest {
        largest = key.clone();
        builder.add(&key, &value)?;
    }

    let file_size = builder.finish()?;

    Ok(FileMetaData { number: 0, file_size, smallest, largest })
}

fn warm_cache(cache: &TableCache, path: &PathBuf, file_number: u64) -> Result<()> {
    let reader = cache.get_or_open(file_number, path)?;
    let mut iter = reader.iter();
    iter.seek_to_first()?;
    Ok(())
}

/// Adapts a [`crate::memtable::MemTable::iter`] internal-key stream into
/// the plain `(key, value)` pairs [`build_table`] expects: the newest
/// version of each user key, with a tombstone collapsed to an empty
/// value (the convention [`crate::sstable::SSTableReader::get`] already
/// treats as absent).
///
/// Internal keys arrive in ascending user-key, descending-sequence
/// order, so the first entry seen for a user key is always the
/// newest one; every later entry for that same key is a superseded
/// version and is dropped here rather than written into the table.
pub fn memtable_flush_view<I>(entries: I) -> impl Iterator<Item = (Vec<u8>, Vec<u8>)>
where
    I: Iterator<Item = (Vec<u8>, Vec<u8>)>,
{
    let mut last_user_key: Option<Vec<u8>> = None;
    entries.filter_map(move |(internal_key, value)| {
        let user_key = extract_user_key(&internal_key).to_vec();
        if last_user_key.as_deref() == Some(user_key.as_slice()) {
            return None;
        }
        last_user_key = Some(user_key.clone());

        let (_, _, value_type) = split_internal_key(&internal_key).expect("well-formed internal key");
        let value = match value_type {
            ValueType::Put => value,
            ValueType::Delete => Vec::new(),
        };
        Some((user_key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_policy::BloomFilterPolicy;
    use tempfile::tempdir;

    fn sample(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        (0..n)
            .map(|i| (format!("key{:06}", i).into_bytes(), format!("value{:06}", i).into_bytes()))
            .collect()
    }

    #[test]
    fn invalid_options_are_rejected_before_anything_is_written() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().to_str().unwrap();
        let mut options = Options::default();
        options.block_size = 0;

        let result = build_table(dbname, 1, &options, None, None, None, sample(1).into_iter());
        assert!(result.is_err());
        assert!(!std::path::Path::new(&table_file_name(dbname, 1)).exists());
    }

    #[test]
    fn empty_iterator_builds_nothing() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().to_str().unwrap();
        let result = build_table(
            dbname,
            1,
            &Options::default(),
            None,
            None,
            None,
            std::iter::empty(),
        )
        .unwrap();
        assert!(result.is_none());
        assert!(!std::path::Path::new(&table_file_name(dbname, 1)).exists());
    }

    #[test]
    fn builds_a_file_and_reports_smallest_and_largest() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().to_str().unwrap();
        let entries = sample(100);

        let policy: Arc<dyn FilterPolicy> = Arc::new(BloomFilterPolicy::new(10));
        let meta = build_table(
            dbname,
            7,
            &Options::default(),
            None,
            Some(policy),
            None,
            entries.clone().into_iter(),
        )
        .unwrap()
        .expect("non-empty build");

        assert_eq!(meta.smallest, entries[0].0);
        assert_eq!(meta.largest, entries[99].0);
        assert!(meta.file_size > 0);

        let path = table_file_name(dbname, 7);
        assert!(std::path::Path::new(&path).exists());

        let reader = crate::sstable::SSTableReader::open(&path).unwrap();
        assert_eq!(reader.get(b"key000050").unwrap(), Some(b"value000050".to_vec()));
    }

    #[test]
    fn warms_the_table_cache_when_provided() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().to_str().unwrap();
        let entries = sample(5);

        let cache = TableCache::new(8);
        let meta = build_table(dbname, 3, &Options::default(), None, None, Some(&cache), entries.into_iter())
            .unwrap()
            .unwrap();

        assert_eq!(cache.len(), 1);
        let path = table_file_name(dbname, 3);
        let reader = cache.get_or_open(3, &path).unwrap();
        assert_eq!(reader.get(&meta.smallest).unwrap(), Some(b"value000000".to_vec()));
    }

    #[test]
    fn single_entry_table_has_equal_smallest_and_largest() {
        let dir = tempdir().unwrap();
        let dbname = dir.path().to_str().unwrap();
        let meta = build_table(
            dbname,
            9,
            &Options::default(),
            None,
            None,
            None,
            std::iter::once((b"onlykey".to_vec(), b"onlyvalue".to_vec())),
        )
        .unwrap()
        .unwrap();

        assert_eq!(meta.smallest, b"onlykey");
        assert_eq!(meta.largest, b"onlykey");
    }

    #[test]
    fn flush_view_collapses_overwrites_to_the_newest_version() {
        use crate::memtable::MemTable;

        let memtable = MemTable::new();
        memtable.add(1, ValueType::Put, b"key1", b"value1");
        memtable.add(2, ValueType::Put, b"key1", b"value2");
        memtable.add(3, ValueType::Put, b"key2", b"value3");

        let flushed: Vec<_> = memtable_flush_view(memtable.iter()).collect();
        assert_eq!(flushed, vec![(b"key1".to_vec(), b"value2".to_vec()), (b"key2".to_vec(), b"value3".to_vec())]);
    }

    #[test]
    fn flush_view_collapses_a_tombstone_to_an_empty_value() {
        use crate::memtable::MemTable;

        let memtable = MemTable::new();
        memtable.add(1, ValueType::Put, b"key1", b"value1");
        memtable.add(2, ValueType::Delete, b"key1", b"");

        let flushed: Vec<_> = memtable_flush_view(memtable.iter()).collect();
        assert_eq!(flushed, vec![(b"key1".to_vec(), Vec::new())]);
    }

    #[test]
    fn build_table_from_a_real_memtable_round_trips_through_the_flush_view() {
        use crate::memtable::MemTable;

        let dir = tempdir().unwrap();
        let dbname = dir.path().to_str().unwrap();

        let memtable = MemTable::new();
        for i in 0..200u64 {
            let key = format!("key{:06}", i);
            let value = format!("value{:06}", i);
            memtable.add(i, ValueType::Put, key.as_bytes(), value.as_bytes());
        }

        let meta = build_table(
            dbname,
            1,
            &Options::default(),
            None,
            None,
            None,
            memtable_flush_view(memtable.iter()),
        )
        .unwrap()
        .unwrap();

        let path = table_file_name(dbname, meta.number);
        let reader = crate::sstable::SSTableReader::open(&path).unwrap();
        assert_eq!(reader.get(b"key000100").unwrap(), Some(b"value000100".to_vec()));
    }
}
