//! Index block: maps the shortest separator key greater than a data
//! block's largest key to that block's handle, enabling the table
//! reader to binary-search its way to the right data block.

use crate::error::Result;
use crate::sstable::block::{Block, BlockBuilder, BlockIterator};
use crate::sstable::footer::BlockHandle;
use bytes::Bytes;

/// A single index entry: a separator key paired with the handle of the
/// data block it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Vec<u8>,
    pub handle: BlockHandle,
}

impl IndexEntry {
    pub fn new(key: Vec<u8>, handle: BlockHandle) -> Self {
        Self { key, handle }
    }

    pub fn encode_value(&self) -> Vec<u8> {
        self.handle.encode()
    }

    pub fn decode_value(data: &[u8]) -> Result<BlockHandle> {
        BlockHandle::decode(data)
    }
}

/// A decoded index block ready for point lookups and iteration.
#[derive(Debug)]
pub struct IndexBlock {
    block: Block,
}

impl IndexBlock {
    pub fn new(data: Bytes) -> Result<Self> {
        let block = Block::new(data)?;
        Ok(Self { block })
    }

    /// Finds the handle of the data block that may contain `key`: the
    /// first index entry whose separator is `>= key`. Falls back to
    /// the last block if every separator is `< key` (the target may
    /// still live in the final block, which has no successor entry to
    /// compare against).
    pub fn find_block(&self, key: &[u8]) -> Result<Option<BlockHandle>> {
        let mut iter = self.block.iter();
        iter.seek_to_first();

        let mut last_handle: Option<BlockHandle> = None;
        while iter.next() {
            let handle = BlockHandle::decode(iter.value())?;
            if iter.key() >= key {
                return Ok(Some(handle));
            }
            last_handle = Some(handle);
        }
        Ok(last_handle)
    }

    pub fn iter(&self) -> IndexIterator {
        IndexIterator::new(self.block.iter())
    }

    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut iter = self.block.iter();
        iter.seek_to_first();
        while iter.next() {
            count += 1;
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds an index block. Index blocks use a restart interval of 1:
/// every entry is a restart point since entries are already sparse and
/// binary search over individually-addressable keys matters more than
/// prefix compression here.
pub struct IndexBlockBuilder {
    builder: BlockBuilder,
}

impl IndexBlockBuilder {
    pub fn new() -> Self {
        Self { builder: BlockBuilder::new(1) }
    }

    pub fn add_entry(&mut self, entry: &IndexEntry) {
        let value = entry.encode_value();
        self.builder.add(&entry.key, &value);
    }

    pub fn finish(self) -> Bytes {
        self.builder.finish()
    }

    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    pub fn current_size(&self) -> usize {
        self.builder.current_size_estimate()
    }
}

impl Default for IndexBlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over index entries, in separator-key order.
pub struct IndexIterator {
    iter: BlockIterator,
}

impl IndexIterator {
    fn new(iter: BlockIterator) -> Self {
        Self { iter }
    }

    pub fn seek_to_first(&mut self) {
        self.iter.seek_to_first();
    }

    pub fn advance(&mut self) -> bool {
        self.iter.next()
    }

    pub fn valid(&self) -> bool {
        self.iter.valid()
    }

    pub fn entry(&self) -> Result<IndexEntry> {
        let key = self.iter.key().to_vec();
        let handle = BlockHandle::decode(self.iter.value())?;
        Ok(IndexEntry::new(key, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_entry() {
        let entry = IndexEntry::new(b"key1".to_vec(), BlockHandle::new(100, 50));

        let encoded = entry.encode_value();
        let decoded = IndexEntry::decode_value(&encoded).unwrap();

        assert_eq!(decoded, entry.handle);
    }

    #[test]
    fn test_index_block_builder() {
        let mut builder = IndexBlockBuilder::new();
        assert!(builder.is_empty());

        builder.add_entry(&IndexEntry::new(b"apple".to_vec(), BlockHandle::new(0, 100)));
        builder.add_entry(&IndexEntry::new(b"banana".to_vec(), BlockHandle::new(100, 150)));
        builder.add_entry(&IndexEntry::new(b"cherry".to_vec(), BlockHandle::new(250, 200)));

        let data = builder.finish();
        assert!(!data.is_empty());

        let index = IndexBlock::new(data).unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_index_block_find() {
        let mut builder = IndexBlockBuilder::new();
        builder.add_entry(&IndexEntry::new(b"apple".to_vec(), BlockHandle::new(0, 100)));
        builder.add_entry(&IndexEntry::new(b"banana".to_vec(), BlockHandle::new(100, 150)));
        builder.add_entry(&IndexEntry::new(b"cherry".to_vec(), BlockHandle::new(250, 200)));

        let data = builder.finish();
        let index = IndexBlock::new(data).unwrap();

        let handle = index.find_block(b"banana").unwrap().unwrap();
        assert_eq!(handle.offset, 100);

        let handle = index.find_block(b"aaa").unwrap().unwrap();
        assert_eq!(handle.offset, 0);

        let handle = index.find_block(b"avocado").unwrap().unwrap();
        assert_eq!(handle.offset, 100);

        let handle = index.find_block(b"carrot").unwrap().unwrap();
        assert_eq!(handle.offset, 250);

        let handle = index.find_block(b"durian").unwrap();
        assert!(handle.is_some());
    }

    #[test]
    fn test_index_iterator() {
        let mut builder = IndexBlockBuilder::new();
        builder.add_entry(&IndexEntry::new(b"apple".to_vec(), BlockHandle::new(0, 100)));
        builder.add_entry(&IndexEntry::new(b"banana".to_vec(), BlockHandle::new(100, 150)));

        let data = builder.finish();
        let index = IndexBlock::new(data).unwrap();

        let mut iter = index.iter();
        iter.seek_to_first();

        assert!(iter.advance());
        let entry = iter.entry().unwrap();
        assert_eq!(entry.key, b"apple");
        assert_eq!(entry.handle.offset, 0);

        assert!(iter.advance());
        let entry = iter.entry().unwrap();
        assert_eq!(entry.key, b"banana");
        assert_eq!(entry.handle.offset, 100);

        assert!(!iter.advance());
    }
}
