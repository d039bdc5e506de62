//! Block format (component C): a sorted run of prefix-compressed entries
//! plus a restart-point trailer enabling binary search.
//!
//! Format:
//! ```text
//! [entry 0]
//! [entry 1]
//! ...
//! [entry N-1]
//! [restart point 0: fixed32]
//! ...
//! [restart point R-1: fixed32]
//! [num restarts R: fixed32]
//! ```
//! Each entry: `varint(shared) || varint(unshared) || varint(value_len) ||
//! unshared_key_bytes || value_bytes`. Every `restart_interval`-th entry is
//! a restart point: `shared = 0` and the full key is written out, and its
//! byte offset is recorded in the restart array.

use bytes::{Bytes, BytesMut};

use crate::codec::{get_fixed32, get_varint32, put_fixed32, put_varint32};
use crate::error::{Error, Result};

/// A decoded, immutable block ready for iteration/point lookup.
#[derive(Debug, Clone)]
pub struct Block {
    data: Bytes,
    restart_offset: usize,
    num_restarts: u32,
}

impl Block {
    pub fn new(data: Bytes) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::corruption("block too small for trailer"));
        }
        let num_restarts = get_fixed32(&data[data.len() - 4..])?;
        let restart_offset = data
            .len()
            .checked_sub(4)
            .and_then(|v| v.checked_sub(num_restarts as usize * 4))
            .ok_or_else(|| Error::corruption("invalid restart count"))?;
        Ok(Self {
            data,
            restart_offset,
            num_restarts,
        })
    }

    pub fn num_restarts(&self) -> u32 {
        self.num_restarts
    }

    fn restart_point(&self, index: u32) -> usize {
        let offset = self.restart_offset + index as usize * 4;
        get_fixed32(&self.data[offset..offset + 4]).expect("restart point in range") as usize
    }

    pub fn iter(&self) -> BlockIterator {
        BlockIterator::new(self.clone())
    }

    /// Finds the last entry whose key is `<= target`, returning its
    /// `(key, value)` if one exists. Used by the table reader to land in
    /// the right data block and by the index block to pick the candidate
    /// data-block handle.
    pub fn seek_last_le(&self, target: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        let mut lo = 0u32;
        let mut hi = self.num_restarts.saturating_sub(1);
        // Binary search restart points for the last one whose key is <= target.
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            let offset = self.restart_point(mid);
            let (key, _, _) = decode_entry_at(&self.data, offset, &[]).expect("valid restart entry");
            if key.as_slice() <= target {
                lo = mid;
            } else {
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            }
        }

        let mut iter = self.iter();
        iter.seek_to_restart_point(lo);
        let mut last_match = None;
        while iter.next() {
            if iter.key() <= target {
                last_match = Some((iter.key().to_vec(), iter.value().to_vec()));
            } else {
                break;
            }
        }
        last_match
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn decode_entry_at(data: &[u8], offset: usize, last_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>, usize)> {
    let slice = &data[offset..];
    let (shared, rest) = get_varint32(slice)?;
    let (unshared, rest) = get_varint32(rest)?;
    let (value_len, rest) = get_varint32(rest)?;
    let header_len = slice.len() - rest.len();
    let unshared = unshared as usize;
    let value_len = value_len as usize;
    if rest.len() < unshared + value_len {
        return Err(Error::corruption("truncated block entry"));
    }
    let mut key = last_key[..shared as usize].to_vec();
    key.extend_from_slice(&rest[..unshared]);
    let value = rest[unshared..unshared + value_len].to_vec();
    Ok((key, value, offset + header_len + unshared + value_len))
}

pub struct BlockBuilder {
    buffer: BytesMut,
    restarts: Vec<u32>,
    counter: usize,
    last_key: Vec<u8>,
    restart_interval: usize,
    finished: bool,
}

impl BlockBuilder {
    pub fn new(restart_interval: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
            restart_interval,
            finished: false,
        }
    }

    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        debug_assert!(!self.finished, "Add after Finish");
        debug_assert!(
            self.last_key.is_empty() || key > self.last_key.as_slice(),
            "keys must be added in ascending order"
        );

        let mut shared = 0;
        if self.counter >= self.restart_interval {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
        } else {
            shared = shared_prefix_len(&self.last_key, key);
        }
        let unshared = key.len() - shared;

        let mut header = Vec::with_capacity(3 * crate::codec::MAX_VARINT_LEN_U32);
        put_varint32(&mut header, shared as u32);
        put_varint32(&mut header, unshared as u32);
        put_varint32(&mut header, value.len() as u32);
        self.buffer.extend_from_slice(&header);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
    }

    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(mut self) -> Bytes {
        let mut trailer = Vec::with_capacity(self.restarts.len() * 4 + 4);
        for &restart in &self.restarts {
            put_fixed32(&mut trailer, restart);
        }
        put_fixed32(&mut trailer, self.restarts.len() as u32);
        self.buffer.extend_from_slice(&trailer);
        self.finished = true;
        std::mem::take(&mut self.buffer).freeze()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts = vec![0];
        self.counter = 0;
        self.last_key.clear();
        self.finished = false;
    }
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let min_len = a.len().min(b.len());
    (0..min_len).find(|&i| a[i] != b[i]).unwrap_or(min_len)
}

pub struct BlockIterator {
    block: Block,
    current: usize,
    restart_index: u32,
    key: Vec<u8>,
    value: Vec<u8>,
    valid: bool,
}

impl BlockIterator {
    fn new(block: Block) -> Self {
        Self {
            block,
            current: 0,
            restart_index: 0,
            key: Vec::new(),
            value: Vec::new(),
            valid: false,
        }
    }

    pub fn seek_to_first(&mut self) {
        self.seek_to_restart_point(0);
    }

    fn seek_to_restart_point(&mut self, index: u32) {
        self.key.clear();
        self.restart_index = index;
        self.current = self.block.restart_point(index);
        self.valid = self.current < self.block.restart_offset;
    }

    pub fn next(&mut self) -> bool {
        if !self.valid {
            return false;
        }
        self.parse_next_entry();
        self.valid
    }

    fn parse_next_entry(&mut self) {
        if self.current >= self.block.restart_offset {
            self.valid = false;
            return;
        }
        match decode_entry_at(&self.block.data, self.current, &self.key) {
            Ok((key, value, next_offset)) => {
                self.key = key;
                self.value = value;
                self.current = next_offset;
                self.valid = true;
            }
            Err(_) => self.valid = false,
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn key(&self) -> &[u8] {
        assert!(self.valid, "iterator not valid");
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        assert!(self.valid, "iterator not valid");
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_builder_has_no_entries() {
        let builder = BlockBuilder::new(16);
        assert!(builder.is_empty());
    }

    #[test]
    fn five_keys_restart_interval_four_matches_exact_bytes() {
        let mut builder = BlockBuilder::new(4);
        builder.add(b"confuse", b"value");
        builder.add(b"contend", b"value");
        builder.add(b"cope", b"value");
        builder.add(b"copy", b"value");
        builder.add(b"corn", b"value");
        let data = builder.finish();

        let mut expected = Vec::new();
        expected.extend_from_slice(&[0, 7, 5]);
        expected.extend_from_slice(b"confusevalue");
        expected.extend_from_slice(&[3, 4, 5]);
        expected.extend_from_slice(b"tendvalue");
        expected.extend_from_slice(&[2, 2, 5]);
        expected.extend_from_slice(b"pevalue");
        expected.extend_from_slice(&[3, 1, 5]);
        expected.extend_from_slice(b"yvalue");
        expected.extend_from_slice(&[0, 4, 5]);
        expected.extend_from_slice(b"cornvalue");
        expected.extend_from_slice(&[0, 0, 0, 0]);
        expected.extend_from_slice(&[0x2e, 0, 0, 0]);
        expected.extend_from_slice(&[2, 0, 0, 0]);

        assert_eq!(&data[..], &expected[..]);
    }

    #[test]
    fn iteration_reconstructs_keys_in_order() {
        let mut builder = BlockBuilder::new(2);
        builder.add(b"apple", b"red");
        builder.add(b"banana", b"yellow");
        builder.add(b"cherry", b"red");
        let block = Block::new(builder.finish()).unwrap();

        let mut iter = block.iter();
        iter.seek_to_first();
        let mut seen = Vec::new();
        while iter.next() {
            seen.push((iter.key().to_vec(), iter.value().to_vec()));
        }
        assert_eq!(
            seen,
            vec![
                (b"apple".to_vec(), b"red".to_vec()),
                (b"banana".to_vec(), b"yellow".to_vec()),
                (b"cherry".to_vec(), b"red".to_vec()),
            ]
        );
    }

    #[test]
    fn seek_last_le_finds_candidate_entry() {
        let mut builder = BlockBuilder::new(2);
        for k in ["a", "c", "e", "g", "i"] {
            builder.add(k.as_bytes(), b"v");
        }
        let block = Block::new(builder.finish()).unwrap();

        assert_eq!(
            block.seek_last_le(b"f").map(|(k, _)| k),
            Some(b"e".to_vec())
        );
        assert_eq!(
            block.seek_last_le(b"i").map(|(k, _)| k),
            Some(b"i".to_vec())
        );
        assert_eq!(block.seek_last_le(b""), None);
    }

    #[test]
    #[should_panic]
    fn unsorted_add_panics() {
        let mut builder = BlockBuilder::new(16);
        builder.add(b"key2", b"value2");
        builder.add(b"key1", b"value1");
    }
}
