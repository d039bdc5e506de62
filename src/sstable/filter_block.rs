//! Filter block (component D): a sequence of per-2KiB probabilistic
//! membership filters, partitioned by data-block byte offset rather than
//! by entry count.
//!
//! Grounded on the upstream `FilterBlockBuilder`/`FilterBlockReader` design:
//! keys are staged in a single flat byte buffer plus a starts array so
//! adding a key never allocates, and `StartBlock` fills in empty filters
//! for any offset range that produced no keys since the last one.

use std::sync::Arc;

use crate::codec::{get_fixed32, put_fixed32};
use crate::filter_policy::FilterPolicy;

/// One filter per 2^11 = 2 KiB of data-block output.
pub const FILTER_BASE_LG: u8 = 11;
const FILTER_BASE: u64 = 1 << FILTER_BASE_LG;

pub struct FilterBlockBuilder {
    policy: Arc<dyn FilterPolicy>,
    /// Concatenated key bytes for the filter currently being accumulated.
    key_data: Vec<u8>,
    /// Byte offsets into `key_data` marking the start of each staged key.
    key_starts: Vec<usize>,
    /// Finished filter bitmaps, concatenated in creation order.
    result: Vec<u8>,
    /// Byte offset into `result` where each filter begins.
    filter_offsets: Vec<u32>,
}

impl FilterBlockBuilder {
    pub fn new(policy: Arc<dyn FilterPolicy>) -> Self {
        Self {
            policy,
            key_data: Vec::new(),
            key_starts: Vec::new(),
            result: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    /// Ensures a filter exists covering `block_offset`, emitting empty
    /// filters for any gap since the last one generated.
    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = block_offset / FILTER_BASE;
        debug_assert!(filter_index >= self.filter_offsets.len() as u64);
        while filter_index > self.filter_offsets.len() as u64 {
            self.generate_filter();
        }
    }

    pub fn add_key(&mut self, key: &[u8]) {
        self.key_starts.push(self.key_data.len());
        self.key_data.extend_from_slice(key);
    }

    /// Finalizes the trailing filter (if any keys are staged) and appends
    /// the offset array, its own offset, and the `base_lg` byte.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.key_starts.is_empty() {
            self.generate_filter();
        }

        let array_offset = self.result.len() as u32;
        for &offset in &self.filter_offsets {
            put_fixed32(&mut self.result, offset);
        }
        put_fixed32(&mut self.result, array_offset);
        self.result.push(FILTER_BASE_LG);
        self.result
    }

    fn generate_filter(&mut self) {
        if self.key_starts.is_empty() {
            // No keys landed in this window: still records an offset so
            // the array stays aligned with block indices, the filter
            // itself stays zero bytes.
            self.filter_offsets.push(self.result.len() as u32);
            return;
        }

        self.key_starts.push(self.key_data.len());
        let keys: Vec<&[u8]> = self
            .key_starts
            .windows(2)
            .map(|w| &self.key_data[w[0]..w[1]])
            .collect();

        self.filter_offsets.push(self.result.len() as u32);
        let filter = self.policy.create_filter(&keys);
        self.result.extend_from_slice(&filter);

        self.key_data.clear();
        self.key_starts.clear();
    }
}

pub struct FilterBlockReader {
    policy: Arc<dyn FilterPolicy>,
    contents: Vec<u8>,
    /// Byte offset (within `contents`) where the offset array starts.
    offset_array_start: usize,
    num_filters: usize,
    base_lg: u8,
}

impl FilterBlockReader {
    pub fn new(policy: Arc<dyn FilterPolicy>, contents: Vec<u8>) -> Self {
        if contents.len() < 5 {
            return Self {
                policy,
                contents,
                offset_array_start: 0,
                num_filters: 0,
                base_lg: 0,
            };
        }
        let n = contents.len();
        let base_lg = contents[n - 1];
        let array_offset = match get_fixed32(&contents[n - 5..n - 1]) {
            Ok(v) => v as usize,
            Err(_) => {
                return Self {
                    policy,
                    contents,
                    offset_array_start: 0,
                    num_filters: 0,
                    base_lg: 0,
                };
            }
        };
        if array_offset > n - 5 {
            return Self {
                policy,
                contents,
                offset_array_start: 0,
                num_filters: 0,
                base_lg: 0,
            };
        }
        let num_filters = (n - 5 - array_offset) / 4;
        Self {
            policy,
            contents,
            offset_array_start: array_offset,
            num_filters,
            base_lg,
        }
    }

    /// Tests whether `key` may have been present in the filter covering
    /// `block_offset`. Conservative on any decode inconsistency.
    pub fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        if self.num_filters == 0 {
            return true;
        }
        let index = (block_offset >> self.base_lg) as usize;
        if index >= self.num_filters {
            return true;
        }
        let entry = self.offset_array_start + index * 4;
        let start = match get_fixed32(&self.contents[entry..]) {
            Ok(v) => v as usize,
            Err(_) => return true,
        };
        let limit = match get_fixed32(&self.contents[entry + 4..]) {
            Ok(v) => v as usize,
            Err(_) => return true,
        };
        if start > limit || limit > self.offset_array_start {
            return true;
        }
        if start == limit {
            return false;
        }
        self.policy.key_may_match(key, &self.contents[start..limit])
    }
}
