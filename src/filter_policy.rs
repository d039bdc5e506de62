//! Filter policy (component J): the probabilistic membership structure
//! consumed by the filter block (component D). The filter block never
//! inspects the bitmap format itself; it only calls through this trait.

use std::hash::{Hash, Hasher};

/// A pluggable filter construction/membership-test policy.
pub trait FilterPolicy: Send + Sync {
    /// Identifies the policy; the table builder prefixes the meta-index
    /// entry name with `"filter."` followed by this.
    fn name(&self) -> &'static str;

    /// Builds one filter bitmap covering every key in `keys`.
    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8>;

    /// Tests whether `key` may be a member of the set that produced
    /// `filter`. May return false positives; must never return a false
    /// negative for a key that was actually inserted.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

const DEFAULT_BITS_PER_KEY: usize = 10;

/// Bloom filter policy using double hashing (two independent FNV-1a seeds
/// combined as `h1 + i*h2`) to derive `k` probe positions per key, the same
/// construction this crate's memtable-adjacent bloom filter used before
/// being split out into this policy-shaped form.
#[derive(Debug, Clone, Copy)]
pub struct BloomFilterPolicy {
    bits_per_key: usize,
    k: u32,
}

impl BloomFilterPolicy {
    pub fn new(bits_per_key: usize) -> Self {
        let k = ((bits_per_key as f64) * 0.69).round() as u32; // ln(2)
        let k = k.clamp(1, 30);
        Self { bits_per_key, k }
    }

    fn hash_with_seed(key: &[u8], seed: u32) -> u32 {
        let mut hasher = FnvHasher::new_with_seed(seed);
        key.hash(&mut hasher);
        hasher.finish() as u32
    }
}

impl Default for BloomFilterPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BITS_PER_KEY)
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &'static str {
        "aidb.BuiltinBloomFilter"
    }

    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8> {
        let num_bits = (keys.len() * self.bits_per_key).max(64);
        let num_bytes = num_bits.div_ceil(8);
        let num_bits = num_bytes * 8;

        let mut bits = vec![0u8; num_bytes + 1];
        for key in keys {
            let h1 = Self::hash_with_seed(key, 0xbc9f1d34);
            let h2 = Self::hash_with_seed(key, 0xd0e89c7b);
            let mut h = h1;
            for _ in 0..self.k {
                let bit_pos = (h as usize) % num_bits;
                bits[bit_pos / 8] |= 1 << (bit_pos % 8);
                h = h.wrapping_add(h2);
            }
        }
        // Trailing byte records k so a reader built against a different
        // bits_per_key can still decode this specific filter.
        *bits.last_mut().unwrap() = self.k as u8;
        bits
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        if filter.len() < 2 {
            return false;
        }
        let num_bytes = filter.len() - 1;
        let num_bits = num_bytes * 8;
        let k = filter[num_bytes];
        if k > 30 {
            // Reserved for future policies/short filters: treat as a match.
            return true;
        }

        let h1 = Self::hash_with_seed(key, 0xbc9f1d34);
        let h2 = Self::hash_with_seed(key, 0xd0e89c7b);
        let mut h = h1;
        for _ in 0..k {
            let bit_pos = (h as usize) % num_bits;
            if filter[bit_pos / 8] & (1 << (bit_pos % 8)) == 0 {
                return false;
            }
            h = h.wrapping_add(h2);
        }
        true
    }
}

struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    fn new_with_seed(seed: u32) -> Self {
        Self {
            state: Self::FNV_OFFSET_BASIS ^ (seed as u64),
        }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::FNV_PRIME);
        }
    }
}
