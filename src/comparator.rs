//! User-key comparator (component I).
//!
//! The table builder and memtable never hard-code byte comparison; they go
//! through this trait so a caller can plug in a different key ordering.
//! The default, [`BytewiseComparator`], is the one every example in this
//! crate and its tests use.

use std::cmp::Ordering;

/// A pluggable ordering over user keys, plus the two helpers the table
/// builder uses to keep index entries as short as possible.
pub trait Comparator: Send + Sync {
    /// A name identifying the comparator, so a reader can refuse to open a
    /// table built under a different, incompatible ordering.
    fn name(&self) -> &'static str;

    /// Three-way comparison, matching `Ord`/`memcmp` conventions.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Replaces `start` with the shortest string `s` such that
    /// `start <= s < limit`. May leave `start` unchanged if no shorter
    /// separator exists.
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]);

    /// Replaces `key` with the shortest string `s >= key`.
    fn find_short_successor(&self, key: &mut Vec<u8>);
}

/// The default comparator: plain lexicographic byte ordering.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        "leveldb.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let min_len = start.len().min(limit.len());
        let diff_index = (0..min_len).find(|&i| start[i] != limit[i]);

        let diff_index = match diff_index {
            Some(i) => i,
            None => {
                // One is a prefix of the other; nothing shorter works.
                return;
            }
        };

        let diff_byte = start[diff_index];
        if diff_byte < 0xff && diff_byte + 1 < limit[diff_index] {
            start[diff_index] += 1;
            start.truncate(diff_index + 1);
            debug_assert_eq!(self.compare(start, limit), Ordering::Less);
        }
        // Otherwise leave start unchanged: either start already shares a
        // prefix that makes incrementing unsafe, or start is already the
        // shortest possible separator.
    }

    fn find_short_successor(&self, key: &mut Vec<u8>) {
        for i in 0..key.len() {
            if key[i] != 0xff {
                key[i] += 1;
                key.truncate(i + 1);
                return;
            }
        }
        // All bytes are 0xff; leave key unchanged.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_separator_scenarios() {
        let cmp = BytewiseComparator;

        // Diverge at index 4 ('e' vs 'x'): incrementing to 'f' still sorts
        // below the limit, so the separator shortens to "abcdf".
        let mut s = b"abcdefg".to_vec();
        cmp.find_shortest_separator(&mut s, b"abcdxyz");
        assert_eq!(s, b"abcdf");

        // start already >= limit: left unchanged.
        let mut s = b"abcdxyz".to_vec();
        cmp.find_shortest_separator(&mut s, b"abcdefg");
        assert_eq!(s, b"abcdxyz");

        // Diverge at index 4 ('e' vs 'f'): incrementing 'e' to 'f' would
        // equal the limit's byte at that position, not sort strictly below
        // it, so the separator is left unchanged.
        let mut s = b"abcdefg".to_vec();
        cmp.find_shortest_separator(&mut s, b"abcdffg");
        assert_eq!(s, b"abcdefg");
    }

    #[test]
    fn shortest_separator_always_satisfies_invariant() {
        let cmp = BytewiseComparator;
        let pairs: &[(&[u8], &[u8])] = &[
            (b"abcdefg", b"abcdxyz"),
            (b"key0001", b"key0050"),
            (b"", b"anything"),
            (b"same", b"same"),
        ];
        for &(a, b) in pairs {
            if a >= b {
                continue;
            }
            let mut s = a.to_vec();
            cmp.find_shortest_separator(&mut s, b);
            assert!(s.as_slice() >= a, "separator must be >= start");
            assert!(s.as_slice() < b, "separator must be < limit");
            assert!(s.len() <= a.len(), "separator must not grow");
        }
    }

    #[test]
    fn shortest_separator_prefix_case_is_unchanged() {
        let cmp = BytewiseComparator;
        let mut s = b"abc".to_vec();
        cmp.find_shortest_separator(&mut s, b"abcdef");
        assert_eq!(s, b"abc");
    }

    #[test]
    fn short_successor_increments_first_non_ff_byte() {
        let cmp = BytewiseComparator;
        let mut k = b"abc".to_vec();
        cmp.find_short_successor(&mut k);
        assert_eq!(k, b"abd");

        let mut k = vec![0xff, 0xff, 0x05];
        cmp.find_short_successor(&mut k);
        assert_eq!(k, vec![0x06]);

        let mut k = vec![0xff, 0xff];
        cmp.find_short_successor(&mut k);
        assert_eq!(k, vec![0xff, 0xff]);
    }

    proptest::proptest! {
        #[test]
        fn shortest_separator_is_always_in_range_and_no_longer(a: Vec<u8>, b: Vec<u8>) {
            let cmp = BytewiseComparator;
            if a >= b {
                return Ok(());
            }
            let mut s = a.clone();
            cmp.find_shortest_separator(&mut s, &b);
            proptest::prop_assert!(s >= a);
            proptest::prop_assert!(s < b);
            proptest::prop_assert!(s.len() <= a.len());
        }

        #[test]
        fn short_successor_never_sorts_below_the_original(key: Vec<u8>) {
            let cmp = BytewiseComparator;
            let mut successor = key.clone();
            cmp.find_short_successor(&mut successor);
            proptest::prop_assert!(successor >= key);
        }
    }
}
