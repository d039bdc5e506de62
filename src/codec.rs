//! Varint/fixed-width integer codec and CRC masking (component A).
//!
//! Mirrors the wire encodings used across the table and log formats:
//! LEB128-style base-128 varints for lengths, little-endian fixed-width
//! integers for trailers and footers, and the rotate-based CRC mask that
//! keeps a stored checksum from being weakened by sitting next to the
//! bytes it covers.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Maximum encoded length of a `u64` varint.
pub const MAX_VARINT_LEN_U64: usize = 10;
/// Maximum encoded length of a `u32` varint.
pub const MAX_VARINT_LEN_U32: usize = 5;

/// Appends `v` to `buf` as a base-128 varint (LSB group first, continuation
/// bit set on every byte but the last).
pub fn put_varint32(buf: &mut Vec<u8>, v: u32) {
    put_varint64(buf, v as u64);
}

/// Appends `v` to `buf` as a base-128 varint.
pub fn put_varint64(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.put_u8((v as u8) | 0x80);
        v >>= 7;
    }
    buf.put_u8(v as u8);
}

/// Reads a varint-encoded `u32` from the front of `data`, returning the
/// decoded value and the remaining slice.
pub fn get_varint32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (v, rest) = get_varint64(data)?;
    if v > u32::MAX as u64 {
        return Err(Error::corruption("varint32 overflow"));
    }
    Ok((v as u32, rest))
}

/// Reads a varint-encoded `u64` from the front of `data`, returning the
/// decoded value and the remaining slice.
pub fn get_varint64(data: &[u8]) -> Result<(u64, &[u8])> {
    let mut result: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN_U64 {
            return Err(Error::corruption("varint64 too long"));
        }
        result |= ((byte & 0x7f) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, &data[i + 1..]));
        }
    }
    Err(Error::corruption("truncated varint"))
}

/// Number of bytes `v` would occupy if varint-encoded.
pub fn varint_length(mut v: u64) -> usize {
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

/// Appends `v` to `buf` as 4 little-endian bytes.
pub fn put_fixed32(buf: &mut Vec<u8>, v: u32) {
    buf.put_u32_le(v);
}

/// Appends `v` to `buf` as 8 little-endian bytes.
pub fn put_fixed64(buf: &mut Vec<u8>, v: u64) {
    buf.put_u64_le(v);
}

/// Reads 4 little-endian bytes from the front of `data`.
pub fn get_fixed32(data: &[u8]) -> Result<u32> {
    if data.len() < 4 {
        return Err(Error::corruption("truncated fixed32"));
    }
    Ok((&data[..4]).get_u32_le())
}

/// Reads 8 little-endian bytes from the front of `data`.
pub fn get_fixed64(data: &[u8]) -> Result<u64> {
    if data.len() < 8 {
        return Err(Error::corruption("truncated fixed64"));
    }
    Ok((&data[..8]).get_u64_le())
}

/// Like [`std::str::from_utf8`]'s decimal cousin: consumes a leading run of
/// ASCII digits from `s`, returning the parsed value and the remainder.
/// Fails (returns `None`) on overflow past `u64::MAX` or if `s` does not
/// start with a digit.
pub fn consume_decimal_number(s: &str) -> Option<(u64, &str)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut value: u64 = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        let digit = (bytes[i] - b'0') as u64;
        value = value.checked_mul(10)?.checked_add(digit)?;
        i += 1;
    }
    if i == 0 {
        None
    } else {
        Some((value, &s[i..]))
    }
}

const MASK_DELTA: u32 = 0xa282ead8;

/// Computes the CRC32 of `data` using the corpus's checksum crate
/// (`crc32fast`), then applies the LevelDB-style rotate mask so the stored
/// checksum is not adjacent-data-dependent in a way that weakens it.
pub fn masked_crc(data: &[u8]) -> u32 {
    mask(crc32fast::hash(data))
}

/// Rotates and offsets a raw CRC value for storage.
pub fn mask(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask`].
pub fn unmask(masked_crc: u32) -> u32 {
    let rot = masked_crc.wrapping_sub(MASK_DELTA);
    (rot >> 17) | (rot << 15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip() {
        let values: [u64; 7] = [0, 1, 127, 128, 16383, 16384, u64::MAX];
        for &v in &values {
            let mut buf = Vec::new();
            put_varint64(&mut buf, v);
            assert_eq!(buf.len(), varint_length(v));
            let (decoded, rest) = get_varint64(&buf).unwrap();
            assert_eq!(decoded, v);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn varint_sequence_preserves_boundaries() {
        let mut buf = Vec::new();
        put_varint32(&mut buf, 300);
        put_varint32(&mut buf, 1);
        let (a, rest) = get_varint32(&buf).unwrap();
        assert_eq!(a, 300);
        let (b, rest) = get_varint32(rest).unwrap();
        assert_eq!(b, 1);
        assert!(rest.is_empty());
    }

    #[test]
    fn fixed_round_trip() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0xdeadbeef);
        put_fixed64(&mut buf, 0x0102030405060708);
        assert_eq!(get_fixed32(&buf).unwrap(), 0xdeadbeef);
        assert_eq!(get_fixed64(&buf[4..]).unwrap(), 0x0102030405060708);
    }

    #[test]
    fn crc_mask_round_trip() {
        let crc = crc32fast::hash(b"hello world");
        let masked = mask(crc);
        assert_ne!(masked, crc);
        assert_eq!(unmask(masked), crc);
    }

    #[test]
    fn consume_decimal_number_scenario() {
        assert_eq!(
            consume_decimal_number("0012345.log"),
            Some((12345, ".log"))
        );
        assert_eq!(
            consume_decimal_number("18446744073709551615.suffix"),
            Some((u64::MAX, ".suffix"))
        );
        assert_eq!(consume_decimal_number("18446744073709551616"), None);
        assert_eq!(consume_decimal_number("nope"), None);
    }

    proptest::proptest! {
        #[test]
        fn varint64_round_trips_for_any_value(v: u64) {
            let mut buf = Vec::new();
            put_varint64(&mut buf, v);
            proptest::prop_assert_eq!(buf.len(), varint_length(v));
            let (decoded, rest) = get_varint64(&buf).unwrap();
            proptest::prop_assert_eq!(decoded, v);
            proptest::prop_assert!(rest.is_empty());
        }

        #[test]
        fn varint32_round_trips_for_any_value(v: u32) {
            let mut buf = Vec::new();
            put_varint32(&mut buf, v);
            let (decoded, rest) = get_varint32(&buf).unwrap();
            proptest::prop_assert_eq!(decoded, v);
            proptest::prop_assert!(rest.is_empty());
        }

        #[test]
        fn crc_mask_round_trips_for_any_input(data: Vec<u8>) {
            let crc = crc32fast::hash(&data);
            proptest::prop_assert_eq!(unmask(mask(crc)), crc);
        }

        #[test]
        fn masked_crc_detects_single_byte_flips(mut data in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..64), flip_index in 0usize..64, flip_bit in 0u8..8) {
            let index = flip_index % data.len();
            let original = masked_crc(&data);
            data[index] ^= 1 << flip_bit;
            proptest::prop_assert_ne!(masked_crc(&data), original);
        }
    }
}
