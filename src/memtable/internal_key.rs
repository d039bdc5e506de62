//! Internal key format: `user_key || tag`.
//!
//! `tag` is a little-endian 64-bit word equal to `(sequence << 8) |
//! value_type`. Ordering is ascending by user key, then descending by
//! sequence, then descending by value type, so a forward seek to an
//! internal key lands on the newest visible version of a user key.

use std::cmp::Ordering;

use crate::comparator::Comparator;

/// Whether an internal key records a live value or a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    /// A tombstone marking the key deleted as of this sequence.
    Delete = 0,
    /// A normal value.
    Put = 1,
}

impl ValueType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ValueType::Delete),
            1 => Some(ValueType::Put),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The largest sequence number a 56-bit counter can hold.
pub const MAX_SEQUENCE_NUMBER: u64 = (1u64 << 56) - 1;

/// Packs `(sequence, value_type)` into the 64-bit tag word.
pub fn pack_tag(sequence: u64, value_type: ValueType) -> u64 {
    debug_assert!(sequence <= MAX_SEQUENCE_NUMBER, "sequence number overflows 56 bits");
    (sequence << 8) | value_type.as_u8() as u64
}

/// Unpacks a tag word into `(sequence, value_type)`. Returns `None` if the
/// low byte isn't a recognized value type.
pub fn unpack_tag(tag: u64) -> Option<(u64, ValueType)> {
    let value_type = ValueType::from_u8((tag & 0xff) as u8)?;
    Some((tag >> 8, value_type))
}

/// Appends `user_key || tag` to `out`.
pub fn append_internal_key(out: &mut Vec<u8>, user_key: &[u8], sequence: u64, value_type: ValueType) {
    out.extend_from_slice(user_key);
    out.extend_from_slice(&pack_tag(sequence, value_type).to_le_bytes());
}

/// Builds a standalone internal key buffer.
pub fn internal_key(user_key: &[u8], sequence: u64, value_type: ValueType) -> Vec<u8> {
    let mut buf = Vec::with_capacity(user_key.len() + 8);
    append_internal_key(&mut buf, user_key, sequence, value_type);
    buf
}

/// Splits a `user_key || tag` buffer back into its parts. Returns `None`
/// if `data` is shorter than the 8-byte tag or the tag's type byte is
/// invalid.
pub fn split_internal_key(data: &[u8]) -> Option<(&[u8], u64, ValueType)> {
    if data.len() < 8 {
        return None;
    }
    let (user_key, tag_bytes) = data.split_at(data.len() - 8);
    let tag = u64::from_le_bytes(tag_bytes.try_into().ok()?);
    let (sequence, value_type) = unpack_tag(tag)?;
    Some((user_key, sequence, value_type))
}

/// Returns just the user-key prefix of an internal key.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    &internal_key[..internal_key.len() - 8]
}

/// Orders internal keys: user key ascending (via `cmp`), then sequence
/// descending, then value type descending.
pub fn compare_internal_keys(cmp: &dyn Comparator, a: &[u8], b: &[u8]) -> Ordering {
    let (a_user, a_seq, a_type) = split_internal_key(a).expect("well-formed internal key");
    let (b_user, b_seq, b_type) = split_internal_key(b).expect("well-formed internal key");
    match cmp.compare(a_user, b_user) {
        Ordering::Equal => match b_seq.cmp(&a_seq) {
            Ordering::Equal => b_type.cmp(&a_type),
            ord => ord,
        },
        ord => ord,
    }
}

/// The read-path key: `varint(internal_key_len) || internal_key`, built
/// from a user key and an upper-bound sequence (the snapshot).
pub fn lookup_key(user_key: &[u8], sequence: u64) -> Vec<u8> {
    let ikey_len = user_key.len() + 8;
    let mut buf = Vec::with_capacity(crate::codec::varint_length(ikey_len as u64) + ikey_len);
    crate::codec::put_varint32(&mut buf, ikey_len as u32);
    append_internal_key(&mut buf, user_key, sequence, ValueType::Put);
    buf
}
