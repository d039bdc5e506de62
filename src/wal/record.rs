//! Log record framing (component B, physical-record layer).
//!
//! A physical record on the wire: `fixed32(masked_crc) || fixed16(payload_len)
//! || uint8(type) || payload[payload_len]`. The checksum covers `type ||
//! payload` and is masked via [`crate::codec::masked_crc`] before being
//! stored, and unmasked again before comparison.

use bytes::{Buf, BufMut};

use crate::codec::masked_crc;
use crate::error::{Error, Result};

/// Maximum size of a single physical record's payload.
pub const MAX_RECORD_SIZE: usize = 32 * 1024;

/// Size of the physical record header: `masked_crc(4) || length(2) || type(1)`.
pub const HEADER_SIZE: usize = 7;

/// Fragment role of a physical record within a logical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// The logical record fits entirely in one physical record.
    Full = 1,
    /// The first fragment of a logical record spanning multiple blocks.
    First = 2,
    /// A middle fragment.
    Middle = 3,
    /// The last fragment.
    Last = 4,
}

impl RecordType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordType::Full),
            2 => Ok(RecordType::First),
            3 => Ok(RecordType::Middle),
            4 => Ok(RecordType::Last),
            _ => Err(Error::corruption(format!("invalid record type: {}", value))),
        }
    }
}

/// A single physical record.
#[derive(Debug, Clone)]
pub struct Record {
    pub record_type: RecordType,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(record_type: RecordType, data: Vec<u8>) -> Self {
        Self { record_type, data }
    }

    /// Encodes the record: `fixed32(masked_crc) || fixed16(len) || type || data`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.data.len());
        buf.put_u32_le(0);
        buf.put_u16_le(self.data.len() as u16);
        buf.put_u8(self.record_type as u8);
        buf.extend_from_slice(&self.data);

        let checksum = Self::checksum(self.record_type, &self.data);
        buf[0..4].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Decodes a record from a header-plus-payload buffer, verifying the
    /// masked checksum over `type || payload`.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::corruption(format!("record header too short: {} bytes", data.len())));
        }

        let masked = data.get_u32_le();
        let length = data.get_u16_le() as usize;
        let record_type = RecordType::from_u8(data.get_u8())?;

        if data.len() < length {
            return Err(Error::corruption(format!(
                "incomplete record: expected {} payload bytes, got {}",
                length,
                data.len()
            )));
        }

        let payload = data[..length].to_vec();
        let expected = Self::checksum(record_type, &payload);
        if masked != expected {
            return Err(Error::corruption(format!(
                "record checksum mismatch: expected {:#x}, got {:#x}",
                expected, masked
            )));
        }

        Ok(Record { record_type, data: payload })
    }

    fn checksum(record_type: RecordType, data: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(1 + data.len());
        buf.push(record_type as u8);
        buf.extend_from_slice(data);
        masked_crc(&buf)
    }

    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_encode_decode_round_trips() {
        let data = b"hello world".to_vec();
        let record = Record::new(RecordType::Full, data.clone());

        let encoded = record.encode();
        let decoded = Record::decode(&encoded).unwrap();

        assert_eq!(decoded.record_type, RecordType::Full);
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn every_record_type_round_trips() {
        for record_type in [RecordType::Full, RecordType::First, RecordType::Middle, RecordType::Last] {
            let record = Record::new(record_type, b"test".to_vec());
            let encoded = record.encode();
            let decoded = Record::decode(&encoded).unwrap();
            assert_eq!(decoded.record_type, record_type);
        }
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let record = Record::new(RecordType::Full, b"test data".to_vec());
        let mut encoded = record.encode();
        encoded[HEADER_SIZE] ^= 0xff;

        match Record::decode(&encoded) {
            Err(Error::Corruption(_)) => {}
            other => panic!("expected corruption error, got {:?}", other),
        }
    }

    #[test]
    fn empty_payload_round_trips() {
        let record = Record::new(RecordType::Full, vec![]);
        let encoded = record.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);
        let decoded = Record::decode(&encoded).unwrap();
        assert_eq!(decoded.data.len(), 0);
    }

    #[test]
    fn max_size_payload_round_trips() {
        let data = vec![0xab; MAX_RECORD_SIZE];
        let record = Record::new(RecordType::Full, data.clone());
        let encoded = record.encode();
        let decoded = Record::decode(&encoded).unwrap();
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn encoded_size_matches_header_plus_payload() {
        let record = Record::new(RecordType::Full, b"test".to_vec());
        assert_eq!(record.encoded_size(), HEADER_SIZE + 4);
    }

    #[test]
    fn type_extends_checksum_like_a_prefix() {
        let full_checksum = masked_crc(b"\x01hello world");
        let record = Record::new(RecordType::Full, b"hello world".to_vec());
        let encoded = record.encode();
        assert_eq!(u32::from_le_bytes(encoded[0..4].try_into().unwrap()), full_checksum);
    }
}
