//! SSTable footer: the fixed 48-byte trailer pointing at the index and
//! meta-index blocks.

use crate::codec::{get_varint64, put_varint64};
use crate::error::{Error, Result};
use crate::sstable::MAGIC_NUMBER;
use std::io::{Read, Write};

/// `(offset, size)` of a block within an SSTable file, varint-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Encodes as `varint(offset) || varint(size)`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(crate::codec::MAX_VARINT_LEN_U64 * 2);
        put_varint64(&mut buf, self.offset);
        put_varint64(&mut buf, self.size);
        buf
    }

    /// Decodes a handle from the front of `data`, returning the handle
    /// and the remaining slice.
    pub fn decode_from(data: &[u8]) -> Result<(Self, &[u8])> {
        let (offset, rest) = get_varint64(data)?;
        let (size, rest) = get_varint64(rest)?;
        Ok((Self { offset, size }, rest))
    }

    /// Decodes a handle that occupies the entirety of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (handle, _) = Self::decode_from(data)?;
        Ok(handle)
    }

    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }
}

/// The footer is the last [`super::FOOTER_SIZE`] bytes of an SSTable
/// file.
///
/// Format: `varint(meta_index_handle) || varint(index_handle) ||
/// zero-padding || fixed64(magic)`. The two varint-encoded handles are
/// packed into the leading 40 bytes (zero-padded) so the on-disk size
/// never depends on how small the offsets happen to be; a reader can
/// always seek to `file_size - FOOTER_SIZE` without consulting any
/// other metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    pub meta_index_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

/// Bytes reserved for the two varint-encoded handles before the magic.
const ENCODED_HANDLES_SIZE: usize = super::FOOTER_SIZE - 8;

impl Footer {
    pub fn new(meta_index_handle: BlockHandle, index_handle: BlockHandle) -> Self {
        Self { meta_index_handle, index_handle }
    }

    /// Encodes the footer to exactly [`super::FOOTER_SIZE`] bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut handles = Vec::with_capacity(ENCODED_HANDLES_SIZE);
        handles.extend_from_slice(&self.meta_index_handle.encode());
        handles.extend_from_slice(&self.index_handle.encode());
        if handles.len() > ENCODED_HANDLES_SIZE {
            // Handles are at most 2 * MAX_VARINT_LEN_U64 bytes each; this
            // only trips if FOOTER_SIZE was misconfigured.
            panic!("encoded block handles overflow the footer's fixed region");
        }
        handles.resize(ENCODED_HANDLES_SIZE, 0);

        let mut buf = Vec::with_capacity(super::FOOTER_SIZE);
        buf.extend_from_slice(&handles);
        buf.extend_from_slice(&MAGIC_NUMBER.to_le_bytes());
        assert_eq!(buf.len(), super::FOOTER_SIZE);
        buf
    }

    /// Decodes a footer from exactly [`super::FOOTER_SIZE`] bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != super::FOOTER_SIZE {
            return Err(Error::corruption(format!(
                "footer size mismatch: expected {}, got {}",
                super::FOOTER_SIZE,
                data.len()
            )));
        }

        let magic_offset = super::FOOTER_SIZE - 8;
        let magic = u64::from_le_bytes(data[magic_offset..].try_into().unwrap());
        if magic != MAGIC_NUMBER {
            return Err(Error::corruption(format!(
                "invalid SSTable magic number: expected {:#x}, got {:#x}",
                MAGIC_NUMBER, magic
            )));
        }

        let handles = &data[..magic_offset];
        let (meta_index_handle, rest) = BlockHandle::decode_from(handles)?;
        let (index_handle, _) = BlockHandle::decode_from(rest)?;

        Ok(Self { meta_index_handle, index_handle })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = vec![0u8; super::FOOTER_SIZE];
        reader.read_exact(&mut buf)?;
        Self::decode(&buf)
    }
}
