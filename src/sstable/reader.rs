//! Table builder (component E, read half): opens a finished SSTable
//! file and serves point lookups and full-scan iteration against it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::masked_crc;
use crate::env::{parse_file_name, FileKind, RandomAccessFile};
use crate::error::{Error, Result};
use crate::filter_policy::{BloomFilterPolicy, FilterPolicy};
use crate::sstable::block::{Block, BlockIterator};
use crate::sstable::filter_block::FilterBlockReader;
use crate::sstable::footer::{BlockHandle, Footer};
use crate::sstable::index::IndexBlock;
use crate::sstable::{CompressionType, FOOTER_SIZE};

/// Reads an SSTable file built by [`super::SSTableBuilder`].
///
/// ```no_run
/// use aidb::sstable::SSTableReader;
///
/// # fn main() -> Result<(), aidb::Error> {
/// let reader = SSTableReader::open("000001.ldb")?;
/// if let Some(value) = reader.get(b"key1")? {
///     println!("found {:?}", value);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SSTableReader {
    file: Arc<RandomAccessFile>,
    file_number: Option<u64>,
    file_path: PathBuf,
    file_size: u64,
    index_block: IndexBlock,
    filter: Option<FilterBlockReader>,
}

impl SSTableReader {
    /// Opens an SSTable file, reading its footer, index block, and
    /// (if present) meta-index/filter blocks up front.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = RandomAccessFile::open(path)?;
        let file_size = file.len()?;
        if file_size < FOOTER_SIZE as u64 {
            return Err(Error::corruption("file too small to be a valid table"));
        }

        let footer_bytes = file.read_exact_at(file_size - FOOTER_SIZE as u64, FOOTER_SIZE)?;
        let footer = Footer::decode(&footer_bytes)?;

        let index_data = read_block_data(&file, &footer.index_handle)?;
        let index_block = IndexBlock::new(index_data)?;

        let filter = read_filter(&file, &footer)?;

        let file_number = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| parse_file_name(n).ok())
            .and_then(|kind| match kind {
                FileKind::Table(n) => Some(n),
                _ => None,
            });

        Ok(Self {
            file: Arc::new(file),
            file_number,
            file_path: path.to_path_buf(),
            file_size,
            index_block,
            filter,
        })
    }

    /// Looks up `key`, returning its value if present. A zero-length
    /// stored value denotes a tombstone and is reported as absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = match self.index_block.find_block(key)? {
            Some(h) => h,
            None => return Ok(None),
        };

        if let Some(reader) = &self.filter {
            if !reader.key_may_match(handle.offset, key) {
                return Ok(None);
            }
        }

        let block_data = read_block_data(&self.file, &handle)?;
        let block = Block::new(block_data)?;
        let mut iter = block.iter();
        iter.seek_to_first();

        while iter.next() {
            if iter.key() == key {
                let value = iter.value().to_vec();
                return Ok(if value.is_empty() { None } else { Some(value) });
            }
            if iter.key() > key {
                break;
            }
        }
        Ok(None)
    }

    pub fn num_blocks(&self) -> usize {
        self.index_block.len()
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn file_number(&self) -> Option<u64> {
        self.file_number
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Smallest key stored in the table, if any.
    pub fn smallest_key(&self) -> Result<Option<Vec<u8>>> {
        let mut iter = self.iter();
        iter.seek_to_first()?;
        Ok(if iter.valid() { Some(iter.key().to_vec()) } else { None })
    }

    /// Largest key stored in the table, if any.
    pub fn largest_key(&self) -> Result<Option<Vec<u8>>> {
        let mut iter = self.iter();
        iter.seek_to_first()?;
        let mut last = None;
        while iter.valid() {
            last = Some(iter.key().to_vec());
            iter.advance()?;
        }
        Ok(last)
    }

    /// Collects every key stored in the table, in order.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        let mut iter = self.iter();
        iter.seek_to_first()?;
        while iter.valid() {
            keys.push(iter.key().to_vec());
            iter.advance()?;
        }
        Ok(keys)
    }

    /// Creates an iterator over every key-value pair, in key order.
    pub fn iter(&self) -> SSTableIterator {
        let mut entries = Vec::new();
        let mut index_iter = self.index_block.iter();
        index_iter.seek_to_first();
        while index_iter.advance() {
            if let Ok(entry) = index_iter.entry() {
                entries.push(entry.handle);
            }
        }
        SSTableIterator {
            file: Arc::clone(&self.file),
            block_handles: entries,
            current_block_index: 0,
            current_block: None,
            current_block_iter: None,
        }
    }
}

fn read_block_data(file: &RandomAccessFile, handle: &BlockHandle) -> Result<Bytes> {
    let total_size = handle.size as usize;
    if total_size < 5 {
        return Err(Error::corruption("block too small for trailer"));
    }
    let buffer = file.read_exact_at(handle.offset, total_size)?;

    let data_size = total_size - 5;
    let data = &buffer[..data_size];
    let type_byte = buffer[data_size];
    let stored_crc = u32::from_le_bytes(buffer[data_size + 1..data_size + 5].try_into().unwrap());

    let mut crc_input = Vec::with_capacity(total_size - 4);
    crc_input.extend_from_slice(data);
    crc_input.push(type_byte);
    if masked_crc(&crc_input) != stored_crc {
        return Err(Error::corruption("block checksum mismatch"));
    }

    let compression = CompressionType::from_u8(type_byte)
        .ok_or_else(|| Error::corruption("unknown compression type byte"))?;
    let decompressed = match compression {
        CompressionType::None => data.to_vec(),
        CompressionType::Snappy => {
            #[cfg(feature = "snappy")]
            {
                snap::raw::Decoder::new()
                    .decompress_vec(data)
                    .map_err(|e| Error::corruption(format!("snappy decompress failed: {e}")))?
            }
            #[cfg(not(feature = "snappy"))]
            {
                return Err(Error::not_supported("snappy compression not enabled"));
            }
        }
        CompressionType::Lz4 => {
            #[cfg(feature = "lz4-compression")]
            {
                lz4::block::decompress(data, None)
                    .map_err(|e| Error::corruption(format!("lz4 decompress failed: {e}")))?
            }
            #[cfg(not(feature = "lz4-compression"))]
            {
                return Err(Error::not_supported("lz4 compression not enabled"));
            }
        }
    };
    Ok(Bytes::from(decompressed))
}

/// Parses the meta-index block for a `"filter." + policy name` entry
/// and, if present, reads and decodes the filter block it points at.
/// The `u64` alongside the reader is unused by lookups today (the
/// reader only needs the offset it is queried with) and is kept so the
/// base-lg can be surfaced to diagnostics later.
fn read_filter(file: &RandomAccessFile, footer: &Footer) -> Result<Option<FilterBlockReader>> {
    if footer.meta_index_handle.size == 0 {
        return Ok(None);
    }
    let meta_data = read_block_data(file, &footer.meta_index_handle)?;
    let meta_block = Block::new(meta_data)?;

    let policy: Arc<dyn FilterPolicy> = Arc::new(BloomFilterPolicy::default());
    let wanted_key = format!("filter.{}", policy.name());

    let mut iter: BlockIterator = meta_block.iter();
    iter.seek_to_first();
    while iter.next() {
        if iter.key() == wanted_key.as_bytes() {
            let handle = BlockHandle::decode(iter.value())?;
            let filter_data = read_raw_block(file, &handle)?;
            return Ok(Some(FilterBlockReader::new(policy, filter_data)));
        }
    }
    Ok(None)
}

/// Reads a block written via `WriteRawBlock`: the filter block is never
/// compressed, but it is still followed by a type byte and checksum.
fn read_raw_block(file: &RandomAccessFile, handle: &BlockHandle) -> Result<Vec<u8>> {
    Ok(read_block_data(file, handle)?.to_vec())
}

/// Iterates every key-value pair across all data blocks, in order.
pub struct SSTableIterator {
    file: Arc<RandomAccessFile>,
    block_handles: Vec<BlockHandle>,
    current_block_index: usize,
    current_block: Option<Block>,
    current_block_iter: Option<BlockIterator>,
}

impl SSTableIterator {
    pub fn seek_to_first(&mut self) -> Result<()> {
        self.current_block_index = 0;
        self.load_current_block()?;
        Ok(())
    }

    fn load_current_block(&mut self) -> Result<()> {
        if self.current_block_index >= self.block_handles.len() {
            self.current_block = None;
            self.current_block_iter = None;
            return Ok(());
        }
        let handle = self.block_handles[self.current_block_index];
        let block_data = read_block_data(&self.file, &handle)?;
        let block = Block::new(block_data)?;
        let mut iter = block.iter();
        iter.seek_to_first();
        iter.next();
        self.current_block = Some(block);
        self.current_block_iter = Some(iter);
        Ok(())
    }

    pub fn advance(&mut self) -> Result<bool> {
        if let Some(iter) = self.current_block_iter.as_mut() {
            if iter.valid() && iter.next() {
                return Ok(true);
            }
        }
        self.current_block_index += 1;
        self.load_current_block()?;
        Ok(self.current_block_iter.as_ref().map(|i| i.valid()).unwrap_or(false))
    }

    pub fn valid(&self) -> bool {
        self.current_block_iter.as_ref().map(|i| i.valid()).unwrap_or(false)
    }

    pub fn key(&self) -> &[u8] {
        self.current_block_iter.as_ref().expect("iterator not valid").key()
    }

    pub fn value(&self) -> &[u8] {
        self.current_block_iter.as_ref().expect("iterator not valid").value()
    }
}
