//! Table builder (component E, write half): orchestrates emission of
//! one SSTable file from a stream of sorted key-value pairs.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::comparator::{BytewiseComparator, Comparator};
use crate::config::{CompressionType, Options};
use crate::env::WritableFile;
use crate::error::{Error, Result};
use crate::filter_policy::FilterPolicy;
use crate::sstable::block::BlockBuilder;
use crate::sstable::filter_block::FilterBlockBuilder;
use crate::sstable::footer::{BlockHandle, Footer};
use crate::sstable::index::{IndexBlockBuilder, IndexEntry};

/// Builds an SSTable onto any [`WritableFile`].
///
/// Usage:
/// ```no_run
/// use aidb::env::PosixWritableFile;
/// use aidb::config::Options;
/// use aidb::sstable::SSTableBuilder;
///
/// # fn main() -> Result<(), aidb::Error> {
/// let file = PosixWritableFile::create("table.ldb")?;
/// let mut builder = SSTableBuilder::new(file, &Options::default(), None, None);
/// builder.add(b"key1", b"value1")?;
/// builder.add(b"key2", b"value2")?;
/// builder.finish()?;
/// # Ok(())
/// # }
/// ```
pub struct SSTableBuilder<W: WritableFile> {
    file: W,
    offset: u64,
    data_block: BlockBuilder,
    index_block: IndexBlockBuilder,
    filter_block: Option<FilterBlockBuilder>,
    filter_name: Option<&'static str>,
    comparator: Arc<dyn Comparator>,
    last_key: Vec<u8>,
    num_entries: u64,
    closed: bool,
    pending_index_entry: Option<BlockHandle>,
    block_size: usize,
    block_restart_interval: usize,
    compression: CompressionType,
    status: Option<Error>,
}

impl<W: WritableFile> SSTableBuilder<W> {
    /// Creates a new builder. `comparator` defaults to
    /// [`BytewiseComparator`] when `None`; `filter_policy` disables
    /// filter-block construction when `None`.
    pub fn new(
        file: W,
        options: &Options,
        comparator: Option<Arc<dyn Comparator>>,
        filter_policy: Option<Arc<dyn FilterPolicy>>,
    ) -> Self {
        let filter_name = filter_policy.as_ref().map(|p| p.name());
        let filter_block = filter_policy.map(FilterBlockBuilder::new);
        Self {
            file,
            offset: 0,
            data_block: BlockBuilder::new(options.block_restart_interval),
            index_block: IndexBlockBuilder::new(),
            filter_block,
            filter_name,
            comparator: comparator.unwrap_or_else(|| Arc::new(BytewiseComparator)),
            last_key: Vec::new(),
            num_entries: 0,
            closed: false,
            pending_index_entry: None,
            block_size: options.block_size,
            block_restart_interval: options.block_restart_interval,
            compression: options.compression,
            status: None,
        }
    }

    fn check_status(&self) -> Result<()> {
        if let Some(ref err) = self.status {
            return Err(err.clone());
        }
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Error {
        log::error!("table builder I/O failure: {}", err);
        self.status = Some(err.clone());
        err
    }

    /// Adds a key-value pair. Keys must be added in ascending order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_status()?;
        if self.closed {
            return Err(Error::invalid_argument("add after finish/abandon"));
        }
        if self.num_entries > 0 && self.comparator.compare(key, &self.last_key) != Ordering::Greater
        {
            return Err(Error::invalid_argument("keys must be added in sorted order"));
        }

        if let Some(handle) = self.pending_index_entry.take() {
            let mut separator = self.last_key.clone();
            self.comparator.find_shortest_separator(&mut separator, key);
            self.index_block.add_entry(&IndexEntry::new(separator, handle));
        }

        if let Some(filter) = self.filter_block.as_mut() {
            filter.add_key(key);
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_entries += 1;
        self.data_block.add(key, value);

        if self.data_block.current_size_estimate() >= self.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Flushes the current data block, if any, recording its handle as
    /// a pending index entry.
    pub fn flush(&mut self) -> Result<()> {
        self.check_status()?;
        if self.data_block.is_empty() {
            return Ok(());
        }
        let old = std::mem::replace(
            &mut self.data_block,
            BlockBuilder::new(self.block_restart_interval),
        );
        let handle = self.write_block(old)?;
        self.pending_index_entry = Some(handle);
        if let Err(e) = self.file.flush() {
            return Err(self.fail(e));
        }
        if let Some(filter) = self.filter_block.as_mut() {
            filter.start_block(self.offset);
        }
        Ok(())
    }

    /// Compresses (if profitable) and writes a finished data/meta-index
    /// block, returning its handle.
    fn write_block(&mut self, block: BlockBuilder) -> Result<BlockHandle> {
        let raw = block.finish();
        let (payload, type_byte) = self.maybe_compress(&raw);
        self.write_raw_block(&payload, type_byte)
    }

    fn maybe_compress(&self, raw: &[u8]) -> (Vec<u8>, u8) {
        match self.compression {
            CompressionType::None => (raw.to_vec(), CompressionType::None as u8),
            CompressionType::Snappy => self.try_compress(raw, CompressionType::Snappy, |raw| {
                #[cfg(feature = "snappy")]
                {
                    snap::raw::Encoder::new().compress_vec(raw).ok()
                }
                #[cfg(not(feature = "snappy"))]
                {
                    let _ = raw;
                    None
                }
            }),
            CompressionType::Lz4 => self.try_compress(raw, CompressionType::Lz4, |raw| {
                #[cfg(feature = "lz4-compression")]
                {
                    lz4::block::compress(raw, None, false).ok()
                }
                #[cfg(not(feature = "lz4-compression"))]
                {
                    let _ = raw;
                    None
                }
            }),
        }
    }

    fn try_compress(
        &self,
        raw: &[u8],
        kind: CompressionType,
        compressor: impl FnOnce(&[u8]) -> Option<Vec<u8>>,
    ) -> (Vec<u8>, u8) {
        match compressor(raw) {
            Some(compressed) if compressed.len() < raw.len() * 7 / 8 => (compressed, kind as u8),
            _ => (raw.to_vec(), CompressionType::None as u8),
        }
    }

    /// Appends `data || type:1 || masked_crc(data || type):4`, recording
    /// and returning its handle.
    fn write_raw_block(&mut self, data: &[u8], type_byte: u8) -> Result<BlockHandle> {
        self.check_status()?;
        let handle = BlockHandle::new(self.offset, data.len() as u64 + 5);

        let mut crc_input = Vec::with_capacity(data.len() + 1);
        crc_input.extend_from_slice(data);
        crc_input.push(type_byte);
        let crc = crate::codec::masked_crc(&crc_input);

        if let Err(e) = self.file.append(data) {
            return Err(self.fail(e));
        }
        if let Err(e) = self.file.append(&[type_byte]) {
            return Err(self.fail(e));
        }
        if let Err(e) = self.file.append(&crc.to_le_bytes()) {
            return Err(self.fail(e));
        }
        self.offset += data.len() as u64 + 5;
        Ok(handle)
    }

    /// Finalizes the table: flushes the trailing data block, writes the
    /// filter block, meta-index block, index block, and footer.
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        self.closed = true;

        let filter_handle = match self.filter_block.take() {
            Some(builder) => {
                let encoded = builder.finish();
                Some(self.write_raw_block(&encoded, CompressionType::None as u8)?)
            }
            None => None,
        };

        let mut meta_index_builder = BlockBuilder::new(1);
        if let (Some(handle), Some(filter)) = (&filter_handle, self.filter_name) {
            let key = format!("filter.{filter}");
            meta_index_builder.add(key.as_bytes(), &handle.encode());
        }
        let meta_index_handle = self.write_block(meta_index_builder)?;

        if let Some(handle) = self.pending_index_entry.take() {
            let mut successor = self.last_key.clone();
            self.comparator.find_short_successor(&mut successor);
            self.index_block.add_entry(&IndexEntry::new(successor, handle));
        }
        let index_block = std::mem::replace(&mut self.index_block, IndexBlockBuilder::new());
        let index_handle = self.write_index_block(index_block)?;

        let footer = Footer::new(meta_index_handle, index_handle);
        if let Err(e) = self.file.append(&footer.encode()) {
            return Err(self.fail(e));
        }
        if let Err(e) = self.file.sync() {
            return Err(self.fail(e));
        }
        if let Err(e) = self.file.close() {
            return Err(self.fail(e));
        }

        let total_size = self.offset + crate::sstable::FOOTER_SIZE as u64;
        log::info!(
            "finished table: {} entries, {} bytes",
            self.num_entries,
            total_size
        );
        Ok(total_size)
    }

    fn write_index_block(&mut self, builder: IndexBlockBuilder) -> Result<BlockHandle> {
        let raw = builder.finish();
        let (payload, type_byte) = self.maybe_compress(&raw);
        self.write_raw_block(&payload, type_byte)
    }

    /// Abandons the table: marks it closed without writing anything
    /// further. Leaves any partially written file for the caller to
    /// delete.
    pub fn abandon(mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Current file size estimate: bytes already flushed plus the
    /// in-progress data block.
    pub fn file_size(&self) -> u64 {
        self.offset + self.data_block.current_size_estimate() as u64
    }
}
