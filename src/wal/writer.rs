//! Log writer (component B, write half): fragments logical records into
//! block-aligned physical records.

use crate::env::WritableFile;
use crate::error::Result;
use crate::wal::record::{Record, RecordType, HEADER_SIZE};

/// Writes logical records into a block-partitioned log file.
///
/// A block never contains a fragment's header without also containing at
/// least one payload byte written in that same block: when fewer than
/// `HEADER_SIZE` bytes remain, the rest of the block is zero-padded and
/// writing resumes at the next block boundary.
pub struct LogWriter<W: WritableFile> {
    file: W,
    block_size: usize,
    block_offset: usize,
}

impl<W: WritableFile> LogWriter<W> {
    /// Wraps a fresh, empty `WritableFile`.
    pub fn new(file: W, block_size: usize) -> Self {
        Self { file, block_size, block_offset: 0 }
    }

    /// Wraps a `WritableFile` that already has `existing_length` bytes
    /// written, resuming at the correct offset within its current block.
    pub fn resuming(file: W, block_size: usize, existing_length: u64) -> Self {
        let block_offset = (existing_length % block_size as u64) as usize;
        Self { file, block_size, block_offset }
    }

    /// Appends one logical record, fragmenting it across block boundaries
    /// as needed. An empty payload still emits a single `FULL` record.
    pub fn add_record(&mut self, payload: &[u8]) -> Result<()> {
        let mut data = payload;
        let mut is_first_fragment = true;

        loop {
            let leftover = self.block_size - self.block_offset;
            if leftover < HEADER_SIZE {
                if leftover > 0 {
                    self.file.append(&vec![0u8; leftover])?;
                }
                self.block_offset = 0;
            }

            let avail = self.block_size - self.block_offset - HEADER_SIZE;
            let fragment_len = data.len().min(avail);
            let is_last_fragment = fragment_len == data.len();

            let record_type = match (is_first_fragment, is_last_fragment) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };

            let record = Record::new(record_type, data[..fragment_len].to_vec());
            let encoded = record.encode();
            self.file.append(&encoded)?;
            self.block_offset += encoded.len();

            data = &data[fragment_len..];
            is_first_fragment = false;

            if data.is_empty() {
                return Ok(());
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }

    pub fn close(mut self) -> Result<()> {
        self.file.close()
    }

    pub fn block_offset(&self) -> usize {
        self.block_offset
    }
}
