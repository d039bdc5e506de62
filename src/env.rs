//! Environment (component H): the filesystem-facing layer the core
//! components consume but never construct. `PosixWritableFile` is the
//! one real `WritableFile` implementation this crate ships, plus the
//! file-naming helpers the table-build driver and log framer key off of.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error as ThisError;

use crate::codec::consume_decimal_number;
use crate::error::{Error, Result};

/// Append-only output consumed by the log framer and table builder.
///
/// Matches the source's `WritableFile` contract: `Append` is the only
/// growth operation, there is no seeking, and every method can fail.
pub trait WritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// A buffered `std::fs::File`-backed `WritableFile`. The name is kept
/// for continuity with the source's vocabulary even though the
/// implementation goes through `std::fs` rather than raw POSIX calls.
pub struct PosixWritableFile {
    writer: Option<BufWriter<File>>,
}

impl PosixWritableFile {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self { writer: Some(BufWriter::new(file)) })
    }

    pub fn open_append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: Some(BufWriter::new(file)) })
    }

    fn writer_mut(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::invalid_argument("write after close"))
    }
}

impl WritableFile for PosixWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.writer_mut()?.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer_mut()?.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        let writer = self.writer_mut()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Random-access read capability for table/log readers: open by path,
/// then pull exact byte ranges without disturbing a shared cursor.
pub struct RandomAccessFile {
    file: File,
}

impl RandomAccessFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self { file: File::open(path)? })
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn read_exact_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Errors raised while parsing or classifying a database file name.
/// A satellite leaf error, kept separate from the central `Error` enum
/// since callers either recover (try the next kind) or treat it as an
/// `InvalidArgument`; it never participates in sticky builder status.
#[derive(Debug, ThisError)]
pub enum FileNameError {
    #[error("file name does not match any known kind: {0}")]
    Unrecognized(String),
}

/// The kind of file a name was recognized as, with its embedded number
/// where one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Log(u64),
    Table(u64),
    Descriptor(u64),
    Current,
    Lock,
}

fn numbered_name(dbname: &str, number: u64, suffix: &str) -> String {
    format!("{}/{:06}.{}", dbname, number, suffix)
}

pub fn log_file_name(dbname: &str, number: u64) -> String {
    numbered_name(dbname, number, "log")
}

pub fn table_file_name(dbname: &str, number: u64) -> String {
    numbered_name(dbname, number, "ldb")
}

pub fn descriptor_file_name(dbname: &str, number: u64) -> String {
    format!("{}/MANIFEST-{:06}", dbname, number)
}

pub fn current_file_name(dbname: &str) -> String {
    format!("{}/CURRENT", dbname)
}

pub fn lock_file_name(dbname: &str) -> String {
    format!("{}/LOCK", dbname)
}

/// Recognizes the basename of a database file and extracts its
/// embedded number, using the same `ConsumeDecimalNumber` parsing
/// semantics as the log-record framer's scenario 4.
pub fn parse_file_name(basename: &str) -> std::result::Result<FileKind, FileNameError> {
    if basename == "CURRENT" {
        return Ok(FileKind::Current);
    }
    if basename == "LOCK" {
        return Ok(FileKind::Lock);
    }
    if let Some(rest) = basename.strip_prefix("MANIFEST-") {
        if let Some((number, "")) = consume_decimal_number(rest) {
            return Ok(FileKind::Descriptor(number));
        }
        return Err(FileNameError::Unrecognized(basename.to_string()));
    }
    if let Some((number, remainder)) = consume_decimal_number(basename) {
        match remainder {
            ".log" => return Ok(FileKind::Log(number)),
            ".ldb" => return Ok(FileKind::Table(number)),
            _ => {}
        }
    }
    Err(FileNameError::Unrecognized(basename.to_string()))
}

/// Joins a database directory and a file name into a path.
pub fn path_in_db(dbname: &str, name: &str) -> PathBuf {
    Path::new(dbname).join(name)
}
