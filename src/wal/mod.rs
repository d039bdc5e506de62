//! Log record framer (component B): the write-ahead-log physical format
//! used to persist memtable writes before they are applied.
//!
//! - [`record`]: the physical record layout and its masked CRC.
//! - [`writer`]: fragments logical records into block-aligned physical ones.
//! - [`reader`]: reassembles physical records back into logical ones.
//!
//! Driving recovery (replaying a log into a fresh memtable at `DB::open`
//! time) is not this crate's concern; this module only frames and parses
//! the bytes.
//!
//! ```rust,no_run
//! use aidb::env::PosixWritableFile;
//! use aidb::wal::{LogReader, LogWriter};
//!
//! # fn main() -> Result<(), aidb::Error> {
//! let mut writer = LogWriter::new(PosixWritableFile::create("data.log")?, 32 * 1024);
//! writer.add_record(b"key1:value1")?;
//! writer.add_record(b"key2:value2")?;
//! writer.sync()?;
//! writer.close()?;
//!
//! let mut reader = LogReader::open("data.log")?;
//! while let Some(entry) = reader.read_record()? {
//!     println!("recovered: {:?}", entry);
//! }
//! # Ok(())
//! # }
//! ```

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::LogReader;
pub use record::{Record, RecordType};
pub use writer::LogWriter;
