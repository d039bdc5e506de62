//! # aidb - on-disk table construction for an LSM-Tree storage engine
//!
//! This crate builds the pieces an LSM-tree storage engine needs to turn
//! buffered writes into an immutable, sorted, on-disk table:
//!
//! - [`memtable`]: an in-memory, arena-backed, multi-version ordered
//!   buffer of writes (component F).
//! - [`wal`]: the write-ahead-log record framer, fragmenting logical
//!   records into block-aligned physical ones with masked CRCs
//!   (component B).
//! - [`sstable`]: the block builder, filter block, index block, table
//!   builder, and table reader that together make up the SSTable file
//!   format (components C, D, E).
//! - [`table_build`]: the driver that drains a memtable iterator into
//!   one finished SSTable file (component G).
//! - [`cache`]: a bounded table cache keyed by file number (component K).
//! - [`codec`], [`comparator`], [`filter_policy`], [`env`], [`config`]:
//!   the varint/CRC codec, pluggable key ordering, pluggable membership
//!   filter, filesystem abstraction, and shared tunables the components
//!   above are built against.
//!
//! Driving recovery, scheduling compaction, merging iterators across
//! levels, and every other concern of a full embedded database are
//! deliberately out of scope: this crate stops at "one sorted run of
//! writes becomes one table file".
//!
//! ## Example: memtable to table file
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aidb::config::Options;
//! use aidb::filter_policy::BloomFilterPolicy;
//! use aidb::memtable::{MemTable, ValueType};
//! use aidb::table_build::{build_table, memtable_flush_view};
//!
//! # fn main() -> Result<(), aidb::Error> {
//! let memtable = MemTable::new();
//! memtable.add(1, ValueType::Put, b"key1", b"value1");
//! memtable.add(2, ValueType::Put, b"key2", b"value2");
//!
//! let policy: Arc<dyn aidb::filter_policy::FilterPolicy> = Arc::new(BloomFilterPolicy::new(10));
//! let meta = build_table(
//!     "./data",
//!     1,
//!     &Options::default(),
//!     None,
//!     Some(policy),
//!     None,
//!     memtable_flush_view(memtable.iter()),
//! )?;
//! # let _ = meta;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod codec;
pub mod comparator;
pub mod config;
pub mod env;
pub mod error;
pub mod filter_policy;
pub mod memtable;
pub mod sstable;
pub mod table_build;
pub mod wal;

pub use config::Options;
pub use error::{Error, Result};
