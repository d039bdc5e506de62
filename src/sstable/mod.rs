//! SSTable (Sorted String Table) implementation (component E).
//!
//! SSTable is an immutable, sorted file format for storing key-value
//! pairs, designed for efficient sequential writes and random reads.
//!
//! ## File Format
//!
//! ```text
//! [data_block_0][trailer][data_block_1][trailer]...
//! [filter_block][trailer]            (optional)
//! [meta_index_block][trailer]
//! [index_block][trailer]
//! [footer: 48 bytes]
//! ```
//!
//! Trailer: `uint8 compression_type || uint32 masked_crc`.
//!
//! ## Block Format
//!
//! Each block contains prefix-compressed key-value entries plus a
//! restart-point trailer enabling binary search; see [`block`].
//!
//! ## Index Format
//!
//! The index block maps the shortest separator greater than a data
//! block's largest key to that block's handle.

pub mod block;
pub mod builder;
pub mod filter_block;
pub mod footer;
pub mod index;
pub mod reader;

pub use block::{Block, BlockBuilder, BlockIterator};
pub use builder::SSTableBuilder;
pub use footer::{BlockHandle, Footer};
pub use index::IndexBlock;
pub use reader::SSTableReader;

pub use crate::config::CompressionType;

/// Default block size (4KB).
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Footer size in bytes (fixed).
pub const FOOTER_SIZE: usize = 48;

/// Magic number stamped at the end of every SSTable file's footer.
pub const MAGIC_NUMBER: u64 = 0xdb4775248b80fb57;
