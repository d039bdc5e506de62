//! Tunables for the table-build pipeline: block sizing, compression,
//! filter density, and log framing.

/// Options shared by the block builder, table builder, and log framer.
#[derive(Debug, Clone)]
pub struct Options {
    /// Target size (bytes) at which a data block is flushed.
    /// Default: 4KB
    pub block_size: usize,

    /// Number of entries between restart points in a data block.
    /// Default: 16
    pub block_restart_interval: usize,

    /// Compression algorithm applied to data/meta-index blocks.
    /// Default: CompressionType::Snappy (falls back to None if the
    /// `snappy` feature is disabled).
    pub compression: CompressionType,

    /// Bits per key dedicated to the bloom filter. Set to 0 to disable
    /// filter construction entirely.
    /// Default: 10
    pub filter_bits_per_key: usize,

    /// Block size (bytes) the log framer partitions a log file into.
    /// Default: 32KB
    pub log_block_size: usize,

    /// Bounded capacity of the table cache (component K), in open tables.
    /// Default: 64
    pub table_cache_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            block_size: 4 * 1024,
            block_restart_interval: 16,
            compression: CompressionType::default(),
            filter_bits_per_key: 10,
            log_block_size: 32 * 1024,
            table_cache_capacity: 64,
        }
    }
}

/// Compression algorithms supported for SSTable blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression.
    None = 0,

    /// Snappy compression (fast, moderate compression ratio).
    Snappy = 1,

    /// LZ4 compression (very fast, lower compression ratio).
    Lz4 = 2,
}

impl CompressionType {
    /// Convert from the on-disk trailer byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Snappy),
            2 => Some(CompressionType::Lz4),
            _ => None,
        }
    }
}

impl Default for CompressionType {
    fn default() -> Self {
        #[cfg(feature = "snappy")]
        return CompressionType::Snappy;

        #[cfg(not(feature = "snappy"))]
        CompressionType::None
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data block target size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the data block restart interval.
    pub fn block_restart_interval(mut self, interval: usize) -> Self {
        self.block_restart_interval = interval;
        self
    }

    /// Sets the compression algorithm.
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the bloom filter's bits-per-key. Zero disables filters.
    pub fn filter_bits_per_key(mut self, bits: usize) -> Self {
        self.filter_bits_per_key = bits;
        self
    }

    /// Sets the log framer's block size.
    pub fn log_block_size(mut self, size: usize) -> Self {
        self.log_block_size = size;
        self
    }

    /// Validates the options, returning an error if any are nonsensical.
    pub fn validate(&self) -> crate::Result<()> {
        if self.block_size == 0 {
            return Err(crate::Error::invalid_argument("block_size must be > 0"));
        }
        if self.block_restart_interval == 0 {
            return Err(crate::Error::invalid_argument(
                "block_restart_interval must be > 0",
            ));
        }
        if self.log_block_size < 32 {
            return Err(crate::Error::invalid_argument(
                "log_block_size must be large enough to hold at least one header",
            ));
        }
        Ok(())
    }
}
