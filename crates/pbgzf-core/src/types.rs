use std::time::Duration;

use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::PbgzfError;

pub type Result<T> = std::result::Result<T, PbgzfError>;

/// Highest deflate level supported by the container format.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;
/// Level used when the caller asks for the library default.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// A deflate compression level in `0..=9`.
///
/// Negative requests map to the library default and anything above the
/// format maximum is clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    pub const NONE: Self = Self(0);
    pub const FAST: Self = Self(1);
    pub const BEST: Self = Self(MAX_COMPRESSION_LEVEL);

    pub fn new(level: i32) -> Self {
        if level < 0 {
            Self::default()
        } else {
            Self((level as u32).min(MAX_COMPRESSION_LEVEL))
        }
    }

    pub fn level(self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl From<CompressionLevel> for Compression {
    fn from(level: CompressionLevel) -> Self {
        Compression::new(level.0)
    }
}

/// Which transform the worker pool applies to each block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Raw chunks in, container blocks out.
    Compress,
    /// Container blocks in, raw payloads out.
    Decompress,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Compress => "compress",
            Direction::Decompress => "decompress",
        }
    }
}

#[inline]
pub fn duration_to_us(duration: Duration) -> u64 {
    duration.as_micros().min(u64::MAX as u128) as u64
}
