//! Container formats understood by the pipeline.

pub mod bgzf;

pub use bgzf::{BlockHeader, BlockTrailer, EOF_MARKER, MAX_BLOCK_SIZE, VirtualOffset};
