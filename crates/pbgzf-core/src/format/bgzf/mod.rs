//! The block-gzip container: a series of independent gzip members, each at
//! most 64 KiB, whose extra field records the member's total size.

mod codec;
mod consts;
mod eof;
mod headers;
mod virtual_offset;

pub use codec::{deflate_blocks, inflate_block};
pub use consts::*;
pub use eof::{has_eof_marker, is_eof_marker};
pub use headers::{BlockHeader, BlockTrailer};
pub use virtual_offset::{MAX_BLOCK_ADDRESS, VirtualOffset};
