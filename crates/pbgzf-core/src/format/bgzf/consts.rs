/// gzip member identification bytes.
pub const GZIP_ID1: u8 = 0x1f;
pub const GZIP_ID2: u8 = 0x8b;
/// Compression method: deflate.
pub const CM_DEFLATE: u8 = 8;
/// Flag byte with only FEXTRA set.
pub const FLG_FEXTRA: u8 = 0x04;
pub const OS_UNKNOWN: u8 = 0xff;

/// Length of the extra field carried by every block.
pub const BGZF_XLEN: u16 = 6;
/// Sub-field identifier of the block-size extra field.
pub const BGZF_ID1: u8 = b'B';
pub const BGZF_ID2: u8 = b'C';
/// Length of the block-size sub-field payload.
pub const BGZF_SLEN: u16 = 2;

/// Fixed size of a block header in bytes.
pub const BLOCK_HEADER_LEN: usize = 18;
/// CRC32 plus uncompressed length.
pub const BLOCK_TRAILER_LEN: usize = 8;
/// Upper bound for both the compressed and the uncompressed size of a block.
pub const MAX_BLOCK_SIZE: usize = 64 * 1024;
/// Smallest block the size field can describe.
pub const MIN_BLOCK_SIZE: usize = BLOCK_HEADER_LEN + BLOCK_TRAILER_LEN;
/// Raw bytes packed into each block on the write path.
pub const DEFAULT_BLOCK_DATA_SIZE: usize = 0xff00;
/// Input shrink step when a chunk does not compress into one block.
pub const INPUT_REDUCTION_STEP: usize = 1024;

/// Empty block that marks the logical end of a stream.
pub const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
