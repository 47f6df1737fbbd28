use std::io::{Read, Write};

use crate::{PbgzfError, Result};

use super::{
    BGZF_ID1, BGZF_ID2, BGZF_SLEN, BGZF_XLEN, BLOCK_HEADER_LEN, BLOCK_TRAILER_LEN, CM_DEFLATE,
    FLG_FEXTRA, GZIP_ID1, GZIP_ID2, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, OS_UNKNOWN,
};

/// The fixed 18-byte gzip member header of a container block.
///
/// Only the total block size varies between blocks; the remaining fields are
/// fixed (zero mtime, unknown OS, one `BC` extra sub-field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    block_size: usize,
}

impl BlockHeader {
    /// Describes a block of `block_size` total bytes (header, payload, trailer).
    pub fn new(block_size: usize) -> Result<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(PbgzfError::InvalidHeader {
                offset: 0,
                reason: "block size outside the representable range",
            });
        }
        Ok(Self { block_size })
    }

    /// Total size of the block this header starts.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Size of the raw deflate payload between header and trailer.
    pub fn payload_len(&self) -> usize {
        self.block_size - BLOCK_HEADER_LEN - BLOCK_TRAILER_LEN
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Reads and validates a header; `offset` is only used in error reports.
    pub fn read<R: Read>(reader: &mut R, offset: u64) -> Result<Self> {
        let mut bytes = [0u8; BLOCK_HEADER_LEN];
        reader.read_exact(&mut bytes)?;
        Self::parse(&bytes, offset)
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_LEN] {
        let bsize = (self.block_size - 1) as u16;
        let mut bytes = [0u8; BLOCK_HEADER_LEN];
        bytes[0] = GZIP_ID1;
        bytes[1] = GZIP_ID2;
        bytes[2] = CM_DEFLATE;
        bytes[3] = FLG_FEXTRA;
        // bytes[4..8] mtime, bytes[8] extra flags: zero
        bytes[9] = OS_UNKNOWN;
        bytes[10..12].copy_from_slice(&BGZF_XLEN.to_le_bytes());
        bytes[12] = BGZF_ID1;
        bytes[13] = BGZF_ID2;
        bytes[14..16].copy_from_slice(&BGZF_SLEN.to_le_bytes());
        bytes[16..18].copy_from_slice(&bsize.to_le_bytes());
        bytes
    }

    /// Validates the leading [`BLOCK_HEADER_LEN`] bytes of `bytes`.
    pub fn parse(bytes: &[u8], offset: u64) -> Result<Self> {
        let invalid = |reason| PbgzfError::InvalidHeader { offset, reason };

        if bytes.len() < BLOCK_HEADER_LEN {
            return Err(PbgzfError::ShortRead {
                offset,
                expected: BLOCK_HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[0] != GZIP_ID1 || bytes[1] != GZIP_ID2 {
            return Err(invalid("bad gzip magic"));
        }
        if bytes[2] != CM_DEFLATE {
            return Err(invalid("compression method is not deflate"));
        }
        if bytes[3] & FLG_FEXTRA == 0 {
            return Err(invalid("extra field flag not set"));
        }
        if u16::from_le_bytes([bytes[10], bytes[11]]) != BGZF_XLEN {
            return Err(invalid("unexpected extra field length"));
        }
        if bytes[12] != BGZF_ID1 || bytes[13] != BGZF_ID2 {
            return Err(invalid("missing BC sub-field"));
        }
        if u16::from_le_bytes([bytes[14], bytes[15]]) != BGZF_SLEN {
            return Err(invalid("unexpected BC sub-field length"));
        }

        let block_size = u16::from_le_bytes([bytes[16], bytes[17]]) as usize + 1;
        if block_size < MIN_BLOCK_SIZE {
            return Err(invalid("block size smaller than header and trailer"));
        }
        Ok(Self { block_size })
    }
}

/// CRC32 and uncompressed length closing every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTrailer {
    pub crc32: u32,
    pub uncompressed_len: u32,
}

impl BlockTrailer {
    pub fn new(crc32: u32, uncompressed_len: u32) -> Self {
        Self {
            crc32,
            uncompressed_len,
        }
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_TRAILER_LEN] {
        let mut bytes = [0u8; BLOCK_TRAILER_LEN];
        bytes[..4].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[4..].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        bytes
    }

    /// Reads the trailer from the last [`BLOCK_TRAILER_LEN`] bytes of `block`.
    pub fn parse(block: &[u8], offset: u64) -> Result<Self> {
        let Some(start) = block.len().checked_sub(BLOCK_TRAILER_LEN) else {
            return Err(PbgzfError::ShortRead {
                offset,
                expected: BLOCK_TRAILER_LEN,
                actual: block.len(),
            });
        };
        let bytes = &block[start..];
        Ok(Self {
            crc32: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            uncompressed_len: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}
