use crate::compression::{self, DeflateOutcome};
use crate::telemetry::{self, tags};
use crate::types::CompressionLevel;
use crate::{PbgzfError, Result};

use super::{
    BLOCK_HEADER_LEN, BLOCK_TRAILER_LEN, BlockHeader, BlockTrailer, INPUT_REDUCTION_STEP,
    MAX_BLOCK_SIZE,
};

/// Inflates one complete container block into `out`, replacing its contents.
///
/// `offset` is the block's position in the container stream and only feeds
/// error reports. The trailer's CRC32 and length are checked against the
/// inflated bytes.
pub fn inflate_block(block: &[u8], offset: u64, out: &mut Vec<u8>) -> Result<()> {
    let header = BlockHeader::parse(block, offset)?;
    if block.len() != header.block_size() {
        return Err(PbgzfError::ShortRead {
            offset,
            expected: header.block_size(),
            actual: block.len(),
        });
    }
    let trailer = BlockTrailer::parse(block, offset)?;

    out.clear();
    out.resize(MAX_BLOCK_SIZE, 0);
    let payload = &block[BLOCK_HEADER_LEN..block.len() - BLOCK_TRAILER_LEN];
    let produced = compression::decompress(payload, out)
        .map_err(|error| error.with_context(format!("block at offset {offset}")))?;
    out.truncate(produced);

    if produced != trailer.uncompressed_len as usize {
        return Err(PbgzfError::LengthMismatch {
            offset,
            expected: trailer.uncompressed_len as usize,
            actual: produced,
        });
    }
    let actual = crc32fast::hash(out);
    if actual != trailer.crc32 {
        return Err(PbgzfError::ChecksumMismatch {
            offset,
            expected: trailer.crc32,
            actual,
        });
    }
    Ok(())
}

/// Compresses `input` into container blocks appended to `out` and returns
/// how many blocks were written.
///
/// A chunk that does not fit one block is shrunk by
/// [`INPUT_REDUCTION_STEP`] bytes until it does; the bytes left over are
/// compressed into the following blocks, so all of `input` is always encoded.
/// Empty input yields one empty block.
pub fn deflate_blocks(input: &[u8], level: CompressionLevel, out: &mut Vec<u8>) -> Result<usize> {
    let mut remaining = input;
    let mut blocks = 0usize;
    loop {
        let consumed = deflate_one(remaining, level, out)?;
        blocks += 1;
        remaining = &remaining[consumed..];
        if remaining.is_empty() {
            return Ok(blocks);
        }
    }
}

fn deflate_one(input: &[u8], level: CompressionLevel, out: &mut Vec<u8>) -> Result<usize> {
    let start = out.len();
    out.resize(start + MAX_BLOCK_SIZE, 0);

    let mut input_len = input.len().min(MAX_BLOCK_SIZE);
    let compressed_len = loop {
        let window = &mut out[start + BLOCK_HEADER_LEN..start + MAX_BLOCK_SIZE - BLOCK_TRAILER_LEN];
        match compression::compress(&input[..input_len], level, window)? {
            DeflateOutcome::Complete(len) => break len,
            DeflateOutcome::Overflow => {
                if input_len <= INPUT_REDUCTION_STEP {
                    out.truncate(start);
                    return Err(PbgzfError::InputReductionFailed { length: input_len });
                }
                input_len -= INPUT_REDUCTION_STEP;
                telemetry::increment_counter(
                    tags::METRIC_CODEC_DEFLATE_RETRY_COUNT,
                    1,
                    &[("subsystem", "codec"), ("op", "deflate"), ("result", "retry")],
                );
            }
        }
    };

    let block_size = BLOCK_HEADER_LEN + compressed_len + BLOCK_TRAILER_LEN;
    let header = BlockHeader::new(block_size)?;
    let trailer = BlockTrailer::new(crc32fast::hash(&input[..input_len]), input_len as u32);
    out[start..start + BLOCK_HEADER_LEN].copy_from_slice(&header.to_bytes());
    out[start + BLOCK_HEADER_LEN + compressed_len..start + block_size]
        .copy_from_slice(&trailer.to_bytes());
    out.truncate(start + block_size);
    Ok(input_len)
}
