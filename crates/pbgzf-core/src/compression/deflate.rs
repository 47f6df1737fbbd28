use flate2::{Compress, Decompress, FlushCompress, FlushDecompress, Status};

use crate::types::CompressionLevel;
use crate::{PbgzfError, Result};

/// Result of compressing into a fixed-size output window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeflateOutcome {
    /// The whole input was compressed into this many output bytes.
    Complete(usize),
    /// The compressed stream did not fit the output window.
    Overflow,
}

/// Compresses `input` as one raw deflate stream (no zlib or gzip wrapper)
/// into `output`.
pub fn apply(input: &[u8], level: CompressionLevel, output: &mut [u8]) -> Result<DeflateOutcome> {
    let mut deflater = Compress::new(level.into(), false);
    match deflater.compress(input, output, FlushCompress::Finish) {
        Ok(Status::StreamEnd) => Ok(DeflateOutcome::Complete(deflater.total_out() as usize)),
        Ok(Status::Ok) | Ok(Status::BufError) => Ok(DeflateOutcome::Overflow),
        Err(error) => Err(PbgzfError::Deflate(error.to_string())),
    }
}

/// Inflates one raw deflate stream from `input` into `output` and returns
/// the number of bytes produced.
pub fn reverse(input: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut inflater = Decompress::new(false);
    match inflater.decompress(input, output, FlushDecompress::Finish) {
        Ok(Status::StreamEnd) => Ok(inflater.total_out() as usize),
        Ok(Status::Ok) | Ok(Status::BufError) => {
            if inflater.total_out() as usize >= output.len() {
                Err(PbgzfError::Inflate(format!(
                    "inflated data exceeds {} bytes",
                    output.len()
                )))
            } else {
                Err(PbgzfError::Inflate(
                    "deflate stream ended before its final block".to_string(),
                ))
            }
        }
        Err(error) => Err(PbgzfError::Inflate(error.to_string())),
    }
}
