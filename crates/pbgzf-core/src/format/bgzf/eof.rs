use std::io::{Read, Seek, SeekFrom};

use crate::Result;

use super::EOF_MARKER;

/// Returns true when `bytes` is exactly the end-of-file marker block.
pub fn is_eof_marker(bytes: &[u8]) -> bool {
    bytes == EOF_MARKER
}

/// Checks whether a seekable stream ends with the end-of-file marker.
///
/// The stream position is restored before returning.
pub fn has_eof_marker<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    let position = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;

    let found = if end < EOF_MARKER.len() as u64 {
        false
    } else {
        reader.seek(SeekFrom::End(-(EOF_MARKER.len() as i64)))?;
        let mut tail = [0u8; EOF_MARKER.len()];
        reader.read_exact(&mut tail)?;
        is_eof_marker(&tail)
    };

    reader.seek(SeekFrom::Start(position))?;
    Ok(found)
}
