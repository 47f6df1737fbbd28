use crate::buffer::pool::Recycler;
use crate::core::Sequenced;

/// One unit of pipeline work: a payload buffer plus its stream metadata.
///
/// A block is either a container block (header, deflate payload, trailer) or
/// a raw chunk, depending on which side of a worker it is on. Ownership moves
/// between pool, queues, and threads; it is never shared. Dropping a block
/// that came from a [`BlockPool`](crate::BlockPool) returns its buffer there.
#[derive(Debug)]
pub struct Block {
    id: u64,
    source_offset: u64,
    source_len: usize,
    cursor: usize,
    data: Vec<u8>,
    recycler: Option<Recycler>,
}

impl Block {
    /// Creates a block that is not attached to any pool.
    pub fn detached(capacity: usize) -> Self {
        Self {
            id: 0,
            source_offset: 0,
            source_len: 0,
            cursor: 0,
            data: Vec::with_capacity(capacity),
            recycler: None,
        }
    }

    /// Creates a detached block holding a copy of `payload`.
    pub fn from_slice(id: u64, payload: &[u8]) -> Self {
        let mut block = Self::detached(payload.len());
        block.id = id;
        block.data.extend_from_slice(payload);
        block
    }

    pub(crate) fn pooled(data: Vec<u8>, recycler: Recycler) -> Self {
        Self {
            id: 0,
            source_offset: 0,
            source_len: 0,
            cursor: 0,
            data,
            recycler: Some(recycler),
        }
    }

    /// Stream-order id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    /// Offset of this block's first byte in the container stream.
    pub fn source_offset(&self) -> u64 {
        self.source_offset
    }

    pub fn set_source_offset(&mut self, offset: u64) {
        self.source_offset = offset;
    }

    /// Number of stream bytes this block was read from.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn set_source_len(&mut self, len: usize) {
        self.source_len = len;
    }

    /// Number of valid payload bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Partial-consumption cursor used by the stream facades.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor, clamped to the payload length.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.data.len());
    }

    /// Bytes between the cursor and the end of the payload.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Copies as much of the unconsumed payload as fits into `out`.
    pub fn consume_into(&mut self, out: &mut [u8]) -> usize {
        let available = self.remaining();
        let count = available.len().min(out.len());
        out[..count].copy_from_slice(&available[..count]);
        self.cursor += count;
        count
    }

    /// Appends from `input` until the payload reaches `limit` bytes.
    pub fn fill_from(&mut self, input: &[u8], limit: usize) -> usize {
        let room = limit.saturating_sub(self.data.len());
        let count = room.min(input.len());
        self.data.extend_from_slice(&input[..count]);
        count
    }

    /// Exchanges the payload with `other`, keeping all metadata.
    pub fn swap_payload(&mut self, other: &mut Vec<u8>) {
        std::mem::swap(&mut self.data, other);
        self.cursor = 0;
    }

    /// Empties the payload and resets the cursor.
    pub fn clear(&mut self) {
        self.data.clear();
        self.cursor = 0;
    }
}

impl Sequenced for Block {
    fn sequence_id(&self) -> u64 {
        self.id
    }

    fn assign_sequence_id(&mut self, id: u64) {
        self.id = id;
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some(recycler) = self.recycler.take() {
            recycler.recycle(std::mem::take(&mut self.data));
        }
    }
}
