use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::buffer::Block;
use crate::core::queue::PushError;
use crate::core::shared::PipelineShared;
use crate::format::bgzf::{BLOCK_HEADER_LEN, BlockHeader, MAX_BLOCK_SIZE};
use crate::telemetry::{self, profile, tags};
use crate::{PbgzfError, Result};

const PROFILE_TAG_STACK_READER: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_READER];

/// Produces the units of work the reader stage feeds into the pipeline.
pub trait BlockSource: Send {
    /// Fills `block` with the next unit and records its source offset.
    /// Returns `Ok(false)` once the source is exhausted.
    fn next_block(&mut self, block: &mut Block) -> Result<bool>;
}

/// Reads whole container blocks, validating each header.
#[derive(Debug)]
pub struct BgzfBlockSource<R> {
    reader: R,
    position: u64,
}

impl<R: Read + Send> BgzfBlockSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_position(reader, 0)
    }

    /// Wraps a reader already positioned at `position` in the container stream.
    pub fn with_position(reader: R, position: u64) -> Self {
        Self { reader, position }
    }

    /// Compressed offset of the next block to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Send> BlockSource for BgzfBlockSource<R> {
    fn next_block(&mut self, block: &mut Block) -> Result<bool> {
        let offset = self.position;
        let mut header_bytes = [0u8; BLOCK_HEADER_LEN];
        let count = read_full(&mut self.reader, &mut header_bytes)?;
        if count == 0 {
            return Ok(false);
        }
        if count < BLOCK_HEADER_LEN {
            return Err(PbgzfError::ShortRead {
                offset,
                expected: BLOCK_HEADER_LEN,
                actual: count,
            });
        }
        let header = BlockHeader::parse(&header_bytes, offset)?;

        let data = block.as_mut_vec();
        data.clear();
        data.extend_from_slice(&header_bytes);
        data.resize(header.block_size(), 0);
        let body = read_full(&mut self.reader, &mut data[BLOCK_HEADER_LEN..])?;
        let expected = header.block_size() - BLOCK_HEADER_LEN;
        if body < expected {
            return Err(PbgzfError::ShortRead {
                offset,
                expected: header.block_size(),
                actual: BLOCK_HEADER_LEN + body,
            });
        }

        block.set_cursor(0);
        block.set_source_offset(offset);
        block.set_source_len(header.block_size());
        self.position += header.block_size() as u64;
        Ok(true)
    }
}

/// Reads fixed-size raw chunks for the compression path.
#[derive(Debug)]
pub struct RawChunkSource<R> {
    reader: R,
    chunk_size: usize,
    position: u64,
}

impl<R: Read + Send> RawChunkSource<R> {
    /// `chunk_size` is clamped to `1..=MAX_BLOCK_SIZE`.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.clamp(1, MAX_BLOCK_SIZE),
            position: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Send> BlockSource for RawChunkSource<R> {
    fn next_block(&mut self, block: &mut Block) -> Result<bool> {
        let data = block.as_mut_vec();
        data.clear();
        data.resize(self.chunk_size, 0);
        let count = read_full(&mut self.reader, data)?;
        data.truncate(count);
        if count == 0 {
            return Ok(false);
        }

        block.set_cursor(0);
        block.set_source_offset(self.position);
        block.set_source_len(count);
        self.position += count as u64;
        Ok(true)
    }
}

/// Counters reported by a finished reader stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub blocks: u64,
    pub bytes: u64,
}

/// Starts the reader stage on its own thread.
///
/// The stage reads ahead up to `prefetch` blocks into a local staging list,
/// offers them to the input queue without waiting, and only blocks on the
/// queue once staging is full or the source is exhausted. It releases its
/// producer registration on exit, whether it finished, hit an error (recorded
/// in the failure slot), or found the queue closed. The source is handed
/// back through the join handle.
pub fn spawn_reader<S>(
    source: S,
    shared: Arc<PipelineShared>,
    prefetch: usize,
) -> Result<JoinHandle<(S, ReaderStats)>>
where
    S: BlockSource + 'static,
{
    thread::Builder::new()
        .name("pbgzf-reader".to_string())
        .spawn(move || run_reader(source, shared, prefetch.max(1)))
        .map_err(|error| PbgzfError::Thread(format!("failed to spawn reader thread: {error}")))
}

fn run_reader<S: BlockSource>(
    mut source: S,
    shared: Arc<PipelineShared>,
    limit: usize,
) -> (S, ReaderStats) {
    let mut stats = ReaderStats::default();
    let mut staged: VecDeque<Block> = VecDeque::with_capacity(limit);
    let mut exhausted = false;

    'feed: loop {
        if !exhausted && staged.len() < limit {
            let started_at = Instant::now();
            let mut block = shared.pool.acquire();
            match source.next_block(&mut block) {
                Ok(true) => {
                    profile::event(
                        tags::PROFILE_READER,
                        &PROFILE_TAG_STACK_READER,
                        "read_block",
                        "ok",
                        profile::elapsed_us(started_at),
                        "reader staged block",
                    );
                    staged.push_back(block);
                }
                Ok(false) => exhausted = true,
                Err(error) => {
                    shared.fail("reader", error);
                    break 'feed;
                }
            }
        }

        while let Some(block) = staged.pop_front() {
            let must_wait = exhausted || staged.len() + 1 >= limit;
            let len = block.len() as u64;
            match shared.input.push(block, must_wait) {
                Ok(()) => {
                    stats.blocks += 1;
                    stats.bytes += len;
                    telemetry::increment_counter(
                        tags::METRIC_READER_BLOCK_COUNT,
                        1,
                        &[("subsystem", "reader"), ("op", "push")],
                    );
                    telemetry::increment_counter(
                        tags::METRIC_READER_BYTES,
                        len,
                        &[("subsystem", "reader"), ("op", "push")],
                    );
                }
                Err(PushError::Full(block)) => {
                    staged.push_front(block);
                    break;
                }
                // Closed or abandoned queue: the pipeline is tearing down.
                Err(_) => break 'feed,
            }
        }

        if exhausted && staged.is_empty() {
            break;
        }
    }

    drop(staged);
    shared.input.producer_done();
    tracing::debug!(blocks = stats.blocks, bytes = stats.bytes, "reader stage finished");
    (source, stats)
}

// Reads until `buf` is full or the reader reports end of input.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        }
    }
    Ok(filled)
}
