use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;

use crate::buffer::BlockPool;
use crate::core::writer::write_payload;
use crate::core::{
    BgzfBlockSource, BlockSource, PipelineShared, RawChunkSource, WorkerPool, codec_processor,
    spawn_reader, spawn_writer,
};
use crate::format::bgzf::{EOF_MARKER, MAX_BLOCK_SIZE};
use crate::types::Direction;
use crate::{PbgzfError, Result};

pub mod reader;
pub mod stream;
pub mod types;
pub mod writer;

pub use reader::PipelineReader;
pub use stream::{BgzfStream, Released, SeekableSource};
pub use types::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_READER_PREFETCH, OpenMode, PipelineConfig, PipelineState,
    PipelineStats,
};
pub use writer::PipelineWriter;

pub(crate) fn new_shared(config: &PipelineConfig) -> Arc<PipelineShared> {
    Arc::new(PipelineShared::new(
        config.effective_queue_capacity(),
        config.effective_workers(),
        BlockPool::new(MAX_BLOCK_SIZE, config.effective_pool_blocks()),
    ))
}

/// Compresses all of `source` into container blocks on `sink`.
///
/// Runs reader, worker pool, and writer together until the source is
/// exhausted, then appends the end-of-file marker and flushes the sink.
pub fn compress_stream<R, W>(source: R, sink: W, config: &PipelineConfig) -> Result<(W, PipelineStats)>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let chunks = RawChunkSource::new(source, config.effective_block_data_size());
    let (mut sink, stats) = run_whole_stream(chunks, sink, config, Direction::Compress)?;
    write_payload(&mut sink, &EOF_MARKER)?;
    sink.flush()?;
    Ok((sink, stats))
}

/// Decompresses every block of `source` onto `sink` in stream order.
pub fn decompress_stream<R, W>(
    source: R,
    sink: W,
    config: &PipelineConfig,
) -> Result<(W, PipelineStats)>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let (mut sink, stats) =
        run_whole_stream(BgzfBlockSource::new(source), sink, config, Direction::Decompress)?;
    sink.flush()?;
    Ok((sink, stats))
}

fn run_whole_stream<S, W>(
    source: S,
    sink: W,
    config: &PipelineConfig,
    direction: Direction,
) -> Result<(W, PipelineStats)>
where
    S: BlockSource + 'static,
    W: Write + Send + 'static,
{
    let started_at = Instant::now();
    let shared = new_shared(config);
    let workers = WorkerPool::new(config.effective_workers()).spawn(
        Arc::clone(&shared),
        direction.as_str(),
        codec_processor(direction, config.compression_level),
    );

    let writer = match spawn_writer(sink, Arc::clone(&shared)) {
        Ok(writer) => writer,
        Err(error) => {
            shared.close();
            let _ = workers.join();
            return Err(error);
        }
    };
    let reader = match spawn_reader(source, Arc::clone(&shared), config.reader_prefetch) {
        Ok(reader) => Some(reader),
        Err(error) => {
            shared.fail("reader", error);
            None
        }
    };
    tracing::debug!(direction = direction.as_str(), workers = config.effective_workers(), "whole-stream pipeline started");

    let reader_stats = reader.map(|handle| handle.join());
    let runtime = workers.join();
    let writer_joined = writer.join();

    if let Some(error) = shared.failure().take() {
        return Err(error);
    }
    let reader_stats = match reader_stats {
        Some(Ok((_source, stats))) => stats,
        Some(Err(_)) => return Err(PbgzfError::Thread("reader thread panicked".to_string())),
        None => return Err(PbgzfError::PipelineFailed),
    };
    let (sink, writer_stats) =
        writer_joined.map_err(|_| PbgzfError::Thread("writer thread panicked".to_string()))?;

    let mut stats = PipelineStats {
        blocks_in: reader_stats.blocks,
        bytes_in: reader_stats.bytes,
        blocks_out: writer_stats.blocks,
        bytes_out: writer_stats.bytes,
        ..PipelineStats::default()
    };
    stats.absorb_runtime(runtime?);
    stats.elapsed = started_at.elapsed();
    tracing::debug!(
        direction = direction.as_str(),
        blocks_in = stats.blocks_in,
        blocks_out = stats.blocks_out,
        "whole-stream pipeline finished"
    );
    Ok((sink, stats))
}
