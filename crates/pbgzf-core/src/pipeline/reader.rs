use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::buffer::Block;
use crate::core::{
    BgzfBlockSource, PipelineShared, ReaderStats, WorkerPool, WorkerPoolHandle, codec_processor,
    spawn_reader,
};
use crate::format::bgzf::{self, VirtualOffset};
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::telemetry::{self, tags};
use crate::types::Direction;
use crate::{PbgzfError, Result};

use super::types::{PipelineConfig, PipelineState, PipelineStats};
use super::new_shared;

struct ReadStages<R> {
    reader: JoinHandle<(BgzfBlockSource<R>, ReaderStats)>,
    workers: WorkerPoolHandle,
}

/// Decompressing byte stream over a container source.
///
/// A reader thread parses blocks from the source, the worker pool inflates
/// them, and the caller drains the ordered output queue through
/// [`read`](Self::read). Positions are [`VirtualOffset`]s; seeking tears the
/// pipeline down, repositions the source, and starts it again.
pub struct PipelineReader<R>
where
    R: Read + Seek + Send + 'static,
{
    config: PipelineConfig,
    shared: Arc<PipelineShared>,
    worker_pool: WorkerPool,
    stages: Option<ReadStages<R>>,
    current: Option<Block>,
    block_address: u64,
    state: PipelineState,
    eof_marker: bool,
    stats: PipelineStats,
}

impl<R> PipelineReader<R>
where
    R: Read + Seek + Send + 'static,
{
    pub fn new(source: R, config: PipelineConfig) -> Result<Self> {
        Self::with_telemetry(source, config, Arc::new(DefaultWorkerTelemetry))
    }

    /// Opens the stream with a custom worker telemetry backend.
    pub fn with_telemetry(
        mut source: R,
        config: PipelineConfig,
        telemetry: Arc<dyn WorkerTelemetry>,
    ) -> Result<Self> {
        let eof_marker = bgzf::has_eof_marker(&mut source)?;
        if !eof_marker {
            tracing::warn!("EOF marker not found; the stream may be truncated");
        }
        let position = source.stream_position()?;

        let mut reader = Self {
            shared: new_shared(&config),
            worker_pool: WorkerPool::with_telemetry(config.effective_workers(), telemetry),
            config,
            stages: None,
            current: None,
            block_address: position,
            state: PipelineState::Stopped,
            eof_marker,
            stats: PipelineStats::default(),
        };
        reader.start(source, position)?;
        Ok(reader)
    }

    /// Copies decompressed bytes into `buf` and returns how many were copied.
    ///
    /// Fills `buf` unless the stream ends first; returns 0 only at end of
    /// stream. Empty blocks, including the end-of-file marker, are skipped.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_running()?;

        let mut filled = 0;
        while filled < buf.len() {
            if let Some(block) = self.current.as_mut() {
                let copied = block.consume_into(&mut buf[filled..]);
                if copied > 0 {
                    filled += copied;
                    self.stats.bytes_out += copied as u64;
                    continue;
                }
            }
            match self.next_block()? {
                Some(block) => self.current = Some(block),
                None => break,
            }
        }
        Ok(filled)
    }

    /// Moves to `offset`, a position previously returned by [`tell`](Self::tell).
    ///
    /// The pipeline is drained, both queues are cleared, and the reader
    /// restarts at the block address. An in-block offset larger than the
    /// block's uncompressed length fails with [`PbgzfError::InvalidSeek`];
    /// the stream is then moved back to where it was before the call.
    pub fn seek(&mut self, offset: VirtualOffset) -> Result<VirtualOffset> {
        self.ensure_running()?;

        let origin = self.tell();
        match self.reposition(offset) {
            Err(rejected @ PbgzfError::InvalidSeek { .. }) => {
                self.reposition(origin)?;
                Err(rejected)
            }
            moved => moved,
        }
    }

    fn reposition(&mut self, offset: VirtualOffset) -> Result<VirtualOffset> {
        let mut source = self.stop()?;
        let address = offset.block_address();
        if let Err(error) = source.seek(SeekFrom::Start(address)) {
            self.transition(PipelineState::Failed);
            return Err(PbgzfError::from(error).with_context(format!("seeking to {offset}")));
        }
        self.block_address = address;
        self.stats.restarts += 1;
        telemetry::increment_counter(
            tags::METRIC_PIPELINE_RESTART_COUNT,
            1,
            &[("subsystem", "pipeline"), ("op", "seek")],
        );
        self.start(source, address)?;

        let within = offset.within_block() as usize;
        if within == 0 {
            return Ok(offset);
        }
        match self.next_block()? {
            Some(mut block) if block.source_offset() == address && within <= block.len() => {
                block.set_cursor(within);
                self.current = Some(block);
                Ok(offset)
            }
            Some(block) => {
                let reason = if block.source_offset() == address {
                    "offset past the end of the block"
                } else {
                    "no data block at this address"
                };
                self.current = Some(block);
                Err(PbgzfError::InvalidSeek {
                    position: offset.raw(),
                    reason,
                })
            }
            None => Err(PbgzfError::InvalidSeek {
                position: offset.raw(),
                reason: "offset beyond the end of the stream",
            }),
        }
    }

    /// Position of the next byte [`read`](Self::read) will return.
    pub fn tell(&self) -> VirtualOffset {
        match self.current.as_ref() {
            // A fully consumed 64 KiB block has no in-block offset; the next
            // block's start names the same position.
            Some(block) if block.cursor() > u16::MAX as usize => {
                VirtualOffset::new(block.source_offset() + block.source_len() as u64, 0)
            }
            Some(block) => VirtualOffset::new(self.block_address, block.cursor() as u16),
            None => VirtualOffset::new(self.block_address, 0),
        }
    }

    /// Whether the source ended with the end-of-file marker when opened.
    pub fn has_eof_marker(&self) -> bool {
        self.eof_marker
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Stops every stage and returns the source, positioned wherever the
    /// reader stage left it.
    pub fn close(mut self) -> Result<R> {
        match self.state {
            PipelineState::Closed => return Err(PbgzfError::Usage("stream is already closed")),
            PipelineState::Failed => {
                return Err(self
                    .shared
                    .failure()
                    .take()
                    .unwrap_or(PbgzfError::PipelineFailed));
            }
            _ => {}
        }
        let source = self.stop()?;
        self.transition(PipelineState::Closed);
        Ok(source)
    }

    fn start(&mut self, source: R, position: u64) -> Result<()> {
        let workers = self.worker_pool.spawn(
            Arc::clone(&self.shared),
            Direction::Decompress.as_str(),
            codec_processor(Direction::Decompress, self.config.compression_level),
        );
        let block_source = BgzfBlockSource::with_position(source, position);
        match spawn_reader(
            block_source,
            Arc::clone(&self.shared),
            self.config.reader_prefetch,
        ) {
            Ok(reader) => {
                self.stages = Some(ReadStages { reader, workers });
                self.transition(PipelineState::Running);
                Ok(())
            }
            Err(error) => {
                self.shared.input.producer_done();
                self.shared.close();
                let _ = workers.join();
                self.transition(PipelineState::Failed);
                Err(error)
            }
        }
    }

    // Closes both queues, joins every stage, and clears the queues.
    fn stop(&mut self) -> Result<R> {
        let Some(stages) = self.stages.take() else {
            return Err(PbgzfError::Usage("pipeline is not running"));
        };
        self.transition(PipelineState::Draining);
        self.current = None;
        self.shared.close();

        let joined_reader = stages.reader.join();
        let joined_workers = stages.workers.join();
        let (block_source, reader_stats) = match joined_reader {
            Ok(joined) => joined,
            Err(_) => {
                self.transition(PipelineState::Failed);
                return Err(PbgzfError::Thread("reader thread panicked".to_string()));
            }
        };
        self.stats.blocks_in += reader_stats.blocks;
        self.stats.bytes_in += reader_stats.bytes;
        match joined_workers {
            Ok(runtime) => self.stats.absorb_runtime(runtime),
            Err(error) => {
                self.transition(PipelineState::Failed);
                return Err(error);
            }
        }
        if let Some(error) = self.shared.failure().take() {
            self.transition(PipelineState::Failed);
            return Err(error);
        }

        let discarded = self.shared.reset();
        tracing::debug!(discarded, "read pipeline drained");
        self.transition(PipelineState::Reset);
        Ok(block_source.into_inner())
    }

    // Pops the next non-empty block, tracking its compressed address.
    fn next_block(&mut self) -> Result<Option<Block>> {
        loop {
            self.check_failure()?;
            let Some(block) = self.shared.output.pop(true) else {
                self.check_failure()?;
                return Ok(None);
            };
            self.stats.blocks_out += 1;
            self.block_address = block.source_offset();
            self.current = None;
            if !block.is_empty() {
                return Ok(Some(block));
            }
        }
    }

    fn ensure_running(&mut self) -> Result<()> {
        match self.state {
            PipelineState::Running => self.check_failure(),
            PipelineState::Closed => Err(PbgzfError::Usage("stream is closed")),
            PipelineState::Failed => Err(self
                .shared
                .failure()
                .take()
                .unwrap_or(PbgzfError::PipelineFailed)),
            _ => Err(PbgzfError::Usage("pipeline is not running")),
        }
    }

    fn check_failure(&mut self) -> Result<()> {
        if !self.shared.is_failed() {
            return Ok(());
        }
        // Join the stages so no thread outlives the failure report.
        if let Some(stages) = self.stages.take() {
            self.shared.close();
            let _ = stages.reader.join();
            let _ = stages.workers.join();
        }
        self.current = None;
        self.transition(PipelineState::Failed);
        Err(self
            .shared
            .failure()
            .take()
            .unwrap_or(PbgzfError::PipelineFailed))
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            tracing::debug!(from = self.state.as_str(), to = next.as_str(), "read pipeline state");
            self.state = next;
        }
    }
}

impl<R> Read for PipelineReader<R>
where
    R: Read + Seek + Send + 'static,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        PipelineReader::read(self, buf).map_err(io::Error::from)
    }
}

/// `SeekFrom::Start` takes a raw virtual offset; `SeekFrom::Current(0)`
/// reports the current one. Other forms are rejected.
impl<R> Seek for PipelineReader<R>
where
    R: Read + Seek + Send + 'static,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(raw) => PipelineReader::seek(self, VirtualOffset::from_raw(raw))
                .map(VirtualOffset::raw)
                .map_err(io::Error::from),
            SeekFrom::Current(0) => Ok(self.tell().raw()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "only absolute virtual offsets are supported",
            )),
        }
    }
}

impl<R> Drop for PipelineReader<R>
where
    R: Read + Seek + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(stages) = self.stages.take() {
            self.current = None;
            self.shared.close();
            let _ = stages.reader.join();
            let _ = stages.workers.join();
        }
    }
}
