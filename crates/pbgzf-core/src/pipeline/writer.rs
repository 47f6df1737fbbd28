use std::io::{self, Write};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::buffer::Block;
use crate::core::writer::write_payload;
use crate::core::{
    PipelineShared, WorkerPool, WorkerPoolHandle, WriterStats, codec_processor, spawn_writer,
};
use crate::format::bgzf::{EOF_MARKER, VirtualOffset};
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::telemetry::{self, tags};
use crate::types::Direction;
use crate::{PbgzfError, Result};

use super::new_shared;
use super::types::{PipelineConfig, PipelineState, PipelineStats};

struct WriteStages<W> {
    writer: JoinHandle<(W, WriterStats)>,
    workers: WorkerPoolHandle,
}

/// Compressing byte stream over a sink.
///
/// Bytes passed to [`write`](Self::write) are packed into blocks of
/// `block_data_size` bytes and pushed to the input queue; the worker pool
/// deflates them and the writer thread emits them to the sink in order.
/// [`flush`](Self::flush) drains the whole pipeline to the sink and restarts
/// it; [`close`](Self::close) also appends the end-of-file marker.
pub struct PipelineWriter<W>
where
    W: Write + Send + 'static,
{
    config: PipelineConfig,
    shared: Arc<PipelineShared>,
    worker_pool: WorkerPool,
    stages: Option<WriteStages<W>>,
    pending: Option<Block>,
    block_data_size: usize,
    compressed_bytes: u64,
    state: PipelineState,
    stats: PipelineStats,
}

impl<W> PipelineWriter<W>
where
    W: Write + Send + 'static,
{
    pub fn new(sink: W, config: PipelineConfig) -> Result<Self> {
        Self::with_telemetry(sink, config, Arc::new(DefaultWorkerTelemetry))
    }

    /// Opens the stream with a custom worker telemetry backend.
    pub fn with_telemetry(
        sink: W,
        config: PipelineConfig,
        telemetry: Arc<dyn WorkerTelemetry>,
    ) -> Result<Self> {
        let mut writer = Self {
            shared: new_shared(&config),
            worker_pool: WorkerPool::with_telemetry(config.effective_workers(), telemetry),
            block_data_size: config.effective_block_data_size(),
            config,
            stages: None,
            pending: None,
            compressed_bytes: 0,
            state: PipelineState::Stopped,
            stats: PipelineStats::default(),
        };
        writer.start(sink)?;
        Ok(writer)
    }

    /// Accepts all of `buf` unless the pipeline has failed.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_running()?;

        let mut written = 0;
        while written < buf.len() {
            let block = self
                .pending
                .get_or_insert_with(|| self.shared.pool.acquire());
            written += block.fill_from(&buf[written..], self.block_data_size);
            if block.len() >= self.block_data_size {
                self.push_pending()?;
            }
        }
        Ok(written)
    }

    /// Drains every buffered byte through the pipeline, flushes the sink, and
    /// restarts the pipeline.
    ///
    /// Once this returns, everything written so far is on the sink as whole
    /// blocks.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.push_pending()?;

        let mut sink = self.stop()?;
        let flushed = sink.flush();
        self.stats.restarts += 1;
        telemetry::increment_counter(
            tags::METRIC_PIPELINE_RESTART_COUNT,
            1,
            &[("subsystem", "pipeline"), ("op", "flush")],
        );
        self.start(sink)?;
        flushed?;
        Ok(())
    }

    /// Flushes, then reports the position of the next byte to be written.
    ///
    /// The next write starts a fresh block, so the offset always points at a
    /// block boundary.
    pub fn tell(&mut self) -> Result<VirtualOffset> {
        self.flush()?;
        Ok(VirtualOffset::new(self.compressed_bytes, 0))
    }

    /// Drains the pipeline, appends the end-of-file marker, flushes, and
    /// returns the sink.
    pub fn close(mut self) -> Result<W> {
        self.finish()
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

    /// Compressed bytes handed to the sink by completed runs.
    pub fn compressed_bytes(&self) -> u64 {
        self.compressed_bytes
    }

    pub(crate) fn finish(&mut self) -> Result<W> {
        self.ensure_running()?;
        self.push_pending()?;

        let mut sink = self.stop()?;
        write_payload(&mut sink, &EOF_MARKER)?;
        self.compressed_bytes += EOF_MARKER.len() as u64;
        sink.flush()?;
        self.transition(PipelineState::Closed);
        Ok(sink)
    }

    fn start(&mut self, sink: W) -> Result<()> {
        let workers = self.worker_pool.spawn(
            Arc::clone(&self.shared),
            Direction::Compress.as_str(),
            codec_processor(Direction::Compress, self.config.compression_level),
        );
        match spawn_writer(sink, Arc::clone(&self.shared)) {
            Ok(writer) => {
                self.stages = Some(WriteStages { writer, workers });
                self.transition(PipelineState::Running);
                Ok(())
            }
            Err(error) => {
                self.shared.close();
                let _ = workers.join();
                self.transition(PipelineState::Failed);
                Err(error)
            }
        }
    }

    // Closes the input queue, lets workers and writer drain it, joins them,
    // and clears the queues.
    fn stop(&mut self) -> Result<W> {
        let Some(stages) = self.stages.take() else {
            return Err(PbgzfError::Usage("pipeline is not running"));
        };
        self.transition(PipelineState::Draining);
        self.shared.input.close();

        let joined_workers = stages.workers.join();
        let joined_writer = stages.writer.join();
        let (sink, writer_stats) = match joined_writer {
            Ok(joined) => joined,
            Err(_) => {
                self.transition(PipelineState::Failed);
                return Err(PbgzfError::Thread("writer thread panicked".to_string()));
            }
        };
        self.stats.blocks_out += writer_stats.blocks;
        self.stats.bytes_out += writer_stats.bytes;
        self.compressed_bytes += writer_stats.bytes;
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
        tracing::debug!(discarded, "write pipeline drained");
        self.transition(PipelineState::Reset);
        Ok(sink)
    }

    fn push_pending(&mut self) -> Result<()> {
        let Some(block) = self.pending.take() else {
            return Ok(());
        };
        if block.is_empty() {
            return Ok(());
        }

        let len = block.len() as u64;
        if self.shared.input.push(block, true).is_err() {
            return Err(self.fail_running());
        }
        self.stats.blocks_in += 1;
        self.stats.bytes_in += len;
        Ok(())
    }

    fn ensure_running(&mut self) -> Result<()> {
        match self.state {
            PipelineState::Running if self.shared.is_failed() => Err(self.fail_running()),
            PipelineState::Running => Ok(()),
            PipelineState::Closed => Err(PbgzfError::Usage("stream is closed")),
            PipelineState::Failed => Err(self
                .shared
                .failure()
                .take()
                .unwrap_or(PbgzfError::PipelineFailed)),
            _ => Err(PbgzfError::Usage("pipeline is not running")),
        }
    }

    // Tears down after a stage failure and returns the recorded error.
    fn fail_running(&mut self) -> PbgzfError {
        self.pending = None;
        if let Some(stages) = self.stages.take() {
            self.shared.close();
            let _ = stages.workers.join();
            let _ = stages.writer.join();
        }
        self.transition(PipelineState::Failed);
        self.shared
            .failure()
            .take()
            .unwrap_or_else(|| PbgzfError::Thread("input queue rejected a block".to_string()))
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            tracing::debug!(from = self.state.as_str(), to = next.as_str(), "write pipeline state");
            self.state = next;
        }
    }
}

impl<W> Write for PipelineWriter<W>
where
    W: Write + Send + 'static,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        PipelineWriter::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        PipelineWriter::flush(self).map_err(io::Error::from)
    }
}

impl<W> Drop for PipelineWriter<W>
where
    W: Write + Send + 'static,
{
    fn drop(&mut self) {
        if self.stages.is_none() {
            return;
        }
        if let Err(error) = self.finish() {
            tracing::warn!(%error, "failed to finish write pipeline on drop");
        }
        if let Some(stages) = self.stages.take() {
            self.shared.close();
            let _ = stages.workers.join();
            let _ = stages.writer.join();
        }
    }
}
