use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{PoolRuntimeSnapshot, WorkerRuntimeSnapshot};
use crate::format::bgzf::{DEFAULT_BLOCK_DATA_SIZE, MAX_BLOCK_SIZE};
use crate::types::CompressionLevel;
use crate::{PbgzfError, Result};

/// Default capacity of each pipeline queue, in blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
/// Default number of blocks the reader stages before blocking on the queue.
pub const DEFAULT_READER_PREFETCH: usize = 16;
/// Upper bound on spare blocks retained by a pipeline's pool.
pub const MAX_POOL_BLOCKS: usize = 8192;

/// Construction config shared by every pipeline entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of the input and of the output queue.
    pub queue_capacity: usize,
    /// Deflate level on the write path.
    pub compression_level: CompressionLevel,
    /// Raw bytes packed into each block on the write path.
    pub block_data_size: usize,
    /// Spare blocks kept by the pool; derived from the other knobs when unset.
    pub pool_blocks: Option<usize>,
    /// Blocks the reader stages locally before blocking on the input queue.
    pub reader_prefetch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            compression_level: CompressionLevel::default(),
            block_data_size: DEFAULT_BLOCK_DATA_SIZE,
            pool_blocks: None,
            reader_prefetch: DEFAULT_READER_PREFETCH,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_compression_level(mut self, level: CompressionLevel) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_block_data_size(mut self, size: usize) -> Self {
        self.block_data_size = size;
        self
    }

    pub fn with_pool_blocks(mut self, blocks: usize) -> Self {
        self.pool_blocks = Some(blocks);
        self
    }

    pub fn with_reader_prefetch(mut self, blocks: usize) -> Self {
        self.reader_prefetch = blocks;
        self
    }

    /// Worker count, at least one.
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }

    /// Queue capacity, at least one.
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Write-path block size, clamped to `1..=MAX_BLOCK_SIZE`.
    pub fn effective_block_data_size(&self) -> usize {
        self.block_data_size.clamp(1, MAX_BLOCK_SIZE)
    }

    /// Enough spares for both queues full plus every stage holding one block.
    pub fn effective_pool_blocks(&self) -> usize {
        self.pool_blocks
            .unwrap_or_else(|| {
                2 * self.effective_queue_capacity()
                    + self.effective_workers()
                    + self.reader_prefetch
                    + 4
            })
            .clamp(1, MAX_POOL_BLOCKS)
    }
}

/// Which side of the pipeline the caller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    /// Caller reads decompressed bytes; the pipeline reads the container.
    Read,
    /// Caller writes raw bytes; the pipeline writes the container.
    Write,
}

impl OpenMode {
    /// Parses an fopen-style mode string such as `"r"`, `"rb"`, or `"w"`.
    pub fn parse(mode: &str) -> Result<Self> {
        let read = mode.contains('r');
        let write = mode.contains('w') || mode.contains('a');
        match (read, write) {
            (true, false) => Ok(Self::Read),
            (false, true) => Ok(Self::Write),
            (true, true) => Err(PbgzfError::Usage("mode must be read or write, not both")),
            (false, false) => Err(PbgzfError::Usage("mode must contain 'r' or 'w'")),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Lifecycle of the threads behind a stream facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// No stage threads exist.
    Stopped,
    /// Stage threads are live.
    Running,
    /// Queues are closed and stage threads are finishing in-flight work.
    Draining,
    /// Threads joined and queues cleared; ready to restart.
    Reset,
    /// Torn down for good by `close`.
    Closed,
    /// A stage recorded a fatal error; every later call fails.
    Failed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Reset => "reset",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

/// Totals collected across every run of a pipeline, restarts included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// Blocks that entered the input queue.
    pub blocks_in: u64,
    /// Bytes carried by those blocks.
    pub bytes_in: u64,
    /// Blocks drained from the output queue.
    pub blocks_out: u64,
    /// Bytes carried by those blocks.
    pub bytes_out: u64,
    /// Drain-and-restart cycles caused by seek or flush.
    pub restarts: u64,
    /// Wall time of all runs.
    pub elapsed: Duration,
    /// Per-worker runtime, summed over runs.
    pub workers: Vec<WorkerRuntimeSnapshot>,
}

impl PipelineStats {
    /// Folds one finished worker-pool run into the totals.
    pub fn absorb_runtime(&mut self, runtime: PoolRuntimeSnapshot) {
        self.elapsed += runtime.elapsed;
        for worker in runtime.workers {
            match self
                .workers
                .iter_mut()
                .find(|known| known.worker_id == worker.worker_id)
            {
                Some(known) => {
                    known.tasks_completed += worker.tasks_completed;
                    known.uptime += worker.uptime;
                    known.busy += worker.busy;
                    known.idle += worker.idle;
                    known.utilization = if known.uptime.is_zero() {
                        0.0
                    } else {
                        known.busy.as_secs_f64() / known.uptime.as_secs_f64()
                    };
                }
                None => self.workers.push(worker),
            }
        }
    }

    /// Blocks transformed by all workers.
    pub fn tasks_completed(&self) -> usize {
        self.workers.iter().map(|worker| worker.tasks_completed).sum()
    }
}
