use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::buffer::Block;
use crate::core::queue::PushError;
use crate::core::shared::PipelineShared;
use crate::format::bgzf::{self, MAX_BLOCK_SIZE};
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::types::{CompressionLevel, Direction, duration_to_us};
use crate::{PbgzfError, Result};

/// Builds the per-block transform for `direction`.
///
/// Decompression inflates a container block and verifies its trailer;
/// compression turns a raw chunk into one or more container blocks. Either
/// way the block keeps its id and source offset and the scratch buffer ends
/// up holding the block's previous payload.
pub fn codec_processor(
    direction: Direction,
    level: CompressionLevel,
) -> impl Fn(usize, &mut Block, &mut Vec<u8>) -> Result<()> + Send + Sync + 'static {
    move |_worker_id: usize, block: &mut Block, scratch: &mut Vec<u8>| {
        match direction {
            Direction::Decompress => {
                bgzf::inflate_block(block.as_slice(), block.source_offset(), scratch)?;
            }
            Direction::Compress => {
                scratch.clear();
                bgzf::deflate_blocks(block.as_slice(), level, scratch)?;
            }
        }
        block.swap_payload(scratch);
        Ok(())
    }
}

/// N identical threads moving blocks from the input queue to the output queue.
pub struct WorkerPool {
    num_workers: usize,
    telemetry: Arc<dyn WorkerTelemetry>,
}

impl WorkerPool {
    /// Creates a worker pool using the default worker telemetry implementation.
    pub fn new(num_workers: usize) -> Self {
        Self::with_telemetry(num_workers, Arc::new(DefaultWorkerTelemetry))
    }

    /// Creates a worker pool with a custom telemetry backend.
    pub fn with_telemetry(num_workers: usize, telemetry: Arc<dyn WorkerTelemetry>) -> Self {
        Self {
            num_workers: num_workers.max(1),
            telemetry,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Spawns the workers over `shared`'s queues.
    ///
    /// Each worker pops from the input queue, runs `processor`, and pushes the
    /// result to the output queue under the block's own id. A processor error
    /// or panic is recorded in the failure slot, which closes both queues. If
    /// a thread cannot be spawned the failure is recorded the same way and the
    /// missing workers are deregistered from both queues, so the returned
    /// handle always joins cleanly.
    pub fn spawn<F>(
        &self,
        shared: Arc<PipelineShared>,
        task_kind: &'static str,
        processor: F,
    ) -> WorkerPoolHandle
    where
        F: Fn(usize, &mut Block, &mut Vec<u8>) -> Result<()> + Send + Sync + 'static,
    {
        let state = Arc::new(WorkerPoolState::new(
            Arc::clone(&self.telemetry),
            self.num_workers,
            task_kind,
        ));
        let processor = Arc::new(processor);

        let mut worker_handles = Vec::with_capacity(self.num_workers);
        for worker_id in 0..self.num_workers {
            let worker_state = Arc::clone(&state);
            let worker_shared = Arc::clone(&shared);
            let worker_processor = Arc::clone(&processor);

            let spawned = thread::Builder::new()
                .name(format!("pbgzf-worker-{worker_id}"))
                .spawn(move || {
                    run_worker_loop(worker_id, worker_state, worker_shared, worker_processor);
                });
            match spawned {
                Ok(handle) => worker_handles.push(handle),
                Err(error) => {
                    for _ in worker_id..self.num_workers {
                        shared.input.consumer_done();
                        shared.output.producer_done();
                    }
                    shared.fail(
                        "worker",
                        PbgzfError::Thread(format!("failed to spawn worker {worker_id}: {error}")),
                    );
                    break;
                }
            }
        }

        WorkerPoolHandle {
            state,
            worker_handles,
        }
    }
}

struct WorkerPoolState {
    telemetry: Arc<dyn WorkerTelemetry>,
    task_kind: &'static str,
    started_at: Instant,
    completed: AtomicUsize,
    task_counts: Vec<AtomicUsize>,
    worker_started_offsets_us: Vec<AtomicU64>,
    worker_stopped_offsets_us: Vec<AtomicU64>,
    worker_busy_us: Vec<AtomicU64>,
}

impl WorkerPoolState {
    fn new(telemetry: Arc<dyn WorkerTelemetry>, num_workers: usize, task_kind: &'static str) -> Self {
        Self {
            telemetry,
            task_kind,
            started_at: Instant::now(),
            completed: AtomicUsize::new(0),
            task_counts: (0..num_workers).map(|_| AtomicUsize::new(0)).collect(),
            worker_started_offsets_us: (0..num_workers).map(|_| AtomicU64::new(0)).collect(),
            worker_stopped_offsets_us: (0..num_workers).map(|_| AtomicU64::new(0)).collect(),
            worker_busy_us: (0..num_workers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    // Offsets are stored +1 so zero means "not recorded".
    fn mark(&self, slots: &[AtomicU64], worker_id: usize) {
        let offset_us = duration_to_us(self.started_at.elapsed());
        slots[worker_id].store(offset_us.saturating_add(1), Ordering::Release);
    }
}

/// Per-worker runtime metrics captured by the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRuntimeSnapshot {
    pub worker_id: usize,
    pub tasks_completed: usize,
    pub uptime: Duration,
    pub busy: Duration,
    pub idle: Duration,
    pub utilization: f64,
}

/// Runtime metrics snapshot for the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRuntimeSnapshot {
    pub elapsed: Duration,
    pub completed: usize,
    pub workers: Vec<WorkerRuntimeSnapshot>,
}

/// Runtime handle for a spawned worker pool.
pub struct WorkerPoolHandle {
    state: Arc<WorkerPoolState>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Number of threads actually running.
    pub fn spawned(&self) -> usize {
        self.worker_handles.len()
    }

    /// Total blocks transformed so far.
    pub fn completed_count(&self) -> usize {
        self.state.completed.load(Ordering::Acquire)
    }

    /// Returns runtime metrics for the pool and each worker.
    pub fn runtime_snapshot(&self) -> PoolRuntimeSnapshot {
        let elapsed = self.state.started_at.elapsed();
        let elapsed_us = duration_to_us(elapsed);

        let workers = (0..self.state.task_counts.len())
            .map(|worker_id| {
                let started_raw =
                    self.state.worker_started_offsets_us[worker_id].load(Ordering::Acquire);
                let stopped_raw =
                    self.state.worker_stopped_offsets_us[worker_id].load(Ordering::Acquire);
                let busy_us_raw = self.state.worker_busy_us[worker_id].load(Ordering::Acquire);

                let start_us = started_raw.saturating_sub(1);
                let stop_us = if stopped_raw == 0 {
                    elapsed_us
                } else {
                    stopped_raw.saturating_sub(1)
                };
                let uptime_us = if started_raw == 0 {
                    0
                } else {
                    stop_us.saturating_sub(start_us)
                };
                let busy_us = busy_us_raw.min(uptime_us);
                let utilization = if uptime_us == 0 {
                    0.0
                } else {
                    busy_us as f64 / uptime_us as f64
                };

                WorkerRuntimeSnapshot {
                    worker_id,
                    tasks_completed: self.state.task_counts[worker_id].load(Ordering::Acquire),
                    uptime: Duration::from_micros(uptime_us),
                    busy: Duration::from_micros(busy_us),
                    idle: Duration::from_micros(uptime_us.saturating_sub(busy_us)),
                    utilization,
                }
            })
            .collect();

        PoolRuntimeSnapshot {
            elapsed,
            completed: self.completed_count(),
            workers,
        }
    }

    /// Waits for every worker to exit and returns the final runtime metrics.
    ///
    /// Workers only exit once the input queue is closed or drained of
    /// producers, or the pipeline failed; callers arrange one of those first.
    pub fn join(mut self) -> Result<PoolRuntimeSnapshot> {
        let mut first_error = None;
        for handle in self.worker_handles.drain(..) {
            if let Err(payload) = handle.join() {
                first_error.get_or_insert_with(|| {
                    PbgzfError::Thread(format!("worker thread panicked: {}", panic_message(&*payload)))
                });
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(self.runtime_snapshot()),
        }
    }
}

fn run_worker_loop<F>(
    worker_id: usize,
    state: Arc<WorkerPoolState>,
    shared: Arc<PipelineShared>,
    processor: Arc<F>,
) where
    F: Fn(usize, &mut Block, &mut Vec<u8>) -> Result<()> + Send + Sync,
{
    state.mark(&state.worker_started_offsets_us, worker_id);
    let mut scratch = Vec::with_capacity(MAX_BLOCK_SIZE);

    loop {
        state.telemetry.on_queue_depth(worker_id, shared.input.len());
        let Some(mut block) = shared.input.pop(true) else {
            break;
        };

        state.telemetry.on_task_started(worker_id, state.task_kind);
        let started_at = Instant::now();
        let result = match catch_unwind(AssertUnwindSafe(|| {
            processor(worker_id, &mut block, &mut scratch)
        })) {
            Ok(result) => result,
            Err(payload) => Err(PbgzfError::Thread(format!(
                "worker {worker_id} panicked while processing block {}: {}",
                block.id(),
                panic_message(&*payload)
            ))),
        };

        let elapsed = started_at.elapsed();
        state.worker_busy_us[worker_id].fetch_add(duration_to_us(elapsed), Ordering::AcqRel);
        match result {
            Ok(()) => {
                state
                    .telemetry
                    .on_task_finished(worker_id, state.task_kind, elapsed);
                state.completed.fetch_add(1, Ordering::AcqRel);
                state.task_counts[worker_id].fetch_add(1, Ordering::AcqRel);

                match shared.output.push(block, true) {
                    Ok(()) => {}
                    Err(PushError::InvalidId(block)) => {
                        shared.fail(
                            "worker",
                            PbgzfError::Thread(format!(
                                "output queue rejected block id {}",
                                block.id()
                            )),
                        );
                        break;
                    }
                    // Closed or abandoned: the pipeline is being torn down.
                    Err(_) => break,
                }
            }
            Err(error) => {
                state.telemetry.on_task_failed(worker_id, state.task_kind, elapsed);
                let context = format!("{} of block {}", state.task_kind, block.id());
                shared.fail("worker", error.with_context(context));
                break;
            }
        }
    }

    state.mark(&state.worker_stopped_offsets_us, worker_id);
    shared.output.producer_done();
    shared.input.consumer_done();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
