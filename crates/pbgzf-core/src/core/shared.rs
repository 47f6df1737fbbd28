use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::PbgzfError;
use crate::buffer::{Block, BlockPool};
use crate::core::queue::{BoundedQueue, QueueOrdering};
use crate::telemetry::{self, tags};

/// Holds the first fatal error raised by any pipeline stage.
#[derive(Debug, Default)]
pub struct FailureSlot {
    failed: AtomicBool,
    first: Mutex<Option<PbgzfError>>,
}

impl FailureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `error` if no failure was recorded yet. Returns true when it did.
    pub fn record(&self, error: PbgzfError) -> bool {
        let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if self.failed.swap(true, Ordering::AcqRel) {
            return false;
        }
        *first = Some(error);
        true
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Hands out the recorded error once. Later calls return
    /// [`PbgzfError::PipelineFailed`] while the slot stays failed.
    pub fn take(&self) -> Option<PbgzfError> {
        if !self.is_failed() {
            return None;
        }
        let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        Some(first.take().unwrap_or(PbgzfError::PipelineFailed))
    }
}

/// State shared by every stage of one pipeline: both queues, the block pool,
/// and the failure slot.
///
/// The owning facade holds it in an `Arc` and joins every stage thread before
/// resetting or dropping it.
#[derive(Debug)]
pub struct PipelineShared {
    pub input: BoundedQueue<Block>,
    pub output: BoundedQueue<Block>,
    pub pool: BlockPool,
    failure: FailureSlot,
}

impl PipelineShared {
    /// Builds the queues for one producer feeding `workers` workers, which
    /// feed one consumer in stream order.
    pub fn new(queue_capacity: usize, workers: usize, pool: BlockPool) -> Self {
        let workers = workers.max(1);
        Self {
            input: BoundedQueue::new("input", queue_capacity, QueueOrdering::Unordered, 1, workers),
            output: BoundedQueue::new("output", queue_capacity, QueueOrdering::Ordered, workers, 1),
            pool,
            failure: FailureSlot::new(),
        }
    }

    /// Records a fatal error from `stage` and closes both queues so every
    /// blocked stage wakes up and exits.
    pub fn fail(&self, stage: &'static str, error: PbgzfError) {
        let message = error.to_string();
        if self.failure.record(error) {
            tracing::error!(stage, error = %message, "pipeline stage failed");
            telemetry::increment_counter(
                tags::METRIC_PIPELINE_FAILURE_COUNT,
                1,
                &[("subsystem", "pipeline"), ("stage", stage)],
            );
        }
        self.close();
    }

    pub fn failure(&self) -> &FailureSlot {
        &self.failure
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_failed()
    }

    pub fn close(&self) {
        self.input.close();
        self.output.close();
    }

    /// Clears both queues for a restart. Callers must have joined every stage.
    pub fn reset(&self) -> usize {
        self.input.reset() + self.output.reset()
    }
}
