use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use crate::buffer::Block;
use crate::telemetry::{self, profile, tags};

const PROFILE_TAG_STACK_POOL: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_POOL];

/// A fixed-capacity free-list of block payload buffers.
///
/// Blocks handed out by [`BlockPool::acquire`] return their buffer to the
/// pool when dropped. At most `max_blocks` spare buffers are retained; a
/// buffer released into a full pool is freed instead.
///
/// `acquire` never blocks: with no spare it allocates. The pool bounds the
/// spares it keeps, not the blocks alive at once. In a pipeline the live
/// count is bounded by the stages instead: two queues of `capacity` slots,
/// one block in hand per worker plus one scratch buffer per worker (owned by
/// the worker, not the pool), the reader's prefetch list, and the block the
/// facade is reading or filling. The default `max_blocks` is sized to that
/// sum so steady-state acquires recycle.
///
/// # Example
/// ```
/// use pbgzf_core::BlockPool;
///
/// let pool = BlockPool::new(64 * 1024, 8);
/// let mut block = pool.acquire();
/// block.as_mut_vec().extend_from_slice(b"payload");
/// drop(block); // buffer goes back to the free-list
/// assert_eq!(pool.metrics().spare, 1);
/// ```
#[derive(Debug)]
pub struct BlockPool {
    recycler: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
    block_capacity: usize,
    max_blocks: usize,
    metrics: Arc<PoolMetricsInner>,
}

impl BlockPool {
    /// Creates a pool whose blocks hold at least `block_capacity` bytes and
    /// which retains at most `max_blocks` spares.
    pub fn new(block_capacity: usize, max_blocks: usize) -> Self {
        let max_blocks = max_blocks.max(1);
        let (tx, rx) = bounded(max_blocks);
        Self {
            recycler: tx,
            receiver: rx,
            block_capacity,
            max_blocks,
            metrics: Arc::new(PoolMetricsInner::default()),
        }
    }

    /// Takes a spare block, or allocates a fresh one when the free-list is empty.
    ///
    /// The returned block is empty, has id 0, and a zero cursor.
    pub fn acquire(&self) -> Block {
        let started_at = Instant::now();
        let (result, data) = match self.receiver.try_recv() {
            Ok(mut data) => {
                data.clear();
                if data.capacity() < self.block_capacity {
                    data.reserve_exact(self.block_capacity);
                }
                self.metrics.recycled.fetch_add(1, Ordering::Relaxed);
                telemetry::increment_counter(
                    tags::METRIC_POOL_ACQUIRE_RECYCLED_COUNT,
                    1,
                    &[("subsystem", "pool"), ("op", "acquire"), ("result", "recycled")],
                );
                telemetry::sub_gauge_saturating(
                    tags::METRIC_POOL_SPARE_BYTES,
                    data.capacity() as u64,
                    &[("subsystem", "pool")],
                );
                ("recycled", data)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                telemetry::increment_counter(
                    tags::METRIC_POOL_ACQUIRE_CREATED_COUNT,
                    1,
                    &[("subsystem", "pool"), ("op", "acquire"), ("result", "created")],
                );
                ("created", Vec::with_capacity(self.block_capacity))
            }
        };
        profile::event(
            tags::PROFILE_POOL,
            &PROFILE_TAG_STACK_POOL,
            "acquire",
            result,
            profile::elapsed_us(started_at),
            "block acquire completed",
        );

        Block::pooled(
            data,
            Recycler {
                sender: self.recycler.clone(),
                metrics: Arc::clone(&self.metrics),
            },
        )
    }

    /// Returns a snapshot of the current pool metrics.
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            created: self.metrics.created.load(Ordering::Relaxed),
            recycled: self.metrics.recycled.load(Ordering::Relaxed),
            dropped: self.metrics.dropped.load(Ordering::Relaxed),
            spare: self.receiver.len(),
        }
    }

    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }

    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }
}

/// A snapshot of block pool metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMetricsSnapshot {
    /// Buffers allocated because the free-list was empty.
    pub created: usize,
    /// Acquisitions served from the free-list.
    pub recycled: usize,
    /// Buffers freed because the free-list was full.
    pub dropped: usize,
    /// Buffers currently waiting in the free-list.
    pub spare: usize,
}

impl PoolMetricsSnapshot {
    /// Buffers allocated by the pool that have not been freed.
    pub fn live(&self) -> usize {
        self.created.saturating_sub(self.dropped)
    }
}

#[derive(Debug, Default)]
struct PoolMetricsInner {
    created: AtomicUsize,
    recycled: AtomicUsize,
    dropped: AtomicUsize,
}

/// Return path from a block back to the pool that allocated it.
#[derive(Debug)]
pub(crate) struct Recycler {
    sender: Sender<Vec<u8>>,
    metrics: Arc<PoolMetricsInner>,
}

impl Recycler {
    pub(crate) fn recycle(self, data: Vec<u8>) {
        let capacity = data.capacity();
        match self.sender.try_send(data) {
            Ok(()) => {
                telemetry::increment_counter(
                    tags::METRIC_POOL_RECYCLE_OK_COUNT,
                    1,
                    &[("subsystem", "pool"), ("op", "recycle"), ("result", "recycled")],
                );
                telemetry::add_gauge(
                    tags::METRIC_POOL_SPARE_BYTES,
                    capacity as u64,
                    &[("subsystem", "pool")],
                );
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                telemetry::increment_counter(
                    tags::METRIC_POOL_RECYCLE_DROPPED_COUNT,
                    1,
                    &[("subsystem", "pool"), ("op", "recycle"), ("result", "dropped")],
                );
            }
        }
    }
}
