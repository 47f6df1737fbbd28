use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::telemetry::{self, tags};

/// Items that carry a stream-order id.
pub trait Sequenced {
    fn sequence_id(&self) -> u64;
    fn assign_sequence_id(&mut self, id: u64);
}

/// How a [`BoundedQueue`] places and releases items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrdering {
    /// FIFO. Push assigns the next sequence id to each item.
    Unordered,
    /// Items keep their own id and occupy slot `id % capacity`. Pop only
    /// releases the item whose id is next in sequence.
    Ordered,
}

/// Reasons a push did not take the item. The item is handed back.
#[derive(PartialEq, Eq)]
pub enum PushError<T> {
    /// No room (or, in ordered mode, the id is outside the window) and the
    /// caller asked not to wait.
    Full(T),
    /// The queue was closed.
    Closed(T),
    /// No producers or no consumers remain registered.
    Disconnected(T),
    /// Ordered mode only: the id was already released or its slot is taken.
    InvalidId(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item)
            | PushError::Closed(item)
            | PushError::Disconnected(item)
            | PushError::InvalidId(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PushError::Full(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PushError::Closed(_))
    }

    fn reason(&self) -> &'static str {
        match self {
            PushError::Full(_) => "queue is full",
            PushError::Closed(_) => "queue is closed",
            PushError::Disconnected(_) => "queue has no producers or consumers left",
            PushError::InvalidId(_) => "sequence id already released or queued",
        }
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl<T> std::error::Error for PushError<T> {}

struct QueueState<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
    // Unordered: id handed to the next push. Ordered: id the next pop releases.
    next_id: u64,
    eof: bool,
}

/// A capacity-limited blocking queue shared between pipeline stages.
///
/// One mutex guards all state; `not_full`, `not_empty`, and `is_empty` are
/// the three wait points. Producer and consumer counts are registered up
/// front and released by [`producer_done`](Self::producer_done) and
/// [`consumer_done`](Self::consumer_done); every wait re-checks them under the
/// lock, so a stage that exits always wakes the stages blocked on it.
///
/// Closing and draining are separate: [`close`](Self::close) stops new pushes
/// and turns blocking pops into non-blocking ones while buffered items stay
/// poppable, and [`wait_until_empty`](Self::wait_until_empty) only waits for
/// the item count to reach zero.
pub struct BoundedQueue<T> {
    name: &'static str,
    capacity: usize,
    ordering: QueueOrdering,
    initial_producers: usize,
    initial_consumers: usize,
    producers: AtomicUsize,
    consumers: AtomicUsize,
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    is_empty: Condvar,
}

impl<T: Sequenced> BoundedQueue<T> {
    /// Creates a queue with `capacity` slots (at least one) and the given
    /// number of registered producers and consumers.
    pub fn new(
        name: &'static str,
        capacity: usize,
        ordering: QueueOrdering,
        producers: usize,
        consumers: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            ordering,
            initial_producers: producers,
            initial_consumers: consumers,
            producers: AtomicUsize::new(producers),
            consumers: AtomicUsize::new(consumers),
            state: Mutex::new(QueueState {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
                count: 0,
                next_id: 0,
                eof: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            is_empty: Condvar::new(),
        }
    }

    /// Inserts an item, waiting for room when `wait` is set.
    ///
    /// Fails without waiting once the queue is closed or a side has no
    /// registered members left. In ordered mode the item must carry an id in
    /// `[next_pop_id, next_pop_id + capacity)`; a later id waits (or fails
    /// with [`PushError::Full`]) until earlier ids are popped.
    pub fn push(&self, mut item: T, wait: bool) -> Result<(), PushError<T>> {
        let mut state = self.lock();
        loop {
            if self.consumers.load(Ordering::Acquire) == 0
                || self.producers.load(Ordering::Acquire) == 0
            {
                return Err(self.rejected(PushError::Disconnected(item)));
            }
            if state.eof {
                return Err(self.rejected(PushError::Closed(item)));
            }

            let admissible = match self.ordering {
                QueueOrdering::Unordered => state.count < self.capacity,
                QueueOrdering::Ordered => {
                    let id = item.sequence_id();
                    if id < state.next_id {
                        return Err(self.rejected(PushError::InvalidId(item)));
                    }
                    // Within the window a slot can only be held by the same id.
                    let in_window = id - state.next_id < self.capacity as u64;
                    if in_window && state.slots[self.slot_for(id)].is_some() {
                        return Err(self.rejected(PushError::InvalidId(item)));
                    }
                    in_window && state.count < self.capacity
                }
            };
            if admissible {
                break;
            }
            if !wait {
                return Err(self.rejected(PushError::Full(item)));
            }
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        match self.ordering {
            QueueOrdering::Unordered => {
                item.assign_sequence_id(state.next_id);
                state.next_id += 1;
                let tail = state.tail;
                state.slots[tail] = Some(item);
                state.tail = (tail + 1) % self.capacity;
            }
            QueueOrdering::Ordered => {
                let slot = self.slot_for(item.sequence_id());
                state.slots[slot] = Some(item);
            }
        }
        state.count += 1;
        let depth = state.count;
        drop(state);

        self.notify(&self.not_empty);
        telemetry::increment_counter(
            tags::METRIC_QUEUE_PUSH_COUNT,
            1,
            &[("subsystem", "queue"), ("queue", self.name)],
        );
        self.publish_depth(depth);
        Ok(())
    }

    /// Removes the next item, waiting for one when `wait` is set.
    ///
    /// Returns `None` when nothing is poppable and no more can arrive: the
    /// queue is closed, every producer is done, or `wait` is false. In
    /// ordered mode only the next id in sequence is poppable, even if later
    /// ids are buffered.
    pub fn pop(&self, wait: bool) -> Option<T> {
        let mut state = self.lock();
        if self.consumers.load(Ordering::Acquire) == 0 {
            return None;
        }

        let item = loop {
            if state.count > 0 {
                let slot = match self.ordering {
                    QueueOrdering::Unordered => Some(state.head),
                    QueueOrdering::Ordered => {
                        let slot = self.slot_for(state.next_id);
                        state.slots[slot].is_some().then_some(slot)
                    }
                };
                if let Some(slot) = slot {
                    if let Some(item) = state.slots[slot].take() {
                        break item;
                    }
                }
            }

            if !wait || state.eof || self.producers.load(Ordering::Acquire) == 0 {
                drop(state);
                telemetry::increment_counter(
                    tags::METRIC_QUEUE_POP_EMPTY_COUNT,
                    1,
                    &[("subsystem", "queue"), ("queue", self.name)],
                );
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        };

        match self.ordering {
            QueueOrdering::Unordered => state.head = (state.head + 1) % self.capacity,
            QueueOrdering::Ordered => {
                state.next_id += 1;
                state.head = self.slot_for(state.next_id);
            }
        }
        state.count -= 1;
        let depth = state.count;
        drop(state);

        self.notify(&self.not_full);
        if depth == 0 {
            self.is_empty.notify_all();
        }
        telemetry::increment_counter(
            tags::METRIC_QUEUE_POP_COUNT,
            1,
            &[("subsystem", "queue"), ("queue", self.name)],
        );
        self.publish_depth(depth);
        Some(item)
    }

    /// Blocks until every buffered item has been popped.
    ///
    /// Returns `false` if items remain but no consumer is left to pop them.
    /// Closing the queue does not end this wait.
    pub fn wait_until_empty(&self) -> bool {
        let mut state = self.lock();
        while state.count > 0 {
            if self.consumers.load(Ordering::Acquire) == 0 {
                return false;
            }
            state = self
                .is_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        true
    }

    /// Marks end of input and wakes every waiter. Idempotent until [`reset`](Self::reset).
    pub fn close(&self) {
        let mut state = self.lock();
        if state.eof {
            return;
        }
        state.eof = true;
        drop(state);

        self.not_full.notify_all();
        self.not_empty.notify_all();
        telemetry::increment_counter(
            tags::METRIC_QUEUE_CLOSE_COUNT,
            1,
            &[("subsystem", "queue"), ("queue", self.name)],
        );
    }

    /// Discards buffered items, zeroes cursors and ids, clears the closed
    /// flag, and restores the registered producer and consumer counts.
    ///
    /// Only call while no stage is using the queue. Returns the number of
    /// items discarded.
    pub fn reset(&self) -> usize {
        let mut state = self.lock();
        let discarded: Vec<T> = state.slots.iter_mut().filter_map(Option::take).collect();
        state.head = 0;
        state.tail = 0;
        state.count = 0;
        state.next_id = 0;
        state.eof = false;
        self.producers
            .store(self.initial_producers, Ordering::Release);
        self.consumers
            .store(self.initial_consumers, Ordering::Release);
        drop(state);

        // Dropping outside the lock lets pooled items recycle without holding it.
        let count = discarded.len();
        drop(discarded);
        telemetry::increment_counter(
            tags::METRIC_QUEUE_RESET_COUNT,
            1,
            &[("subsystem", "queue"), ("queue", self.name)],
        );
        self.publish_depth(0);
        count
    }

    /// Deregisters one producer. Consumers observe end of input once all
    /// producers are done and the queue is empty.
    pub fn producer_done(&self) {
        let _state = self.lock();
        let _ = self
            .producers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Deregisters one consumer.
    pub fn consumer_done(&self) {
        let _state = self.lock();
        let _ = self
            .consumers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        self.not_full.notify_all();
        self.not_empty.notify_all();
        self.is_empty.notify_all();
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ordering(&self) -> QueueOrdering {
        self.ordering
    }

    pub fn len(&self) -> usize {
        self.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().eof
    }

    pub fn producers(&self) -> usize {
        self.producers.load(Ordering::Acquire)
    }

    pub fn consumers(&self) -> usize {
        self.consumers.load(Ordering::Acquire)
    }

    fn slot_for(&self, id: u64) -> usize {
        (id % self.capacity as u64) as usize
    }

    // Ordered waiters each wait for a different id, so a single wakeup could
    // land on one that still cannot proceed while the eligible one sleeps.
    fn notify(&self, condvar: &Condvar) {
        match self.ordering {
            QueueOrdering::Unordered => condvar.notify_one(),
            QueueOrdering::Ordered => condvar.notify_all(),
        }
    }

    fn publish_depth(&self, depth: usize) {
        telemetry::set_gauge(
            tags::METRIC_QUEUE_DEPTH,
            depth as u64,
            &[("subsystem", "queue"), ("queue", self.name)],
        );
    }

    fn rejected(&self, error: PushError<T>) -> PushError<T> {
        telemetry::increment_counter(
            tags::METRIC_QUEUE_PUSH_REJECTED_COUNT,
            1,
            &[("subsystem", "queue"), ("queue", self.name)],
        );
        error
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("ordering", &self.ordering)
            .field("producers", &self.producers.load(Ordering::Relaxed))
            .field("consumers", &self.consumers.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
