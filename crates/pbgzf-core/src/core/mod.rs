pub mod queue;
pub mod reader;
pub mod shared;
pub mod worker_pool;
pub mod writer;

pub use queue::{BoundedQueue, PushError, QueueOrdering, Sequenced};
pub use reader::{BgzfBlockSource, BlockSource, RawChunkSource, ReaderStats, spawn_reader};
pub use shared::{FailureSlot, PipelineShared};
pub use worker_pool::{
    PoolRuntimeSnapshot, WorkerPool, WorkerPoolHandle, WorkerRuntimeSnapshot, codec_processor,
};
pub use writer::{WriterStats, spawn_writer};
