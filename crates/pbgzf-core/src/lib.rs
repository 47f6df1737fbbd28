pub mod buffer;
pub mod compression;
pub mod core;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod telemetry;
pub mod types;

pub use buffer::{Block, BlockPool, PoolMetricsSnapshot};
pub use crate::core::{BoundedQueue, PushError, QueueOrdering, Sequenced};
pub use error::PbgzfError;
pub use format::VirtualOffset;
pub use pipeline::{
    BgzfStream, OpenMode, PipelineConfig, PipelineReader, PipelineState, PipelineStats,
    PipelineWriter, Released, compress_stream, decompress_stream,
};
pub use telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
pub use types::{CompressionLevel, Direction, Result};
