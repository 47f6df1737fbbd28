/// Profiling target for block pool operations.
pub const PROFILE_POOL: &str = "pbgzf.profile.pool";
/// Profiling target for bounded queue operations.
pub const PROFILE_QUEUE: &str = "pbgzf.profile.queue";
/// Profiling target for the reader stage.
pub const PROFILE_READER: &str = "pbgzf.profile.reader";
/// Profiling target for worker runtime.
pub const PROFILE_WORKER: &str = "pbgzf.profile.worker";
/// Profiling target for the writer stage.
pub const PROFILE_WRITER: &str = "pbgzf.profile.writer";
/// Profiling target for block codec operations.
pub const PROFILE_CODEC: &str = "pbgzf.profile.codec";
/// Profiling target for pipeline facade state transitions.
pub const PROFILE_PIPELINE: &str = "pbgzf.profile.pipeline";

/// Global system-level tag shared by all profiling events.
pub const TAG_SYSTEM: &str = "system";
pub const TAG_POOL: &str = "pool";
pub const TAG_QUEUE: &str = "queue";
pub const TAG_READER: &str = "reader";
pub const TAG_WORKER: &str = "worker";
pub const TAG_WRITER: &str = "writer";
pub const TAG_CODEC: &str = "codec";
pub const TAG_PIPELINE: &str = "pipeline";

pub const METRIC_POOL_ACQUIRE_CREATED_COUNT: &str = "pbgzf.pool.acquire.created.count";
pub const METRIC_POOL_ACQUIRE_RECYCLED_COUNT: &str = "pbgzf.pool.acquire.recycled.count";
pub const METRIC_POOL_RECYCLE_OK_COUNT: &str = "pbgzf.pool.recycle.ok.count";
pub const METRIC_POOL_RECYCLE_DROPPED_COUNT: &str = "pbgzf.pool.recycle.dropped.count";
pub const METRIC_POOL_SPARE_BYTES: &str = "pbgzf.pool.spare_bytes";

pub const METRIC_QUEUE_PUSH_COUNT: &str = "pbgzf.queue.push.count";
pub const METRIC_QUEUE_PUSH_REJECTED_COUNT: &str = "pbgzf.queue.push.rejected.count";
pub const METRIC_QUEUE_POP_COUNT: &str = "pbgzf.queue.pop.count";
pub const METRIC_QUEUE_POP_EMPTY_COUNT: &str = "pbgzf.queue.pop.empty.count";
pub const METRIC_QUEUE_CLOSE_COUNT: &str = "pbgzf.queue.close.count";
pub const METRIC_QUEUE_RESET_COUNT: &str = "pbgzf.queue.reset.count";
pub const METRIC_QUEUE_DEPTH: &str = "pbgzf.queue.depth";

pub const METRIC_READER_BLOCK_COUNT: &str = "pbgzf.reader.block.count";
pub const METRIC_READER_BYTES: &str = "pbgzf.reader.bytes";
pub const METRIC_WRITER_BLOCK_COUNT: &str = "pbgzf.writer.block.count";
pub const METRIC_WRITER_BYTES: &str = "pbgzf.writer.bytes";

pub const METRIC_CODEC_INFLATE_COUNT: &str = "pbgzf.codec.inflate.count";
pub const METRIC_CODEC_INFLATE_LATENCY_US: &str = "pbgzf.codec.inflate.latency_us";
pub const METRIC_CODEC_DEFLATE_COUNT: &str = "pbgzf.codec.deflate.count";
pub const METRIC_CODEC_DEFLATE_LATENCY_US: &str = "pbgzf.codec.deflate.latency_us";
pub const METRIC_CODEC_DEFLATE_RETRY_COUNT: &str = "pbgzf.codec.deflate.retry.count";
pub const METRIC_CODEC_INPUT_BYTES: &str = "pbgzf.codec.input_bytes";
pub const METRIC_CODEC_OUTPUT_BYTES: &str = "pbgzf.codec.output_bytes";

pub const METRIC_WORKER_TASK_COUNT: &str = "pbgzf.worker.task.count";
pub const METRIC_WORKER_TASK_START_COUNT: &str = "pbgzf.worker.task.start.count";
pub const METRIC_WORKER_TASK_FINISH_COUNT: &str = "pbgzf.worker.task.finish.count";
pub const METRIC_WORKER_TASK_FAIL_COUNT: &str = "pbgzf.worker.task.fail.count";
pub const METRIC_WORKER_TASK_LATENCY_US: &str = "pbgzf.worker.task.latency_us";
pub const METRIC_WORKER_ACTIVE_COUNT: &str = "pbgzf.worker.active.count";
pub const METRIC_WORKER_QUEUE_DEPTH_HIST: &str = "pbgzf.worker.queue.depth_hist";

pub const METRIC_PIPELINE_RESTART_COUNT: &str = "pbgzf.pipeline.restart.count";
pub const METRIC_PIPELINE_FAILURE_COUNT: &str = "pbgzf.pipeline.failure.count";
