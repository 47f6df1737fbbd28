use std::io::{ErrorKind, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::core::shared::PipelineShared;
use crate::telemetry::{self, profile, tags};
use crate::{PbgzfError, Result};

const PROFILE_TAG_STACK_WRITER: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_WRITER];

/// Counters reported by a finished writer stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub blocks: u64,
    pub bytes: u64,
}

/// Starts the writer stage on its own thread.
///
/// The writer drains the output queue in sequence order, writes every
/// payload to `sink` in full, and drops the block so its buffer returns to
/// the pool. A write error is recorded in the failure slot. The sink is
/// handed back through the join handle; it is not flushed here.
pub fn spawn_writer<W>(sink: W, shared: Arc<PipelineShared>) -> Result<JoinHandle<(W, WriterStats)>>
where
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name("pbgzf-writer".to_string())
        .spawn(move || run_writer(sink, shared))
        .map_err(|error| PbgzfError::Thread(format!("failed to spawn writer thread: {error}")))
}

fn run_writer<W: Write>(mut sink: W, shared: Arc<PipelineShared>) -> (W, WriterStats) {
    let mut stats = WriterStats::default();

    while let Some(block) = shared.output.pop(true) {
        let started_at = Instant::now();
        if let Err(error) = write_payload(&mut sink, block.as_slice()) {
            shared.fail("writer", error.with_context(format!("writing block {}", block.id())));
            break;
        }

        stats.blocks += 1;
        stats.bytes += block.len() as u64;
        telemetry::increment_counter(
            tags::METRIC_WRITER_BLOCK_COUNT,
            1,
            &[("subsystem", "writer"), ("op", "write")],
        );
        telemetry::increment_counter(
            tags::METRIC_WRITER_BYTES,
            block.len() as u64,
            &[("subsystem", "writer"), ("op", "write")],
        );
        profile::event(
            tags::PROFILE_WRITER,
            &PROFILE_TAG_STACK_WRITER,
            "write_block",
            "ok",
            profile::elapsed_us(started_at),
            "writer emitted block",
        );
    }

    shared.output.consumer_done();
    tracing::debug!(blocks = stats.blocks, bytes = stats.bytes, "writer stage finished");
    (sink, stats)
}

/// Writes all of `payload`, reporting a sink that stops accepting bytes as a
/// short write.
pub(crate) fn write_payload<W: Write + ?Sized>(sink: &mut W, payload: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < payload.len() {
        match sink.write(&payload[written..]) {
            Ok(0) => {
                return Err(PbgzfError::ShortWrite {
                    expected: payload.len(),
                    actual: written,
                });
            }
            Ok(n) => written += n,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        }
    }
    Ok(())
}
