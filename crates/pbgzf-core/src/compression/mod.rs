use std::time::Instant;

use crate::Result;
use crate::telemetry::{self, profile, tags};
use crate::types::{CompressionLevel, duration_to_us};

pub mod deflate;

pub use deflate::DeflateOutcome;

/// Raw-deflates `input` into the fixed `output` window.
pub fn compress(input: &[u8], level: CompressionLevel, output: &mut [u8]) -> Result<DeflateOutcome> {
    let start = Instant::now();
    let result = deflate::apply(input, level, output);

    if let Ok(outcome) = result {
        let elapsed_us = duration_to_us(start.elapsed());
        let (result_tag, output_bytes) = match outcome {
            DeflateOutcome::Complete(len) => ("ok", len as u64),
            DeflateOutcome::Overflow => ("overflow", 0),
        };
        let labels = [("subsystem", "codec"), ("op", "deflate"), ("result", result_tag)];
        telemetry::increment_counter(tags::METRIC_CODEC_DEFLATE_COUNT, 1, &labels);
        telemetry::record_histogram(tags::METRIC_CODEC_DEFLATE_LATENCY_US, elapsed_us, &labels);
        telemetry::record_histogram(tags::METRIC_CODEC_INPUT_BYTES, input.len() as u64, &labels);
        if output_bytes > 0 {
            telemetry::record_histogram(tags::METRIC_CODEC_OUTPUT_BYTES, output_bytes, &labels);
        }

        profile::event(
            tags::PROFILE_CODEC,
            &[tags::TAG_CODEC, "deflate"],
            "compress",
            result_tag,
            elapsed_us,
            "raw deflate finished",
        );
    }

    result
}

/// Inflates one raw deflate stream into `output`.
pub fn decompress(input: &[u8], output: &mut [u8]) -> Result<usize> {
    let start = Instant::now();
    let result = deflate::reverse(input, output);

    if let Ok(produced) = result {
        let elapsed_us = duration_to_us(start.elapsed());
        let labels = [("subsystem", "codec"), ("op", "inflate"), ("result", "ok")];
        telemetry::increment_counter(tags::METRIC_CODEC_INFLATE_COUNT, 1, &labels);
        telemetry::record_histogram(tags::METRIC_CODEC_INFLATE_LATENCY_US, elapsed_us, &labels);
        telemetry::record_histogram(tags::METRIC_CODEC_INPUT_BYTES, input.len() as u64, &labels);
        telemetry::record_histogram(tags::METRIC_CODEC_OUTPUT_BYTES, produced as u64, &labels);

        profile::event(
            tags::PROFILE_CODEC,
            &[tags::TAG_CODEC, "inflate"],
            "decompress",
            "ok",
            elapsed_us,
            "raw inflate finished",
        );
    }

    result
}
