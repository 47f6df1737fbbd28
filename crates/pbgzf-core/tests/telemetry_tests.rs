use std::time::{Duration, Instant};

use pbgzf_core::telemetry::profile;

#[test]
fn elapsed_us_reports_elapsed_time() {
    let started_at = Instant::now();
    std::thread::sleep(Duration::from_millis(1));
    assert!(profile::elapsed_us(started_at) >= 1_000);
}

#[cfg(feature = "telemetry")]
mod registry_tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use pbgzf_core::telemetry::{self, tags};
    use pbgzf_core::{
        Block, BoundedQueue, PipelineConfig, QueueOrdering, compress_stream, decompress_stream,
    };

    static TELEMETRY_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn counters_gauges_and_histograms_accumulate() {
        let _guard = TELEMETRY_MUTEX.lock().expect("telemetry lock poisoned");
        telemetry::reset();

        telemetry::increment_counter(tags::METRIC_QUEUE_PUSH_COUNT, 2, &[]);
        telemetry::increment_counter(tags::METRIC_QUEUE_PUSH_COUNT, 3, &[]);
        telemetry::set_gauge(tags::METRIC_QUEUE_DEPTH, 7, &[]);
        telemetry::add_gauge(tags::METRIC_WORKER_ACTIVE_COUNT, 1, &[]);
        telemetry::sub_gauge_saturating(tags::METRIC_WORKER_ACTIVE_COUNT, 5, &[]);
        telemetry::record_histogram(tags::METRIC_CODEC_INPUT_BYTES, 10, &[]);
        telemetry::record_histogram(tags::METRIC_CODEC_INPUT_BYTES, 30, &[]);

        let snapshot = telemetry::snapshot();
        assert_eq!(snapshot.counter(tags::METRIC_QUEUE_PUSH_COUNT), Some(5));
        assert_eq!(snapshot.gauge(tags::METRIC_QUEUE_DEPTH), Some(7));
        assert_eq!(snapshot.gauge(tags::METRIC_WORKER_ACTIVE_COUNT), Some(0));
        let histogram = snapshot
            .histogram(tags::METRIC_CODEC_INPUT_BYTES)
            .expect("histogram recorded");
        assert_eq!(histogram.count, 2);
        assert_eq!(histogram.min, 10);
        assert_eq!(histogram.max, 30);
        assert_eq!(histogram.mean, 20.0);

        telemetry::reset();
        assert_eq!(telemetry::snapshot(), telemetry::TelemetrySnapshot::default());
    }

    #[test]
    fn each_queue_reports_its_own_depth() {
        let _guard = TELEMETRY_MUTEX.lock().expect("telemetry lock poisoned");
        telemetry::reset();

        let input = BoundedQueue::new("input", 8, QueueOrdering::Unordered, 1, 1);
        let output = BoundedQueue::new("output", 8, QueueOrdering::Ordered, 1, 1);
        for id in 0..5u64 {
            input.push(Block::from_slice(id, b"in"), false).expect("input has room");
        }
        output.push(Block::from_slice(0, b"out"), false).expect("output has room");

        let input_labels = [("subsystem", "queue"), ("queue", "input")];
        let output_labels = [("queue", "output"), ("subsystem", "queue")];
        let snapshot = telemetry::snapshot();
        assert_eq!(snapshot.gauge_with(tags::METRIC_QUEUE_DEPTH, &input_labels), Some(5));
        assert_eq!(snapshot.gauge_with(tags::METRIC_QUEUE_DEPTH, &output_labels), Some(1));
        assert_eq!(snapshot.gauge(tags::METRIC_QUEUE_DEPTH), Some(6));
        assert_eq!(snapshot.counter_with(tags::METRIC_QUEUE_PUSH_COUNT, &input_labels), Some(5));

        input.pop(false).expect("input holds items");
        output.reset();
        let snapshot = telemetry::snapshot();
        assert_eq!(snapshot.gauge_with(tags::METRIC_QUEUE_DEPTH, &input_labels), Some(4));
        assert_eq!(snapshot.gauge_with(tags::METRIC_QUEUE_DEPTH, &output_labels), Some(0));
    }

    #[test]
    fn series_keys_ignore_label_order() {
        assert_eq!(
            telemetry::series_key("m", &[("b", "2"), ("a", "1")]),
            telemetry::series_key("m", &[("a", "1"), ("b", "2")]),
        );
        assert_eq!(telemetry::series_key("m", &[("a", "1")]), "m{a=1}");
        assert_eq!(telemetry::series_key("m", &[]), "m");
    }

    #[test]
    fn pipeline_run_reports_stage_counters() -> Result<(), Box<dyn std::error::Error>> {
        let _guard = TELEMETRY_MUTEX.lock().expect("telemetry lock poisoned");
        telemetry::reset();

        let config = PipelineConfig::default().with_workers(2).with_queue_capacity(4);
        let input = vec![b'q'; 200_000];
        let (compressed, _) = compress_stream(Cursor::new(input), Vec::new(), &config)?;
        decompress_stream(Cursor::new(compressed), Vec::new(), &config)?;

        let snapshot = telemetry::snapshot();
        let chunks = 200_000usize.div_ceil(0xff00) as u64;
        assert_eq!(snapshot.counter(tags::METRIC_CODEC_DEFLATE_COUNT), Some(chunks));
        // Decompression also inflates the end-of-file marker.
        assert_eq!(snapshot.counter(tags::METRIC_CODEC_INFLATE_COUNT), Some(chunks + 1));
        assert_eq!(
            snapshot.counter(tags::METRIC_READER_BLOCK_COUNT),
            Some(chunks + chunks + 1)
        );
        assert!(snapshot.counter(tags::METRIC_WRITER_BYTES).unwrap_or(0) > 200_000);
        assert!(snapshot.counter(tags::METRIC_QUEUE_PUSH_COUNT).unwrap_or(0) >= 4 * chunks);
        assert!(
            snapshot
                .histogram(tags::METRIC_WORKER_TASK_LATENCY_US)
                .is_some_and(|histogram| histogram.count == 2 * chunks + 1)
        );
        Ok(())
    }
}

#[cfg(feature = "profiling")]
mod profile_tag_tests {
    use std::sync::Mutex;

    use pbgzf_core::telemetry::{profile, tags};

    static PROFILE_TAG_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn enabled_tags_filter_tag_stacks() {
        let _guard = PROFILE_TAG_MUTEX.lock().expect("profile tag lock poisoned");

        profile::set_enabled_tags(&[tags::TAG_QUEUE, tags::TAG_CODEC]);
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM, tags::TAG_QUEUE]));
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_CODEC, "inflate"]));
        assert!(!profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM, tags::TAG_WRITER]));

        profile::enable_all_tags();
    }

    #[test]
    fn wildcard_and_empty_filters_enable_everything() {
        let _guard = PROFILE_TAG_MUTEX.lock().expect("profile tag lock poisoned");

        profile::set_enabled_tags(&["*"]);
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_POOL]));

        profile::set_enabled_tags(&[]);
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_READER]));

        profile::set_enabled_tags(&["SYSTEM"]);
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM, tags::TAG_WORKER]));

        profile::enable_all_tags();
    }
}

#[cfg(not(feature = "profiling"))]
mod profile_disabled_tests {
    use pbgzf_core::telemetry::{profile, tags};

    #[test]
    fn profile_api_is_noop_without_the_feature() {
        profile::set_enabled_tags(&[tags::TAG_QUEUE]);
        profile::enable_all_tags();

        assert!(!profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM]));
        profile::event(
            tags::PROFILE_QUEUE,
            &[tags::TAG_SYSTEM, tags::TAG_QUEUE],
            "noop",
            "ok",
            1,
            "profiling disabled",
        );
    }
}
