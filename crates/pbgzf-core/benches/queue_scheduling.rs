use std::sync::Arc;
use std::thread;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use pbgzf_core::{Block, BoundedQueue, QueueOrdering};

const ITEMS: u64 = 20_000;

fn simulate_work(seed: u64) -> u64 {
    let mut acc = 0x9E37_79B9_7F4A_7C15u64 ^ seed;
    for i in 0..((seed % 8 + 1) * 64) {
        acc = acc
            .wrapping_mul(6364136223846793005)
            .wrapping_add(i + 1442695040888963407);
    }
    acc
}

// One producer, `workers` transformers, one in-order consumer: the shape of
// a pipeline run without any codec cost.
fn run_pipeline_shape(workers: usize, capacity: usize) -> u64 {
    let input = Arc::new(BoundedQueue::new(
        "input",
        capacity,
        QueueOrdering::Unordered,
        1,
        workers,
    ));
    let output = Arc::new(BoundedQueue::new(
        "output",
        capacity,
        QueueOrdering::Ordered,
        workers,
        1,
    ));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let input = Arc::clone(&input);
            let output = Arc::clone(&output);
            thread::spawn(move || {
                while let Some(mut block) = input.pop(true) {
                    let digest = simulate_work(block.id());
                    block.as_mut_vec().clear();
                    block.as_mut_vec().extend_from_slice(&digest.to_le_bytes());
                    if output.push(block, true).is_err() {
                        break;
                    }
                }
                output.producer_done();
                input.consumer_done();
            })
        })
        .collect();

    let consumer = {
        let output = Arc::clone(&output);
        thread::spawn(move || {
            let mut expected = 0u64;
            let mut checksum = 0u64;
            while let Some(block) = output.pop(true) {
                assert_eq!(block.id(), expected);
                expected += 1;
                checksum ^= u64::from_le_bytes(block.as_slice().try_into().unwrap_or([0; 8]));
            }
            output.consumer_done();
            checksum
        })
    };

    for id in 0..ITEMS {
        if input.push(Block::from_slice(id, &[]), true).is_err() {
            break;
        }
    }
    input.producer_done();

    for handle in handles {
        handle.join().expect("worker panicked");
    }
    consumer.join().expect("consumer panicked")
}

fn bench_queue_scheduling(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_scheduling");
    group.sample_size(10);
    group.throughput(Throughput::Elements(ITEMS));

    for (workers, capacity) in [(1usize, 64usize), (4, 16), (4, 1000), (8, 1000)] {
        group.bench_function(format!("workers_{workers}_capacity_{capacity}"), |b| {
            b.iter(|| black_box(run_pipeline_shape(workers, capacity)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_queue_scheduling);
criterion_main!(benches);
