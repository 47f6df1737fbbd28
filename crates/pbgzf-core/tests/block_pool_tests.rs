use std::sync::Arc;
use std::thread;

use pbgzf_core::{Block, BlockPool};

#[test]
fn acquire_recycle_cycle_reuses_buffers() {
    let pool = BlockPool::new(64, 2);
    assert_eq!(pool.block_capacity(), 64);
    assert_eq!(pool.max_blocks(), 2);

    {
        let mut block = pool.acquire();
        block.as_mut_vec().extend_from_slice(b"hello");
        block.set_id(9);
        assert_eq!(block.len(), 5);
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.created, 1);
    assert_eq!(metrics.recycled, 0);
    assert_eq!(metrics.spare, 1);

    let block = pool.acquire();
    assert!(block.is_empty());
    assert_eq!(block.id(), 0);
    assert_eq!(block.cursor(), 0);
    assert!(block.as_slice().is_empty());

    let metrics = pool.metrics();
    assert_eq!(metrics.created, 1);
    assert_eq!(metrics.recycled, 1);
    assert_eq!(metrics.spare, 0);
}

#[test]
fn full_pool_frees_extra_buffers() {
    let pool = BlockPool::new(32, 1);

    let first = pool.acquire();
    let second = pool.acquire();
    drop(first);
    drop(second);

    let metrics = pool.metrics();
    assert_eq!(metrics.created, 2);
    assert_eq!(metrics.dropped, 1);
    assert_eq!(metrics.spare, 1);
    assert_eq!(metrics.live(), 1);
}

#[test]
fn detached_blocks_never_touch_the_pool() {
    let pool = BlockPool::new(16, 4);
    drop(Block::from_slice(3, b"detached"));
    drop(Block::detached(16));

    assert_eq!(pool.metrics().spare, 0);
    assert_eq!(pool.metrics().created, 0);
}

#[test]
fn block_cursor_tracks_partial_consumption() {
    let mut block = Block::from_slice(0, b"abcdefgh");
    let mut out = [0u8; 3];

    assert_eq!(block.consume_into(&mut out), 3);
    assert_eq!(&out, b"abc");
    assert_eq!(block.cursor(), 3);
    assert_eq!(block.remaining(), b"defgh");

    block.set_cursor(100);
    assert_eq!(block.cursor(), block.len());
    assert_eq!(block.consume_into(&mut out), 0);
}

#[test]
fn fill_from_stops_at_limit() {
    let mut block = Block::detached(8);
    assert_eq!(block.fill_from(b"0123456789", 4), 4);
    assert_eq!(block.fill_from(b"abcdef", 6), 2);
    assert_eq!(block.as_slice(), b"0123ab");
    assert_eq!(block.fill_from(b"xyz", 6), 0);
}

#[test]
fn swap_payload_keeps_metadata() {
    let mut block = Block::from_slice(5, b"compressed");
    block.set_source_offset(1234);
    block.set_source_len(10);
    block.set_cursor(4);

    let mut scratch = b"plain".to_vec();
    block.swap_payload(&mut scratch);

    assert_eq!(block.as_slice(), b"plain");
    assert_eq!(scratch, b"compressed");
    assert_eq!(block.id(), 5);
    assert_eq!(block.source_offset(), 1234);
    assert_eq!(block.source_len(), 10);
    assert_eq!(block.cursor(), 0);
}

#[test]
fn concurrent_acquire_and_release() -> Result<(), Box<dyn std::error::Error>> {
    let pool = Arc::new(BlockPool::new(128, 8));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for round in 0..100u8 {
                    let mut block = pool.acquire();
                    block.as_mut_vec().extend_from_slice(&[worker as u8, round]);
                    assert_eq!(block.len(), 2);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().map_err(|_| "pool worker panicked")?;
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.created + metrics.recycled, 400);
    assert!(metrics.spare <= 8);
    assert!(metrics.created <= 8 + metrics.dropped);
    Ok(())
}
