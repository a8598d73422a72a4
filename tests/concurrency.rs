//! Concurrent producer/consumer tests
//!
//! Producers and consumers share a timeline through `Arc` on plain threads;
//! the async tests consume change notifications from a tokio runtime.

use sight_timeline::pool::BufferPool;
use sight_timeline::timeline::{
    Direction, RawLayout, RawTimeline, TimelineConfig, TimelineEvent, Timestamp,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio_test::assert_ok;

fn fill_for(ms: f64) -> u8 {
    (ms as u64 % 251) as u8
}

fn shared_timeline(size: usize, capacity: usize) -> Arc<RawTimeline> {
    reserved_timeline(size, capacity, 0)
}

fn reserved_timeline(size: usize, capacity: usize, reserve: usize) -> Arc<RawTimeline> {
    let config = TimelineConfig::default().with_reader_reserve(reserve);
    let timeline = Arc::new(RawTimeline::with_config(config));
    timeline.init_pool_size(RawLayout::new(size), capacity).unwrap();
    timeline
}

fn produce(timeline: &RawTimeline, count: u32) {
    for i in 0..count {
        let ms = i as f64;
        let mut buffer = timeline.create_buffer(ms).unwrap();
        buffer.as_bytes_mut().fill(fill_for(ms));
        timeline.push(buffer).unwrap();
    }
}

#[test]
fn test_readers_never_observe_torn_buffers() {
    // Three readers hold at most three buffers each
    let timeline = reserved_timeline(256, 32, 16);
    let done = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let timeline = Arc::clone(&timeline);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0usize;
                while !done.load(Ordering::Acquire) {
                    let Some(newest) = timeline.newest_timestamp() else {
                        continue;
                    };
                    let query = newest.as_millis() - 3.5;
                    for buffer in [
                        timeline.newest_object(),
                        timeline.get_closest_object(query, Direction::Both),
                        timeline.get_closest_object(query, Direction::Past),
                    ]
                    .into_iter()
                    .flatten()
                    {
                        let expected = fill_for(buffer.timestamp().as_millis());
                        assert!(buffer.as_bytes().iter().all(|&b| b == expected));
                        reads += 1;
                    }
                }
                reads
            })
        })
        .collect();

    for i in 0..5_000u32 {
        let ms = i as f64;
        let mut buffer = timeline.create_buffer(ms).unwrap();
        buffer.as_bytes_mut().fill(fill_for(ms));
        timeline.push(buffer).unwrap();
        assert_eq!(timeline.len(), (i as usize + 1).min(32));
    }
    done.store(true, Ordering::Release);

    for consumer in consumers {
        consumer.join().unwrap();
    }
    assert_eq!(timeline.len(), 32);
    assert_eq!(
        timeline.newest_timestamp(),
        Some(Timestamp::from_millis(4_999.0))
    );
}

#[test]
fn test_concurrent_producers_respect_capacity() {
    // One spare block per producer holding an un-pushed buffer
    let timeline = reserved_timeline(8, 16, 4);

    let producers: Vec<_> = (0..4u32)
        .map(|worker| {
            let timeline = Arc::clone(&timeline);
            thread::spawn(move || {
                for i in 0..500u32 {
                    let ms = (i * 4 + worker) as f64;
                    let mut buffer = timeline.create_buffer(ms).unwrap();
                    buffer.as_bytes_mut().fill(fill_for(ms));
                    timeline.push(buffer).unwrap();
                    assert!(timeline.len() <= 16);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    let objects = timeline.objects();
    assert_eq!(objects.len(), 16);
    assert!(objects
        .windows(2)
        .all(|pair| pair[0].timestamp() < pair[1].timestamp()));
    for buffer in objects {
        assert!(buffer
            .as_bytes()
            .iter()
            .all(|&b| b == fill_for(buffer.timestamp().as_millis())));
    }
    assert_eq!(timeline.stats().pushed, 2_000);
}

#[test]
fn test_cross_deep_copy_does_not_deadlock() {
    let a = shared_timeline(4, 8);
    let b = shared_timeline(4, 8);
    produce(&a, 8);
    produce(&b, 4);

    let handles: Vec<_> = (0..2)
        .map(|side| {
            let (target, source) = if side == 0 {
                (Arc::clone(&a), Arc::clone(&b))
            } else {
                (Arc::clone(&b), Arc::clone(&a))
            };
            thread::spawn(move || {
                for _ in 0..200 {
                    target.deep_copy(&source).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    for timeline in [&a, &b] {
        for buffer in timeline.objects() {
            assert!(buffer
                .as_bytes()
                .iter()
                .all(|&v| v == fill_for(buffer.timestamp().as_millis())));
        }
    }
}

#[test]
fn test_blocks_return_from_other_threads() {
    let pool = BufferPool::new(16, 8).unwrap();
    let blocks: Vec<_> = (0..8).map(|_| pool.allocate().unwrap()).collect();
    assert_eq!(pool.available(), 0);

    thread::spawn(move || drop(blocks)).join().unwrap();
    assert_eq!(pool.available(), 8);
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn test_subscriber_receives_pushes() {
    let timeline = shared_timeline(4, 8);
    let mut events = timeline.subscribe();

    let producer = {
        let timeline = Arc::clone(&timeline);
        tokio::task::spawn_blocking(move || produce(&timeline, 3))
    };
    assert_ok!(producer.await);

    for i in 0..3 {
        let event = assert_ok!(events.recv().await);
        assert_eq!(event, TimelineEvent::Pushed(Timestamp::from_millis(i as f64)));
    }

    timeline.clear_timeline();
    assert_eq!(assert_ok!(events.recv().await), TimelineEvent::Cleared);
}

#[tokio::test]
async fn test_consumer_reads_on_notification() {
    let timeline = shared_timeline(4, 8);
    let mut events = timeline.subscribe();

    let consumer = {
        let timeline = Arc::clone(&timeline);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while seen.len() < 5 {
                if let Ok(TimelineEvent::Pushed(timestamp)) = events.recv().await {
                    let buffer = timeline.get_object(timestamp).unwrap();
                    seen.push(buffer.as_bytes()[0]);
                }
            }
            seen
        })
    };

    produce(&timeline, 5);
    let seen = assert_ok!(consumer.await);
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}
