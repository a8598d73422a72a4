//! Frame grabber and tracker streaming into timelines
//!
//! A grabber thread pushes video frames and a tracker thread pushes tool
//! poses; the main thread resamples both at a fixed rate with closest-match
//! lookups, the way a synchronizer aligns several sources.
//!
//! # Running
//!
//! ```bash
//! # Default (info) logging
//! cargo run --example frame_streaming
//!
//! # Per-push trace logs from the container
//! RUST_LOG=sight_timeline=trace cargo run --example frame_streaming
//! ```

use bytemuck::{Pod, Zeroable};
use sight_timeline::timeline::{
    matrix, Direction, FrameTimeline, GenericTimeline, Matrix4, MatrixTimeline, PixelFormat,
    PixelType, SlotLayout, TimelineConfig, Timestamp,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const WIDTH: usize = 320;
const HEIGHT: usize = 240;
const TOOLS: usize = 3;

/// Tracker quality per tool, stored next to the poses
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ToolQuality {
    error_mm: f32,
    visible_markers: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_ids(true)
        .init();

    // The consumer keeps at most one frame between ticks
    let frames = Arc::new(FrameTimeline::with_config(
        TimelineConfig::default().with_reader_reserve(2),
    ));
    frames.init_frame_pool(WIDTH, HEIGHT, PixelType::Uint8, PixelFormat::GrayScale, 30)?;

    let poses = Arc::new(MatrixTimeline::new());
    poses.init_pool_size(SlotLayout::of::<Matrix4>(TOOLS), 200)?;

    let quality = Arc::new(GenericTimeline::<ToolQuality>::new());
    quality.init_pool_size(SlotLayout::of::<ToolQuality>(TOOLS), 200)?;

    let running = Arc::new(AtomicBool::new(true));

    let grabber = {
        let frames = Arc::clone(&frames);
        let running = Arc::clone(&running);
        thread::spawn(move || -> sight_timeline::Result<u64> {
            let mut count = 0u64;
            while running.load(Ordering::Relaxed) {
                let mut buffer = frames.create_buffer(Timestamp::now())?;
                buffer.frame_mut(0)?.fill((count % 256) as u8);
                frames.push(buffer)?;
                count += 1;
                thread::sleep(Duration::from_millis(33));
            }
            Ok(count)
        })
    };

    let tracker = {
        let poses = Arc::clone(&poses);
        let quality = Arc::clone(&quality);
        let running = Arc::clone(&running);
        thread::spawn(move || -> sight_timeline::Result<u64> {
            let mut count = 0u64;
            while running.load(Ordering::Relaxed) {
                let now = Timestamp::now();
                let mut sample = poses.create_buffer(now)?;
                let mut scores = quality.create_buffer(now)?;
                // Tool 1 drops out every tenth sample
                for tool in 0..TOOLS {
                    if tool == 1 && count % 10 == 0 {
                        continue;
                    }
                    let x = count as f32 * 0.1 + tool as f32;
                    sample.set_element(matrix::translation(x, 0.0, 0.0), tool)?;
                    scores.set_element(
                        ToolQuality {
                            error_mm: 0.2 * tool as f32,
                            visible_markers: 4,
                        },
                        tool,
                    )?;
                }
                poses.push(sample)?;
                quality.push(scores)?;
                count += 1;
                thread::sleep(Duration::from_millis(10));
            }
            Ok(count)
        })
    };

    let mut frame_events = frames.subscribe();
    for tick in 0..20 {
        thread::sleep(Duration::from_millis(50));
        let pending = std::iter::from_fn(|| frame_events.try_recv().ok()).count();

        let Some(frame) = frames.newest_object() else {
            warn!(tick, "No frame yet");
            continue;
        };
        let Some(pose) = poses.get_closest_object(frame.timestamp(), Direction::Both) else {
            warn!(tick, "No tracking sample yet");
            continue;
        };

        let lag = frame.timestamp().distance(pose.timestamp());
        let tracked: Vec<usize> = pose.presence_iter().map(|(tool, _)| tool).collect();
        let tool_x = pose.matrix_rows(0).map(|rows| rows[0][3]);
        let error = quality
            .get_object(pose.timestamp())
            .and_then(|scores| scores.try_get_element(0))
            .map(|q| q.error_mm);

        info!(
            tick,
            pending,
            frame = %frame.timestamp(),
            pixel = frame.frame(0).map(|p| p[0]),
            lag_ms = lag,
            ?tracked,
            ?tool_x,
            ?error,
            "Synchronized sample"
        );
    }

    running.store(false, Ordering::Relaxed);
    let grabbed = grabber.join().map_err(|_| "grabber thread panicked")??;
    let tracked = tracker.join().map_err(|_| "tracker thread panicked")??;

    info!(
        grabbed,
        tracked,
        frames = ?frames.stats(),
        poses = ?poses.stats(),
        "Streaming finished"
    );
    Ok(())
}
