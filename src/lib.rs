//! Time-indexed buffer pools for streaming sensor data
//!
//! This library provides bounded, time-ordered containers ("timelines") for
//! streaming time-stamped buffers between acquisition threads and consumer
//! threads: video frames from a grabber, tracking matrices from a navigation
//! system, or any fixed-size payload.
//!
//! # Features
//!
//! - **No per-frame allocation** - every buffer is carved from one arena allocated at pool initialization
//! - **Bounded memory** - a timeline never holds more than its capacity; the oldest entry is evicted first
//! - **Closest-match queries** - find the sample nearest a time, optionally restricted to the past or the future
//! - **Multi-reader access** - a read/write lock guards the container; payloads are shared via `Arc`
//! - **Typed payloads** - raw bytes, image frames, and arrays of 4x4 matrices with per-sample presence
//! - **Change notification** - producers' pushes are broadcast to subscribed consumers
//!
//! # Quick Start
//!
//! **Producer:**
//! ```
//! use sight_timeline::timeline::{FrameTimeline, PixelFormat, PixelType, Timestamp};
//!
//! let timeline = FrameTimeline::new();
//! timeline.init_frame_pool(320, 240, PixelType::Uint8, PixelFormat::GrayScale, 30)?;
//!
//! let mut buffer = timeline.create_buffer(Timestamp::now())?;
//! buffer.frame_mut(0)?.fill(255);
//! timeline.push(buffer)?;
//! # Ok::<(), sight_timeline::TimelineError>(())
//! ```
//!
//! **Consumer:**
//! ```
//! use sight_timeline::timeline::{Direction, Matrix4, MatrixTimeline, SlotLayout};
//!
//! let timeline = MatrixTimeline::new();
//! timeline.init_pool_size(SlotLayout::of::<Matrix4>(4), 100)?;
//! # let mut sample = timeline.create_buffer(10.0)?;
//! # sample.set_element(sight_timeline::timeline::matrix::IDENTITY, 1)?;
//! # timeline.push(sample)?;
//!
//! if let Some(sample) = timeline.get_closest_object(12.5, Direction::Past) {
//!     for (tool, matrix) in sample.presence_iter() {
//!         println!("tool {tool}: translation x = {}", matrix[3]);
//!     }
//! }
//! # Ok::<(), sight_timeline::TimelineError>(())
//! ```
//!
//! # Architecture
//!
//! - **`pool`** - [`pool::BufferPool`], the fixed-size block allocator
//! - **`timeline`** - timestamps, buffer variants, and the [`timeline::Timeline`] container
//!   - `object` - [`timeline::Timestamp`], [`timeline::Buffer`], object traits
//!   - `types` - raw, frame, generic slot and matrix buffers
//!   - `container` - ordering, eviction, closest-match lookups
//!   - `sync` - the lock-guarded timeline and its notifications
//! - **`error`** - [`TimelineError`] and the [`Result`] alias
//!
//! # Memory model
//!
//! `init_pool_size(layout, capacity)` allocates
//! `block_size * (capacity + reader_reserve)` bytes once. `create_buffer`
//! takes a free block, `push` inserts it, and the block returns to the pool
//! when the last `Arc` to the buffer is dropped. The timeline never holds more
//! than `capacity` entries; the reserve covers buffers consumers keep after
//! they were evicted. Consumers holding more than that throttle the producer
//! with [`TimelineError::PoolExhausted`] instead of growing memory.
//!
//! # Error Handling
//!
//! All fallible operations return `Result<T, TimelineError>`. Configuration
//! and type errors are reported synchronously; query misses are `None`;
//! a full timeline is handled by eviction, not by an error.
//!
//! ```
//! use sight_timeline::timeline::{RawLayout, RawTimeline};
//! use sight_timeline::TimelineError;
//!
//! let timeline = RawTimeline::new();
//! match timeline.init_pool_size(RawLayout::new(0), 10) {
//!     Err(TimelineError::InvalidConfig(reason)) => eprintln!("bad pool: {reason}"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

pub mod error;
pub mod pool;
pub mod timeline;

// Re-export commonly used types
pub use error::{Result, TimelineError};
pub use timeline::{Direction, Timeline, TimelineEvent, Timestamp};
