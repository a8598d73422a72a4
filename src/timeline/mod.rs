//! Time-indexed buffer timelines
//!
//! - [`object`] - timestamps, the pool-backed [`Buffer`] base and the object traits
//! - [`types`] - raw, frame, generic slot and matrix buffer variants
//! - [`container`] - ordering, eviction and closest-match lookups
//! - [`sync`] - the lock-guarded [`Timeline`] shared across threads
//! - [`config`] - behavior configuration and counters

pub mod config;
pub mod container;
pub mod object;
pub mod sync;
pub mod types;

pub use config::{DuplicatePolicy, TimelineConfig, TimelineStats};
pub use container::Direction;
pub use object::{downcast, Buffer, TimelineBuffer, TimelineObject, Timestamp};
pub use sync::{DynTimeline, Timeline, TimelineEvent};
pub use types::matrix;
pub use types::{
    FrameBuffer, FrameLayout, GenericBuffer, Matrix4, MatrixBuffer, PixelFormat, PixelType,
    RawBuffer, RawLayout, SlotLayout,
};

/// Timeline of opaque fixed-size payloads
pub type RawTimeline = Timeline<RawBuffer>;

/// Timeline of video frames
pub type FrameTimeline = Timeline<FrameBuffer>;

/// Timeline of `Pod` element arrays
pub type GenericTimeline<T> = Timeline<GenericBuffer<T>>;

/// Timeline of tracking matrix arrays
pub type MatrixTimeline = Timeline<MatrixBuffer>;

impl FrameTimeline {
    /// Initialize a single-frame pool from frame geometry
    pub fn init_frame_pool(
        &self,
        width: usize,
        height: usize,
        pixel_type: PixelType,
        pixel_format: PixelFormat,
        capacity: usize,
    ) -> crate::Result<()> {
        self.init_pool_size(
            FrameLayout::new(width, height, pixel_type, pixel_format),
            capacity,
        )
    }
}
