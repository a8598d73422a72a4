//! Video frame buffers
//!
//! A frame timeline stores images of one fixed geometry: every buffer shares
//! the width, height, pixel type and pixel format fixed by `init_pool_size`.
//! A buffer may hold several frames (e.g. the views of a stereo camera); the
//! common case is a single frame in slot 0.
//!
//! # Example
//!
//! ```
//! use sight_timeline::timeline::{FrameLayout, FrameTimeline, PixelFormat, PixelType};
//!
//! let timeline = FrameTimeline::new();
//! timeline.init_pool_size(FrameLayout::new(640, 480, PixelType::Uint8, PixelFormat::Rgb), 10)?;
//!
//! let mut frame = timeline.create_buffer(33.0)?;
//! frame.frame_mut(0)?.fill(128);
//! timeline.push(frame)?;
//!
//! let latest = timeline.newest_object().unwrap();
//! assert_eq!(latest.frame(0).unwrap().len(), 640 * 480 * 3);
//! # Ok::<(), sight_timeline::TimelineError>(())
//! ```

use super::slots::{SlotLayout, Slots};
use crate::error::{Result, TimelineError};
use crate::timeline::object::{Buffer, TimelineBuffer, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type of one pixel component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl PixelType {
    /// Get size in bytes
    pub fn size(&self) -> usize {
        match self {
            PixelType::Int8 | PixelType::Uint8 => 1,
            PixelType::Int16 | PixelType::Uint16 => 2,
            PixelType::Int32 | PixelType::Uint32 | PixelType::Float32 => 4,
            PixelType::Int64 | PixelType::Uint64 | PixelType::Float64 => 8,
        }
    }
}

/// Channel layout of a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    GrayScale,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

impl PixelFormat {
    /// Number of components per pixel
    pub fn num_components(&self) -> usize {
        match self {
            PixelFormat::GrayScale => 1,
            PixelFormat::Rgb | PixelFormat::Bgr => 3,
            PixelFormat::Rgba | PixelFormat::Bgra => 4,
        }
    }
}

/// Geometry shared by every frame of a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    /// Columns
    pub width: usize,
    /// Rows
    pub height: usize,
    /// Component scalar type
    pub pixel_type: PixelType,
    /// Component layout
    pub pixel_format: PixelFormat,
    /// Frames per buffer
    #[serde(default = "default_frame_slots")]
    pub slot_count: usize,
}

fn default_frame_slots() -> usize {
    1
}

impl FrameLayout {
    /// Single-frame layout
    pub fn new(width: usize, height: usize, pixel_type: PixelType, pixel_format: PixelFormat) -> Self {
        FrameLayout {
            width,
            height,
            pixel_type,
            pixel_format,
            slot_count: 1,
        }
    }

    /// Store `slot_count` frames per buffer
    pub fn with_slots(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    /// Number of components per pixel
    pub fn num_components(&self) -> usize {
        self.pixel_format.num_components()
    }

    /// Bytes of one frame
    pub fn frame_size(&self) -> Result<usize> {
        self.width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.num_components()))
            .and_then(|n| n.checked_mul(self.pixel_type.size()))
            .ok_or_else(|| {
                TimelineError::InvalidConfig(format!(
                    "frame of {}x{} overflows",
                    self.width, self.height
                ))
            })
    }

    fn slot_layout(&self) -> Result<SlotLayout> {
        Ok(SlotLayout::new(self.frame_size()?, self.slot_count))
    }
}

/// One or more frames captured at the same timestamp
pub struct FrameBuffer {
    slots: Slots,
    layout: FrameLayout,
}

impl FrameBuffer {
    /// Sample time
    pub fn timestamp(&self) -> Timestamp {
        self.slots.buffer().timestamp()
    }

    /// Frame geometry
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.layout.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.layout.height
    }

    /// Scalar type of each component
    pub fn pixel_type(&self) -> PixelType {
        self.layout.pixel_type
    }

    /// Component layout of each pixel
    pub fn pixel_format(&self) -> PixelFormat {
        self.layout.pixel_format
    }

    /// Number of components per pixel
    pub fn num_components(&self) -> usize {
        self.layout.num_components()
    }

    /// Bytes of one frame
    pub fn frame_size(&self) -> usize {
        self.slots.layout().element_size
    }

    /// Number of frame slots
    pub fn slot_count(&self) -> usize {
        self.slots.layout().slot_count
    }

    /// Whether frame `index` was written
    pub fn is_present(&self, index: usize) -> bool {
        self.slots.is_present(index)
    }

    /// Presence bit mask
    pub fn mask(&self) -> u64 {
        self.slots.mask()
    }

    /// Number of frames written
    pub fn present_count(&self) -> u32 {
        self.slots.present_count()
    }

    /// Pixels of frame `index`; zeros when the frame was never written,
    /// `None` past the slot count
    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        self.slots.element(index)
    }

    /// Writable pixels of frame `index`, marking it present
    pub fn frame_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        self.slots.element_mut(index)
    }

    /// Copy a whole frame into slot `index`
    ///
    /// # Errors
    ///
    /// [`TimelineError::SizeMismatch`] if `pixels` is not exactly one frame.
    pub fn set_frame(&mut self, index: usize, pixels: &[u8]) -> Result<()> {
        let expected = self.frame_size();
        if pixels.len() != expected {
            return Err(TimelineError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        self.frame_mut(index)?.copy_from_slice(pixels);
        Ok(())
    }
}

impl TimelineBuffer for FrameBuffer {
    type Layout = FrameLayout;

    fn block_size(layout: &FrameLayout) -> Result<usize> {
        layout.slot_layout()?.block_size()
    }

    fn from_buffer(buffer: Buffer, layout: &FrameLayout) -> Self {
        let slots = SlotLayout::new(buffer.size() / layout.slot_count.max(1), layout.slot_count);
        FrameBuffer {
            slots: Slots::new(buffer, slots),
            layout: *layout,
        }
    }

    fn buffer(&self) -> &Buffer {
        self.slots.buffer()
    }

    fn deep_copy(&mut self, other: &Self) -> Result<()> {
        if self.layout != other.layout {
            return Err(TimelineError::SizeMismatch {
                expected: self.slots.buffer().size(),
                actual: other.slots.buffer().size(),
            });
        }
        self.slots.deep_copy(&other.slots)
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("timestamp", &self.timestamp())
            .field("layout", &self.layout)
            .field("mask", &self.mask())
            .finish()
    }
}
