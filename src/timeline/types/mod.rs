//! Buffer variants
//!
//! Each variant interprets the bytes of a pool block:
//!
//! - [`RawBuffer`] - opaque payload of one fixed size
//! - [`FrameBuffer`] - image frames with width, height, pixel type and format
//! - [`GenericBuffer`] - fixed-count array of `Pod` elements with a presence mask
//! - [`MatrixBuffer`] - `GenericBuffer` of row-major 4x4 transforms

pub mod frame;
pub mod matrix;
pub mod raw;
pub mod slots;

pub use frame::{FrameBuffer, FrameLayout, PixelFormat, PixelType};
pub use matrix::{Matrix4, MatrixBuffer};
pub use raw::{RawBuffer, RawLayout};
pub use slots::{GenericBuffer, SlotLayout};
