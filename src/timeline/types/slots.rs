//! Fixed-count element arrays with a presence mask
//!
//! A slot buffer splits its payload into `slot_count` equally sized elements.
//! One sample rarely fills every slot (a tracker may lose sight of a marker),
//! so each buffer carries a 64-bit mask of the slots written for its
//! timestamp. Storage is zeroed when the buffer is created, which makes an
//! absent slot read as zeros instead of stale data from a recycled block.

use crate::error::{Result, TimelineError};
use crate::timeline::object::{Buffer, TimelineBuffer, Timestamp};
use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;

/// Element size and number of slots of every buffer in a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    /// Bytes per element
    pub element_size: usize,
    /// Elements per buffer (1..=64)
    pub slot_count: usize,
}

impl SlotLayout {
    /// Largest slot count the presence mask can track
    pub const MAX_SLOTS: usize = 64;

    /// Layout of `slot_count` elements of `element_size` bytes
    pub fn new(element_size: usize, slot_count: usize) -> Self {
        SlotLayout {
            element_size,
            slot_count,
        }
    }

    /// Layout of `slot_count` elements of type `T`
    pub fn of<T: Pod>(slot_count: usize) -> Self {
        Self::new(size_of::<T>(), slot_count)
    }

    /// Total payload size, validating the layout
    pub fn block_size(&self) -> Result<usize> {
        if self.slot_count == 0 || self.slot_count > Self::MAX_SLOTS {
            return Err(TimelineError::InvalidConfig(format!(
                "slot count must be in 1..={}, got {}",
                Self::MAX_SLOTS,
                self.slot_count
            )));
        }
        if self.element_size == 0 {
            return Err(TimelineError::InvalidConfig(
                "element size must be at least 1 byte".to_string(),
            ));
        }
        self.element_size
            .checked_mul(self.slot_count)
            .ok_or_else(|| TimelineError::InvalidConfig("slot layout overflows".to_string()))
    }
}

/// Byte-level slot storage shared by the typed slot buffers
pub(crate) struct Slots {
    buffer: Buffer,
    layout: SlotLayout,
    mask: u64,
}

impl Slots {
    pub(crate) fn new(buffer: Buffer, layout: SlotLayout) -> Self {
        Slots {
            buffer,
            layout,
            mask: 0,
        }
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub(crate) fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub(crate) fn mask(&self) -> u64 {
        self.mask
    }

    pub(crate) fn present_count(&self) -> u32 {
        self.mask.count_ones()
    }

    pub(crate) fn is_present(&self, index: usize) -> bool {
        index < self.layout.slot_count && self.mask & (1u64 << index) != 0
    }

    fn range(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.layout.element_size;
        start..start + self.layout.element_size
    }

    /// Slot bytes whether present or not; `None` past the slot count
    pub(crate) fn element(&self, index: usize) -> Option<&[u8]> {
        if index >= self.layout.slot_count {
            return None;
        }
        let range = self.range(index);
        Some(&self.buffer.as_bytes()[range])
    }

    /// Writable slot bytes; marks the slot present
    pub(crate) fn element_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        if index >= self.layout.slot_count {
            return Err(TimelineError::SlotOutOfRange {
                index,
                slot_count: self.layout.slot_count,
            });
        }
        self.mask |= 1u64 << index;
        let range = self.range(index);
        Ok(&mut self.buffer.as_bytes_mut()[range])
    }

    pub(crate) fn present_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.layout.slot_count).filter(move |&i| self.is_present(i))
    }

    pub(crate) fn deep_copy(&mut self, other: &Slots) -> Result<()> {
        if self.layout != other.layout {
            return Err(TimelineError::SizeMismatch {
                expected: self.buffer.size(),
                actual: other.buffer.size(),
            });
        }
        self.buffer.deep_copy(&other.buffer)?;
        self.mask = other.mask;
        Ok(())
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots")
            .field("timestamp", &self.buffer.timestamp())
            .field("layout", &self.layout)
            .field("mask", &format_args!("{:#b}", self.mask))
            .finish()
    }
}

/// Array of `T` elements with per-sample presence
///
/// Elements are copied in and out by value, so the pool block needs no
/// particular alignment.
pub struct GenericBuffer<T> {
    slots: Slots,
    _element: PhantomData<fn() -> T>,
}

impl<T: Pod> GenericBuffer<T> {
    /// Sample time
    pub fn timestamp(&self) -> Timestamp {
        self.slots.buffer().timestamp()
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.slots.layout().slot_count
    }

    /// Size of one element in bytes
    pub fn element_size(&self) -> usize {
        size_of::<T>()
    }

    /// Bit `i` is set when slot `i` was written for this sample
    pub fn mask(&self) -> u64 {
        self.slots.mask()
    }

    /// Number of slots written for this sample
    pub fn present_count(&self) -> u32 {
        self.slots.present_count()
    }

    /// Whether slot `index` was written; false past the slot count
    pub fn is_present(&self, index: usize) -> bool {
        self.slots.is_present(index)
    }

    /// Element in slot `index`
    ///
    /// Absent and out-of-range slots read as zeros rather than failing, so a
    /// render loop that skips [`is_present`](Self::is_present) never crashes.
    /// Use [`try_get_element`](Self::try_get_element) for strict access.
    pub fn get_element(&self, index: usize) -> T {
        self.slots
            .element(index)
            .map(bytemuck::pod_read_unaligned)
            .unwrap_or_else(T::zeroed)
    }

    /// Element in slot `index`, or `None` when the slot is absent
    pub fn try_get_element(&self, index: usize) -> Option<T> {
        if !self.is_present(index) {
            return None;
        }
        self.slots.element(index).map(bytemuck::pod_read_unaligned)
    }

    /// Write `value` into slot `index` and mark it present
    pub fn set_element(&mut self, value: T, index: usize) -> Result<()> {
        self.slots
            .element_mut(index)?
            .copy_from_slice(bytemuck::bytes_of(&value));
        Ok(())
    }

    /// Mark slot `index` present and return its bytes for in-place filling
    pub fn add_element(&mut self, index: usize) -> Result<&mut [u8]> {
        self.slots.element_mut(index)
    }

    /// Present elements with their slot index, in slot order
    pub fn presence_iter(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.slots
            .present_indices()
            .map(move |index| (index, self.get_element(index)))
    }
}

impl<T: Pod> TimelineBuffer for GenericBuffer<T> {
    type Layout = SlotLayout;

    fn block_size(layout: &SlotLayout) -> Result<usize> {
        if layout.element_size != size_of::<T>() {
            return Err(TimelineError::SizeMismatch {
                expected: size_of::<T>(),
                actual: layout.element_size,
            });
        }
        layout.block_size()
    }

    fn from_buffer(buffer: Buffer, layout: &SlotLayout) -> Self {
        GenericBuffer {
            slots: Slots::new(buffer, *layout),
            _element: PhantomData,
        }
    }

    fn buffer(&self) -> &Buffer {
        self.slots.buffer()
    }

    fn deep_copy(&mut self, other: &Self) -> Result<()> {
        self.slots.deep_copy(&other.slots)
    }
}

impl<T> fmt::Debug for GenericBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericBuffer")
            .field("element", &std::any::type_name::<T>())
            .field("slots", &self.slots)
            .finish()
    }
}
