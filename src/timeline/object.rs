//! Time-stamped buffers and the object traits every buffer variant implements
//!
//! A [`Buffer`] pairs an immutable [`Timestamp`] with one [`Block`] of pool
//! storage. Buffer variants ([`RawBuffer`](super::RawBuffer),
//! [`FrameBuffer`](super::FrameBuffer), [`GenericBuffer`](super::GenericBuffer))
//! wrap a `Buffer` and interpret its bytes; they implement [`TimelineBuffer`],
//! which in turn gives them the object-safe [`TimelineObject`] view used for
//! type-erased access.

use crate::error::{Result, TimelineError};
use crate::pool::{Block, PoolId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sample time in floating-point milliseconds
///
/// Timestamps are totally ordered (`f64::total_cmp`) so they can key an
/// ordered map. `-0.0` is stored as `0.0` so both name the same entry.
/// Timelines only accept finite values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Timestamp(f64);

impl Timestamp {
    /// Create a timestamp from milliseconds
    pub fn from_millis(millis: f64) -> Self {
        // Adding positive zero turns -0.0 into 0.0 and leaves every other value as is
        Timestamp(millis + 0.0)
    }

    /// Current wall-clock time in milliseconds since the UNIX epoch
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        Timestamp(millis)
    }

    /// Value in milliseconds
    pub const fn as_millis(self) -> f64 {
        self.0
    }

    /// Whether the value is neither NaN nor infinite
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Absolute distance to another timestamp, in milliseconds
    pub fn distance(self, other: Timestamp) -> f64 {
        (self.0 - other.0).abs()
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Timestamp {
    fn from(millis: f64) -> Self {
        Timestamp::from_millis(millis)
    }
}

impl From<Timestamp> for f64 {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ms", self.0)
    }
}

/// Timestamp plus the pool block holding the payload
///
/// The block goes back to its pool when the buffer is dropped.
pub struct Buffer {
    timestamp: Timestamp,
    block: Block,
}

impl Buffer {
    pub(crate) fn new(timestamp: Timestamp, block: Block) -> Self {
        Buffer { timestamp, block }
    }

    /// Sample time of this buffer
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.block.len()
    }

    /// Pool the storage was allocated from
    pub fn pool_id(&self) -> PoolId {
        self.block.pool_id()
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.block.as_slice()
    }

    /// Mutable payload bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.block.as_mut_slice()
    }

    /// Copy the payload out of pool storage
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    /// Overwrite the whole payload
    ///
    /// # Errors
    ///
    /// [`TimelineError::SizeMismatch`] if `payload` is not exactly [`size`](Self::size) bytes.
    pub fn copy_from_slice(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() != self.size() {
            return Err(TimelineError::SizeMismatch {
                expected: self.size(),
                actual: payload.len(),
            });
        }
        self.as_bytes_mut().copy_from_slice(payload);
        Ok(())
    }

    /// Copy the bytes (not the storage) of `other` into this buffer
    ///
    /// The timestamp of `self` is left unchanged.
    ///
    /// # Errors
    ///
    /// [`TimelineError::SizeMismatch`] if both buffers differ in size.
    pub fn deep_copy(&mut self, other: &Buffer) -> Result<()> {
        self.copy_from_slice(other.as_bytes())
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("timestamp", &self.timestamp)
            .field("size", &self.size())
            .field("pool", &self.pool_id())
            .finish()
    }
}

/// A buffer variant a timeline can store
///
/// The layout describes everything that is shared by every buffer of one
/// timeline (payload size, frame geometry, slot count). It is fixed by
/// `init_pool_size` and handed back to the variant when wrapping a new block.
pub trait TimelineBuffer: Send + Sync + Sized + 'static {
    /// Per-timeline description of the payload
    type Layout: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Block size in bytes required by `layout`
    ///
    /// # Errors
    ///
    /// [`TimelineError::InvalidConfig`] when the layout cannot describe a
    /// non-empty payload.
    fn block_size(layout: &Self::Layout) -> Result<usize>;

    /// Wrap a freshly allocated, zeroed buffer
    fn from_buffer(buffer: Buffer, layout: &Self::Layout) -> Self;

    /// Underlying timestamp and storage
    fn buffer(&self) -> &Buffer;

    /// Copy the payload and per-buffer state of `other` into `self`
    ///
    /// # Errors
    ///
    /// [`TimelineError::SizeMismatch`] if the two buffers differ in layout.
    fn deep_copy(&mut self, other: &Self) -> Result<()>;
}

/// Object-safe view over any buffer stored in a timeline
pub trait TimelineObject: Any + Send + Sync {
    /// Sample time
    fn timestamp(&self) -> Timestamp;

    /// Raw payload
    fn as_bytes(&self) -> &[u8];

    /// Payload size in bytes
    fn size(&self) -> usize;

    /// Pool the storage came from
    fn pool_id(&self) -> PoolId;

    /// Concrete buffer type name
    fn type_name(&self) -> &'static str;

    /// Borrow as `Any` for type checks
    fn as_any(&self) -> &dyn Any;

    /// Convert into a shared `Any` for downcasting
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<B: TimelineBuffer> TimelineObject for B {
    fn timestamp(&self) -> Timestamp {
        self.buffer().timestamp()
    }

    fn as_bytes(&self) -> &[u8] {
        self.buffer().as_bytes()
    }

    fn size(&self) -> usize {
        self.buffer().size()
    }

    fn pool_id(&self) -> PoolId {
        self.buffer().pool_id()
    }

    fn type_name(&self) -> &'static str {
        type_name::<B>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Recover a typed buffer from a type-erased timeline object
///
/// # Errors
///
/// [`TimelineError::TypeMismatch`] if the object is not a `B`.
///
/// # Example
///
/// ```
/// use sight_timeline::timeline::{downcast, RawBuffer, RawLayout, RawTimeline, TimelineObject};
/// use std::sync::Arc;
///
/// let timeline = RawTimeline::new();
/// timeline.init_pool_size(RawLayout::new(8), 2)?;
/// timeline.push(timeline.create_buffer(1.0)?)?;
///
/// let object: Arc<dyn TimelineObject> = timeline.get_object(1.0).unwrap();
/// let raw: Arc<RawBuffer> = downcast(object)?;
/// assert_eq!(raw.as_bytes().len(), 8);
/// # Ok::<(), sight_timeline::TimelineError>(())
/// ```
pub fn downcast<B: TimelineBuffer>(object: Arc<dyn TimelineObject>) -> Result<Arc<B>> {
    let found = object.type_name();
    object
        .into_any()
        .downcast::<B>()
        .map_err(|_| TimelineError::TypeMismatch {
            expected: type_name::<B>(),
            found,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::BufferPool;

    #[test]
    fn test_timestamp_ordering() {
        let a = Timestamp::from_millis(10.0);
        let b = Timestamp::from(20.5);
        assert!(a < b);
        assert_eq!(a, Timestamp::from_millis(10.0));
        assert_eq!(a.distance(b), 10.5);
        assert!(!Timestamp::from_millis(f64::NAN).is_finite());
        assert!(Timestamp::now().as_millis() > 0.0);
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let negative = Timestamp::from_millis(-0.0);
        assert_eq!(negative, Timestamp::from_millis(0.0));
        assert_eq!(negative.cmp(&Timestamp::from(0.0)), Ordering::Equal);
        assert!(negative.as_millis().is_sign_positive());

        let parsed: Timestamp = serde_json::from_str("-0.0").unwrap();
        assert_eq!(parsed, Timestamp::from_millis(0.0));
    }

    #[test]
    fn test_buffer_deep_copy_copies_bytes() {
        let pool = BufferPool::new(4, 2).unwrap();
        let mut source = Buffer::new(Timestamp::from_millis(1.0), pool.allocate().unwrap());
        let mut target = Buffer::new(Timestamp::from_millis(2.0), pool.allocate().unwrap());

        source.copy_from_slice(&[1, 2, 3, 4]).unwrap();
        target.deep_copy(&source).unwrap();
        assert_eq!(target.as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(target.timestamp(), Timestamp::from_millis(2.0));

        source.as_bytes_mut()[0] = 99;
        assert_eq!(target.as_bytes()[0], 1);
    }

    #[test]
    fn test_buffer_deep_copy_size_mismatch() {
        let small = BufferPool::new(4, 1).unwrap();
        let large = BufferPool::new(8, 1).unwrap();
        let mut a = Buffer::new(Timestamp::from_millis(1.0), small.allocate().unwrap());
        let b = Buffer::new(Timestamp::from_millis(1.0), large.allocate().unwrap());

        assert_eq!(
            a.deep_copy(&b),
            Err(TimelineError::SizeMismatch {
                expected: 4,
                actual: 8
            })
        );
    }

    #[test]
    fn test_to_bytes_is_a_copy() {
        let pool = BufferPool::new(3, 1).unwrap();
        let mut buffer = Buffer::new(Timestamp::from_millis(0.0), pool.allocate().unwrap());
        buffer.copy_from_slice(b"abc").unwrap();
        let copy = buffer.to_bytes();
        drop(buffer);
        assert_eq!(&copy[..], b"abc");
        assert_eq!(pool.available(), 1);
    }
}
