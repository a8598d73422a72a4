//! Thread-safe timeline shared between producers and consumers
//!
//! [`Timeline`] guards the container with a single read/write lock. Mutations
//! (`init_pool_size`, `create_buffer`, `push`, `pop_object`, `clear_timeline`)
//! take the write lock; lookups take the read lock and hand out `Arc`
//! references, so consumers read payloads after the lock is released. Storage
//! returns to the pool when the last reference to a buffer is dropped, on
//! whichever thread that happens.
//!
//! Every push, pop, clear and reset is announced on a broadcast channel (see
//! [`Timeline::subscribe`]). Consumers either poll it with `try_recv` from a
//! periodic tick or await it with `recv().await`.
//!
//! # Example
//!
//! ```
//! use sight_timeline::timeline::{Direction, RawLayout, RawTimeline, TimelineEvent};
//! use std::sync::Arc;
//!
//! let timeline = Arc::new(RawTimeline::new());
//! timeline.init_pool_size(RawLayout::new(16), 100)?;
//! let mut events = timeline.subscribe();
//!
//! let producer = {
//!     let timeline = Arc::clone(&timeline);
//!     std::thread::spawn(move || -> sight_timeline::Result<()> {
//!         for i in 0..10 {
//!             let mut buffer = timeline.create_buffer(i as f64 * 10.0)?;
//!             buffer.as_bytes_mut().fill(i);
//!             timeline.push(buffer)?;
//!         }
//!         Ok(())
//!     })
//! };
//! producer.join().unwrap()?;
//!
//! assert!(matches!(events.try_recv(), Ok(TimelineEvent::Pushed(_))));
//! let sample = timeline.get_closest_object(42.0, Direction::Past).unwrap();
//! assert_eq!(sample.as_bytes()[0], 4);
//! # Ok::<(), sight_timeline::TimelineError>(())
//! ```

use super::config::{TimelineConfig, TimelineStats};
use super::container::{Direction, PushOutcome, TimelineCore};
use super::object::{TimelineBuffer, TimelineObject, Timestamp};
use crate::error::{Result, TimelineError};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Change notification sent to subscribers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineEvent {
    /// A buffer was pushed (or replaced) at this timestamp
    Pushed(Timestamp),
    /// The buffer at this timestamp was removed with `pop_object`
    Removed(Timestamp),
    /// Every entry was removed by `clear_timeline`
    Cleared,
    /// The pool was re-initialized; previous layout and entries are gone
    Reset,
}

/// Time-ordered, capacity-bounded collection of buffers
pub struct Timeline<B: TimelineBuffer> {
    inner: RwLock<TimelineCore<B>>,
    events: broadcast::Sender<TimelineEvent>,
}

impl<B: TimelineBuffer> Timeline<B> {
    /// Create an uninitialized timeline with the default configuration
    pub fn new() -> Self {
        Self::with_config(TimelineConfig::default())
    }

    /// Create an uninitialized timeline with a custom configuration
    pub fn with_config(config: TimelineConfig) -> Self {
        let (events, _) = broadcast::channel(config.notify_capacity.max(1));
        Self {
            inner: RwLock::new(TimelineCore::new(config)),
            events,
        }
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: TimelineEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Current configuration
    pub fn config(&self) -> TimelineConfig {
        self.inner.read().config().clone()
    }

    /// Counters since the last pool initialization
    pub fn stats(&self) -> TimelineStats {
        self.inner.read().stats().clone()
    }

    /// (Re)create the pool for `capacity` buffers of `layout`
    ///
    /// Every existing entry is dropped first. Buffers created from the
    /// previous pool can no longer be pushed.
    ///
    /// # Errors
    ///
    /// [`TimelineError::InvalidConfig`] for an empty layout, zero capacity or
    /// an invalid [`TimelineConfig`]; the timeline is left untouched in that
    /// case.
    pub fn init_pool_size(&self, layout: B::Layout, capacity: usize) -> Result<()> {
        self.inner.write().init_pool_size(layout, capacity)?;
        self.notify(TimelineEvent::Reset);
        Ok(())
    }

    /// Re-initialize the pool with the current layout and a new capacity
    ///
    /// # Errors
    ///
    /// [`TimelineError::Uninitialized`] if no layout was set yet.
    pub fn set_maximum_size(&self, capacity: usize) -> Result<()> {
        {
            let mut inner = self.inner.write();
            let layout = inner.layout().cloned().ok_or(TimelineError::Uninitialized)?;
            inner.init_pool_size(layout, capacity)?;
        }
        self.notify(TimelineEvent::Reset);
        Ok(())
    }

    /// Whether `init_pool_size` has been called
    pub fn is_initialized(&self) -> bool {
        self.inner.read().layout().is_some()
    }

    /// Layout shared by every buffer
    pub fn layout(&self) -> Option<B::Layout> {
        self.inner.read().layout().cloned()
    }

    /// Maximum number of live entries (0 before initialization)
    pub fn capacity(&self) -> usize {
        self.inner.read().capacity()
    }

    /// Bytes reserved by the pool (0 before initialization)
    pub fn arena_bytes(&self) -> usize {
        self.inner
            .read()
            .pool()
            .map_or(0, |state| state.pool.arena_bytes())
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the timeline holds no entry
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocate a zeroed buffer at `timestamp`, not yet inserted
    ///
    /// Fill the payload, then hand it to [`push`](Self::push).
    ///
    /// # Errors
    ///
    /// - [`TimelineError::Uninitialized`] before `init_pool_size`
    /// - [`TimelineError::InvalidTimestamp`] for NaN or infinite timestamps
    /// - [`TimelineError::PoolExhausted`] when consumers hold every spare block
    ///   (see [`TimelineConfig::reader_reserve`])
    pub fn create_buffer(&self, timestamp: impl Into<Timestamp>) -> Result<B> {
        self.inner.write().create_buffer(timestamp.into())
    }

    /// Insert a buffer at its timestamp
    ///
    /// The oldest entry is evicted when the timeline is full. An existing
    /// entry at the same timestamp is replaced or the push is rejected,
    /// according to [`DuplicatePolicy`](super::DuplicatePolicy). A buffer
    /// older than the configured time window is dropped without a
    /// [`TimelineEvent::Pushed`].
    pub fn push(&self, buffer: B) -> Result<()> {
        let timestamp = buffer.timestamp();
        let outcome = self.inner.write().push(buffer)?;
        match outcome {
            PushOutcome::Expired => return Ok(()),
            PushOutcome::Replaced => {
                debug!(%timestamp, "Replaced buffer at existing timestamp");
            }
            PushOutcome::Inserted => {}
        }
        self.notify(TimelineEvent::Pushed(timestamp));
        Ok(())
    }

    /// Buffer stored at exactly `timestamp`
    pub fn get_object(&self, timestamp: impl Into<Timestamp>) -> Option<Arc<B>> {
        self.inner.read().get_object(timestamp.into())
    }

    /// Buffer closest to `timestamp` on the allowed side
    pub fn get_closest_object(
        &self,
        timestamp: impl Into<Timestamp>,
        direction: Direction,
    ) -> Option<Arc<B>> {
        self.inner
            .read()
            .get_closest_object(timestamp.into(), direction)
    }

    /// Most recent buffer
    pub fn newest_object(&self) -> Option<Arc<B>> {
        self.inner.read().newest_object()
    }

    /// Timestamp of the most recent buffer
    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        self.inner.read().newest_timestamp()
    }

    /// Timestamp of the oldest buffer
    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.inner.read().oldest_timestamp()
    }

    /// Every live buffer in timestamp order
    pub fn objects(&self) -> Vec<Arc<B>> {
        self.inner.read().objects()
    }

    /// Remove and return the buffer at exactly `timestamp`
    pub fn pop_object(&self, timestamp: impl Into<Timestamp>) -> Option<Arc<B>> {
        let timestamp = timestamp.into();
        let removed = self.inner.write().pop_object(timestamp);
        if removed.is_some() {
            self.notify(TimelineEvent::Removed(timestamp));
        }
        removed
    }

    /// Remove every entry, keeping the pool configuration
    pub fn clear_timeline(&self) {
        self.inner.write().clear();
        self.notify(TimelineEvent::Cleared);
    }

    /// Whether `object` could be stored in this timeline
    ///
    /// True when the object is a `B` with this timeline's block size.
    pub fn is_object_valid(&self, object: &dyn TimelineObject) -> bool {
        let inner = self.inner.read();
        match inner.pool() {
            Some(state) => {
                object.as_any().is::<B>() && object.size() == state.pool.element_size()
            }
            None => false,
        }
    }

    /// Make this timeline an independent copy of `other`
    ///
    /// Layout, capacity and configuration are taken from `other`; every entry
    /// is copied into freshly allocated storage. Copying an uninitialized
    /// timeline leaves `self` empty with its previous pool.
    pub fn deep_copy(&self, other: &Timeline<B>) -> Result<()> {
        if std::ptr::eq(self, other) {
            return Ok(());
        }
        let (source, config, sources) = {
            let other = other.inner.read();
            let source = other
                .pool()
                .map(|state| (state.layout.clone(), state.capacity));
            (source, other.config().clone(), other.objects())
        };

        match source {
            Some((layout, capacity)) => {
                self.inner
                    .write()
                    .fill_from(layout, capacity, config, &sources)?;
                self.notify(TimelineEvent::Reset);
            }
            None => self.clear_timeline(),
        }
        Ok(())
    }

    /// Independent copy of this timeline
    pub fn snapshot(&self) -> Result<Timeline<B>> {
        let copy = Timeline::with_config(self.config());
        copy.deep_copy(self)?;
        Ok(copy)
    }
}

impl<B: TimelineBuffer> Default for Timeline<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Timelines are equal when they share layout and capacity
impl<B: TimelineBuffer> PartialEq for Timeline<B> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let shape = |timeline: &Self| {
            let inner = timeline.inner.read();
            (inner.layout().cloned(), inner.capacity())
        };
        shape(self) == shape(other)
    }
}

impl<B: TimelineBuffer> fmt::Debug for Timeline<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Timeline")
            .field("buffer", &std::any::type_name::<B>())
            .field("layout", &inner.layout())
            .field("capacity", &inner.capacity())
            .field("len", &inner.len())
            .finish()
    }
}

/// Type-erased timeline access
///
/// Lets a consumer hold timelines of different buffer variants side by side
/// and recover typed buffers with [`downcast`](super::downcast).
pub trait DynTimeline: Send + Sync {
    /// Timestamp of the most recent buffer
    fn newest_timestamp(&self) -> Option<Timestamp>;

    /// Buffer stored at exactly `timestamp`
    fn object_at(&self, timestamp: Timestamp) -> Option<Arc<dyn TimelineObject>>;

    /// Buffer closest to `timestamp` on the allowed side
    fn closest_object_at(
        &self,
        timestamp: Timestamp,
        direction: Direction,
    ) -> Option<Arc<dyn TimelineObject>>;

    /// Whether `object` could be stored in this timeline
    fn accepts(&self, object: &dyn TimelineObject) -> bool;

    /// Number of live entries
    fn entry_count(&self) -> usize;

    /// Remove every entry
    fn clear(&self);

    /// Receive change notifications
    fn events(&self) -> broadcast::Receiver<TimelineEvent>;

    /// Borrow as `Any` to recover the concrete timeline
    fn as_any(&self) -> &dyn Any;
}

impl<B: TimelineBuffer> DynTimeline for Timeline<B> {
    fn newest_timestamp(&self) -> Option<Timestamp> {
        Timeline::newest_timestamp(self)
    }

    fn object_at(&self, timestamp: Timestamp) -> Option<Arc<dyn TimelineObject>> {
        self.get_object(timestamp)
            .map(|buffer| buffer as Arc<dyn TimelineObject>)
    }

    fn closest_object_at(
        &self,
        timestamp: Timestamp,
        direction: Direction,
    ) -> Option<Arc<dyn TimelineObject>> {
        self.get_closest_object(timestamp, direction)
            .map(|buffer| buffer as Arc<dyn TimelineObject>)
    }

    fn accepts(&self, object: &dyn TimelineObject) -> bool {
        self.is_object_valid(object)
    }

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn clear(&self) {
        self.clear_timeline();
    }

    fn events(&self) -> broadcast::Receiver<TimelineEvent> {
        self.subscribe()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
