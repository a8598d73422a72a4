//! Ordered, capacity-bounded storage behind a [`Timeline`](super::Timeline)
//!
//! `TimelineCore` is the unsynchronized container: an ordered map from
//! timestamp to shared buffer, plus the pool that backs those buffers. The
//! public `Timeline` wraps it in a read/write lock.

use super::config::{DuplicatePolicy, TimelineConfig, TimelineStats};
use super::object::{Buffer, TimelineBuffer, TimelineObject, Timestamp};
use crate::error::{Result, TimelineError};
use crate::pool::BufferPool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Which side of the query time a closest-match lookup may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Entries at or before the query time
    Past,
    /// Entries at or after the query time
    Future,
    /// Nearest entry on either side; ties go to the past
    #[default]
    Both,
}

pub(crate) struct PoolState<L> {
    pub(crate) layout: L,
    pub(crate) pool: BufferPool,
    /// Entry bound; the pool holds `reader_reserve` more blocks than this
    pub(crate) capacity: usize,
}

pub(crate) struct TimelineCore<B: TimelineBuffer> {
    entries: BTreeMap<Timestamp, Arc<B>>,
    pool: Option<PoolState<B::Layout>>,
    config: TimelineConfig,
    stats: TimelineStats,
}

/// What a successful push did, for event reporting
pub(crate) enum PushOutcome {
    Inserted,
    Replaced,
    /// Older than the time window; dropped right away
    Expired,
}

impl<B: TimelineBuffer> TimelineCore<B> {
    pub(crate) fn new(config: TimelineConfig) -> Self {
        Self {
            entries: BTreeMap::new(),
            pool: None,
            config,
            stats: TimelineStats::default(),
        }
    }

    pub(crate) fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> &TimelineStats {
        &self.stats
    }

    pub(crate) fn pool(&self) -> Option<&PoolState<B::Layout>> {
        self.pool.as_ref()
    }

    pub(crate) fn layout(&self) -> Option<&B::Layout> {
        self.pool.as_ref().map(|state| &state.layout)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.pool.as_ref().map_or(0, |state| state.capacity)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Replace the pool, dropping every entry first
    ///
    /// The pool gets `capacity + reader_reserve` blocks; at most `capacity`
    /// of them are ever held by entries.
    pub(crate) fn init_pool_size(&mut self, layout: B::Layout, capacity: usize) -> Result<()> {
        self.config.validate()?;
        let block_size = B::block_size(&layout)?;
        if capacity == 0 {
            return Err(TimelineError::InvalidConfig(
                "timeline must hold at least one element".to_string(),
            ));
        }
        let blocks = capacity
            .checked_add(self.config.reader_reserve)
            .ok_or_else(|| TimelineError::InvalidConfig("reader reserve overflows".to_string()))?;
        let pool = BufferPool::new(block_size, blocks)?;

        self.entries.clear();
        self.stats = TimelineStats::default();
        info!(
            pool = pool.id(),
            block_size,
            capacity,
            reserve = self.config.reader_reserve,
            layout = ?layout,
            "Initialized timeline pool"
        );
        self.pool = Some(PoolState {
            layout,
            pool,
            capacity,
        });
        Ok(())
    }

    /// Allocate an un-inserted buffer at `timestamp`
    ///
    /// When the pool has no free block and the timeline is full, the oldest
    /// entry is evicted ahead of the push that would evict it anyway, provided
    /// no consumer still holds it. Otherwise the pool stays exhausted until
    /// consumers drop their references.
    pub(crate) fn create_buffer(&mut self, timestamp: Timestamp) -> Result<B> {
        if !timestamp.is_finite() {
            return Err(TimelineError::InvalidTimestamp(timestamp.as_millis()));
        }
        let Some(state) = self.pool.as_ref() else {
            return Err(TimelineError::Uninitialized);
        };
        let pool = state.pool.clone();
        let capacity = state.capacity;

        let mut block = match pool.allocate() {
            Ok(block) => block,
            Err(TimelineError::PoolExhausted { .. })
                if self.entries.len() >= capacity && self.oldest_is_unshared() =>
            {
                self.evict_oldest();
                pool.allocate()?
            }
            Err(e) => {
                warn!(
                    %timestamp,
                    outstanding = pool.outstanding(),
                    "No free block for new buffer"
                );
                return Err(e);
            }
        };
        block.zero();

        let layout = &self.pool.as_ref().ok_or(TimelineError::Uninitialized)?.layout;
        Ok(B::from_buffer(Buffer::new(timestamp, block), layout))
    }

    pub(crate) fn push(&mut self, buffer: B) -> Result<PushOutcome> {
        let state = self.pool.as_ref().ok_or(TimelineError::Uninitialized)?;
        let timeline_pool = state.pool.id();
        let capacity = state.capacity;
        if buffer.pool_id() != timeline_pool {
            warn!(
                buffer_pool = buffer.pool_id(),
                timeline_pool, "Rejected buffer from a previous pool"
            );
            return Err(TimelineError::StaleBuffer {
                buffer_pool: buffer.pool_id(),
                timeline_pool,
            });
        }

        let timestamp = buffer.timestamp();
        let outcome = if self.entries.contains_key(&timestamp) {
            match self.config.duplicate_policy {
                DuplicatePolicy::Replace => {
                    self.entries.insert(timestamp, Arc::new(buffer));
                    self.stats.replaced += 1;
                    PushOutcome::Replaced
                }
                DuplicatePolicy::Reject => {
                    self.stats.rejected += 1;
                    warn!(%timestamp, "Rejected duplicate timestamp");
                    return Err(TimelineError::DuplicateTimestamp(timestamp.as_millis()));
                }
            }
        } else {
            while self.entries.len() >= capacity {
                self.evict_oldest();
            }
            self.entries.insert(timestamp, Arc::new(buffer));
            PushOutcome::Inserted
        };

        self.prune_expired();
        self.stats.pushed += 1;
        self.stats.peak_len = self.stats.peak_len.max(self.entries.len());
        if !self.entries.contains_key(&timestamp) {
            debug!(%timestamp, "Pushed buffer is outside the time window");
            return Ok(PushOutcome::Expired);
        }
        trace!(%timestamp, len = self.entries.len(), "Pushed buffer");
        Ok(outcome)
    }

    /// Whether evicting the oldest entry would return its block to the pool
    fn oldest_is_unshared(&self) -> bool {
        self.entries
            .first_key_value()
            .is_some_and(|(_, buffer)| Arc::strong_count(buffer) == 1)
    }

    fn evict_oldest(&mut self) {
        if let Some((timestamp, _)) = self.entries.pop_first() {
            self.stats.evicted += 1;
            trace!(%timestamp, "Evicted oldest buffer");
        }
    }

    fn prune_expired(&mut self) {
        let Some(max_age) = self.config.max_age_ms else {
            return;
        };
        let Some(newest) = self.newest_timestamp() else {
            return;
        };
        let cutoff = Timestamp::from_millis(newest.as_millis() - max_age);
        while let Some((&oldest, _)) = self.entries.first_key_value() {
            if oldest < cutoff {
                self.entries.pop_first();
                self.stats.evicted += 1;
                trace!(timestamp = %oldest, "Pruned buffer outside time window");
            } else {
                break;
            }
        }
    }

    pub(crate) fn get_object(&self, timestamp: Timestamp) -> Option<Arc<B>> {
        self.entries.get(&timestamp).cloned()
    }

    pub(crate) fn get_closest_object(
        &self,
        timestamp: Timestamp,
        direction: Direction,
    ) -> Option<Arc<B>> {
        let past = || self.entries.range(..=timestamp).next_back();
        let future = || self.entries.range(timestamp..).next();

        let found = match direction {
            Direction::Past => past(),
            Direction::Future => future(),
            Direction::Both => match (past(), future()) {
                (Some(low), Some(high)) => {
                    if timestamp.distance(*low.0) <= timestamp.distance(*high.0) {
                        Some(low)
                    } else {
                        Some(high)
                    }
                }
                (low, high) => low.or(high),
            },
        };
        trace!(%timestamp, ?direction, found = ?found.map(|(t, _)| *t), "Closest lookup");
        found.map(|(_, buffer)| Arc::clone(buffer))
    }

    pub(crate) fn pop_object(&mut self, timestamp: Timestamp) -> Option<Arc<B>> {
        let removed = self.entries.remove(&timestamp);
        if removed.is_some() {
            self.stats.popped += 1;
        }
        removed
    }

    pub(crate) fn newest_object(&self) -> Option<Arc<B>> {
        self.entries.last_key_value().map(|(_, b)| Arc::clone(b))
    }

    pub(crate) fn newest_timestamp(&self) -> Option<Timestamp> {
        self.entries.last_key_value().map(|(t, _)| *t)
    }

    pub(crate) fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.entries.first_key_value().map(|(t, _)| *t)
    }

    pub(crate) fn objects(&self) -> Vec<Arc<B>> {
        self.entries.values().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "Cleared timeline");
    }

    /// Rebuild this container as an independent copy of `sources`
    pub(crate) fn fill_from(
        &mut self,
        layout: B::Layout,
        capacity: usize,
        config: TimelineConfig,
        sources: &[Arc<B>],
    ) -> Result<()> {
        self.config = config;
        self.init_pool_size(layout, capacity)?;
        for source in sources {
            let mut copy = self.create_buffer(source.timestamp())?;
            copy.deep_copy(source)?;
            self.entries.insert(source.timestamp(), Arc::new(copy));
        }
        self.stats.peak_len = self.entries.len();
        debug!(count = sources.len(), "Deep-copied timeline");
        Ok(())
    }
}
