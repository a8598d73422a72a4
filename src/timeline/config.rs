//! Timeline behavior configuration and counters

use crate::error::{Result, TimelineError};
use serde::{Deserialize, Serialize};

/// What `push` does when a buffer already exists at the same timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// The new buffer replaces the stored one
    #[default]
    Replace,
    /// The new buffer is dropped and `push` fails with `DuplicateTimestamp`
    Reject,
}

/// Configuration for timeline behavior
///
/// Pool geometry (layout and capacity) is not part of this: it is supplied to
/// `init_pool_size` by the producer, which may change it at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Maximum time window in milliseconds (None = bounded by count only)
    ///
    /// After every push, entries older than `newest - max_age_ms` are pruned.
    pub max_age_ms: Option<f64>,
    /// Handling of pushes at an existing timestamp
    pub duplicate_policy: DuplicatePolicy,
    /// Depth of the notification channel returned by `subscribe`
    pub notify_capacity: usize,
    /// Extra pool blocks for buffers consumers keep after eviction
    ///
    /// The pool holds `capacity + reader_reserve` blocks while the timeline
    /// holds at most `capacity` entries. With no reserve, a consumer holding
    /// the oldest entry makes `create_buffer` fail on a full timeline.
    pub reader_reserve: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            max_age_ms: None,
            duplicate_policy: DuplicatePolicy::Replace,
            notify_capacity: 64,
            reader_reserve: 0,
        }
    }
}

impl TimelineConfig {
    /// Keep only the last `max_age_ms` milliseconds of samples
    pub fn windowed(max_age_ms: f64) -> Self {
        Self {
            max_age_ms: Some(max_age_ms),
            ..Self::default()
        }
    }

    /// Fail pushes at an existing timestamp instead of replacing
    pub fn rejecting_duplicates() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            ..Self::default()
        }
    }

    /// Set the time window
    pub fn with_max_age(mut self, max_age_ms: f64) -> Self {
        self.max_age_ms = Some(max_age_ms);
        self
    }

    /// Set the duplicate timestamp policy
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set the notification channel depth
    pub fn with_notify_capacity(mut self, capacity: usize) -> Self {
        self.notify_capacity = capacity;
        self
    }

    /// Set the number of extra blocks kept for consumer-held buffers
    pub fn with_reader_reserve(mut self, blocks: usize) -> Self {
        self.reader_reserve = blocks;
        self
    }

    /// Check the configuration before a pool is built from it
    ///
    /// # Errors
    ///
    /// [`TimelineError::InvalidConfig`] when `max_age_ms` is NaN, infinite or
    /// negative.
    pub fn validate(&self) -> Result<()> {
        match self.max_age_ms {
            Some(max_age) if !max_age.is_finite() || max_age < 0.0 => {
                Err(TimelineError::InvalidConfig(format!(
                    "time window must be a finite, non-negative number of milliseconds, got {max_age}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Statistics for a timeline
///
/// Reset when the pool is re-initialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineStats {
    /// Buffers inserted by `push`
    pub pushed: u64,
    /// Pushes that replaced a buffer at the same timestamp
    pub replaced: u64,
    /// Pushes rejected as duplicates
    pub rejected: u64,
    /// Entries evicted by capacity or time window
    pub evicted: u64,
    /// Entries removed by `pop_object`
    pub popped: u64,
    /// Peak number of live entries
    pub peak_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let config = TimelineConfig::windowed(500.0);
        assert_eq!(config.max_age_ms, Some(500.0));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);

        let config = TimelineConfig::rejecting_duplicates()
            .with_max_age(100.0)
            .with_notify_capacity(8);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.max_age_ms, Some(100.0));
        assert_eq!(config.notify_capacity, 8);
    }

    #[test]
    fn test_validate_window() {
        assert!(TimelineConfig::default().validate().is_ok());
        assert!(TimelineConfig::windowed(0.0).validate().is_ok());
        for max_age in [f64::NAN, f64::NEG_INFINITY, f64::INFINITY, -0.5] {
            assert!(matches!(
                TimelineConfig::windowed(max_age).validate(),
                Err(TimelineError::InvalidConfig(_))
            ));
        }

        let config: TimelineConfig = serde_json::from_str(r#"{"max_age_ms":-5.0}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: TimelineConfig =
            serde_json::from_str(r#"{"duplicate_policy":"Reject"}"#).unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.max_age_ms, None);
        assert_eq!(config.notify_capacity, 64);
        assert_eq!(config.reader_reserve, 0);
    }
}
