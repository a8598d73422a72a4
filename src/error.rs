//! Error types for timeline and buffer pool operations
//!
//! Structural errors (bad pool configuration, mismatched buffer types or
//! sizes) are programming errors and surface synchronously to the caller.
//! Capacity pressure is never an error: the timeline evicts its oldest entry
//! instead. Query misses are `None`, not errors.

use thiserror::Error;

/// Timeline error types
///
/// All fallible operations in this library return `Result<T, TimelineError>`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    /// Invalid pool or layout configuration
    ///
    /// This error occurs when:
    /// - The per-element byte size is zero
    /// - The maximum element count is zero
    /// - A slot layout declares zero slots or more than 64 slots
    /// - `element_size * capacity` overflows `usize`
    ///
    /// # Example
    /// ```
    /// # use sight_timeline::error::TimelineError;
    /// let err = TimelineError::InvalidConfig("capacity must be at least 1".to_string());
    /// ```
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every block of the pool is outstanding
    ///
    /// The timeline evicts its oldest entries before giving up, so this only
    /// happens when consumers (or un-pushed buffers) still hold every block.
    #[error("Buffer pool exhausted: all {capacity} blocks are in use")]
    PoolExhausted {
        /// Number of blocks carved from the arena
        capacity: usize,
    },

    /// Byte size of two buffers or of a payload does not match
    ///
    /// # Example
    /// ```
    /// # use sight_timeline::error::TimelineError;
    /// let err = TimelineError::SizeMismatch {
    ///     expected: 64,
    ///     actual: 48,
    /// };
    /// ```
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Size in bytes required by the destination
        expected: usize,
        /// Size in bytes actually provided
        actual: usize,
    },

    /// A timeline object was cast to the wrong buffer variant
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested buffer type
        expected: &'static str,
        /// Actual buffer type of the object
        found: &'static str,
    },

    /// Timestamp is NaN or infinite
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    /// A buffer already exists at this timestamp and the timeline rejects duplicates
    #[error("Duplicate timestamp: {0}")]
    DuplicateTimestamp(f64),

    /// Buffer requested before the pool was initialized
    #[error("Timeline pool is not initialized")]
    Uninitialized,

    /// The buffer was carved from a pool that has since been replaced
    ///
    /// Happens when `init_pool_size` runs between `create_buffer` and `push`.
    #[error("Buffer belongs to a previous pool (pool {buffer_pool}, timeline pool {timeline_pool})")]
    StaleBuffer {
        /// Pool the buffer was allocated from
        buffer_pool: u64,
        /// Pool currently owned by the timeline
        timeline_pool: u64,
    },

    /// Slot index beyond the layout's slot count
    #[error("Slot index {index} out of range (slot count {slot_count})")]
    SlotOutOfRange {
        /// Requested slot
        index: usize,
        /// Number of slots per buffer
        slot_count: usize,
    },
}

/// Result type alias for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = TimelineError::PoolExhausted { capacity: 4 };
        assert_eq!(err.to_string(), "Buffer pool exhausted: all 4 blocks are in use");

        let err = TimelineError::SlotOutOfRange {
            index: 5,
            slot_count: 3,
        };
        assert_eq!(err.to_string(), "Slot index 5 out of range (slot count 3)");
    }
}
