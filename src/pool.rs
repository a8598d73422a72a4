//! Fixed-size block allocator backing a timeline
//!
//! A [`BufferPool`] carves one contiguous arena of `element_size * capacity`
//! bytes into `capacity` blocks when it is created, and never grows. Blocks are
//! handed out as owned [`Block`] values; dropping a block pushes its storage
//! back onto the free list of the pool it came from, from whichever thread the
//! drop happens on.
//!
//! Each block keeps a reference-counted handle to its pool, so a pool that is
//! replaced while consumers still hold blocks stays alive until the last block
//! is returned. Releasing a block twice, or into a foreign pool, cannot be
//! expressed: `Block` is consumed by its release.
//!
//! # Example
//!
//! ```
//! use sight_timeline::pool::BufferPool;
//!
//! let pool = BufferPool::new(64, 4)?;
//! let mut block = pool.allocate()?;
//! block.as_mut_slice()[0] = 42;
//! assert_eq!(pool.available(), 3);
//!
//! drop(block);
//! assert_eq!(pool.available(), 4);
//! # Ok::<(), sight_timeline::TimelineError>(())
//! ```

use crate::error::{Result, TimelineError};
use bytes::BytesMut;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, trace};

/// Unique identifier of a pool instance
pub type PoolId = u64;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

struct PoolShared {
    id: PoolId,
    element_size: usize,
    capacity: usize,
    free: Mutex<Vec<BytesMut>>,
}

/// Slab allocator handing out fixed-size blocks from a preallocated arena
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create a pool of `capacity` blocks of `element_size` bytes each
    ///
    /// The whole arena is allocated and zeroed up front.
    ///
    /// # Errors
    ///
    /// [`TimelineError::InvalidConfig`] if either argument is zero or the arena
    /// size overflows.
    pub fn new(element_size: usize, capacity: usize) -> Result<Self> {
        if element_size == 0 {
            return Err(TimelineError::InvalidConfig(
                "element size must be at least 1 byte".to_string(),
            ));
        }
        if capacity == 0 {
            return Err(TimelineError::InvalidConfig(
                "pool must hold at least one element".to_string(),
            ));
        }
        let arena_bytes = element_size.checked_mul(capacity).ok_or_else(|| {
            TimelineError::InvalidConfig(format!(
                "arena of {capacity} x {element_size} bytes overflows"
            ))
        })?;

        let mut arena = BytesMut::zeroed(arena_bytes);
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(arena.split_to(element_size));
        }

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            pool = id,
            element_size,
            capacity,
            arena_bytes,
            "Created buffer pool"
        );

        Ok(Self {
            shared: Arc::new(PoolShared {
                id,
                element_size,
                capacity,
                free: Mutex::new(free),
            }),
        })
    }

    /// Take a free block
    ///
    /// The block keeps whatever bytes its previous owner left in it; callers
    /// that need a clean slate use [`Block::zero`].
    ///
    /// # Errors
    ///
    /// [`TimelineError::PoolExhausted`] when every block is outstanding.
    pub fn allocate(&self) -> Result<Block> {
        let data = self
            .shared
            .free
            .lock()
            .pop()
            .ok_or(TimelineError::PoolExhausted {
                capacity: self.shared.capacity,
            })?;
        trace!(pool = self.shared.id, "Allocated block");
        Ok(Block {
            data,
            pool: Arc::clone(&self.shared),
        })
    }

    /// Return a block to the pool it was allocated from
    ///
    /// Equivalent to dropping the block.
    pub fn release(&self, block: Block) {
        debug_assert_eq!(block.pool_id(), self.id(), "block released into a foreign pool");
        drop(block);
    }

    /// Identifier of this pool
    pub fn id(&self) -> PoolId {
        self.shared.id
    }

    /// Size in bytes of every block
    pub fn element_size(&self) -> usize {
        self.shared.element_size
    }

    /// Number of blocks carved from the arena
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Total arena size in bytes
    pub fn arena_bytes(&self) -> usize {
        self.shared.element_size * self.shared.capacity
    }

    /// Number of free blocks
    pub fn available(&self) -> usize {
        self.shared.free.lock().len()
    }

    /// Number of blocks currently held outside the pool
    pub fn outstanding(&self) -> usize {
        self.shared.capacity - self.available()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("id", &self.shared.id)
            .field("element_size", &self.shared.element_size)
            .field("capacity", &self.shared.capacity)
            .field("available", &self.available())
            .finish()
    }
}

/// One fixed-size block of pool storage
///
/// Returned to its pool on drop.
pub struct Block {
    data: BytesMut,
    pool: Arc<PoolShared>,
}

impl Block {
    /// Identifier of the pool this block belongs to
    pub fn pool_id(&self) -> PoolId {
        self.pool.id
    }

    /// Block size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: pools reject zero-sized elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read access to the block bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Write access to the block bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Overwrite the whole block with zeros
    pub fn zero(&mut self) {
        self.data.fill(0);
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        if data.len() == self.pool.element_size {
            self.pool.free.lock().push(data);
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("pool", &self.pool.id)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(matches!(
            BufferPool::new(0, 4),
            Err(TimelineError::InvalidConfig(_))
        ));
        assert!(matches!(
            BufferPool::new(16, 0),
            Err(TimelineError::InvalidConfig(_))
        ));
        assert!(matches!(
            BufferPool::new(usize::MAX, 2),
            Err(TimelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_allocate_until_exhausted() {
        let pool = BufferPool::new(8, 3).unwrap();
        assert_eq!(pool.arena_bytes(), 24);

        let blocks: Vec<Block> = (0..3).map(|_| pool.allocate().unwrap()).collect();
        assert!(blocks.iter().all(|b| b.len() == 8));
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.outstanding(), 3);

        let result = pool.allocate();
        assert_eq!(result.unwrap_err(), TimelineError::PoolExhausted { capacity: 3 });

        drop(blocks);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_blocks_do_not_alias() {
        let pool = BufferPool::new(4, 2).unwrap();
        let mut a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();

        a.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(b.as_slice(), &[0, 0, 0, 0]);
        assert_eq!(a.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_released_block_is_reused() {
        let pool = BufferPool::new(4, 1).unwrap();
        let mut block = pool.allocate().unwrap();
        block.as_mut_slice().fill(7);
        pool.release(block);

        let mut again = pool.allocate().unwrap();
        assert_eq!(again.as_slice(), &[7, 7, 7, 7]);
        again.zero();
        assert_eq!(again.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_release_from_other_thread() {
        let pool = BufferPool::new(32, 2).unwrap();
        let block = pool.allocate().unwrap();
        assert_eq!(pool.available(), 1);

        std::thread::spawn(move || drop(block)).join().unwrap();
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_blocks_outlive_pool_handle() {
        let pool = BufferPool::new(16, 2).unwrap();
        let mut block = pool.allocate().unwrap();
        drop(pool);

        block.as_mut_slice()[15] = 9;
        assert_eq!(block.as_slice()[15], 9);
    }

    #[test]
    fn test_pool_ids_are_unique() {
        let a = BufferPool::new(1, 1).unwrap();
        let b = BufferPool::new(1, 1).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.allocate().unwrap().pool_id(), a.id());
    }
}
