//! Byte-buffer pool
//!
//! Bounded pool of packet buffers shared by the upper layers (SDUs), the
//! entities (reassembled packets) and the broadcast pass-through path.
//!
//! A [`ByteBuffer`] returns its slot to the pool when dropped. Every discard
//! path in the layer therefore releases a buffer exactly once simply by
//! letting it go out of scope; there is no explicit deallocate call to forget
//! or to repeat.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;

use crate::config::RlcLayerConfig;

/// Default number of outstanding buffers
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Default buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

#[derive(Debug)]
struct PoolInner {
    capacity: usize,
    buffer_size: usize,
    in_use: AtomicUsize,
    allocated: AtomicU64,
    released: AtomicU64,
    exhausted: AtomicU64,
}

impl PoolInner {
    fn try_reserve(&self) -> bool {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.capacity).then_some(used + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
        self.released.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle to a bounded buffer pool. Cloning shares the same pool.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Creates a pool allowing `capacity` outstanding buffers of `buffer_size` bytes.
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity,
                buffer_size,
                in_use: AtomicUsize::new(0),
                allocated: AtomicU64::new(0),
                released: AtomicU64::new(0),
                exhausted: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a pool sized from the layer configuration.
    pub fn from_config(config: &RlcLayerConfig) -> Self {
        Self::new(config.pool_capacity, config.buffer_size)
    }

    /// Allocates an empty buffer, or `None` if the pool is exhausted.
    pub fn allocate(&self) -> Option<ByteBuffer> {
        if !self.inner.try_reserve() {
            self.inner.exhausted.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.inner.allocated.fetch_add(1, Ordering::Relaxed);
        Some(ByteBuffer {
            data: BytesMut::with_capacity(self.inner.buffer_size),
            timestamp: None,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Allocates a buffer holding a copy of `payload`.
    ///
    /// Returns `None` if the pool is exhausted or `payload` does not fit.
    pub fn allocate_from(&self, payload: &[u8]) -> Option<ByteBuffer> {
        if payload.len() > self.inner.buffer_size {
            return None;
        }
        let mut buf = self.allocate()?;
        buf.data.extend_from_slice(payload);
        Some(buf)
    }

    /// Maximum number of outstanding buffers
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Size of each buffer in bytes
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Buffers currently outstanding
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Buffers currently available
    pub fn available(&self) -> usize {
        self.inner.capacity.saturating_sub(self.in_use())
    }

    /// Total successful allocations
    pub fn allocated(&self) -> u64 {
        self.inner.allocated.load(Ordering::Relaxed)
    }

    /// Total releases back to the pool
    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::Relaxed)
    }

    /// Allocation attempts that found the pool empty
    pub fn exhausted(&self) -> u64 {
        self.inner.exhausted.load(Ordering::Relaxed)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY, DEFAULT_BUFFER_SIZE)
    }
}

/// Packet buffer borrowed from a [`BufferPool`].
pub struct ByteBuffer {
    data: BytesMut,
    timestamp: Option<Instant>,
    pool: Arc<PoolInner>,
}

impl ByteBuffer {
    /// Number of bytes held
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes that can still be appended
    pub fn remaining_capacity(&self) -> usize {
        self.pool.buffer_size.saturating_sub(self.data.len())
    }

    /// Appends `bytes`, returning false (and leaving the buffer unchanged) if
    /// they do not fit.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.remaining_capacity() {
            return false;
        }
        self.data.extend_from_slice(bytes);
        true
    }

    /// Discards all content
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Stamps the buffer with the current time.
    pub fn set_timestamp(&mut self) {
        self.timestamp = Some(Instant::now());
    }

    /// Time at which the buffer was stamped
    pub fn timestamp(&self) -> Option<Instant> {
        self.timestamp
    }

    /// Held bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Deref for ByteBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.data.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl Drop for ByteBuffer {
    fn drop(&mut self) {
        self.pool.release();
    }
}
