//! Fixed-capacity transmission buffers and the pool that recycles them.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::protocol::{Error, Result};

/// Capacity of every transmission buffer in bytes.
pub const COMBUF_CAPACITY: usize = 0x4000;

/// Fixed-width value that can be appended to a [`FixedBuffer`] in network
/// byte order.
pub trait WireElement: Copy {
    /// Encoded width in bytes
    const SIZE: usize;

    /// Append one value.
    fn put(self, dst: &mut BytesMut);

    /// Append every value in `values`.
    fn put_all(values: &[Self], dst: &mut BytesMut) {
        for &value in values {
            value.put(dst);
        }
    }
}

macro_rules! wire_element {
    ($ty:ty, $put:ident) => {
        impl WireElement for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn put(self, dst: &mut BytesMut) {
                dst.$put(self);
            }
        }
    };
}

wire_element!(i16, put_i16);
wire_element!(u16, put_u16);
wire_element!(i32, put_i32);
wire_element!(u32, put_u32);
wire_element!(f32, put_f32);
wire_element!(f64, put_f64);

impl WireElement for u8 {
    const SIZE: usize = 1;

    #[inline]
    fn put(self, dst: &mut BytesMut) {
        dst.put_u8(self);
    }

    #[inline]
    fn put_all(values: &[Self], dst: &mut BytesMut) {
        dst.put_slice(values);
    }
}

/// Single link in an outbound buffer chain.
///
/// Holds at most [`COMBUF_CAPACITY`] bytes. Pushes never write a partial
/// element: they accept as many whole elements as fit and report the count.
/// Bytes past the commit mark belong to a message that may still be rolled
/// back.
#[derive(Debug)]
pub struct FixedBuffer {
    data: BytesMut,
    committed: usize,
}

impl FixedBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(COMBUF_CAPACITY),
            committed: 0,
        }
    }

    /// Capacity shared by every buffer.
    #[must_use]
    pub const fn capacity_bytes() -> usize {
        COMBUF_CAPACITY
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the buffer contains no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes still available.
    #[must_use]
    pub fn unoccupied_bytes(&self) -> usize {
        COMBUF_CAPACITY - self.data.len()
    }

    /// Bytes written since the last commit.
    #[must_use]
    pub fn uncommitted_bytes(&self) -> usize {
        self.data.len() - self.committed
    }

    /// Append one value; returns whether it fit.
    pub fn push<T: WireElement>(&mut self, value: T) -> bool {
        if self.unoccupied_bytes() < T::SIZE {
            return false;
        }
        value.put(&mut self.data);
        true
    }

    /// Append as many whole elements of `values` as fit; returns how many.
    pub fn push_slice<T: WireElement>(&mut self, values: &[T]) -> usize {
        let accepted = values.len().min(self.unoccupied_bytes() / T::SIZE);
        T::put_all(&values[..accepted], &mut self.data);
        accepted
    }

    /// Filled portion of the buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Convert into an immutable byte handle for the transport.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    pub(crate) fn data_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    pub(crate) fn commit(&mut self) {
        self.committed = self.data.len();
    }

    /// Drop bytes past the commit mark; returns how many were dropped.
    pub(crate) fn clear_uncommitted(&mut self) -> usize {
        let dropped = self.uncommitted_bytes();
        self.data.truncate(self.committed);
        dropped
    }

    /// Empty the buffer and clear its commit mark.
    pub fn reset(&mut self) {
        self.data.clear();
        self.committed = 0;
    }
}

impl Default for FixedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for FixedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Supplies and reclaims transmission buffers.
///
/// Called synchronously from whichever thread owns the send queue.
pub trait BufferMemoryManager {
    /// Hand out a buffer. Recycled buffers need not be emptied first; the
    /// queue resets every buffer it receives.
    fn allocate(&mut self) -> Result<FixedBuffer>;

    /// Take a buffer back.
    fn release(&mut self, buffer: FixedBuffer);
}

impl<M: BufferMemoryManager + ?Sized> BufferMemoryManager for &mut M {
    fn allocate(&mut self) -> Result<FixedBuffer> {
        (**self).allocate()
    }

    fn release(&mut self, buffer: FixedBuffer) {
        (**self).release(buffer);
    }
}

/// Buffer pool configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Maximum number of released buffers kept for reuse.
    pub max_pooled: usize,
    /// Optional ceiling on buffers handed out and not yet released.
    pub max_outstanding: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pooled: 64,
            max_outstanding: None,
        }
    }
}

/// Recycling [`BufferMemoryManager`].
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Vec<FixedBuffer>,
    config: PoolConfig,
    outstanding: usize,
}

impl BufferPool {
    /// Create a pool with the given configuration.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            free: Vec::with_capacity(config.max_pooled),
            config,
            outstanding: 0,
        }
    }

    /// Buffers handed out and not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Buffers waiting for reuse.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.free.len()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl BufferMemoryManager for BufferPool {
    fn allocate(&mut self) -> Result<FixedBuffer> {
        if let Some(limit) = self.config.max_outstanding {
            if self.outstanding >= limit {
                return Err(Error::AllocationFailed {
                    outstanding: self.outstanding,
                    limit,
                });
            }
        }
        self.outstanding += 1;
        let buffer = self.free.pop().unwrap_or_default();
        trace!(outstanding = self.outstanding, "buffer allocated");
        Ok(buffer)
    }

    fn release(&mut self, mut buffer: FixedBuffer) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.free.len() < self.config.max_pooled {
            buffer.reset();
            self.free.push(buffer);
        }
        trace!(outstanding = self.outstanding, "buffer released");
    }
}
