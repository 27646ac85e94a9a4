//! Destination for drained buffers.

use super::buffer::FixedBuffer;

/// Takes ownership of buffers ready for physical transmission.
///
/// The popped chain, in order, is the exact byte stream for the wire; sinks
/// add no framing of their own.
pub trait TransportSink {
    /// Accept one drained buffer.
    ///
    /// A sink that has finished with the bytes returns the buffer, and the
    /// queue hands it back to its memory manager. A sink that keeps the
    /// buffer returns `None` and becomes responsible for recycling it.
    fn accept(&mut self, buffer: FixedBuffer) -> Option<FixedBuffer>;
}

impl<S: TransportSink + ?Sized> TransportSink for &mut S {
    fn accept(&mut self, buffer: FixedBuffer) -> Option<FixedBuffer> {
        (**self).accept(buffer)
    }
}

/// Copies the bytes out and returns the buffer for reuse.
impl TransportSink for Vec<u8> {
    fn accept(&mut self, buffer: FixedBuffer) -> Option<FixedBuffer> {
        self.extend_from_slice(buffer.as_slice());
        Some(buffer)
    }
}

/// Sink that keeps drained buffers in memory, in arrival order.
///
/// Kept buffers stay outstanding against the memory manager until the
/// caller passes them to [`SendQueue::recycle`](super::SendQueue::recycle).
#[derive(Debug, Default)]
pub struct CollectingSink {
    buffers: Vec<FixedBuffer>,
}

impl CollectingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers received so far.
    #[must_use]
    pub fn buffers(&self) -> &[FixedBuffer] {
        &self.buffers
    }

    /// Concatenated bytes of every buffer received.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.buffers
            .iter()
            .flat_map(|buffer| buffer.as_slice().iter().copied())
            .collect()
    }

    /// Remove and return every buffer received.
    pub fn take(&mut self) -> Vec<FixedBuffer> {
        std::mem::take(&mut self.buffers)
    }
}

impl TransportSink for CollectingSink {
    fn accept(&mut self, buffer: FixedBuffer) -> Option<FixedBuffer> {
        self.buffers.push(buffer);
        None
    }
}
