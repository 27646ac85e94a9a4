//! Outbound send queue.
//!
//! [`SendQueue`] owns an ordered chain of [`FixedBuffer`]s. Requests are
//! serialized into the tail of the chain, spilling into freshly allocated
//! buffers as the tail fills. Arrays and strings are split across buffers at
//! element boundaries; scalars and request headers never straddle two
//! buffers.
//!
//! # Messages
//!
//! Bytes written between [`SendQueue::begin_msg`] and
//! [`SendQueue::commit_msg`] form one message. Until it is committed the
//! message can be rolled back: the next `begin_msg`, or any pop, truncates
//! every buffer to its commit mark and releases buffers left empty.
//!
//! # Concurrency
//!
//! The queue performs no locking. When several threads share one queue (for
//! example a request thread and a background flush thread), the caller must
//! hold its own lock around every method call.

use std::collections::VecDeque;

use tracing::{debug, instrument, trace};

use crate::protocol::{
    DbrType, Error, HeaderForm, MAX_STRING_SIZE, PAYLOAD_ALIGNMENT, Payload, RequestHeader,
    Result, SendStats, align_payload, dbr_type_ok,
};

use super::buffer::{BufferMemoryManager, FixedBuffer, WireElement};
use super::sink::TransportSink;

/// Pending data beyond this many buffers suggests flushing soon.
pub const EARLY_FLUSH_BUFFERS: usize = 4;

/// Pending data beyond this many buffers must be flushed before queueing more.
pub const BLOCK_FLUSH_BUFFERS: usize = 16;

const NIL_BYTES: [u8; PAYLOAD_ALIGNMENT] = [0; PAYLOAD_ALIGNMENT];

/// A request carrying typed payload data.
#[derive(Debug, Clone, Copy)]
pub struct PayloadRequest<'a> {
    /// Request (command) code
    pub request: u16,
    /// Raw data-type code; validated before anything is written
    pub data_type: u32,
    /// Number of elements to send
    pub element_count: u32,
    /// Channel identifier
    pub channel_id: u32,
    /// Request-dependent word
    pub request_dependent: u32,
    /// Values to send
    pub payload: Payload<'a>,
}

/// Chain of transmission buffers with transactional message framing.
#[derive(Debug)]
pub struct SendQueue<M: BufferMemoryManager, S: TransportSink> {
    memory: M,
    sink: S,
    bufs: VecDeque<FixedBuffer>,
    /// Index of the first buffer holding uncommitted bytes.
    first_uncommitted: Option<usize>,
    pending: usize,
    stats: SendStats,
}

impl<M: BufferMemoryManager, S: TransportSink> SendQueue<M, S> {
    /// Create an empty queue bound to a memory manager and a sink.
    pub fn new(memory: M, sink: S) -> Self {
        Self {
            memory,
            sink,
            bufs: VecDeque::new(),
            first_uncommitted: None,
            pending: 0,
            stats: SendStats::default(),
        }
    }

    /// Release every buffer and forget any open message.
    pub fn clear(&mut self) {
        for buffer in self.bufs.drain(..) {
            self.memory.release(buffer);
        }
        self.pending = 0;
        self.first_uncommitted = None;
    }

    /// Start a new message, discarding the uncommitted bytes of any message
    /// still open.
    pub fn begin_msg(&mut self) {
        if self.first_uncommitted.is_some() {
            self.clear_uncommitted();
        }
        self.first_uncommitted = self.bufs.len().checked_sub(1);
    }

    /// Make every byte written since `begin_msg` part of the flushable stream.
    pub fn commit_msg(&mut self) {
        if let Some(first) = self.first_uncommitted.take() {
            for buffer in self.bufs.range_mut(first..) {
                buffer.commit();
            }
            self.stats.messages_committed += 1;
        }
    }

    fn clear_uncommitted(&mut self) {
        let Some(first) = self.first_uncommitted.take() else {
            return;
        };
        let mut dropped = 0;
        let mut index = first;
        while let Some(buffer) = self.bufs.get_mut(index) {
            dropped += buffer.clear_uncommitted();
            if buffer.is_empty() {
                if let Some(empty) = self.bufs.remove(index) {
                    self.memory.release(empty);
                }
            } else {
                index += 1;
            }
        }
        if dropped > 0 {
            self.pending -= dropped;
            self.stats.messages_rolled_back += 1;
            self.stats.bytes_rolled_back += dropped as u64;
            debug!(dropped, pending = self.pending, "rolled back uncommitted message");
        }
    }

    /// Bytes queued across the whole chain.
    #[must_use]
    pub fn occupied_bytes(&self) -> usize {
        self.pending
    }

    /// Number of buffers currently chained.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.bufs.len()
    }

    /// True when adding `n_bytes_this_msg` would exceed four buffers of data.
    #[must_use]
    pub fn flush_early_threshold(&self, n_bytes_this_msg: usize) -> bool {
        self.pending.saturating_add(n_bytes_this_msg)
            > EARLY_FLUSH_BUFFERS * FixedBuffer::capacity_bytes()
    }

    /// True when adding `n_bytes_this_msg` would exceed sixteen buffers of data.
    #[must_use]
    pub fn flush_block_threshold(&self, n_bytes_this_msg: usize) -> bool {
        self.pending.saturating_add(n_bytes_this_msg)
            > BLOCK_FLUSH_BUFFERS * FixedBuffer::capacity_bytes()
    }

    /// Check a raw data-type code against the dispatch table.
    #[must_use]
    pub fn dbr_type_ok(&self, code: u32) -> bool {
        dbr_type_ok(code)
    }

    /// Append a big-endian `u16`.
    pub fn push_u16(&mut self, value: u16) -> Result<()> {
        self.push_scalar(value)
    }

    /// Append a big-endian `u32`.
    pub fn push_u32(&mut self, value: u32) -> Result<()> {
        self.push_scalar(value)
    }

    /// Append a big-endian IEEE-754 `f32`.
    pub fn push_f32(&mut self, value: f32) -> Result<()> {
        self.push_scalar(value)
    }

    /// Append raw bytes, spanning buffers as needed.
    pub fn push_string(&mut self, bytes: &[u8]) -> Result<()> {
        self.push_array(bytes)
    }

    fn link(&mut self, buffer: FixedBuffer) {
        self.bufs.push_back(buffer);
        self.mark_uncommitted(self.bufs.len() - 1);
    }

    fn mark_uncommitted(&mut self, index: usize) {
        if self.first_uncommitted.is_none() {
            self.first_uncommitted = Some(index);
        }
    }

    fn allocate(&mut self) -> Result<FixedBuffer> {
        let mut buffer = self.memory.allocate().inspect_err(|err| {
            debug!(%err, pending = self.pending, "buffer allocation failed");
        })?;
        buffer.reset();
        self.stats.buffers_allocated += 1;
        trace!(chain = self.bufs.len() + 1, "linked new buffer");
        Ok(buffer)
    }

    fn push_scalar<T: WireElement>(&mut self, value: T) -> Result<()> {
        let fitted = self.bufs.back_mut().is_some_and(|tail| tail.push(value));
        if fitted {
            self.mark_uncommitted(self.bufs.len() - 1);
        } else {
            let mut buffer = self.allocate()?;
            let accepted = buffer.push(value);
            debug_assert!(accepted, "empty buffer rejected a scalar");
            self.link(buffer);
        }
        self.pending += T::SIZE;
        Ok(())
    }

    fn push_array<T: WireElement>(&mut self, values: &[T]) -> Result<()> {
        let mut copied = self
            .bufs
            .back_mut()
            .map_or(0, |tail| tail.push_slice(values));
        if copied > 0 {
            self.mark_uncommitted(self.bufs.len() - 1);
            self.pending += copied * T::SIZE;
        }
        while copied < values.len() {
            let mut buffer = self.allocate()?;
            let accepted = buffer.push_slice(&values[copied..]);
            copied += accepted;
            self.pending += accepted * T::SIZE;
            self.link(buffer);
        }
        Ok(())
    }

    /// Write a request header.
    ///
    /// The compact form is used when both size and count fit; otherwise the
    /// extended form is used if `extended_ok`, else [`Error::OutOfBounds`] is
    /// returned and nothing is written. The header is kept contiguous within
    /// one buffer.
    #[instrument(
        level = "trace",
        skip(self, header),
        fields(request = header.request, size = header.payload_size)
    )]
    pub fn insert_request_header(
        &mut self,
        header: &RequestHeader,
        extended_ok: bool,
    ) -> Result<()> {
        let form = header.form(extended_ok).inspect_err(|err| {
            debug!(%err, request = header.request, "request header rejected");
        })?;
        let len = form.encoded_len();
        let fits = self
            .bufs
            .back()
            .is_some_and(|tail| tail.unoccupied_bytes() >= len);
        if !fits {
            let buffer = self.allocate()?;
            self.link(buffer);
        }
        if let Some(tail) = self.bufs.back_mut() {
            header.put(form, tail.data_mut());
        }
        self.mark_uncommitted(self.bufs.len() - 1);
        self.pending += len;
        self.stats.requests_encoded += 1;
        if form == HeaderForm::Extended {
            self.stats.extended_headers += 1;
        }
        Ok(())
    }

    /// Write a header followed by its payload and alignment padding.
    ///
    /// The data type, payload view and header size are all validated before
    /// any byte is written, so a rejected request leaves the queue unchanged.
    #[instrument(
        level = "trace",
        skip(self, request),
        fields(
            request = request.request,
            data_type = request.data_type,
            count = request.element_count
        )
    )]
    pub fn insert_request_with_payload(
        &mut self,
        request: &PayloadRequest<'_>,
        extended_ok: bool,
    ) -> Result<()> {
        let data_type = DbrType::try_from(request.data_type).inspect_err(|err| {
            debug!(%err, "request rejected");
        })?;
        let n_elem = request.element_count;
        request.payload.check(data_type, n_elem).inspect_err(|err| {
            debug!(%err, "request rejected");
        })?;

        let text = match request.payload {
            Payload::String(bytes) if n_elem == 1 && data_type == DbrType::STRING => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                if end + 1 > MAX_STRING_SIZE {
                    debug!(len = end + 1, "string request rejected");
                    return Err(Error::OutOfBounds {
                        field: "string length",
                        value: (end + 1) as u64,
                        max: MAX_STRING_SIZE as u64,
                    });
                }
                Some(&bytes[..end])
            }
            _ => None,
        };
        let size = text.map_or_else(
            || data_type.payload_size(n_elem),
            |text| (text.len() + 1) as u64,
        );
        let padded = align_payload(size);
        let payload_size = u32::try_from(padded).map_err(|_| Error::OutOfBounds {
            field: "payload size",
            value: padded,
            max: u64::from(u32::MAX),
        })?;

        self.insert_request_header(
            &RequestHeader {
                request: request.request,
                payload_size,
                data_type: data_type.code(),
                element_count: n_elem,
                channel_id: request.channel_id,
                request_dependent: request.request_dependent,
            },
            extended_ok,
        )?;
        match text {
            Some(text) => {
                self.push_array(text)?;
                self.push_scalar(0u8)?;
            }
            None => self.copy_payload(request.payload, n_elem as usize)?,
        }
        let pad = (padded - size) as usize;
        if pad > 0 {
            self.push_array(&NIL_BYTES[..pad])?;
        }
        Ok(())
    }

    /// Encode `n_elem` elements of `payload` as `data_type`.
    ///
    /// The view is checked against the data type before anything is written.
    pub fn push_dbr_type(
        &mut self,
        data_type: DbrType,
        payload: Payload<'_>,
        n_elem: u32,
    ) -> Result<()> {
        payload.check(data_type, n_elem).inspect_err(|err| {
            debug!(%err, %data_type, "payload rejected");
        })?;
        self.copy_payload(payload, n_elem as usize)
    }

    // Callers have already matched the view against the data type.
    fn copy_payload(&mut self, payload: Payload<'_>, n_elem: usize) -> Result<()> {
        match payload {
            Payload::String(bytes) => self.push_array(leading(bytes, n_elem * MAX_STRING_SIZE)?),
            Payload::Short(values) => self.push_array(leading(values, n_elem)?),
            Payload::Enum(values) => self.push_array(leading(values, n_elem)?),
            Payload::Float(values) => self.push_array(leading(values, n_elem)?),
            Payload::Char(bytes) => self.push_array(leading(bytes, n_elem)?),
            Payload::Long(values) => self.push_array(leading(values, n_elem)?),
            Payload::Double(values) => self.push_array(leading(values, n_elem)?),
        }
    }

    /// Detach the head buffer for transmission.
    ///
    /// Uncommitted bytes are discarded first, so only committed messages are
    /// ever handed out. Returns `None` once the chain is empty.
    pub fn pop_next_com_buf_to_send(&mut self) -> Option<FixedBuffer> {
        self.clear_uncommitted();
        let buffer = self.bufs.pop_front()?;
        self.pending -= buffer.len();
        self.stats.buffers_drained += 1;
        self.stats.bytes_drained += buffer.len() as u64;
        trace!(len = buffer.len(), pending = self.pending, "buffer drained");
        Some(buffer)
    }

    /// Hand every committed buffer to the sink, in order.
    ///
    /// Buffers the sink returns go back to the memory manager. Returns the
    /// number of bytes handed over. Any open message is discarded, as with
    /// [`Self::pop_next_com_buf_to_send`].
    pub fn flush(&mut self) -> usize {
        let mut flushed = 0;
        while let Some(buffer) = self.pop_next_com_buf_to_send() {
            flushed += buffer.len();
            if let Some(done) = self.sink.accept(buffer) {
                self.recycle(done);
            }
        }
        if flushed > 0 {
            debug!(bytes = flushed, "send queue flushed");
        }
        flushed
    }

    /// Return a transmitted buffer to the memory manager.
    ///
    /// Buffers obtained from [`Self::pop_next_com_buf_to_send`], or kept by
    /// the sink, come back through here once their bytes are on the wire.
    pub fn recycle(&mut self, buffer: FixedBuffer) {
        self.stats.buffers_recycled += 1;
        self.memory.release(buffer);
    }

    /// Counters accumulated since construction.
    #[must_use]
    pub fn stats(&self) -> SendStats {
        self.stats
    }

    /// Memory manager the queue allocates from.
    #[must_use]
    pub fn memory_manager(&self) -> &M {
        &self.memory
    }

    /// Mutable access to the memory manager.
    pub fn memory_manager_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Sink receiving flushed buffers.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<M: BufferMemoryManager, S: TransportSink> Drop for SendQueue<M, S> {
    fn drop(&mut self) {
        self.clear();
    }
}

fn leading<T>(values: &[T], count: usize) -> Result<&[T]> {
    values.get(..count).ok_or(Error::PayloadTooShort {
        needed: count,
        got: values.len(),
    })
}
