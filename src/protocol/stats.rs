//! Per-queue send statistics

/// Snapshot of counters kept by a send queue.
///
/// The queue has a single owner, so counters are plain integers rather than
/// atomics; callers copy the snapshot out through `SendQueue::stats`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SendStats {
    /// Messages made permanent by `commit_msg`
    pub messages_committed: u64,
    /// Messages whose uncommitted bytes were discarded
    pub messages_rolled_back: u64,
    /// Bytes discarded by rollback
    pub bytes_rolled_back: u64,
    /// Request headers written
    pub requests_encoded: u64,
    /// Of those, headers written in the extended form
    pub extended_headers: u64,
    /// Buffers obtained from the memory manager
    pub buffers_allocated: u64,
    /// Buffers popped for transmission
    pub buffers_drained: u64,
    /// Bytes popped for transmission
    pub bytes_drained: u64,
    /// Transmitted buffers handed back to the memory manager
    pub buffers_recycled: u64,
}

impl SendStats {
    /// Average number of bytes per drained buffer.
    #[must_use]
    pub fn avg_drained_buffer_bytes(&self) -> Option<u64> {
        if self.buffers_drained == 0 {
            return None;
        }
        Some(self.bytes_drained / self.buffers_drained)
    }
}
