//! Outbound buffer chain and its collaborators

mod buffer;
mod queue;
mod sink;

pub use buffer::{
    BufferMemoryManager, BufferPool, COMBUF_CAPACITY, FixedBuffer, PoolConfig, WireElement,
};
pub use queue::{BLOCK_FLUSH_BUFFERS, EARLY_FLUSH_BUFFERS, PayloadRequest, SendQueue};
pub use sink::{CollectingSink, TransportSink};
