//! comque - outbound request serializer for a process-control client/server protocol
//!
//! This library turns typed protocol requests into the exact byte stream a
//! transport places on the wire. Requests are serialized into a chain of
//! fixed-capacity buffers; the chain is drained in order and handed to the
//! transport.
//!
//! # Quick Start
//!
//! ```rust
//! use comque::{
//!     BufferPool, CollectingSink, DbrType, Payload, PayloadRequest, RequestCode, SendQueue,
//! };
//!
//! let mut queue = SendQueue::new(BufferPool::default(), CollectingSink::new());
//!
//! // Compose one message; nothing becomes flushable until it is committed.
//! queue.begin_msg();
//! queue.insert_request_with_payload(
//!     &PayloadRequest {
//!         request: RequestCode::Write.as_u16(),
//!         data_type: u32::from(DbrType::DOUBLE.code()),
//!         element_count: 2,
//!         channel_id: 42,
//!         request_dependent: 0,
//!         payload: Payload::Double(&[1.5, 2.5]),
//!     },
//!     false,
//! )?;
//! queue.commit_msg();
//!
//! assert_eq!(queue.occupied_bytes(), 16 + 16);
//! if queue.flush_early_threshold(0) {
//!     // plenty queued; a real client would wake its send thread here
//! }
//! queue.flush();
//! assert_eq!(queue.sink().bytes().len(), 32);
//! # Ok::<(), comque::Error>(())
//! ```
//!
//! # Features
//!
//! - **Chunked buffer chain** - arrays and strings split across buffers at element boundaries
//! - **Transactional messages** - uncommitted bytes roll back at buffer granularity
//! - **Typed payload dispatch** - data-type codes validated before any byte is written
//! - **Flush thresholds** - advisory and mandatory byte-count predicates

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod protocol;
pub mod transport;

pub use protocol::{
    DbrType, Error, HeaderForm, Payload, RequestCode, RequestHeader, Result, SendStats,
    dbr_type_ok,
};
pub use transport::{
    BufferMemoryManager, BufferPool, CollectingSink, FixedBuffer, PayloadRequest, PoolConfig,
    SendQueue, TransportSink,
};

/// Protocol minor version this serializer targets
pub const PROTOCOL_MINOR_VERSION: u16 = 13;
