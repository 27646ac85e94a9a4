//! Wire format for outbound requests
//!
//! This module provides the request header layout, request codes, payload
//! data-type table and the error type shared by the send queue.

mod dbr;
mod error;
mod header;
mod stats;
mod types;

pub use dbr::{DBR_TABLE_SIZE, DbrType, ElementKind, Payload, dbr_type_ok};
pub use error::{Error, Result};
pub use header::{HeaderForm, RequestHeader};
pub use stats::SendStats;
pub use types::RequestCode;

/// Compact header size in bytes
pub const COMPACT_HEADER_SIZE: usize = 16;

/// Extended header size in bytes (compact header plus two 32-bit fields)
pub const EXTENDED_HEADER_SIZE: usize = COMPACT_HEADER_SIZE + 8;

/// Payload size written into the compact header when the extended fields follow
pub const EXTENDED_SIZE_SENTINEL: u16 = 0xFFFF;

/// Element count written into the compact header when the extended fields follow
pub const EXTENDED_COUNT_SENTINEL: u16 = 0;

/// Compact header fields must stay strictly below this value
pub const COMPACT_FIELD_LIMIT: u32 = 0xFFFF;

/// Payloads are zero-padded to a multiple of this many bytes
pub const PAYLOAD_ALIGNMENT: usize = 8;

/// Size of one fixed-width string element, terminator included
pub const MAX_STRING_SIZE: usize = 40;

/// Round `size` up to the next multiple of [`PAYLOAD_ALIGNMENT`].
#[must_use]
pub const fn align_payload(size: u64) -> u64 {
    let align = PAYLOAD_ALIGNMENT as u64;
    (size + (align - 1)) & !(align - 1)
}
