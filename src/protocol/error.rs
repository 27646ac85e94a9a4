//! Send-queue error types

use thiserror::Error;

use super::dbr::{DbrType, ElementKind};

/// Errors reported while composing outbound requests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The memory manager could not supply another buffer
    #[error("buffer allocation failed: {outstanding} buffers outstanding (limit {limit})")]
    AllocationFailed {
        /// Buffers currently handed out by the memory manager
        outstanding: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// A header or payload field exceeds what the selected wire form can carry
    #[error("{field} out of bounds: {value} (max {max})")]
    OutOfBounds {
        /// Name of the offending field
        field: &'static str,
        /// Requested value
        value: u64,
        /// Largest representable value
        max: u64,
    },

    /// Data-type code is outside the dispatch table or has no copy routine
    #[error("bad data type code: {code}")]
    BadType {
        /// Rejected code
        code: u32,
    },

    /// Payload view does not hold the element type the data type encodes
    #[error("payload does not match {data_type}: expected {kind} elements")]
    PayloadMismatch {
        /// Requested data type
        data_type: DbrType,
        /// Element kind the data type requires
        kind: ElementKind,
    },

    /// Payload view holds fewer elements than requested
    #[error("payload too short: need {needed} elements, got {got}")]
    PayloadTooShort {
        /// Requested element count
        needed: usize,
        /// Elements available in the view
        got: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
