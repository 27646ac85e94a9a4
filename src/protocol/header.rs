//! Request header
//!
//! Every request starts with a 16-byte compact header. Requests whose payload
//! size or element count do not fit the 16-bit compact fields use the extended
//! form, which marks the compact fields with sentinels and appends the real
//! values as 32-bit words.

use bytes::BufMut;

use super::{
    COMPACT_FIELD_LIMIT, COMPACT_HEADER_SIZE, EXTENDED_COUNT_SENTINEL, EXTENDED_HEADER_SIZE,
    EXTENDED_SIZE_SENTINEL, Error, Result,
};

/// Request header fields (host representation)
///
/// # Wire Format
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Request (2)           |       Payload Size (2)        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |        Data Type (2)          |      Element Count (2)        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Channel Id (4)                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                   Request Dependent (4)                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |              Extended Payload Size (4, optional)              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |             Extended Element Count (4, optional)              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// All fields are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestHeader {
    /// Request (command) code
    pub request: u16,
    /// Payload size in bytes, alignment padding included
    pub payload_size: u32,
    /// Payload data-type code
    pub data_type: u16,
    /// Element count
    pub element_count: u32,
    /// Channel identifier
    pub channel_id: u32,
    /// Request-dependent word
    pub request_dependent: u32,
}

/// Which wire layout a header uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderForm {
    /// 16-byte header with 16-bit size and count
    Compact,
    /// 24-byte header with 32-bit size and count
    Extended,
}

impl HeaderForm {
    /// Encoded size of this form.
    #[must_use]
    pub const fn encoded_len(self) -> usize {
        match self {
            Self::Compact => COMPACT_HEADER_SIZE,
            Self::Extended => EXTENDED_HEADER_SIZE,
        }
    }
}

impl RequestHeader {
    /// Check whether both size and count fit the compact fields.
    #[must_use]
    pub const fn fits_compact(&self) -> bool {
        self.payload_size < COMPACT_FIELD_LIMIT && self.element_count < COMPACT_FIELD_LIMIT
    }

    /// Select the wire form.
    ///
    /// Fails with [`Error::OutOfBounds`] when the compact form is too small
    /// and the peer does not accept extended headers.
    pub fn form(&self, extended_ok: bool) -> Result<HeaderForm> {
        if self.fits_compact() {
            return Ok(HeaderForm::Compact);
        }
        if extended_ok {
            return Ok(HeaderForm::Extended);
        }
        Err(if self.payload_size >= COMPACT_FIELD_LIMIT {
            Error::OutOfBounds {
                field: "payload size",
                value: u64::from(self.payload_size),
                max: u64::from(COMPACT_FIELD_LIMIT - 1),
            }
        } else {
            Error::OutOfBounds {
                field: "element count",
                value: u64::from(self.element_count),
                max: u64::from(COMPACT_FIELD_LIMIT - 1),
            }
        })
    }

    /// Write the header in the given form.
    ///
    /// `dst` must have room for [`HeaderForm::encoded_len`] bytes.
    pub fn put<B: BufMut>(&self, form: HeaderForm, dst: &mut B) {
        // Callers select the form through `form()`, which guarantees the
        // compact fields fit when the compact form is chosen.
        let (size, count) = match form {
            HeaderForm::Compact => (self.payload_size as u16, self.element_count as u16),
            HeaderForm::Extended => (EXTENDED_SIZE_SENTINEL, EXTENDED_COUNT_SENTINEL),
        };
        dst.put_u16(self.request);
        dst.put_u16(size);
        dst.put_u16(self.data_type);
        dst.put_u16(count);
        dst.put_u32(self.channel_id);
        dst.put_u32(self.request_dependent);
        if form == HeaderForm::Extended {
            dst.put_u32(self.payload_size);
            dst.put_u32(self.element_count);
        }
    }

    /// Encode to a standalone byte vector.
    pub fn to_bytes(&self, extended_ok: bool) -> Result<Vec<u8>> {
        let form = self.form(extended_ok)?;
        let mut bytes = Vec::with_capacity(form.encoded_len());
        self.put(form, &mut bytes);
        Ok(bytes)
    }
}
