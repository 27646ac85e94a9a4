//! Payload data-type codes and the copy dispatch table
//!
//! Every request that carries data names a small integer data-type code. The
//! code selects which native element type the payload holds and therefore how
//! it is encoded. Only the plain value types (and a few aliases of them) are
//! ever written by a client; the compound status/time/graphic/control codes
//! are in range but have no copy routine and are rejected.

use std::fmt;

use super::MAX_STRING_SIZE;

/// Number of entries in the dispatch table.
pub const DBR_TABLE_SIZE: usize = 39;

/// Native element type a data-type code encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Fixed 40-byte, NUL padded strings
    String,
    /// 16-bit integers (also used for enums and alarm acknowledgements)
    Short,
    /// IEEE-754 single precision
    Float,
    /// Raw bytes
    Char,
    /// 32-bit integers
    Long,
    /// IEEE-754 double precision
    Double,
}

impl ElementKind {
    /// Encoded size of a single element in bytes.
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            Self::String => MAX_STRING_SIZE,
            Self::Short => 2,
            Self::Float | Self::Long => 4,
            Self::Char => 1,
            Self::Double => 8,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Short => "short",
            Self::Float => "float",
            Self::Char => "char",
            Self::Long => "long",
            Self::Double => "double",
        };
        write!(f, "{name}")
    }
}

// Index = data-type code. `None` marks codes that are in range but cannot be
// written by the send side.
static DBR_COPY_TABLE: [Option<ElementKind>; DBR_TABLE_SIZE] = {
    let mut table = [None; DBR_TABLE_SIZE];
    table[DbrType::STRING.0 as usize] = Some(ElementKind::String);
    table[DbrType::SHORT.0 as usize] = Some(ElementKind::Short);
    table[DbrType::FLOAT.0 as usize] = Some(ElementKind::Float);
    table[DbrType::ENUM.0 as usize] = Some(ElementKind::Short);
    table[DbrType::CHAR.0 as usize] = Some(ElementKind::Char);
    table[DbrType::LONG.0 as usize] = Some(ElementKind::Long);
    table[DbrType::DOUBLE.0 as usize] = Some(ElementKind::Double);
    table[DbrType::PUT_ACKT.0 as usize] = Some(ElementKind::Short);
    table[DbrType::PUT_ACKS.0 as usize] = Some(ElementKind::Short);
    table[DbrType::CLASS_NAME.0 as usize] = Some(ElementKind::String);
    table
};

/// Check whether `code` is in range and has a copy routine.
///
/// Must be consulted (directly or through [`DbrType::new`]) before any
/// payload is dispatched.
#[must_use]
pub fn dbr_type_ok(code: u32) -> bool {
    usize::try_from(code)
        .ok()
        .and_then(|index| DBR_COPY_TABLE.get(index))
        .is_some_and(Option::is_some)
}

/// A data-type code that has passed [`dbr_type_ok`].
///
/// The only way to obtain one is through [`DbrType::new`] or the associated
/// constants, so holding a `DbrType` is proof the dispatch table has an entry
/// for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbrType(u16);

impl DbrType {
    /// Fixed-width string
    pub const STRING: Self = Self(0);
    /// 16-bit integer
    pub const SHORT: Self = Self(1);
    /// Single precision float
    pub const FLOAT: Self = Self(2);
    /// Enumerated value index
    pub const ENUM: Self = Self(3);
    /// Byte
    pub const CHAR: Self = Self(4);
    /// 32-bit integer
    pub const LONG: Self = Self(5);
    /// Double precision float
    pub const DOUBLE: Self = Self(6);
    /// Alarm acknowledge transient flag
    pub const PUT_ACKT: Self = Self(35);
    /// Alarm acknowledge severity
    pub const PUT_ACKS: Self = Self(36);
    /// Record class name
    pub const CLASS_NAME: Self = Self(38);

    /// Validate a raw code.
    #[must_use]
    pub fn new(code: u32) -> Option<Self> {
        if dbr_type_ok(code) {
            u16::try_from(code).ok().map(Self)
        } else {
            None
        }
    }

    /// Raw wire code
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Element kind this code encodes.
    #[must_use]
    pub fn kind(self) -> ElementKind {
        // Construction guarantees the entry exists.
        DBR_COPY_TABLE
            .get(usize::from(self.0))
            .copied()
            .flatten()
            .unwrap_or(ElementKind::String)
    }

    /// Encoded size of one element.
    #[must_use]
    pub fn element_size(self) -> usize {
        self.kind().element_size()
    }

    /// Encoded size of `n_elem` elements, before alignment padding.
    #[must_use]
    pub fn payload_size(self, n_elem: u32) -> u64 {
        u64::from(n_elem) * self.element_size() as u64
    }
}

impl TryFrom<u32> for DbrType {
    type Error = super::Error;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::new(code).ok_or(super::Error::BadType { code })
    }
}

impl fmt::Display for DbrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::STRING => "DBR_STRING",
            Self::SHORT => "DBR_SHORT",
            Self::FLOAT => "DBR_FLOAT",
            Self::ENUM => "DBR_ENUM",
            Self::CHAR => "DBR_CHAR",
            Self::LONG => "DBR_LONG",
            Self::DOUBLE => "DBR_DOUBLE",
            Self::PUT_ACKT => "DBR_PUT_ACKT",
            Self::PUT_ACKS => "DBR_PUT_ACKS",
            Self::CLASS_NAME => "DBR_CLASS_NAME",
            _ => return write!(f, "DBR({})", self.0),
        };
        write!(f, "{name}")
    }
}

/// Borrowed, typed view of the values a request carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    /// Strings packed in consecutive 40-byte slots. A single-element request
    /// sends only the text up to the first NUL.
    String(&'a [u8]),
    /// 16-bit signed integers
    Short(&'a [i16]),
    /// 16-bit unsigned values (enum indices, acknowledgement codes)
    Enum(&'a [u16]),
    /// Single precision floats
    Float(&'a [f32]),
    /// Raw bytes
    Char(&'a [u8]),
    /// 32-bit signed integers
    Long(&'a [i32]),
    /// Double precision floats
    Double(&'a [f64]),
}

impl Payload<'_> {
    /// Element kind held by this view.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::String(_) => ElementKind::String,
            Self::Short(_) | Self::Enum(_) => ElementKind::Short,
            Self::Float(_) => ElementKind::Float,
            Self::Char(_) => ElementKind::Char,
            Self::Long(_) => ElementKind::Long,
            Self::Double(_) => ElementKind::Double,
        }
    }

    /// Number of whole elements available.
    #[must_use]
    pub const fn element_count(&self) -> usize {
        match self {
            Self::String(bytes) => bytes.len() / MAX_STRING_SIZE,
            Self::Short(values) => values.len(),
            Self::Enum(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::Char(bytes) => bytes.len(),
            Self::Long(values) => values.len(),
            Self::Double(values) => values.len(),
        }
    }

    /// Check that this view can supply `n_elem` elements of `data_type`.
    pub fn check(&self, data_type: DbrType, n_elem: u32) -> super::Result<()> {
        let kind = data_type.kind();
        if self.kind() != kind {
            return Err(super::Error::PayloadMismatch { data_type, kind });
        }
        let needed = n_elem as usize;
        let got = match self {
            // A lone DBR_STRING may be shorter than a full slot.
            Self::String(bytes) if needed == 1 && data_type == DbrType::STRING => {
                usize::from(!bytes.is_empty())
            }
            _ => self.element_count(),
        };
        if got < needed {
            return Err(super::Error::PayloadTooShort { needed, got });
        }
        Ok(())
    }
}
