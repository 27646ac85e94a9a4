//! Request codes

use std::fmt;

/// Request (command) codes carried in the first header field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RequestCode {
    /// Protocol version announcement
    Version = 0,
    /// Subscribe to value changes
    EventAdd = 1,
    /// Cancel a subscription
    EventCancel = 2,
    /// Write without completion notification
    Write = 4,
    /// Channel name resolution
    Search = 6,
    /// Suspend subscription updates
    EventsOff = 8,
    /// Resume subscription updates
    EventsOn = 9,
    /// Read barrier
    ReadSync = 10,
    /// Release a channel
    ClearChannel = 12,
    /// Read with completion notification
    ReadNotify = 15,
    /// Create a channel
    CreateChannel = 18,
    /// Write with completion notification
    WriteNotify = 19,
    /// Client user name
    ClientName = 20,
    /// Client host name
    HostName = 21,
    /// Liveness probe
    Echo = 23,
}

impl RequestCode {
    /// Convert from the wire value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Version),
            1 => Some(Self::EventAdd),
            2 => Some(Self::EventCancel),
            4 => Some(Self::Write),
            6 => Some(Self::Search),
            8 => Some(Self::EventsOff),
            9 => Some(Self::EventsOn),
            10 => Some(Self::ReadSync),
            12 => Some(Self::ClearChannel),
            15 => Some(Self::ReadNotify),
            18 => Some(Self::CreateChannel),
            19 => Some(Self::WriteNotify),
            20 => Some(Self::ClientName),
            21 => Some(Self::HostName),
            23 => Some(Self::Echo),
            _ => None,
        }
    }

    /// Convert to the wire value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

impl From<RequestCode> for u16 {
    fn from(code: RequestCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Version => "Version",
            Self::EventAdd => "EventAdd",
            Self::EventCancel => "EventCancel",
            Self::Write => "Write",
            Self::Search => "Search",
            Self::EventsOff => "EventsOff",
            Self::EventsOn => "EventsOn",
            Self::ReadSync => "ReadSync",
            Self::ClearChannel => "ClearChannel",
            Self::ReadNotify => "ReadNotify",
            Self::CreateChannel => "CreateChannel",
            Self::WriteNotify => "WriteNotify",
            Self::ClientName => "ClientName",
            Self::HostName => "HostName",
            Self::Echo => "Echo",
        };
        write!(f, "{name}")
    }
}
