//! Shared types used across the stack
//!
//! Domain types that enforce USB addressing invariants at construction
//! time so the rest of the crate never has to re-check them.

use core::fmt;

/// Data direction, from the host's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Host to device
    Out,
    /// Device to host
    In,
}

impl Direction {
    /// Decode from the direction bit (bit 7) of an address or `bmRequestType`
    #[must_use]
    pub const fn from_bit7(raw: u8) -> Self {
        if raw & EndpointAddress::IN_FLAG == 0 {
            Self::Out
        } else {
            Self::In
        }
    }
}

/// Endpoint address: 4-bit endpoint number plus direction bit
///
/// IN and OUT endpoints share a number but are different endpoints.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointAddress(u8);

impl EndpointAddress {
    /// Direction flag in `bEndpointAddress`
    pub const IN_FLAG: u8 = 0x80;

    /// Highest endpoint number allowed by USB 2.0
    pub const MAX_NUMBER: u8 = 15;

    /// Number of distinct addresses (16 numbers x 2 directions)
    pub const COUNT: usize = 32;

    /// Control endpoint, OUT half
    pub const CONTROL_OUT: Self = Self(0x00);

    /// Control endpoint, IN half
    pub const CONTROL_IN: Self = Self(0x80);

    /// Create from endpoint number and direction, returns None if the number is out of range
    #[must_use]
    pub const fn new(number: u8, direction: Direction) -> Option<Self> {
        if number > Self::MAX_NUMBER {
            return None;
        }
        match direction {
            Direction::Out => Some(Self(number)),
            Direction::In => Some(Self(number | Self::IN_FLAG)),
        }
    }

    /// Decode a raw `bEndpointAddress` byte, rejecting reserved bits
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        if raw & 0x70 != 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Raw `bEndpointAddress` value
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Endpoint number with the direction bit stripped
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0 & !Self::IN_FLAG
    }

    /// Transfer direction of this endpoint
    #[must_use]
    pub const fn direction(self) -> Direction {
        Direction::from_bit7(self.0)
    }

    /// True for device-to-host endpoints
    #[must_use]
    pub const fn is_in(self) -> bool {
        self.0 & Self::IN_FLAG != 0
    }

    /// Dense slot index in `0..COUNT` (OUT endpoints first, then IN)
    #[must_use]
    pub const fn index(self) -> usize {
        let dir = if self.is_in() { 16 } else { 0 };
        self.number() as usize + dir
    }
}

impl fmt::Debug for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.is_in() { "IN" } else { "OUT" };
        write!(f, "EP{} {}", self.number(), dir)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EndpointAddress {
    fn format(&self, f: defmt::Formatter) {
        if self.is_in() {
            defmt::write!(f, "EP{} IN", self.number());
        } else {
            defmt::write!(f, "EP{} OUT", self.number());
        }
    }
}

/// Endpoint transfer type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointType {
    /// Control endpoint
    Control,
    /// Isochronous endpoint
    Isochronous,
    /// Bulk endpoint
    Bulk,
    /// Interrupt endpoint
    Interrupt,
}

impl EndpointType {
    /// Encoding for the `bmAttributes` field of an endpoint descriptor
    #[must_use]
    pub const fn attributes(self) -> u8 {
        match self {
            Self::Control => 0,
            Self::Isochronous => 1,
            Self::Bulk => 2,
            Self::Interrupt => 3,
        }
    }
}

/// Outcome of a data transfer as reported by the bus driver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferResult {
    /// Transfer completed normally
    #[default]
    Success,
    /// Transfer failed at the bus level
    Failed,
    /// Endpoint was stalled
    Stalled,
    /// Bus-level timeout
    Timeout,
    /// Invalid transfer
    Invalid,
}

impl TransferResult {
    /// Decode the bus driver's numeric result code
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Success,
            1 => Self::Failed,
            2 => Self::Stalled,
            3 => Self::Timeout,
            _ => Self::Invalid,
        }
    }

    /// True if the transfer completed normally
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}
