//! Control transfer requests
//!
//! Decoding of the 8-byte SETUP packet (USB 2.0 section 9.3) and the
//! outcome a function handler returns for each stage of a control
//! transfer.

use crate::types::Direction;

/// Control transfer stage
///
/// The bus driver owns the transitions IDLE -> SETUP -> DATA -> ACK -> IDLE
/// and invokes the composer once per stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    /// No transfer in progress
    #[default]
    Idle,
    /// SETUP packet received
    Setup,
    /// Data stage finished
    Data,
    /// Status stage acknowledged
    Ack,
}

impl Stage {
    /// Decode the bus driver's numeric stage code
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Setup,
            2 => Self::Data,
            3 => Self::Ack,
            _ => Self::Idle,
        }
    }
}

/// Request recipient (`bmRequestType` bits 0-4)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recipient {
    /// Device
    Device,
    /// Interface
    Interface,
    /// Endpoint
    Endpoint,
    /// Other
    Other,
    /// Reserved values 4..=31
    Reserved(u8),
}

/// Request type (`bmRequestType` bits 5-6)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestType {
    /// Standard request
    Standard,
    /// Class-specific request
    Class,
    /// Vendor-specific request
    Vendor,
    /// Reserved
    Reserved,
}

/// Standard `bRequest` codes
pub mod request {
    /// GET_STATUS
    pub const GET_STATUS: u8 = 0x00;
    /// CLEAR_FEATURE
    pub const CLEAR_FEATURE: u8 = 0x01;
    /// SET_FEATURE
    pub const SET_FEATURE: u8 = 0x03;
    /// SET_ADDRESS
    pub const SET_ADDRESS: u8 = 0x05;
    /// GET_DESCRIPTOR
    pub const GET_DESCRIPTOR: u8 = 0x06;
    /// SET_DESCRIPTOR
    pub const SET_DESCRIPTOR: u8 = 0x07;
    /// GET_CONFIGURATION
    pub const GET_CONFIGURATION: u8 = 0x08;
    /// SET_CONFIGURATION
    pub const SET_CONFIGURATION: u8 = 0x09;
    /// GET_INTERFACE
    pub const GET_INTERFACE: u8 = 0x0A;
    /// SET_INTERFACE
    pub const SET_INTERFACE: u8 = 0x0B;
}

/// Split a raw `bmRequestType` into (recipient, type, direction) fields
#[must_use]
pub const fn split_request_type(bm_request_type: u8) -> (u8, u8, u8) {
    (
        bm_request_type & 0x1F,
        (bm_request_type >> 5) & 0x03,
        (bm_request_type >> 7) & 0x01,
    )
}

/// Decoded SETUP packet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlRequest {
    /// Raw `bmRequestType`
    pub request_type: u8,
    /// `bRequest`
    pub request: u8,
    /// `wValue`
    pub value: u16,
    /// `wIndex`
    pub index: u16,
    /// `wLength`
    pub length: u16,
}

impl ControlRequest {
    /// SETUP packet length
    pub const LEN: usize = 8;

    /// Decode the 8-byte SETUP packet
    #[must_use]
    pub const fn parse(raw: &[u8; Self::LEN]) -> Self {
        Self {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    /// Encode back to the 8-byte wire layout
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; Self::LEN] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    /// Request recipient
    #[must_use]
    pub const fn recipient(&self) -> Recipient {
        match self.request_type & 0x1F {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            n => Recipient::Reserved(n),
        }
    }

    /// Request type
    #[must_use]
    pub const fn kind(&self) -> RequestType {
        match (self.request_type >> 5) & 0x03 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }

    /// Data stage direction
    #[must_use]
    pub const fn direction(&self) -> Direction {
        Direction::from_bit7(self.request_type)
    }

    /// Interface number or endpoint address carried in the low byte of `wIndex`
    #[must_use]
    pub const fn index_low(&self) -> u8 {
        (self.index & 0xFF) as u8
    }

    /// High byte of `wValue` (descriptor type for GET_DESCRIPTOR)
    #[must_use]
    pub const fn value_high(&self) -> u8 {
        (self.value >> 8) as u8
    }
}

/// Handler outcome for one control transfer stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlResponse {
    /// Continue with no data
    Accept,
    /// Reject the request; the bus driver answers with a protocol STALL
    Stall,
    /// Continue with a data stage of exactly this many bytes of the control buffer
    ///
    /// For IN requests the handler has written the payload at the start of
    /// the buffer. For OUT requests the host's bytes land there and are
    /// handed back at the DATA stage.
    Data(usize),
}

impl From<bool> for ControlResponse {
    fn from(accept: bool) -> Self {
        if accept {
            Self::Accept
        } else {
            Self::Stall
        }
    }
}
