//! Bus driver contract
//!
//! The bus driver performs the actual hardware access. It is implemented
//! outside this crate and drives the composer through its callbacks
//! (`Composer::build_device_descriptor`, `Composer::control_xfer`,
//! `Composer::xfer_complete`, ...). In the other direction the composer
//! asks it to queue transfers and change stall state through this trait.
//!
//! All methods take `&self`: hardware drivers keep their own interior
//! state, and calls may arrive from inside the driver's own callbacks.

use crate::control::ControlRequest;
use crate::descriptor::DEVICE_LEN;
use crate::types::EndpointAddress;

/// Data for a non-control transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transfer<'d> {
    /// Device to host: the driver copies these bytes into endpoint memory
    Send(&'d [u8]),
    /// Host to device: receive at most this many bytes into endpoint memory
    Receive(usize),
}

impl Transfer<'_> {
    /// Requested transfer length in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Send(bytes) => bytes.len(),
            Self::Receive(len) => *len,
        }
    }

    /// True for zero-length transfers
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for device-to-host transfers
    #[must_use]
    pub const fn is_in(&self) -> bool {
        matches!(self, Self::Send(_))
    }
}

/// Data stage of a control transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlData<'d> {
    /// Send these bytes to the host
    In(&'d [u8]),
    /// Receive exactly this many bytes from the host
    Out(usize),
}

/// Descriptors and counts built into the bus driver
///
/// These describe interfaces the driver implements itself (for example a
/// firmware console) which sit in front of the composed functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticDescriptors {
    /// Baseline device descriptor
    pub device: [u8; DEVICE_LEN],
    /// Baseline configuration block: 9-byte header plus built-in interfaces
    pub configuration: &'static [u8],
    /// Number of built-in interfaces
    pub interfaces: u8,
    /// First endpoint number not used by built-in interfaces
    pub endpoints: u8,
    /// First string index not used by built-in strings
    pub strings: u8,
}

/// Operations the composer needs from the bus driver
pub trait BusDriver {
    /// Built-in descriptors and counts
    fn static_descriptors(&self) -> &StaticDescriptors;

    /// Queue a transfer on `ep`; false if the hardware rejected it
    ///
    /// The driver may report completion synchronously from inside this call.
    fn submit_xfer(&self, ep: EndpointAddress, transfer: Transfer<'_>) -> bool;

    /// Queue the data stage of the control transfer described by `request`
    fn control_xfer(&self, request: &ControlRequest, data: ControlData<'_>) -> bool;

    /// Set or clear the STALL condition of an endpoint
    fn set_ep_stall(&self, ep: EndpointAddress, stall: bool);

    /// Current STALL condition of an endpoint
    fn get_ep_stall(&self, ep: EndpointAddress) -> bool;

    /// Disconnect and reconnect so the host enumerates again
    fn reenumerate(&self);
}
