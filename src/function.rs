//! Function Interface contract
//!
//! A *function* is one logical USB interface (CDC data, HID, MIDI, a vendor
//! pipe, ...). The composer knows functions only through the [`Function`]
//! trait object; every method has a safe default so a minimal function
//! only has to describe its class codes.

use core::cell::Cell;

use heapless::Vec;

use crate::bus::Transfer;
use crate::config::{MAX_ENDPOINTS_PER_FUNCTION, MAX_STRINGS};
use crate::control::{ControlRequest, ControlResponse, Stage};
use crate::descriptor::DescriptorWriter;
use crate::device::Composer;
use crate::error::{Error, Result};
use crate::transfer::{Completion, OnComplete};
use crate::types::EndpointAddress;

/// Endpoint addresses claimed by one function during a descriptor build
pub type EndpointList = Vec<EndpointAddress, MAX_ENDPOINTS_PER_FUNCTION>;

/// Class codes, optional name and open state of a function
#[derive(Debug)]
pub struct InterfaceInfo {
    /// `bInterfaceClass`
    pub class: u8,
    /// `bInterfaceSubClass`
    pub subclass: u8,
    /// `bInterfaceProtocol`
    pub protocol: u8,
    /// Human-readable interface name
    pub interface_str: Option<&'static str>,
    open: Cell<bool>,
}

impl InterfaceInfo {
    /// Closed interface with the given class codes and no name
    #[must_use]
    pub const fn new(class: u8, subclass: u8, protocol: u8) -> Self {
        Self {
            class,
            subclass,
            protocol,
            interface_str: None,
            open: Cell::new(false),
        }
    }

    /// Vendor-specific interface (no host class driver binds to it)
    #[must_use]
    pub const fn vendor() -> Self {
        Self::new(
            crate::config::VENDOR_CLASS,
            crate::config::VENDOR_SUBCLASS,
            crate::config::VENDOR_PROTOCOL,
        )
    }

    /// Attach an interface name
    #[must_use]
    pub const fn with_string(self, name: &'static str) -> Self {
        Self {
            interface_str: Some(name),
            ..self
        }
    }

    /// True between open and the next reset
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Set the open state
    pub fn set_open(&self, open: bool) {
        self.open.set(open);
    }
}

/// Collects strings referenced by descriptors during a build
///
/// Each pushed string is assigned the next string index; that index is
/// what the descriptor must carry.
pub struct StringRefs<'t> {
    table: &'t mut Vec<&'static str, MAX_STRINGS>,
    base: u8,
}

impl<'t> StringRefs<'t> {
    pub(crate) fn new(table: &'t mut Vec<&'static str, MAX_STRINGS>, base: u8) -> Self {
        Self { table, base }
    }

    /// Register `s` and return its string descriptor index
    pub fn push(&mut self, s: &'static str) -> Result<u8> {
        let index = self.next_index();
        self.table.push(s).map_err(|_| Error::BufferOverflow)?;
        Ok(index)
    }

    /// Index the next pushed string will get
    #[must_use]
    pub fn next_index(&self) -> u8 {
        // Table length is bounded by MAX_STRINGS
        #[allow(clippy::cast_possible_truncation)]
        let len = self.table.len() as u8;
        self.base.saturating_add(len)
    }
}

/// Capability set of a composable USB function
///
/// All methods take `&self`; implementations keep their state in cells so
/// the same function can be reached from task code and from bus callbacks.
pub trait Function {
    /// Class codes, name and open flag
    fn info(&self) -> &InterfaceInfo;

    /// Write this function's endpoint descriptors
    ///
    /// `first_endpoint` is the lowest endpoint number the function may use.
    /// Every address written must also be pushed to `endpoints`; numbers
    /// below `first_endpoint` or addresses already used by another function
    /// are a programming error and abort the build.
    ///
    /// Called before [`write_interface_descriptor`](Self::write_interface_descriptor)
    /// so the endpoint count is known.
    #[allow(unused_variables)]
    fn write_endpoint_descriptors(
        &self,
        out: &mut DescriptorWriter<'_>,
        strings: &mut StringRefs<'_>,
        first_endpoint: u8,
        endpoints: &mut EndpointList,
    ) -> Result<()> {
        Ok(())
    }

    /// Write this function's interface descriptor
    fn write_interface_descriptor(
        &self,
        out: &mut DescriptorWriter<'_>,
        strings: &mut StringRefs<'_>,
        interface: u8,
        num_endpoints: u8,
    ) -> Result<()> {
        let info = self.info();
        let i_interface = match info.interface_str {
            Some(name) => strings.push(name)?,
            None => 0,
        };
        out.interface(
            interface,
            num_endpoints,
            info.class,
            info.subclass,
            info.protocol,
            i_interface,
        )
    }

    /// Host selected a configuration containing this function
    fn on_open(&self) {
        self.info().set_open(true);
    }

    /// Bus reset; pending transfers are already forgotten
    fn on_reset(&self) {
        self.info().set_open(false);
    }

    /// Device-recipient control request routed here
    #[allow(unused_variables)]
    fn control_device(
        &self,
        usb: &Composer<'_>,
        stage: Stage,
        request: &ControlRequest,
        buf: &mut [u8],
    ) -> ControlResponse {
        ControlResponse::Stall
    }

    /// Interface-recipient control request routed here
    #[allow(unused_variables)]
    fn control_interface(
        &self,
        usb: &Composer<'_>,
        stage: Stage,
        request: &ControlRequest,
        buf: &mut [u8],
    ) -> ControlResponse {
        ControlResponse::Stall
    }

    /// Endpoint-recipient control request for one of this function's endpoints
    #[allow(unused_variables)]
    fn control_endpoint(
        &self,
        usb: &Composer<'_>,
        stage: Stage,
        request: &ControlRequest,
        buf: &mut [u8],
    ) -> ControlResponse {
        ControlResponse::Stall
    }

    /// A transfer submitted with [`OnComplete::Notify`] finished
    ///
    /// The endpoint is already free; submitting again from here is allowed.
    #[allow(unused_variables)]
    fn on_transfer_complete(&self, usb: &Composer<'_>, done: Completion<'_>) {}

    /// True between open and the next reset
    fn is_open(&self) -> bool {
        self.info().is_open()
    }

    /// Submit a transfer on one of this function's endpoints
    fn submit(
        &self,
        usb: &Composer<'_>,
        ep: EndpointAddress,
        transfer: Transfer<'_>,
        on_complete: OnComplete,
    ) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        usb.submit(ep, transfer, on_complete)
    }

    /// Check for a pending transfer on `ep`
    fn is_pending(&self, usb: &Composer<'_>, ep: EndpointAddress) -> Result<bool> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        Ok(usb.is_pending(ep))
    }

    /// Set or clear STALL on `ep`
    fn set_stall(&self, usb: &Composer<'_>, ep: EndpointAddress, stall: bool) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        usb.set_stall(ep, stall)
    }

    /// Current STALL state of `ep`
    fn get_stall(&self, usb: &Composer<'_>, ep: EndpointAddress) -> Result<bool> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        usb.get_stall(ep)
    }
}
