//! USB descriptor wire formats
//!
//! Fixed binary layouts from the USB 2.0 device framework (chapter 9) and
//! a bounded writer used to assemble configuration descriptors without
//! allocation.

use crate::error::{Error, Result};
use crate::types::{EndpointAddress, EndpointType};

/// Descriptor type codes (`bDescriptorType`)
pub mod descriptor_type {
    /// Device descriptor
    pub const DEVICE: u8 = 0x01;
    /// Configuration descriptor
    pub const CONFIGURATION: u8 = 0x02;
    /// String descriptor
    pub const STRING: u8 = 0x03;
    /// Interface descriptor
    pub const INTERFACE: u8 = 0x04;
    /// Endpoint descriptor
    pub const ENDPOINT: u8 = 0x05;
    /// Interface Association Descriptor
    pub const INTERFACE_ASSOCIATION: u8 = 0x0B;
}

/// Device descriptor length
pub const DEVICE_LEN: usize = 18;
/// Configuration descriptor header length
pub const CONFIGURATION_LEN: usize = 9;
/// Interface descriptor length
pub const INTERFACE_LEN: usize = 9;
/// Endpoint descriptor length
pub const ENDPOINT_LEN: usize = 7;
/// Interface Association Descriptor length
pub const IAD_LEN: usize = 8;

/// Device descriptor fields (USB 2.0 section 9.6.1)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescriptor {
    /// USB release (BCD)
    pub bcd_usb: u16,
    /// Device class
    pub device_class: u8,
    /// Device subclass
    pub device_subclass: u8,
    /// Device protocol
    pub device_protocol: u8,
    /// Max packet size of endpoint 0
    pub max_packet_size_0: u8,
    /// Vendor ID
    pub id_vendor: u16,
    /// Product ID
    pub id_product: u16,
    /// Device release (BCD)
    pub bcd_device: u16,
    /// Manufacturer string index
    pub i_manufacturer: u8,
    /// Product string index
    pub i_product: u8,
    /// Serial number string index
    pub i_serial_number: u8,
    /// Number of configurations
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// Decode an 18-byte device descriptor
    ///
    /// `bLength`/`bDescriptorType` are not validated; the baseline comes
    /// from the bus driver and is trusted.
    #[must_use]
    pub const fn parse(raw: &[u8; DEVICE_LEN]) -> Self {
        Self {
            bcd_usb: u16::from_le_bytes([raw[2], raw[3]]),
            device_class: raw[4],
            device_subclass: raw[5],
            device_protocol: raw[6],
            max_packet_size_0: raw[7],
            id_vendor: u16::from_le_bytes([raw[8], raw[9]]),
            id_product: u16::from_le_bytes([raw[10], raw[11]]),
            bcd_device: u16::from_le_bytes([raw[12], raw[13]]),
            i_manufacturer: raw[14],
            i_product: raw[15],
            i_serial_number: raw[16],
            num_configurations: raw[17],
        }
    }

    /// Encode to the 18-byte wire layout
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; DEVICE_LEN] {
        let usb = self.bcd_usb.to_le_bytes();
        let vid = self.id_vendor.to_le_bytes();
        let pid = self.id_product.to_le_bytes();
        let rel = self.bcd_device.to_le_bytes();
        [
            DEVICE_LEN as u8,
            descriptor_type::DEVICE,
            usb[0],
            usb[1],
            self.device_class,
            self.device_subclass,
            self.device_protocol,
            self.max_packet_size_0,
            vid[0],
            vid[1],
            pid[0],
            pid[1],
            rel[0],
            rel[1],
            self.i_manufacturer,
            self.i_product,
            self.i_serial_number,
            self.num_configurations,
        ]
    }
}

/// Configuration descriptor header (USB 2.0 section 9.6.3)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationHeader {
    /// Length of the whole configuration block
    pub total_length: u16,
    /// Number of interfaces
    pub num_interfaces: u8,
    /// Value used by Set-Configuration
    pub configuration_value: u8,
    /// Configuration string index
    pub i_configuration: u8,
    /// Attribute bits
    pub attributes: u8,
    /// Max bus power in 2 mA units
    pub max_power: u8,
}

impl ConfigurationHeader {
    /// Reserved bit that must always be set in `bmAttributes`
    pub const ATTR_RESERVED: u8 = 1 << 7;
    /// Self-powered bit
    pub const ATTR_SELF_POWERED: u8 = 1 << 6;

    /// Decode the first 9 bytes of a configuration block
    #[must_use]
    pub const fn parse(raw: &[u8; CONFIGURATION_LEN]) -> Self {
        Self {
            total_length: u16::from_le_bytes([raw[2], raw[3]]),
            num_interfaces: raw[4],
            configuration_value: raw[5],
            i_configuration: raw[6],
            attributes: raw[7],
            max_power: raw[8],
        }
    }

    /// Encode to the 9-byte wire layout
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; CONFIGURATION_LEN] {
        let total = self.total_length.to_le_bytes();
        [
            CONFIGURATION_LEN as u8,
            descriptor_type::CONFIGURATION,
            total[0],
            total[1],
            self.num_interfaces,
            self.configuration_value,
            self.i_configuration,
            self.attributes,
            self.max_power,
        ]
    }
}

/// Standard interface descriptor (alternate setting fixed at 0)
#[must_use]
pub const fn interface_descriptor(
    number: u8,
    num_endpoints: u8,
    class: u8,
    subclass: u8,
    protocol: u8,
    i_interface: u8,
) -> [u8; INTERFACE_LEN] {
    [
        INTERFACE_LEN as u8,
        descriptor_type::INTERFACE,
        number,
        0,
        num_endpoints,
        class,
        subclass,
        protocol,
        i_interface,
    ]
}

/// Standard endpoint descriptor
#[must_use]
pub const fn endpoint_descriptor(
    address: EndpointAddress,
    kind: EndpointType,
    max_packet_size: u16,
    interval: u8,
) -> [u8; ENDPOINT_LEN] {
    let mps = max_packet_size.to_le_bytes();
    [
        ENDPOINT_LEN as u8,
        descriptor_type::ENDPOINT,
        address.raw(),
        kind.attributes(),
        mps[0],
        mps[1],
        interval,
    ]
}

/// Interface Association Descriptor grouping `count` interfaces from `first`
#[must_use]
pub const fn interface_association(
    first_interface: u8,
    count: u8,
    class: u8,
    subclass: u8,
    protocol: u8,
    i_function: u8,
) -> [u8; IAD_LEN] {
    [
        IAD_LEN as u8,
        descriptor_type::INTERFACE_ASSOCIATION,
        first_interface,
        count,
        class,
        subclass,
        protocol,
        i_function,
    ]
}

/// Bounded descriptor writer over a caller-provided buffer
pub struct DescriptorWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl<'b> DescriptorWriter<'b> {
    /// Create a writer starting at the beginning of `buf`
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Bytes written so far
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing was written
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remaining capacity
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Written bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append raw bytes
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.remaining() {
            return Err(Error::BufferOverflow);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Append a descriptor with a generated `bLength`/`bDescriptorType` prefix
    pub fn write(&mut self, descriptor_type: u8, body: &[u8]) -> Result<()> {
        let total = body.len() + 2;
        if total > usize::from(u8::MAX) {
            return Err(Error::BufferOverflow);
        }
        self.write_raw(&[total as u8, descriptor_type])?;
        self.write_raw(body)
    }

    /// Overwrite already-written bytes at `offset`
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset + bytes.len();
        if end > self.len {
            return Err(Error::BufferOverflow);
        }
        self.buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Append a standard interface descriptor
    pub fn interface(
        &mut self,
        number: u8,
        num_endpoints: u8,
        class: u8,
        subclass: u8,
        protocol: u8,
        i_interface: u8,
    ) -> Result<()> {
        self.write_raw(&interface_descriptor(
            number,
            num_endpoints,
            class,
            subclass,
            protocol,
            i_interface,
        ))
    }

    /// Append a standard endpoint descriptor
    pub fn endpoint(
        &mut self,
        address: EndpointAddress,
        kind: EndpointType,
        max_packet_size: u16,
        interval: u8,
    ) -> Result<()> {
        self.write_raw(&endpoint_descriptor(address, kind, max_packet_size, interval))
    }

    /// Append an Interface Association Descriptor
    pub fn interface_association(
        &mut self,
        first_interface: u8,
        count: u8,
        class: u8,
        subclass: u8,
        protocol: u8,
        i_function: u8,
    ) -> Result<()> {
        self.write_raw(&interface_association(
            first_interface,
            count,
            class,
            subclass,
            protocol,
            i_function,
        ))
    }
}

/// Encode a string descriptor (UTF-16LE body)
pub fn string_descriptor(s: &str, out: &mut DescriptorWriter<'_>) -> Result<()> {
    let total = 2 + 2 * s.encode_utf16().count();
    if total > usize::from(u8::MAX) {
        return Err(Error::BufferOverflow);
    }
    out.write_raw(&[total as u8, descriptor_type::STRING])?;
    for unit in s.encode_utf16() {
        out.write_raw(&unit.to_le_bytes())?;
    }
    Ok(())
}

/// Encode string descriptor zero (supported language IDs)
pub fn language_ids(ids: &[u16], out: &mut DescriptorWriter<'_>) -> Result<()> {
    let total = 2 + 2 * ids.len();
    if total > usize::from(u8::MAX) {
        return Err(Error::BufferOverflow);
    }
    out.write_raw(&[total as u8, descriptor_type::STRING])?;
    for id in ids {
        out.write_raw(&id.to_le_bytes())?;
    }
    Ok(())
}

/// Walk a block of concatenated descriptors
///
/// Yields `(bDescriptorType, descriptor bytes)` pairs. A zero `bLength` or
/// a descriptor running past the end yields `MalformedDescriptor` and
/// stops the walk.
pub fn walk(block: &[u8]) -> DescriptorIter<'_> {
    DescriptorIter { block, pos: 0 }
}

/// Iterator returned by [`walk`]
pub struct DescriptorIter<'d> {
    block: &'d [u8],
    pos: usize,
}

impl<'d> Iterator for DescriptorIter<'d> {
    type Item = Result<(u8, &'d [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.block.get(self.pos..)?;
        if rest.is_empty() {
            return None;
        }
        let len = usize::from(rest[0]);
        if len < 2 || len > rest.len() {
            self.pos = self.block.len();
            return Some(Err(Error::MalformedDescriptor));
        }
        self.pos += len;
        Some(Ok((rest[1], &rest[..len])))
    }
}
