//! Descriptor builds answered during enumeration

use heapless::Vec;

use super::{Composer, EndpointOwners};
use crate::config::{
    CONFIG_DESCRIPTOR_CAPACITY, ENDPOINT_SCRATCH_CAPACITY, LANGUAGE_ID_EN_US, MAX_STRINGS,
};
use crate::descriptor::{
    self, ConfigurationHeader, DescriptorWriter, DeviceDescriptor, CONFIGURATION_LEN, DEVICE_LEN,
};
use crate::error::{Error, Result};
use crate::function::{EndpointList, StringRefs};
use crate::types::EndpointAddress;

/// Composed configuration descriptor bytes
pub type ConfigurationDescriptor = Vec<u8, CONFIG_DESCRIPTOR_CAPACITY>;

/// String indices assigned to the device-level strings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct DeviceStringIndices {
    manufacturer: u8,
    product: u8,
    serial: u8,
    configuration: u8,
}

impl Composer<'_> {
    /// First dynamic string index; index 0 is the language ID list
    fn string_base(&self) -> u8 {
        self.bus.static_descriptors().strings.max(1)
    }

    /// Lowest endpoint number available to registered functions
    fn first_endpoint(&self) -> u8 {
        if self.config.include_static {
            self.bus.static_descriptors().endpoints.max(1)
        } else {
            1
        }
    }

    fn device_string_indices(&self) -> DeviceStringIndices {
        let mut next = self.string_base();
        let mut assign = |s: Option<&'static str>| match s {
            Some(s) if !s.is_empty() => {
                let index = next;
                next += 1;
                index
            }
            _ => 0,
        };
        DeviceStringIndices {
            manufacturer: assign(self.config.manufacturer),
            product: assign(self.config.product),
            serial: assign(self.config.serial),
            configuration: assign(self.config.configuration),
        }
    }

    /// Bus driver callback: 18-byte device descriptor
    ///
    /// Starts from the bus driver's baseline and applies every override set
    /// in [`DeviceConfig`](crate::config::DeviceConfig).
    #[must_use]
    pub fn build_device_descriptor(&self) -> [u8; DEVICE_LEN] {
        let mut desc = DeviceDescriptor::parse(&self.bus.static_descriptors().device);
        let cfg = &self.config;

        desc.device_class = cfg.device_class.unwrap_or(desc.device_class);
        desc.device_subclass = cfg.device_subclass.unwrap_or(desc.device_subclass);
        desc.device_protocol = cfg.device_protocol.unwrap_or(desc.device_protocol);
        desc.id_vendor = cfg.id_vendor.unwrap_or(desc.id_vendor);
        desc.id_product = cfg.id_product.unwrap_or(desc.id_product);
        desc.bcd_device = cfg.bcd_device.unwrap_or(desc.bcd_device);

        let strings = self.device_string_indices();
        if strings.manufacturer != 0 {
            desc.i_manufacturer = strings.manufacturer;
        }
        if strings.product != 0 {
            desc.i_product = strings.product;
        }
        if strings.serial != 0 {
            desc.i_serial_number = strings.serial;
        }

        desc.to_bytes()
    }

    /// Bus driver callback: full configuration descriptor
    ///
    /// Rebuilt from scratch on every call, along with the string table and
    /// the endpoint owner map. With no registration change in between, two
    /// calls return identical bytes.
    ///
    /// # Panics
    ///
    /// If a function declares an endpoint number below the one it was given
    /// or an address another function already uses.
    pub fn build_configuration_descriptor(&self) -> Result<ConfigurationDescriptor> {
        let mut buf = [0u8; CONFIG_DESCRIPTOR_CAPACITY];
        let mut out = DescriptorWriter::new(&mut buf);
        let static_i_configuration = if self.config.include_static {
            let block = self.bus.static_descriptors().configuration;
            let baseline: &[u8; CONFIGURATION_LEN] = block
                .get(..CONFIGURATION_LEN)
                .and_then(|head| head.try_into().ok())
                .ok_or(Error::MalformedDescriptor)?;
            out.write_raw(block)?;
            ConfigurationHeader::parse(baseline).i_configuration
        } else {
            out.write_raw(&[0; CONFIGURATION_LEN])?;
            0
        };

        let device_strings = self.device_string_indices();
        let function_string_base = self
            .string_base()
            .saturating_add(count_u8(self.config.device_strings().count()));

        let mut strings: Vec<&'static str, MAX_STRINGS> = Vec::new();
        let mut owners: EndpointOwners = [None; EndpointAddress::COUNT];
        let mut interface = self.builtin_interfaces();
        let mut next_endpoint = self.first_endpoint();

        for (idx, function) in self.functions.iter().enumerate() {
            let mut scratch = [0u8; ENDPOINT_SCRATCH_CAPACITY];
            let mut endpoint_out = DescriptorWriter::new(&mut scratch);
            let mut endpoints = EndpointList::new();

            function.write_endpoint_descriptors(
                &mut endpoint_out,
                &mut StringRefs::new(&mut strings, function_string_base),
                next_endpoint,
                &mut endpoints,
            )?;

            let mut highest = next_endpoint;
            for ep in &endpoints {
                assert!(owners[ep.index()].is_none(), "duplicate endpoint address");
                assert!(
                    ep.number() >= next_endpoint,
                    "endpoint number below assigned range"
                );
                owners[ep.index()] = Some(count_u8(idx));
                highest = highest.max(ep.number() + 1);
            }
            next_endpoint = highest;

            function.write_interface_descriptor(
                &mut out,
                &mut StringRefs::new(&mut strings, function_string_base),
                interface,
                count_u8(endpoints.len()),
            )?;
            out.write_raw(endpoint_out.as_bytes())?;
            interface += 1;
        }

        let max_power_ma = self.config.max_power_ma;
        let mut attributes = ConfigurationHeader::ATTR_RESERVED;
        if max_power_ma == 0 {
            attributes |= ConfigurationHeader::ATTR_SELF_POWERED;
        }
        let header = ConfigurationHeader {
            total_length: u16::try_from(out.len()).map_err(|_| Error::BufferOverflow)?,
            num_interfaces: interface,
            configuration_value: 1,
            i_configuration: if device_strings.configuration != 0 {
                device_strings.configuration
            } else {
                static_i_configuration
            },
            attributes,
            max_power: u8::try_from(max_power_ma / 2).unwrap_or(u8::MAX),
        };
        out.patch(0, &header.to_bytes())?;

        *self.strings.borrow_mut() = strings;
        self.owners.set(owners);

        info!(
            "configuration descriptor: {} bytes, {} interfaces",
            header.total_length, header.num_interfaces
        );
        ConfigurationDescriptor::from_slice(out.as_bytes()).map_err(|()| Error::BufferOverflow)
    }

    /// Bus driver callback: the string for descriptor index `index`
    ///
    /// Device strings are always available; function strings come from the
    /// table built by the last configuration descriptor build. Indices below
    /// the built-in range or past the end of the table yield `None`, which
    /// the bus driver answers with a STALL.
    #[must_use]
    pub fn build_string_descriptor(&self, index: u8) -> Option<&'static str> {
        let Some(offset) = index.checked_sub(self.string_base()) else {
            debug!("string {} is in the built-in range", index);
            return None;
        };
        let offset = usize::from(offset);
        let device_count = self.config.device_strings().count();
        if offset < device_count {
            return self.config.device_strings().nth(offset);
        }
        let found = self.strings.borrow().get(offset - device_count).copied();
        if found.is_none() {
            debug!("stale string index {}", index);
        }
        found
    }

    /// Encode string descriptor `index` (index 0 is the language ID list)
    ///
    /// Returns `Ok(false)` when there is no such string.
    pub fn write_string_descriptor(&self, index: u8, out: &mut DescriptorWriter<'_>) -> Result<bool> {
        if index == 0 {
            descriptor::language_ids(&[LANGUAGE_ID_EN_US], out)?;
            return Ok(true);
        }
        match self.build_string_descriptor(index) {
            Some(s) => {
                descriptor::string_descriptor(s, out)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Narrow a count bounded by a small compile-time capacity
#[allow(clippy::cast_possible_truncation)]
const fn count_u8(n: usize) -> u8 {
    n as u8
}
