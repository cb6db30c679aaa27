//! System configuration and capacity constants
//!
//! This module defines compile-time capacities for the fixed-size tables
//! the composer keeps, plus the runtime `DeviceConfig` overrides applied on
//! top of the bus driver's built-in descriptors.

/// Maximum number of functions registered at once
pub const MAX_FUNCTIONS: usize = 8;

/// Maximum number of dynamic strings (device strings + function strings)
pub const MAX_STRINGS: usize = 16;

/// Maximum endpoints a single function may declare
pub const MAX_ENDPOINTS_PER_FUNCTION: usize = 4;

/// Capacity of the composed configuration descriptor in bytes
pub const CONFIG_DESCRIPTOR_CAPACITY: usize = 512;

/// Scratch capacity for one function's endpoint descriptor block
pub const ENDPOINT_SCRATCH_CAPACITY: usize = 128;

/// Control transfer data stage buffer size
pub const CONTROL_BUFFER_SIZE: usize = 256;

/// Bus power drawn when no override is set (mA)
pub const DEFAULT_MAX_POWER_MA: u16 = 50;

/// Default cooperative poll step (ms)
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 10;

/// Vendor-specific interface class (host will not bind a class driver)
pub const VENDOR_CLASS: u8 = 0xFF;

/// Default vendor subclass
pub const VENDOR_SUBCLASS: u8 = 0x00;

/// Vendor-specific interface protocol
pub const VENDOR_PROTOCOL: u8 = 0xFF;

/// USB language ID for English (United States)
pub const LANGUAGE_ID_EN_US: u16 = 0x0409;

/// Runtime device overrides
///
/// Every `None` field keeps the value from the bus driver's built-in
/// device descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Manufacturer string
    pub manufacturer: Option<&'static str>,
    /// Product string
    pub product: Option<&'static str>,
    /// Serial number string
    pub serial: Option<&'static str>,
    /// Configuration string
    pub configuration: Option<&'static str>,
    /// Vendor ID
    pub id_vendor: Option<u16>,
    /// Product ID
    pub id_product: Option<u16>,
    /// Device release number (BCD)
    pub bcd_device: Option<u16>,
    /// `bDeviceClass`
    pub device_class: Option<u8>,
    /// `bDeviceSubClass`
    pub device_subclass: Option<u8>,
    /// `bDeviceProtocol`
    pub device_protocol: Option<u8>,
    /// Maximum bus power in mA, 0 marks the device self-powered
    pub max_power_ma: u16,
    /// Compose the bus driver's built-in interfaces ahead of ours
    pub include_static: bool,
}

impl DeviceConfig {
    /// Configuration with no overrides
    #[must_use]
    pub const fn new() -> Self {
        Self {
            manufacturer: None,
            product: None,
            serial: None,
            configuration: None,
            id_vendor: None,
            id_product: None,
            bcd_device: None,
            device_class: None,
            device_subclass: None,
            device_protocol: None,
            max_power_ma: DEFAULT_MAX_POWER_MA,
            include_static: true,
        }
    }

    /// Set class codes announcing Interface Association Descriptors
    ///
    /// Needed when any function spans several interfaces (CDC, audio).
    #[must_use]
    pub const fn with_iad_class(self) -> Self {
        Self {
            device_class: Some(0xEF),
            device_subclass: Some(0x02),
            device_protocol: Some(0x01),
            ..self
        }
    }

    /// Device-level strings in string-table order, skipping unset ones
    pub fn device_strings(&self) -> impl Iterator<Item = &'static str> {
        [
            self.manufacturer,
            self.product,
            self.serial,
            self.configuration,
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}
