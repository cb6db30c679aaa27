//! Configuration Tests
//!
//! Capacity constants and runtime device overrides.
//! Run with: cargo test --test config_tests

use usbd_compose::config::*;

// =============================================================================
// Constants Tests
// =============================================================================

#[test]
fn capacities_fit_descriptor_fields() {
    assert!(MAX_FUNCTIONS <= 255);
    assert!(MAX_STRINGS <= 255);
    assert!(CONFIG_DESCRIPTOR_CAPACITY <= usize::from(u16::MAX));
    assert!(ENDPOINT_SCRATCH_CAPACITY >= 7 * MAX_ENDPOINTS_PER_FUNCTION);
}

#[test]
fn control_buffer_holds_string_descriptor() {
    // 2 header bytes plus 126 UTF-16 code units
    assert!(CONTROL_BUFFER_SIZE >= 254);
}

#[test]
fn vendor_class_codes() {
    assert_eq!(VENDOR_CLASS, 0xFF);
    assert_eq!(VENDOR_PROTOCOL, 0xFF);
    assert_eq!(LANGUAGE_ID_EN_US, 0x0409);
}

// =============================================================================
// DeviceConfig Tests
// =============================================================================

#[test]
fn new_config_has_no_overrides() {
    let config = DeviceConfig::new();
    assert_eq!(config.id_vendor, None);
    assert_eq!(config.product, None);
    assert_eq!(config.max_power_ma, DEFAULT_MAX_POWER_MA);
    assert!(config.include_static);
    assert_eq!(config, DeviceConfig::default());
}

#[test]
fn iad_class_codes() {
    let config = DeviceConfig {
        id_vendor: Some(0x1209),
        ..DeviceConfig::new()
    }
    .with_iad_class();
    assert_eq!(config.device_class, Some(0xEF));
    assert_eq!(config.device_subclass, Some(0x02));
    assert_eq!(config.device_protocol, Some(0x01));
    assert_eq!(config.id_vendor, Some(0x1209));
}

#[test]
fn device_strings_in_table_order() {
    let config = DeviceConfig {
        manufacturer: Some("Acme"),
        serial: Some("0001"),
        configuration: Some("Default"),
        ..DeviceConfig::new()
    };
    let strings: Vec<_> = config.device_strings().collect();
    assert_eq!(strings, vec!["Acme", "0001", "Default"]);
}

#[test]
fn empty_device_strings_skipped() {
    let config = DeviceConfig {
        manufacturer: Some(""),
        product: Some("Widget"),
        ..DeviceConfig::new()
    };
    let strings: Vec<_> = config.device_strings().collect();
    assert_eq!(strings, vec!["Widget"]);
}
