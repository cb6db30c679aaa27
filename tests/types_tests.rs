//! Types Module Tests
//!
//! Tests for the addressing and transfer types shared across the stack.
//! Run with: cargo test --test types_tests

use usbd_compose::bus::Transfer;
use usbd_compose::types::{Direction, EndpointAddress, TransferResult};

// =============================================================================
// Direction Tests
// =============================================================================

#[test]
fn direction_from_bit7() {
    assert_eq!(Direction::from_bit7(0x80), Direction::In);
    assert_eq!(Direction::from_bit7(0xA1), Direction::In);
    assert_eq!(Direction::from_bit7(0x7F), Direction::Out);
    assert_eq!(Direction::from_bit7(0x00), Direction::Out);
}

// =============================================================================
// EndpointAddress Tests
// =============================================================================

#[test]
fn endpoint_roundtrip_all_numbers() {
    for number in 0..=15 {
        for direction in [Direction::In, Direction::Out] {
            let ep = EndpointAddress::new(number, direction).unwrap();
            assert_eq!(EndpointAddress::from_raw(ep.raw()), Some(ep));
            assert_eq!(ep.direction(), direction);
        }
    }
}

#[test]
fn endpoint_index_unique() {
    let mut seen = [false; 32];
    for raw in (0x00..=0x0F).chain(0x80..=0x8F) {
        let index = EndpointAddress::from_raw(raw).unwrap().index();
        assert!(!seen[index], "index {index} assigned twice");
        seen[index] = true;
    }
    assert!(seen.iter().all(|s| *s));
}

#[test]
fn control_endpoints() {
    assert_eq!(EndpointAddress::CONTROL_OUT.raw(), 0x00);
    assert_eq!(EndpointAddress::CONTROL_IN.raw(), 0x80);
}

// =============================================================================
// TransferResult Tests
// =============================================================================

#[test]
fn transfer_result_codes() {
    assert_eq!(TransferResult::from_raw(0), TransferResult::Success);
    assert_eq!(TransferResult::from_raw(1), TransferResult::Failed);
    assert_eq!(TransferResult::from_raw(2), TransferResult::Stalled);
    assert_eq!(TransferResult::from_raw(3), TransferResult::Timeout);
    assert_eq!(TransferResult::from_raw(200), TransferResult::Invalid);
}

#[test]
fn only_success_is_success() {
    assert!(TransferResult::default().is_success());
    assert!(!TransferResult::Stalled.is_success());
    assert!(!TransferResult::Failed.is_success());
}

// =============================================================================
// Transfer Tests
// =============================================================================

#[test]
fn transfer_length_and_direction() {
    let send = Transfer::Send(b"abc");
    assert_eq!(send.len(), 3);
    assert!(send.is_in());

    let receive = Transfer::Receive(64);
    assert_eq!(receive.len(), 64);
    assert!(!receive.is_in());

    assert!(Transfer::Send(&[]).is_empty());
    assert!(Transfer::Receive(0).is_empty());
}
