//! Composite USB Device Library
//!
//! This library lets independently written USB *functions* (CDC serial,
//! HID, MIDI, vendor pipes, ...) be composed into one composite device,
//! enumerated by a host, and driven through control and data transfers
//! without each function re-implementing descriptor or transfer
//! bookkeeping.
//!
//! # Architecture
//!
//! The library sits between a bus driver (hardware access, implemented
//! elsewhere) and the application's functions:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      FUNCTIONS                               │
//! │  CDC  │  HID  │  MIDI  │  Vendor       (impl Function)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   COMPOSITION LAYER                          │
//! │  Composer: descriptors │ control routing │ open/reset        │
//! │  Transfer Registry     │ Stream Buffer   │ timed waits       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      BUS DRIVER                              │
//! │       hardware endpoints, SETUP decoding (impl BusDriver)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Explicit context**: the application owns the [`device::Composer`];
//!   there is no global device instance
//! - **Single in flight**: at most one transfer per endpoint, enforced by
//!   the transfer registry
//! - **No allocation**: every table has a compile-time capacity
//! - **No unsafe outside the stream buffer**
//! - **Explicit error handling**: all fallible operations return `Result`

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Must come first so the macros are visible to every module below
#[macro_use]
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_time;

/// Shared Types
///
/// Endpoint addresses, directions, transfer types and results.
pub mod types;

/// Configuration
///
/// Compile-time capacities and runtime device overrides.
pub mod config;

/// Error Types
pub mod error;

/// Descriptor Wire Formats
///
/// Device, configuration, interface, endpoint and string descriptors.
pub mod descriptor;

/// Control Requests
///
/// SETUP packet decoding and per-stage handler responses.
pub mod control;

/// Bus Driver Contract
pub mod bus;

/// Function Interface Contract
///
/// The trait every composable function implements.
pub mod function;

/// Transfer Registry
///
/// Per-endpoint single-in-flight bookkeeping and completion delivery.
pub mod transfer;

/// Device Composer
///
/// Descriptor composition, control routing and lifecycle fan-out.
pub mod device;

/// Stream Buffer
///
/// Interrupt-safe SPSC byte buffer with zero-copy windows.
pub mod buffer;

/// Timed Waits
///
/// Cooperative polling with an injected clock.
pub mod poll;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::{Consumer, Producer, StreamBuffer};
    pub use crate::bus::{BusDriver, ControlData, StaticDescriptors, Transfer};
    pub use crate::config::DeviceConfig;
    pub use crate::control::{ControlRequest, ControlResponse, Recipient, RequestType, Stage};
    pub use crate::descriptor::DescriptorWriter;
    pub use crate::device::Composer;
    pub use crate::error::{Error, Result};
    pub use crate::function::{EndpointList, Function, InterfaceInfo, StringRefs};
    pub use crate::poll::{wait_until, Clock};
    pub use crate::transfer::{Completion, OnComplete, TransferOutcome, TransferSignal};
    pub use crate::types::{Direction, EndpointAddress, EndpointType, TransferResult};
}
