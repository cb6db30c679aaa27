//! Shared test fixtures: a scripted bus driver and a few small functions.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use usbd_compose::prelude::*;

// =============================================================================
// Fake Bus Driver
// =============================================================================

/// Baseline device descriptor: VID 0x2E8A, PID 0x0005, bcdDevice 1.00,
/// string indices 1/2/3
pub const DEVICE_BASELINE: [u8; 18] = [
    18, 1, 0x00, 0x02, 0x00, 0x00, 0x00, 64, 0x8A, 0x2E, 0x05, 0x00, 0x00, 0x01, 1, 2, 3, 1,
];

/// Header only, as used when the bus driver has no interfaces of its own
pub static BARE_CONFIG: [u8; 9] = [9, 2, 9, 0, 0, 1, 0, 0x80, 50];

/// Header plus one built-in vendor interface with EP1 IN / EP1 OUT
pub static BUILTIN_CONFIG: [u8; 32] = [
    9, 2, 32, 0, 1, 1, 4, 0x80, 50, // header, iConfiguration = 4
    9, 4, 0, 0, 2, 0xFF, 0x00, 0xFF, 0, // interface 0
    7, 5, 0x81, 2, 64, 0, 0, // EP1 IN bulk
    7, 5, 0x01, 2, 64, 0, 0, // EP1 OUT bulk
];

/// What the bus driver was asked to transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Queued {
    Send(Vec<u8>),
    Receive(usize),
}

/// Control data stage the composer queued
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlQueued {
    In(Vec<u8>),
    Out(usize),
}

pub struct FakeBus {
    pub statics: StaticDescriptors,
    pub submitted: RefCell<Vec<(EndpointAddress, Queued)>>,
    pub control: RefCell<Vec<(ControlRequest, ControlQueued)>>,
    pub reject_submit: Cell<bool>,
    pub reject_control: Cell<bool>,
    pub stalled: RefCell<Vec<EndpointAddress>>,
    pub reenumerations: Cell<u32>,
}

impl FakeBus {
    fn with_statics(statics: StaticDescriptors) -> Self {
        Self {
            statics,
            submitted: RefCell::new(Vec::new()),
            control: RefCell::new(Vec::new()),
            reject_submit: Cell::new(false),
            reject_control: Cell::new(false),
            stalled: RefCell::new(Vec::new()),
            reenumerations: Cell::new(0),
        }
    }

    /// No built-in interfaces, endpoints or strings beyond index 0
    pub fn bare() -> Self {
        Self::with_statics(StaticDescriptors {
            device: DEVICE_BASELINE,
            configuration: &BARE_CONFIG,
            interfaces: 0,
            endpoints: 1,
            strings: 1,
        })
    }

    /// One built-in interface on EP1, strings 1..=4 built in
    pub fn with_builtin() -> Self {
        Self::with_statics(StaticDescriptors {
            device: DEVICE_BASELINE,
            configuration: &BUILTIN_CONFIG,
            interfaces: 1,
            endpoints: 2,
            strings: 5,
        })
    }

    pub fn last_submitted(&self) -> Option<(EndpointAddress, Queued)> {
        self.submitted.borrow().last().cloned()
    }

    pub fn last_control(&self) -> Option<(ControlRequest, ControlQueued)> {
        self.control.borrow().last().cloned()
    }
}

impl BusDriver for FakeBus {
    fn static_descriptors(&self) -> &StaticDescriptors {
        &self.statics
    }

    fn submit_xfer(&self, ep: EndpointAddress, transfer: Transfer<'_>) -> bool {
        if self.reject_submit.get() {
            return false;
        }
        let queued = match transfer {
            Transfer::Send(bytes) => Queued::Send(bytes.to_vec()),
            Transfer::Receive(len) => Queued::Receive(len),
        };
        self.submitted.borrow_mut().push((ep, queued));
        true
    }

    fn control_xfer(&self, request: &ControlRequest, data: ControlData<'_>) -> bool {
        if self.reject_control.get() {
            return false;
        }
        let queued = match data {
            ControlData::In(bytes) => ControlQueued::In(bytes.to_vec()),
            ControlData::Out(len) => ControlQueued::Out(len),
        };
        self.control.borrow_mut().push((*request, queued));
        true
    }

    fn set_ep_stall(&self, ep: EndpointAddress, stall: bool) {
        let mut stalled = self.stalled.borrow_mut();
        stalled.retain(|e| *e != ep);
        if stall {
            stalled.push(ep);
        }
    }

    fn get_ep_stall(&self, ep: EndpointAddress) -> bool {
        self.stalled.borrow().contains(&ep)
    }

    fn reenumerate(&self) {
        self.reenumerations.set(self.reenumerations.get() + 1);
    }
}

// =============================================================================
// Test Functions
// =============================================================================

/// Vendor function with one bulk IN and one bulk OUT endpoint
///
/// Records every completion; optionally re-arms the OUT endpoint from the
/// completion hook.
pub struct BulkPipe {
    pub info: InterfaceInfo,
    pub ep_in: Cell<Option<EndpointAddress>>,
    pub ep_out: Cell<Option<EndpointAddress>>,
    pub completions: RefCell<Vec<TransferOutcome>>,
    pub received: RefCell<Vec<u8>>,
    pub rearm: Cell<bool>,
    pub rearm_result: Cell<Option<Result<()>>>,
    pub signal: TransferSignal,
    pub opens: Cell<u32>,
    pub resets: Cell<u32>,
}

impl BulkPipe {
    pub fn new() -> Self {
        Self::with_info(InterfaceInfo::vendor())
    }

    pub fn named(name: &'static str) -> Self {
        Self::with_info(InterfaceInfo::vendor().with_string(name))
    }

    fn with_info(info: InterfaceInfo) -> Self {
        Self {
            info,
            ep_in: Cell::new(None),
            ep_out: Cell::new(None),
            completions: RefCell::new(Vec::new()),
            received: RefCell::new(Vec::new()),
            rearm: Cell::new(false),
            rearm_result: Cell::new(None),
            signal: TransferSignal::new(),
            opens: Cell::new(0),
            resets: Cell::new(0),
        }
    }

    pub fn ep_in(&self) -> EndpointAddress {
        self.ep_in.get().expect("descriptor not built yet")
    }

    pub fn ep_out(&self) -> EndpointAddress {
        self.ep_out.get().expect("descriptor not built yet")
    }
}

impl Function for BulkPipe {
    fn info(&self) -> &InterfaceInfo {
        &self.info
    }

    fn write_endpoint_descriptors(
        &self,
        out: &mut DescriptorWriter<'_>,
        _strings: &mut StringRefs<'_>,
        first_endpoint: u8,
        endpoints: &mut EndpointList,
    ) -> Result<()> {
        let ep_in = EndpointAddress::new(first_endpoint, Direction::In).ok_or(Error::BufferOverflow)?;
        let ep_out =
            EndpointAddress::new(first_endpoint, Direction::Out).ok_or(Error::BufferOverflow)?;
        out.endpoint(ep_in, EndpointType::Bulk, 64, 0)?;
        out.endpoint(ep_out, EndpointType::Bulk, 64, 0)?;
        endpoints.push(ep_in).map_err(|_| Error::BufferOverflow)?;
        endpoints.push(ep_out).map_err(|_| Error::BufferOverflow)?;
        self.ep_in.set(Some(ep_in));
        self.ep_out.set(Some(ep_out));
        Ok(())
    }

    fn on_open(&self) {
        self.info.set_open(true);
        self.opens.set(self.opens.get() + 1);
    }

    fn on_reset(&self) {
        self.info.set_open(false);
        self.resets.set(self.resets.get() + 1);
    }

    fn on_transfer_complete(&self, usb: &Composer<'_>, done: Completion<'_>) {
        self.received.borrow_mut().extend_from_slice(done.data());
        self.signal.signal(&done);
        self.completions.borrow_mut().push(done.outcome());
        if self.rearm.get() && done.endpoint() == self.ep_out() {
            let result = self.submit(usb, self.ep_out(), Transfer::Receive(64), OnComplete::Notify);
            self.rearm_result.set(Some(result));
        }
    }
}

/// Interrupt-IN only function whose endpoint number skips ahead by `gap`
pub struct SparseInterrupt {
    pub info: InterfaceInfo,
    pub gap: u8,
}

impl SparseInterrupt {
    pub fn new(gap: u8) -> Self {
        Self {
            info: InterfaceInfo::new(0x03, 0x00, 0x00),
            gap,
        }
    }
}

impl Function for SparseInterrupt {
    fn info(&self) -> &InterfaceInfo {
        &self.info
    }

    fn write_endpoint_descriptors(
        &self,
        out: &mut DescriptorWriter<'_>,
        _strings: &mut StringRefs<'_>,
        first_endpoint: u8,
        endpoints: &mut EndpointList,
    ) -> Result<()> {
        let ep = EndpointAddress::new(first_endpoint + self.gap, Direction::In)
            .ok_or(Error::BufferOverflow)?;
        out.endpoint(ep, EndpointType::Interrupt, 8, 10)?;
        endpoints.push(ep).map_err(|_| Error::BufferOverflow)?;
        Ok(())
    }
}

/// Function that claims a fixed endpoint address regardless of the range
/// it was given
pub struct FixedEndpoint {
    pub info: InterfaceInfo,
    pub address: u8,
}

impl Function for FixedEndpoint {
    fn info(&self) -> &InterfaceInfo {
        &self.info
    }

    fn write_endpoint_descriptors(
        &self,
        out: &mut DescriptorWriter<'_>,
        _strings: &mut StringRefs<'_>,
        _first_endpoint: u8,
        endpoints: &mut EndpointList,
    ) -> Result<()> {
        let ep = EndpointAddress::from_raw(self.address).ok_or(Error::BufferOverflow)?;
        out.endpoint(ep, EndpointType::Bulk, 64, 0)?;
        endpoints.push(ep).map_err(|_| Error::BufferOverflow)?;
        Ok(())
    }
}

/// One control stage as seen by a [`ControlProbe`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seen {
    pub recipient: Recipient,
    pub stage: Stage,
    pub request: u8,
    pub buf_len: usize,
}

/// Request code a probe always rejects
pub const REJECT: u8 = 0x7F;

/// Function that answers every control request
///
/// IN requests get `payload` (or `reply_len` bytes of it), OUT requests
/// accept `reply_len` or `wLength` bytes and record what arrives.
pub struct ControlProbe {
    pub info: InterfaceInfo,
    pub payload: &'static [u8],
    pub reply_len: Cell<Option<usize>>,
    pub seen: RefCell<Vec<Seen>>,
    pub received: RefCell<Vec<u8>>,
}

impl ControlProbe {
    pub fn new(payload: &'static [u8]) -> Self {
        Self {
            info: InterfaceInfo::vendor(),
            payload,
            reply_len: Cell::new(None),
            seen: RefCell::new(Vec::new()),
            received: RefCell::new(Vec::new()),
        }
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.seen.borrow().iter().map(|s| s.stage).collect()
    }

    fn answer(&self, stage: Stage, request: &ControlRequest, buf: &mut [u8]) -> ControlResponse {
        self.seen.borrow_mut().push(Seen {
            recipient: request.recipient(),
            stage,
            request: request.request,
            buf_len: buf.len(),
        });
        if request.request == REJECT {
            return ControlResponse::Stall;
        }
        match (stage, request.direction()) {
            (Stage::Setup, Direction::In) => {
                buf[..self.payload.len()].copy_from_slice(self.payload);
                ControlResponse::Data(self.reply_len.get().unwrap_or(self.payload.len()))
            }
            (Stage::Setup, Direction::Out) if request.length == 0 => ControlResponse::Accept,
            (Stage::Setup, Direction::Out) => ControlResponse::Data(
                self.reply_len
                    .get()
                    .unwrap_or(usize::from(request.length)),
            ),
            (Stage::Data, Direction::Out) => {
                self.received.borrow_mut().extend_from_slice(buf);
                ControlResponse::Accept
            }
            _ => ControlResponse::Accept,
        }
    }
}

impl Function for ControlProbe {
    fn info(&self) -> &InterfaceInfo {
        &self.info
    }

    fn write_endpoint_descriptors(
        &self,
        out: &mut DescriptorWriter<'_>,
        _strings: &mut StringRefs<'_>,
        first_endpoint: u8,
        endpoints: &mut EndpointList,
    ) -> Result<()> {
        let ep = EndpointAddress::new(first_endpoint, Direction::In).ok_or(Error::BufferOverflow)?;
        out.endpoint(ep, EndpointType::Interrupt, 16, 1)?;
        endpoints.push(ep).map_err(|_| Error::BufferOverflow)?;
        Ok(())
    }

    fn control_device(
        &self,
        _usb: &Composer<'_>,
        stage: Stage,
        request: &ControlRequest,
        buf: &mut [u8],
    ) -> ControlResponse {
        self.answer(stage, request, buf)
    }

    fn control_interface(
        &self,
        _usb: &Composer<'_>,
        stage: Stage,
        request: &ControlRequest,
        buf: &mut [u8],
    ) -> ControlResponse {
        self.answer(stage, request, buf)
    }

    fn control_endpoint(
        &self,
        _usb: &Composer<'_>,
        stage: Stage,
        request: &ControlRequest,
        buf: &mut [u8],
    ) -> ControlResponse {
        self.answer(stage, request, buf)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Build a SETUP packet
pub fn setup(request_type: u8, request: u8, value: u16, index: u16, length: u16) -> ControlRequest {
    ControlRequest {
        request_type,
        request,
        value,
        index,
        length,
    }
}

/// Manual clock advanced by a fixed step on every `relax`
pub struct StepClock {
    pub now: Cell<u64>,
    pub step: u64,
    pub relaxed: Cell<u32>,
}

impl StepClock {
    pub fn new(step: u64) -> Self {
        Self {
            now: Cell::new(0),
            step,
            relaxed: Cell::new(0),
        }
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn relax(&self) {
        self.now.set(self.now.get() + self.step);
        self.relaxed.set(self.relaxed.get() + 1);
    }
}
