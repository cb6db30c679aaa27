//! Control transfer routing
//!
//! The bus driver owns the stage transitions and calls
//! [`Composer::control_xfer`] once per stage. The composer picks the owning
//! function at SETUP, remembers the accepted data length, and holds every
//! later stage of the same request to it.
//!
//! The bus driver may deliver an OUT data stage from inside its own
//! `control_xfer`. Any other nested call (from a handler, or while an IN
//! payload is being queued) is stalled.

use super::Composer;
use crate::bus::ControlData;
use crate::control::{ControlRequest, ControlResponse, Recipient, Stage};
use crate::error::Error;
use crate::function::Function;
use crate::types::{Direction, EndpointAddress};

/// Request accepted at SETUP and still in progress
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct ControlState {
    request: ControlRequest,
    function: usize,
    len: usize,
}

/// Why a control request was stalled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Stall {
    /// No registered function owns the recipient
    Unrouted,
    /// The handler rejected the request
    Rejected,
    /// Data length disagrees with `wLength`, the accepted length or the
    /// control buffer
    Invalid(Error),
    /// DATA or ACK without an accepted SETUP for the same request
    NoSetup,
    /// Bus driver refused the data stage
    Bus,
    /// Nested call while the control buffer is in use
    Reentered,
}

impl Composer<'_> {
    /// Bus driver callback: one stage of a control transfer
    ///
    /// `data` carries the bytes the host sent for an OUT data stage and is
    /// ignored otherwise. Returns `false` to make the bus driver STALL.
    pub fn control_xfer(&self, stage: Stage, request: &ControlRequest, data: &[u8]) -> bool {
        let outcome = match stage {
            Stage::Idle => {
                self.control.set(None);
                return true;
            }
            Stage::Setup => self.setup_stage(request),
            Stage::Data | Stage::Ack => self.later_stage(stage, request, data),
        };
        match outcome {
            Ok(()) => true,
            Err(reason) => {
                warn!(
                    "stall {} request {=u8:#x} to {}: {}",
                    stage,
                    request.request,
                    request.recipient(),
                    reason
                );
                self.control.set(None);
                false
            }
        }
    }

    /// Index of the function a request is addressed to
    fn route(&self, request: &ControlRequest) -> Option<usize> {
        match request.recipient() {
            Recipient::Device | Recipient::Interface => {
                let offset = request.index_low().checked_sub(self.builtin_interfaces())?;
                let offset = usize::from(offset);
                (offset < self.functions.len()).then_some(offset)
            }
            Recipient::Endpoint => {
                let ep = EndpointAddress::from_raw(request.index_low())?;
                self.owners.get()[ep.index()].map(usize::from)
            }
            Recipient::Other | Recipient::Reserved(_) => None,
        }
    }

    fn setup_stage(&self, request: &ControlRequest) -> Result<(), Stall> {
        self.control.set(None);
        let function = self.route(request).ok_or(Stall::Unrouted)?;
        let requested = usize::from(request.length);

        let mut buf = self.control_buf.try_borrow_mut().map_err(|_| Stall::Reentered)?;
        let response = self.call(function, Stage::Setup, request, &mut buf[..]);

        let (len, data_stage) = match response {
            ControlResponse::Stall => return Err(Stall::Rejected),
            ControlResponse::Accept => {
                if request.direction() == Direction::Out && requested != 0 {
                    return Err(Stall::Invalid(Error::InvalidLength));
                }
                (0, None)
            }
            ControlResponse::Data(n) if n > buf.len() => {
                return Err(Stall::Invalid(Error::BufferOverflow))
            }
            ControlResponse::Data(n) => match request.direction() {
                Direction::In if requested == 0 && n != 0 => {
                    return Err(Stall::Invalid(Error::InvalidLength))
                }
                Direction::In => (n.min(requested), Some(Direction::In)),
                Direction::Out if n != requested => {
                    return Err(Stall::Invalid(Error::InvalidLength))
                }
                Direction::Out => (n, Some(Direction::Out)),
            },
        };

        // Recorded before the bus call so a synchronous data stage finds it
        self.control.set(Some(ControlState {
            request: *request,
            function,
            len,
        }));
        let queued = match data_stage {
            None => true,
            // The driver copies the payload before returning
            Some(Direction::In) => self.bus.control_xfer(request, ControlData::In(&buf[..len])),
            Some(Direction::Out) => {
                // The DATA stage may arrive before control_xfer returns and needs the buffer
                drop(buf);
                self.bus.control_xfer(request, ControlData::Out(len))
            }
        };
        if !queued {
            return Err(Stall::Bus);
        }
        Ok(())
    }

    fn later_stage(&self, stage: Stage, request: &ControlRequest, data: &[u8]) -> Result<(), Stall> {
        let state = self
            .control
            .get()
            .filter(|state| state.request == *request)
            .ok_or(Stall::NoSetup)?;

        let mut buf = self.control_buf.try_borrow_mut().map_err(|_| Stall::Reentered)?;
        let len = match stage {
            Stage::Data if request.direction() == Direction::Out => {
                if data.len() != state.len {
                    return Err(Stall::Invalid(Error::InvalidLength));
                }
                buf[..state.len].copy_from_slice(data);
                state.len
            }
            Stage::Data => state.len,
            _ => 0,
        };

        let response = self.call(state.function, stage, request, &mut buf[..len]);
        if stage == Stage::Ack {
            self.control.set(None);
        }
        match response {
            ControlResponse::Stall => Err(Stall::Rejected),
            ControlResponse::Accept | ControlResponse::Data(_) => Ok(()),
        }
    }

    fn call(
        &self,
        function: usize,
        stage: Stage,
        request: &ControlRequest,
        buf: &mut [u8],
    ) -> ControlResponse {
        let Some(target) = self.functions.get(function).copied() else {
            return ControlResponse::Stall;
        };
        dispatch(target, self, stage, request, buf)
    }
}

fn dispatch(
    target: &dyn Function,
    usb: &Composer<'_>,
    stage: Stage,
    request: &ControlRequest,
    buf: &mut [u8],
) -> ControlResponse {
    match request.recipient() {
        Recipient::Device => target.control_device(usb, stage, request, buf),
        Recipient::Interface => target.control_interface(usb, stage, request, buf),
        Recipient::Endpoint => target.control_endpoint(usb, stage, request, buf),
        Recipient::Other | Recipient::Reserved(_) => ControlResponse::Stall,
    }
}
