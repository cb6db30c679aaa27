//! Transfer Registry
//!
//! Per-endpoint single-in-flight bookkeeping. Each endpoint carries at most
//! one pending mark; the mark is cleared *before* the completion is handed
//! to its owner so the owner can immediately re-arm the same endpoint.
//!
//! Completion is delivered as a [`Completion`] value moved into the owning
//! function exactly once. Task code that needs to wait for it can park the
//! outcome in a [`TransferSignal`] and poll that with a timeout.

use core::cell::Cell;

use critical_section::Mutex;

use crate::bus::{BusDriver, Transfer};
use crate::error::{Error, Result};
use crate::poll::{self, Clock};
use crate::types::{EndpointAddress, TransferResult};

/// What to do when a submitted transfer completes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OnComplete {
    /// Deliver a [`Completion`] to the function owning the endpoint
    Notify,
    /// Only clear the pending mark
    Discard,
}

/// Completed transfer, delivered once to the owning function
///
/// Deliberately neither `Clone` nor `Copy`: each submission produces
/// exactly one of these.
#[derive(Debug)]
pub struct Completion<'d> {
    endpoint: EndpointAddress,
    result: TransferResult,
    transferred: usize,
    data: &'d [u8],
}

impl<'d> Completion<'d> {
    pub(crate) const fn new(
        endpoint: EndpointAddress,
        result: TransferResult,
        transferred: usize,
        data: &'d [u8],
    ) -> Self {
        Self {
            endpoint,
            result,
            transferred,
            data,
        }
    }

    /// Endpoint the transfer ran on
    #[must_use]
    pub const fn endpoint(&self) -> EndpointAddress {
        self.endpoint
    }

    /// Bus-level result
    #[must_use]
    pub const fn result(&self) -> TransferResult {
        self.result
    }

    /// Number of bytes moved
    #[must_use]
    pub const fn transferred(&self) -> usize {
        self.transferred
    }

    /// Bytes received (OUT transfers); empty for IN transfers
    #[must_use]
    pub const fn data(&self) -> &'d [u8] {
        self.data
    }

    /// Plain summary of the completion that can be stored
    #[must_use]
    pub const fn outcome(&self) -> TransferOutcome {
        TransferOutcome {
            endpoint: self.endpoint,
            result: self.result,
            transferred: self.transferred,
        }
    }
}

/// Copyable summary of a finished transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferOutcome {
    /// Endpoint the transfer ran on
    pub endpoint: EndpointAddress,
    /// Bus-level result
    pub result: TransferResult,
    /// Number of bytes moved
    pub transferred: usize,
}

/// Pending and notify bits, one per endpoint index
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Marks {
    pending: u32,
    notify: u32,
}

impl Marks {
    const fn clear(self, ep: EndpointAddress) -> Self {
        Self {
            pending: self.pending & !bit(ep),
            notify: self.notify & !bit(ep),
        }
    }
}

/// Pending marks for every endpoint address
///
/// Bit `ep.index()` of the pending set is on while a transfer is in
/// flight; the same bit of the notify set records whether the owner wants
/// a completion. Submission usually runs in task context while
/// completions arrive from the bus driver's interrupt, so every
/// read-modify-write of the marks happens inside one critical section.
pub struct TransferRegistry {
    marks: Mutex<Cell<Marks>>,
}

impl TransferRegistry {
    /// Create a registry with every endpoint free
    #[must_use]
    pub const fn new() -> Self {
        Self {
            marks: Mutex::new(Cell::new(Marks {
                pending: 0,
                notify: 0,
            })),
        }
    }

    fn marks(&self) -> Marks {
        critical_section::with(|cs| self.marks.borrow(cs).get())
    }

    /// Check if a transfer is pending on `ep`
    #[must_use]
    pub fn is_pending(&self, ep: EndpointAddress) -> bool {
        self.marks().pending & bit(ep) != 0
    }

    /// Number of endpoints with a pending transfer
    #[must_use]
    pub fn pending_count(&self) -> u32 {
        self.marks().pending.count_ones()
    }

    /// Submit `transfer` on `ep` through `bus`
    ///
    /// The endpoint is marked before the driver is called because the
    /// driver may complete the transfer before returning. If the driver
    /// rejects the transfer the mark is rolled back.
    pub fn submit(
        &self,
        bus: &dyn BusDriver,
        ep: EndpointAddress,
        transfer: Transfer<'_>,
        on_complete: OnComplete,
    ) -> Result<()> {
        if transfer.is_in() != ep.is_in() {
            return Err(Error::WrongDirection);
        }

        critical_section::with(|cs| {
            let cell = self.marks.borrow(cs);
            let mut marks = cell.get();
            if marks.pending & bit(ep) != 0 {
                return Err(Error::Busy);
            }
            marks.pending |= bit(ep);
            match on_complete {
                OnComplete::Notify => marks.notify |= bit(ep),
                OnComplete::Discard => marks.notify &= !bit(ep),
            }
            cell.set(marks);
            Ok(())
        })?;

        // Outside the critical section: the driver may call back into us
        if bus.submit_xfer(ep, transfer) {
            trace!("submitted {} bytes on {}", transfer.len(), ep);
            Ok(())
        } else {
            warn!("bus rejected transfer on {}", ep);
            critical_section::with(|cs| {
                let cell = self.marks.borrow(cs);
                cell.set(cell.get().clear(ep));
            });
            Err(Error::Submission)
        }
    }

    /// Clear the pending mark for a finished transfer
    ///
    /// Returns the completion policy recorded at submission, or `None` if
    /// nothing was pending (stale completion after a reset).
    pub fn complete(&self, ep: EndpointAddress) -> Option<OnComplete> {
        let marks = critical_section::with(|cs| {
            let cell = self.marks.borrow(cs);
            let marks = cell.get();
            cell.set(marks.clear(ep));
            marks
        });
        if marks.pending & bit(ep) == 0 {
            debug!("completion on {} with nothing pending", ep);
            return None;
        }
        Some(if marks.notify & bit(ep) != 0 {
            OnComplete::Notify
        } else {
            OnComplete::Discard
        })
    }

    /// Clear every pending mark without delivering completions
    pub fn reset_all(&self) {
        critical_section::with(|cs| self.marks.borrow(cs).set(Marks::default()));
    }
}

impl Default for TransferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

const fn bit(ep: EndpointAddress) -> u32 {
    1 << ep.index()
}

/// Single-slot mailbox for a completion outcome
///
/// Filled from the completion path (interrupt context), drained from task
/// context. Access is guarded by a critical section.
pub struct TransferSignal {
    slot: Mutex<Cell<Option<TransferOutcome>>>,
}

impl TransferSignal {
    /// Create an empty signal
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    /// Record a completion, replacing any unconsumed one
    pub fn signal(&self, done: &Completion<'_>) {
        let outcome = done.outcome();
        critical_section::with(|cs| self.slot.borrow(cs).set(Some(outcome)));
    }

    /// Take the recorded outcome, if any
    pub fn take(&self) -> Option<TransferOutcome> {
        critical_section::with(|cs| self.slot.borrow(cs).take())
    }

    /// Check whether an outcome is waiting
    #[must_use]
    pub fn is_signalled(&self) -> bool {
        critical_section::with(|cs| self.slot.borrow(cs).get().is_some())
    }

    /// Drop any recorded outcome
    pub fn reset(&self) {
        critical_section::with(|cs| self.slot.borrow(cs).set(None));
    }

    /// Poll until an outcome arrives or `timeout_ms` elapses
    ///
    /// There is no cancellation: on timeout the transfer may still be
    /// pending in the bus driver.
    pub fn wait<C: Clock + ?Sized>(&self, clock: &C, timeout_ms: u32) -> Result<TransferOutcome> {
        let mut outcome = None;
        poll::wait_until(clock, timeout_ms, || {
            outcome = self.take();
            outcome.is_some()
        })?;
        outcome.ok_or(Error::Timeout)
    }
}

impl Default for TransferSignal {
    fn default() -> Self {
        Self::new()
    }
}
