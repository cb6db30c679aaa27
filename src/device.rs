//! Device Composer
//!
//! Central registry of [`Function`]s. The bus driver calls into the
//! composer for descriptors, control transfers, transfer completions and
//! bus lifecycle events; functions call back into it to move data.
//!
//! ```text
//!   Bus driver ──► Composer ──► Function (by interface number)
//!        ▲            │    └──► Function (by endpoint owner map)
//!        └────────────┘ submit / stall / control data
//! ```
//!
//! The composer is an explicit context object: the application creates one,
//! registers its functions and hands `&Composer` to the bus driver. There is
//! no global device instance.
//!
//! # Execution context
//!
//! The composer keeps its state in `Cell`/`RefCell` and is neither `Send`
//! nor `Sync`. Bus driver callbacks, `submit` and every function hook must
//! run in one execution context, usually the USB interrupt handler or the
//! task that polls the bus driver. Data crosses to other contexts through
//! [`StreamBuffer`](crate::buffer::StreamBuffer) and
//! [`TransferSignal`](crate::transfer::TransferSignal), which are
//! interrupt-safe. [`TransferRegistry`] is also safe to share on its own.

mod enumeration;
mod routing;

use core::cell::{Cell, RefCell};

use heapless::Vec;

use crate::bus::{BusDriver, Transfer};
use crate::config::{DeviceConfig, CONTROL_BUFFER_SIZE, MAX_FUNCTIONS, MAX_STRINGS};
use crate::descriptor::{self, descriptor_type};
use crate::error::{Error, Result};
use crate::function::Function;
use crate::transfer::{Completion, OnComplete, TransferRegistry};
use crate::types::{EndpointAddress, TransferResult};

pub use enumeration::ConfigurationDescriptor;

use routing::ControlState;

/// Owning function index for every endpoint address, rebuilt by each
/// configuration descriptor build
type EndpointOwners = [Option<u8>; EndpointAddress::COUNT];

/// Composite device built from registered functions
pub struct Composer<'a> {
    bus: &'a dyn BusDriver,
    config: DeviceConfig,
    functions: Vec<&'a dyn Function, MAX_FUNCTIONS>,
    transfers: TransferRegistry,
    owners: Cell<EndpointOwners>,
    strings: RefCell<Vec<&'static str, MAX_STRINGS>>,
    configured: Cell<bool>,
    control: Cell<Option<ControlState>>,
    control_buf: RefCell<[u8; CONTROL_BUFFER_SIZE]>,
}

impl<'a> Composer<'a> {
    /// Create a composer with no functions
    pub fn new(bus: &'a dyn BusDriver, config: DeviceConfig) -> Self {
        Self {
            bus,
            config,
            functions: Vec::new(),
            transfers: TransferRegistry::new(),
            owners: Cell::new([None; EndpointAddress::COUNT]),
            strings: RefCell::new(Vec::new()),
            configured: Cell::new(false),
            control: Cell::new(None),
            control_buf: RefCell::new([0; CONTROL_BUFFER_SIZE]),
        }
    }

    /// Device overrides in effect
    #[must_use]
    pub const fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Replace the device overrides
    ///
    /// Takes effect on the next descriptor request; call
    /// [`reenumerate`](Self::reenumerate) to make the host ask again.
    pub fn set_config(&mut self, config: DeviceConfig) {
        self.config = config;
    }

    /// Append a function; it gets the next interface number
    ///
    /// Functions cannot be added while the host has the device configured.
    pub fn register(&mut self, function: &'a dyn Function) -> Result<()> {
        if self.configured.get() {
            warn!("register rejected: device configured");
            return Err(Error::AlreadyOpen);
        }
        self.functions
            .push(function)
            .map_err(|_| Error::TooManyFunctions)?;
        info!("registered function {}", self.functions.len() - 1);
        Ok(())
    }

    /// Remove a previously registered function
    ///
    /// Later functions move down one interface number. Transfers pending on
    /// the removed function's endpoints are the caller's responsibility.
    pub fn unregister(&mut self, function: &dyn Function) -> Result<()> {
        let target = data_ptr(function);
        let pos = self
            .functions
            .iter()
            .position(|f| data_ptr(*f) == target)
            .ok_or(Error::NotRegistered)?;
        self.functions.remove(pos);

        // Drop the removed function's endpoints and shift later owners down
        let mut owners = self.owners.get();
        for owner in &mut owners {
            *owner = match *owner {
                Some(i) if usize::from(i) == pos => None,
                Some(i) if usize::from(i) > pos => Some(i - 1),
                other => other,
            };
        }
        self.owners.set(owners);

        info!("unregistered function {}", pos);
        Ok(())
    }

    /// Registered functions in interface order
    #[must_use]
    pub fn functions(&self) -> &[&'a dyn Function] {
        &self.functions
    }

    /// Ask the bus driver to disconnect and reconnect
    ///
    /// Changes no composer state; the host re-reads every descriptor.
    pub fn reenumerate(&self) {
        info!("re-enumerating");
        self.bus.reenumerate();
    }

    /// True after Set-Configuration until the next bus reset
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured.get()
    }

    /// Number of interfaces in front of the registered functions
    #[must_use]
    pub fn builtin_interfaces(&self) -> u8 {
        if self.config.include_static {
            self.bus.static_descriptors().interfaces
        } else {
            0
        }
    }

    /// Function owning `ep` in the current configuration
    #[must_use]
    pub fn endpoint_owner(&self, ep: EndpointAddress) -> Option<&'a dyn Function> {
        let idx = self.owners.get()[ep.index()]?;
        self.functions.get(usize::from(idx)).copied()
    }

    /// Function at interface number `interface`
    #[must_use]
    pub fn interface_function(&self, interface: u8) -> Option<&'a dyn Function> {
        let idx = interface.checked_sub(self.builtin_interfaces())?;
        self.functions.get(usize::from(idx)).copied()
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    /// Submit a transfer through the registry
    pub fn submit(
        &self,
        ep: EndpointAddress,
        transfer: Transfer<'_>,
        on_complete: OnComplete,
    ) -> Result<()> {
        self.transfers.submit(self.bus, ep, transfer, on_complete)
    }

    /// Check for a pending transfer on `ep`
    #[must_use]
    pub fn is_pending(&self, ep: EndpointAddress) -> bool {
        self.transfers.is_pending(ep)
    }

    /// Transfer registry
    #[must_use]
    pub const fn transfers(&self) -> &TransferRegistry {
        &self.transfers
    }

    /// Set or clear STALL on an endpoint owned by a registered function
    pub fn set_stall(&self, ep: EndpointAddress, stall: bool) -> Result<()> {
        if self.endpoint_owner(ep).is_none() {
            return Err(Error::UnknownEndpoint);
        }
        debug!("{} stall {}", ep, stall);
        self.bus.set_ep_stall(ep, stall);
        Ok(())
    }

    /// STALL state of an endpoint owned by a registered function
    pub fn get_stall(&self, ep: EndpointAddress) -> Result<bool> {
        if self.endpoint_owner(ep).is_none() {
            return Err(Error::UnknownEndpoint);
        }
        Ok(self.bus.get_ep_stall(ep))
    }

    /// Bus driver callback: a transfer on `ep` finished
    ///
    /// `data` holds the received bytes for OUT transfers and is empty for
    /// IN transfers. The pending mark is cleared before the owning function
    /// sees the completion.
    pub fn xfer_complete(
        &self,
        ep: EndpointAddress,
        result: TransferResult,
        transferred: usize,
        data: &[u8],
    ) {
        trace!("{} complete: {} ({} bytes)", ep, result, transferred);
        let Some(OnComplete::Notify) = self.transfers.complete(ep) else {
            return;
        };
        match self.endpoint_owner(ep) {
            Some(function) => {
                function.on_transfer_complete(self, Completion::new(ep, result, transferred, data));
            }
            None => debug!("completion on {} with no owner", ep),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Bus driver callback: Set-Configuration claimed these interface numbers
    ///
    /// Numbers below the built-in offset belong to the bus driver and
    /// numbers with no registered function are ignored.
    pub fn dispatch_open(&self, claimed: &[u8]) {
        for &interface in claimed {
            match self.interface_function(interface) {
                Some(function) => function.on_open(),
                None => debug!("open: no function at interface {}", interface),
            }
        }
        self.configured.set(true);
        info!("configured, {} interfaces claimed", claimed.len());
    }

    /// Bus driver callback: Set-Configuration claimed this descriptor block
    ///
    /// Every interface descriptor in the block opens its function. The
    /// block is validated before anything is opened.
    pub fn open_claimed(&self, descriptors: &[u8]) -> Result<()> {
        for entry in descriptor::walk(descriptors) {
            entry?;
        }
        for entry in descriptor::walk(descriptors) {
            let (kind, bytes) = entry?;
            if kind != descriptor_type::INTERFACE {
                continue;
            }
            let interface = *bytes.get(2).ok_or(Error::MalformedDescriptor)?;
            match self.interface_function(interface) {
                Some(function) => function.on_open(),
                None => debug!("open: no function at interface {}", interface),
            }
        }
        self.configured.set(true);
        Ok(())
    }

    /// Bus driver callback: bus reset
    ///
    /// Forgets every pending transfer without completing it, then closes
    /// every function.
    pub fn dispatch_reset(&self) {
        self.transfers.reset_all();
        self.control.set(None);
        for function in &self.functions {
            function.on_reset();
        }
        self.configured.set(false);
        info!("bus reset");
    }
}

/// Data address of a trait object, ignoring its vtable
fn data_ptr<'f>(function: &'f (dyn Function + 'f)) -> *const () {
    (function as *const (dyn Function + 'f)).cast::<()>()
}
