//! Unified error type for the composition engine.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use core::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Top-level error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Transfers
    /// A transfer is already pending on the endpoint.
    Busy,

    /// The function has not been opened by the host (or was reset since).
    NotOpen,

    /// The bus driver refused to queue the transfer.
    Submission,

    /// The endpoint is not owned by any function in the current configuration.
    UnknownEndpoint,

    /// Transfer kind does not match the endpoint direction.
    WrongDirection,

    // Control
    /// Control data length disagrees with the request's `wLength`.
    InvalidLength,

    // Composition
    /// The device is configured and functions cannot be hot-added.
    AlreadyOpen,

    /// No room for another function.
    TooManyFunctions,

    /// The function is not registered with this device.
    NotRegistered,

    /// Descriptor bytes, string table or endpoint list exceeded its capacity.
    BufferOverflow,

    /// A descriptor handed to us by the bus driver could not be walked.
    MalformedDescriptor,

    // Generic
    /// Cooperative wait ran out of time.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Busy => "transfer already pending on endpoint",
            Self::NotOpen => "function not open",
            Self::Submission => "bus driver rejected transfer",
            Self::UnknownEndpoint => "endpoint not owned by any function",
            Self::WrongDirection => "transfer direction does not match endpoint",
            Self::InvalidLength => "control data length mismatch",
            Self::AlreadyOpen => "device already configured",
            Self::TooManyFunctions => "function table full",
            Self::NotRegistered => "function not registered",
            Self::BufferOverflow => "descriptor buffer overflow",
            Self::MalformedDescriptor => "malformed descriptor",
            Self::Timeout => "timed out",
        };
        f.write_str(msg)
    }
}
