//! Cooperative timed waits
//!
//! Nothing in the stack blocks. Waiting for buffer space or a transfer
//! completion is a bounded poll loop against an injected [`Clock`], so it
//! can run on the target with a hardware timer and on the host with a fake
//! clock.

use crate::error::{Error, Result};

/// Monotonic millisecond time source
pub trait Clock {
    /// Milliseconds since an arbitrary fixed point
    fn now_ms(&self) -> u64;

    /// Called between polls; yield to other work here
    fn relax(&self) {}
}

/// Poll `ready` until it returns true or `timeout_ms` has elapsed
///
/// `ready` is checked at least once, even with a zero timeout. Must not be
/// called from inside a critical section.
pub fn wait_until<C, F>(clock: &C, timeout_ms: u32, mut ready: F) -> Result<()>
where
    C: Clock + ?Sized,
    F: FnMut() -> bool,
{
    let start = clock.now_ms();
    loop {
        if ready() {
            return Ok(());
        }
        if clock.now_ms().saturating_sub(start) >= u64::from(timeout_ms) {
            return Err(Error::Timeout);
        }
        clock.relax();
    }
}

/// Clock backed by `embassy-time`
///
/// `relax` busy-waits one poll interval; prefer [`wait_until_async`] inside
/// an executor.
#[cfg(feature = "embedded")]
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embedded")]
impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }

    fn relax(&self) {
        embassy_time::block_for(embassy_time::Duration::from_millis(u64::from(
            crate::config::DEFAULT_POLL_INTERVAL_MS,
        )));
    }
}

/// Async variant of [`wait_until`] that yields to the executor between polls
#[cfg(feature = "embedded")]
pub async fn wait_until_async<F>(timeout_ms: u32, mut ready: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    use embassy_time::{Duration, Instant};

    let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));
    loop {
        if ready() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout);
        }
        embassy_futures::yield_now().await;
    }
}
