//! Stream Buffer
//!
//! Interrupt-safe single-producer/single-consumer byte buffer that hands
//! out zero-copy windows for both sides.
//!
//! The region is always laid out as:
//!
//! ```text
//! [0, n)   readable data waiting for the consumer
//! [n, w)   free space
//! [w, N)   pending write window (w == N when no write is pending)
//! ```
//!
//! Readable data always starts at index 0: finishing a read moves the
//! remaining bytes to the front, and finishing a write relocates the new
//! bytes to follow the readable data if a read completed in the meantime.
//! Balanced, whole-buffer reads and writes never copy.
//!
//! Cursor updates, and the compaction or relocation copy that goes with
//! them, run inside a short critical section. Filling a write window and
//! reading a read window happen outside it.
//!
//! # Example
//!
//! ```
//! use usbd_compose::buffer::StreamBuffer;
//!
//! let mut buf = StreamBuffer::<16>::new();
//! assert_eq!(buf.write(b"12345678"), 8);
//! let mut out = [0u8; 16];
//! assert_eq!(buf.readinto(&mut out), 8);
//! assert_eq!(&out[..8], b"12345678");
//! ```

#![allow(unsafe_code)]

use core::cell::{Cell, UnsafeCell};
use core::marker::PhantomData;
use core::{ptr, slice};

use critical_section::Mutex;

#[derive(Clone, Copy, Debug)]
struct Cursors {
    /// Readable bytes, starting at index 0
    n: usize,
    /// Start of the pending write window
    w: usize,
}

/// Fixed-capacity SPSC byte buffer
pub struct StreamBuffer<const N: usize> {
    data: UnsafeCell<[u8; N]>,
    cursors: Mutex<Cell<Cursors>>,
}

// SAFETY: byte access is split between one `Producer` (only `[w, N)` and,
// while relocating, `[n, n + k)`) and one `Consumer` (only `[0, n)`). The
// regions are disjoint because `n <= w` and only the consumer shrinks `n`.
// Cursor updates happen under a critical section.
unsafe impl<const N: usize> Sync for StreamBuffer<N> {}

impl<const N: usize> StreamBuffer<N> {
    /// Create an empty buffer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: UnsafeCell::new([0; N]),
            cursors: Mutex::new(Cell::new(Cursors { n: 0, w: N })),
        }
    }

    /// Total size in bytes
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes waiting to be read (exact only with no read window pending)
    #[must_use]
    pub fn readable(&self) -> usize {
        self.cursors().n
    }

    /// Free bytes (exact only with no write window pending)
    #[must_use]
    pub fn writable(&self) -> usize {
        N - self.cursors().n
    }

    /// Drop all data and any pending write window
    pub fn clear(&mut self) {
        self.cursors.get_mut().set(Cursors { n: 0, w: N });
    }

    /// Split into producer and consumer handles
    ///
    /// The handles can live in different execution contexts (task and
    /// interrupt). The buffer is exclusively borrowed until both are dropped.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let shared: &Self = self;
        (
            Producer {
                buf: shared,
                _not_clone: PhantomData,
            },
            Consumer {
                buf: shared,
                _not_clone: PhantomData,
            },
        )
    }

    /// Writable window `[n, N)`; may be called again without finishing
    pub fn pend_write(&mut self) -> &mut [u8] {
        let start = self.begin_write();
        &mut self.data.get_mut()[start..]
    }

    /// Commit `k` bytes written into the last [`pend_write`](Self::pend_write) window
    ///
    /// # Panics
    ///
    /// If `k` is larger than the pending window.
    pub fn finish_write(&mut self, k: usize) {
        self.commit_write(k);
    }

    /// Copy as much of `bytes` as fits; returns the number copied
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let window = self.pend_write();
        let k = bytes.len().min(window.len());
        if k > 0 {
            window[..k].copy_from_slice(&bytes[..k]);
            self.finish_write(k);
        }
        k
    }

    /// Readable window `[0, n)`
    pub fn pend_read(&mut self) -> &[u8] {
        let n = self.cursors().n;
        &self.data.get_mut()[..n]
    }

    /// Consume `k` bytes from the front
    ///
    /// # Panics
    ///
    /// If `k` is larger than the readable data.
    pub fn finish_read(&mut self, k: usize) {
        self.commit_read(k);
    }

    /// Move as many bytes as fit into `out`; returns the number moved
    pub fn readinto(&mut self, out: &mut [u8]) -> usize {
        let window = self.pend_read();
        let k = window.len().min(out.len());
        if k > 0 {
            out[..k].copy_from_slice(&window[..k]);
            self.finish_read(k);
        }
        k
    }

    fn cursors(&self) -> Cursors {
        critical_section::with(|cs| self.cursors.borrow(cs).get())
    }

    fn base(&self) -> *mut u8 {
        self.data.get().cast::<u8>()
    }

    /// Open a write window at the current end of data, returns its start
    fn begin_write(&self) -> usize {
        critical_section::with(|cs| {
            let cell = self.cursors.borrow(cs);
            let mut c = cell.get();
            c.w = c.n;
            cell.set(c);
            c.w
        })
    }

    fn commit_write(&self, k: usize) {
        critical_section::with(|cs| {
            let cell = self.cursors.borrow(cs);
            let mut c = cell.get();
            assert!(k <= N - c.w, "finish_write past the pending window");
            if c.n < c.w {
                // Data was consumed while the write was pending
                // SAFETY: both ranges lie inside the buffer (n + k <= w + k <= N)
                // and belong to the producer; ptr::copy allows overlap.
                unsafe { ptr::copy(self.base().add(c.w), self.base().add(c.n), k) };
            }
            c.n += k;
            c.w = N;
            cell.set(c);
        });
    }

    fn commit_read(&self, k: usize) {
        critical_section::with(|cs| {
            let cell = self.cursors.borrow(cs);
            let mut c = cell.get();
            assert!(k <= c.n, "finish_read past the readable data");
            c.n -= k;
            // SAFETY: source [k, k + n) and destination [0, n) lie inside the
            // old readable region, which only the consumer touches.
            unsafe { ptr::copy(self.base().add(k), self.base(), c.n) };
            cell.set(c);
        });
    }
}

impl<const N: usize> Default for StreamBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half of a split [`StreamBuffer`]
pub struct Producer<'b, const N: usize> {
    buf: &'b StreamBuffer<N>,
    _not_clone: PhantomData<&'b mut ()>,
}

impl<const N: usize> Producer<'_, N> {
    /// Free bytes (exact only with no write window pending)
    #[must_use]
    pub fn writable(&self) -> usize {
        self.buf.writable()
    }

    /// Writable window `[n, N)`
    pub fn pend_write(&mut self) -> &mut [u8] {
        let start = self.buf.begin_write();
        // SAFETY: [start, N) is the pending window, owned by the producer
        // until `finish_write`; the consumer only touches [0, n) with n <= start.
        unsafe { slice::from_raw_parts_mut(self.buf.base().add(start), N - start) }
    }

    /// Commit `k` bytes written into the pending window
    ///
    /// # Panics
    ///
    /// If `k` is larger than the pending window.
    pub fn finish_write(&mut self, k: usize) {
        self.buf.commit_write(k);
    }

    /// Copy as much of `bytes` as fits; returns the number copied
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let window = self.pend_write();
        let k = bytes.len().min(window.len());
        if k > 0 {
            window[..k].copy_from_slice(&bytes[..k]);
            self.finish_write(k);
        }
        k
    }
}

/// Reading half of a split [`StreamBuffer`]
pub struct Consumer<'b, const N: usize> {
    buf: &'b StreamBuffer<N>,
    _not_clone: PhantomData<&'b mut ()>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Bytes waiting to be read
    #[must_use]
    pub fn readable(&self) -> usize {
        self.buf.readable()
    }

    /// Readable window `[0, n)`
    ///
    /// The window stays valid while the producer appends more data.
    pub fn pend_read(&mut self) -> &[u8] {
        let n = self.buf.cursors().n;
        // SAFETY: [0, n) is readable data; the producer never writes below n
        // and only the consumer lowers n.
        unsafe { slice::from_raw_parts(self.buf.base(), n) }
    }

    /// Consume `k` bytes from the front
    ///
    /// # Panics
    ///
    /// If `k` is larger than the readable data.
    pub fn finish_read(&mut self, k: usize) {
        self.buf.commit_read(k);
    }

    /// Move as many bytes as fit into `out`; returns the number moved
    pub fn readinto(&mut self, out: &mut [u8]) -> usize {
        let window = self.pend_read();
        let k = window.len().min(out.len());
        if k > 0 {
            out[..k].copy_from_slice(&window[..k]);
            self.finish_read(k);
        }
        k
    }
}
