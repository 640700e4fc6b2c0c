//! Kernel-facing operations used by the ring.
//!
//! A `RingSyscalls` implementation is the only thing that talks to the OS.
//! The ring mapper and both queues are written against this trait so they
//! can run against a software kernel in tests.
//!
//! # Implementors
//!
//! - `LinuxSyscalls` (default): raw `io_uring_setup` / `io_uring_enter` /
//!   `io_uring_register`, `mmap`, `eventfd`.
//! - `SimKernel` (feature = "sim"): anonymous memory plus a userspace model
//!   of the kernel side of the ring protocol.

use std::os::unix::io::RawFd;
use std::ptr::NonNull;

use nix::errno::Errno;

use crate::abi::IoUringParams;

pub type SysResult<T> = std::result::Result<T, Errno>;

/// Stateless wrappers around the io_uring entry points and the handful of
/// descriptor and memory primitives the ring needs.
///
/// **Contract:** no method blocks except `enter`, and `enter` is only ever
/// called with `min_complete == 0` and no wait flag.
pub trait RingSyscalls {
    /// io_uring_setup(2). Fills `params` and returns the ring fd.
    fn setup(&self, entries: u32, params: &mut IoUringParams) -> SysResult<RawFd>;

    /// io_uring_enter(2). Returns how many SQEs the kernel consumed.
    fn enter(&self, ring_fd: RawFd, to_submit: u32, min_complete: u32, flags: u32) -> SysResult<u32>;

    /// io_uring_register(2) with `IORING_REGISTER_EVENTFD`.
    fn register_eventfd(&self, ring_fd: RawFd, event_fd: RawFd) -> SysResult<()>;

    /// Set `FD_CLOEXEC` on a descriptor.
    fn set_cloexec(&self, fd: RawFd) -> SysResult<()>;

    /// Create a non-blocking, close-on-exec eventfd with a zero counter.
    fn eventfd(&self) -> SysResult<RawFd>;

    /// Read and reset the eventfd counter. Returns 0 when nothing is pending.
    fn drain_eventfd(&self, fd: RawFd) -> SysResult<u64>;

    /// Map `len` bytes of the ring at one of the `IORING_OFF_*` offsets.
    ///
    /// # Safety
    /// The returned memory is shared with the kernel; the caller must
    /// only access it through the ring protocol and must unmap it once.
    unsafe fn map(&self, ring_fd: RawFd, len: usize, offset: u64) -> SysResult<NonNull<u8>>;

    /// # Safety
    /// `addr`/`len` must describe a live mapping returned by `map`.
    unsafe fn unmap(&self, addr: NonNull<u8>, len: usize) -> SysResult<()>;

    fn close(&self, fd: RawFd) -> SysResult<()>;
}
