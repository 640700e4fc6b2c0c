//! `LinuxSyscalls` — default `RingSyscalls` implementation.
//!
//! Thin wrappers over the raw io_uring syscalls (glibc has no wrappers for
//! them) plus `mmap`, `eventfd` and `fcntl`. Every call reports failure as
//! the `Errno` left behind by the kernel.

use fsring_core::abi::{IoUringParams, IORING_REGISTER_EVENTFD};
use fsring_core::flags::NOTIFY_EFD_FLAGS;
use fsring_core::syscalls::{RingSyscalls, SysResult};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};

use std::num::NonZeroUsize;
use std::os::unix::io::{BorrowedFd, RawFd};
use std::ptr::{self, NonNull};

#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxSyscalls;

impl LinuxSyscalls {
    pub fn new() -> Self {
        Self
    }

    fn register(&self, ring_fd: RawFd, opcode: u32, arg: *const libc::c_void, nr_args: u32) -> SysResult<()> {
        let ret = unsafe {
            libc::syscall(
                libc::SYS_io_uring_register,
                ring_fd as libc::c_long,
                opcode as libc::c_long,
                arg,
                nr_args as libc::c_long,
            )
        };
        if ret < 0 {
            return Err(Errno::last());
        }
        Ok(())
    }
}

impl RingSyscalls for LinuxSyscalls {
    fn setup(&self, entries: u32, params: &mut IoUringParams) -> SysResult<RawFd> {
        let ret = unsafe {
            libc::syscall(
                libc::SYS_io_uring_setup,
                entries as libc::c_long,
                params as *mut IoUringParams,
            )
        };
        if ret < 0 {
            return Err(Errno::last());
        }
        Ok(ret as RawFd)
    }

    fn enter(&self, ring_fd: RawFd, to_submit: u32, min_complete: u32, flags: u32) -> SysResult<u32> {
        let ret = unsafe {
            libc::syscall(
                libc::SYS_io_uring_enter,
                ring_fd as libc::c_long,
                to_submit as libc::c_long,
                min_complete as libc::c_long,
                flags as libc::c_long,
                ptr::null::<libc::sigset_t>(),
                0 as libc::c_long,
            )
        };
        if ret < 0 {
            return Err(Errno::last());
        }
        Ok(ret as u32)
    }

    fn register_eventfd(&self, ring_fd: RawFd, event_fd: RawFd) -> SysResult<()> {
        let fd: i32 = event_fd;
        self.register(
            ring_fd,
            IORING_REGISTER_EVENTFD,
            &fd as *const i32 as *const libc::c_void,
            1,
        )
    }

    fn set_cloexec(&self, fd: RawFd) -> SysResult<()> {
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map(|_| ())
    }

    fn eventfd(&self) -> SysResult<RawFd> {
        let fd = unsafe { libc::eventfd(0, NOTIFY_EFD_FLAGS) };
        if fd < 0 {
            return Err(Errno::last());
        }
        Ok(fd)
    }

    fn drain_eventfd(&self, fd: RawFd) -> SysResult<u64> {
        let mut buf = [0u8; 8];
        match nix::unistd::read(fd, &mut buf) {
            Ok(8) => Ok(u64::from_ne_bytes(buf)),
            Ok(_) => Err(Errno::EIO),
            // Nothing pending on a non-blocking eventfd.
            Err(Errno::EAGAIN) => Ok(0),
            Err(e) => Err(e),
        }
    }

    unsafe fn map(&self, ring_fd: RawFd, len: usize, offset: u64) -> SysResult<NonNull<u8>> {
        let len = NonZeroUsize::new(len).ok_or(Errno::EINVAL)?;
        let fd = BorrowedFd::borrow_raw(ring_fd);
        let addr = mmap(
            None,
            len,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED | MapFlags::MAP_POPULATE,
            fd,
            offset as libc::off_t,
        )?;
        Ok(addr.cast())
    }

    unsafe fn unmap(&self, addr: NonNull<u8>, len: usize) -> SysResult<()> {
        munmap(addr.cast(), len)
    }

    fn close(&self, fd: RawFd) -> SysResult<()> {
        nix::unistd::close(fd)
    }
}
