//! `SimKernel` — software model of the kernel side of io_uring.
//!
//! Implements `RingSyscalls` over anonymous memory so the ring protocol can
//! be exercised on hosts without io_uring and with precise fault
//! injection. Descriptors are fake numbers starting at 100; they are never
//! passed to the real kernel.
//!
//! What the model covers:
//!
//! - `enter` moves published SQEs into an in-flight list and advances SQ
//!   head, unless the SQ is stalled.
//! - `complete_next` / `post` write CQEs at CQ tail and bump the eventfd
//!   counter. A full CQ increments the overflow counter instead.
//!
//! Clones share state, so a test keeps one handle while the ring owns the
//! other.

use std::collections::{HashMap, VecDeque};
use std::os::unix::io::RawFd;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use fsring_core::abi::{
    CqRingOffsets, Cqe, IoUringParams, SqRingOffsets, Sqe, IORING_OFF_CQ_RING, IORING_OFF_SQES,
    IORING_OFF_SQ_RING, IORING_SETUP_CQSIZE, MAX_ENTRIES,
};
use fsring_core::syscalls::{RingSyscalls, SysResult};
use nix::errno::Errno;

use crate::index::{occupancy, slot};

const FIRST_FD: RawFd = 100;

const SQ_OFF: SqRingOffsets = SqRingOffsets {
    head: 0,
    tail: 64,
    ring_mask: 128,
    ring_entries: 132,
    flags: 136,
    dropped: 140,
    array: 192,
    resv1: 0,
    user_addr: 0,
};

const CQ_OFF: CqRingOffsets = CqRingOffsets {
    head: 0,
    tail: 64,
    ring_mask: 128,
    ring_entries: 132,
    overflow: 136,
    cqes: 192,
    flags: 140,
    resv1: 0,
    user_addr: 0,
};

/// Steps of ring construction that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimStep {
    Setup,
    Cloexec,
    MapSqRing,
    MapSqes,
    MapCqRing,
    Eventfd,
    Register,
}

impl SimStep {
    pub const ALL: &'static [SimStep] = &[
        SimStep::Setup,
        SimStep::Cloexec,
        SimStep::MapSqRing,
        SimStep::MapSqes,
        SimStep::MapCqRing,
        SimStep::Eventfd,
        SimStep::Register,
    ];

    fn for_offset(offset: u64) -> Option<Self> {
        match offset {
            IORING_OFF_SQ_RING => Some(SimStep::MapSqRing),
            IORING_OFF_SQES => Some(SimStep::MapSqes),
            IORING_OFF_CQ_RING => Some(SimStep::MapCqRing),
            _ => None,
        }
    }
}

/// Resource lifecycle log, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Setup(RawFd),
    Cloexec(RawFd),
    /// Mapping created at this `IORING_OFF_*` offset.
    Map(u64),
    Unmap(u64),
    Eventfd(RawFd),
    Register(RawFd),
    Close(RawFd),
}

/// One `io_uring_enter` call as seen by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimEnter {
    pub to_submit: u32,
    pub min_complete: u32,
    pub flags: u32,
    /// SQEs moved off the ring by this call.
    pub consumed: u32,
}

struct Mapping {
    addr: usize,
    len: usize,
    offset: u64,
}

#[derive(Default)]
struct SimState {
    next_fd: RawFd,
    open: Vec<RawFd>,
    failures: HashMap<SimStep, Errno>,
    close_failures: HashMap<RawFd, Errno>,
    enter_errors: VecDeque<Errno>,
    accept_nothing: bool,
    stalled: bool,

    params: IoUringParams,
    ring_fd: Option<RawFd>,
    event_fd: Option<RawFd>,
    registered: Option<RawFd>,
    eventfd_count: u64,

    mappings: Vec<Mapping>,
    sq_ring: usize,
    sqes: usize,
    cq_ring: usize,

    in_flight: VecDeque<Sqe>,
    enters: Vec<SimEnter>,
    events: Vec<SimEvent>,
}

impl SimState {
    fn fail(&mut self, step: SimStep) -> SysResult<()> {
        match self.failures.remove(&step) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn alloc_fd(&mut self) -> RawFd {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.open.push(fd);
        fd
    }

    fn is_open(&self, fd: RawFd) -> bool {
        self.open.contains(&fd)
    }

    /// Atomic view of a ring header word. `base` must be a live mapping.
    fn u32_at<'a>(base: usize, off: u32) -> &'a AtomicU32 {
        unsafe { &*((base + off as usize) as *const AtomicU32) }
    }

    /// Move up to `max` published SQEs into the in-flight list.
    fn consume_sq(&mut self, max: u32) -> u32 {
        if self.sq_ring == 0 || self.sqes == 0 {
            return 0;
        }
        let head_ref = Self::u32_at(self.sq_ring, SQ_OFF.head);
        let tail = Self::u32_at(self.sq_ring, SQ_OFF.tail).load(Ordering::Acquire);
        let mut head = head_ref.load(Ordering::Relaxed);
        let mask = self.params.sq_entries - 1;
        let array = (self.sq_ring + SQ_OFF.array as usize) as *const u32;

        let mut consumed = 0;
        while consumed < max && occupancy(head, tail) > 0 {
            let idx = unsafe { ptr::read_volatile(array.add(slot(head, mask))) };
            let sqe = unsafe { ptr::read((self.sqes as *const Sqe).add((idx & mask) as usize)) };
            self.in_flight.push_back(sqe);
            head = head.wrapping_add(1);
            consumed += 1;
        }
        head_ref.store(head, Ordering::Release);
        consumed
    }

    fn post(&mut self, token: u64, res: i32) -> bool {
        if self.cq_ring == 0 {
            return false;
        }
        let head = Self::u32_at(self.cq_ring, CQ_OFF.head).load(Ordering::Acquire);
        let tail_ref = Self::u32_at(self.cq_ring, CQ_OFF.tail);
        let tail = tail_ref.load(Ordering::Relaxed);

        if occupancy(head, tail) >= self.params.cq_entries {
            Self::u32_at(self.cq_ring, CQ_OFF.overflow).fetch_add(1, Ordering::Release);
            return false;
        }

        let mask = self.params.cq_entries - 1;
        unsafe {
            let cqe = ((self.cq_ring + CQ_OFF.cqes as usize) as *mut Cqe).add(slot(tail, mask));
            ptr::write_volatile(cqe, Cqe { user_data: token, res, flags: 0 });
        }
        tail_ref.store(tail.wrapping_add(1), Ordering::Release);
        if self.registered.is_some() {
            self.eventfd_count += 1;
        }
        true
    }
}

impl Drop for SimState {
    fn drop(&mut self) {
        for m in self.mappings.drain(..) {
            unsafe {
                libc::munmap(m.addr as *mut libc::c_void, m.len);
            }
        }
    }
}

#[derive(Clone)]
pub struct SimKernel {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SimKernel {
    pub fn new() -> Self {
        let mut state = SimState::default();
        state.next_fd = FIRST_FD;
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Fault injection ──

    /// Fail the next occurrence of `step` with `errno`.
    pub fn fail_at(&self, step: SimStep, errno: Errno) {
        self.lock().failures.insert(step, errno);
    }

    /// Fail the next `io_uring_enter` with `errno`.
    pub fn fail_next_enter(&self, errno: Errno) {
        self.lock().enter_errors.push_back(errno);
    }

    /// Make the next `io_uring_enter` return 0 without consuming anything.
    pub fn accept_nothing_next(&self) {
        self.lock().accept_nothing = true;
    }

    /// Fail `close(fd)` once. The descriptor stays open.
    pub fn fail_close(&self, fd: RawFd, errno: Errno) {
        self.lock().close_failures.insert(fd, errno);
    }

    /// While stalled, `enter` accepts submissions but leaves them on the
    /// ring, so SQ occupancy builds up.
    pub fn stall_sq(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    /// Consume everything currently published on the SQ.
    pub fn drain_sq(&self) -> u32 {
        self.lock().consume_sq(u32::MAX)
    }

    // ── Completions ──

    /// Complete the oldest in-flight SQE with `res`. Returns its token.
    pub fn complete_next(&self, res: i32) -> Option<u64> {
        let mut st = self.lock();
        let sqe = st.in_flight.pop_front()?;
        st.post(sqe.user_data, res);
        Some(sqe.user_data)
    }

    /// Complete every in-flight SQE with `res`.
    pub fn complete_all(&self, res: i32) -> usize {
        let mut n = 0;
        while self.complete_next(res).is_some() {
            n += 1;
        }
        n
    }

    /// Write a CQE directly. Returns false if the CQ was full and the
    /// completion was counted as overflow instead.
    pub fn post(&self, token: u64, res: i32) -> bool {
        self.lock().post(token, res)
    }

    pub fn set_overflow(&self, n: u32) {
        let st = self.lock();
        if st.cq_ring != 0 {
            SimState::u32_at(st.cq_ring, CQ_OFF.overflow).store(n, Ordering::Release);
        }
    }

    // ── Inspection ──

    /// Tokens of SQEs consumed but not yet completed, oldest first.
    pub fn in_flight(&self) -> Vec<u64> {
        self.lock().in_flight.iter().map(|s| s.user_data).collect()
    }

    pub fn in_flight_sqes(&self) -> Vec<Sqe> {
        self.lock().in_flight.iter().copied().collect()
    }

    pub fn enter_calls(&self) -> usize {
        self.lock().enters.len()
    }

    pub fn enters(&self) -> Vec<SimEnter> {
        self.lock().enters.clone()
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().events.clone()
    }

    pub fn open_fds(&self) -> Vec<RawFd> {
        self.lock().open.clone()
    }

    pub fn live_mappings(&self) -> usize {
        self.lock().mappings.len()
    }
}

impl RingSyscalls for SimKernel {
    fn setup(&self, entries: u32, params: &mut IoUringParams) -> SysResult<RawFd> {
        let mut st = self.lock();
        st.fail(SimStep::Setup)?;
        // One ring per simulated kernel.
        if st.ring_fd.is_some() {
            return Err(Errno::EBUSY);
        }
        if entries == 0 || entries > MAX_ENTRIES {
            return Err(Errno::EINVAL);
        }

        let sq = entries.next_power_of_two();
        let cq = if params.flags & IORING_SETUP_CQSIZE != 0 {
            if params.cq_entries == 0 || params.cq_entries > 2 * MAX_ENTRIES {
                return Err(Errno::EINVAL);
            }
            let cq = params.cq_entries.next_power_of_two();
            if cq < sq {
                return Err(Errno::EINVAL);
            }
            cq
        } else {
            2 * sq
        };

        params.sq_entries = sq;
        params.cq_entries = cq;
        params.sq_off = SQ_OFF;
        params.cq_off = CQ_OFF;
        st.params = *params;

        let fd = st.alloc_fd();
        st.ring_fd = Some(fd);
        st.events.push(SimEvent::Setup(fd));
        Ok(fd)
    }

    fn enter(&self, ring_fd: RawFd, to_submit: u32, min_complete: u32, flags: u32) -> SysResult<u32> {
        let mut st = self.lock();
        let mut record = SimEnter { to_submit, min_complete, flags, consumed: 0 };

        let result = if st.ring_fd != Some(ring_fd) {
            Err(Errno::EBADF)
        } else if let Some(e) = st.enter_errors.pop_front() {
            Err(e)
        } else if st.accept_nothing {
            st.accept_nothing = false;
            Ok(0)
        } else if st.stalled {
            Ok(to_submit)
        } else {
            record.consumed = st.consume_sq(to_submit);
            Ok(record.consumed)
        };

        st.enters.push(record);
        result
    }

    fn register_eventfd(&self, ring_fd: RawFd, event_fd: RawFd) -> SysResult<()> {
        let mut st = self.lock();
        st.fail(SimStep::Register)?;
        if st.ring_fd != Some(ring_fd) || !st.is_open(event_fd) {
            return Err(Errno::EBADF);
        }
        if st.registered.is_some() {
            return Err(Errno::EBUSY);
        }
        st.registered = Some(event_fd);
        st.events.push(SimEvent::Register(event_fd));
        Ok(())
    }

    fn set_cloexec(&self, fd: RawFd) -> SysResult<()> {
        let mut st = self.lock();
        st.fail(SimStep::Cloexec)?;
        if !st.is_open(fd) {
            return Err(Errno::EBADF);
        }
        st.events.push(SimEvent::Cloexec(fd));
        Ok(())
    }

    fn eventfd(&self) -> SysResult<RawFd> {
        let mut st = self.lock();
        st.fail(SimStep::Eventfd)?;
        let fd = st.alloc_fd();
        st.event_fd = Some(fd);
        st.eventfd_count = 0;
        st.events.push(SimEvent::Eventfd(fd));
        Ok(fd)
    }

    fn drain_eventfd(&self, fd: RawFd) -> SysResult<u64> {
        let mut st = self.lock();
        if st.event_fd != Some(fd) {
            return Err(Errno::EBADF);
        }
        Ok(std::mem::take(&mut st.eventfd_count))
    }

    unsafe fn map(&self, ring_fd: RawFd, len: usize, offset: u64) -> SysResult<NonNull<u8>> {
        let mut st = self.lock();
        let step = SimStep::for_offset(offset).ok_or(Errno::EINVAL)?;
        st.fail(step)?;
        if st.ring_fd != Some(ring_fd) {
            return Err(Errno::EBADF);
        }
        if len == 0 {
            return Err(Errno::EINVAL);
        }

        let addr = libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        );
        if addr == libc::MAP_FAILED {
            return Err(Errno::last());
        }
        let base = addr as usize;

        let params = st.params;
        match step {
            SimStep::MapSqRing => {
                SimState::u32_at(base, SQ_OFF.ring_mask).store(params.sq_entries - 1, Ordering::Relaxed);
                SimState::u32_at(base, SQ_OFF.ring_entries).store(params.sq_entries, Ordering::Relaxed);
                st.sq_ring = base;
            }
            SimStep::MapSqes => st.sqes = base,
            _ => {
                SimState::u32_at(base, CQ_OFF.ring_mask).store(params.cq_entries - 1, Ordering::Relaxed);
                SimState::u32_at(base, CQ_OFF.ring_entries).store(params.cq_entries, Ordering::Relaxed);
                st.cq_ring = base;
            }
        }

        st.mappings.push(Mapping { addr: base, len, offset });
        st.events.push(SimEvent::Map(offset));
        NonNull::new(addr as *mut u8).ok_or(Errno::ENOMEM)
    }

    unsafe fn unmap(&self, addr: NonNull<u8>, len: usize) -> SysResult<()> {
        let mut st = self.lock();
        let base = addr.as_ptr() as usize;
        let pos = st
            .mappings
            .iter()
            .position(|m| m.addr == base && m.len == len)
            .ok_or(Errno::EINVAL)?;
        let m = st.mappings.remove(pos);

        if libc::munmap(m.addr as *mut libc::c_void, m.len) != 0 {
            return Err(Errno::last());
        }
        if st.sq_ring == m.addr {
            st.sq_ring = 0;
        } else if st.sqes == m.addr {
            st.sqes = 0;
        } else if st.cq_ring == m.addr {
            st.cq_ring = 0;
        }
        st.events.push(SimEvent::Unmap(m.offset));
        Ok(())
    }

    fn close(&self, fd: RawFd) -> SysResult<()> {
        let mut st = self.lock();
        if let Some(e) = st.close_failures.remove(&fd) {
            return Err(e);
        }
        let pos = st.open.iter().position(|&o| o == fd).ok_or(Errno::EBADF)?;
        st.open.remove(pos);

        if st.ring_fd == Some(fd) {
            st.ring_fd = None;
            st.registered = None;
        }
        if st.event_fd == Some(fd) {
            st.event_fd = None;
        }
        st.events.push(SimEvent::Close(fd));
        Ok(())
    }
}
