//! `Ring` — one io_uring instance with its three mappings and the
//! notification eventfd.
//!
//! Acquisition order in `init()`:
//!
//! ```text
//! io_uring_setup -> FD_CLOEXEC -> mmap SQ ring -> mmap SQEs -> mmap CQ ring
//!     -> eventfd -> IORING_REGISTER_EVENTFD
//! ```
//!
//! Anything acquired before a failing step is released again, newest
//! first, before the error is returned. `Drop` releases a live ring in the
//! same reverse order. Release failures are logged and never abort the
//! rest of the teardown.

use std::os::unix::io::RawFd;
use std::ptr::NonNull;

use fsring_core::abi::{
    Cqe, IoUringParams, Sqe, IORING_OFF_CQ_RING, IORING_OFF_SQES, IORING_OFF_SQ_RING,
    IORING_SETUP_CQSIZE, MAX_ENTRIES,
};
use fsring_core::error::{Result, RingError};
use fsring_core::syscalls::RingSyscalls;

use crate::completion::CompletionQueue;
use crate::submission::{QueueFull, SubmissionQueue};

#[derive(Debug, Clone, Copy)]
struct Region {
    addr: NonNull<u8>,
    len: usize,
}

/// A resource `init()` has acquired so far.
enum Held {
    Fd(&'static str, RawFd),
    Map(&'static str, Region),
}

fn release<S: RingSyscalls>(sys: &S, held: Held) {
    match held {
        Held::Fd(what, fd) => {
            if let Err(e) = sys.close(fd) {
                log::error!("fsring: close({}) fd={} failed: {}", what, fd, e);
            }
        }
        Held::Map(what, region) => {
            if let Err(e) = unsafe { sys.unmap(region.addr, region.len) } {
                log::error!("fsring: munmap({}) len={} failed: {}", what, region.len, e);
            }
        }
    }
}

/// Releases everything pushed onto it, newest first, unless committed.
struct Unwind<'a, S: RingSyscalls> {
    sys: &'a S,
    held: Vec<Held>,
}

impl<'a, S: RingSyscalls> Unwind<'a, S> {
    fn new(sys: &'a S) -> Self {
        Self { sys, held: Vec::with_capacity(5) }
    }

    fn push(&mut self, held: Held) {
        self.held.push(held);
    }

    /// Map one ring region and remember it.
    unsafe fn map(&mut self, what: &'static str, ring_fd: RawFd, len: usize, offset: u64) -> Result<Region> {
        let addr = self
            .sys
            .map(ring_fd, len, offset)
            .map_err(|e| RingError::sys("mmap", e))?;
        let region = Region { addr, len };
        self.push(Held::Map(what, region));
        Ok(region)
    }

    /// Ownership moves to the ring; nothing is released.
    fn commit(mut self) {
        self.held.clear();
    }
}

impl<S: RingSyscalls> Drop for Unwind<'_, S> {
    fn drop(&mut self) {
        while let Some(held) = self.held.pop() {
            release(self.sys, held);
        }
    }
}

pub struct Ring<S: RingSyscalls> {
    sq: SubmissionQueue,
    cq: CompletionQueue,
    sq_ring: Region,
    sqes: Region,
    cq_ring: Region,
    ring_fd: RawFd,
    event_fd: RawFd,
    params: IoUringParams,
    sys: S,
}

// The queues point into mappings owned by this value; moving it to another
// thread moves all of them together.
unsafe impl<S: RingSyscalls + Send> Send for Ring<S> {}

impl<S: RingSyscalls> Ring<S> {
    /// Create a ring with room for `sq_entries` submissions.
    ///
    /// `cq_entries` requests an explicit completion-queue size
    /// (`IORING_SETUP_CQSIZE`); `None` takes the kernel default of twice
    /// the submission size. Both are rounded up to a power of two by the
    /// kernel.
    ///
    /// Returns `RingError::Unavailable` when `io_uring_setup` itself fails,
    /// which callers treat as "use the fallback path for everything".
    pub fn init(sys: S, sq_entries: u32, cq_entries: Option<u32>) -> Result<Self> {
        if sq_entries == 0 || sq_entries > MAX_ENTRIES {
            return Err(RingError::InvalidArgument("sq_entries out of range"));
        }

        let mut params = IoUringParams::default();
        if let Some(cq) = cq_entries {
            if cq < sq_entries || cq > 2 * MAX_ENTRIES {
                return Err(RingError::InvalidArgument("cq_entries out of range"));
            }
            params.flags |= IORING_SETUP_CQSIZE;
            params.cq_entries = cq;
        }

        let ring_fd = sys.setup(sq_entries, &mut params).map_err(RingError::Unavailable)?;

        let mut guard = Unwind::new(&sys);
        guard.push(Held::Fd("ring", ring_fd));

        sys.set_cloexec(ring_fd)
            .map_err(|e| RingError::sys("fcntl(FD_CLOEXEC)", e))?;

        let (sq_ring, sqes, cq_ring) = unsafe {
            let sq_ring = guard.map("sq ring", ring_fd, params.sq_ring_len(), IORING_OFF_SQ_RING)?;
            let sqes = guard.map("sqes", ring_fd, params.sqes_len(), IORING_OFF_SQES)?;
            let cq_ring = guard.map("cq ring", ring_fd, params.cq_ring_len(), IORING_OFF_CQ_RING)?;
            (sq_ring, sqes, cq_ring)
        };

        let sq = unsafe { SubmissionQueue::new(sq_ring.addr, &params.sq_off, sqes.addr.cast::<Sqe>())? };
        let cq = unsafe { CompletionQueue::new(cq_ring.addr, &params.cq_off)? };

        let event_fd = sys.eventfd().map_err(|e| RingError::sys("eventfd", e))?;
        guard.push(Held::Fd("eventfd", event_fd));

        sys.register_eventfd(ring_fd, event_fd)
            .map_err(|e| RingError::sys("io_uring_register", e))?;

        guard.commit();

        log::debug!(
            "fsring: ring fd={} sq_entries={} cq_entries={} eventfd={}",
            ring_fd,
            params.sq_entries,
            params.cq_entries,
            event_fd
        );

        Ok(Self {
            sq,
            cq,
            sq_ring,
            sqes,
            cq_ring,
            ring_fd,
            event_fd,
            params,
            sys,
        })
    }

    /// Claim the next submission slot. See [`SubmissionQueue::claim`].
    pub fn claim(&mut self) -> std::result::Result<&mut Sqe, QueueFull> {
        self.sq.claim()
    }

    /// Publish the claimed slot and submit exactly one entry.
    ///
    /// Returns the number of entries the kernel accepted. If the kernel
    /// refuses (error or zero accepted) the tail is rolled back, so the
    /// queue is left as if the slot had never been published.
    pub fn publish(&mut self) -> Result<u32> {
        let tail = self.sq.advance()?;
        match self.sys.enter(self.ring_fd, 1, 0, 0) {
            Ok(0) => {
                self.sq.rollback(tail);
                Err(RingError::NothingSubmitted)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.sq.rollback(tail);
                Err(RingError::sys("io_uring_enter", e))
            }
        }
    }

    pub fn peek(&self) -> Option<&Cqe> {
        self.cq.peek()
    }

    pub fn retire(&mut self) -> Result<()> {
        self.cq.retire()
    }

    /// Read and reset the notification counter.
    pub fn drain_notifications(&self) -> Result<u64> {
        self.sys
            .drain_eventfd(self.event_fd)
            .map_err(|e| RingError::sys("read(eventfd)", e))
    }

    pub fn sq(&self) -> &SubmissionQueue {
        &self.sq
    }

    pub fn cq(&self) -> &CompletionQueue {
        &self.cq
    }

    pub fn sq_capacity(&self) -> u32 {
        self.sq.capacity()
    }

    pub fn cq_capacity(&self) -> u32 {
        self.cq.capacity()
    }

    pub fn ring_fd(&self) -> RawFd {
        self.ring_fd
    }

    /// Descriptor the host loop watches for readability.
    pub fn event_fd(&self) -> RawFd {
        self.event_fd
    }

    /// Parameters as filled in by the kernel.
    pub fn params(&self) -> &IoUringParams {
        &self.params
    }

    pub fn sys(&self) -> &S {
        &self.sys
    }

    /// Tear the ring down now. Equivalent to dropping it.
    pub fn destroy(self) {
        drop(self);
    }
}

impl<S: RingSyscalls> Drop for Ring<S> {
    fn drop(&mut self) {
        log::debug!("fsring: destroying ring fd={}", self.ring_fd);
        release(&self.sys, Held::Fd("eventfd", self.event_fd));
        release(&self.sys, Held::Map("cq ring", self.cq_ring));
        release(&self.sys, Held::Map("sqes", self.sqes));
        release(&self.sys, Held::Map("sq ring", self.sq_ring));
        release(&self.sys, Held::Fd("ring", self.ring_fd));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimKernel, SimStep};
    use fsring_core::abi::FsOp;
    use nix::errno::Errno;

    #[test]
    fn acquires_in_order() {
        let sim = SimKernel::new();
        let ring = Ring::init(sim.clone(), 4, None).unwrap();
        let ring_fd = ring.ring_fd();
        let event_fd = ring.event_fd();

        assert_eq!(
            sim.events(),
            vec![
                SimEvent::Setup(ring_fd),
                SimEvent::Cloexec(ring_fd),
                SimEvent::Map(IORING_OFF_SQ_RING),
                SimEvent::Map(IORING_OFF_SQES),
                SimEvent::Map(IORING_OFF_CQ_RING),
                SimEvent::Eventfd(event_fd),
                SimEvent::Register(event_fd),
            ]
        );
        assert_eq!(sim.open_fds().len(), 2);
        assert_eq!(sim.live_mappings(), 3);
    }

    #[test]
    fn teardown_reverses_acquisition() {
        let sim = SimKernel::new();
        let ring = Ring::init(sim.clone(), 4, None).unwrap();
        let ring_fd = ring.ring_fd();
        let event_fd = ring.event_fd();
        let acquired = sim.events().len();

        ring.destroy();

        assert_eq!(
            sim.events()[acquired..].to_vec(),
            vec![
                SimEvent::Close(event_fd),
                SimEvent::Unmap(IORING_OFF_CQ_RING),
                SimEvent::Unmap(IORING_OFF_SQES),
                SimEvent::Unmap(IORING_OFF_SQ_RING),
                SimEvent::Close(ring_fd),
            ]
        );
        assert!(sim.open_fds().is_empty());
        assert_eq!(sim.live_mappings(), 0);
    }

    #[test]
    fn every_failed_step_releases_everything() {
        for &step in SimStep::ALL {
            let sim = SimKernel::new();
            sim.fail_at(step, Errno::ENOMEM);

            let err = Ring::init(sim.clone(), 8, None).err().unwrap();
            match step {
                SimStep::Setup => assert_eq!(err, RingError::Unavailable(Errno::ENOMEM)),
                SimStep::Cloexec => assert_eq!(err, RingError::sys("fcntl(FD_CLOEXEC)", Errno::ENOMEM)),
                SimStep::MapSqRing | SimStep::MapSqes | SimStep::MapCqRing => {
                    assert_eq!(err, RingError::sys("mmap", Errno::ENOMEM))
                }
                SimStep::Eventfd => assert_eq!(err, RingError::sys("eventfd", Errno::ENOMEM)),
                SimStep::Register => assert_eq!(err, RingError::sys("io_uring_register", Errno::ENOMEM)),
            }
            assert!(sim.open_fds().is_empty(), "{:?} leaked fds", step);
            assert_eq!(sim.live_mappings(), 0, "{:?} leaked mappings", step);
        }
    }

    #[test]
    fn unwind_after_last_map_is_newest_first() {
        let sim = SimKernel::new();
        sim.fail_at(SimStep::Eventfd, Errno::EMFILE);
        assert!(Ring::init(sim.clone(), 4, None).is_err());

        let events = sim.events();
        let tail = &events[events.len() - 4..];
        assert_eq!(
            tail,
            &[
                SimEvent::Unmap(IORING_OFF_CQ_RING),
                SimEvent::Unmap(IORING_OFF_SQES),
                SimEvent::Unmap(IORING_OFF_SQ_RING),
                SimEvent::Close(100),
            ]
        );
    }

    #[test]
    fn entry_counts_are_validated_before_setup() {
        let sim = SimKernel::new();
        assert!(matches!(Ring::init(sim.clone(), 0, None), Err(RingError::InvalidArgument(_))));
        assert!(matches!(
            Ring::init(sim.clone(), MAX_ENTRIES + 1, None),
            Err(RingError::InvalidArgument(_))
        ));
        assert!(matches!(Ring::init(sim.clone(), 8, Some(4)), Err(RingError::InvalidArgument(_))));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn sizes_follow_kernel_rounding() {
        let sim = SimKernel::new();
        let ring = Ring::init(sim.clone(), 3, None).unwrap();
        assert_eq!(ring.sq_capacity(), 4);
        assert_eq!(ring.cq_capacity(), 8);
        assert_eq!(ring.params().flags & IORING_SETUP_CQSIZE, 0);

        drop(ring);

        let ring = Ring::init(sim.clone(), 4, Some(16)).unwrap();
        assert_eq!(ring.sq_capacity(), 4);
        assert_eq!(ring.cq_capacity(), 16);
        assert_ne!(ring.params().flags & IORING_SETUP_CQSIZE, 0);
    }

    #[test]
    fn notifications_count_completions() {
        let sim = SimKernel::new();
        let ring = Ring::init(sim.clone(), 4, None).unwrap();
        assert_eq!(ring.drain_notifications(), Ok(0));

        sim.post(1, 0);
        sim.post(2, 0);
        assert_eq!(ring.drain_notifications(), Ok(2));
        assert_eq!(ring.drain_notifications(), Ok(0));
    }

    #[test]
    fn teardown_continues_past_failures() {
        let sim = SimKernel::new();
        let ring = Ring::init(sim.clone(), 4, None).unwrap();
        sim.fail_close(ring.event_fd(), Errno::EIO);
        drop(ring);

        // The eventfd close failed but every other release still ran.
        assert_eq!(sim.live_mappings(), 0);
        assert_eq!(sim.open_fds().len(), 1);
    }

    #[test]
    fn second_ring_on_busy_kernel_is_unavailable_and_leaves_first_intact() {
        let sim = SimKernel::new();
        let mut ring = Ring::init(sim.clone(), 4, None).unwrap();
        assert_eq!(Ring::init(sim.clone(), 8, None).err(), Some(RingError::Unavailable(Errno::EBUSY)));

        // The first ring still works end to end.
        ring.claim().unwrap().prep(FsOp::fsync(), 10, 0, 0, 0, 5);
        assert_eq!(ring.publish(), Ok(1));
        sim.complete_all(0);
        assert_eq!(ring.peek().map(|c| c.user_data), Some(5));
        assert_eq!(ring.retire(), Ok(()));
    }
}
