//! `Engine` — per-loop io_uring filesystem backend.
//!
//! Owns at most one ring. `pending` counts operations published to the
//! kernel whose completions have not been reaped yet; it never exceeds
//! the SQ capacity, which is what keeps the CQ (at least as large) from
//! overflowing. The host watcher on the eventfd is armed exactly while
//! `pending > 0`.

use std::io::{IoSlice, IoSliceMut};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};

use fsring_core::abi::{FsOp, CURRENT_POSITION};
use fsring_core::error::{Result, RingError, Unsupported};
use fsring_core::host::HostLoop;
use fsring_core::syscalls::RingSyscalls;
use fsring_ring::{LinuxSyscalls, Ring};

use crate::config::EngineConfig;
use crate::request::FsRequest;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity stamped on requests admitted to an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

impl EngineId {
    fn next() -> Self {
        Self(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// One reaped completion, copied out of the CQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Token of the request that produced it.
    pub token: u64,
    /// Bytes transferred, or a negative errno.
    pub result: i32,
    pub flags: u32,
}

pub struct Engine<H: HostLoop, S: RingSyscalls = LinuxSyscalls> {
    id: EngineId,
    ring: Option<Ring<S>>,
    host: H,
    pending: u32,
    watching: bool,
}

impl<H: HostLoop, S: RingSyscalls> Engine<H, S> {
    /// Build an engine as described by `config`.
    ///
    /// A disabled config yields an engine without a ring. If the ring
    /// cannot be created the error is returned; `Unavailable` means the
    /// kernel has no usable io_uring.
    pub fn new(config: &EngineConfig, sys: S, host: H) -> Result<Self> {
        let ring = if config.enabled {
            Some(Ring::init(sys, config.sq_entries, config.cq_entries)?)
        } else {
            None
        };
        Ok(Self::from_parts(ring, host))
    }

    /// Like `new`, but a ring that cannot be created leaves the engine
    /// disabled instead of failing.
    pub fn with_fallback(config: &EngineConfig, sys: S, host: H) -> Self {
        let ring = if config.enabled {
            match Ring::init(sys, config.sq_entries, config.cq_entries) {
                Ok(ring) => Some(ring),
                Err(e) => {
                    log::warn!("fsring: io_uring disabled, using fallback path: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self::from_parts(ring, host)
    }

    /// An engine that refuses every request with `NotEnabled`.
    pub fn disabled(host: H) -> Self {
        Self::from_parts(None, host)
    }

    fn from_parts(ring: Option<Ring<S>>, host: H) -> Self {
        let id = EngineId::next();
        match &ring {
            Some(r) => log::debug!(
                "fsring: engine {} ready, sq={} cq={} eventfd={}",
                id.0,
                r.sq_capacity(),
                r.cq_capacity(),
                r.event_fd()
            ),
            None => log::debug!("fsring: engine {} has no ring", id.0),
        }
        Self { id, ring, host, pending: 0, watching: false }
    }

    /// Submit one vectored read, vectored write or fsync.
    ///
    /// On success the request is stamped with this engine's id and its
    /// callback will be due once a completion with its token is reaped.
    /// Errors with `wants_fallback()` mean the host should run the request
    /// on its thread pool instead.
    ///
    /// # Safety
    /// The iovec array and every buffer it points to must stay valid and
    /// unaliased until the completion for `req` is reaped.
    pub unsafe fn submit_fs_op(
        &mut self,
        op: FsOp,
        fd: RawFd,
        bufs: &[libc::iovec],
        offset: i64,
        req: &mut FsRequest,
    ) -> Result<()> {
        if !req.has_callback() {
            return Err(RingError::Unsupported(Unsupported::MissingCallback));
        }
        let ring = match self.ring.as_mut() {
            Some(ring) => ring,
            None => return Err(RingError::NotEnabled),
        };
        if offset == CURRENT_POSITION {
            return Err(RingError::Unsupported(Unsupported::CurrentPosition));
        }
        if offset < 0 {
            return Err(RingError::InvalidArgument("negative file offset"));
        }
        if (0..=2).contains(&fd) {
            return Err(RingError::Unsupported(Unsupported::StdioDescriptor(fd)));
        }
        let nr_iovecs = u32::try_from(bufs.len())
            .map_err(|_| RingError::InvalidArgument("too many iovecs"))?;
        if self.pending >= ring.sq_capacity() {
            return Err(RingError::Exhausted);
        }

        let addr = if bufs.is_empty() { 0 } else { bufs.as_ptr() as u64 };
        ring.claim()
            .map_err(|_| RingError::Exhausted)?
            .prep(op, fd, addr, nr_iovecs, offset as u64, req.token());

        if self.pending == 0 && !self.watching {
            self.host.watch_readable(ring.event_fd());
            self.watching = true;
            log::debug!("fsring: engine {} watching eventfd {}", self.id.0, ring.event_fd());
        }
        self.pending += 1;

        match ring.publish() {
            Ok(_) => {
                req.admit(self.id);
                log::trace!(
                    "fsring: {} fd={} off={} iovecs={} token={:#x} pending={}",
                    op.name(),
                    fd,
                    offset,
                    nr_iovecs,
                    req.token(),
                    self.pending
                );
                Ok(())
            }
            Err(e) => {
                self.pending -= 1;
                self.disarm_if_idle();
                Err(e)
            }
        }
    }

    /// Vectored read at `offset`.
    ///
    /// # Safety
    /// `bufs` must stay valid and untouched until the completion is reaped.
    pub unsafe fn read(
        &mut self,
        fd: RawFd,
        bufs: &mut [IoSliceMut<'_>],
        offset: i64,
        req: &mut FsRequest,
    ) -> Result<()> {
        // IoSliceMut is ABI-compatible with iovec on unix.
        let iov = std::slice::from_raw_parts(bufs.as_ptr() as *const libc::iovec, bufs.len());
        self.submit_fs_op(FsOp::read(), fd, iov, offset, req)
    }

    /// Vectored write at `offset`.
    ///
    /// # Safety
    /// `bufs` must stay valid until the completion is reaped.
    pub unsafe fn write(
        &mut self,
        fd: RawFd,
        bufs: &[IoSlice<'_>],
        offset: i64,
        req: &mut FsRequest,
    ) -> Result<()> {
        let iov = std::slice::from_raw_parts(bufs.as_ptr() as *const libc::iovec, bufs.len());
        self.submit_fs_op(FsOp::write(), fd, iov, offset, req)
    }

    /// fsync, or fdatasync when `datasync` is set.
    pub fn fsync(&mut self, fd: RawFd, datasync: bool, req: &mut FsRequest) -> Result<()> {
        let op = if datasync { FsOp::fdatasync() } else { FsOp::fsync() };
        // No buffers are referenced.
        unsafe { self.submit_fs_op(op, fd, &[], 0, req) }
    }

    /// Cancel a request admitted to this engine.
    ///
    /// Nothing is sent to the kernel: the operation keeps running and its
    /// completion is still reaped, but the request reports `-ECANCELED`.
    pub fn cancel(&mut self, req: &mut FsRequest) -> Result<()> {
        if req.admitted_to() != Some(self.id) {
            return Err(RingError::CancelUnsupported);
        }
        req.mark_canceled();
        log::debug!("fsring: engine {} canceled token={:#x}", self.id.0, req.token());
        Ok(())
    }

    /// Drain the CQ, handing every completion to `deliver`.
    ///
    /// Returns how many were delivered. `CqOverflow` is returned after the
    /// completion that exposed it has been delivered; it means results
    /// were lost and the engine can no longer be trusted.
    pub fn reap<F: FnMut(Completion)>(&mut self, mut deliver: F) -> Result<usize> {
        let ring = match self.ring.as_mut() {
            Some(ring) => ring,
            None => return Ok(0),
        };

        let mut reaped = 0;
        let mut fatal = None;
        while let Some(cqe) = ring.peek() {
            let c = Completion { token: cqe.user_data, result: cqe.res, flags: cqe.flags };
            let retired = ring.retire();
            self.pending = self.pending.saturating_sub(1);
            reaped += 1;
            log::trace!("fsring: completion token={:#x} res={} pending={}", c.token, c.result, self.pending);
            deliver(c);
            if let Err(e) = retired {
                fatal = Some(e);
                break;
            }
        }

        self.disarm_if_idle();
        match fatal {
            Some(e) => Err(e),
            None => Ok(reaped),
        }
    }

    /// Readiness handler for the eventfd: reset the counter, then reap.
    pub fn on_readable<F: FnMut(Completion)>(&mut self, deliver: F) -> Result<usize> {
        match &self.ring {
            Some(ring) => {
                ring.drain_notifications()?;
            }
            None => return Ok(0),
        }
        self.reap(deliver)
    }

    fn disarm_if_idle(&mut self) {
        if self.pending != 0 || !self.watching {
            return;
        }
        if let Some(ring) = &self.ring {
            self.host.unwatch(ring.event_fd());
            log::debug!("fsring: engine {} idle, unwatching eventfd {}", self.id.0, ring.event_fd());
        }
        self.watching = false;
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.ring.is_some()
    }

    /// Operations in flight.
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Admission limit; 0 for a disabled engine.
    pub fn capacity(&self) -> u32 {
        self.ring.as_ref().map_or(0, |r| r.sq_capacity())
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// The eventfd the host should watch, if there is a ring.
    pub fn notify_fd(&self) -> Option<RawFd> {
        self.ring.as_ref().map(|r| r.event_fd())
    }

    pub fn ring(&self) -> Option<&Ring<S>> {
        self.ring.as_ref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: HostLoop, S: RingSyscalls> Drop for Engine<H, S> {
    fn drop(&mut self) {
        if self.pending != 0 {
            log::warn!("fsring: engine {} dropped with {} operations in flight", self.id.0, self.pending);
        }
        if self.watching {
            if let Some(ring) = &self.ring {
                self.host.unwatch(ring.event_fd());
            }
            self.watching = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsring_ring::sim::{SimKernel, SimStep};
    use nix::errno::Errno;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<(bool, RawFd)>>>;

    /// Records watch (true) / unwatch (false) calls.
    #[derive(Default)]
    struct TestHost {
        calls: Calls,
    }

    impl HostLoop for TestHost {
        fn watch_readable(&mut self, fd: RawFd) {
            self.calls.borrow_mut().push((true, fd));
        }

        fn unwatch(&mut self, fd: RawFd) {
            self.calls.borrow_mut().push((false, fd));
        }
    }

    fn engine(sq: u32, cq: Option<u32>) -> (SimKernel, Engine<TestHost, SimKernel>, Calls) {
        let sim = SimKernel::new();
        let mut config = EngineConfig::new().sq_entries(sq);
        config.cq_entries = cq;
        let host = TestHost::default();
        let calls = host.calls.clone();
        let engine = Engine::new(&config, sim.clone(), host).unwrap();
        (sim, engine, calls)
    }

    fn request(token: u64) -> FsRequest {
        FsRequest::new(token).with_callback(|_| {})
    }

    const ALL_OPS: [FsOp; 4] = [FsOp::read(), FsOp::write(), FsOp::fsync(), FsOp::fdatasync()];

    #[test]
    fn four_deep_scenario() {
        let (sim, mut engine, calls) = engine(4, Some(8));
        assert_eq!(engine.capacity(), 4);
        let efd = engine.notify_fd().unwrap();

        let mut bufs: Vec<Vec<u8>> = (0..5).map(|_| vec![0u8; 64]).collect();
        let mut reqs: Vec<FsRequest> = (1..=5).map(request).collect();

        for i in 0..4 {
            let mut iov = [IoSliceMut::new(&mut bufs[i])];
            unsafe { engine.read(10, &mut iov, 0, &mut reqs[i]).unwrap() };
            assert_eq!(reqs[i].admitted_to(), Some(engine.id()));
        }
        assert_eq!(engine.pending(), 4);
        assert_eq!(sim.enter_calls(), 4);

        let mut iov = [IoSliceMut::new(&mut bufs[4])];
        let err = unsafe { engine.read(10, &mut iov, 0, &mut reqs[4]) };
        assert_eq!(err, Err(RingError::Exhausted));
        assert!(err.unwrap_err().wants_fallback());
        assert_eq!(sim.enter_calls(), 4);
        assert_eq!(reqs[4].admitted_to(), None);

        assert_eq!(sim.complete_all(64), 4);
        let mut done = Vec::new();
        assert_eq!(engine.on_readable(|c| done.push(c)), Ok(4));
        assert_eq!(done.iter().map(|c| c.token).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(done.iter().all(|c| c.result == 64));
        assert_eq!(engine.pending(), 0);
        assert_eq!(*calls.borrow(), vec![(true, efd), (false, efd)]);

        // Admission is open again and the ring wrapped to slot 0.
        let slot = engine.ring().unwrap().sq().next_slot();
        assert_eq!(slot, 0);
        unsafe { engine.read(10, &mut iov, 0, &mut reqs[4]).unwrap() };
        assert_eq!(engine.pending(), 1);
        assert_eq!(sim.in_flight(), vec![5]);
    }

    #[test]
    fn completion_reaches_request_callback() {
        let (sim, mut engine, _) = engine(4, None);
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        let mut req = FsRequest::new(77).with_callback(move |r| *s.borrow_mut() = Some(r));

        engine.fsync(10, false, &mut req).unwrap();
        sim.complete_next(0);
        engine
            .on_readable(|c| {
                assert_eq!(c.token, req.token());
                req.complete(c.result);
            })
            .unwrap();
        assert_eq!(*seen.borrow(), Some(0));
        assert_eq!(req.admitted_to(), None);
    }

    #[test]
    fn sqe_carries_request_fields() {
        let (sim, mut engine, _) = engine(4, None);
        let data = b"hello";
        let iov = [IoSlice::new(data)];
        let mut req = request(0xabc);
        unsafe { engine.write(12, &iov, 4096, &mut req).unwrap() };
        let mut req2 = request(0xdef);
        engine.fsync(12, true, &mut req2).unwrap();

        let sqes = sim.in_flight_sqes();
        assert_eq!(sqes[0].op(), Some(FsOp::write()));
        assert_eq!(sqes[0].fd, 12);
        assert_eq!(sqes[0].off, 4096);
        assert_eq!(sqes[0].len, 1);
        assert_eq!(sqes[0].addr, iov.as_ptr() as u64);
        assert_eq!(sqes[0].user_data, 0xabc);

        assert_eq!(sqes[1].op(), Some(FsOp::fdatasync()));
        assert_eq!(sqes[1].addr, 0);
        assert_eq!(sqes[1].len, 0);
        assert_eq!(sqes[1].user_data, 0xdef);
    }

    #[test]
    fn current_position_is_rejected_for_every_op() {
        let (sim, mut engine, calls) = engine(4, None);
        let buf = [0u8; 8];
        let iov = [libc::iovec { iov_base: buf.as_ptr() as *mut libc::c_void, iov_len: buf.len() }];
        for op in ALL_OPS {
            let mut req = request(1);
            let err = unsafe { engine.submit_fs_op(op, 10, &iov, CURRENT_POSITION, &mut req) };
            assert_eq!(err, Err(RingError::Unsupported(Unsupported::CurrentPosition)), "{}", op.name());
        }
        assert_eq!(sim.enter_calls(), 0);
        assert_eq!(engine.pending(), 0);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn other_negative_offsets_are_invalid() {
        let (sim, mut engine, _) = engine(4, None);
        let mut req = request(1);
        let err = unsafe { engine.submit_fs_op(FsOp::read(), 10, &[], -2, &mut req) };
        assert!(matches!(err, Err(RingError::InvalidArgument(_))));
        assert_eq!(sim.enter_calls(), 0);
    }

    #[test]
    fn stdio_descriptors_are_rejected() {
        let (sim, mut engine, _) = engine(4, None);
        let buf = [0u8; 16];
        let iov = libc::iovec { iov_base: buf.as_ptr() as *mut libc::c_void, iov_len: buf.len() };
        let shapes: [&[libc::iovec]; 3] = [&[], &[iov], &[iov, iov, iov]];

        for fd in 0..=2 {
            for op in ALL_OPS {
                for bufs in shapes {
                    let mut req = request(1);
                    let err = unsafe { engine.submit_fs_op(op, fd, bufs, 0, &mut req) };
                    assert_eq!(err, Err(RingError::Unsupported(Unsupported::StdioDescriptor(fd))));
                }
            }
        }
        assert_eq!(sim.enter_calls(), 0);
    }

    #[test]
    fn missing_callback_is_refused_first() {
        let (sim, mut engine, _) = engine(4, None);
        let mut req = FsRequest::new(1);
        // Even with an otherwise bad shape, the callback check comes first.
        let err = unsafe { engine.submit_fs_op(FsOp::read(), 1, &[], -1, &mut req) };
        assert_eq!(err, Err(RingError::Unsupported(Unsupported::MissingCallback)));
        assert_eq!(sim.enter_calls(), 0);
    }

    #[test]
    fn disabled_engine_refuses_everything() {
        let mut engine: Engine<TestHost, SimKernel> = Engine::disabled(TestHost::default());
        assert!(!engine.is_enabled());
        assert_eq!(engine.capacity(), 0);
        assert_eq!(engine.notify_fd(), None);

        let mut req = request(1);
        let err = engine.fsync(10, false, &mut req).unwrap_err();
        assert_eq!(err, RingError::NotEnabled);
        assert!(err.wants_fallback());
        assert_eq!(engine.reap(|_| {}), Ok(0));
        assert_eq!(engine.on_readable(|_| {}), Ok(0));
    }

    #[test]
    fn config_can_disable_ring() {
        let sim = SimKernel::new();
        let config = EngineConfig::new().enabled(false);
        let engine = Engine::new(&config, sim.clone(), TestHost::default()).unwrap();
        assert!(!engine.is_enabled());
        assert!(sim.events().is_empty());
    }

    #[test]
    fn setup_failure_is_unavailable_or_falls_back() {
        let sim = SimKernel::new();
        sim.fail_at(SimStep::Setup, Errno::ENOSYS);
        let err = Engine::new(&EngineConfig::default(), sim, TestHost::default()).err();
        assert_eq!(err, Some(RingError::Unavailable(Errno::ENOSYS)));

        let sim = SimKernel::new();
        sim.fail_at(SimStep::Setup, Errno::EPERM);
        let mut engine = Engine::with_fallback(&EngineConfig::default(), sim, TestHost::default());
        assert!(!engine.is_enabled());
        let mut req = request(1);
        assert_eq!(engine.fsync(10, false, &mut req), Err(RingError::NotEnabled));
    }

    #[test]
    fn cancel_requires_admission_here() {
        let (_sim, mut engine, _) = engine(4, None);
        let mut req = request(1);
        assert_eq!(engine.cancel(&mut req), Err(RingError::CancelUnsupported));

        let (_sim2, mut other, _) = self::engine(4, None);
        other.fsync(10, false, &mut req).unwrap();
        assert_ne!(other.id(), engine.id());
        assert_eq!(engine.cancel(&mut req), Err(RingError::CancelUnsupported));
        assert_eq!(req.result(), None);
    }

    #[test]
    fn cancel_in_flight_marks_request_only() {
        let (sim, mut engine, _) = engine(4, None);
        let mut req = request(3);
        engine.fsync(10, false, &mut req).unwrap();
        assert_eq!(sim.enter_calls(), 1);

        assert_eq!(engine.cancel(&mut req), Ok(()));
        assert_eq!(req.result(), Some(-libc::ECANCELED));
        assert_eq!(sim.enter_calls(), 1);
        assert_eq!(engine.pending(), 1);

        // The kernel still finishes it; the late result is ignored.
        sim.complete_next(0);
        engine.on_readable(|c| req.complete(c.result)).unwrap();
        assert_eq!(req.result(), Some(-libc::ECANCELED));
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn publish_failure_restores_pending_and_watcher() {
        let (sim, mut engine, calls) = engine(4, None);
        let efd = engine.notify_fd().unwrap();
        sim.fail_next_enter(Errno::EAGAIN);

        let mut req = request(1);
        let err = engine.fsync(10, false, &mut req);
        assert_eq!(err, Err(RingError::sys("io_uring_enter", Errno::EAGAIN)));
        assert_eq!(engine.pending(), 0);
        assert!(!engine.is_watching());
        assert_eq!(req.admitted_to(), None);
        assert_eq!(*calls.borrow(), vec![(true, efd), (false, efd)]);

        sim.accept_nothing_next();
        assert_eq!(engine.fsync(10, false, &mut req), Err(RingError::NothingSubmitted));
        assert_eq!(engine.pending(), 0);
        assert_eq!(engine.ring().unwrap().sq().tail_index(), 0);

        engine.fsync(10, false, &mut req).unwrap();
        assert_eq!(engine.pending(), 1);
    }

    #[test]
    fn failure_with_others_in_flight_keeps_watching() {
        let (sim, mut engine, calls) = engine(4, None);
        let mut a = request(1);
        engine.fsync(10, false, &mut a).unwrap();

        sim.fail_next_enter(Errno::EBUSY);
        let mut b = request(2);
        assert!(engine.fsync(10, false, &mut b).is_err());
        assert_eq!(engine.pending(), 1);
        assert!(engine.is_watching());
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn overflow_surfaces_from_reap() {
        let (sim, mut engine, _) = engine(2, None);
        assert_eq!(engine.ring().unwrap().cq_capacity(), 4);

        let mut a = request(1);
        let mut b = request(2);
        engine.fsync(10, false, &mut a).unwrap();
        engine.fsync(10, false, &mut b).unwrap();
        sim.complete_all(0);
        // Stray completions fill the CQ and force one to be dropped.
        assert!(sim.post(90, 0));
        assert!(sim.post(91, 0));
        assert!(!sim.post(92, 0));

        let mut tokens = Vec::new();
        let err = engine.reap(|c| tokens.push(c.token));
        assert_eq!(err, Err(RingError::CqOverflow(1)));
        assert_eq!(tokens, vec![1]);
    }

    #[test]
    fn watcher_follows_pending() {
        let (sim, mut engine, calls) = engine(4, None);
        let efd = engine.notify_fd().unwrap();
        let mut reqs: Vec<FsRequest> = (0..3).map(request).collect();
        for r in reqs.iter_mut() {
            engine.fsync(10, false, r).unwrap();
        }
        assert_eq!(*calls.borrow(), vec![(true, efd)]);

        sim.complete_next(0);
        engine.reap(|_| {}).unwrap();
        assert!(engine.is_watching());

        sim.complete_all(0);
        engine.reap(|_| {}).unwrap();
        assert!(!engine.is_watching());
        assert_eq!(*calls.borrow(), vec![(true, efd), (false, efd)]);
    }

    #[test]
    fn drop_unwatches_and_releases_ring() {
        let (sim, mut engine, calls) = engine(4, None);
        let efd = engine.notify_fd().unwrap();
        let mut req = request(1);
        engine.fsync(10, false, &mut req).unwrap();
        drop(engine);

        assert_eq!(*calls.borrow(), vec![(true, efd), (false, efd)]);
        assert!(sim.open_fds().is_empty());
        assert_eq!(sim.live_mappings(), 0);
    }

    #[test]
    fn engine_ids_are_unique() {
        let a: Engine<TestHost, SimKernel> = Engine::disabled(TestHost::default());
        let b: Engine<TestHost, SimKernel> = Engine::disabled(TestHost::default());
        assert_ne!(a.id(), b.id());
    }
}
