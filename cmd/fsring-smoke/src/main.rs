//! fsring End-to-End Smoke Test
//!
//! Exercises the stack against the running kernel:
//!   Part A — Ring: setup, mappings, eventfd, CQ sizing
//!   Part B — Admission: shapes refused before any syscall
//!   Part C — File I/O: writev, fsync, fdatasync, readv round trip
//!   Part D — Capacity: SQ-depth admission limit, cancel
//!
//! Run: RUST_LOG=debug ./target/release/fsring-smoke
//! Honors FSRING_SQ_ENTRIES / FSRING_CQ_ENTRIES / FSRING_DISABLE.

use fsring_core::abi::{FsOp, CURRENT_POSITION, IORING_SETUP_CQSIZE};
use fsring_core::error::{RingError, Unsupported};
use fsring_core::host::HostLoop;
use fsring_engine::{Completion, Engine, EngineConfig, FsRequest};
use fsring_ring::{LinuxSyscalls, Ring};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use std::io::{IoSlice, IoSliceMut, Write};
use std::os::fd::BorrowedFd;
use std::os::unix::io::{AsRawFd, RawFd};

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self { total: 0, passed: 0, failed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn pass(&mut self, name: &str) {
        self.total += 1;
        self.passed += 1;
        println!("  [{:2}] {:<52} PASS", self.total, name);
    }

    fn fail(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.failed += 1;
        println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        if ok { self.pass(name); } else { self.fail(name, reason); }
    }

    fn summary(&self) {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed, self.failed
        );
        println!("{}", LINE);
    }
}

/// Host loop backed by poll(2) on the single watched descriptor.
#[derive(Default)]
struct PollHost {
    watched: Option<RawFd>,
}

impl HostLoop for PollHost {
    fn watch_readable(&mut self, fd: RawFd) {
        self.watched = Some(fd);
    }

    fn unwatch(&mut self, _fd: RawFd) {
        self.watched = None;
    }
}

/// Poll the watched eventfd until at least one completion is reaped
/// (with timeout). Returns everything reaped in that round.
fn wait_some(engine: &mut Engine<PollHost>) -> Vec<Completion> {
    let mut got = Vec::new();
    for _ in 0..200 {
        let Some(fd) = engine.host().watched else { break };
        let bfd = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut fds = [PollFd::new(bfd, PollFlags::POLLIN)];
        if poll(&mut fds, PollTimeout::from(10u8)).is_err() {
            break;
        }
        if let Err(e) = engine.on_readable(|c| got.push(c)) {
            log::error!("reap failed: {}", e);
            break;
        }
        if !got.is_empty() {
            break;
        }
    }
    got
}

fn wait_one(engine: &mut Engine<PollHost>) -> Option<Completion> {
    wait_some(engine).first().copied()
}

fn req(token: u64) -> FsRequest {
    FsRequest::new(token).with_callback(|_| {})
}

// ════════════════════════════════════════════════════════════
// Part A: Ring
// ════════════════════════════════════════════════════════════

fn test_ring(t: &mut TestRunner) -> bool {
    t.section("Part A: Ring (io_uring_setup + mmap + eventfd)");

    let ring = match Ring::init(LinuxSyscalls::new(), 8, None) {
        Ok(r) => r,
        Err(e) => {
            t.fail("io_uring_setup", &e.to_string());
            return false;
        }
    };
    t.pass(&format!("ring fd={} eventfd={}", ring.ring_fd(), ring.event_fd()));
    t.check("sq capacity == 8", ring.sq_capacity() == 8, &format!("{}", ring.sq_capacity()));
    t.check("cq capacity == 16 (kernel default)", ring.cq_capacity() == 16,
        &format!("{}", ring.cq_capacity()));
    t.check("SQ and CQ empty", ring.sq().is_empty() && ring.cq().is_empty(), "non-empty");

    let flags = unsafe { libc::fcntl(ring.ring_fd(), libc::F_GETFD) };
    t.check("ring fd close-on-exec", flags >= 0 && flags & libc::FD_CLOEXEC != 0,
        &format!("flags={:#x}", flags));
    t.check("no pending notifications", ring.drain_notifications() == Ok(0), "counter nonzero");
    ring.destroy();

    match Ring::init(LinuxSyscalls::new(), 4, Some(64)) {
        Ok(r) => {
            t.check("CQSIZE: cq capacity == 64", r.cq_capacity() == 64, &format!("{}", r.cq_capacity()));
            t.check("CQSIZE flag echoed", r.params().flags & IORING_SETUP_CQSIZE != 0, "flag missing");
        }
        Err(e) => t.fail("CQSIZE ring", &e.to_string()),
    }

    let bad = Ring::init(LinuxSyscalls::new(), 0, None);
    t.check("sq_entries=0 refused", matches!(bad, Err(RingError::InvalidArgument(_))), "accepted");
    true
}

// ════════════════════════════════════════════════════════════
// Part B: Admission
// ════════════════════════════════════════════════════════════

fn test_admission(t: &mut TestRunner, engine: &mut Engine<PollHost>) {
    t.section("Part B: Admission (refused before io_uring_enter)");

    for op in [FsOp::read(), FsOp::write(), FsOp::fsync()] {
        let r = unsafe { engine.submit_fs_op(op, 10, &[], CURRENT_POSITION, &mut req(1)) };
        t.check(&format!("{}: offset -1 -> ENOTSUP", op.name()),
            r == Err(RingError::Unsupported(Unsupported::CurrentPosition)),
            &format!("{:?}", r));
    }

    for fd in 0..=2 {
        let r = engine.fsync(fd, false, &mut req(1));
        t.check(&format!("fsync(fd={}) -> stdio refused", fd),
            r == Err(RingError::Unsupported(Unsupported::StdioDescriptor(fd))),
            &format!("{:?}", r));
    }

    let r = engine.fsync(10, false, &mut FsRequest::new(1));
    t.check("no callback -> synchronous path",
        matches!(&r, Err(e) if e.wants_fallback()), &format!("{:?}", r));

    t.check("nothing pending", engine.pending() == 0, &format!("{}", engine.pending()));
    t.check("watcher idle", engine.host().watched.is_none(), "armed");
}

// ════════════════════════════════════════════════════════════
// Part C: File I/O
// ════════════════════════════════════════════════════════════

fn test_file_io(t: &mut TestRunner, engine: &mut Engine<PollHost>) {
    t.section("Part C: File I/O (writev, fsync, readv)");

    let path = std::env::temp_dir().join(format!("fsring_smoke_{}.dat", std::process::id()));
    let file = match std::fs::OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            t.fail("create temp file", &e.to_string());
            return;
        }
    };
    let fd = file.as_raw_fd();

    // C1: writev
    let parts: [&[u8]; 3] = [b"hello ", b"from ", b"io_uring"];
    let iov = parts.map(IoSlice::new);
    let mut w = req(100);
    let r = unsafe { engine.write(fd, &iov, 0, &mut w) };
    t.check("writev submitted", r.is_ok(), &format!("{:?}", r));
    t.check("watcher armed", engine.host().watched.is_some(), "not armed");
    match wait_one(engine) {
        Some(c) => t.check(&format!("writev -> {}", c.result), c.token == 100 && c.result == 19,
            &format!("token={} res={}", c.token, c.result)),
        None => t.fail("writev completion", "timeout"),
    }

    // C2: fsync / fdatasync
    for (token, datasync) in [(101, false), (102, true)] {
        let name = if datasync { "fdatasync" } else { "fsync" };
        let r = engine.fsync(fd, datasync, &mut req(token));
        t.check(&format!("{} submitted", name), r.is_ok(), &format!("{:?}", r));
        match wait_one(engine) {
            Some(c) => t.check(&format!("{} -> {}", name, c.result), c.result == 0,
                &format!("res={}", c.result)),
            None => t.fail(name, "timeout"),
        }
    }

    // C3: readv at an offset
    let mut a = [0u8; 5];
    let mut b = [0u8; 8];
    {
        let mut iov = [IoSliceMut::new(&mut a), IoSliceMut::new(&mut b)];
        let mut rd = req(103);
        let r = unsafe { engine.read(fd, &mut iov, 6, &mut rd) };
        t.check("readv submitted", r.is_ok(), &format!("{:?}", r));
        match wait_one(engine) {
            Some(c) => t.check(&format!("readv @6 -> {}", c.result), c.result == 13,
                &format!("res={}", c.result)),
            None => t.fail("readv completion", "timeout"),
        }
    }
    t.check("readv data", &a == b"from " && &b == b"io_uring",
        &format!("{:?} {:?}", String::from_utf8_lossy(&a), String::from_utf8_lossy(&b)));

    t.check("pending back to 0", engine.pending() == 0, &format!("{}", engine.pending()));
    t.check("watcher disarmed", engine.host().watched.is_none(), "still armed");

    drop(file);
    let _ = std::fs::remove_file(&path);
}

// ════════════════════════════════════════════════════════════
// Part D: Capacity
// ════════════════════════════════════════════════════════════

fn test_capacity(t: &mut TestRunner) {
    t.section("Part D: Capacity (SQ=4) and cancel");

    let config = EngineConfig::new().sq_entries(4);
    let mut engine = match Engine::new(&config, LinuxSyscalls::new(), PollHost::default()) {
        Ok(e) => e,
        Err(e) => {
            t.fail("engine sq=4", &e.to_string());
            return;
        }
    };

    let tmp = std::env::temp_dir().join(format!("fsring_smoke_cap_{}.dat", std::process::id()));
    let mut f = match std::fs::File::create(&tmp) {
        Ok(f) => f,
        Err(e) => {
            t.fail("create temp file", &e.to_string());
            return;
        }
    };
    if let Err(e) = f.write_all(b"0123456789") {
        t.fail("seed temp file", &e.to_string());
        let _ = std::fs::remove_file(&tmp);
        return;
    }
    let fd = f.as_raw_fd();

    let mut reqs: Vec<FsRequest> = (1..=4).map(req).collect();
    let mut admitted = 0;
    for r in reqs.iter_mut() {
        if engine.fsync(fd, false, r).is_ok() {
            admitted += 1;
        }
    }
    t.check("4 of 4 admitted", admitted == 4, &format!("{}", admitted));

    let r = engine.fsync(fd, false, &mut req(5));
    t.check("5th -> Exhausted (ENOMEM)", r == Err(RingError::Exhausted), &format!("{:?}", r));

    let c = engine.cancel(&mut reqs[1]);
    t.check("cancel in-flight #2", c.is_ok(), &format!("{:?}", c));
    let c = engine.cancel(&mut req(99));
    t.check("cancel unknown -> ENOSYS", c == Err(RingError::CancelUnsupported), &format!("{:?}", c));

    let mut seen = 0;
    while seen < 4 {
        let batch = wait_some(&mut engine);
        if batch.is_empty() {
            break;
        }
        for c in batch {
            if let Some(r) = reqs.iter_mut().find(|r| r.token() == c.token) {
                r.complete(c.result);
            }
            seen += 1;
        }
    }
    t.check("4 completions reaped", seen == 4, &format!("{}", seen));
    t.check("canceled keeps ECANCELED", reqs[1].result() == Some(-libc::ECANCELED),
        &format!("{:?}", reqs[1].result()));
    t.check("others succeed", reqs.iter().enumerate().all(|(i, r)| i == 1 || r.result() == Some(0)),
        "fsync failed");

    let r = engine.fsync(fd, false, &mut req(6));
    t.check("admission open again", r.is_ok(), &format!("{:?}", r));
    let _ = wait_one(&mut engine);

    drop(f);
    let _ = std::fs::remove_file(&tmp);
}

// ════════════════════════════════════════════════════════════

fn main() {
    env_logger::init();

    println!("=== fsring End-to-End Smoke Test ===");
    let kver = std::fs::read_to_string("/proc/version").unwrap_or_default();
    println!("    kernel: {}", kver.trim().split(' ').nth(2).unwrap_or("?"));

    let mut t = TestRunner::new();

    let config = EngineConfig::from_env();
    if !config.enabled {
        println!("\nFSRING_DISABLE set; nothing to test");
        return;
    }

    // Part A
    if !test_ring(&mut t) {
        println!("\nio_uring unavailable; remaining parts skipped");
        t.summary();
        std::process::exit(1);
    }

    let mut engine = match Engine::new(&config, LinuxSyscalls::new(), PollHost::default()) {
        Ok(e) => e,
        Err(e) => {
            println!("\nFATAL: engine setup failed: {}", e);
            t.summary();
            std::process::exit(1);
        }
    };

    test_admission(&mut t, &mut engine);
    test_file_io(&mut t, &mut engine);
    drop(engine);

    test_capacity(&mut t);

    t.summary();
    std::process::exit(if t.failed > 0 { 1 } else { 0 });
}
