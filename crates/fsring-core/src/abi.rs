//! io_uring kernel ABI.
//!
//! Mirrors `include/uapi/linux/io_uring.h` field for field. Reserved and
//! padding fields are kept so that sizes and offsets match the kernel; the
//! layout is pinned by the const assertions at the bottom of this file.

use bitflags::bitflags;

// ── mmap offsets ──

pub const IORING_OFF_SQ_RING: u64 = 0;
pub const IORING_OFF_CQ_RING: u64 = 0x800_0000;
pub const IORING_OFF_SQES: u64 = 0x1000_0000;

// ── io_uring_setup(2) flags ──

pub const IORING_SETUP_CQSIZE: u32 = 1 << 3;

// ── io_uring_enter(2) flags ──

pub const IORING_ENTER_GETEVENTS: u32 = 1 << 0;

// ── io_uring_register(2) opcodes ──

pub const IORING_REGISTER_EVENTFD: u32 = 4;
pub const IORING_UNREGISTER_EVENTFD: u32 = 5;

/// Opcodes this crate submits. The kernel defines many more.
pub mod op {
    pub const NOP: u8 = 0;
    pub const READV: u8 = 1;
    pub const WRITEV: u8 = 2;
    pub const FSYNC: u8 = 3;
}

/// Offset value meaning "use and advance the file position".
///
/// The ring has no atomic equivalent, so it is never submitted.
pub const CURRENT_POSITION: i64 = -1;

/// Largest ring the kernel will create.
pub const MAX_ENTRIES: u32 = 32768;

bitflags! {
    /// `RWF_*` flags carried by READV/WRITEV.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RwFlags: u32 {
        const HIPRI = 1 << 0;
        const DSYNC = 1 << 1;
        const SYNC = 1 << 2;
        const NOWAIT = 1 << 3;
        const APPEND = 1 << 4;
    }
}

bitflags! {
    /// `IORING_FSYNC_*` flags carried by FSYNC.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FsyncFlags: u32 {
        const DATASYNC = 1 << 0;
    }
}

/// A file operation together with the flags that belong to its opcode.
///
/// The kernel stores these flags in a union inside the SQE; here each
/// variant only carries the flag type that is valid for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Read { flags: RwFlags },
    Write { flags: RwFlags },
    Fsync { flags: FsyncFlags },
}

impl FsOp {
    pub const fn read() -> Self {
        FsOp::Read { flags: RwFlags::empty() }
    }

    pub const fn write() -> Self {
        FsOp::Write { flags: RwFlags::empty() }
    }

    pub const fn fsync() -> Self {
        FsOp::Fsync { flags: FsyncFlags::empty() }
    }

    pub const fn fdatasync() -> Self {
        FsOp::Fsync { flags: FsyncFlags::DATASYNC }
    }

    /// The `IORING_OP_*` value for this operation.
    pub const fn opcode(self) -> u8 {
        match self {
            FsOp::Read { .. } => op::READV,
            FsOp::Write { .. } => op::WRITEV,
            FsOp::Fsync { .. } => op::FSYNC,
        }
    }

    /// The raw word written into the SQE flag union.
    pub const fn op_flags(self) -> u32 {
        match self {
            FsOp::Read { flags } | FsOp::Write { flags } => flags.bits(),
            FsOp::Fsync { flags } => flags.bits(),
        }
    }

    /// Rebuild an operation from its raw SQE encoding.
    pub fn decode(opcode: u8, op_flags: u32) -> Option<Self> {
        match opcode {
            op::READV => Some(FsOp::Read { flags: RwFlags::from_bits_retain(op_flags) }),
            op::WRITEV => Some(FsOp::Write { flags: RwFlags::from_bits_retain(op_flags) }),
            op::FSYNC => Some(FsOp::Fsync { flags: FsyncFlags::from_bits_retain(op_flags) }),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FsOp::Read { .. } => "readv",
            FsOp::Write { .. } => "writev",
            FsOp::Fsync { .. } => "fsync",
        }
    }
}

/// Submission queue entry (`struct io_uring_sqe`, 64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sqe {
    pub opcode: u8,
    pub flags: u8,
    pub ioprio: u16,
    pub fd: i32,
    pub off: u64,
    /// Pointer to the iovec array.
    pub addr: u64,
    /// Number of iovecs.
    pub len: u32,
    /// `rw_flags` / `fsync_flags` union.
    pub op_flags: u32,
    /// Correlation token, echoed back in the CQE.
    pub user_data: u64,
    pub buf_index: u16,
    pub personality: u16,
    pub splice_fd_in: i32,
    pub _pad: [u64; 2],
}

impl Sqe {
    pub const fn zeroed() -> Self {
        Self {
            opcode: 0,
            flags: 0,
            ioprio: 0,
            fd: 0,
            off: 0,
            addr: 0,
            len: 0,
            op_flags: 0,
            user_data: 0,
            buf_index: 0,
            personality: 0,
            splice_fd_in: 0,
            _pad: [0; 2],
        }
    }

    /// Fill the fields used by READV/WRITEV/FSYNC.
    pub fn prep(&mut self, op: FsOp, fd: i32, iovecs: u64, nr_iovecs: u32, offset: u64, token: u64) {
        self.opcode = op.opcode();
        self.fd = fd;
        self.off = offset;
        self.addr = iovecs;
        self.len = nr_iovecs;
        self.op_flags = op.op_flags();
        self.user_data = token;
    }

    pub fn op(&self) -> Option<FsOp> {
        FsOp::decode(self.opcode, self.op_flags)
    }
}

/// Completion queue entry (`struct io_uring_cqe`, 16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cqe {
    pub user_data: u64,
    /// Bytes transferred, or a negative errno.
    pub res: i32,
    pub flags: u32,
}

/// `struct io_sqring_offsets`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SqRingOffsets {
    pub head: u32,
    pub tail: u32,
    pub ring_mask: u32,
    pub ring_entries: u32,
    pub flags: u32,
    pub dropped: u32,
    pub array: u32,
    pub resv1: u32,
    pub user_addr: u64,
}

/// `struct io_cqring_offsets`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CqRingOffsets {
    pub head: u32,
    pub tail: u32,
    pub ring_mask: u32,
    pub ring_entries: u32,
    pub overflow: u32,
    pub cqes: u32,
    pub flags: u32,
    pub resv1: u32,
    pub user_addr: u64,
}

/// `struct io_uring_params`. Passed to io_uring_setup(2) and filled in by
/// the kernel on success.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoUringParams {
    pub sq_entries: u32,
    pub cq_entries: u32,
    pub flags: u32,
    pub sq_thread_cpu: u32,
    pub sq_thread_idle: u32,
    pub features: u32,
    pub wq_fd: u32,
    pub resv: [u32; 3],
    pub sq_off: SqRingOffsets,
    pub cq_off: CqRingOffsets,
}

impl IoUringParams {
    /// Bytes to map at `IORING_OFF_SQ_RING`.
    pub fn sq_ring_len(&self) -> usize {
        self.sq_off.array as usize + self.sq_entries as usize * std::mem::size_of::<u32>()
    }

    /// Bytes to map at `IORING_OFF_SQES`.
    pub fn sqes_len(&self) -> usize {
        self.sq_entries as usize * std::mem::size_of::<Sqe>()
    }

    /// Bytes to map at `IORING_OFF_CQ_RING`.
    pub fn cq_ring_len(&self) -> usize {
        self.cq_off.cqes as usize + self.cq_entries as usize * std::mem::size_of::<Cqe>()
    }
}

const _: () = assert!(std::mem::size_of::<Sqe>() == 64);
const _: () = assert!(std::mem::size_of::<Cqe>() == 16);
const _: () = assert!(std::mem::size_of::<SqRingOffsets>() == 40);
const _: () = assert!(std::mem::size_of::<CqRingOffsets>() == 40);
const _: () = assert!(std::mem::size_of::<IoUringParams>() == 120);
