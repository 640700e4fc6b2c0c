//! `SubmissionQueue` — userspace producer side of the io_uring SQ.
//!
//! # Ownership of the indices
//!
//! - **tail**: written only by us (the single submitting thread).
//! - **head**: written only by the kernel as it consumes entries. We read
//!   it with Acquire to see how much room it has freed.
//!
//! Ring is full when `tail - head == capacity`.
//!
//! # Protocol
//!
//! One slot is claimed at a time. `claim()` hands out the zeroed slot at
//! `tail & mask`; `advance()` publishes it by writing the redirection
//! array and bumping tail; the ring then calls `io_uring_enter`. If the
//! kernel refuses, `rollback()` puts tail back and the same slot is handed
//! out by the next `claim()`.

use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicU32, Ordering};

use fsring_core::abi::{SqRingOffsets, Sqe};
use fsring_core::error::{Result, RingError};

use crate::index::{check_layout, occupancy, slot};

/// Returned by `claim()` when every slot is waiting for the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

impl std::fmt::Display for QueueFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "io_uring submission queue full")
    }
}

pub struct SubmissionQueue {
    /// Kernel-owned consumer index.
    head: *const AtomicU32,
    /// Our producer index.
    tail: *const AtomicU32,
    /// Index redirection array, `entries` long.
    array: *mut u32,
    /// SQE array from the second mapping.
    sqes: *mut Sqe,
    mask: u32,
    entries: u32,
    claimed: bool,
}

impl SubmissionQueue {
    /// Build the view over a mapped SQ ring and SQE array.
    ///
    /// # Safety
    /// - `ring` must be the `IORING_OFF_SQ_RING` mapping described by `off`.
    /// - `sqes` must be the `IORING_OFF_SQES` mapping for the same ring.
    /// - Both must outlive the returned queue.
    pub(crate) unsafe fn new(ring: NonNull<u8>, off: &SqRingOffsets, sqes: NonNull<Sqe>) -> Result<Self> {
        let base = ring.as_ptr();
        let mask = ptr::read_volatile(base.add(off.ring_mask as usize) as *const u32);
        let entries = ptr::read_volatile(base.add(off.ring_entries as usize) as *const u32);
        check_layout(entries, mask)?;

        Ok(Self {
            head: base.add(off.head as usize) as *const AtomicU32,
            tail: base.add(off.tail as usize) as *const AtomicU32,
            array: base.add(off.array as usize) as *mut u32,
            sqes: sqes.as_ptr(),
            mask,
            entries,
            claimed: false,
        })
    }

    /// Claim the slot at the current tail.
    ///
    /// The slot is zeroed so nothing from a previous cycle leaks into the
    /// new submission. Claiming again before publishing returns the same
    /// slot.
    pub fn claim(&mut self) -> std::result::Result<&mut Sqe, QueueFull> {
        let tail = self.tail().load(Ordering::Relaxed);
        let head = self.head().load(Ordering::Acquire);
        if occupancy(head, tail) >= self.entries {
            return Err(QueueFull);
        }

        self.claimed = true;
        // Safety: slot < entries, and the kernel does not read slots at or
        // past tail until we publish them.
        let sqe = unsafe { &mut *self.sqes.add(slot(tail, self.mask)) };
        *sqe = Sqe::zeroed();
        Ok(sqe)
    }

    /// Make the claimed slot visible to the kernel. Returns the tail value
    /// before the increment, for `rollback()`.
    pub(crate) fn advance(&mut self) -> Result<u32> {
        if !self.claimed {
            return Err(RingError::NoClaim);
        }
        self.claimed = false;

        let tail = self.tail().load(Ordering::Relaxed);
        let idx = slot(tail, self.mask);
        unsafe {
            ptr::write_volatile(self.array.add(idx), idx as u32);
        }
        // SQE and array stores must land before the new tail is visible.
        fence(Ordering::Release);
        self.tail().store(tail.wrapping_add(1), Ordering::Release);
        // The tail must be visible before io_uring_enter reads it.
        fence(Ordering::SeqCst);
        Ok(tail)
    }

    /// Undo `advance()` after the kernel refused the submission. The kernel
    /// did not move head, so restoring tail restores the invariant.
    pub(crate) fn rollback(&mut self, tail: u32) {
        self.tail().store(tail, Ordering::Release);
        fence(Ordering::SeqCst);
    }

    /// Entries published but not yet consumed by the kernel.
    pub fn len(&self) -> u32 {
        let tail = self.tail().load(Ordering::Relaxed);
        let head = self.head().load(Ordering::Acquire);
        occupancy(head, tail)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> u32 {
        self.entries
    }

    pub fn head_index(&self) -> u32 {
        self.head().load(Ordering::Acquire)
    }

    pub fn tail_index(&self) -> u32 {
        self.tail().load(Ordering::Relaxed)
    }

    /// Slot the next `claim()` would return.
    pub fn next_slot(&self) -> usize {
        slot(self.tail_index(), self.mask)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    #[inline(always)]
    fn head(&self) -> &AtomicU32 {
        unsafe { &*self.head }
    }

    #[inline(always)]
    fn tail(&self) -> &AtomicU32 {
        unsafe { &*self.tail }
    }
}
