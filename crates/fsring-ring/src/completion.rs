//! `CompletionQueue` — userspace consumer side of the io_uring CQ.
//!
//! head = our consumer position (the kernel reads it to find free slots)
//! tail = kernel producer position
//!
//! Ring is empty when head == tail.
//!
//! Consumption is split in two: `peek()` borrows the CQE at head and
//! `retire()` hands the slot back to the kernel. The borrow from `peek()`
//! must end before `retire()` can be called, so the payload is always
//! copied out before the kernel may reuse the slot.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};

use fsring_core::abi::{CqRingOffsets, Cqe};
use fsring_core::error::{Result, RingError};

use crate::index::{check_layout, occupancy, slot};

pub struct CompletionQueue {
    /// Our consumer index.
    head: *const AtomicU32,
    /// Kernel-owned producer index.
    tail: *const AtomicU32,
    /// Completions the kernel had to drop.
    overflow: *const AtomicU32,
    cqes: *const Cqe,
    mask: u32,
    entries: u32,
}

impl CompletionQueue {
    /// # Safety
    /// `ring` must be the `IORING_OFF_CQ_RING` mapping described by `off`
    /// and must outlive the returned queue.
    pub(crate) unsafe fn new(ring: NonNull<u8>, off: &CqRingOffsets) -> Result<Self> {
        let base = ring.as_ptr();
        let mask = ptr::read_volatile(base.add(off.ring_mask as usize) as *const u32);
        let entries = ptr::read_volatile(base.add(off.ring_entries as usize) as *const u32);
        check_layout(entries, mask)?;

        Ok(Self {
            head: base.add(off.head as usize) as *const AtomicU32,
            tail: base.add(off.tail as usize) as *const AtomicU32,
            overflow: base.add(off.overflow as usize) as *const AtomicU32,
            cqes: base.add(off.cqes as usize) as *const Cqe,
            mask,
            entries,
        })
    }

    /// The next completion, if the kernel has produced one.
    pub fn peek(&self) -> Option<&Cqe> {
        let head = self.head().load(Ordering::Relaxed);
        // Acquire pairs with the kernel's release of tail: the CQE body is
        // visible once the new tail is.
        let tail = self.tail().load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        Some(unsafe { &*self.cqes.add(slot(head, self.mask)) })
    }

    /// Release the slot returned by `peek()` back to the kernel.
    ///
    /// A nonzero overflow counter means completions were lost; that is a
    /// sizing defect and is reported as `RingError::CqOverflow`.
    pub fn retire(&mut self) -> Result<()> {
        let head = self.head().load(Ordering::Relaxed);
        let tail = self.tail().load(Ordering::Acquire);
        if head == tail {
            return Err(RingError::NoCompletion);
        }
        self.head().store(head.wrapping_add(1), Ordering::Release);

        let dropped = self.overflow_ctr().load(Ordering::Acquire);
        if dropped != 0 {
            log::error!(
                "fsring: completion queue overflowed, {} completions lost (cq_entries={})",
                dropped,
                self.entries
            );
            return Err(RingError::CqOverflow(dropped));
        }
        Ok(())
    }

    /// Completions waiting to be retired.
    pub fn len(&self) -> u32 {
        let head = self.head().load(Ordering::Relaxed);
        let tail = self.tail().load(Ordering::Acquire);
        occupancy(head, tail)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> u32 {
        self.entries
    }

    pub fn overflow(&self) -> u32 {
        self.overflow_ctr().load(Ordering::Acquire)
    }

    pub fn head_index(&self) -> u32 {
        self.head().load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn head(&self) -> &AtomicU32 {
        unsafe { &*self.head }
    }

    #[inline(always)]
    fn tail(&self) -> &AtomicU32 {
        unsafe { &*self.tail }
    }

    #[inline(always)]
    fn overflow_ctr(&self) -> &AtomicU32 {
        unsafe { &*self.overflow }
    }
}
