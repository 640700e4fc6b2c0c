//! Ring index arithmetic.
//!
//! Heads and tails are free-running `u32` counters. The number of
//! occupied slots is their wrapping difference and the array slot is the
//! counter masked by `capacity - 1`.

use fsring_core::error::{Result, RingError};

/// Slots between consumer `head` and producer `tail`.
#[inline]
pub fn occupancy(head: u32, tail: u32) -> u32 {
    tail.wrapping_sub(head)
}

#[inline]
pub fn slot(pos: u32, mask: u32) -> usize {
    (pos & mask) as usize
}

/// Validate the kernel-written `ring_entries` / `ring_mask` pair.
pub fn check_layout(entries: u32, mask: u32) -> Result<()> {
    if entries == 0 || !entries.is_power_of_two() {
        return Err(RingError::Layout("ring_entries not a power of two"));
    }
    if mask != entries - 1 {
        return Err(RingError::Layout("ring_mask does not match ring_entries"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_survives_wrap() {
        assert_eq!(occupancy(0, 0), 0);
        assert_eq!(occupancy(5, 9), 4);
        assert_eq!(occupancy(u32::MAX - 1, 2), 4);
        assert_eq!(occupancy(u32::MAX, u32::MAX), 0);
    }

    #[test]
    fn slot_masks_counter() {
        assert_eq!(slot(0, 3), 0);
        assert_eq!(slot(4, 3), 0);
        assert_eq!(slot(7, 3), 3);
        assert_eq!(slot(u32::MAX, 7), 7);
    }

    #[test]
    fn layout_validation() {
        assert!(check_layout(8, 7).is_ok());
        assert_eq!(check_layout(0, 0), Err(RingError::Layout("ring_entries not a power of two")));
        assert!(check_layout(6, 5).is_err());
        assert!(check_layout(8, 3).is_err());
    }
}
