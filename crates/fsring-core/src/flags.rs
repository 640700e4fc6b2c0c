//! Architecture-dependent flag values.
//!
//! `O_CLOEXEC` and `O_NONBLOCK` differ between Linux ports, and the
//! `EFD_*` flags used for the notification eventfd alias them. The table is
//! resolved at build time for the target architecture.

use std::os::raw::c_int;

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "alpha", target_arch = "hppa"))] {
        pub const O_CLOEXEC: c_int = 0x20_0000;
    } else if #[cfg(any(target_arch = "sparc", target_arch = "sparc64"))] {
        pub const O_CLOEXEC: c_int = 0x40_0000;
    } else {
        pub const O_CLOEXEC: c_int = 0x8_0000;
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "alpha")] {
        pub const O_NONBLOCK: c_int = 0x4;
    } else if #[cfg(target_arch = "hppa")] {
        pub const O_NONBLOCK: c_int = 0x1_0004;
    } else if #[cfg(any(target_arch = "mips", target_arch = "mips64"))] {
        pub const O_NONBLOCK: c_int = 0x80;
    } else if #[cfg(any(target_arch = "sparc", target_arch = "sparc64"))] {
        pub const O_NONBLOCK: c_int = 0x4000;
    } else {
        pub const O_NONBLOCK: c_int = 0x800;
    }
}

pub const EFD_CLOEXEC: c_int = O_CLOEXEC;
pub const EFD_NONBLOCK: c_int = O_NONBLOCK;

/// Flags for the notification eventfd.
pub const NOTIFY_EFD_FLAGS: c_int = EFD_NONBLOCK | EFD_CLOEXEC;
