//! # fsring-core — ABI and trait definitions for fsring
//!
//! This crate holds everything that is shared between the ring
//! implementation and the engine that drives it:
//!
//! - [`abi`]: the io_uring structures and constants, laid out exactly as
//!   the kernel expects them.
//! - [`flags`]: per-architecture flag values resolved at build time.
//! - [`syscalls`]: the `RingSyscalls` seam between ring logic and the OS.
//! - [`host`]: the `HostLoop` seam to the event loop that polls the
//!   notification descriptor.
//! - [`error`]: `RingError` and the crate `Result` alias.
//!
//! Nothing here touches the kernel. Implementations live in `fsring-ring`.

pub mod abi;
pub mod flags;
pub mod syscalls;
pub mod host;
pub mod error;
