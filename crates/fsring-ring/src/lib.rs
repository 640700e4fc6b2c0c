//! # fsring-ring — io_uring ring implementation
//!
//! | Piece            | Type               | Role                                   |
//! |------------------|--------------------|----------------------------------------|
//! | SyscallLayer     | `LinuxSyscalls`    | raw io_uring syscalls, mmap, eventfd   |
//! | RingMapper       | `Ring`             | setup, three mappings, eventfd, unwind |
//! | SubmissionQueue  | `SubmissionQueue`  | claim / publish                        |
//! | CompletionQueue  | `CompletionQueue`  | peek / retire                          |
//! | Test double      | `SimKernel` (sim)  | kernel side of the protocol in memory  |
//!
//! All shared-memory access is confined to the queue boundaries. Index
//! arithmetic lives in [`index`] and is plain safe code.

pub mod index;
pub mod linux;
pub mod ring;
pub mod submission;
pub mod completion;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use linux::LinuxSyscalls;
pub use ring::Ring;
