//! # fsring-engine — io_uring filesystem backend for an event loop
//!
//! One [`Engine`] per host loop. It owns a [`Ring`](fsring_ring::Ring),
//! admits asynchronous read/write/fsync requests up to the SQ capacity,
//! and delivers each completion back to the request that produced it.
//!
//! ```text
//! host loop ──submit_fs_op──▶ Engine ──claim/publish──▶ SQ ──▶ kernel
//!     ▲                         │                               │
//!     │                     watch(eventfd)                      ▼
//!     └────── on_readable ◀── eventfd ◀────────────── CQ ◀──────┘
//! ```
//!
//! Requests the ring cannot take come back as a [`RingError`] with
//! `wants_fallback() == true`; the host runs them on its thread pool.

pub mod config;
pub mod engine;
pub mod request;

pub use config::EngineConfig;
pub use engine::{Completion, Engine, EngineId};
pub use request::FsRequest;

pub use fsring_core::error::{Result, RingError, Unsupported};
