//! Host event-loop seam.
//!
//! The engine never polls on its own. When the first operation goes in
//! flight it asks the host loop to watch the notification eventfd for
//! readability; when the last one is reaped it asks it to stop. The host
//! then calls `Engine::on_readable` from its own dispatch.

use std::os::unix::io::RawFd;

pub trait HostLoop {
    /// Start reporting readability of `fd`.
    fn watch_readable(&mut self, fd: RawFd);

    /// Stop reporting readability of `fd`.
    fn unwatch(&mut self, fd: RawFd);
}
