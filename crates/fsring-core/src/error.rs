//! fsring error types.

use nix::errno::Errno;
use thiserror::Error;

/// Why a request shape was refused before reaching the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    /// The request has no completion callback; it must run synchronously.
    MissingCallback,
    /// Offset -1 asks for the file position, which the ring cannot honour
    /// atomically.
    CurrentPosition,
    /// Descriptors 0, 1 and 2 are rejected by affected kernels.
    StdioDescriptor(i32),
}

impl std::fmt::Display for Unsupported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCallback => write!(f, "request has no completion callback"),
            Self::CurrentPosition => write!(f, "current-position offset"),
            Self::StdioDescriptor(fd) => write!(f, "standard stream descriptor {}", fd),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// io_uring_setup failed; use the fallback path for every request.
    #[error("io_uring unavailable: {0}")]
    Unavailable(Errno),
    /// Request shape the ring cannot execute; use the fallback path.
    #[error("unsupported request: {0}")]
    Unsupported(Unsupported),
    /// The engine was built without a ring.
    #[error("io_uring not enabled for this loop")]
    NotEnabled,
    /// Admission control refused the request; transient.
    #[error("submission queue exhausted")]
    Exhausted,
    /// A syscall failed; carries the errno verbatim.
    #[error("{op}: {errno}")]
    Sys { op: &'static str, errno: Errno },
    /// io_uring_enter accepted nothing although a slot was published.
    #[error("io_uring_enter submitted zero entries")]
    NothingSubmitted,
    /// The kernel dropped completions. The CQ is too small for the
    /// achieved burst rate.
    #[error("completion queue overflowed: {0} completions dropped")]
    CqOverflow(u32),
    /// The request was not admitted to this engine.
    #[error("request not owned by this engine")]
    CancelUnsupported,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The kernel-written ring header is inconsistent.
    #[error("bad ring layout: {0}")]
    Layout(&'static str),
    #[error("publish without a claimed submission slot")]
    NoClaim,
    #[error("retire on an empty completion queue")]
    NoCompletion,
}

impl RingError {
    pub fn sys(op: &'static str, errno: Errno) -> Self {
        Self::Sys { op, errno }
    }

    /// Errno equivalent, for hosts that report errors as integers.
    pub fn errno(&self) -> Errno {
        match self {
            Self::Unavailable(e) => *e,
            Self::Unsupported(_) => Errno::EOPNOTSUPP,
            Self::NotEnabled => Errno::ENOSYS,
            Self::Exhausted => Errno::ENOMEM,
            Self::Sys { errno, .. } => *errno,
            Self::NothingSubmitted => Errno::EIO,
            Self::CqOverflow(_) => Errno::EOVERFLOW,
            Self::CancelUnsupported => Errno::ENOSYS,
            Self::InvalidArgument(_)
            | Self::Layout(_)
            | Self::NoClaim
            | Self::NoCompletion => Errno::EINVAL,
        }
    }

    pub fn raw_os_error(&self) -> i32 {
        self.errno() as i32
    }

    /// True when the caller should hand the request to the thread-pool
    /// path instead of failing it.
    pub fn wants_fallback(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Unsupported(_) | Self::NotEnabled | Self::Exhausted
        )
    }
}

impl From<RingError> for std::io::Error {
    fn from(e: RingError) -> Self {
        std::io::Error::from_raw_os_error(e.raw_os_error())
    }
}

pub type Result<T> = std::result::Result<T, RingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(RingError::Unsupported(Unsupported::CurrentPosition).errno(), Errno::EOPNOTSUPP);
        assert_eq!(RingError::NotEnabled.errno(), Errno::ENOSYS);
        assert_eq!(RingError::Exhausted.errno(), Errno::ENOMEM);
        assert_eq!(RingError::sys("io_uring_enter", Errno::EBUSY).errno(), Errno::EBUSY);
        assert_eq!(RingError::Unavailable(Errno::EPERM).raw_os_error(), libc::EPERM);
        assert_eq!(RingError::CqOverflow(3).errno(), Errno::EOVERFLOW);
    }

    #[test]
    fn fallback_classes() {
        assert!(RingError::Exhausted.wants_fallback());
        assert!(RingError::NotEnabled.wants_fallback());
        assert!(RingError::Unavailable(Errno::ENOSYS).wants_fallback());
        assert!(RingError::Unsupported(Unsupported::StdioDescriptor(1)).wants_fallback());
        assert!(!RingError::CqOverflow(1).wants_fallback());
        assert!(!RingError::sys("io_uring_enter", Errno::EINVAL).wants_fallback());
        assert!(!RingError::CancelUnsupported.wants_fallback());
    }

    #[test]
    fn io_error_conversion_keeps_errno() {
        let io: std::io::Error = RingError::Exhausted.into();
        assert_eq!(io.raw_os_error(), Some(libc::ENOMEM));
    }
}
