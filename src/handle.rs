//! Raw handle values and resource kinds.
//!
//! A [`RawHandle`] is pure data: a platform-word-sized resource identifier
//! with no ownership attached. Ownership lives in
//! [`SafeResourceHandle`](crate::SafeResourceHandle).

use std::fmt;

use crate::release::{ReleaseStrategy, FD_RELEASE, KERNEL_OBJECT_RELEASE, SIMULATED_RELEASE};

/// Opaque platform resource identifier (file descriptor, kernel object,
/// simulated table entry).
///
/// Equality is by raw value. A `RawHandle` never owns the resource it names.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(isize);

impl RawHandle {
    /// The all-zero sentinel.
    pub const NULL: RawHandle = RawHandle(0);

    /// The all-ones sentinel (`-1`, `INVALID_HANDLE_VALUE` / failed fd).
    pub const MINUS_ONE: RawHandle = RawHandle(-1);

    /// Wrap a raw platform value.
    #[inline]
    pub const fn new(value: isize) -> Self {
        RawHandle(value)
    }

    /// The underlying platform value.
    #[inline]
    pub const fn as_raw(self) -> isize {
        self.0
    }
}

impl From<isize> for RawHandle {
    fn from(value: isize) -> Self {
        RawHandle(value)
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.0)
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The resource families a handle can belong to.
///
/// Each kind fixes two things at bind time: the invalid sentinel for its
/// values and the release strategy that tears them down. Both are constant
/// per build target; nothing is re-selected per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A POSIX file descriptor, released with `close(2)`.
    FileDescriptor,
    /// A Windows kernel object, released with `CloseHandle`.
    KernelObject,
    /// An entry in the in-process simulated handle table. Only reachable
    /// when chosen explicitly; nothing falls back to it.
    Simulated,
}

impl ResourceKind {
    /// The reserved "no resource" value for this kind.
    pub const fn invalid_sentinel(self) -> RawHandle {
        match self {
            ResourceKind::FileDescriptor => RawHandle::MINUS_ONE,
            ResourceKind::KernelObject => RawHandle::NULL,
            ResourceKind::Simulated => RawHandle::NULL,
        }
    }

    /// The release strategy bound to this kind on the current target.
    pub fn release_strategy(self) -> &'static dyn ReleaseStrategy {
        match self {
            ResourceKind::FileDescriptor => &FD_RELEASE,
            ResourceKind::KernelObject => &KERNEL_OBJECT_RELEASE,
            ResourceKind::Simulated => &SIMULATED_RELEASE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert_eq!(RawHandle::NULL.as_raw(), 0);
        assert_eq!(RawHandle::MINUS_ONE.as_raw(), -1);
        assert_eq!(RawHandle::new(7), RawHandle::from(7));
    }

    #[test]
    fn test_kind_sentinels() {
        assert_eq!(
            ResourceKind::FileDescriptor.invalid_sentinel(),
            RawHandle::MINUS_ONE
        );
        assert_eq!(ResourceKind::Simulated.invalid_sentinel(), RawHandle::NULL);
    }
}
