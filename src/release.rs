//! Platform release strategies and the simulated handle table.
//!
//! Each resource kind binds to exactly one strategy per build target
//! (see [`ResourceKind::release_strategy`](crate::ResourceKind)). A failed
//! release is logged and never retried: retrying against an
//! already-invalidated handle risks closing an unrelated resource that was
//! assigned the reused value.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::handle::RawHandle;

/// Performs the actual native teardown for one resource kind.
///
/// `release` makes at most one attempt and reports whether the platform
/// accepted it. Implementations must not panic: the call may run on the
/// drop path with no caller left to observe a failure.
pub trait ReleaseStrategy: Send + Sync {
    /// Release the named resource. One attempt, no retry.
    fn release(&self, handle: RawHandle) -> bool;

    /// Short strategy name for log lines.
    fn name(&self) -> &'static str;
}

/// Releases POSIX file descriptors with `close(2)`.
pub struct FdRelease;

/// The process-wide [`FdRelease`] instance.
pub static FD_RELEASE: FdRelease = FdRelease;

impl ReleaseStrategy for FdRelease {
    fn release(&self, handle: RawHandle) -> bool {
        let fd = handle.as_raw() as libc::c_int;
        unsafe { libc::close(fd) == 0 }
    }

    fn name(&self) -> &'static str {
        "fd-close"
    }
}

#[cfg(windows)]
extern "system" {
    fn CloseHandle(handle: isize) -> i32;
}

/// Releases Windows kernel objects with `CloseHandle`.
///
/// On targets without kernel object handles the strategy releases nothing
/// and reports failure; the wrapper still transitions to closed.
pub struct KernelObjectRelease;

/// The process-wide [`KernelObjectRelease`] instance.
pub static KERNEL_OBJECT_RELEASE: KernelObjectRelease = KernelObjectRelease;

impl ReleaseStrategy for KernelObjectRelease {
    #[cfg(windows)]
    fn release(&self, handle: RawHandle) -> bool {
        unsafe { CloseHandle(handle.as_raw()) != 0 }
    }

    #[cfg(not(windows))]
    fn release(&self, handle: RawHandle) -> bool {
        log::warn!("no kernel object underneath handle {handle}; nothing released");
        false
    }

    fn name(&self) -> &'static str {
        "kernel-object-close"
    }
}

/// One entry in the simulated handle table.
///
/// Carries the signal state used by the unnamed-event shim; other simulated
/// resources leave it at its defaults.
#[derive(Debug)]
pub struct SimulatedEntry {
    /// What the entry stands in for (for diagnostics).
    pub kind: &'static str,
    /// Signal state for event-like entries.
    pub signaled: AtomicBool,
    /// Whether `signaled` survives a successful wait.
    pub manual_reset: bool,
}

impl SimulatedEntry {
    /// A plain entry with no event semantics.
    pub fn new(kind: &'static str) -> Self {
        SimulatedEntry {
            kind,
            signaled: AtomicBool::new(false),
            manual_reset: false,
        }
    }
}

static SIMULATED: Lazy<DashMap<isize, SimulatedEntry>> = Lazy::new(DashMap::new);

// Ids start above zero so the NULL sentinel can never collide with a live
// entry.
static NEXT_SIMULATED_ID: AtomicIsize = AtomicIsize::new(1);

/// Insert an entry into the simulated table and hand out its fresh handle.
pub fn simulated_allocate(entry: SimulatedEntry) -> RawHandle {
    let id = NEXT_SIMULATED_ID.fetch_add(1, Ordering::Relaxed);
    SIMULATED.insert(id, entry);
    RawHandle::new(id)
}

/// Whether the table currently holds an entry for `handle`.
pub fn simulated_contains(handle: RawHandle) -> bool {
    SIMULATED.contains_key(&handle.as_raw())
}

/// Number of live simulated entries.
pub fn simulated_len() -> usize {
    SIMULATED.len()
}

pub(crate) fn simulated_table() -> &'static DashMap<isize, SimulatedEntry> {
    &SIMULATED
}

/// Releases simulated handles by deleting their table entry.
///
/// Used where the platform has no native primitive for the resource; the
/// table delete is the whole teardown. Selection is explicit via
/// [`ResourceKind::Simulated`](crate::ResourceKind::Simulated), never a
/// silent fallback.
pub struct SimulatedRelease;

/// The process-wide [`SimulatedRelease`] instance.
pub static SIMULATED_RELEASE: SimulatedRelease = SimulatedRelease;

impl ReleaseStrategy for SimulatedRelease {
    fn release(&self, handle: RawHandle) -> bool {
        SIMULATED.remove(&handle.as_raw()).is_some()
    }

    fn name(&self) -> &'static str {
        "simulated-table"
    }
}

/// Log a failed release. Called from the release path only; the failure is
/// recorded and otherwise invisible to control flow.
pub(crate) fn log_release_failure(strategy: &dyn ReleaseStrategy, handle: RawHandle) {
    log::warn!(
        "{} failed to release handle {}: {}",
        strategy.name(),
        handle,
        io::Error::last_os_error()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_allocate_and_release() {
        let h = simulated_allocate(SimulatedEntry::new("test"));
        assert!(simulated_contains(h));
        assert!(simulated_len() >= 1);
        assert!(SIMULATED_RELEASE.release(h), "first delete should succeed");
        assert!(!simulated_contains(h));
        assert!(!SIMULATED_RELEASE.release(h), "second delete should fail");
    }

    #[test]
    fn test_simulated_ids_are_unique() {
        let a = simulated_allocate(SimulatedEntry::new("test"));
        let b = simulated_allocate(SimulatedEntry::new("test"));
        assert_ne!(a, b);
        assert!(SIMULATED_RELEASE.release(a));
        assert!(SIMULATED_RELEASE.release(b));
    }

    #[test]
    fn test_fd_release_rejects_bad_fd() {
        assert!(!FD_RELEASE.release(RawHandle::new(-1)));
    }
}
