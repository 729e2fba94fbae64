//! The safe resource handle core.
//!
//! [`SafeResourceHandle`] owns exactly one [`RawHandle`] and guarantees the
//! bound release strategy runs at most once per instance, no matter how
//! many threads request disposal or whether teardown comes from an explicit
//! [`close`](SafeResourceHandle::close) or from drop.
//!
//! The whole lifecycle lives in one packed atomic word:
//!
//! * `BINDING`/`BOUND` track the two-phase construction protocol
//!   (empty wrapper populated later by a marshaling layer),
//! * `CLOSED` is the claim gate; whichever thread sets it first wins the
//!   right to tear down,
//! * `RELEASED` latches "the release path has resolved" so it can never
//!   run twice,
//! * the remaining bits count in-flight pins. A pinned handle is in use by
//!   a native call; close defers the actual release until pins drain, so a
//!   call in flight never races the resource out from under itself.

use std::ops::Deref;
use std::sync::atomic::{AtomicIsize, AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::handle::{RawHandle, ResourceKind};
use crate::release::{log_release_failure, ReleaseStrategy};

// State word layout. Pin count lives above the flag bits.
const BINDING: u32 = 1;
const BOUND: u32 = 1 << 1;
const CLOSED: u32 = 1 << 2;
const RELEASED: u32 = 1 << 3;
const PIN_ONE: u32 = 1 << 4;
const FLAG_MASK: u32 = PIN_ONE - 1;
const PIN_MASK: u32 = !FLAG_MASK;

/// A managed wrapper owning exactly one native handle.
///
/// # Example
///
/// ```
/// use oshandle::{ResourceKind, SafeResourceHandle};
/// use oshandle::release::{simulated_allocate, SimulatedEntry};
///
/// let raw = simulated_allocate(SimulatedEntry::new("demo"));
/// let handle = SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated);
/// assert!(!handle.is_closed());
///
/// handle.close();
/// assert!(handle.is_closed());
/// assert!(handle.is_invalid());
///
/// // A second close is a no-op.
/// handle.close();
/// ```
pub struct SafeResourceHandle {
    raw: AtomicIsize,
    state: AtomicU32,
    owns_handle: bool,
    invalid: RawHandle,
    strategy: &'static dyn ReleaseStrategy,
}

impl SafeResourceHandle {
    /// Wrap an already-obtained native value.
    ///
    /// Does not perform any native acquisition and never fails on valid
    /// input. With `owns_handle = false` the wrapper observes the value but
    /// will never release it.
    pub fn acquire(raw: RawHandle, owns_handle: bool, kind: ResourceKind) -> Self {
        Self::acquire_with(
            raw,
            owns_handle,
            kind.invalid_sentinel(),
            kind.release_strategy(),
        )
    }

    /// Wrap a value with an explicit sentinel and release strategy.
    ///
    /// Extension seam for resource kinds this crate does not name; the
    /// built-in kinds go through [`acquire`](Self::acquire).
    pub fn acquire_with(
        raw: RawHandle,
        owns_handle: bool,
        invalid: RawHandle,
        strategy: &'static dyn ReleaseStrategy,
    ) -> Self {
        SafeResourceHandle {
            raw: AtomicIsize::new(raw.as_raw()),
            state: AtomicU32::new(BINDING | BOUND),
            owns_handle,
            invalid,
            strategy,
        }
    }

    /// Create an empty wrapper to be populated later via
    /// [`set_handle`](Self::set_handle).
    pub fn unbound(owns_handle: bool, kind: ResourceKind) -> Self {
        Self::unbound_with(owns_handle, kind.invalid_sentinel(), kind.release_strategy())
    }

    /// Create an empty wrapper with an explicit sentinel and strategy.
    pub fn unbound_with(
        owns_handle: bool,
        invalid: RawHandle,
        strategy: &'static dyn ReleaseStrategy,
    ) -> Self {
        SafeResourceHandle {
            raw: AtomicIsize::new(invalid.as_raw()),
            state: AtomicU32::new(0),
            owns_handle,
            invalid,
            strategy,
        }
    }

    /// Populate the underlying handle value, exactly once.
    ///
    /// Errors with [`Error::InvalidOperation`] if the value was already set
    /// or the wrapper has been closed. On error the wrapper takes no
    /// ownership of `raw`; the caller still holds it.
    pub fn set_handle(&self, raw: RawHandle) -> Result<()> {
        // Claim the transient BINDING bit first so two concurrent setters
        // cannot both store a value.
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & CLOSED != 0 {
                return Err(Error::InvalidOperation("handle already closed"));
            }
            if state & (BINDING | BOUND) != 0 {
                return Err(Error::InvalidOperation("handle value already set"));
            }
            match self.state.compare_exchange_weak(
                state,
                state | BINDING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => state = current,
            }
        }

        self.raw.store(raw.as_raw(), Ordering::Release);

        // Publish BOUND, unless a close slipped in while we were binding.
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & CLOSED != 0 {
                // The wrapper is already dead; give the value back.
                self.raw.store(self.invalid.as_raw(), Ordering::Release);
                return Err(Error::InvalidOperation("handle already closed"));
            }
            match self.state.compare_exchange_weak(
                state,
                state | BOUND,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(current) => state = current,
            }
        }
    }

    /// Request release of the underlying resource.
    ///
    /// Idempotent and thread-safe: under any number of concurrent callers
    /// the release routine executes exactly once. A failed OS-level close
    /// is logged, never retried, and the wrapper still transitions to
    /// closed. Retrying against a potentially reused handle value is the
    /// classic double-release hazard.
    ///
    /// If pinned calls are in flight the release is deferred to the last
    /// unpin; this call still returns with the handle marked closed.
    pub fn close(&self) {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & CLOSED != 0 {
                return;
            }
            let release_now = state & PIN_MASK == 0 && state & RELEASED == 0;
            let mut next = state | CLOSED;
            if release_now {
                next |= RELEASED;
            }
            match self.state.compare_exchange_weak(
                state,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if release_now {
                        self.run_release(state & BOUND != 0);
                    }
                    return;
                }
                Err(current) => state = current,
            }
        }
    }

    /// Mark the wrapper closed without invoking the release routine.
    ///
    /// For when ownership of the raw value has been transferred elsewhere
    /// and this wrapper must become inert.
    pub fn set_handle_as_invalid(&self) {
        self.state.fetch_or(CLOSED | RELEASED, Ordering::AcqRel);
    }

    /// Relinquish ownership and return the raw value without releasing it.
    pub fn into_raw(self) -> RawHandle {
        let raw = RawHandle::new(self.raw.load(Ordering::Acquire));
        self.set_handle_as_invalid();
        raw
    }

    /// Pin the handle for the duration of a native call.
    ///
    /// Errors with [`Error::ObjectDisposed`] once closed and
    /// [`Error::InvalidOperation`] before the value is bound. While any
    /// pin is live the underlying resource is guaranteed not to be
    /// released.
    pub fn pin(&self) -> Result<PinnedHandle<'_>> {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & CLOSED != 0 {
                return Err(Error::ObjectDisposed);
            }
            if state & BOUND == 0 {
                return Err(Error::InvalidOperation("handle value not set"));
            }
            match self.state.compare_exchange_weak(
                state,
                state + PIN_ONE,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(PinnedHandle {
                        owner: self,
                        raw: RawHandle::new(self.raw.load(Ordering::Acquire)),
                    })
                }
                Err(current) => state = current,
            }
        }
    }

    fn unpin(&self) {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            debug_assert!(state & PIN_MASK >= PIN_ONE, "unpin without pin");
            let remaining = state - PIN_ONE;
            let release_now =
                remaining & PIN_MASK == 0 && state & CLOSED != 0 && state & RELEASED == 0;
            let mut next = remaining;
            if release_now {
                next |= RELEASED;
            }
            match self.state.compare_exchange_weak(
                state,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if release_now {
                        self.run_release(state & BOUND != 0);
                    }
                    return;
                }
                Err(current) => state = current,
            }
        }
    }

    // Runs on the single thread that won the claim. Never panics, never
    // propagates: there may be no caller context left to observe failure.
    fn run_release(&self, bound: bool) {
        if !bound || !self.owns_handle {
            return;
        }
        let raw = RawHandle::new(self.raw.load(Ordering::Acquire));
        if raw == self.invalid {
            return;
        }
        if !self.strategy.release(raw) {
            log_release_failure(self.strategy, raw);
        }
    }

    /// Whether release has been requested (explicitly or via drop).
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) & CLOSED != 0
    }

    /// Whether the wrapper holds no usable resource: unbound, closed, or
    /// carrying the invalid sentinel.
    pub fn is_invalid(&self) -> bool {
        let state = self.state.load(Ordering::Acquire);
        if state & CLOSED != 0 || state & BOUND == 0 {
            return true;
        }
        RawHandle::new(self.raw.load(Ordering::Acquire)) == self.invalid
    }

    /// Whether this wrapper is responsible for releasing the resource.
    pub fn owns_handle(&self) -> bool {
        self.owns_handle
    }
}

impl Drop for SafeResourceHandle {
    // The finalization path: same claim gate as explicit close, so a drop
    // racing a concurrent close still releases exactly once. Must not
    // panic; release failures are logged inside `close`.
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SafeResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeResourceHandle")
            .field("raw", &RawHandle::new(self.raw.load(Ordering::Relaxed)))
            .field("owns_handle", &self.owns_handle)
            .field("is_closed", &self.is_closed())
            .field("is_invalid", &self.is_invalid())
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// An in-use guard over a [`SafeResourceHandle`].
///
/// Dereferences to the pinned [`RawHandle`]. While alive, a concurrent
/// close marks the wrapper closed but defers the actual release until this
/// guard (and any others) drop.
#[derive(Debug)]
pub struct PinnedHandle<'a> {
    owner: &'a SafeResourceHandle,
    raw: RawHandle,
}

impl PinnedHandle<'_> {
    /// The pinned raw value.
    pub fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl Deref for PinnedHandle<'_> {
    type Target = RawHandle;

    fn deref(&self) -> &RawHandle {
        &self.raw
    }
}

impl Drop for PinnedHandle<'_> {
    fn drop(&mut self) {
        self.owner.unpin();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{simulated_allocate, simulated_contains, SimulatedEntry};

    #[test]
    fn test_pin_exposes_raw_value() {
        let raw = simulated_allocate(SimulatedEntry::new("test"));
        let handle = SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated);
        {
            let pinned = handle.pin().expect("pin should succeed");
            assert_eq!(pinned.raw(), raw);
            assert_eq!(*pinned, raw);
        }
        handle.close();
    }

    #[test]
    fn test_close_defers_until_pins_drain() {
        let raw = simulated_allocate(SimulatedEntry::new("test"));
        let handle = SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated);

        let pinned = handle.pin().expect("pin should succeed");
        handle.close();

        assert!(handle.is_closed());
        assert!(
            simulated_contains(raw),
            "release must wait for the pin to drain"
        );

        drop(pinned);
        assert!(!simulated_contains(raw), "last unpin performs the release");
    }

    #[test]
    fn test_drop_releases_owned_handle() {
        let raw = simulated_allocate(SimulatedEntry::new("test"));
        {
            let _handle = SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated);
        }
        assert!(!simulated_contains(raw));
    }

    #[test]
    fn test_into_raw_suppresses_release() {
        let raw = simulated_allocate(SimulatedEntry::new("test"));
        let handle = SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated);
        let back = handle.into_raw();
        assert_eq!(back, raw);
        assert!(simulated_contains(raw), "into_raw must not release");
        assert!(crate::release::SIMULATED_RELEASE.release(raw));
    }
}
