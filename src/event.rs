//! Unnamed event objects over the simulated handle table.
//!
//! On platforms without a native unnamed-event primitive the event lives
//! entirely in the in-process table; releasing the handle deletes the
//! entry. This is the simulated-strategy consumer surface, selected
//! explicitly, never as a fallback.

use crate::error::{Error, Result};
use crate::handle::ResourceKind;
use crate::release::{simulated_allocate, simulated_table, SimulatedEntry};
use crate::resource::SafeResourceHandle;
use std::sync::atomic::{AtomicBool, Ordering};

/// An unnamed, in-process event backed by the simulated handle table.
///
/// Supports manual-reset and auto-reset semantics. There is no blocking
/// wait; scheduling is outside this crate's contract.
pub struct SimulatedEvent {
    inner: SafeResourceHandle,
    manual_reset: bool,
}

impl std::fmt::Debug for SimulatedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedEvent")
            .field("manual_reset", &self.manual_reset)
            .finish()
    }
}

impl SimulatedEvent {
    /// Create an event.
    ///
    /// `manual_reset` keeps the event signaled across waits; an auto-reset
    /// event hands the signal to exactly one successful
    /// [`try_wait`](Self::try_wait).
    pub fn new(manual_reset: bool, initial_state: bool) -> Self {
        let raw = simulated_allocate(SimulatedEntry {
            kind: "event",
            signaled: AtomicBool::new(initial_state),
            manual_reset,
        });
        SimulatedEvent {
            inner: SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated),
            manual_reset,
        }
    }

    /// Named events require a cross-process kernel object, which this shim
    /// does not provide.
    pub fn named(_name: &str) -> Result<Self> {
        Err(Error::PlatformNotSupported("named event objects"))
    }

    /// Signal the event.
    pub fn set(&self) -> Result<()> {
        self.with_entry(|signaled| signaled.store(true, Ordering::Release))
    }

    /// Clear the signal.
    pub fn reset(&self) -> Result<()> {
        self.with_entry(|signaled| signaled.store(false, Ordering::Release))
    }

    /// Whether the event is currently signaled. Does not consume the
    /// signal.
    pub fn is_set(&self) -> Result<bool> {
        self.with_entry(|signaled| signaled.load(Ordering::Acquire))
    }

    /// Non-blocking wait: returns `true` if the event was signaled. An
    /// auto-reset event clears its signal on success.
    pub fn try_wait(&self) -> Result<bool> {
        let manual = self.manual_reset;
        self.with_entry(|signaled| {
            if manual {
                signaled.load(Ordering::Acquire)
            } else {
                signaled.swap(false, Ordering::AcqRel)
            }
        })
    }

    fn with_entry<T>(&self, f: impl FnOnce(&AtomicBool) -> T) -> Result<T> {
        let pinned = self.inner.pin()?;
        // The pin keeps the release (and thus the table delete) deferred,
        // so a live entry is guaranteed here.
        match simulated_table().get(&pinned.as_raw()) {
            Some(entry) => Ok(f(&entry.signaled)),
            None => Err(Error::ObjectDisposed),
        }
    }

    /// Close the event, deleting its table entry exactly once.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether the event has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// The underlying resource handle.
    pub fn as_resource(&self) -> &SafeResourceHandle {
        &self.inner
    }
}
