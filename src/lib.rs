//! Safe native-handle lifetime management and interop marshaling primitives.
//!
//! This crate pairs a cross-platform handle lifetime manager with the
//! native interop boundary it protects. A [`SafeResourceHandle`] owns
//! exactly one [`RawHandle`] and guarantees the platform release routine
//! runs at most once: under concurrent disposal, under drop racing an
//! explicit close, and with in-flight native calls pinned so teardown can
//! never pull the resource out from under them.
//!
//! # Example
//!
//! ```
//! use oshandle::{ResourceKind, SafeResourceHandle};
//! use oshandle::release::{simulated_allocate, simulated_contains, SimulatedEntry};
//!
//! fn main() -> oshandle::Result<()> {
//!     oshandle::init()?;
//!
//!     // Wrap an already-obtained native value.
//!     let raw = simulated_allocate(SimulatedEntry::new("demo"));
//!     let handle = SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated);
//!
//!     // Native calls go through a pin; a concurrent close waits for it.
//!     {
//!         let pinned = handle.pin()?;
//!         assert_eq!(pinned.raw(), raw);
//!     }
//!
//!     // Release runs exactly once, no matter how often close is called.
//!     handle.close();
//!     handle.close();
//!     assert!(handle.is_closed());
//!     assert!(!simulated_contains(raw));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Two-phase construction
//!
//! When the handle value is only known after a native call completes (an
//! out-parameter fill), create the wrapper empty and bind it once:
//!
//! ```
//! use oshandle::{ResourceKind, SafeResourceHandle};
//! use oshandle::release::{simulated_allocate, SimulatedEntry};
//!
//! let handle = SafeResourceHandle::unbound(true, ResourceKind::Simulated);
//! let raw = simulated_allocate(SimulatedEntry::new("late-bound"));
//! handle.set_handle(raw).expect("first bind succeeds");
//! assert!(handle.set_handle(raw).is_err(), "second bind is rejected");
//! ```

pub mod error;
pub mod event;
pub mod fd;
pub mod handle;
pub mod interop;
pub mod release;
pub mod resource;

// Re-export main types at the crate root
pub use error::{Error, Result};
pub use event::SimulatedEvent;
pub use handle::{RawHandle, ResourceKind};
pub use interop::{
    activity_id_control, fill_secure_random, query_process, query_self, ActivityControl,
    ActivityId, BoundCallSite, CallSite, CallingConvention, CharSet, FieldDesc,
    ProcessMemoryCounters, StructLayout,
};
pub use release::ReleaseStrategy;
pub use resource::{PinnedHandle, SafeResourceHandle};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bind every built-in call site, validating struct layouts fail-fast.
///
/// Optional: sites also bind lazily on first use. Calling it up front
/// surfaces a non-blittable layout before any call is attempted. Safe to
/// call multiple times.
pub fn init() -> Result<()> {
    interop::bind_builtin_sites()
}
