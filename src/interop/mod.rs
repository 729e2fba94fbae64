//! The native interop marshaling boundary.
//!
//! A [`CallSite`] is pure metadata describing how a call maps onto a native
//! symbol: argument layout, calling convention, character set, and whether
//! the last platform error must be captured immediately after the call.
//! Binding a site validates every struct layout it references for
//! blittability; a non-conforming layout fails fast at bind time, never at
//! call time with corrupted data.
//!
//! The concrete sites in [`activity`], [`memory`], and [`random`] are the
//! runtime services exposed across this boundary.

pub mod activity;
pub mod callsite;
pub mod layout;
pub mod memory;
pub mod random;

pub use activity::{activity_id_control, ActivityControl, ActivityId};
pub use callsite::{BoundCallSite, CallSite, CallingConvention, CharSet};
pub use layout::{FieldDesc, StructLayout};
pub use memory::{query_process, query_self, ProcessMemoryCounters};
pub use random::fill_secure_random;

use crate::error::{Error, Result};

/// A bind-time failure: either the platform has no binding for the symbol
/// or a referenced layout is not blittable.
///
/// Payloads are static so the cached bind result can be handed out cheaply
/// on every later call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// The call site has no binding on the current target.
    PlatformNotSupported {
        /// The unbound symbol.
        symbol: &'static str,
    },
    /// A referenced struct layout failed validation.
    InvalidLayout {
        /// Name of the rejected layout.
        layout: &'static str,
        /// Field the check stopped at (`*` for whole-struct problems).
        field: &'static str,
        /// What was wrong.
        reason: &'static str,
    },
}

impl From<BindError> for Error {
    fn from(err: BindError) -> Error {
        match err {
            BindError::PlatformNotSupported { symbol } => Error::PlatformNotSupported(symbol),
            BindError::InvalidLayout {
                layout,
                field,
                reason,
            } => Error::InvalidLayout {
                layout,
                field,
                reason,
            },
        }
    }
}

/// Bind every built-in call site, failing fast on layout problems.
///
/// Sites that simply have no binding on this platform are skipped; their
/// absence surfaces as [`Error::PlatformNotSupported`] at the call, not
/// here.
pub(crate) fn bind_builtin_sites() -> Result<()> {
    let sites: [&'static CallSite; 3] = [
        &activity::ACTIVITY_ID_CONTROL,
        &memory::PROCESS_MEMORY_INFO,
        &random::SECURE_RANDOM_FILL,
    ];
    for site in sites {
        match site.bind() {
            Ok(_) | Err(BindError::PlatformNotSupported { .. }) => {}
            Err(err @ BindError::InvalidLayout { .. }) => return Err(err.into()),
        }
    }
    Ok(())
}
