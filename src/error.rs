//! Error types for the oshandle crate.

use std::io;

use thiserror::Error;

/// Result type alias for oshandle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for oshandle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Misuse of the two-phase construction protocol (setting the handle
    /// value after closure, setting it twice, or using an unbound handle).
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// A closed handle was passed to a native call.
    #[error("handle is closed")]
    ObjectDisposed,

    /// A call site has no binding on this platform.
    #[error("not supported on this platform: {0}")]
    PlatformNotSupported(&'static str),

    /// A struct layout failed the blittability check at bind time.
    #[error("layout `{layout}` is not blittable: field `{field}`: {reason}")]
    InvalidLayout {
        /// Name of the rejected layout.
        layout: &'static str,
        /// Field the check stopped at (`*` for whole-struct problems).
        field: &'static str,
        /// What was wrong.
        reason: &'static str,
    },

    /// A native call failed. Carries the platform error code captured
    /// immediately after the call returned.
    #[error("native call `{call}` failed: {source}")]
    Native {
        /// Symbol of the call site that failed.
        call: &'static str,
        /// The captured OS error.
        source: io::Error,
    },
}

impl Error {
    /// Check if this is a disposed-handle error.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Error::ObjectDisposed)
    }

    /// Check if this is a platform-not-supported error.
    pub fn is_platform_not_supported(&self) -> bool {
        matches!(self, Error::PlatformNotSupported(_))
    }

    /// Check if this is a two-phase construction misuse.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Error::InvalidOperation(_))
    }

    /// Check if this is a failed native call.
    pub fn is_native(&self) -> bool {
        matches!(self, Error::Native { .. })
    }
}
