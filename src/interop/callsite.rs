//! Declarative call-site descriptors and their bound form.

use std::io;

use crate::error::{Error, Result};
use crate::interop::layout::StructLayout;
use crate::interop::BindError;

/// Calling convention of a native symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// The platform C convention (`cdecl`).
    C,
    /// The platform system convention (`stdcall` on 32-bit Windows,
    /// identical to C elsewhere).
    System,
}

/// Character encoding for string arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharSet {
    /// Single-byte strings.
    Ansi,
    /// UTF-16 strings.
    Utf16,
}

/// Immutable descriptor of one native function binding.
///
/// Created once, in `const` position, and never mutated. A `CallSite`
/// performs no resource ownership itself; it is the mechanism release
/// strategies and ordinary interop calls rely on.
#[derive(Debug)]
pub struct CallSite {
    /// Library the symbol is exported from.
    pub library: &'static str,
    /// Exported symbol name.
    pub symbol: &'static str,
    /// Calling convention.
    pub convention: CallingConvention,
    /// Character set for string arguments.
    pub char_set: CharSet,
    /// Whether the last platform error code must be captured immediately
    /// after the call, before anything else can overwrite it.
    pub sets_last_error: bool,
    /// Whether the current build target has a binding for this site.
    pub supported: bool,
    /// Struct layouts crossing the boundary through this site.
    pub layouts: &'static [&'static StructLayout],
}

impl CallSite {
    /// Bind this site: validate every referenced layout, then check the
    /// platform binding.
    ///
    /// Layout validation runs first so a non-blittable struct is rejected
    /// even on platforms where the call would be unsupported anyway.
    pub fn bind(&'static self) -> std::result::Result<BoundCallSite, BindError> {
        for layout in self.layouts {
            layout.check()?;
        }
        if !self.supported {
            return Err(BindError::PlatformNotSupported {
                symbol: self.symbol,
            });
        }
        Ok(BoundCallSite { site: self })
    }
}

/// A call site that passed bind-time validation on this target.
#[derive(Debug, Clone, Copy)]
pub struct BoundCallSite {
    site: &'static CallSite,
}

impl BoundCallSite {
    /// The descriptor this binding was created from.
    pub fn site(&self) -> &'static CallSite {
        self.site
    }

    /// Run the native call in `f`.
    ///
    /// On failure the last platform error is captured immediately when the
    /// site declares `sets_last_error`, before any other native or
    /// scheduled code can overwrite it.
    pub fn invoke<T>(&self, f: impl FnOnce() -> std::result::Result<T, ()>) -> Result<T> {
        match f() {
            Ok(value) => Ok(value),
            Err(()) => {
                let source = if self.site.sets_last_error {
                    io::Error::last_os_error()
                } else {
                    io::Error::other("native call reported failure")
                };
                Err(Error::Native {
                    call: self.site.symbol,
                    source,
                })
            }
        }
    }
}

// One-time bind with the result cached for every later call. Bind errors
// are static, so the cached failure is handed back as-is.
macro_rules! bound_site {
    ($site:expr) => {{
        static BOUND: once_cell::sync::Lazy<
            std::result::Result<$crate::interop::BoundCallSite, $crate::interop::BindError>,
        > = once_cell::sync::Lazy::new(|| $site.bind());
        (*BOUND).map_err($crate::Error::from)
    }};
}
pub(crate) use bound_site;
