//! File-descriptor handles, the native-strategy consumer surface.
//!
//! `SafeFileHandle` is the shape file I/O builds on: acquisition through an
//! interop call, the raw descriptor wrapped immediately, every subsequent
//! native call made through a pin so a concurrent close cannot invalidate
//! the descriptor mid-call.

#![cfg(unix)]

use std::ffi::CString;
use std::path::Path;

use crate::error::{Error, Result};
use crate::handle::{RawHandle, ResourceKind};
use crate::interop::callsite::{bound_site, CallSite, CallingConvention, CharSet};
use crate::resource::SafeResourceHandle;

/// The `open(2)` call site.
pub static OPEN_FILE: CallSite = CallSite {
    library: "libc",
    symbol: "open",
    convention: CallingConvention::C,
    char_set: CharSet::Ansi,
    sets_last_error: true,
    supported: cfg!(unix),
    layouts: &[],
};

/// The `read(2)` call site.
pub static READ_FILE: CallSite = CallSite {
    library: "libc",
    symbol: "read",
    convention: CallingConvention::C,
    char_set: CharSet::Ansi,
    sets_last_error: true,
    supported: cfg!(unix),
    layouts: &[],
};

/// The `write(2)` call site.
pub static WRITE_FILE: CallSite = CallSite {
    library: "libc",
    symbol: "write",
    convention: CallingConvention::C,
    char_set: CharSet::Ansi,
    sets_last_error: true,
    supported: cfg!(unix),
    layouts: &[],
};

/// An owned file descriptor with guaranteed-release semantics.
///
/// # Example
///
/// ```no_run
/// use oshandle::fd::SafeFileHandle;
///
/// fn main() -> oshandle::Result<()> {
///     let file = SafeFileHandle::create("/tmp/demo.txt")?;
///     file.write(b"hello")?;
///     file.close();
///     assert!(file.is_closed());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SafeFileHandle {
    inner: SafeResourceHandle,
}

impl SafeFileHandle {
    /// Open an existing file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, libc::O_RDONLY | libc::O_CLOEXEC, 0)
    }

    /// Create (or truncate) a file for writing.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(
            path,
            libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC | libc::O_CLOEXEC,
            0o644,
        )
    }

    fn open_with<P: AsRef<Path>>(path: P, flags: libc::c_int, mode: libc::c_int) -> Result<Self> {
        use std::os::unix::ffi::OsStrExt;

        let bound = bound_site!(OPEN_FILE)?;
        let path = CString::new(path.as_ref().as_os_str().as_bytes())
            .map_err(|_| Error::InvalidOperation("path contains an interior nul byte"))?;

        let fd = bound.invoke(|| {
            let fd = unsafe { libc::open(path.as_ptr(), flags, mode) };
            if fd >= 0 {
                Ok(fd)
            } else {
                Err(())
            }
        })?;

        Ok(SafeFileHandle {
            inner: SafeResourceHandle::acquire(
                RawHandle::new(fd as isize),
                true,
                ResourceKind::FileDescriptor,
            ),
        })
    }

    /// Wrap a descriptor obtained elsewhere.
    pub fn from_raw_fd(fd: libc::c_int, owns_handle: bool) -> Self {
        SafeFileHandle {
            inner: SafeResourceHandle::acquire(
                RawHandle::new(fd as isize),
                owns_handle,
                ResourceKind::FileDescriptor,
            ),
        }
    }

    /// Read into `buf`, returning the number of bytes read.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let bound = bound_site!(READ_FILE)?;
        let pinned = self.inner.pin()?;
        bound.invoke(|| {
            let n = unsafe {
                libc::read(
                    pinned.as_raw() as libc::c_int,
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                )
            };
            if n >= 0 {
                Ok(n as usize)
            } else {
                Err(())
            }
        })
    }

    /// Write `buf`, returning the number of bytes written.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let bound = bound_site!(WRITE_FILE)?;
        let pinned = self.inner.pin()?;
        bound.invoke(|| {
            let n = unsafe {
                libc::write(
                    pinned.as_raw() as libc::c_int,
                    buf.as_ptr().cast(),
                    buf.len(),
                )
            };
            if n >= 0 {
                Ok(n as usize)
            } else {
                Err(())
            }
        })
    }

    /// Close the descriptor. Idempotent; a failed close is logged and the
    /// handle still transitions to closed.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether the descriptor has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Whether the wrapper holds no usable descriptor.
    pub fn is_invalid(&self) -> bool {
        self.inner.is_invalid()
    }

    /// Relinquish ownership of the descriptor without closing it.
    pub fn into_raw(self) -> RawHandle {
        self.inner.into_raw()
    }

    /// The underlying resource handle.
    pub fn as_resource(&self) -> &SafeResourceHandle {
        &self.inner
    }
}
