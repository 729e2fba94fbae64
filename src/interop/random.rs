//! Secure random byte fill.
//!
//! Takes a buffer pointer and length, no return value beyond success. The
//! buffer is either fully filled or the call fails; there is no silent
//! partial fill.

use crate::error::Result;
use crate::interop::callsite::{bound_site, CallSite, CallingConvention, CharSet};

/// The secure-random fill call site.
pub static SECURE_RANDOM_FILL: CallSite = CallSite {
    library: if cfg!(windows) {
        "advapi32"
    } else if cfg!(target_os = "macos") {
        "libSystem"
    } else {
        "libc"
    },
    symbol: if cfg!(windows) {
        "SystemFunction036"
    } else if cfg!(target_os = "macos") {
        "getentropy"
    } else {
        "getrandom"
    },
    convention: CallingConvention::System,
    char_set: CharSet::Ansi,
    sets_last_error: true,
    supported: cfg!(any(unix, windows)),
    layouts: &[],
};

#[cfg(windows)]
extern "system" {
    // RtlGenRandom.
    fn SystemFunction036(buffer: *mut u8, length: u32) -> u8;
}

/// Fill `buf` with cryptographically secure random bytes.
pub fn fill_secure_random(buf: &mut [u8]) -> Result<()> {
    let bound = bound_site!(SECURE_RANDOM_FILL)?;
    if buf.is_empty() {
        return Ok(());
    }
    bound.invoke(|| fill_native(buf))
}

#[cfg(windows)]
fn fill_native(buf: &mut [u8]) -> std::result::Result<(), ()> {
    for chunk in buf.chunks_mut(u32::MAX as usize) {
        let ok = unsafe { SystemFunction036(chunk.as_mut_ptr(), chunk.len() as u32) };
        if ok == 0 {
            return Err(());
        }
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn fill_native(buf: &mut [u8]) -> std::result::Result<(), ()> {
    // getentropy caps each request at 256 bytes.
    for chunk in buf.chunks_mut(256) {
        let rc = unsafe { libc::getentropy(chunk.as_mut_ptr().cast(), chunk.len()) };
        if rc != 0 {
            return Err(());
        }
    }
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn fill_native(buf: &mut [u8]) -> std::result::Result<(), ()> {
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = &mut buf[filled..];
        let n = unsafe {
            libc::getrandom(remaining.as_mut_ptr().cast(), remaining.len(), 0)
        };
        if n < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error();
            match errno {
                Some(libc::EINTR) => continue,
                // Pre-getrandom kernels: fall back to the device node.
                Some(libc::ENOSYS) => return fill_from_urandom(remaining),
                _ => return Err(()),
            }
        }
        filled += n as usize;
    }
    Ok(())
}

// Unixes without a getrandom wrapper in scope read the device directly.
#[cfg(all(
    unix,
    not(any(target_os = "linux", target_os = "android", target_os = "macos"))
))]
fn fill_native(buf: &mut [u8]) -> std::result::Result<(), ()> {
    fill_from_urandom(buf)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn fill_from_urandom(buf: &mut [u8]) -> std::result::Result<(), ()> {
    use std::io::Read;

    let mut device = std::fs::File::open("/dev/urandom").map_err(|_| ())?;
    device.read_exact(buf).map_err(|_| ())
}
