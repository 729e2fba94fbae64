//! Process memory counter queries.
//!
//! The counters block is the fixed ten-field structure the native query
//! fills: a 32-bit size tag, a 32-bit fault count, and eight
//! platform-word usage figures, in exactly this order.

use std::mem;

use crate::error::Result;
use crate::interop::callsite::{bound_site, CallSite, CallingConvention, CharSet};
use crate::interop::layout::{FieldDesc, StructLayout};
use crate::resource::SafeResourceHandle;

const W: usize = mem::size_of::<usize>();

/// Fixed-layout process memory counters.
///
/// Field order and widths match the native structure bit-for-bit; the
/// block crosses the boundary without transformation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessMemoryCounters {
    /// Size of this structure in bytes, set before the query.
    pub cb: u32,
    /// Page faults taken by the process.
    pub page_fault_count: u32,
    /// Peak working set size in bytes.
    pub peak_working_set_size: usize,
    /// Current working set size in bytes.
    pub working_set_size: usize,
    /// Peak paged pool quota usage in bytes.
    pub quota_peak_paged_pool_usage: usize,
    /// Current paged pool quota usage in bytes.
    pub quota_paged_pool_usage: usize,
    /// Peak non-paged pool quota usage in bytes.
    pub quota_peak_non_paged_pool_usage: usize,
    /// Current non-paged pool quota usage in bytes.
    pub quota_non_paged_pool_usage: usize,
    /// Committed (pagefile-backed) usage in bytes.
    pub pagefile_usage: usize,
    /// Peak committed usage in bytes.
    pub peak_pagefile_usage: usize,
}

impl ProcessMemoryCounters {
    /// A zeroed block with `cb` set for the query.
    pub fn prepared() -> Self {
        ProcessMemoryCounters {
            cb: mem::size_of::<ProcessMemoryCounters>() as u32,
            ..Default::default()
        }
    }
}

/// Declared layout of [`ProcessMemoryCounters`].
pub static PROCESS_MEMORY_COUNTERS_LAYOUT: StructLayout = StructLayout {
    name: "ProcessMemoryCounters",
    size: 8 + 8 * W,
    align: W,
    fields: &[
        FieldDesc { name: "cb", offset: 0, size: 4 },
        FieldDesc { name: "page_fault_count", offset: 4, size: 4 },
        FieldDesc { name: "peak_working_set_size", offset: 8, size: W },
        FieldDesc { name: "working_set_size", offset: 8 + W, size: W },
        FieldDesc { name: "quota_peak_paged_pool_usage", offset: 8 + 2 * W, size: W },
        FieldDesc { name: "quota_paged_pool_usage", offset: 8 + 3 * W, size: W },
        FieldDesc { name: "quota_peak_non_paged_pool_usage", offset: 8 + 4 * W, size: W },
        FieldDesc { name: "quota_non_paged_pool_usage", offset: 8 + 5 * W, size: W },
        FieldDesc { name: "pagefile_usage", offset: 8 + 6 * W, size: W },
        FieldDesc { name: "peak_pagefile_usage", offset: 8 + 7 * W, size: W },
    ],
};

/// The process-memory-info call site.
pub static PROCESS_MEMORY_INFO: CallSite = CallSite {
    library: if cfg!(windows) { "kernel32" } else { "libc" },
    symbol: if cfg!(windows) {
        "K32GetProcessMemoryInfo"
    } else {
        "getrusage"
    },
    convention: CallingConvention::System,
    char_set: CharSet::Ansi,
    sets_last_error: true,
    supported: cfg!(any(unix, windows)),
    layouts: &[&PROCESS_MEMORY_COUNTERS_LAYOUT],
};

#[cfg(windows)]
extern "system" {
    fn GetCurrentProcess() -> isize;
    fn K32GetProcessMemoryInfo(
        process: isize,
        counters: *mut ProcessMemoryCounters,
        cb: u32,
    ) -> i32;
}

/// Query memory counters for the calling process.
pub fn query_self() -> Result<ProcessMemoryCounters> {
    let bound = bound_site!(PROCESS_MEMORY_INFO)?;
    let mut counters = ProcessMemoryCounters::prepared();
    bound.invoke(|| fill_native(&mut counters))?;
    Ok(counters)
}

/// Query memory counters through a process reference.
///
/// The handle is pinned for the duration of the call; a closed handle is
/// rejected with [`Error::ObjectDisposed`](crate::Error::ObjectDisposed)
/// before any native call is made. On targets without per-process query
/// support the pinned reference is validated and the calling process's
/// counters are returned.
pub fn query_process(process: &SafeResourceHandle) -> Result<ProcessMemoryCounters> {
    let bound = bound_site!(PROCESS_MEMORY_INFO)?;
    let pinned = process.pin()?;
    let mut counters = ProcessMemoryCounters::prepared();
    #[cfg(windows)]
    {
        let raw = pinned.raw();
        bound.invoke(|| {
            let ok = unsafe {
                K32GetProcessMemoryInfo(raw.as_raw(), &mut counters, counters.cb)
            };
            if ok != 0 { Ok(()) } else { Err(()) }
        })?;
    }
    #[cfg(not(windows))]
    {
        let _ = &pinned;
        bound.invoke(|| fill_native(&mut counters))?;
    }
    Ok(counters)
}

#[cfg(windows)]
fn fill_native(counters: &mut ProcessMemoryCounters) -> std::result::Result<(), ()> {
    let ok = unsafe {
        K32GetProcessMemoryInfo(GetCurrentProcess(), counters, counters.cb)
    };
    if ok != 0 { Ok(()) } else { Err(()) }
}

#[cfg(unix)]
fn fill_native(counters: &mut ProcessMemoryCounters) -> std::result::Result<(), ()> {
    use std::mem::MaybeUninit;

    let mut usage = MaybeUninit::<libc::rusage>::uninit();
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return Err(());
    }
    // getrusage succeeded, the struct is fully written.
    let usage = unsafe { usage.assume_init() };

    counters.page_fault_count = (usage.ru_minflt + usage.ru_majflt).max(0) as u32;
    counters.peak_working_set_size = max_rss_bytes(usage.ru_maxrss);

    #[cfg(target_os = "linux")]
    fill_from_statm(counters);
    #[cfg(not(target_os = "linux"))]
    {
        counters.working_set_size = counters.peak_working_set_size;
    }

    Ok(())
}

// /proc/self/statm reports pages: size resident shared text lib data dt.
#[cfg(target_os = "linux")]
fn fill_from_statm(counters: &mut ProcessMemoryCounters) {
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page_size = if page_size > 0 { page_size as usize } else { 4096 };

    let statm = match std::fs::read_to_string("/proc/self/statm") {
        Ok(contents) => contents,
        Err(_) => return,
    };
    let mut fields = statm.split_whitespace().map(|f| f.parse::<usize>().ok());
    let vm_size = fields.next().flatten().unwrap_or(0);
    let resident = fields.next().flatten().unwrap_or(0);

    counters.working_set_size = resident * page_size;
    counters.pagefile_usage = vm_size * page_size;
    counters.peak_pagefile_usage = counters.pagefile_usage;
}

// ru_maxrss is kilobytes on Linux, bytes on macOS.
#[cfg(unix)]
fn max_rss_bytes(maxrss: libc::c_long) -> usize {
    let maxrss = maxrss.max(0) as usize;
    if cfg!(target_os = "macos") {
        maxrss
    } else {
        maxrss * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_struct() {
        assert_eq!(
            mem::size_of::<ProcessMemoryCounters>(),
            PROCESS_MEMORY_COUNTERS_LAYOUT.size
        );
        assert_eq!(
            mem::align_of::<ProcessMemoryCounters>(),
            PROCESS_MEMORY_COUNTERS_LAYOUT.align
        );
        assert_eq!(
            mem::offset_of!(ProcessMemoryCounters, page_fault_count),
            4
        );
        assert_eq!(
            mem::offset_of!(ProcessMemoryCounters, peak_pagefile_usage),
            8 + 7 * W
        );
        PROCESS_MEMORY_COUNTERS_LAYOUT
            .validate()
            .expect("layout should validate");
    }

    #[test]
    fn test_query_self_populates_counters() {
        let counters = query_self().expect("query should succeed");
        assert_eq!(counters.cb as usize, mem::size_of::<ProcessMemoryCounters>());
        assert!(counters.peak_working_set_size > 0);
    }
}
