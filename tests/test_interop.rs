//! Interop boundary tests: layouts, call sites, and the concrete services.

use std::mem;
use std::thread;

use oshandle::interop::activity::ACTIVITY_ID_LAYOUT;
use oshandle::interop::memory::PROCESS_MEMORY_COUNTERS_LAYOUT;
use oshandle::release::{simulated_allocate, SimulatedEntry};
use oshandle::{
    activity_id_control, fill_secure_random, query_process, query_self, ActivityControl,
    ActivityId, CallSite, CallingConvention, CharSet, FieldDesc, ProcessMemoryCounters,
    ResourceKind, SafeResourceHandle, StructLayout,
};

#[test]
fn test_init_binds_builtin_sites() {
    oshandle::init().expect("init should succeed");
}

#[test]
fn test_builtin_layouts_validate() {
    ACTIVITY_ID_LAYOUT.validate().expect("activity id layout");
    PROCESS_MEMORY_COUNTERS_LAYOUT
        .validate()
        .expect("memory counters layout");
}

// Writes one deterministic value per schema field, the way the native side
// of the call would fill the structure.
unsafe fn native_stub_fill(layout: &StructLayout, base: *mut u8) {
    for (i, field) in layout.fields.iter().enumerate() {
        let value = 0x10 + i as u64;
        let dst = base.add(field.offset);
        match field.size {
            4 => (dst as *mut u32).write_unaligned(value as u32),
            8 => (dst as *mut u64).write_unaligned(value),
            _ => panic!("unexpected field size {}", field.size),
        }
    }
}

#[test]
fn test_memory_counters_byte_layout_round_trip() {
    let mut counters = ProcessMemoryCounters::default();
    unsafe {
        native_stub_fill(
            &PROCESS_MEMORY_COUNTERS_LAYOUT,
            &mut counters as *mut ProcessMemoryCounters as *mut u8,
        );
    }

    // Every field landed where the schema says it is.
    assert_eq!(counters.cb, 0x10);
    assert_eq!(counters.page_fault_count, 0x11);
    assert_eq!(counters.peak_working_set_size, 0x12);
    assert_eq!(counters.working_set_size, 0x13);
    assert_eq!(counters.quota_peak_paged_pool_usage, 0x14);
    assert_eq!(counters.quota_paged_pool_usage, 0x15);
    assert_eq!(counters.quota_peak_non_paged_pool_usage, 0x16);
    assert_eq!(counters.quota_non_paged_pool_usage, 0x17);
    assert_eq!(counters.pagefile_usage, 0x18);
    assert_eq!(counters.peak_pagefile_usage, 0x19);

    assert_eq!(
        mem::size_of::<ProcessMemoryCounters>(),
        PROCESS_MEMORY_COUNTERS_LAYOUT.size,
        "struct and schema must agree on total size"
    );
}

#[test]
fn test_query_self_returns_live_counters() {
    let counters = query_self().expect("self query should succeed");
    assert_eq!(
        counters.cb as usize,
        mem::size_of::<ProcessMemoryCounters>()
    );
    assert!(counters.peak_working_set_size > 0, "peak RSS must be nonzero");
}

#[test]
fn test_query_through_disposed_handle_makes_no_call() {
    let raw = simulated_allocate(SimulatedEntry::new("process"));
    let process = SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated);
    process.close();

    let err = query_process(&process).unwrap_err();
    assert!(
        err.is_disposed(),
        "a closed handle must be rejected before the native call"
    );
}

#[test]
fn test_query_through_live_handle() {
    let raw = simulated_allocate(SimulatedEntry::new("process"));
    let process = SafeResourceHandle::acquire(raw, true, ResourceKind::Simulated);

    let counters = query_process(&process).expect("live handle query succeeds");
    assert!(counters.peak_working_set_size > 0);
    process.close();
}

#[test]
fn test_unsupported_site_fails_at_bind() {
    static MISSING: CallSite = CallSite {
        library: "nonexistent",
        symbol: "missing_symbol",
        convention: CallingConvention::C,
        char_set: CharSet::Ansi,
        sets_last_error: false,
        supported: false,
        layouts: &[],
    };
    let err = MISSING.bind().unwrap_err();
    let err: oshandle::Error = err.into();
    assert!(err.is_platform_not_supported());
}

#[test]
fn test_non_blittable_layout_fails_at_bind() {
    static HOLEY: StructLayout = StructLayout {
        name: "Holey",
        size: 16,
        align: 8,
        fields: &[
            FieldDesc {
                name: "head",
                offset: 0,
                size: 4,
            },
            FieldDesc {
                name: "tail",
                offset: 8,
                size: 8,
            },
        ],
    };
    static CORRUPTING: CallSite = CallSite {
        library: "libtest",
        symbol: "corrupting_symbol",
        convention: CallingConvention::C,
        char_set: CharSet::Ansi,
        sets_last_error: false,
        supported: true,
        layouts: &[&HOLEY],
    };
    let err = CORRUPTING.bind().unwrap_err();
    let err: oshandle::Error = err.into();
    assert!(
        matches!(err, oshandle::Error::InvalidLayout { layout: "Holey", .. }),
        "an undeclared gap must be rejected before any call"
    );
}

#[test]
fn test_activity_id_get_set_swaps() {
    // Start from a known slot value; the harness may reuse this thread.
    let mut id = ActivityId::ZERO;
    activity_id_control(ActivityControl::SetId, &mut id).unwrap();

    let mut first = ActivityId { bytes: [1; 16] };
    activity_id_control(ActivityControl::SetId, &mut first).unwrap();

    let mut second = ActivityId { bytes: [2; 16] };
    activity_id_control(ActivityControl::GetSetId, &mut second).unwrap();
    assert_eq!(
        second.bytes, [1; 16],
        "GetSetId must hand back the previous id"
    );

    let mut current = ActivityId::ZERO;
    activity_id_control(ActivityControl::GetId, &mut current).unwrap();
    assert_eq!(current.bytes, [2; 16], "GetSetId must install the new id");
}

#[test]
fn test_activity_id_create_set_returns_previous() {
    let mut installed = ActivityId { bytes: [7; 16] };
    activity_id_control(ActivityControl::SetId, &mut installed).unwrap();

    let mut out = ActivityId::ZERO;
    activity_id_control(ActivityControl::CreateSetId, &mut out).unwrap();
    assert_eq!(
        out.bytes, [7; 16],
        "CreateSetId must return the id it replaced"
    );

    let mut current = ActivityId::ZERO;
    activity_id_control(ActivityControl::GetId, &mut current).unwrap();
    assert!(!current.is_zero(), "a fresh id must be installed");
    assert_ne!(current.bytes, [7; 16]);
}

#[test]
fn test_activity_id_is_per_thread() {
    let mut id = ActivityId { bytes: [9; 16] };
    activity_id_control(ActivityControl::SetId, &mut id).unwrap();

    let other = thread::spawn(|| {
        let mut id = ActivityId::ZERO;
        activity_id_control(ActivityControl::GetId, &mut id).unwrap();
        id
    })
    .join()
    .expect("thread must not panic");

    assert!(other.is_zero(), "activity ids must not leak across threads");
}

#[test]
fn test_create_id_leaves_thread_slot_alone() {
    let mut installed = ActivityId { bytes: [3; 16] };
    activity_id_control(ActivityControl::SetId, &mut installed).unwrap();

    let mut fresh = ActivityId::ZERO;
    activity_id_control(ActivityControl::CreateId, &mut fresh).unwrap();
    assert!(!fresh.is_zero());

    let mut current = ActivityId::ZERO;
    activity_id_control(ActivityControl::GetId, &mut current).unwrap();
    assert_eq!(current.bytes, [3; 16], "CreateId must not touch the slot");
}

#[test]
fn test_secure_random_fills_whole_buffer() {
    let mut buf = [0u8; 256];
    fill_secure_random(&mut buf).expect("fill should succeed");
    let zeros = buf.iter().filter(|&&b| b == 0).count();
    assert!(
        zeros < 32,
        "a 256-byte secure fill should not be mostly zeros ({zeros} zero bytes)"
    );
}
