//! Per-thread activity identifier control.
//!
//! Mirrors the event-pipe activity-id service: every thread carries a
//! 128-bit activity id, manipulated through a single control call taking a
//! control code and an in/out identifier.

use std::cell::Cell;

use crate::error::Result;
use crate::interop::callsite::{bound_site, CallSite, CallingConvention, CharSet};
use crate::interop::layout::{FieldDesc, StructLayout};
use crate::interop::random::fill_secure_random;

/// A 128-bit activity identifier, blittable across the boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivityId {
    /// The identifier bytes.
    pub bytes: [u8; 16],
}

impl ActivityId {
    /// The all-zero (unset) identifier.
    pub const ZERO: ActivityId = ActivityId { bytes: [0; 16] };

    /// Whether this is the unset identifier.
    pub fn is_zero(&self) -> bool {
        self.bytes == [0; 16]
    }

    /// Create a fresh random identifier with version-4 layout.
    pub fn create() -> Result<ActivityId> {
        let mut id = ActivityId::ZERO;
        fill_secure_random(&mut id.bytes)?;
        id.bytes[7] = (id.bytes[7] & 0x0f) | 0x40;
        id.bytes[8] = (id.bytes[8] & 0x3f) | 0x80;
        Ok(id)
    }
}

/// Declared layout of [`ActivityId`].
pub static ACTIVITY_ID_LAYOUT: StructLayout = StructLayout {
    name: "ActivityId",
    size: 16,
    align: 1,
    fields: &[FieldDesc {
        name: "bytes",
        offset: 0,
        size: 16,
    }],
};

/// Control codes for [`activity_id_control`]. Values match the platform
/// event-tracing control codes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityControl {
    /// Copy the current thread's id into the argument.
    GetId = 1,
    /// Set the current thread's id from the argument.
    SetId = 2,
    /// Fill the argument with a fresh id; the thread slot is untouched.
    CreateId = 3,
    /// Swap: the argument becomes the thread's id, the previous id comes
    /// back in the argument.
    GetSetId = 4,
    /// Return the previous id in the argument and install a freshly
    /// created one.
    CreateSetId = 5,
}

/// The activity-id control call site.
pub static ACTIVITY_ID_CONTROL: CallSite = CallSite {
    library: "self",
    symbol: "activity_id_control",
    convention: CallingConvention::C,
    char_set: CharSet::Ansi,
    sets_last_error: false,
    supported: true,
    layouts: &[&ACTIVITY_ID_LAYOUT],
};

thread_local! {
    static CURRENT: Cell<ActivityId> = const { Cell::new(ActivityId::ZERO) };
}

/// Manipulate the calling thread's activity id.
///
/// `id` is in/out: depending on `code` it supplies the new identifier,
/// receives the current one, or both.
pub fn activity_id_control(code: ActivityControl, id: &mut ActivityId) -> Result<()> {
    let _bound = bound_site!(ACTIVITY_ID_CONTROL)?;
    match code {
        ActivityControl::GetId => {
            *id = CURRENT.with(Cell::get);
        }
        ActivityControl::SetId => {
            CURRENT.with(|current| current.set(*id));
        }
        ActivityControl::CreateId => {
            *id = ActivityId::create()?;
        }
        ActivityControl::GetSetId => {
            let previous = CURRENT.with(|current| current.replace(*id));
            *id = previous;
        }
        ActivityControl::CreateSetId => {
            let fresh = ActivityId::create()?;
            *id = CURRENT.with(|current| current.replace(fresh));
        }
    }
    Ok(())
}
