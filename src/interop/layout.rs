//! Explicit byte layouts for structs crossing the native boundary.
//!
//! A layout spells out every field's offset and size; nothing about padding
//! is left implicit. Validation enforces blittability: a conforming struct
//! has a byte-identical representation on both sides of the boundary and
//! needs no transformation when marshaled.

use crate::error::Result;
use crate::interop::BindError;

/// One field of a cross-boundary struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDesc {
    /// Field name. Names starting with `_pad` declare explicit padding.
    pub name: &'static str,
    /// Byte offset from the start of the struct.
    pub offset: usize,
    /// Field size in bytes.
    pub size: usize,
}

/// Byte-for-byte description of a struct passed across the boundary.
///
/// Field order is significant and must match the native declaration
/// exactly. Layouts are created in `const` position and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructLayout {
    /// Struct name, used in diagnostics.
    pub name: &'static str,
    /// Total size in bytes, including any declared padding.
    pub size: usize,
    /// Required alignment in bytes.
    pub align: usize,
    /// Fields in declaration order.
    pub fields: &'static [FieldDesc],
}

// Fixed-size scalar widths a blittable field may have. 16 covers the
// 128-bit identifier block.
const SCALAR_SIZES: [usize; 5] = [1, 2, 4, 8, 16];

impl StructLayout {
    /// Validate this layout for blittability.
    ///
    /// Checks: non-zero power-of-two alignment, size a multiple of
    /// alignment, fields contiguous in ascending offset order with no
    /// overlap and no undeclared gaps, every field a fixed-size scalar.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(Into::into)
    }

    pub(crate) fn check(&self) -> std::result::Result<(), BindError> {
        let fail = |field: &'static str, reason: &'static str| BindError::InvalidLayout {
            layout: self.name,
            field,
            reason,
        };

        if self.align == 0 || !self.align.is_power_of_two() {
            return Err(fail("*", "alignment must be a non-zero power of two"));
        }
        if self.size == 0 {
            return Err(fail("*", "size must be non-zero"));
        }
        if self.size % self.align != 0 {
            return Err(fail("*", "size must be a multiple of alignment"));
        }
        if self.fields.is_empty() {
            return Err(fail("*", "layout must declare at least one field"));
        }

        let mut cursor = 0usize;
        for field in self.fields {
            if !SCALAR_SIZES.contains(&field.size) && !field.name.starts_with("_pad") {
                return Err(fail(field.name, "field is not a fixed-size scalar"));
            }
            if field.offset < cursor {
                return Err(fail(field.name, "field overlaps the previous field"));
            }
            if field.offset > cursor {
                return Err(fail(field.name, "undeclared padding before field"));
            }
            cursor = match field.offset.checked_add(field.size) {
                Some(end) if end <= self.size => end,
                _ => return Err(fail(field.name, "field extends past the struct end")),
            };
        }
        if cursor != self.size {
            return Err(fail("*", "undeclared trailing padding"));
        }
        Ok(())
    }
}
