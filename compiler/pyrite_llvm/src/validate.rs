//! Layout validation against the foreign specification.
//!
//! The offset engine derives everything from the module's data layout, and
//! that layout is an assumption: if the target's rules ever diverge from
//! what the foreign specification expects (packing, alignment, a field
//! width typo in the inventory), every computed offset would be silently
//! wrong. This module pins the generated aggregates to a manually-specified
//! LP64 reference table — sizes, alignments, and every field offset — and
//! fails generation on the first disagreement.

use std::fmt;

use inkwell::targets::TargetData;

use crate::context::GenCx;
use crate::error::LayoutError;
use crate::object_model::names;
use crate::offsets;

/// Error type for layout verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateError {
    /// A generated aggregate's allocated size differs from the reference.
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },
    /// A generated aggregate's ABI alignment differs from the reference.
    AlignMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
    /// A field landed at a different byte offset than the reference.
    OffsetMismatch {
        name: String,
        field: String,
        expected: u64,
        actual: u64,
    },
    /// The aggregate could not be resolved at all.
    Layout(LayoutError),
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "size of '{name}' is {actual} bytes, foreign ABI requires {expected}"
            ),
            Self::AlignMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "alignment of '{name}' is {actual}, foreign ABI requires {expected}"
            ),
            Self::OffsetMismatch {
                name,
                field,
                expected,
                actual,
            } => write!(
                f,
                "field '{field}' of '{name}' is at offset {actual}, \
                 foreign ABI requires {expected}"
            ),
            Self::Layout(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ValidateError {}

impl From<LayoutError> for ValidateError {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}

/// Reference layout of one aggregate on an LP64 target.
pub struct ReferenceStruct {
    pub name: &'static str,
    pub size: u64,
    pub align: u32,
    pub offsets: &'static [(&'static str, u64)],
}

/// The foreign specification's published LP64 layout.
///
/// Every value here is independent of the generator: pointer and
/// pointer-sized-integer fields are 8 bytes, `i8` fields pack, the lone
/// `i32` field (`tp_flags`) pads to the next 8-byte boundary before a
/// pointer field.
pub const REFERENCE_LAYOUT: &[ReferenceStruct] = &[
    ReferenceStruct {
        name: names::OBJECT,
        size: 16,
        align: 8,
        offsets: &[("ob_refcnt", 0), ("ob_type", 8)],
    },
    ReferenceStruct {
        name: names::VAR_OBJECT,
        size: 24,
        align: 8,
        offsets: &[("ob_base", 0), ("ob_size", 16)],
    },
    ReferenceStruct {
        name: names::BUFFER,
        size: 80,
        align: 8,
        offsets: &[
            ("buf", 0),
            ("obj", 8),
            ("len", 16),
            ("itemsize", 24),
            ("readonly", 32),
            ("ndim", 33),
            ("format", 40),
            ("shape", 48),
            ("strides", 56),
            ("suboffsets", 64),
            ("internal", 72),
        ],
    },
    ReferenceStruct {
        name: names::ASYNC_METHODS,
        size: 32,
        align: 8,
        offsets: &[
            ("am_await", 0),
            ("am_aiter", 8),
            ("am_anext", 16),
            ("am_send", 24),
        ],
    },
    ReferenceStruct {
        name: names::NUMBER_METHODS,
        size: 288,
        align: 8,
        offsets: &[
            ("nb_add", 0),
            ("nb_subtract", 8),
            ("nb_multiply", 16),
            ("nb_remainder", 24),
            ("nb_divmod", 32),
            ("nb_power", 40),
            ("nb_negative", 48),
            ("nb_positive", 56),
            ("nb_absolute", 64),
            ("nb_bool", 72),
            ("nb_invert", 80),
            ("nb_lshift", 88),
            ("nb_rshift", 96),
            ("nb_and", 104),
            ("nb_xor", 112),
            ("nb_or", 120),
            ("nb_int", 128),
            ("nb_reserved", 136),
            ("nb_float", 144),
            ("nb_inplace_add", 152),
            ("nb_inplace_subtract", 160),
            ("nb_inplace_multiply", 168),
            ("nb_inplace_remainder", 176),
            ("nb_inplace_power", 184),
            ("nb_inplace_lshift", 192),
            ("nb_inplace_rshift", 200),
            ("nb_inplace_and", 208),
            ("nb_inplace_xor", 216),
            ("nb_inplace_or", 224),
            ("nb_floor_divide", 232),
            ("nb_true_divide", 240),
            ("nb_inplace_floor_divide", 248),
            ("nb_inplace_true_divide", 256),
            ("nb_index", 264),
            ("nb_matrix_multiply", 272),
            ("nb_inplace_matrix_multiply", 280),
        ],
    },
    ReferenceStruct {
        name: names::SEQUENCE_METHODS,
        size: 80,
        align: 8,
        offsets: &[
            ("sq_length", 0),
            ("sq_concat", 8),
            ("sq_repeat", 16),
            ("sq_item", 24),
            ("was_sq_slice", 32),
            ("sq_ass_item", 40),
            ("was_sq_ass_slice", 48),
            ("sq_contains", 56),
            ("sq_inplace_concat", 64),
            ("sq_inplace_repeat", 72),
        ],
    },
    ReferenceStruct {
        name: names::MAPPING_METHODS,
        size: 24,
        align: 8,
        offsets: &[
            ("mp_length", 0),
            ("mp_subscript", 8),
            ("mp_ass_subscript", 16),
        ],
    },
    ReferenceStruct {
        name: names::BUFFER_PROCS,
        size: 16,
        align: 8,
        offsets: &[("bf_getbuffer", 0), ("bf_releasebuffer", 8)],
    },
    ReferenceStruct {
        name: names::METHOD_DEF,
        size: 32,
        align: 8,
        offsets: &[
            ("ml_name", 0),
            ("ml_meth", 8),
            ("ml_flags", 16),
            ("ml_doc", 24),
        ],
    },
    ReferenceStruct {
        name: names::MEMBER_DEF,
        size: 40,
        align: 8,
        offsets: &[
            ("name", 0),
            ("type", 8),
            ("offset", 16),
            ("flags", 24),
            ("doc", 32),
        ],
    },
    ReferenceStruct {
        name: names::GETSET_DEF,
        size: 40,
        align: 8,
        offsets: &[
            ("name", 0),
            ("get", 8),
            ("set", 16),
            ("doc", 24),
            ("closure", 32),
        ],
    },
    ReferenceStruct {
        name: names::TYPE_OBJECT,
        size: 408,
        align: 8,
        offsets: &[
            ("ob_base", 0),
            ("tp_name", 24),
            ("tp_basicsize", 32),
            ("tp_itemsize", 40),
            ("tp_dealloc", 48),
            ("tp_vectorcall_offset", 56),
            ("tp_getattr", 64),
            ("tp_setattr", 72),
            ("tp_as_async", 80),
            ("tp_repr", 88),
            ("tp_as_number", 96),
            ("tp_as_sequence", 104),
            ("tp_as_mapping", 112),
            ("tp_hash", 120),
            ("tp_call", 128),
            ("tp_str", 136),
            ("tp_getattro", 144),
            ("tp_setattro", 152),
            ("tp_as_buffer", 160),
            ("tp_flags", 168),
            ("tp_doc", 176),
            ("tp_traverse", 184),
            ("tp_clear", 192),
            ("tp_richcompare", 200),
            ("tp_weaklistoffset", 208),
            ("tp_iter", 216),
            ("tp_iternext", 224),
            ("tp_methods", 232),
            ("tp_members", 240),
            ("tp_getset", 248),
            ("tp_base", 256),
            ("tp_dict", 264),
            ("tp_descr_get", 272),
            ("tp_descr_set", 280),
            ("tp_dictoffset", 288),
            ("tp_init", 296),
            ("tp_alloc", 304),
            ("tp_new", 312),
            ("tp_free", 320),
            ("tp_is_gc", 328),
            ("tp_bases", 336),
            ("tp_mro", 344),
            ("tp_cache", 352),
            ("tp_subclasses", 360),
            ("tp_weaklist", 368),
            ("tp_del", 376),
            ("tp_version_tag", 384),
            ("tp_finalize", 392),
            ("tp_vectorcall", 400),
        ],
    },
];

/// Verify every generated aggregate against the reference layout.
///
/// # Errors
///
/// The first size, alignment, or offset disagreement, naming the structure
/// and field.
pub fn verify_layout(cx: &GenCx<'_>, td: &TargetData) -> Result<(), ValidateError> {
    for reference in REFERENCE_LAYOUT {
        let actual_size = offsets::store_size(cx, td, reference.name)?;
        if actual_size != reference.size {
            return Err(ValidateError::SizeMismatch {
                name: reference.name.to_string(),
                expected: reference.size,
                actual: actual_size,
            });
        }

        let actual_align = offsets::abi_alignment(cx, td, reference.name)?;
        if actual_align != reference.align {
            return Err(ValidateError::AlignMismatch {
                name: reference.name.to_string(),
                expected: reference.align,
                actual: actual_align,
            });
        }

        for &(field, expected) in reference.offsets {
            let actual = offsets::byte_offset_of_field(cx, td, reference.name, field)?;
            if actual != expected {
                return Err(ValidateError::OffsetMismatch {
                    name: reference.name.to_string(),
                    field: field.to_string(),
                    expected,
                    actual,
                });
            }
        }
        tracing::trace!(name = reference.name, "layout verified");
    }
    Ok(())
}
