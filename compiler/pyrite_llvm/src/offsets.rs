//! Field offset and size computation for generated aggregates.
//!
//! Offsets are derived with the null-base technique: indexing into an
//! aggregate at address null is a pure pointer computation, and the result
//! reinterpreted as an integer is the field's byte offset under the target's
//! layout rules. The constant expression this produces
//! (`ptrtoint (getelementptr T, ptr null, 0, i)`) is legal in global
//! initializers, so reflective member tables embed it directly.
//!
//! Because the offset is computed from the same schema that defined the
//! struct body, there is no second offset table to drift when a field list
//! changes. The computed values are still only as correct as the module's
//! data layout — [`byte_offset`] is the numeric cross-check path, resolved
//! through `TargetData`, that `validate` uses to compare against the
//! foreign specification's published offsets.

use inkwell::targets::TargetData;
use inkwell::values::IntValue;

use crate::context::GenCx;
use crate::error::LayoutError;

/// Byte offset of field `index` in `type_name`, as an IR constant.
///
/// # Errors
///
/// [`LayoutError::IndexOutOfRange`] past the declared arity, plus the
/// registry's resolution errors for unknown or body-less types.
pub fn offset_of<'ll>(
    cx: &GenCx<'ll>,
    type_name: &str,
    index: u32,
) -> Result<IntValue<'ll>, LayoutError> {
    let handle = cx.resolve_type(type_name)?;
    let arity = cx.type_schema(type_name)?.arity();
    if index >= arity {
        return Err(LayoutError::IndexOutOfRange {
            owner: type_name.to_string(),
            index,
            arity,
        });
    }

    let i32_ty = cx.type_i32();
    let indices = [
        i32_ty.const_int(0, false),
        i32_ty.const_int(u64::from(index), false),
    ];
    let null = cx.ptr_ty.const_null();
    // SAFETY: index is checked against the schema arity above, and the
    // struct body is known to be defined.
    let gep = unsafe { null.const_gep(handle.struct_ty(), &indices) };
    Ok(gep.const_to_int(cx.ssize_ty))
}

/// Byte offset of a named field, as an IR constant.
pub fn offset_of_field<'ll>(
    cx: &GenCx<'ll>,
    type_name: &str,
    field: &str,
) -> Result<IntValue<'ll>, LayoutError> {
    let index = cx.field_index(type_name, field)?;
    offset_of(cx, type_name, index)
}

/// Size of an aggregate in bytes, as an IR constant.
///
/// Null-base form of `sizeof`: the address one whole element past null.
pub fn size_of<'ll>(cx: &GenCx<'ll>, type_name: &str) -> Result<IntValue<'ll>, LayoutError> {
    let handle = cx.resolve_type(type_name)?;
    // Reject body-less types; a sizeof over an opaque struct is meaningless.
    cx.type_schema(type_name)?;

    let one = [cx.type_i32().const_int(1, false)];
    let null = cx.ptr_ty.const_null();
    // SAFETY: a single [1] index over a complete aggregate is always valid.
    let gep = unsafe { null.const_gep(handle.struct_ty(), &one) };
    Ok(gep.const_to_int(cx.ssize_ty))
}

/// Numeric byte offset of field `index`, resolved through the target's
/// data layout.
pub fn byte_offset(
    cx: &GenCx<'_>,
    td: &TargetData,
    type_name: &str,
    index: u32,
) -> Result<u64, LayoutError> {
    let handle = cx.resolve_type(type_name)?;
    let arity = cx.type_schema(type_name)?.arity();
    if index >= arity {
        return Err(LayoutError::IndexOutOfRange {
            owner: type_name.to_string(),
            index,
            arity,
        });
    }
    td.offset_of_element(&handle.struct_ty(), index)
        .ok_or_else(|| LayoutError::IndexOutOfRange {
            owner: type_name.to_string(),
            index,
            arity,
        })
}

/// Numeric byte offset of a named field, resolved through the target's
/// data layout.
pub fn byte_offset_of_field(
    cx: &GenCx<'_>,
    td: &TargetData,
    type_name: &str,
    field: &str,
) -> Result<u64, LayoutError> {
    let index = cx.field_index(type_name, field)?;
    byte_offset(cx, td, type_name, index)
}

/// Allocated size of an aggregate in bytes under the target's data layout.
pub fn store_size(cx: &GenCx<'_>, td: &TargetData, type_name: &str) -> Result<u64, LayoutError> {
    let handle = cx.resolve_type(type_name)?;
    cx.type_schema(type_name)?;
    Ok(td.get_store_size(&handle.struct_ty()))
}

/// ABI alignment of an aggregate under the target's data layout.
pub fn abi_alignment(
    cx: &GenCx<'_>,
    td: &TargetData,
    type_name: &str,
) -> Result<u32, LayoutError> {
    let handle = cx.resolve_type(type_name)?;
    cx.type_schema(type_name)?;
    Ok(td.get_abi_alignment(&handle.struct_ty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldDef;
    use crate::target::TargetConfig;
    use inkwell::context::Context;

    fn header_cx(context: &Context) -> GenCx<'_> {
        let cx = GenCx::new(context, "test_offsets");
        let handle = cx.declare_type("Header");
        cx.define_type(
            handle,
            vec![
                FieldDef::new("ob_refcnt", cx.ssize_ty.into()),
                FieldDef::new("ob_type", cx.type_ptr().into()),
            ],
        )
        .unwrap();
        cx
    }

    #[test]
    fn offset_is_a_constant_expression() {
        let context = Context::create();
        let cx = header_cx(&context);

        let off = offset_of(&cx, "Header", 1).unwrap();
        assert!(off.is_const());

        let size = size_of(&cx, "Header").unwrap();
        assert!(size.is_const());
    }

    #[test]
    fn index_past_arity_is_rejected() {
        let context = Context::create();
        let cx = header_cx(&context);

        let err = offset_of(&cx, "Header", 2).unwrap_err();
        assert_eq!(
            err,
            LayoutError::IndexOutOfRange {
                owner: "Header".to_string(),
                index: 2,
                arity: 2,
            }
        );
    }

    #[test]
    fn body_less_type_is_rejected() {
        let context = Context::create();
        let cx = GenCx::new(&context, "test_offsets");
        cx.declare_type("Opaque");

        let err = offset_of(&cx, "Opaque", 0).unwrap_err();
        assert_eq!(
            err,
            LayoutError::UndefinedBody {
                name: "Opaque".to_string()
            }
        );
    }

    #[test]
    fn numeric_offsets_match_the_reference_header_layout() {
        let context = Context::create();
        let cx = header_cx(&context);
        let machine = TargetConfig::native()
            .unwrap()
            .create_target_machine()
            .unwrap();
        let td = machine.get_target_data();
        if td.get_pointer_byte_size(None) != 8 {
            return; // reference layout is LP64-only
        }

        assert_eq!(byte_offset(&cx, &td, "Header", 0).unwrap(), 0);
        assert_eq!(byte_offset(&cx, &td, "Header", 1).unwrap(), 8);
        assert_eq!(
            byte_offset_of_field(&cx, &td, "Header", "ob_type").unwrap(),
            8
        );
        assert_eq!(store_size(&cx, &td, "Header").unwrap(), 16);
        assert_eq!(abi_alignment(&cx, &td, "Header").unwrap(), 8);
    }
}
