//! Small generation-time utilities for code that synthesizes object
//! instances: addressable stack slots, constant C strings, and typed nulls.
//!
//! These isolate downstream codegen from target-specific quirks in how local
//! mutable storage and read-only string data are obtained. They have no
//! failure modes beyond exhausting LLVM itself.

use inkwell::builder::Builder;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, PointerValue};

use crate::context::GenCx;

/// Allocate an addressable slot for a value and return its address.
///
/// The alloca is placed in the function's entry block regardless of where
/// `builder` is currently positioned — entry-block allocas are what LLVM's
/// `mem2reg` pass can promote to SSA registers. The builder's position is
/// restored afterwards.
pub fn scoped_stack_value<'ll>(
    builder: &Builder<'ll>,
    function: FunctionValue<'ll>,
    ty: BasicTypeEnum<'ll>,
    name: &str,
) -> PointerValue<'ll> {
    let entry = function
        .get_first_basic_block()
        .expect("function has entry block");
    let saved = builder.get_insert_block();

    if let Some(first_instr) = entry.get_first_instruction() {
        builder.position_before(&first_instr);
    } else {
        builder.position_at_end(entry);
    }

    let slot = builder.build_alloca(ty, name).expect("alloca");

    if let Some(block) = saved {
        builder.position_at_end(block);
    }
    slot
}

/// Materialize a NUL-terminated byte sequence as addressable read-only
/// storage and return its address.
pub fn constant_string<'ll>(cx: &GenCx<'ll>, label: &str, bytes: &[u8]) -> PointerValue<'ll> {
    cx.define_cstring(label, bytes).as_pointer_value()
}

/// A zero value typed as a pointer — the "operation unsupported" slot value.
pub fn typed_null<'ll>(cx: &GenCx<'ll>) -> PointerValue<'ll> {
    cx.ptr_ty.const_null()
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;

    #[test]
    fn stack_slots_land_in_the_entry_block() {
        let context = Context::create();
        let cx = GenCx::new(&context, "test_primitives");

        let fn_ty = cx.type_void().fn_type(&[], false);
        let function = cx.llmod.add_function("f", fn_ty, None);
        let entry = cx.llcx.append_basic_block(function, "entry");
        let body = cx.llcx.append_basic_block(function, "body");

        let builder = cx.llcx.create_builder();
        builder.position_at_end(body);

        let slot = scoped_stack_value(&builder, function, cx.type_i64().into(), "local");

        // The alloca must be in entry, and the builder restored to body.
        let first = entry.get_first_instruction().expect("entry has the alloca");
        assert_eq!(slot.as_instruction(), Some(first));
        assert_eq!(builder.get_insert_block(), Some(body));
    }

    #[test]
    fn constant_strings_are_nul_terminated() {
        let context = Context::create();
        let cx = GenCx::new(&context, "test_primitives");

        let ptr = constant_string(&cx, "greeting", b"hello");
        assert!(!ptr.is_null());

        let ir = cx.llmod.print_to_string().to_string();
        assert!(ir.contains("c\"hello\\00\""));
    }

    #[test]
    fn typed_null_is_a_null_pointer() {
        let context = Context::create();
        let cx = GenCx::new(&context, "test_primitives");

        assert!(typed_null(&cx).is_null());
    }
}
