//! End-to-end generation of the object-model module.
//!
//! Drives the whole pass — signature catalog, aggregate definition,
//! foundation descriptors, verification — and checks the properties the
//! foreign ABI depends on: reference offsets, the self-reference fixpoint,
//! and byte-identical regeneration.

use inkwell::context::Context;
use pretty_assertions::assert_eq;

use pyrite_llvm::object_model::names;
use pyrite_llvm::{
    descriptors, offsets, GenCx, ObjectModel, SlotSignatures, TargetConfig, TypeDescriptorSpec,
    TypePointer,
};

fn generate(context: &Context, module_name: &str) -> GenCx<'_> {
    let cx = GenCx::new(context, module_name);
    TargetConfig::native()
        .unwrap()
        .configure_module(&cx.llmod)
        .unwrap();

    let sigs = SlotSignatures::new(&cx);
    let model = ObjectModel::define(&cx, &sigs).unwrap();
    descriptors::emit_foundation(&cx, &model).unwrap();
    cx
}

#[test]
fn full_generation_verifies() {
    let context = Context::create();
    let cx = generate(&context, "pyrite_object_model");

    let ir = cx.finish().unwrap();
    assert!(ir.contains("%PyTypeObject = type"));
    assert!(ir.contains("%PyObject = type { i64, ptr }"));
    assert!(ir.contains("@PyType_Type = global %PyTypeObject"));
    assert!(ir.contains("@PyBaseObject_Type = global %PyTypeObject"));
}

#[test]
fn regeneration_is_byte_identical() {
    let context_a = Context::create();
    let context_b = Context::create();

    let ir_a = generate(&context_a, "pyrite_object_model").finish().unwrap();
    let ir_b = generate(&context_b, "pyrite_object_model").finish().unwrap();
    assert_eq!(ir_a, ir_b);
}

#[test]
fn type_type_is_its_own_type() {
    let context = Context::create();
    let cx = generate(&context, "pyrite_object_model");

    let ir = cx.finish().unwrap();
    // The descriptor of descriptors: its header's type pointer is itself.
    assert!(ir.contains(
        "@PyType_Type = global %PyTypeObject { %PyVarObject { %PyObject { i64 1, ptr @PyType_Type }"
    ));
}

#[test]
fn base_object_type_points_at_type_type() {
    let context = Context::create();
    let cx = generate(&context, "pyrite_object_model");

    let ir = cx.finish().unwrap();
    assert!(ir.contains(
        "@PyBaseObject_Type = global %PyTypeObject { %PyVarObject { %PyObject { i64 1, ptr @PyType_Type }"
    ));
}

#[test]
fn member_offsets_agree_with_the_data_layout() {
    let config = TargetConfig::native().unwrap();
    if config.pointer_size() != 8 {
        return; // reference offsets are LP64-only
    }

    let context = Context::create();
    let cx = generate(&context, "pyrite_object_model");
    let machine = config.create_target_machine().unwrap();
    let td = machine.get_target_data();

    // Name-based and offset-based access agree for every reflective member
    // of the type descriptor.
    for (field, expected) in [
        ("tp_basicsize", 32),
        ("tp_itemsize", 40),
        ("tp_flags", 168),
        ("tp_weaklistoffset", 208),
        ("tp_base", 256),
        ("tp_dictoffset", 288),
        ("tp_mro", 344),
    ] {
        assert_eq!(
            offsets::byte_offset_of_field(&cx, &td, names::TYPE_OBJECT, field).unwrap(),
            expected,
            "offset of {field}"
        );
    }

    pyrite_llvm::verify_layout(&cx, &td).unwrap();
}

#[test]
fn assigned_basicsize_lands_in_the_materialized_field() {
    let config = TargetConfig::native().unwrap();
    if config.pointer_size() != 8 {
        return;
    }

    let context = Context::create();
    let cx = generate(&context, "pyrite_object_model");

    let spam = TypeDescriptorSpec::new("SpamType", "spam", TypePointer::Named("PyType_Type"))
        .with_basicsize(cx.ssize_ty.const_int(32, false))
        .build(&cx)
        .unwrap();
    assert!(spam.get_initializer().is_some());

    // tp_name is followed immediately by tp_basicsize and tp_itemsize in the
    // initializer: the assigned 32 must be materialized right there.
    let ir = cx.finish().unwrap();
    let spam_line = ir
        .lines()
        .find(|line| line.starts_with("@SpamType = global"))
        .expect("SpamType global emitted");
    assert!(spam_line.contains("i64 32, i64 0"));

    // The reflective member offset for tp_basicsize reads the same slot the
    // initializer wrote: offset 32 within the descriptor.
    let machine = config.create_target_machine().unwrap();
    let td = machine.get_target_data();
    assert_eq!(
        offsets::byte_offset_of_field(&cx, &td, names::TYPE_OBJECT, "tp_basicsize").unwrap(),
        32
    );
}

#[test]
fn headers_share_the_object_prefix() {
    let context = Context::create();
    let cx = generate(&context, "pyrite_object_model");

    let ir = cx.finish().unwrap();
    assert!(ir.contains("%PyVarObject = type { %PyObject, i64 }"));
    assert!(ir.contains("%PyTypeObject = type { %PyVarObject, ptr, i64, i64, ptr"));
}
