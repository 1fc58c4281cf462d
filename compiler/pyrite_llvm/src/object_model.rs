//! The object-model aggregate inventory.
//!
//! Declares and defines every structure of the foreign object ABI: the
//! object headers, the buffer view, the five method suites, the descriptor
//! record types, and the type descriptor itself. Field order and widths are
//! fixed by the external specification — adding, removing, or reordering a
//! field here breaks binary compatibility with every artifact the runtime
//! ever produced.
//!
//! Structural "inheritance" is explicit composition: `PyVarObject` embeds
//! `PyObject` as its first field, and `PyTypeObject` embeds `PyVarObject`.
//! The layout is identical to spelling the header fields out in each
//! aggregate (offset 0, natural alignment), and it lets the registry enforce
//! that a header is complete before anything embeds it.
//!
//! Definition happens in two phases: every aggregate is declared opaque
//! before any body is assigned, because `PyObject.ob_type` points at
//! `PyTypeObject` while `PyTypeObject` embeds the headers by value — the one
//! permitted reference cycle in the model.

use crate::context::GenCx;
use crate::error::LayoutError;
use crate::registry::{FieldDef, TypeHandle};
use crate::signatures::SlotSignatures;

/// Registered names of the object-model aggregates.
pub mod names {
    pub const OBJECT: &str = "PyObject";
    pub const VAR_OBJECT: &str = "PyVarObject";
    pub const TYPE_OBJECT: &str = "PyTypeObject";
    pub const BUFFER: &str = "Py_buffer";
    pub const ASYNC_METHODS: &str = "PyAsyncMethods";
    pub const NUMBER_METHODS: &str = "PyNumberMethods";
    pub const SEQUENCE_METHODS: &str = "PySequenceMethods";
    pub const MAPPING_METHODS: &str = "PyMappingMethods";
    pub const BUFFER_PROCS: &str = "PyBufferProcs";
    pub const METHOD_DEF: &str = "PyMethodDef";
    pub const MEMBER_DEF: &str = "PyMemberDef";
    pub const GETSET_DEF: &str = "PyGetSetDef";
}

/// Handles to every defined aggregate of the object model.
pub struct ObjectModel<'ll> {
    pub object: TypeHandle<'ll>,
    pub var_object: TypeHandle<'ll>,
    pub type_object: TypeHandle<'ll>,
    pub buffer: TypeHandle<'ll>,
    pub async_methods: TypeHandle<'ll>,
    pub number_methods: TypeHandle<'ll>,
    pub sequence_methods: TypeHandle<'ll>,
    pub mapping_methods: TypeHandle<'ll>,
    pub buffer_procs: TypeHandle<'ll>,
    pub method_def: TypeHandle<'ll>,
    pub member_def: TypeHandle<'ll>,
    pub getset_def: TypeHandle<'ll>,
}

impl<'ll> ObjectModel<'ll> {
    /// Declare and define the full aggregate inventory.
    ///
    /// # Errors
    ///
    /// Propagates registry errors; on a fresh context this only fails if the
    /// model was already defined (`DuplicateDefinition`).
    pub fn define(cx: &GenCx<'ll>, sigs: &SlotSignatures<'ll>) -> Result<Self, LayoutError> {
        // Phase 1: every aggregate exists as an opaque handle before any
        // body is written.
        let object = cx.declare_type(names::OBJECT);
        let var_object = cx.declare_type(names::VAR_OBJECT);
        let type_object = cx.declare_type(names::TYPE_OBJECT);
        let buffer = cx.declare_type(names::BUFFER);
        let async_methods = cx.declare_type(names::ASYNC_METHODS);
        let number_methods = cx.declare_type(names::NUMBER_METHODS);
        let sequence_methods = cx.declare_type(names::SEQUENCE_METHODS);
        let mapping_methods = cx.declare_type(names::MAPPING_METHODS);
        let buffer_procs = cx.declare_type(names::BUFFER_PROCS);
        let method_def = cx.declare_type(names::METHOD_DEF);
        let member_def = cx.declare_type(names::MEMBER_DEF);
        let getset_def = cx.declare_type(names::GETSET_DEF);

        // Phase 2: bodies. Headers first — they are embedded by value.
        let ptr: inkwell::types::BasicTypeEnum<'ll> = cx.type_ptr().into();
        let ssize: inkwell::types::BasicTypeEnum<'ll> = cx.ssize_ty.into();
        let i8t: inkwell::types::BasicTypeEnum<'ll> = cx.type_i8().into();
        let i32t: inkwell::types::BasicTypeEnum<'ll> = cx.type_i32().into();
        let i64t: inkwell::types::BasicTypeEnum<'ll> = cx.type_i64().into();
        let slot = |name: &str, sig| FieldDef::slot(name, ptr, sig);
        let field = FieldDef::new;

        cx.define_type(
            object,
            vec![
                field("ob_refcnt", ssize),
                // Points at the object's PyTypeObject; opaque ptr at the
                // layout level, the cycle lives in the semantics.
                field("ob_type", ptr),
            ],
        )?;

        cx.define_type(
            var_object,
            vec![
                field("ob_base", object.struct_ty().into()),
                field("ob_size", ssize),
            ],
        )?;

        cx.define_type(
            buffer,
            vec![
                field("buf", ptr),
                field("obj", ptr), // owned reference to the exporter
                field("len", ssize),
                field("itemsize", ssize),
                field("readonly", i8t),
                field("ndim", i8t),
                field("format", ptr),
                field("shape", ptr),
                field("strides", ptr),
                field("suboffsets", ptr),
                field("internal", ptr),
            ],
        )?;

        cx.define_type(
            async_methods,
            vec![
                slot("am_await", sigs.unaryfunc),
                slot("am_aiter", sigs.unaryfunc),
                slot("am_anext", sigs.unaryfunc),
                slot("am_send", sigs.sendfunc),
            ],
        )?;

        cx.define_type(
            number_methods,
            vec![
                slot("nb_add", sigs.binaryfunc),
                slot("nb_subtract", sigs.binaryfunc),
                slot("nb_multiply", sigs.binaryfunc),
                slot("nb_remainder", sigs.binaryfunc),
                slot("nb_divmod", sigs.binaryfunc),
                slot("nb_power", sigs.ternaryfunc),
                slot("nb_negative", sigs.unaryfunc),
                slot("nb_positive", sigs.unaryfunc),
                slot("nb_absolute", sigs.unaryfunc),
                slot("nb_bool", sigs.inquiry),
                slot("nb_invert", sigs.unaryfunc),
                slot("nb_lshift", sigs.binaryfunc),
                slot("nb_rshift", sigs.binaryfunc),
                slot("nb_and", sigs.binaryfunc),
                slot("nb_xor", sigs.binaryfunc),
                slot("nb_or", sigs.binaryfunc),
                slot("nb_int", sigs.unaryfunc),
                // The slot formerly known as nb_long.
                field("nb_reserved", ptr),
                slot("nb_float", sigs.unaryfunc),
                slot("nb_inplace_add", sigs.binaryfunc),
                slot("nb_inplace_subtract", sigs.binaryfunc),
                slot("nb_inplace_multiply", sigs.binaryfunc),
                slot("nb_inplace_remainder", sigs.binaryfunc),
                slot("nb_inplace_power", sigs.ternaryfunc),
                slot("nb_inplace_lshift", sigs.binaryfunc),
                slot("nb_inplace_rshift", sigs.binaryfunc),
                slot("nb_inplace_and", sigs.binaryfunc),
                slot("nb_inplace_xor", sigs.binaryfunc),
                slot("nb_inplace_or", sigs.binaryfunc),
                slot("nb_floor_divide", sigs.binaryfunc),
                slot("nb_true_divide", sigs.binaryfunc),
                slot("nb_inplace_floor_divide", sigs.binaryfunc),
                slot("nb_inplace_true_divide", sigs.binaryfunc),
                slot("nb_index", sigs.unaryfunc),
                slot("nb_matrix_multiply", sigs.binaryfunc),
                slot("nb_inplace_matrix_multiply", sigs.binaryfunc),
            ],
        )?;

        cx.define_type(
            sequence_methods,
            vec![
                slot("sq_length", sigs.lenfunc),
                slot("sq_concat", sigs.binaryfunc),
                slot("sq_repeat", sigs.ssizeargfunc),
                slot("sq_item", sigs.ssizeargfunc),
                // Retired slots, kept for binary compatibility.
                field("was_sq_slice", ptr),
                slot("sq_ass_item", sigs.ssizeobjargproc),
                field("was_sq_ass_slice", ptr),
                slot("sq_contains", sigs.objobjproc),
                slot("sq_inplace_concat", sigs.binaryfunc),
                slot("sq_inplace_repeat", sigs.ssizeargfunc),
            ],
        )?;

        cx.define_type(
            mapping_methods,
            vec![
                slot("mp_length", sigs.lenfunc),
                slot("mp_subscript", sigs.binaryfunc),
                slot("mp_ass_subscript", sigs.objobjargproc),
            ],
        )?;

        cx.define_type(
            buffer_procs,
            vec![
                slot("bf_getbuffer", sigs.getbufferproc),
                slot("bf_releasebuffer", sigs.releasebufferproc),
            ],
        )?;

        cx.define_type(
            method_def,
            vec![
                field("ml_name", ptr),
                slot("ml_meth", sigs.pycfunction),
                field("ml_flags", i8t),
                field("ml_doc", ptr),
            ],
        )?;

        cx.define_type(
            member_def,
            vec![
                field("name", ptr),
                field("type", i8t),
                field("offset", ssize),
                field("flags", i8t),
                field("doc", ptr),
            ],
        )?;

        cx.define_type(
            getset_def,
            vec![
                field("name", ptr),
                slot("get", sigs.getter),
                slot("set", sigs.setter),
                field("doc", ptr),
                field("closure", ptr),
            ],
        )?;

        cx.define_type(
            type_object,
            vec![
                field("ob_base", var_object.struct_ty().into()),
                field("tp_name", ptr),
                field("tp_basicsize", ssize),
                field("tp_itemsize", ssize),
                slot("tp_dealloc", sigs.destructor),
                field("tp_vectorcall_offset", ssize),
                slot("tp_getattr", sigs.getattrfunc),
                slot("tp_setattr", sigs.setattrfunc),
                field("tp_as_async", ptr),
                slot("tp_repr", sigs.reprfunc),
                field("tp_as_number", ptr),
                field("tp_as_sequence", ptr),
                field("tp_as_mapping", ptr),
                slot("tp_hash", sigs.hashfunc),
                slot("tp_call", sigs.ternaryfunc),
                slot("tp_str", sigs.reprfunc),
                slot("tp_getattro", sigs.getattrofunc),
                slot("tp_setattro", sigs.setattrofunc),
                field("tp_as_buffer", ptr),
                field("tp_flags", i32t),
                field("tp_doc", ptr),
                slot("tp_traverse", sigs.traverseproc),
                slot("tp_clear", sigs.inquiry),
                slot("tp_richcompare", sigs.richcmpfunc),
                field("tp_weaklistoffset", ssize),
                slot("tp_iter", sigs.getiterfunc),
                slot("tp_iternext", sigs.iternextfunc),
                field("tp_methods", ptr),
                field("tp_members", ptr),
                field("tp_getset", ptr),
                field("tp_base", ptr),
                field("tp_dict", ptr),
                slot("tp_descr_get", sigs.descrgetfunc),
                slot("tp_descr_set", sigs.descrsetfunc),
                field("tp_dictoffset", ssize),
                slot("tp_init", sigs.initproc),
                slot("tp_alloc", sigs.allocfunc),
                slot("tp_new", sigs.newfunc),
                slot("tp_free", sigs.freefunc),
                slot("tp_is_gc", sigs.inquiry),
                field("tp_bases", ptr),
                field("tp_mro", ptr),
                field("tp_cache", ptr),
                field("tp_subclasses", ptr),
                field("tp_weaklist", ptr),
                slot("tp_del", sigs.destructor),
                field("tp_version_tag", i64t),
                slot("tp_finalize", sigs.destructor),
                slot("tp_vectorcall", sigs.vectorcallfunc),
            ],
        )?;

        tracing::debug!("object-model aggregates defined");

        Ok(Self {
            object,
            var_object,
            type_object,
            buffer,
            async_methods,
            number_methods,
            sequence_methods,
            mapping_methods,
            buffer_procs,
            method_def,
            member_def,
            getset_def,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;

    fn model_cx(context: &Context) -> GenCx<'_> {
        let cx = GenCx::new(context, "test_model");
        let sigs = SlotSignatures::new(&cx);
        ObjectModel::define(&cx, &sigs).unwrap();
        cx
    }

    #[test]
    fn aggregates_have_foreign_arities() {
        let context = Context::create();
        let cx = model_cx(&context);

        let arity = |name: &str| cx.type_schema(name).unwrap().arity();
        assert_eq!(arity(names::OBJECT), 2);
        assert_eq!(arity(names::VAR_OBJECT), 2);
        assert_eq!(arity(names::BUFFER), 11);
        assert_eq!(arity(names::ASYNC_METHODS), 4);
        assert_eq!(arity(names::NUMBER_METHODS), 36);
        assert_eq!(arity(names::SEQUENCE_METHODS), 10);
        assert_eq!(arity(names::MAPPING_METHODS), 3);
        assert_eq!(arity(names::BUFFER_PROCS), 2);
        assert_eq!(arity(names::METHOD_DEF), 4);
        assert_eq!(arity(names::MEMBER_DEF), 5);
        assert_eq!(arity(names::GETSET_DEF), 5);
        assert_eq!(arity(names::TYPE_OBJECT), 49);
    }

    #[test]
    fn headers_compose_by_value() {
        let context = Context::create();
        let cx = model_cx(&context);

        let var = cx.resolve_type(names::VAR_OBJECT).unwrap().struct_ty();
        let first = var.get_field_type_at_index(0).unwrap();
        assert_eq!(
            first.into_struct_type(),
            cx.resolve_type(names::OBJECT).unwrap().struct_ty()
        );

        let ty = cx.resolve_type(names::TYPE_OBJECT).unwrap().struct_ty();
        assert_eq!(ty.get_field_type_at_index(0).unwrap().into_struct_type(), var);
    }

    #[test]
    fn slots_carry_catalog_signatures() {
        let context = Context::create();
        let cx = GenCx::new(&context, "test_model");
        let sigs = SlotSignatures::new(&cx);
        ObjectModel::define(&cx, &sigs).unwrap();

        assert_eq!(
            cx.slot_signature(names::NUMBER_METHODS, "nb_add").unwrap(),
            Some(sigs.binaryfunc)
        );
        assert_eq!(
            cx.slot_signature(names::TYPE_OBJECT, "tp_hash").unwrap(),
            Some(sigs.hashfunc)
        );
        // Data fields carry no signature.
        assert_eq!(
            cx.slot_signature(names::TYPE_OBJECT, "tp_basicsize").unwrap(),
            None
        );
        assert_eq!(
            cx.slot_signature(names::NUMBER_METHODS, "nb_reserved").unwrap(),
            None
        );
    }

    #[test]
    fn redefining_the_model_fails() {
        let context = Context::create();
        let cx = GenCx::new(&context, "test_model");
        let sigs = SlotSignatures::new(&cx);
        ObjectModel::define(&cx, &sigs).unwrap();

        let err = ObjectModel::define(&cx, &sigs).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateDefinition { .. }));
    }

    #[test]
    fn field_order_is_the_foreign_order() {
        let context = Context::create();
        let cx = model_cx(&context);

        assert_eq!(cx.field_index(names::TYPE_OBJECT, "ob_base").unwrap(), 0);
        assert_eq!(cx.field_index(names::TYPE_OBJECT, "tp_name").unwrap(), 1);
        assert_eq!(cx.field_index(names::TYPE_OBJECT, "tp_flags").unwrap(), 19);
        assert_eq!(
            cx.field_index(names::TYPE_OBJECT, "tp_vectorcall").unwrap(),
            48
        );
        assert_eq!(
            cx.field_index(names::NUMBER_METHODS, "nb_inplace_matrix_multiply")
                .unwrap(),
            35
        );
    }
}
