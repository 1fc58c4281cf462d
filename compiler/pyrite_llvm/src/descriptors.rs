//! Static descriptor instances and their reflective tables.
//!
//! This is where the generated module stops being a set of layouts and
//! becomes data: fully-populated `PyTypeObject` globals, plus the member /
//! method / getset tables they point at. Slot values that are not supplied
//! explicitly become typed nulls — the foreign convention for "operation
//! unsupported".
//!
//! Member tables are built from a declarative `(name, kind, field, flags)`
//! mapping zipped against the offset engine, so the emitted offsets track
//! the structure's schema automatically. A hand-written offset literal
//! never appears here.
//!
//! Self reference (the descriptor of descriptors pointing at itself) is
//! handled by reserving the global symbol first, building the initializer
//! against the reserved address, then binding the initializer. Pointing a
//! descriptor at a symbol nobody reserved is a generation error.

use bitflags::bitflags;
use inkwell::module::Linkage;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, GlobalValue, IntValue, PointerValue};
use rustc_hash::FxHashMap;

use crate::context::GenCx;
use crate::error::LayoutError;
use crate::object_model::{names, ObjectModel};
use crate::offsets;

bitflags! {
    /// `tp_flags` bits of the foreign ABI.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TypeFlags: u32 {
        const BASETYPE = 1 << 10;
        const HAVE_VECTORCALL = 1 << 11;
        const READY = 1 << 12;
        const READYING = 1 << 13;
        const HAVE_GC = 1 << 14;
        const METHOD_DESCRIPTOR = 1 << 17;
        /// The default flag word for new types (version-tag support).
        const DEFAULT = 1 << 18;
        const VALID_VERSION_TAG = 1 << 19;
        const IS_ABSTRACT = 1 << 20;
        const LONG_SUBCLASS = 1 << 24;
        const LIST_SUBCLASS = 1 << 25;
        const TUPLE_SUBCLASS = 1 << 26;
        const BYTES_SUBCLASS = 1 << 27;
        const UNICODE_SUBCLASS = 1 << 28;
        const DICT_SUBCLASS = 1 << 29;
        const BASE_EXC_SUBCLASS = 1 << 30;
        const TYPE_SUBCLASS = 1 << 31;
    }
}

bitflags! {
    /// Access flags of a reflective member entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MemberFlags: u8 {
        const READONLY = 1;
        const READ_RESTRICTED = 2;
        const WRITE_RESTRICTED = 4;
    }
}

bitflags! {
    /// `ml_flags` bits of a method entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MethodFlags: u8 {
        const VARARGS = 0x01;
        const KEYWORDS = 0x02;
        const NOARGS = 0x04;
        const O = 0x08;
        const CLASS = 0x10;
        const STATIC = 0x20;
        const COEXIST = 0x40;
        const FASTCALL = 0x80;
    }
}

/// Type tag of a reflective member entry: which primitive or object kind
/// lives at the member's offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MemberKind {
    Short = 0,
    Int = 1,
    Long = 2,
    Float = 3,
    Double = 4,
    String = 5,
    Object = 6,
    Char = 7,
    Byte = 8,
    UByte = 9,
    UShort = 10,
    UInt = 11,
    ULong = 12,
    StringInplace = 13,
    Bool = 14,
    ObjectEx = 16,
    LongLong = 17,
    ULongLong = 18,
    PySsizeT = 19,
}

/// Declarative description of one reflective member entry.
///
/// `field` names a field of the owning structure; the byte offset is
/// computed from the structure's schema, never written by hand.
#[derive(Clone, Copy, Debug)]
pub struct MemberSpec<'a> {
    /// Attribute name exposed to the runtime (e.g. `__basicsize__`).
    pub name: &'a str,
    pub kind: MemberKind,
    /// Schema field the offset is computed from (e.g. `tp_basicsize`).
    pub field: &'a str,
    pub flags: MemberFlags,
    pub doc: Option<&'a str>,
}

/// One externally callable method attached to a type.
#[derive(Clone, Copy, Debug)]
pub struct MethodSpec<'a, 'll> {
    pub name: &'a str,
    /// Address of the implementation (typed by the signature catalog).
    pub meth: PointerValue<'ll>,
    pub flags: MethodFlags,
    pub doc: Option<&'a str>,
}

/// One computed attribute (getter/setter pair) attached to a type.
#[derive(Clone, Copy, Debug)]
pub struct GetSetSpec<'a, 'll> {
    pub name: &'a str,
    pub get: Option<PointerValue<'ll>>,
    pub set: Option<PointerValue<'ll>>,
    pub doc: Option<&'a str>,
    pub closure: Option<PointerValue<'ll>>,
}

fn zero_value<'ll>(ty: BasicTypeEnum<'ll>) -> BasicValueEnum<'ll> {
    match ty {
        BasicTypeEnum::IntType(t) => t.const_int(0, false).into(),
        BasicTypeEnum::FloatType(t) => t.const_float(0.0).into(),
        BasicTypeEnum::PointerType(t) => t.const_null().into(),
        BasicTypeEnum::StructType(t) => t.const_zero().into(),
        BasicTypeEnum::ArrayType(t) => t.const_zero().into(),
        BasicTypeEnum::VectorType(t) => t.const_zero().into(),
        BasicTypeEnum::ScalableVectorType(t) => t.get_undef().into(),
    }
}

fn cstring_or_null<'ll>(cx: &GenCx<'ll>, label: &str, text: Option<&str>) -> BasicValueEnum<'ll> {
    match text {
        Some(t) => cx.define_cstring(label, t.as_bytes()).as_pointer_value().into(),
        None => cx.ptr_ty.const_null().into(),
    }
}

fn ptr_or_null<'ll>(cx: &GenCx<'ll>, value: Option<PointerValue<'ll>>) -> BasicValueEnum<'ll> {
    value.unwrap_or_else(|| cx.ptr_ty.const_null()).into()
}

/// Emit a reflective member table for `owner_type` as a constant global.
///
/// The array is terminated by an all-zero sentinel entry, per the foreign
/// convention for descriptor tables.
pub fn emit_member_table<'ll>(
    cx: &GenCx<'ll>,
    symbol: &str,
    owner_type: &str,
    specs: &[MemberSpec<'_>],
) -> Result<GlobalValue<'ll>, LayoutError> {
    let member_st = cx.resolve_type(names::MEMBER_DEF)?.struct_ty();
    let i8_ty = cx.type_i8();

    let mut entries = Vec::with_capacity(specs.len() + 1);
    for spec in specs {
        let offset = offsets::offset_of_field(cx, owner_type, spec.field)?;
        let name_ptr = cx
            .define_cstring(&format!("member.{symbol}.{}", spec.name), spec.name.as_bytes())
            .as_pointer_value();
        let doc = cstring_or_null(cx, &format!("member.{symbol}.{}.doc", spec.name), spec.doc);
        entries.push(member_st.const_named_struct(&[
            name_ptr.into(),
            i8_ty.const_int(u64::from(spec.kind as u8), false).into(),
            offset.into(),
            i8_ty.const_int(u64::from(spec.flags.bits()), false).into(),
            doc,
        ]));
        tracing::trace!(member = spec.name, field = spec.field, "member entry");
    }
    entries.push(member_st.const_zero());

    let initializer = member_st.const_array(&entries);
    let global = cx.declare_global(
        symbol,
        member_st.array_type(entries.len() as u32).into(),
    );
    global.set_initializer(&initializer);
    global.set_constant(true);
    global.set_linkage(Linkage::Internal);
    Ok(global)
}

/// Emit a method table as a constant global, zero-sentinel terminated.
pub fn emit_method_table<'ll>(
    cx: &GenCx<'ll>,
    symbol: &str,
    specs: &[MethodSpec<'_, 'll>],
) -> Result<GlobalValue<'ll>, LayoutError> {
    let method_st = cx.resolve_type(names::METHOD_DEF)?.struct_ty();
    let i8_ty = cx.type_i8();

    let mut entries = Vec::with_capacity(specs.len() + 1);
    for spec in specs {
        let name_ptr = cx
            .define_cstring(&format!("method.{symbol}.{}", spec.name), spec.name.as_bytes())
            .as_pointer_value();
        let doc = cstring_or_null(cx, &format!("method.{symbol}.{}.doc", spec.name), spec.doc);
        entries.push(method_st.const_named_struct(&[
            name_ptr.into(),
            spec.meth.into(),
            i8_ty.const_int(u64::from(spec.flags.bits()), false).into(),
            doc,
        ]));
    }
    entries.push(method_st.const_zero());

    let initializer = method_st.const_array(&entries);
    let global = cx.declare_global(
        symbol,
        method_st.array_type(entries.len() as u32).into(),
    );
    global.set_initializer(&initializer);
    global.set_constant(true);
    global.set_linkage(Linkage::Internal);
    Ok(global)
}

/// Emit a getset table as a constant global, zero-sentinel terminated.
pub fn emit_getset_table<'ll>(
    cx: &GenCx<'ll>,
    symbol: &str,
    specs: &[GetSetSpec<'_, 'll>],
) -> Result<GlobalValue<'ll>, LayoutError> {
    let getset_st = cx.resolve_type(names::GETSET_DEF)?.struct_ty();

    let mut entries = Vec::with_capacity(specs.len() + 1);
    for spec in specs {
        let name_ptr = cx
            .define_cstring(&format!("getset.{symbol}.{}", spec.name), spec.name.as_bytes())
            .as_pointer_value();
        let doc = cstring_or_null(cx, &format!("getset.{symbol}.{}.doc", spec.name), spec.doc);
        entries.push(getset_st.const_named_struct(&[
            name_ptr.into(),
            ptr_or_null(cx, spec.get),
            ptr_or_null(cx, spec.set),
            doc,
            ptr_or_null(cx, spec.closure),
        ]));
    }
    entries.push(getset_st.const_zero());

    let initializer = getset_st.const_array(&entries);
    let global = cx.declare_global(
        symbol,
        getset_st.array_type(entries.len() as u32).into(),
    );
    global.set_initializer(&initializer);
    global.set_constant(true);
    global.set_linkage(Linkage::Internal);
    Ok(global)
}

/// Where a descriptor's `ob_type` points.
#[derive(Clone, Copy, Debug)]
pub enum TypePointer<'a> {
    /// The instance describes itself (the descriptor of descriptors).
    SelfRef,
    /// A previously reserved descriptor global.
    Named(&'a str),
}

/// Builder for one fully-populated type-descriptor global.
///
/// Fields that are not supplied are typed nulls (pointers) or zeros
/// (integers). Slot values are assigned by schema field name, so the
/// builder stays correct when the descriptor's field list evolves.
pub struct TypeDescriptorSpec<'a, 'll> {
    symbol: &'a str,
    type_name: &'a str,
    ob_type: TypePointer<'a>,
    basicsize: Option<IntValue<'ll>>,
    itemsize: Option<IntValue<'ll>>,
    flags: TypeFlags,
    doc: Option<&'a str>,
    slots: Vec<(&'a str, BasicValueEnum<'ll>)>,
}

impl<'a, 'll> TypeDescriptorSpec<'a, 'll> {
    /// Start a descriptor for global `symbol` with runtime name `type_name`.
    #[must_use]
    pub fn new(symbol: &'a str, type_name: &'a str, ob_type: TypePointer<'a>) -> Self {
        Self {
            symbol,
            type_name,
            ob_type,
            basicsize: None,
            itemsize: None,
            flags: TypeFlags::DEFAULT,
            doc: None,
            slots: Vec::new(),
        }
    }

    /// Set `tp_basicsize` (usually a null-base sizeof constant).
    #[must_use]
    pub fn with_basicsize(mut self, size: IntValue<'ll>) -> Self {
        self.basicsize = Some(size);
        self
    }

    /// Set `tp_itemsize`.
    #[must_use]
    pub fn with_itemsize(mut self, size: IntValue<'ll>) -> Self {
        self.itemsize = Some(size);
        self
    }

    /// Set the `tp_flags` word.
    #[must_use]
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the `tp_doc` string.
    #[must_use]
    pub fn with_doc(mut self, doc: &'a str) -> Self {
        self.doc = Some(doc);
        self
    }

    /// Assign a dispatch slot (or linkage field) by schema field name.
    #[must_use]
    pub fn with_slot(mut self, field: &'a str, value: BasicValueEnum<'ll>) -> Self {
        self.slots.push((field, value));
        self
    }

    /// Materialize the descriptor as a named global.
    ///
    /// The symbol is reserved before the initializer is built, so
    /// [`TypePointer::SelfRef`] resolves to the instance's own address.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnresolvedSelfReference`] if a named `ob_type` target
    /// was never reserved; [`LayoutError::UnknownField`] for a slot name
    /// outside the descriptor schema; [`LayoutError::InvalidModule`] for a
    /// slot value whose type does not match the field.
    pub fn build(self, cx: &GenCx<'ll>) -> Result<GlobalValue<'ll>, LayoutError> {
        let type_st = cx.resolve_type(names::TYPE_OBJECT)?.struct_ty();
        let object_st = cx.resolve_type(names::OBJECT)?.struct_ty();
        let var_st = cx.resolve_type(names::VAR_OBJECT)?.struct_ty();
        let schema = cx.type_schema(names::TYPE_OBJECT)?;

        // Reserve the symbol before the initializer exists; self reference
        // is a forward reference into the module's symbol table.
        let global = cx.declare_struct_global(self.symbol, type_st);

        let ob_type_ptr = match self.ob_type {
            TypePointer::SelfRef => global.as_pointer_value(),
            TypePointer::Named(name) => cx
                .llmod
                .get_global(name)
                .ok_or_else(|| LayoutError::UnresolvedSelfReference {
                    name: name.to_string(),
                })?
                .as_pointer_value(),
        };

        // Static descriptors are immortal: refcount 1, never deallocated.
        let header = object_st.const_named_struct(&[
            cx.ssize_ty.const_int(1, false).into(),
            ob_type_ptr.into(),
        ]);
        let var_header = var_st.const_named_struct(&[
            header.into(),
            cx.ssize_ty.const_int(0, false).into(),
        ]);

        let name_ptr = cx
            .define_cstring(&format!("type.{}.name", self.symbol), self.type_name.as_bytes())
            .as_pointer_value();
        let doc = cstring_or_null(cx, &format!("type.{}.doc", self.symbol), self.doc);

        let mut overrides: FxHashMap<&str, BasicValueEnum<'ll>> = FxHashMap::default();
        for (field, value) in self.slots {
            overrides.insert(field, value);
        }

        // Header, name, sizing, flags, and doc go through their dedicated
        // builder inputs, never through slot assignment.
        const MANAGED: [&str; 6] = [
            "ob_base",
            "tp_name",
            "tp_basicsize",
            "tp_itemsize",
            "tp_flags",
            "tp_doc",
        ];
        for managed in MANAGED {
            if overrides.contains_key(managed) {
                return Err(LayoutError::InvalidModule {
                    message: format!(
                        "field '{managed}' of '{}' must be set through its \
                         builder method, not a slot assignment",
                        self.symbol
                    ),
                });
            }
        }

        let mut values: Vec<BasicValueEnum<'ll>> = Vec::with_capacity(schema.arity() as usize);
        for def in schema.fields() {
            let value = match def.name.as_str() {
                "ob_base" => var_header.into(),
                "tp_name" => name_ptr.into(),
                "tp_basicsize" => self
                    .basicsize
                    .unwrap_or_else(|| cx.ssize_ty.const_int(0, false))
                    .into(),
                "tp_itemsize" => self
                    .itemsize
                    .unwrap_or_else(|| cx.ssize_ty.const_int(0, false))
                    .into(),
                "tp_flags" => cx
                    .type_i32()
                    .const_int(u64::from(self.flags.bits()), false)
                    .into(),
                "tp_doc" => doc,
                name => match overrides.remove(name) {
                    Some(value) => {
                        if value.get_type() != def.ty {
                            return Err(LayoutError::InvalidModule {
                                message: format!(
                                    "slot '{name}' of '{}' initialized with type {:?}, \
                                     field expects {:?}",
                                    self.symbol,
                                    value.get_type(),
                                    def.ty
                                ),
                            });
                        }
                        value
                    }
                    None => zero_value(def.ty),
                },
            };
            values.push(value);
        }

        if let Some((field, _)) = overrides.iter().next() {
            return Err(LayoutError::UnknownField {
                owner: names::TYPE_OBJECT.to_string(),
                field: (*field).to_string(),
            });
        }

        let initializer = type_st.const_named_struct(&values);
        global.set_initializer(&initializer);
        tracing::debug!(symbol = self.symbol, name = self.type_name, "descriptor emitted");
        Ok(global)
    }
}

/// The foundational descriptors every generated module carries.
pub struct Foundation<'ll> {
    /// `PyType_Type` — the descriptor of descriptors, its own type.
    pub type_type: GlobalValue<'ll>,
    /// `PyBaseObject_Type` — the universal base object.
    pub base_object_type: GlobalValue<'ll>,
    /// The reflective member table hanging off `PyType_Type.tp_members`.
    pub type_members: GlobalValue<'ll>,
}

/// Reflective members of the type descriptor itself.
const TYPE_MEMBERS: [MemberSpec<'static>; 7] = [
    MemberSpec {
        name: "__basicsize__",
        kind: MemberKind::PySsizeT,
        field: "tp_basicsize",
        flags: MemberFlags::READONLY,
        doc: None,
    },
    MemberSpec {
        name: "__itemsize__",
        kind: MemberKind::PySsizeT,
        field: "tp_itemsize",
        flags: MemberFlags::READONLY,
        doc: None,
    },
    MemberSpec {
        name: "__flags__",
        kind: MemberKind::UInt,
        field: "tp_flags",
        flags: MemberFlags::READONLY,
        doc: None,
    },
    MemberSpec {
        name: "__weakrefoffset__",
        kind: MemberKind::PySsizeT,
        field: "tp_weaklistoffset",
        flags: MemberFlags::READONLY,
        doc: None,
    },
    MemberSpec {
        name: "__base__",
        kind: MemberKind::Object,
        field: "tp_base",
        flags: MemberFlags::READONLY,
        doc: None,
    },
    MemberSpec {
        name: "__dictoffset__",
        kind: MemberKind::PySsizeT,
        field: "tp_dictoffset",
        flags: MemberFlags::READONLY,
        doc: None,
    },
    MemberSpec {
        name: "__mro__",
        kind: MemberKind::Object,
        field: "tp_mro",
        flags: MemberFlags::READONLY,
        doc: None,
    },
];

/// Emit the two foundational descriptors and their member table.
///
/// `PyType_Type` and `PyBaseObject_Type` reference each other, so both
/// symbols are reserved before either initializer is built.
pub fn emit_foundation<'ll>(
    cx: &GenCx<'ll>,
    model: &ObjectModel<'ll>,
) -> Result<Foundation<'ll>, LayoutError> {
    let type_st = model.type_object.struct_ty();

    let type_global = cx.declare_struct_global("PyType_Type", type_st);
    let base_global = cx.declare_struct_global("PyBaseObject_Type", type_st);

    let type_members = emit_member_table(cx, "type_members", names::TYPE_OBJECT, &TYPE_MEMBERS)?;

    let type_type = TypeDescriptorSpec::new("PyType_Type", "type", TypePointer::SelfRef)
        .with_basicsize(offsets::size_of(cx, names::TYPE_OBJECT)?)
        .with_itemsize(offsets::size_of(cx, names::MEMBER_DEF)?)
        .with_flags(
            TypeFlags::DEFAULT
                | TypeFlags::HAVE_VECTORCALL
                | TypeFlags::HAVE_GC
                | TypeFlags::BASETYPE
                | TypeFlags::TYPE_SUBCLASS,
        )
        .with_doc(
            "type(object) -> the object's type\n\
             type(name, bases, dict, **kwds) -> a new type",
        )
        .with_slot("tp_members", type_members.as_pointer_value().into())
        .with_slot("tp_base", base_global.as_pointer_value().into())
        .build(cx)?;

    let base_object_type =
        TypeDescriptorSpec::new("PyBaseObject_Type", "object", TypePointer::Named("PyType_Type"))
            .with_basicsize(offsets::size_of(cx, names::OBJECT)?)
            .with_flags(TypeFlags::DEFAULT | TypeFlags::BASETYPE)
            .with_doc(
                "The base class of the class hierarchy.\n\n\
                 When called, it accepts no arguments and returns a new featureless\n\
                 instance that has no instance attributes and cannot be given any.\n",
            )
            .build(cx)?;

    debug_assert_eq!(type_global, type_type);

    Ok(Foundation {
        type_type,
        base_object_type,
        type_members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::SlotSignatures;
    use inkwell::context::Context;

    fn model_cx(context: &Context) -> GenCx<'_> {
        let cx = GenCx::new(context, "test_descriptors");
        let sigs = SlotSignatures::new(&cx);
        ObjectModel::define(&cx, &sigs).unwrap();
        cx
    }

    #[test]
    fn flag_words_match_the_foreign_bits() {
        assert_eq!(TypeFlags::DEFAULT.bits(), 1 << 18);
        assert_eq!(TypeFlags::BASETYPE.bits(), 1 << 10);
        assert_eq!(TypeFlags::TYPE_SUBCLASS.bits(), 1 << 31);
        assert_eq!(MemberFlags::READONLY.bits(), 1);
        assert_eq!(MethodFlags::NOARGS.bits(), 0x04);
        assert_eq!(MemberKind::PySsizeT as u8, 19);
        assert_eq!(MemberKind::ObjectEx as u8, 16);
    }

    #[test]
    fn member_table_is_sentinel_terminated() {
        let context = Context::create();
        let cx = model_cx(&context);

        let specs = [MemberSpec {
            name: "__basicsize__",
            kind: MemberKind::PySsizeT,
            field: "tp_basicsize",
            flags: MemberFlags::READONLY,
            doc: None,
        }];
        let table = emit_member_table(&cx, "t_members", names::TYPE_OBJECT, &specs).unwrap();

        assert!(table.is_constant());
        let array_ty = table.get_value_type().into_array_type();
        assert_eq!(array_ty.len(), 2); // one entry + sentinel
    }

    #[test]
    fn member_table_rejects_unknown_fields() {
        let context = Context::create();
        let cx = model_cx(&context);

        let specs = [MemberSpec {
            name: "__bogus__",
            kind: MemberKind::PySsizeT,
            field: "tp_bogus",
            flags: MemberFlags::READONLY,
            doc: None,
        }];
        let err = emit_member_table(&cx, "bogus_members", names::TYPE_OBJECT, &specs).unwrap_err();
        assert_eq!(
            err,
            LayoutError::UnknownField {
                owner: names::TYPE_OBJECT.to_string(),
                field: "tp_bogus".to_string(),
            }
        );
    }

    #[test]
    fn unsupplied_slots_become_typed_nulls() {
        let context = Context::create();
        let cx = model_cx(&context);

        let global = TypeDescriptorSpec::new("EmptyType", "empty", TypePointer::SelfRef)
            .build(&cx)
            .unwrap();
        assert!(global.get_initializer().is_some());

        let ir = cx.llmod.print_to_string().to_string();
        // Every unset pointer slot prints as a plain null in the initializer.
        assert!(ir.contains("@EmptyType = global %PyTypeObject"));
        assert!(ir.contains("ptr null"));
    }

    #[test]
    fn self_reference_resolves_to_own_symbol() {
        let context = Context::create();
        let cx = model_cx(&context);

        TypeDescriptorSpec::new("SelfType", "self", TypePointer::SelfRef)
            .build(&cx)
            .unwrap();

        let ir = cx.llmod.print_to_string().to_string();
        assert!(ir.contains("%PyObject { i64 1, ptr @SelfType }"));
    }

    #[test]
    fn named_target_must_be_reserved_first() {
        let context = Context::create();
        let cx = model_cx(&context);

        let err = TypeDescriptorSpec::new("Orphan", "orphan", TypePointer::Named("NoSuchType"))
            .build(&cx)
            .unwrap_err();
        assert_eq!(
            err,
            LayoutError::UnresolvedSelfReference {
                name: "NoSuchType".to_string(),
            }
        );
    }

    #[test]
    fn unknown_slot_name_is_rejected() {
        let context = Context::create();
        let cx = model_cx(&context);

        let err = TypeDescriptorSpec::new("BadSlot", "bad", TypePointer::SelfRef)
            .with_slot("tp_imaginary", cx.ptr_ty.const_null().into())
            .build(&cx)
            .unwrap_err();
        assert_eq!(
            err,
            LayoutError::UnknownField {
                owner: names::TYPE_OBJECT.to_string(),
                field: "tp_imaginary".to_string(),
            }
        );
    }

    #[test]
    fn mistyped_slot_value_is_rejected() {
        let context = Context::create();
        let cx = model_cx(&context);

        // tp_dictoffset is an i64 field; a pointer value must be refused.
        let err = TypeDescriptorSpec::new("BadValue", "bad", TypePointer::SelfRef)
            .with_slot("tp_dictoffset", cx.ptr_ty.const_null().into())
            .build(&cx)
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidModule { .. }));
    }

    #[test]
    fn method_and_getset_tables_are_emitted() {
        let context = Context::create();
        let cx = GenCx::new(&context, "test_descriptors");
        let sigs = SlotSignatures::new(&cx);
        ObjectModel::define(&cx, &sigs).unwrap();

        // Slot implementations are declared against the catalog's types.
        let repr_impl = cx.llmod.add_function("type_repr", sigs.pycfunction, None);
        let name_get = cx.llmod.add_function("type_name_get", sigs.getter, None);

        let methods = [MethodSpec {
            name: "mro",
            meth: repr_impl.as_global_value().as_pointer_value(),
            flags: MethodFlags::NOARGS,
            doc: Some("Return a type's method resolution order."),
        }];
        let table = emit_method_table(&cx, "type_methods", &methods).unwrap();
        assert_eq!(table.get_value_type().into_array_type().len(), 2);

        let getsets = [GetSetSpec {
            name: "__name__",
            get: Some(name_get.as_global_value().as_pointer_value()),
            set: None,
            doc: None,
            closure: None,
        }];
        let table = emit_getset_table(&cx, "type_getsets", &getsets).unwrap();
        assert_eq!(table.get_value_type().into_array_type().len(), 2);

        let ir = cx.llmod.print_to_string().to_string();
        assert!(ir.contains("@type_methods = internal constant [2 x %PyMethodDef]"));
        assert!(ir.contains("@type_getsets = internal constant [2 x %PyGetSetDef]"));
    }

    #[test]
    fn managed_fields_cannot_be_slot_assigned() {
        let context = Context::create();
        let cx = model_cx(&context);

        let err = TypeDescriptorSpec::new("Sneaky", "sneaky", TypePointer::SelfRef)
            .with_slot("tp_doc", cx.ptr_ty.const_null().into())
            .build(&cx)
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidModule { .. }));
    }

    #[test]
    fn foundation_wires_the_descriptor_cycle() {
        let context = Context::create();
        let cx = model_cx(&context);

        let foundation = emit_foundation(&cx, &model_of(&cx)).unwrap();
        assert!(foundation.type_type.get_initializer().is_some());
        assert!(foundation.base_object_type.get_initializer().is_some());

        let ir = cx.llmod.print_to_string().to_string();
        // type is its own type; object's type is type; type's base is object.
        assert!(ir.contains("%PyObject { i64 1, ptr @PyType_Type }"));
        assert!(ir.contains("ptr @PyBaseObject_Type"));
    }

    // The model handles are only needed by emit_foundation's signature; the
    // aggregates themselves already live in the context.
    fn model_of<'ll>(cx: &GenCx<'ll>) -> ObjectModel<'ll> {
        ObjectModel {
            object: cx.resolve_type(names::OBJECT).unwrap(),
            var_object: cx.resolve_type(names::VAR_OBJECT).unwrap(),
            type_object: cx.resolve_type(names::TYPE_OBJECT).unwrap(),
            buffer: cx.resolve_type(names::BUFFER).unwrap(),
            async_methods: cx.resolve_type(names::ASYNC_METHODS).unwrap(),
            number_methods: cx.resolve_type(names::NUMBER_METHODS).unwrap(),
            sequence_methods: cx.resolve_type(names::SEQUENCE_METHODS).unwrap(),
            mapping_methods: cx.resolve_type(names::MAPPING_METHODS).unwrap(),
            buffer_procs: cx.resolve_type(names::BUFFER_PROCS).unwrap(),
            method_def: cx.resolve_type(names::METHOD_DEF).unwrap(),
            member_def: cx.resolve_type(names::MEMBER_DEF).unwrap(),
            getset_def: cx.resolve_type(names::GETSET_DEF).unwrap(),
        }
    }
}
