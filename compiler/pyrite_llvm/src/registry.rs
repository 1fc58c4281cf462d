//! Two-phase named-aggregate registry.
//!
//! The object model is mutually recursive: the object header points at the
//! type descriptor, and the type descriptor embeds the header by value. The
//! registry resolves this the way LLVM itself does — every aggregate is
//! first declared as an opaque named struct (forward-referenceable), and
//! bodies are assigned in a second pass once every handle exists.
//!
//! Each body is assigned from an ordered schema of `(field name, type)`
//! pairs. The LLVM struct body, the arity, and the name→index map are all
//! derived from that one schema, so there is no separate field-name list to
//! drift out of sync with the layout.
//!
//! Body assignment is once-only. Only pointer fields may reference an
//! as-yet-undefined aggregate; embedding an opaque struct by value is
//! rejected, because the owner's layout would be unknowable.

use inkwell::context::Context;
use inkwell::types::{BasicTypeEnum, FunctionType, StructType};
use rustc_hash::FxHashMap;

use crate::error::LayoutError;

/// Handle to a registered named aggregate.
///
/// Cheap to copy; the underlying `StructType` is owned by the LLVM context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeHandle<'ll> {
    ty: StructType<'ll>,
}

impl<'ll> TypeHandle<'ll> {
    /// The underlying LLVM struct type.
    #[must_use]
    pub fn struct_ty(self) -> StructType<'ll> {
        self.ty
    }

    /// The registered name.
    #[must_use]
    pub fn name(&self) -> String {
        self.ty
            .get_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One field of an aggregate schema.
#[derive(Clone, Debug)]
pub struct FieldDef<'ll> {
    /// Field name (foreign ABI spelling, e.g. `tp_basicsize`).
    pub name: String,
    /// LLVM type of the field as laid out in the struct body.
    pub ty: BasicTypeEnum<'ll>,
    /// For dispatch-slot fields: the callback signature behind the pointer.
    ///
    /// Under opaque pointers the laid-out type is always `ptr`; the
    /// signature is kept so call sites can type indirect calls through the
    /// slot.
    pub sig: Option<FunctionType<'ll>>,
}

impl<'ll> FieldDef<'ll> {
    /// A plain data field.
    pub fn new(name: &str, ty: BasicTypeEnum<'ll>) -> Self {
        Self {
            name: name.to_string(),
            ty,
            sig: None,
        }
    }

    /// A dispatch-slot field: laid out as `ptr`, carrying its callback
    /// signature.
    pub fn slot(name: &str, ty: BasicTypeEnum<'ll>, sig: FunctionType<'ll>) -> Self {
        Self {
            name: name.to_string(),
            ty,
            sig: Some(sig),
        }
    }
}

/// The ordered schema a struct body was assigned from.
#[derive(Clone, Debug)]
pub struct StructSchema<'ll> {
    /// Fields in declaration order (index = LLVM struct field index).
    fields: Vec<FieldDef<'ll>>,
    /// Map from field name to index for O(1) lookup.
    index: FxHashMap<String, u32>,
}

impl<'ll> StructSchema<'ll> {
    fn new(fields: Vec<FieldDef<'ll>>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i as u32))
            .collect();
        Self { fields, index }
    }

    /// Number of fields.
    #[must_use]
    pub fn arity(&self) -> u32 {
        self.fields.len() as u32
    }

    /// Index of a field by name.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    /// Field definition at an index.
    #[must_use]
    pub fn field(&self, index: u32) -> Option<&FieldDef<'ll>> {
        self.fields.get(index as usize)
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef<'ll>] {
        &self.fields
    }
}

struct Registered<'ll> {
    ty: StructType<'ll>,
    schema: Option<StructSchema<'ll>>,
}

/// Registry of named aggregates with two-phase declaration.
#[derive(Default)]
pub struct TypeRegistry<'ll> {
    entries: FxHashMap<String, Registered<'ll>>,
    /// Declaration order, so regeneration is byte-identical.
    order: Vec<String>,
}

impl<'ll> TypeRegistry<'ll> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Declare (or retrieve) a named aggregate without a body.
    ///
    /// Idempotent: declaring the same name twice returns the same handle.
    pub fn declare(&mut self, llcx: &'ll Context, name: &str) -> TypeHandle<'ll> {
        if let Some(entry) = self.entries.get(name) {
            return TypeHandle { ty: entry.ty };
        }
        tracing::debug!(name, "declaring opaque aggregate");
        let ty = llcx.opaque_struct_type(name);
        self.entries.insert(
            name.to_string(),
            Registered { ty, schema: None },
        );
        self.order.push(name.to_string());
        TypeHandle { ty }
    }

    /// Assign the body of a declared aggregate, exactly once.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::UnknownType`] if `handle`'s name was never declared
    ///   through this registry.
    /// - [`LayoutError::DuplicateDefinition`] on a second assignment.
    /// - [`LayoutError::IncompleteEmbeddedType`] if a field embeds an
    ///   opaque aggregate by value.
    pub fn define(
        &mut self,
        handle: TypeHandle<'ll>,
        fields: Vec<FieldDef<'ll>>,
    ) -> Result<(), LayoutError> {
        let name = handle.name();
        let entry = self
            .entries
            .get_mut(&name)
            .ok_or_else(|| LayoutError::UnknownType { name: name.clone() })?;

        if entry.schema.is_some() || !entry.ty.is_opaque() {
            return Err(LayoutError::DuplicateDefinition { name });
        }

        for field in &fields {
            if let BasicTypeEnum::StructType(st) = field.ty {
                if st.is_opaque() {
                    return Err(LayoutError::IncompleteEmbeddedType {
                        owner: name,
                        field: field.name.clone(),
                    });
                }
            }
        }

        let body: Vec<BasicTypeEnum<'ll>> = fields.iter().map(|f| f.ty).collect();
        entry.ty.set_body(&body, false);
        entry.schema = Some(StructSchema::new(fields));
        tracing::debug!(name = %name, "aggregate body assigned");
        Ok(())
    }

    /// Resolve a previously declared aggregate by name.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnknownType`] if the name was never declared.
    pub fn resolve(&self, name: &str) -> Result<TypeHandle<'ll>, LayoutError> {
        self.entries
            .get(name)
            .map(|entry| TypeHandle { ty: entry.ty })
            .ok_or_else(|| LayoutError::UnknownType {
                name: name.to_string(),
            })
    }

    /// The schema a body was assigned from.
    ///
    /// # Errors
    ///
    /// [`LayoutError::UnknownType`] if never declared,
    /// [`LayoutError::UndefinedBody`] if declared but not defined.
    pub fn schema(&self, name: &str) -> Result<&StructSchema<'ll>, LayoutError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| LayoutError::UnknownType {
                name: name.to_string(),
            })?;
        entry.schema.as_ref().ok_or_else(|| LayoutError::UndefinedBody {
            name: name.to_string(),
        })
    }

    /// Index of a named field in a defined aggregate.
    pub fn field_index(&self, type_name: &str, field: &str) -> Result<u32, LayoutError> {
        self.schema(type_name)?
            .field_index(field)
            .ok_or_else(|| LayoutError::UnknownField {
                owner: type_name.to_string(),
                field: field.to_string(),
            })
    }

    /// Callback signature carried by a dispatch-slot field, if any.
    pub fn slot_signature(
        &self,
        type_name: &str,
        field: &str,
    ) -> Result<Option<FunctionType<'ll>>, LayoutError> {
        let schema = self.schema(type_name)?;
        let index = schema
            .field_index(field)
            .ok_or_else(|| LayoutError::UnknownField {
                owner: type_name.to_string(),
                field: field.to_string(),
            })?;
        Ok(schema.field(index).and_then(|f| f.sig))
    }

    /// Declared names in declaration order.
    #[must_use]
    pub fn declared(&self) -> &[String] {
        &self.order
    }
}
