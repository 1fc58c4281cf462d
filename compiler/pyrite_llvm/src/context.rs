//! Generation context for the object-model module.
//!
//! `GenCx` wraps the LLVM context and module with the small set of types the
//! foreign ABI is built from, plus the aggregate registry. The whole
//! generation pass is single-threaded and single-owner: one `GenCx` is
//! created, the object model is declared and defined against it, descriptor
//! instances are emitted, and the module is finalized. Nothing is mutated
//! after finalization.
//!
//! Pointer-sized integers and pointers are distinct, explicitly-tagged types
//! here: `ssize_ty` is a true `i64` (`Py_ssize_t` on an LP64 target) and
//! `ptr_ty` is the opaque pointer type. Conversions happen only at the
//! offset engine's `ptrtoint` boundary.

use std::cell::RefCell;

use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{
    BasicType, BasicTypeEnum, FunctionType, IntType, PointerType, StructType, VoidType,
};
use inkwell::values::{BasicValueEnum, GlobalValue};
use inkwell::AddressSpace;

use crate::error::LayoutError;
use crate::registry::{FieldDef, StructSchema, TypeHandle, TypeRegistry};

/// Context for one object-model generation pass.
pub struct GenCx<'ll> {
    /// The LLVM context (owns all LLVM types and values).
    pub llcx: &'ll Context,
    /// The LLVM module being generated.
    pub llmod: Module<'ll>,
    /// Opaque pointer type.
    pub ptr_ty: PointerType<'ll>,
    /// Pointer-sized signed integer (`Py_ssize_t`): i64 on LP64 targets.
    pub ssize_ty: IntType<'ll>,
    /// Named-aggregate registry.
    registry: RefCell<TypeRegistry<'ll>>,
}

impl<'ll> GenCx<'ll> {
    /// Create a new generation context.
    #[must_use]
    pub fn new(context: &'ll Context, module_name: &str) -> Self {
        let llmod = context.create_module(module_name);
        let ptr_ty = context.ptr_type(AddressSpace::default());
        let ssize_ty = context.i64_type();

        Self {
            llcx: context,
            llmod,
            ptr_ty,
            ssize_ty,
            registry: RefCell::new(TypeRegistry::new()),
        }
    }

    // -- Type constructors --

    /// Get the i8 type.
    #[inline]
    pub fn type_i8(&self) -> IntType<'ll> {
        self.llcx.i8_type()
    }

    /// Get the i32 type.
    #[inline]
    pub fn type_i32(&self) -> IntType<'ll> {
        self.llcx.i32_type()
    }

    /// Get the i64 type.
    #[inline]
    pub fn type_i64(&self) -> IntType<'ll> {
        self.llcx.i64_type()
    }

    /// Get the pointer type.
    #[inline]
    pub fn type_ptr(&self) -> PointerType<'ll> {
        self.ptr_ty
    }

    /// Get the void type.
    #[inline]
    pub fn type_void(&self) -> VoidType<'ll> {
        self.llcx.void_type()
    }

    /// Create a function type.
    pub fn type_func(
        &self,
        args: &[inkwell::types::BasicMetadataTypeEnum<'ll>],
        ret: BasicTypeEnum<'ll>,
    ) -> FunctionType<'ll> {
        ret.fn_type(args, false)
    }

    /// Create a void function type.
    pub fn type_void_func(
        &self,
        args: &[inkwell::types::BasicMetadataTypeEnum<'ll>],
    ) -> FunctionType<'ll> {
        self.type_void().fn_type(args, false)
    }

    // -- Aggregate registry --

    /// Declare (or retrieve) a named aggregate without a body.
    pub fn declare_type(&self, name: &str) -> TypeHandle<'ll> {
        self.registry.borrow_mut().declare(self.llcx, name)
    }

    /// Assign the body of a declared aggregate, exactly once.
    pub fn define_type(
        &self,
        handle: TypeHandle<'ll>,
        fields: Vec<FieldDef<'ll>>,
    ) -> Result<(), LayoutError> {
        self.registry.borrow_mut().define(handle, fields)
    }

    /// Resolve a previously declared aggregate by name.
    pub fn resolve_type(&self, name: &str) -> Result<TypeHandle<'ll>, LayoutError> {
        self.registry.borrow().resolve(name)
    }

    /// The schema a body was assigned from (cloned out of the registry cell).
    pub fn type_schema(&self, name: &str) -> Result<StructSchema<'ll>, LayoutError> {
        self.registry.borrow().schema(name).cloned()
    }

    /// Index of a named field in a defined aggregate.
    pub fn field_index(&self, type_name: &str, field: &str) -> Result<u32, LayoutError> {
        self.registry.borrow().field_index(type_name, field)
    }

    /// Callback signature carried by a dispatch-slot field, if any.
    pub fn slot_signature(
        &self,
        type_name: &str,
        field: &str,
    ) -> Result<Option<FunctionType<'ll>>, LayoutError> {
        self.registry.borrow().slot_signature(type_name, field)
    }

    // -- Globals --

    /// Declare a global without an initializer, or return the existing one.
    pub fn declare_global(&self, name: &str, ty: BasicTypeEnum<'ll>) -> GlobalValue<'ll> {
        if let Some(global) = self.llmod.get_global(name) {
            return global;
        }
        self.llmod.add_global(ty, None, name)
    }

    /// Declare a global of a named struct type, or return the existing one.
    pub fn declare_struct_global(&self, name: &str, ty: StructType<'ll>) -> GlobalValue<'ll> {
        if let Some(global) = self.llmod.get_global(name) {
            return global;
        }
        self.llmod.add_global(ty, None, name)
    }

    /// Define a global with an initializer.
    pub fn define_global(
        &self,
        name: &str,
        ty: BasicTypeEnum<'ll>,
        initializer: BasicValueEnum<'ll>,
    ) -> GlobalValue<'ll> {
        let global = self.declare_global(name, ty);
        global.set_initializer(&initializer);
        global
    }

    /// Materialize a NUL-terminated byte string as a private constant global.
    ///
    /// Symbol names derive from `label`, so identical labels reuse the same
    /// global and regeneration stays deterministic.
    pub fn define_cstring(&self, label: &str, bytes: &[u8]) -> GlobalValue<'ll> {
        let symbol = format!(".str.{label}");
        if let Some(global) = self.llmod.get_global(&symbol) {
            return global;
        }

        let initializer = self.llcx.const_string(bytes, true);
        let global = self
            .llmod
            .add_global(initializer.get_type(), None, &symbol);
        global.set_initializer(&initializer);
        global.set_constant(true);
        global.set_linkage(Linkage::Private);
        global
    }

    // -- Finalization --

    /// Verify the module and render it to its textual form.
    ///
    /// This is the only exit: a module that fails verification never leaves
    /// the generator.
    pub fn finish(&self) -> Result<String, LayoutError> {
        self.llmod
            .verify()
            .map_err(|message| LayoutError::InvalidModule {
                message: message.to_string(),
            })?;
        Ok(self.llmod.print_to_string().to_string())
    }
}
