//! Dispatch-slot signature catalog.
//!
//! One `FunctionType` per protocol callback of the foreign ABI, built once
//! per context and shared by everything that declares or calls through a
//! slot. Centralizing these is what keeps two "binary operation" slots
//! typed identically — a slot implementation declared elsewhere against a
//! locally re-built signature would be a different `FunctionType` under the
//! context's identity rules.
//!
//! Under LLVM's opaque pointers the *laid-out* slot field is always `ptr`;
//! these signatures are the authority for declaring slot functions and for
//! typing indirect calls through a slot.
//!
//! Return-width conventions follow the foreign specification: status-code
//! callbacks (`inquiry`, `setattrfunc`, `initproc`, `sendfunc`,
//! `getbufferproc`) return i8, predicate/visit callbacks (`objobjproc`,
//! `visitproc`, `traverseproc`, `ssizeobjargproc`) return i64, and
//! size/hash callbacks return `Py_ssize_t` (i64).

use inkwell::types::FunctionType;

use crate::context::GenCx;

/// The catalog of protocol callback signatures.
///
/// Field names are the foreign ABI's typedef names so a slot's signature can
/// be found by the name the external specification uses for it.
pub struct SlotSignatures<'ll> {
    /// `object -> object` (negation, repr of a value, `am_await`, ...).
    pub unaryfunc: FunctionType<'ll>,
    /// `(object, object) -> object` (arithmetic, subscript, concat, ...).
    pub binaryfunc: FunctionType<'ll>,
    /// `(object, object, object) -> object` (power, call).
    pub ternaryfunc: FunctionType<'ll>,
    /// `(object, ssize) -> object` (item access, repeat).
    pub ssizeargfunc: FunctionType<'ll>,
    /// `(object, ssize) -> status` (item assignment).
    pub ssizeobjargproc: FunctionType<'ll>,
    /// `(object, object) -> status` (containment).
    pub objobjproc: FunctionType<'ll>,
    /// `(object, object, object) -> status` (subscript assignment).
    pub objobjargproc: FunctionType<'ll>,
    /// `(self, args) -> object` — the shape behind `ml_meth` entries.
    pub pycfunction: FunctionType<'ll>,
    /// `(object, object, object) -> i8` — 0 Return, -1 Error, 1 Next.
    pub sendfunc: FunctionType<'ll>,
    /// `object -> i8` (truth value, `tp_is_gc`, `tp_clear`).
    pub inquiry: FunctionType<'ll>,
    /// `object -> void` (`tp_dealloc`, `tp_del`, `tp_finalize`).
    pub destructor: FunctionType<'ll>,
    /// `object -> object` (`tp_repr`, `tp_str`).
    pub reprfunc: FunctionType<'ll>,
    /// `object -> ssize` (`tp_hash`).
    pub hashfunc: FunctionType<'ll>,
    /// `(object, char*) -> object` (`tp_getattr`).
    pub getattrfunc: FunctionType<'ll>,
    /// `(object, object) -> object` (`tp_getattro`).
    pub getattrofunc: FunctionType<'ll>,
    /// `(object, char*, object) -> i8` (`tp_setattr`).
    pub setattrfunc: FunctionType<'ll>,
    /// `(object, object) -> object` (`tp_setattro`).
    pub setattrofunc: FunctionType<'ll>,
    /// `(object, closure) -> object` (`PyGetSetDef.get`).
    pub getter: FunctionType<'ll>,
    /// `(object, value, closure) -> i8` (`PyGetSetDef.set`).
    pub setter: FunctionType<'ll>,
    /// `(object, arg) -> status` — the visitor passed to `tp_traverse`.
    pub visitproc: FunctionType<'ll>,
    /// `(object, visit, arg) -> status` (`tp_traverse`).
    pub traverseproc: FunctionType<'ll>,
    /// `(object, object, op) -> object` (`tp_richcompare`).
    pub richcmpfunc: FunctionType<'ll>,
    /// `object -> object` (`tp_iter`).
    pub getiterfunc: FunctionType<'ll>,
    /// `object -> object` (`tp_iternext`).
    pub iternextfunc: FunctionType<'ll>,
    /// `object -> ssize` (`sq_length`, `mp_length`).
    pub lenfunc: FunctionType<'ll>,
    /// `(descr, obj, type) -> object` (`tp_descr_get`).
    pub descrgetfunc: FunctionType<'ll>,
    /// `(descr, obj, value) -> object` (`tp_descr_set`).
    pub descrsetfunc: FunctionType<'ll>,
    /// `(self, args, kwargs) -> i8` — 0 on success, -1 on exception.
    pub initproc: FunctionType<'ll>,
    /// `(type, nitems) -> object` (`tp_alloc`).
    pub allocfunc: FunctionType<'ll>,
    /// `(type, args, kwargs) -> object` (`tp_new`).
    pub newfunc: FunctionType<'ll>,
    /// `void* -> void` (`tp_free`).
    pub freefunc: FunctionType<'ll>,
    /// `(exporter, view, flags) -> i8` (`bf_getbuffer`).
    pub getbufferproc: FunctionType<'ll>,
    /// `(exporter, view) -> void` (`bf_releasebuffer`).
    pub releasebufferproc: FunctionType<'ll>,
    /// `(callable, args, nargsf, kwnames) -> object` (`tp_vectorcall`).
    pub vectorcallfunc: FunctionType<'ll>,
}

impl<'ll> SlotSignatures<'ll> {
    /// Build the catalog against a generation context.
    #[must_use]
    pub fn new(cx: &GenCx<'ll>) -> Self {
        let obj = cx.type_ptr();
        let ssize = cx.ssize_ty;
        let i8t = cx.type_i8();
        let i64t = cx.type_i64();

        let object: inkwell::types::BasicTypeEnum<'ll> = obj.into();

        Self {
            unaryfunc: cx.type_func(&[obj.into()], object),
            binaryfunc: cx.type_func(&[obj.into(), obj.into()], object),
            ternaryfunc: cx.type_func(&[obj.into(), obj.into(), obj.into()], object),
            ssizeargfunc: cx.type_func(&[obj.into(), ssize.into()], object),
            ssizeobjargproc: cx.type_func(&[obj.into(), ssize.into()], i64t.into()),
            objobjproc: cx.type_func(&[obj.into(), obj.into()], i64t.into()),
            objobjargproc: cx.type_func(&[obj.into(), obj.into(), obj.into()], i64t.into()),
            pycfunction: cx.type_func(&[obj.into(), obj.into()], object),
            sendfunc: cx.type_func(&[obj.into(), obj.into(), obj.into()], i8t.into()),
            inquiry: cx.type_func(&[obj.into()], i8t.into()),
            destructor: cx.type_void_func(&[obj.into()]),
            reprfunc: cx.type_func(&[obj.into()], object),
            hashfunc: cx.type_func(&[obj.into()], ssize.into()),
            getattrfunc: cx.type_func(&[obj.into(), obj.into()], object),
            getattrofunc: cx.type_func(&[obj.into(), obj.into()], object),
            setattrfunc: cx.type_func(&[obj.into(), obj.into(), obj.into()], i8t.into()),
            setattrofunc: cx.type_func(&[obj.into(), obj.into()], object),
            getter: cx.type_func(&[obj.into(), obj.into()], object),
            setter: cx.type_func(&[obj.into(), obj.into(), obj.into()], i8t.into()),
            visitproc: cx.type_func(&[obj.into(), obj.into()], i64t.into()),
            traverseproc: cx.type_func(&[obj.into(), obj.into(), obj.into()], i64t.into()),
            richcmpfunc: cx.type_func(&[obj.into(), obj.into(), i8t.into()], object),
            getiterfunc: cx.type_func(&[obj.into()], object),
            iternextfunc: cx.type_func(&[obj.into()], object),
            lenfunc: cx.type_func(&[obj.into()], ssize.into()),
            descrgetfunc: cx.type_func(&[obj.into(), obj.into(), obj.into()], object),
            descrsetfunc: cx.type_func(&[obj.into(), obj.into(), obj.into()], object),
            initproc: cx.type_func(&[obj.into(), obj.into(), obj.into()], i8t.into()),
            allocfunc: cx.type_func(&[obj.into(), ssize.into()], object),
            newfunc: cx.type_func(&[obj.into(), obj.into(), obj.into()], object),
            freefunc: cx.type_void_func(&[obj.into()]),
            getbufferproc: cx.type_func(&[obj.into(), obj.into(), i8t.into()], i8t.into()),
            releasebufferproc: cx.type_void_func(&[obj.into(), obj.into()]),
            vectorcallfunc: cx.type_func(
                &[obj.into(), obj.into(), ssize.into(), obj.into()],
                object,
            ),
        }
    }

    /// Look up a signature by its foreign typedef name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<FunctionType<'ll>> {
        Some(match name {
            "unaryfunc" => self.unaryfunc,
            "binaryfunc" => self.binaryfunc,
            "ternaryfunc" => self.ternaryfunc,
            "ssizeargfunc" => self.ssizeargfunc,
            "ssizeobjargproc" => self.ssizeobjargproc,
            "objobjproc" => self.objobjproc,
            "objobjargproc" => self.objobjargproc,
            "pycfunction" => self.pycfunction,
            "sendfunc" => self.sendfunc,
            "inquiry" => self.inquiry,
            "destructor" => self.destructor,
            "reprfunc" => self.reprfunc,
            "hashfunc" => self.hashfunc,
            "getattrfunc" => self.getattrfunc,
            "getattrofunc" => self.getattrofunc,
            "setattrfunc" => self.setattrfunc,
            "setattrofunc" => self.setattrofunc,
            "getter" => self.getter,
            "setter" => self.setter,
            "visitproc" => self.visitproc,
            "traverseproc" => self.traverseproc,
            "richcmpfunc" => self.richcmpfunc,
            "getiterfunc" => self.getiterfunc,
            "iternextfunc" => self.iternextfunc,
            "lenfunc" => self.lenfunc,
            "descrgetfunc" => self.descrgetfunc,
            "descrsetfunc" => self.descrsetfunc,
            "initproc" => self.initproc,
            "allocfunc" => self.allocfunc,
            "newfunc" => self.newfunc,
            "freefunc" => self.freefunc,
            "getbufferproc" => self.getbufferproc,
            "releasebufferproc" => self.releasebufferproc,
            "vectorcallfunc" => self.vectorcallfunc,
            _ => return None,
        })
    }
}
