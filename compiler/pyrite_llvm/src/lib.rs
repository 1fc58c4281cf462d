//! Object-model ABI generator for the Pyrite compiler
//!
//! This crate emits the LLVM module that defines the in-memory layout and
//! dispatch tables of Pyrite's object runtime. The binary interface —
//! field order, field widths, function-pointer slot positions — is fixed by
//! an external specification this generator does not control; the module it
//! produces must match that foreign ABI bit for bit so generated code can
//! allocate, initialize, and inspect objects exactly as the original
//! runtime would.
//!
//! # Architecture
//!
//! Generation is a single synchronous pass:
//!
//! 1. [`SlotSignatures`](signatures::SlotSignatures) — the catalog of
//!    dispatch-slot callback types, built once per context.
//! 2. [`ObjectModel`](object_model::ObjectModel) — declares every aggregate
//!    as an opaque named struct, then assigns bodies (the two-phase dance
//!    that resolves the header ↔ type-descriptor cycle).
//! 3. [`offsets`] — field offsets and sizes derived from the declared
//!    layouts via null-base GEP constants; no hand-maintained offset table.
//! 4. [`descriptors`] — the static `PyType_Type` / `PyBaseObject_Type`
//!    instances with their reflective member tables, self-references wired
//!    through reserved symbols.
//! 5. [`validate`] — pins the computed layout to the foreign
//!    specification's published LP64 reference before the artifact leaves.
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=pyrite_llvm=debug`: trace aggregate definition and
//!   descriptor emission.
//! - `RUST_LOG=pyrite_llvm=trace`: per-field/per-member detail.
//!
//! # Example
//!
//! ```ignore
//! use inkwell::context::Context;
//! use pyrite_llvm::{GenCx, ObjectModel, SlotSignatures, TargetConfig};
//!
//! let context = Context::create();
//! let cx = GenCx::new(&context, "pyrite_object_model");
//! TargetConfig::native()?.configure_module(&cx.llmod)?;
//!
//! let sigs = SlotSignatures::new(&cx);
//! let model = ObjectModel::define(&cx, &sigs)?;
//! pyrite_llvm::descriptors::emit_foundation(&cx, &model)?;
//!
//! let ir = cx.finish()?;
//! ```

// Crate-level lint configuration for codegen-specific patterns
#![allow(
    // LLVM uses u32 for struct/array indices and u64 for constants
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    // Generator entry points thread the context through many helpers
    clippy::too_many_arguments,
)]

pub mod context;
pub mod descriptors;
pub mod error;
pub mod object_model;
pub mod offsets;
pub mod primitives;
pub mod registry;
pub mod signatures;
pub mod target;
pub mod validate;

pub use context::GenCx;
pub use descriptors::{
    Foundation, GetSetSpec, MemberFlags, MemberKind, MemberSpec, MethodFlags, MethodSpec,
    TypeDescriptorSpec, TypeFlags, TypePointer,
};
pub use error::LayoutError;
pub use object_model::ObjectModel;
pub use registry::{FieldDef, StructSchema, TypeHandle, TypeRegistry};
pub use signatures::SlotSignatures;
pub use target::{TargetConfig, TargetError};
pub use validate::{ValidateError, verify_layout};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=pyrite_llvm=debug` or `RUST_LOG=pyrite_llvm=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
