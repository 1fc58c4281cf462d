//! Target configuration for layout computation.
//!
//! The null-base offset technique yields whatever the module's data layout
//! says, so the generated module must carry a real target triple and data
//! layout before its offsets mean anything. This module wraps LLVM target
//! initialization and target-machine creation for the native host — the
//! only target the generator needs, since the layout cross-check in
//! `validate` pins the result to the foreign specification's LP64 table.

use std::fmt;
use std::sync::Once;

use inkwell::targets::{
    CodeModel, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
};
use inkwell::OptimizationLevel;

/// Error type for target configuration operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// Failed to initialize LLVM's native target.
    InitializationFailed(String),
    /// Failed to create a target machine.
    TargetMachineCreationFailed(String),
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => {
                write!(f, "failed to initialize LLVM target: {msg}")
            }
            Self::TargetMachineCreationFailed(msg) => {
                write!(f, "failed to create target machine: {msg}")
            }
        }
    }
}

impl std::error::Error for TargetError {}

/// Target configuration for the generation pass.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// The target triple string (e.g. "x86_64-unknown-linux-gnu").
    triple: String,
    /// Target CPU ("generic" unless overridden).
    cpu: String,
    /// CPU features string (empty = none).
    features: String,
}

impl TargetConfig {
    /// Create a target configuration for the native (host) target.
    ///
    /// # Errors
    ///
    /// Returns an error if LLVM target initialization fails.
    pub fn native() -> Result<Self, TargetError> {
        initialize_native_target()?;

        let triple = TargetMachine::get_default_triple();
        Ok(Self {
            triple: triple.as_str().to_string_lossy().to_string(),
            cpu: "generic".to_string(),
            features: String::new(),
        })
    }

    /// Get the target triple string.
    #[must_use]
    pub fn triple(&self) -> &str {
        &self.triple
    }

    /// Pointer size in bytes for this target.
    #[must_use]
    pub fn pointer_size(&self) -> u32 {
        match self.triple.split('-').next().unwrap_or("") {
            "wasm32" | "i686" | "i386" | "arm" => 4,
            _ => 8,
        }
    }

    /// Create an LLVM `TargetMachine` for this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if LLVM cannot create a target machine for the
    /// configured triple.
    pub fn create_target_machine(&self) -> Result<TargetMachine, TargetError> {
        let target_triple = TargetTriple::create(&self.triple);

        let target = Target::from_triple(&target_triple).map_err(|e| {
            TargetError::TargetMachineCreationFailed(format!("failed to get target: {e}"))
        })?;

        target
            .create_target_machine(
                &target_triple,
                &self.cpu,
                &self.features,
                OptimizationLevel::None,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or_else(|| {
                TargetError::TargetMachineCreationFailed(format!(
                    "LLVM returned None for target '{}' with CPU '{}'",
                    self.triple, self.cpu
                ))
            })
    }

    /// Configure an LLVM module with the target triple and data layout.
    ///
    /// Both are required before any computed offset is meaningful.
    ///
    /// # Errors
    ///
    /// Returns an error if the target machine cannot be created.
    pub fn configure_module(
        &self,
        module: &inkwell::module::Module<'_>,
    ) -> Result<(), TargetError> {
        let machine = self.create_target_machine()?;

        module.set_triple(&TargetTriple::create(&self.triple));
        module.set_data_layout(&machine.get_target_data().get_data_layout());

        Ok(())
    }
}

static NATIVE_TARGET_INIT: Once = Once::new();

/// Initialize the native LLVM target.
///
/// Safe to call multiple times; initialization happens once.
fn initialize_native_target() -> Result<(), TargetError> {
    let mut result = Ok(());

    NATIVE_TARGET_INIT.call_once(|| {
        if let Err(e) = Target::initialize_native(&InitializationConfig::default()) {
            result = Err(TargetError::InitializationFailed(e.clone()));
        }
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_target_initializes() {
        let config = TargetConfig::native().unwrap();
        assert!(!config.triple().is_empty());
    }

    #[test]
    fn native_target_machine_is_creatable() {
        let config = TargetConfig::native().unwrap();
        let machine = config.create_target_machine().unwrap();
        let td = machine.get_target_data();
        assert_eq!(
            u64::from(td.get_pointer_byte_size(None)),
            u64::from(config.pointer_size())
        );
    }

    #[test]
    fn module_gets_triple_and_layout() {
        let context = inkwell::context::Context::create();
        let module = context.create_module("test_target");
        let config = TargetConfig::native().unwrap();

        config.configure_module(&module).unwrap();
        assert!(!module.get_triple().as_str().to_bytes().is_empty());
    }
}
