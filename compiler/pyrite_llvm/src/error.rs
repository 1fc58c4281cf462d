//! Generation-time error reporting.
//!
//! Every failure in this crate happens while the object-model module is being
//! constructed; there is no runtime phase. None of these errors are
//! recoverable mid-pass — each aborts generation and names the offending
//! structure or field so the operator can find the bad declaration. Either
//! the full module is produced and internally consistent, or generation
//! fails before any artifact is handed out.

use std::fmt;

/// Error type for object-model generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A type name was resolved without ever being declared.
    UnknownType { name: String },
    /// A struct body was assigned twice.
    DuplicateDefinition { name: String },
    /// A field embeds a still-opaque aggregate by value.
    ///
    /// Pointer fields may reference undefined aggregates (that is the point
    /// of two-phase declaration), but a by-value field needs a complete
    /// layout before the owner's body can be computed.
    IncompleteEmbeddedType { owner: String, field: String },
    /// A layout query was made against a declared type whose body was never
    /// assigned.
    UndefinedBody { name: String },
    /// A field index past the structure's declared arity.
    IndexOutOfRange { owner: String, index: u32, arity: u32 },
    /// A field name that does not appear in the structure's schema.
    UnknownField { owner: String, field: String },
    /// A descriptor instance points at a global symbol that has not been
    /// reserved yet.
    ///
    /// Self-referential instances must reserve their symbol before the
    /// initializer is built; a dangling name here means that step was
    /// skipped or misspelled.
    UnresolvedSelfReference { name: String },
    /// The finished module failed LLVM verification.
    InvalidModule { message: String },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType { name } => {
                write!(f, "unknown type '{name}': never declared")
            }
            Self::DuplicateDefinition { name } => {
                write!(f, "duplicate definition of '{name}': body already assigned")
            }
            Self::IncompleteEmbeddedType { owner, field } => {
                write!(
                    f,
                    "field '{field}' of '{owner}' embeds an aggregate whose body \
                     is not defined yet"
                )
            }
            Self::UndefinedBody { name } => {
                write!(f, "type '{name}' is declared but its body is not defined")
            }
            Self::IndexOutOfRange {
                owner,
                index,
                arity,
            } => {
                write!(
                    f,
                    "field index {index} out of range for '{owner}' (arity {arity})"
                )
            }
            Self::UnknownField { owner, field } => {
                write!(f, "'{owner}' has no field named '{field}'")
            }
            Self::UnresolvedSelfReference { name } => {
                write!(
                    f,
                    "global '{name}' referenced before its symbol was reserved"
                )
            }
            Self::InvalidModule { message } => {
                write!(f, "module verification failed: {message}")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_the_offender() {
        let err = LayoutError::UnknownType {
            name: "PyObject".to_string(),
        };
        assert!(err.to_string().contains("PyObject"));

        let err = LayoutError::IndexOutOfRange {
            owner: "PyTypeObject".to_string(),
            index: 99,
            arity: 49,
        };
        let msg = err.to_string();
        assert!(msg.contains("PyTypeObject"));
        assert!(msg.contains("99"));
        assert!(msg.contains("49"));

        let err = LayoutError::IncompleteEmbeddedType {
            owner: "PyVarObject".to_string(),
            field: "ob_base".to_string(),
        };
        assert!(err.to_string().contains("ob_base"));
    }
}
