use core::fmt;

use thiserror::Error;

use crate::ast::Pos;

/// Reasons the compiler rejects a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("redefinition of {name} in {scope}")]
    Redefinition { name: String, scope: String },

    #[error("class {class} extends undefined class {superclass}")]
    UnknownSuperclass { class: String, superclass: String },

    #[error("unknown primitive {tag} for {method}")]
    UnknownPrimitive { tag: String, method: String },

    #[error("cannot assign to {name} at {pos}: not a field or local")]
    InvalidAssignment { name: String, pos: Pos },

    #[error("{0} has no resolved scope")]
    Unresolved(String),

    #[error("malformed program: {0}")]
    Malformed(String),

    #[error("too many literals in {0}")]
    TooManyLiterals(String),

    #[error("{what} does not fit in a short operand ({value})")]
    OperandOverflow { what: &'static str, value: usize },
}

/// The distinct runtime conditions raised by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmErrorKind {
    MessageNotUnderstood,
    ClassMessageSentToInstance,
    BlockCannotReturn,
    StackUnderflow,
    UndefinedGlobal,
    MismatchedBlockArg,
    UnknownClass,
    UnknownField,
    TypeError,
    IndexOutOfRange,
    InternalVmError,
    /// Raised by user code through `error:`.
    Error,
}

impl VmErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::MessageNotUnderstood => "MessageNotUnderstood",
            Self::ClassMessageSentToInstance => "ClassMessageSentToInstance",
            Self::BlockCannotReturn => "BlockCannotReturn",
            Self::StackUnderflow => "StackUnderflow",
            Self::UndefinedGlobal => "UndefinedGlobal",
            Self::MismatchedBlockArg => "MismatchedBlockArg",
            Self::UnknownClass => "UnknownClass",
            Self::UnknownField => "UnknownField",
            Self::TypeError => "TypeError",
            Self::IndexOutOfRange => "IndexOutOfRange",
            Self::InternalVmError => "InternalVMException",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for VmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime failure together with the call stack at the point it was raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}\n{trace}")]
pub struct VmError {
    pub kind: VmErrorKind,
    pub message: String,
    pub trace: String,
}

impl VmError {
    pub fn new(kind: VmErrorKind, message: impl Into<String>, trace: String) -> Self {
        Self {
            kind,
            message: message.into(),
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_error_display_puts_trace_after_message() {
        let err = VmError::new(
            VmErrorKind::ClassMessageSentToInstance,
            "new is a class method sent to instance of Integer",
            "    at MainClass>>main\n".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "ClassMessageSentToInstance: new is a class method sent to instance of Integer\n    at MainClass>>main\n"
        );
    }

    #[test]
    fn compile_error_messages() {
        let err = CompileError::InvalidAssignment {
            name: "Transcript".into(),
            pos: Pos::new(2, 4),
        };
        assert_eq!(
            err.to_string(),
            "cannot assign to Transcript at 2:4: not a field or local"
        );
    }
}
