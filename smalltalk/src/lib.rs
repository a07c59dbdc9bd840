pub mod activation;
pub mod ast;
pub mod code;
pub mod codegen;
pub mod compile;
pub mod demos;
pub mod error;
pub mod interpreter;
pub mod literals;
pub mod object;
pub mod prelude;
pub mod primitives;
pub mod scope;
pub mod special;
pub mod trace;

pub use ast::{BlockExpr, Body, ClassDef, Expr, MainBody, MethodDef, Program, Stat};
pub use compile::{CompiledClass, CompiledProgram, Compiler, CompilerOptions};
pub use error::{CompileError, VmError, VmErrorKind};
pub use interpreter::{VM, VmOptions};
pub use object::Value;
pub use primitives::transcript::Transcript;
