//! The compiler driver: prelude, resolution, then code generation.

use std::fmt::Write as _;
use std::rc::Rc;

use crate::ast::Program;
use crate::code::CompiledBlock;
use crate::codegen::CodeGenerator;
use crate::error::CompileError;
use crate::prelude;
use crate::scope;

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Emit `dbg` markers and put the file name in every literal pool.
    pub debug_info: bool,
    pub file_name: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            debug_info: true,
            file_name: "<string>".to_string(),
        }
    }
}

/// Compiled form of one class, ready to be installed in a VM.
#[derive(Debug)]
pub struct CompiledClass {
    pub name: String,
    pub superclass: Option<String>,
    /// Fields defined directly by this class.
    pub fields: Vec<String>,
    pub methods: Vec<Rc<CompiledBlock>>,
}

impl CompiledClass {
    pub fn method(&self, selector: &str) -> Option<&Rc<CompiledBlock>> {
        self.methods.iter().find(|m| m.name == selector)
    }

    pub fn to_test_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "name: {}", self.name);
        let _ = writeln!(out, "superClass: {}", self.superclass.as_deref().unwrap_or(""));
        let _ = writeln!(out, "fields: {}", self.fields.join(","));
        out.push_str("methods:\n");
        for method in &self.methods {
            for line in method.to_test_string().lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        out
    }
}

/// Classes in definition order, superclasses first.
#[derive(Debug, Default)]
pub struct CompiledProgram {
    pub classes: Vec<CompiledClass>,
    pub warnings: Vec<String>,
}

impl CompiledProgram {
    pub fn class(&self, name: &str) -> Option<&CompiledClass> {
        self.classes.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile `program` on top of the standard class library.
    pub fn compile(&self, mut program: Program) -> Result<CompiledProgram, CompileError> {
        let mut classes = prelude::classes();
        classes.append(&mut program.classes);
        program.classes = classes;
        self.compile_bare(program)
    }

    /// Compile `program` alone; it must define every class it uses.
    pub fn compile_bare(&self, mut program: Program) -> Result<CompiledProgram, CompileError> {
        let tree = scope::resolve(&mut program)?;
        let mut generator = CodeGenerator::new(&tree, &self.options);
        let mut classes = Vec::with_capacity(program.classes.len() + 1);
        for class in &program.classes {
            classes.push(generator.class(class)?);
        }
        if let Some(main) = &program.main {
            classes.push(generator.main(main)?);
        }
        let warnings = generator.into_warnings();
        log::debug!(
            "compiled {} classes with {} warning(s)",
            classes.len(),
            warnings.len()
        );
        Ok(CompiledProgram { classes, warnings })
    }
}
