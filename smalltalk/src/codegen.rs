//! Bytecode generation from a resolved program tree.
//!
//! The generator keeps a stack of code frames, one per method or block being
//! compiled. Each frame owns its builder and literal pool; nested blocks of a
//! method are collected into the method's block table by index.

use std::rc::Rc;

use bytecode::BytecodeBuilder;

use crate::ast::{BlockExpr, ClassDef, Expr, Ident, Literal, MainBody, MethodDef, MethodKind, Pos, Stat, Symbol};
use crate::code::CompiledBlock;
use crate::compile::{CompiledClass, CompilerOptions};
use crate::error::CompileError;
use crate::literals::LiteralPool;
use crate::primitives::Primitive;
use crate::scope::{MAIN_CLASS, ROOT_CLASS, ScopeId, ScopeTree};

/// Literal index of the source file name in every pool when debug info is on.
const FILE_LITERAL: u16 = 0;

struct CodeFrame {
    scope: ScopeId,
    builder: BytecodeBuilder,
    literals: LiteralPool,
}

pub struct CodeGenerator<'a> {
    tree: &'a ScopeTree,
    options: &'a CompilerOptions,
    frames: Vec<CodeFrame>,
    /// Nested-block table of the method being compiled.
    blocks: Vec<Option<Rc<CompiledBlock>>>,
    warnings: Vec<String>,
}

fn short(what: &'static str, value: usize) -> Result<u16, CompileError> {
    u16::try_from(value).map_err(|_| CompileError::OperandOverflow { what, value })
}

impl<'a> CodeGenerator<'a> {
    pub fn new(tree: &'a ScopeTree, options: &'a CompilerOptions) -> Self {
        Self {
            tree,
            options,
            frames: Vec::new(),
            blocks: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Latent-defect diagnostics collected so far.
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }

    // ── Program units ───────────────────────────────────────────

    pub fn class(&mut self, class: &ClassDef) -> Result<CompiledClass, CompileError> {
        let methods = class
            .methods
            .iter()
            .map(|m| self.method(m))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledClass {
            name: class.name.clone(),
            superclass: class.superclass.clone(),
            fields: class.fields.clone(),
            methods,
        })
    }

    /// The implicit main body, wrapped in its own class. Unlike a method it
    /// answers the value of its last statement.
    pub fn main(&mut self, main: &MainBody) -> Result<CompiledClass, CompileError> {
        let scope = self.scope_of(main.scope, MAIN_CLASS)?;
        self.blocks.clear();
        let frame = self.in_frame(scope, |g| {
            g.stats(&main.body.stats)?;
            if main.body.is_empty() {
                g.emit()?.push_self();
            }
            g.dbg(main.body.end)?;
            g.emit()?.return_();
            Ok(())
        })?;
        let blocks = self.take_blocks(frame.scope)?;
        let method = Rc::new(self.finish(frame)?.with_blocks(blocks));
        log::debug!("compiled {}", method.qualified_name);
        Ok(CompiledClass {
            name: MAIN_CLASS.to_string(),
            superclass: Some(ROOT_CLASS.to_string()),
            fields: Vec::new(),
            methods: vec![method],
        })
    }

    fn method(&mut self, method: &MethodDef) -> Result<Rc<CompiledBlock>, CompileError> {
        let scope = self.scope_of(method.scope, &method.selector)?;
        let compiled = match &method.kind {
            MethodKind::Primitive(tag) => self.primitive_method(method, scope, tag)?,
            MethodKind::Code(body) => {
                self.blocks.clear();
                let frame = self.in_frame(scope, |g| {
                    g.stats(&body.stats)?;
                    g.dbg_end(body.end)?;
                    if !body.is_empty() {
                        g.emit()?.pop();
                    }
                    let builder = g.emit()?;
                    builder.push_self();
                    builder.return_();
                    Ok(())
                })?;
                let blocks = self.take_blocks(scope)?;
                self.finish(frame)?.with_blocks(blocks)
            }
        };
        let compiled = Rc::new(compiled.class_side(method.class_method));
        log::debug!("compiled {}", compiled.qualified_name);
        Ok(compiled)
    }

    /// No bytecode and no literals; the tag picks the native code.
    fn primitive_method(&self, method: &MethodDef, scope: ScopeId, tag: &str) -> Result<CompiledBlock, CompileError> {
        let qualified = self.qualified_name(scope)?;
        let primitive = Primitive::from_name(tag).ok_or_else(|| CompileError::UnknownPrimitive {
            tag: tag.to_string(),
            method: qualified.clone(),
        })?;
        if primitive.arity() != method.args.len() {
            return Err(CompileError::Malformed(format!(
                "{qualified} takes {} argument(s) but {tag} expects {}",
                method.args.len(),
                primitive.arity()
            )));
        }
        Ok(CompiledBlock::new(&method.selector, qualified, method.args.len(), method.locals.len())
            .with_primitive(primitive))
    }

    /// Compile a block literal into the method's table and emit the
    /// instruction that creates its closure.
    fn block(&mut self, block: &BlockExpr) -> Result<(), CompileError> {
        let scope = self.scope_of(block.scope, "block")?;
        let frame = self.in_frame(scope, |g| {
            g.stats(&block.body.stats)?;
            if block.body.is_empty() {
                g.emit()?.push_nil();
            }
            g.dbg_end(block.body.end)?;
            g.emit()?.block_return();
            Ok(())
        })?;
        let compiled = Rc::new(self.finish(frame)?);
        log::debug!("compiled {}", compiled.qualified_name);

        let idx = block.index as usize;
        if self.blocks.len() <= idx {
            self.blocks.resize(idx + 1, None);
        }
        if self.blocks[idx].is_some() {
            return Err(CompileError::Malformed(format!(
                "nested block index {idx} is used twice ({})",
                compiled.qualified_name
            )));
        }
        self.blocks[idx] = Some(compiled);
        self.emit()?.block(block.index);
        Ok(())
    }

    // ── Frames ──────────────────────────────────────────────────

    /// Run `f` with a fresh frame for `scope` on top; the frame is popped
    /// on every path and handed back on success.
    fn in_frame(
        &mut self,
        scope: ScopeId,
        f: impl FnOnce(&mut Self) -> Result<(), CompileError>,
    ) -> Result<CodeFrame, CompileError> {
        let mut literals = LiteralPool::new();
        if self.options.debug_info {
            literals.insert(&self.options.file_name)?;
        }
        self.frames.push(CodeFrame {
            scope,
            builder: BytecodeBuilder::new(),
            literals,
        });
        let result = f(self);
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| CompileError::Malformed("code frame stack underflow".to_string()))?;
        result.map(|()| frame)
    }

    fn finish(&self, frame: CodeFrame) -> Result<CompiledBlock, CompileError> {
        let scope = self
            .tree
            .get(frame.scope)
            .ok_or_else(|| CompileError::Unresolved(format!("scope {:?}", frame.scope)))?;
        let qualified = self.qualified_name(frame.scope)?;
        let nlocals = scope.vars.len() - scope.nargs;
        Ok(CompiledBlock::new(&scope.name, qualified, scope.nargs, nlocals)
            .with_code(frame.builder.into_bytes(), frame.literals.into_vec()))
    }

    fn take_blocks(&mut self, scope: ScopeId) -> Result<Vec<Rc<CompiledBlock>>, CompileError> {
        let qualified = self.qualified_name(scope)?;
        std::mem::take(&mut self.blocks)
            .into_iter()
            .enumerate()
            .map(|(i, block)| {
                block.ok_or_else(|| {
                    CompileError::Malformed(format!("nested block {i} of {qualified} was never compiled"))
                })
            })
            .collect()
    }

    fn frame(&mut self) -> Result<&mut CodeFrame, CompileError> {
        self.frames
            .last_mut()
            .ok_or_else(|| CompileError::Malformed("code emitted outside of a method".to_string()))
    }

    fn emit(&mut self) -> Result<&mut BytecodeBuilder, CompileError> {
        Ok(&mut self.frame()?.builder)
    }

    fn literal(&mut self, s: &str) -> Result<u16, CompileError> {
        self.frame()?.literals.insert(s)
    }

    fn current_scope(&self) -> Result<ScopeId, CompileError> {
        self.frames
            .last()
            .map(|f| f.scope)
            .ok_or_else(|| CompileError::Malformed("no current scope".to_string()))
    }

    fn scope_of(&self, scope: Option<ScopeId>, what: &str) -> Result<ScopeId, CompileError> {
        scope.ok_or_else(|| CompileError::Unresolved(what.to_string()))
    }

    fn qualified_name(&self, scope: ScopeId) -> Result<String, CompileError> {
        self.tree
            .qualified_name(scope)
            .ok_or_else(|| CompileError::Unresolved(format!("scope {scope:?}")))
    }

    fn dbg(&mut self, pos: Pos) -> Result<(), CompileError> {
        if self.options.debug_info {
            self.emit()?.dbg(FILE_LITERAL, pos.line, pos.column);
        }
        Ok(())
    }

    /// End marker; points at the closing delimiter.
    fn dbg_end(&mut self, end: Pos) -> Result<(), CompileError> {
        self.dbg(Pos::new(end.line, end.column.saturating_sub(1)))
    }

    // ── Statements and expressions ──────────────────────────────

    /// Statements separated by `pop`; the last value stays on the stack.
    fn stats(&mut self, stats: &[Stat]) -> Result<(), CompileError> {
        let mut returned_at = None;
        for (i, stat) in stats.iter().enumerate() {
            if i > 0 {
                self.emit()?.pop();
            }
            if let Some(pos) = returned_at.take() {
                let scope = self.current_scope()?;
                let warning = format!(
                    "{}: statements after the return at {pos} are unreachable",
                    self.qualified_name(scope)?
                );
                log::warn!("{warning}");
                self.warnings.push(warning);
            }
            self.stat(stat)?;
            if let Stat::Return { pos, .. } = stat {
                returned_at = Some(*pos);
            }
        }
        Ok(())
    }

    fn stat(&mut self, stat: &Stat) -> Result<(), CompileError> {
        match stat {
            Stat::Expr(value) => self.expr(value),
            Stat::Assign { target, value, pos } => {
                self.dbg(*pos)?;
                self.expr(value)?;
                self.store(target)
            }
            Stat::Return { value, pos } => {
                self.expr(value)?;
                self.dbg(*pos)?;
                self.emit()?.return_();
                Ok(())
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Literal(literal) => self.literal_expr(literal),
            Expr::SelfRef => {
                self.emit()?.push_self();
                Ok(())
            }
            Expr::Ident(ident) => self.load(ident),
            Expr::Array(items) => {
                for item in items {
                    self.expr(item)?;
                }
                let count = short("array size", items.len())?;
                self.emit()?.push_array(count);
                Ok(())
            }
            Expr::Block(block) => self.block(block),
            Expr::Send(send) => {
                self.expr(&send.receiver)?;
                self.send(&send.selector, &send.args, send.selector_pos, false)
            }
            Expr::SuperSend(send) => {
                self.emit()?.push_self();
                self.send(&send.selector, &send.args, send.selector_pos, true)
            }
        }
    }

    /// Arguments, call-site marker, then the send itself. The receiver is
    /// already on the stack.
    fn send(&mut self, selector: &str, args: &[Expr], pos: Pos, is_super: bool) -> Result<(), CompileError> {
        for arg in args {
            self.expr(arg)?;
        }
        self.dbg(pos)?;
        let argc = short("argument count", args.len())?;
        let selector = self.literal(selector)?;
        let builder = self.emit()?;
        if is_super {
            builder.send_super(argc, selector);
        } else {
            builder.send(argc, selector);
        }
        Ok(())
    }

    fn literal_expr(&mut self, literal: &Literal) -> Result<(), CompileError> {
        match literal {
            Literal::Nil => self.emit()?.push_nil(),
            Literal::True => self.emit()?.push_true(),
            Literal::False => self.emit()?.push_false(),
            Literal::Int(v) => self.emit()?.push_int(*v),
            Literal::Float(v) => self.emit()?.push_float(*v),
            Literal::Char(c) => {
                let code = short("character code", *c as usize)?;
                self.emit()?.push_char(code);
            }
            Literal::Str(s) => {
                let idx = self.literal(s)?;
                self.emit()?.push_literal(idx);
            }
        }
        Ok(())
    }

    fn load(&mut self, ident: &Ident) -> Result<(), CompileError> {
        match ident.symbol {
            None | Some(Symbol::Global) => {
                let idx = self.literal(&ident.name)?;
                self.emit()?.push_global(idx);
            }
            Some(Symbol::Field(idx)) => self.emit()?.push_field(idx),
            Some(Symbol::Local { scope, slot }) => {
                let depth = self.depth_to(scope, ident)?;
                self.emit()?.push_local(depth, slot);
            }
        }
        Ok(())
    }

    /// Assignment leaves the value on the stack.
    fn store(&mut self, target: &Ident) -> Result<(), CompileError> {
        match target.symbol {
            Some(Symbol::Field(idx)) => self.emit()?.store_field(idx),
            Some(Symbol::Local { scope, slot }) => {
                let depth = self.depth_to(scope, target)?;
                self.emit()?.store_local(depth, slot);
            }
            None | Some(Symbol::Global) => {
                return Err(CompileError::InvalidAssignment {
                    name: target.name.clone(),
                    pos: target.pos,
                });
            }
        }
        Ok(())
    }

    /// Lexical hops from the current scope to the scope defining `ident`.
    fn depth_to(&self, owner: ScopeId, ident: &Ident) -> Result<u16, CompileError> {
        let current = self.current_scope()?;
        self.tree.relative_depth(current, owner).ok_or_else(|| {
            CompileError::Malformed(format!(
                "{} at {} is not visible from {}",
                ident.name,
                ident.pos,
                self.qualified_name(current).unwrap_or_default()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Body, MainBody, Program};
    use crate::compile::{CompiledProgram, Compiler};
    use bytecode::{BytecodeDecoder, Instruction};
    use proptest::prelude::*;

    fn instructions(block: &CompiledBlock) -> Vec<Instruction> {
        BytecodeDecoder::new(&block.bytecode).map(|i| i.unwrap()).collect()
    }

    fn compile(program: Program) -> CompiledProgram {
        Compiler::default().compile(program).unwrap()
    }

    fn compile_plain(program: Program) -> CompiledProgram {
        let options = CompilerOptions {
            debug_info: false,
            ..CompilerOptions::default()
        };
        Compiler::new(options).compile(program).unwrap()
    }

    fn method<'p>(program: &'p CompiledProgram, class: &str, selector: &str) -> &'p Rc<CompiledBlock> {
        program.class(class).unwrap().method(selector).unwrap()
    }

    fn with_method(method: MethodDef) -> Program {
        Program::new().with_class(ClassDef::new("T", None, &["f"]).method(method))
    }

    #[test]
    fn main_expression_disassembly() {
        let main = MainBody::new(
            &[],
            Body::new(vec![Stat::expr(Expr::int(3).send("+", vec![Expr::int(4)]).at(1, 2))]).ending_at(1, 5),
        );
        let program = compile(Program::new().with_main(main));
        let main = method(&program, MAIN_CLASS, "main");
        assert_eq!(main.literals, vec!["<string>", "+"]);
        assert_eq!(
            main.disassemble(),
            "0000:  push_int     3\n\
             0005:  push_int     4\n\
             0010:  dbg          '<string>', 1:2\n\
             0017:  send         1, '+'\n\
             0022:  dbg          '<string>', 1:5\n\
             0029:  return\n"
        );
    }

    #[test]
    fn debug_markers_in_methods_and_blocks() {
        // go: a [
        //     f := a.
        //     ^[:x | x] value: super hash
        // ]
        let identity = BlockExpr::new(&["x"], &[], Body::new(vec![Stat::expr(Expr::ident("x"))]).ending_at(3, 15));
        let body = Body::new(vec![
            Stat::assign("f", Expr::ident("a")).at(2, 4),
            Stat::ret(
                Expr::block(identity)
                    .send("value:", vec![Expr::super_send("hash", vec![]).at(3, 28)])
                    .at(3, 16),
            )
            .at(3, 4),
        ])
        .ending_at(4, 1);
        let program = compile(with_method(MethodDef::code("go:", &["a"], &[], body)));
        let go = method(&program, "T", "go:");
        assert_eq!(go.literals, vec!["<string>", "hash", "value:"]);
        assert_eq!(
            go.disassemble(),
            "0000:  dbg          '<string>', 2:4\n\
             0007:  push_local   0, 0\n\
             0012:  store_field  #0\n\
             0015:  pop\n\
             0016:  block        #0\n\
             0019:  self\n\
             0020:  dbg          '<string>', 3:28\n\
             0027:  send_super   0, 'hash'\n\
             0032:  dbg          '<string>', 3:16\n\
             0039:  send         1, 'value:'\n\
             0044:  dbg          '<string>', 3:4\n\
             0051:  return\n\
             0052:  dbg          '<string>', 4:0\n\
             0059:  pop\n\
             0060:  self\n\
             0061:  return\n"
        );

        let block = &go.blocks[0];
        assert_eq!(block.literals, vec!["<string>"]);
        assert_eq!(
            block.disassemble(),
            "0000:  push_local   0, 0\n\
             0005:  dbg          '<string>', 3:14\n\
             0012:  block_return\n"
        );
    }

    #[test]
    fn method_without_return_answers_self() {
        let program = compile_plain(with_method(MethodDef::code(
            "set",
            &[],
            &["x"],
            Body::new(vec![Stat::assign("x", Expr::int(1))]),
        )));
        assert_eq!(
            instructions(method(&program, "T", "set")),
            vec![
                Instruction::PushInt { value: 1 },
                Instruction::StoreLocal { depth: 0, slot: 0 },
                Instruction::Pop,
                Instruction::PushSelf,
                Instruction::Return,
            ]
        );

        let empty = compile_plain(with_method(MethodDef::code("nop", &[], &[], Body::empty())));
        assert_eq!(
            instructions(method(&empty, "T", "nop")),
            vec![Instruction::PushSelf, Instruction::Return]
        );
    }

    #[test]
    fn fields_globals_and_strings() {
        let program = compile_plain(with_method(MethodDef::code(
            "go",
            &[],
            &[],
            Body::new(vec![
                Stat::assign("f", Expr::string("a")),
                Stat::expr(Expr::ident("Transcript").send("show:", vec![Expr::string("a")])),
                Stat::ret(Expr::ident("f")),
            ]),
        )));
        let go = method(&program, "T", "go");
        assert_eq!(go.literals, vec!["a", "Transcript", "show:"]);
        assert_eq!(
            instructions(go),
            vec![
                Instruction::PushLiteral { idx: 0 },
                Instruction::StoreField { idx: 0 },
                Instruction::Pop,
                Instruction::PushGlobal { idx: 1 },
                Instruction::PushLiteral { idx: 0 },
                Instruction::Send { argc: 1, selector: 2 },
                Instruction::Pop,
                Instruction::PushField { idx: 0 },
                Instruction::Return,
                Instruction::Pop,
                Instruction::PushSelf,
                Instruction::Return,
            ]
        );
    }

    #[test]
    fn blocks_fill_the_method_table() {
        let inner = BlockExpr::new(&[], &[], Body::empty());
        let outer = BlockExpr::new(&["x"], &[], Body::new(vec![Stat::expr(Expr::block(inner))]));
        let program = compile_plain(with_method(MethodDef::code(
            "make",
            &[],
            &[],
            Body::new(vec![Stat::ret(Expr::block(outer))]),
        )));
        let make = method(&program, "T", "make");
        let names: Vec<&str> = make.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["make-block0", "make-block1"]);
        assert_eq!(make.blocks[1].qualified_name, "make-block0>>make-block1");
        assert!(make.blocks.iter().all(|b| b.blocks.is_empty()));
        assert_eq!(instructions(&make.blocks[0])[0], Instruction::Block { idx: 1 });
        assert_eq!(
            instructions(&make.blocks[1]),
            vec![Instruction::PushNil, Instruction::BlockReturn]
        );
        assert_eq!(make.blocks[0].nargs, 1);
    }

    #[test]
    fn super_send_pushes_self() {
        let program = compile_plain(with_method(MethodDef::code(
            "hash",
            &[],
            &[],
            Body::new(vec![Stat::ret(Expr::super_send("hash", vec![]))]),
        )));
        let code = instructions(method(&program, "T", "hash"));
        assert_eq!(code[0], Instruction::PushSelf);
        assert_eq!(code[1], Instruction::SendSuper { argc: 0, selector: 0 });
    }

    #[test]
    fn primitive_methods_have_no_code() {
        let program = compile(Program::new());
        let add = method(&program, "Integer", "+");
        assert!(add.bytecode.is_empty());
        assert!(add.literals.is_empty());
        assert_eq!(add.primitive, Some(Primitive::IntegerAdd));
        assert!(method(&program, "Object", "basicNew").is_class_method);
    }

    #[test]
    fn unknown_primitive_is_rejected() {
        let err = Compiler::default()
            .compile(with_method(MethodDef::primitive("go", &[], "T_GO")))
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownPrimitive { tag: "T_GO".into(), method: "T>>go".into() }
        );
    }

    #[test]
    fn assigning_a_global_is_rejected() {
        let err = Compiler::default()
            .compile(with_method(MethodDef::code(
                "go",
                &[],
                &[],
                Body::new(vec![Stat::assign("Transcript", Expr::nil()).at(3, 4)]),
            )))
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidAssignment { name: "Transcript".into(), pos: Pos::new(3, 4) }
        );
    }

    #[test]
    fn unreachable_statements_warn_but_compile() {
        let program = compile_plain(with_method(MethodDef::code(
            "go",
            &[],
            &[],
            Body::new(vec![Stat::ret(Expr::int(1)).at(2, 4), Stat::expr(Expr::int(2))]),
        )));
        assert_eq!(program.warnings.len(), 1);
        assert!(program.warnings[0].starts_with("T>>go:"));
        assert!(instructions(method(&program, "T", "go")).contains(&Instruction::PushInt { value: 2 }));
    }

    /// A method whose argument is read from inside `depth` nested blocks.
    fn nested_reference(depth: usize) -> Program {
        let mut body = Body::new(vec![Stat::expr(Expr::ident("a"))]);
        for _ in 0..depth {
            body = Body::new(vec![Stat::expr(Expr::block(BlockExpr::new(&[], &[], body)))]);
        }
        with_method(MethodDef::code("f:", &["a"], &[], body))
    }

    proptest! {
        #[test]
        fn local_depth_counts_enclosing_blocks(depth in 0usize..8) {
            let program = compile_plain(nested_reference(depth));
            let f = method(&program, "T", "f:");
            let innermost = if depth == 0 { f } else { &f.blocks[depth - 1] };
            let code = instructions(innermost);
            prop_assert_eq!(code[0], Instruction::PushLocal { depth: depth as u16, slot: 0 });
        }
    }
}
