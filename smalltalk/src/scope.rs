//! Scope construction and name resolution.
//!
//! [`resolve`] walks a [`Program`] once, builds the [`ScopeTree`] and writes
//! the resolved annotations back into the tree nodes.

use std::collections::{HashMap, HashSet};

use crate::ast::{Body, BlockExpr, ClassDef, Expr, Ident, MethodKind, Program, Stat, Symbol};
use crate::error::CompileError;

pub const ROOT_CLASS: &str = "Object";
pub const MAIN_CLASS: &str = "MainClass";
pub const MAIN_SELECTOR: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Class,
    Method { class_method: bool },
    Block { index: u16 },
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Arguments first, then locals; the position is the slot.
    pub vars: Vec<String>,
    pub nargs: usize,
}

impl Scope {
    fn is_code(&self) -> bool {
        matches!(self.kind, ScopeKind::Method { .. } | ScopeKind::Block { .. })
    }

    fn slot_of(&self, name: &str) -> Option<u16> {
        self.vars.iter().position(|v| v == name).map(|i| i as u16)
    }
}

#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub const GLOBAL: ScopeId = ScopeId(0);

    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                name: "global".to_string(),
                kind: ScopeKind::Global,
                parent: None,
                vars: Vec::new(),
                nargs: 0,
            }],
        }
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// `Class>>selector` for methods, `selector>>selector-block0` for blocks.
    pub fn qualified_name(&self, id: ScopeId) -> Option<String> {
        let scope = self.get(id)?;
        match scope.parent.and_then(|p| self.get(p)) {
            Some(parent) if parent.kind != ScopeKind::Global => {
                Some(format!("{}>>{}", parent.name, scope.name))
            }
            _ => Some(scope.name.clone()),
        }
    }

    /// Number of parent hops from `from` up to `to`, or `None` when `to` does
    /// not enclose `from`.
    pub fn relative_depth(&self, from: ScopeId, to: ScopeId) -> Option<u16> {
        let mut depth: u16 = 0;
        let mut current = from;
        loop {
            if current == to {
                return Some(depth);
            }
            current = self.get(current)?.parent?;
            depth = depth.checked_add(1)?;
        }
    }

    fn add(&mut self, name: &str, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            name: name.to_string(),
            kind,
            parent: Some(parent),
            vars: Vec::new(),
            nargs: 0,
        });
        id
    }

    fn add_code_scope(
        &mut self,
        name: &str,
        kind: ScopeKind,
        parent: ScopeId,
        args: &[String],
        locals: &[String],
    ) -> Result<ScopeId, CompileError> {
        let id = self.add(name, kind, parent);
        for var in args.iter().chain(locals) {
            self.define_var(id, var)?;
        }
        self.scopes[id.0 as usize].nargs = args.len();
        Ok(id)
    }

    fn define_var(&mut self, id: ScopeId, name: &str) -> Result<(), CompileError> {
        let qualified = self.qualified_name(id).unwrap_or_default();
        let scope = &mut self.scopes[id.0 as usize];
        if scope.slot_of(name).is_some() {
            return Err(CompileError::Redefinition {
                name: name.to_string(),
                scope: qualified,
            });
        }
        if scope.vars.len() >= u16::MAX as usize {
            return Err(CompileError::OperandOverflow {
                what: "local slot",
                value: scope.vars.len(),
            });
        }
        scope.vars.push(name.to_string());
        Ok(())
    }
}

/// Define every class, method and block of `program` and annotate its tree.
///
/// Classes must be listed after their superclass. A class without an explicit
/// superclass extends `Object`. The main body becomes `MainClass>>main`.
pub fn resolve(program: &mut Program) -> Result<ScopeTree, CompileError> {
    let mut tree = ScopeTree::new();
    let mut layouts: HashMap<String, Vec<String>> = HashMap::new();

    for class in &mut program.classes {
        define_class(&mut tree, &mut layouts, class)?;
    }

    if let Some(main) = &mut program.main {
        if layouts.contains_key(MAIN_CLASS) {
            return Err(CompileError::Redefinition {
                name: MAIN_CLASS.to_string(),
                scope: "global".to_string(),
            });
        }
        let fields = layouts.get(ROOT_CLASS).cloned().unwrap_or_default();
        let class_scope = tree.add(MAIN_CLASS, ScopeKind::Class, ScopeTree::GLOBAL);
        let method = tree.add_code_scope(
            MAIN_SELECTOR,
            ScopeKind::Method { class_method: false },
            class_scope,
            &[],
            &main.locals,
        )?;
        main.scope = Some(method);
        Resolver::new(&mut tree, &fields, MAIN_SELECTOR).body(&mut main.body, method)?;
    }

    Ok(tree)
}

fn define_class(
    tree: &mut ScopeTree,
    layouts: &mut HashMap<String, Vec<String>>,
    class: &mut ClassDef,
) -> Result<(), CompileError> {
    if layouts.contains_key(&class.name) {
        return Err(CompileError::Redefinition {
            name: class.name.clone(),
            scope: "global".to_string(),
        });
    }
    if class.superclass.is_none() && class.name != ROOT_CLASS {
        class.superclass = Some(ROOT_CLASS.to_string());
    }

    let mut fields = match &class.superclass {
        Some(superclass) => layouts.get(superclass).cloned().ok_or_else(|| {
            CompileError::UnknownSuperclass {
                class: class.name.clone(),
                superclass: superclass.clone(),
            }
        })?,
        None => Vec::new(),
    };
    for field in &class.fields {
        if fields.contains(field) {
            return Err(CompileError::Redefinition {
                name: field.clone(),
                scope: class.name.clone(),
            });
        }
        fields.push(field.clone());
    }
    if fields.len() > u16::MAX as usize {
        return Err(CompileError::OperandOverflow {
            what: "field index",
            value: fields.len(),
        });
    }

    let class_scope = tree.add(&class.name, ScopeKind::Class, ScopeTree::GLOBAL);
    class.scope = Some(class_scope);

    let mut selectors = HashSet::new();
    for method in &mut class.methods {
        if !selectors.insert(method.selector.clone()) {
            return Err(CompileError::Redefinition {
                name: method.selector.clone(),
                scope: class.name.clone(),
            });
        }
        let scope = tree.add_code_scope(
            &method.selector,
            ScopeKind::Method {
                class_method: method.class_method,
            },
            class_scope,
            &method.args,
            &method.locals,
        )?;
        method.scope = Some(scope);
        if let MethodKind::Code(body) = &mut method.kind {
            Resolver::new(tree, &fields, &method.selector).body(body, scope)?;
        }
    }

    log::debug!("defined class {} with fields {:?}", class.name, fields);
    layouts.insert(class.name.clone(), fields);
    Ok(())
}

/// Per-method walk that annotates identifiers and numbers nested blocks.
struct Resolver<'a> {
    tree: &'a mut ScopeTree,
    fields: &'a [String],
    selector: &'a str,
    next_block: u16,
}

impl<'a> Resolver<'a> {
    fn new(tree: &'a mut ScopeTree, fields: &'a [String], selector: &'a str) -> Self {
        Self {
            tree,
            fields,
            selector,
            next_block: 0,
        }
    }

    fn body(&mut self, body: &mut Body, scope: ScopeId) -> Result<(), CompileError> {
        for stat in &mut body.stats {
            self.stat(stat, scope)?;
        }
        Ok(())
    }

    fn stat(&mut self, stat: &mut Stat, scope: ScopeId) -> Result<(), CompileError> {
        match stat {
            Stat::Expr(value) | Stat::Return { value, .. } => self.expr(value, scope),
            Stat::Assign { target, value, .. } => {
                self.expr(value, scope)?;
                self.ident(target, scope);
                Ok(())
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr, scope: ScopeId) -> Result<(), CompileError> {
        match expr {
            Expr::Literal(_) | Expr::SelfRef => Ok(()),
            Expr::Ident(ident) => {
                self.ident(ident, scope);
                Ok(())
            }
            Expr::Array(items) => items.iter_mut().try_for_each(|e| self.expr(e, scope)),
            Expr::Block(block) => self.block(block, scope),
            Expr::Send(send) => {
                self.expr(&mut send.receiver, scope)?;
                send.args.iter_mut().try_for_each(|e| self.expr(e, scope))
            }
            Expr::SuperSend(send) => send.args.iter_mut().try_for_each(|e| self.expr(e, scope)),
        }
    }

    fn block(&mut self, block: &mut BlockExpr, parent: ScopeId) -> Result<(), CompileError> {
        let index = self.next_block;
        self.next_block = index.checked_add(1).ok_or(CompileError::OperandOverflow {
            what: "nested block index",
            value: index as usize + 1,
        })?;
        let name = format!("{}-block{}", self.selector, index);
        let scope = self.tree.add_code_scope(
            &name,
            ScopeKind::Block { index },
            parent,
            &block.args,
            &block.locals,
        )?;
        block.scope = Some(scope);
        block.index = index;
        self.body(&mut block.body, scope)
    }

    fn ident(&self, ident: &mut Ident, scope: ScopeId) {
        ident.symbol = Some(self.lookup(&ident.name, scope));
    }

    fn lookup(&self, name: &str, scope: ScopeId) -> Symbol {
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(s) = self.tree.get(id) else { break };
            if !s.is_code() {
                break;
            }
            if let Some(slot) = s.slot_of(name) {
                return Symbol::Local { scope: id, slot };
            }
            current = s.parent;
        }
        match self.fields.iter().position(|f| f == name) {
            Some(i) => Symbol::Field(i as u16),
            None => Symbol::Global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Body, BlockExpr, ClassDef, Expr, MainBody, MethodDef, Stat};

    fn object() -> ClassDef {
        ClassDef::new("Object", None, &[])
    }

    fn symbol_of(stat: &Stat) -> Option<Symbol> {
        match stat {
            Stat::Expr(Expr::Ident(ident)) => ident.symbol,
            Stat::Return { value: Expr::Ident(ident), .. } => ident.symbol,
            Stat::Assign { target, .. } => target.symbol,
            _ => None,
        }
    }

    #[test]
    fn fields_are_flattened_after_inherited_ones() {
        let mut program = Program::new()
            .with_class(object())
            .with_class(ClassDef::new("A", None, &["x", "y"]))
            .with_class(
                ClassDef::new("B", Some("A"), &["z"]).method(MethodDef::code(
                    "get",
                    &[],
                    &[],
                    Body::new(vec![Stat::ret(Expr::ident("z"))]),
                )),
            );
        resolve(&mut program).unwrap();
        let MethodKind::Code(body) = &program.classes[2].methods[0].kind else {
            panic!("expected code method")
        };
        assert_eq!(symbol_of(&body.stats[0]), Some(Symbol::Field(2)));
        assert_eq!(program.classes[1].superclass.as_deref(), Some("Object"));
    }

    #[test]
    fn locals_shadow_fields_and_unknowns_are_global() {
        let mut program = Program::new().with_class(object()).with_class(
            ClassDef::new("T", None, &["x"]).method(MethodDef::code(
                "f:",
                &["x"],
                &["t"],
                Body::new(vec![
                    Stat::expr(Expr::ident("x")),
                    Stat::assign("t", Expr::nil()),
                    Stat::expr(Expr::ident("Transcript")),
                ]),
            )),
        );
        let tree = resolve(&mut program).unwrap();
        let method = &program.classes[1].methods[0];
        let scope = method.scope.unwrap();
        let MethodKind::Code(body) = &method.kind else { panic!() };
        assert_eq!(symbol_of(&body.stats[0]), Some(Symbol::Local { scope, slot: 0 }));
        assert_eq!(symbol_of(&body.stats[1]), Some(Symbol::Local { scope, slot: 1 }));
        assert_eq!(symbol_of(&body.stats[2]), Some(Symbol::Global));
        assert_eq!(tree.get(scope).unwrap().nargs, 1);
        assert_eq!(tree.qualified_name(scope).as_deref(), Some("T>>f:"));
    }

    #[test]
    fn blocks_are_numbered_in_preorder() {
        let inner = BlockExpr::new(&[], &[], Body::new(vec![Stat::expr(Expr::ident("a"))]));
        let outer = BlockExpr::new(&["a"], &[], Body::new(vec![Stat::expr(Expr::block(inner))]));
        let second = BlockExpr::new(&[], &[], Body::empty());
        let mut program = Program::new().with_class(object()).with_main(MainBody::new(
            &[],
            Body::new(vec![Stat::expr(Expr::block(outer)), Stat::expr(Expr::block(second))]),
        ));
        let tree = resolve(&mut program).unwrap();
        let main = program.main.as_ref().unwrap();

        let Stat::Expr(Expr::Block(outer)) = &main.body.stats[0] else { panic!() };
        let Stat::Expr(Expr::Block(inner)) = &outer.body.stats[0] else { panic!() };
        let Stat::Expr(Expr::Block(second)) = &main.body.stats[1] else { panic!() };
        assert_eq!((outer.index, inner.index, second.index), (0, 1, 2));

        let inner_scope = inner.scope.unwrap();
        assert_eq!(
            symbol_of(&inner.body.stats[0]),
            Some(Symbol::Local { scope: outer.scope.unwrap(), slot: 0 })
        );
        assert_eq!(tree.relative_depth(inner_scope, main.scope.unwrap()), Some(2));
        assert_eq!(
            tree.qualified_name(inner_scope).as_deref(),
            Some("main-block0>>main-block1")
        );
    }

    #[test]
    fn relative_depth_of_unrelated_scope_is_none() {
        let mut program = Program::new()
            .with_class(object())
            .with_class(ClassDef::new("A", None, &[]).method(MethodDef::code("f", &[], &[], Body::empty())))
            .with_class(ClassDef::new("B", None, &[]).method(MethodDef::code("g", &[], &[], Body::empty())));
        let tree = resolve(&mut program).unwrap();
        let f = program.classes[1].methods[0].scope.unwrap();
        let g = program.classes[2].methods[0].scope.unwrap();
        assert_eq!(tree.relative_depth(f, g), None);
        assert_eq!(tree.relative_depth(f, f), Some(0));
    }

    #[test]
    fn redefinitions_are_rejected() {
        let mut dup_arg = Program::new().with_class(object()).with_class(
            ClassDef::new("T", None, &[]).method(MethodDef::code("at:put:", &["x", "x"], &[], Body::empty())),
        );
        assert_eq!(
            resolve(&mut dup_arg).unwrap_err(),
            CompileError::Redefinition { name: "x".into(), scope: "T>>at:put:".into() }
        );

        let mut dup_field = Program::new()
            .with_class(object())
            .with_class(ClassDef::new("A", None, &["x"]))
            .with_class(ClassDef::new("B", Some("A"), &["x"]));
        assert!(matches!(
            resolve(&mut dup_field),
            Err(CompileError::Redefinition { .. })
        ));

        let mut dup_method = Program::new().with_class(object()).with_class(
            ClassDef::new("T", None, &[])
                .method(MethodDef::code("f", &[], &[], Body::empty()))
                .method(MethodDef::code("f", &[], &[], Body::empty()).class_side()),
        );
        assert!(matches!(
            resolve(&mut dup_method),
            Err(CompileError::Redefinition { .. })
        ));
    }

    #[test]
    fn unknown_superclass_is_rejected() {
        let mut program = Program::new()
            .with_class(object())
            .with_class(ClassDef::new("B", Some("A"), &[]));
        assert_eq!(
            resolve(&mut program).unwrap_err(),
            CompileError::UnknownSuperclass { class: "B".into(), superclass: "A".into() }
        );
    }
}
