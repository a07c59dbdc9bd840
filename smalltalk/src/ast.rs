//! The annotated program tree consumed by the code generator.
//!
//! Trees are built directly in Rust (there is no parser in this crate).
//! [`crate::scope::resolve`] fills in the `scope`, `index` and `symbol`
//! annotations before code generation.

use core::fmt;

use crate::scope::ScopeId;

/// A source position. Lines are 1-based, columns 0-based.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Program {
    pub main: Option<MainBody>,
    pub classes: Vec<ClassDef>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_main(mut self, main: MainBody) -> Self {
        self.main = Some(main);
        self
    }

    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.classes.push(class);
        self
    }
}

/// The implicit top-level code of a program; compiled as `MainClass>>main`.
#[derive(Debug, Clone)]
pub struct MainBody {
    pub locals: Vec<String>,
    pub body: Body,
    pub scope: Option<ScopeId>,
}

impl MainBody {
    pub fn new(locals: &[&str], body: Body) -> Self {
        Self {
            locals: names(locals),
            body,
            scope: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub superclass: Option<String>,
    pub fields: Vec<String>,
    pub methods: Vec<MethodDef>,
    pub pos: Pos,
    pub scope: Option<ScopeId>,
}

impl ClassDef {
    pub fn new(name: &str, superclass: Option<&str>, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            superclass: superclass.map(str::to_string),
            fields: names(fields),
            methods: Vec::new(),
            pos: Pos::default(),
            scope: None,
        }
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }
}

#[derive(Debug, Clone)]
pub enum MethodKind {
    /// Implemented natively; the tag names an entry of the primitive table.
    Primitive(String),
    Code(Body),
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub selector: String,
    pub class_method: bool,
    pub args: Vec<String>,
    pub locals: Vec<String>,
    pub kind: MethodKind,
    pub pos: Pos,
    pub scope: Option<ScopeId>,
}

impl MethodDef {
    pub fn code(selector: &str, args: &[&str], locals: &[&str], body: Body) -> Self {
        Self {
            selector: selector.to_string(),
            class_method: false,
            args: names(args),
            locals: names(locals),
            kind: MethodKind::Code(body),
            pos: Pos::default(),
            scope: None,
        }
    }

    pub fn primitive(selector: &str, args: &[&str], tag: &str) -> Self {
        Self {
            selector: selector.to_string(),
            class_method: false,
            args: names(args),
            locals: Vec::new(),
            kind: MethodKind::Primitive(tag.to_string()),
            pos: Pos::default(),
            scope: None,
        }
    }

    /// Mark this method as class-side.
    pub fn class_side(mut self) -> Self {
        self.class_method = true;
        self
    }
}

/// A sequence of statements. `end` is the position just past the body's
/// closing token.
#[derive(Debug, Default, Clone)]
pub struct Body {
    pub stats: Vec<Stat>,
    pub end: Pos,
}

impl Body {
    pub fn new(stats: Vec<Stat>) -> Self {
        Self {
            stats,
            end: Pos::default(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn ending_at(mut self, line: u32, column: u32) -> Self {
        self.end = Pos::new(line, column);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Stat {
    Expr(Expr),
    Assign { target: Ident, value: Expr, pos: Pos },
    Return { value: Expr, pos: Pos },
}

impl Stat {
    pub fn expr(value: Expr) -> Self {
        Self::Expr(value)
    }

    pub fn assign(name: &str, value: Expr) -> Self {
        Self::Assign {
            target: Ident::new(name),
            value,
            pos: Pos::default(),
        }
    }

    pub fn ret(value: Expr) -> Self {
        Self::Return {
            value,
            pos: Pos::default(),
        }
    }

    /// Set the position of the statement's first token.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        match &mut self {
            Self::Assign { target, pos, .. } => {
                *pos = Pos::new(line, column);
                target.pos = *pos;
            }
            Self::Return { pos, .. } => *pos = Pos::new(line, column),
            Self::Expr(_) => {}
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    True,
    False,
    Int(i32),
    Float(f32),
    Char(char),
    /// Canonical (unquoted) string value.
    Str(String),
}

impl Literal {
    /// Build a string literal from its quoted source token: the outer quotes
    /// are removed and doubled quotes collapse to one.
    pub fn string_token(token: &str) -> Self {
        let inner = token
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .unwrap_or(token);
        Self::Str(inner.replace("''", "'"))
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    SelfRef,
    Ident(Ident),
    Array(Vec<Expr>),
    Block(BlockExpr),
    Send(Box<Send>),
    SuperSend(SuperSend),
}

impl Expr {
    pub fn int(value: i32) -> Self {
        Self::Literal(Literal::Int(value))
    }

    pub fn float(value: f32) -> Self {
        Self::Literal(Literal::Float(value))
    }

    pub fn char(value: char) -> Self {
        Self::Literal(Literal::Char(value))
    }

    pub fn string(value: &str) -> Self {
        Self::Literal(Literal::Str(value.to_string()))
    }

    pub fn nil() -> Self {
        Self::Literal(Literal::Nil)
    }

    pub fn boolean(value: bool) -> Self {
        Self::Literal(if value { Literal::True } else { Literal::False })
    }

    pub fn ident(name: &str) -> Self {
        Self::Ident(Ident::new(name))
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Self::Array(elements)
    }

    pub fn block(block: BlockExpr) -> Self {
        Self::Block(block)
    }

    /// `self <selector> args...`; keyword parts are already concatenated,
    /// e.g. `at:put:`.
    pub fn send(self, selector: &str, args: Vec<Expr>) -> Self {
        Self::Send(Box::new(Send {
            receiver: self,
            selector: selector.to_string(),
            args,
            selector_pos: Pos::default(),
        }))
    }

    pub fn super_send(selector: &str, args: Vec<Expr>) -> Self {
        Self::SuperSend(SuperSend {
            selector: selector.to_string(),
            args,
            selector_pos: Pos::default(),
        })
    }

    /// Set the position of the expression's key token: the selector of a
    /// send or the name of an identifier.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        let pos = Pos::new(line, column);
        match &mut self {
            Self::Send(send) => send.selector_pos = pos,
            Self::SuperSend(send) => send.selector_pos = pos,
            Self::Ident(ident) => ident.pos = pos,
            _ => {}
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct Send {
    pub receiver: Expr,
    pub selector: String,
    pub args: Vec<Expr>,
    pub selector_pos: Pos,
}

#[derive(Debug, Clone)]
pub struct SuperSend {
    pub selector: String,
    pub args: Vec<Expr>,
    pub selector_pos: Pos,
}

/// What an identifier refers to, as decided by scope resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Global,
    /// Flat index into the receiver's field array.
    Field(u16),
    /// Slot in the locals of the scope that defines the variable.
    Local { scope: ScopeId, slot: u16 },
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
    pub symbol: Option<Symbol>,
}

impl Ident {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pos: Pos::default(),
            symbol: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockExpr {
    pub args: Vec<String>,
    pub locals: Vec<String>,
    pub body: Body,
    pub scope: Option<ScopeId>,
    /// Slot in the owning method's nested-block table.
    pub index: u16,
}

impl BlockExpr {
    pub fn new(args: &[&str], locals: &[&str], body: Body) -> Self {
        Self {
            args: names(args),
            locals: names(locals),
            body,
            scope: None,
            index: 0,
        }
    }
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
