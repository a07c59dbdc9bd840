//! Runtime object model.

use core::fmt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::activation::{ActivationId, FramePin};
use crate::code::CompiledBlock;

/// Arrays nested deeper than this render as `{...}`.
const MAX_RENDER_DEPTH: usize = 8;

/// A Smalltalk value.
///
/// Scalars are stored inline; everything else is shared by reference, so
/// cloning a `Value` never copies an object.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i32),
    Float(f32),
    Char(char),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Block(Rc<BlockDescriptor>),
    Object(Rc<Instance>),
    Class(Rc<MetaClass>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Value::Class(_))
    }

    /// Smalltalk `==`: scalars compare by value, objects by identity.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Identity hash: scalar payload or object address.
    pub fn identity_hash(&self) -> i32 {
        let addr = match self {
            Value::Nil => return 0,
            Value::Bool(b) => return if *b { 1231 } else { 1237 },
            Value::Int(v) => return *v,
            Value::Float(v) => return v.to_bits() as i32,
            Value::Char(c) => return *c as i32,
            Value::Str(s) => Rc::as_ptr(s) as *const u8 as usize,
            Value::Array(a) => Rc::as_ptr(a) as usize,
            Value::Block(b) => Rc::as_ptr(b) as usize,
            Value::Object(o) => Rc::as_ptr(o) as usize,
            Value::Class(c) => Rc::as_ptr(c) as usize,
        };
        (addr >> 3) as i32
    }

    fn render(&self, out: &mut String, depth: usize) {
        match self {
            Value::Nil => out.push_str("nil"),
            Value::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Value::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Value::Float(v) => out.push_str(&format_float(*v)),
            Value::Char(c) => {
                let _ = write!(out, "${c}");
            }
            Value::Str(s) => out.push_str(s),
            Value::Array(items) => {
                if depth >= MAX_RENDER_DEPTH {
                    out.push_str("{...}");
                    return;
                }
                out.push('{');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(". ");
                    }
                    item.render(out, depth + 1);
                }
                out.push('}');
            }
            Value::Block(_) => out.push_str("a BlockDescriptor"),
            Value::Object(obj) => {
                let _ = write!(out, "a {}", obj.class.name);
            }
            Value::Class(class) => {
                let _ = write!(out, "class {}", class.name);
            }
        }
    }
}

/// The `asString` rendering.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out, 0);
        f.write_str(&out)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Block(b) => write!(f, "{}", b.block.name),
            other => write!(f, "{other}"),
        }
    }
}

/// Structural equality for host-side comparisons. Strings and arrays compare
/// by content, other objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => self.identical(other),
        }
    }
}

/// Format like `#.#####`: at most five fractional digits, no trailing zeros
/// and no leading zero before the point.
pub fn format_float(v: f32) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let mut s = format!("{:.5}", v as f64);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if let Some(rest) = s.strip_prefix("0.") {
        s = format!(".{rest}");
    } else if let Some(rest) = s.strip_prefix("-0.") {
        s = format!("-.{rest}");
    }
    s
}

/// An instance of a user-defined (or library) class.
pub struct Instance {
    pub class: Rc<MetaClass>,
    pub fields: RefCell<Vec<Value>>,
}

impl Instance {
    /// A fresh instance with every field set to nil.
    pub fn new(class: Rc<MetaClass>) -> Rc<Self> {
        let fields = vec![Value::Nil; class.num_fields()];
        Rc::new(Self {
            class,
            fields: RefCell::new(fields),
        })
    }
}

/// Runtime descriptor of a class.
pub struct MetaClass {
    pub name: String,
    pub superclass: Option<Rc<MetaClass>>,
    /// Fields defined directly by this class; inherited ones come first in
    /// instances.
    pub fields: Vec<String>,
    pub methods: HashMap<String, Rc<CompiledBlock>>,
    num_fields: usize,
}

impl MetaClass {
    /// Build a class and back-link its methods (and their nested blocks)
    /// to it.
    pub fn new(
        name: &str,
        superclass: Option<Rc<MetaClass>>,
        fields: Vec<String>,
        methods: Vec<Rc<CompiledBlock>>,
    ) -> Rc<Self> {
        let inherited = superclass.as_ref().map_or(0, |s| s.num_fields());
        Rc::new_cyclic(|me| {
            for method in &methods {
                method.link_owner(me);
            }
            Self {
                name: name.to_string(),
                num_fields: inherited + fields.len(),
                superclass,
                fields,
                methods: methods.into_iter().map(|m| (m.name.clone(), m)).collect(),
            }
        })
    }

    /// Total field count including inherited fields.
    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    /// Find `selector` here or up the superclass chain.
    pub fn resolve_method(&self, selector: &str) -> Option<Rc<CompiledBlock>> {
        let mut class = self;
        loop {
            if let Some(method) = class.methods.get(selector) {
                return Some(method.clone());
            }
            class = class.superclass.as_deref()?;
        }
    }

    pub fn to_test_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "name: {}", self.name);
        let superclass = self.superclass.as_ref().map_or("", |s| s.name.as_str());
        let _ = writeln!(out, "superClass: {superclass}");
        let _ = writeln!(out, "fields: {}", self.fields.join(","));
        out.push_str("methods:\n");
        let mut selectors: Vec<&String> = self.methods.keys().collect();
        selectors.sort();
        let rendered: Vec<String> = selectors
            .into_iter()
            .map(|s| self.methods[s].to_test_string())
            .collect();
        for line in rendered.join("\n").lines() {
            let _ = writeln!(out, "    {line}");
        }
        out
    }
}

impl fmt::Debug for MetaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.name)
    }
}

/// A closure: a block literal captured in the activation that created it.
#[derive(Debug)]
pub struct BlockDescriptor {
    pub block: Rc<CompiledBlock>,
    /// Lexically enclosing activation; `push_local` walks from here.
    pub enclosing: ActivationId,
    /// The method activation a `^` inside the block returns from.
    pub home: ActivationId,
    /// Receiver of the creating method; `self` inside the block.
    pub receiver: Value,
    /// Keeps `enclosing` alive while the closure is reachable.
    pub pin: Rc<FramePin>,
}
