use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use bytecode::{BytecodeDecoder, Instruction, decode_at};
use once_cell::unsync::OnceCell;

use crate::object::MetaClass;
use crate::primitives::Primitive;

/// Compiled code for one method or block literal.
///
/// Exactly one of `bytecode` and `primitive` is populated. `blocks` is only
/// filled on method-level blocks; `block` instructions anywhere in the method
/// index into it.
#[derive(Debug)]
pub struct CompiledBlock {
    /// Simple name, e.g. `at:put:` or `at:put:-block0`.
    pub name: String,
    /// e.g. `Array>>at:put:` or `at:put:>>at:put:-block0`.
    pub qualified_name: String,
    pub nargs: usize,
    /// Locals not counting arguments.
    pub nlocals: usize,
    pub bytecode: Vec<u8>,
    pub literals: Vec<String>,
    pub blocks: Vec<Rc<CompiledBlock>>,
    pub primitive: Option<Primitive>,
    pub is_class_method: bool,
    literal_values: Vec<OnceCell<Rc<str>>>,
    owner: OnceCell<Weak<MetaClass>>,
}

impl CompiledBlock {
    pub fn new(name: impl Into<String>, qualified_name: impl Into<String>, nargs: usize, nlocals: usize) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            nargs,
            nlocals,
            bytecode: Vec::new(),
            literals: Vec::new(),
            blocks: Vec::new(),
            primitive: None,
            is_class_method: false,
            literal_values: Vec::new(),
            owner: OnceCell::new(),
        }
    }

    pub fn with_code(mut self, bytecode: Vec<u8>, literals: Vec<String>) -> Self {
        self.literal_values = literals.iter().map(|_| OnceCell::new()).collect();
        self.bytecode = bytecode;
        self.literals = literals;
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<Rc<CompiledBlock>>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitive = Some(primitive);
        self
    }

    pub fn class_side(mut self, is_class_method: bool) -> Self {
        self.is_class_method = is_class_method;
        self
    }

    /// Number of local slots in an activation: arguments plus locals.
    pub fn frame_size(&self) -> usize {
        self.nargs + self.nlocals
    }

    pub fn literal(&self, idx: u16) -> Option<&str> {
        self.literals.get(idx as usize).map(String::as_str)
    }

    /// The shared string value for literal `idx`; created on first use.
    pub fn literal_value(&self, idx: u16) -> Option<Rc<str>> {
        let text = self.literal(idx)?;
        let cell = self.literal_values.get(idx as usize)?;
        Some(cell.get_or_init(|| Rc::from(text)).clone())
    }

    /// The class this block was compiled into. Set once when the class is
    /// built; nested blocks share their method's owner.
    pub fn owner(&self) -> Option<Rc<MetaClass>> {
        self.owner.get().and_then(Weak::upgrade)
    }

    pub(crate) fn link_owner(&self, owner: &Weak<MetaClass>) {
        if self.owner.set(owner.clone()).is_err() {
            log::warn!("{} is already linked to a class", self.qualified_name);
        }
        for block in &self.blocks {
            block.link_owner(owner);
        }
    }

    /// Render one instruction with literal operands spelled out.
    pub fn describe(&self, instruction: &Instruction) -> String {
        let name = instruction.op().mnemonic();
        let lit = |idx: u16| match self.literal(idx) {
            Some(s) => format!("'{s}'"),
            None => format!("#{idx}"),
        };
        match *instruction {
            Instruction::PushLiteral { idx } | Instruction::PushGlobal { idx } => {
                format!("{name:<12} {}", lit(idx))
            }
            Instruction::Send { argc, selector } | Instruction::SendSuper { argc, selector } => {
                format!("{name:<12} {argc}, {}", lit(selector))
            }
            Instruction::Dbg { file, line, column } => {
                format!("{name:<12} {}, {line}:{column}", lit(file))
            }
            other => other.to_string(),
        }
    }

    /// Disassemble the single instruction at `ip`.
    pub fn disassemble_at(&self, ip: usize) -> String {
        match decode_at(&self.bytecode, ip) {
            Ok(Some((instruction, _))) => format!("{ip:04}:  {}", self.describe(&instruction)),
            Ok(None) => format!("{ip:04}:  <end>"),
            Err(e) => format!("{ip:04}:  <{e}>"),
        }
    }

    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let mut decoder = BytecodeDecoder::new(&self.bytecode);
        loop {
            let ip = decoder.offset();
            match decoder.decode_next() {
                Ok(Some(instruction)) => {
                    let _ = writeln!(out, "{ip:04}:  {}", self.describe(&instruction));
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = writeln!(out, "{ip:04}:  <{e}>");
                    break;
                }
            }
        }
        out
    }

    /// Stable multi-line rendering used by tests and `--disassemble`.
    pub fn to_test_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "name: {}", self.name);
        let _ = writeln!(out, "qualifiedName: {}", self.qualified_name);
        let _ = writeln!(out, "nargs: {}", self.nargs);
        let _ = writeln!(out, "nlocals: {}", self.nlocals);
        let literals: Vec<String> = self.literals.iter().map(|s| format!("'{s}'")).collect();
        let _ = writeln!(out, "literals: {}", literals.join(","));
        if let Some(primitive) = self.primitive {
            let _ = writeln!(out, "primitive: {}", primitive.name());
        }
        out.push_str(&self.disassemble());
        if !self.blocks.is_empty() {
            out.push_str("blocks:\n");
            let nested: Vec<String> = self.blocks.iter().map(|b| b.to_test_string()).collect();
            for line in nested.join("\n").lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        out
    }
}
