use crate::instruction::Instruction;
use crate::op::Op;
use crate::position;

/// Builds a bytecode byte sequence.
#[derive(Debug, Default, Clone)]
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    fn emit_op_u16(&mut self, op: Op, v: u16) {
        self.emit_op(op);
        self.emit_u16(v);
    }

    fn emit_op_u16_u16(&mut self, op: Op, a: u16, b: u16) {
        self.emit_op(op);
        self.emit_u16(a);
        self.emit_u16(b);
    }

    // ── instructions ───────────────────────────────────────────────

    pub fn push_nil(&mut self) {
        self.emit_op(Op::PushNil);
    }

    pub fn push_self(&mut self) {
        self.emit_op(Op::PushSelf);
    }

    pub fn push_true(&mut self) {
        self.emit_op(Op::PushTrue);
    }

    pub fn push_false(&mut self) {
        self.emit_op(Op::PushFalse);
    }

    pub fn push_char(&mut self, ch: u16) {
        self.emit_op_u16(Op::PushChar, ch);
    }

    pub fn push_int(&mut self, value: i32) {
        self.emit_op(Op::PushInt);
        self.emit_u32(value as u32);
    }

    pub fn push_float(&mut self, value: f32) {
        self.emit_op(Op::PushFloat);
        self.emit_u32(value.to_bits());
    }

    /// `push_array <count>`: collect the top `count` values into an array.
    pub fn push_array(&mut self, count: u16) {
        self.emit_op_u16(Op::PushArray, count);
    }

    pub fn push_literal(&mut self, idx: u16) {
        self.emit_op_u16(Op::PushLiteral, idx);
    }

    pub fn push_global(&mut self, idx: u16) {
        self.emit_op_u16(Op::PushGlobal, idx);
    }

    pub fn push_field(&mut self, idx: u16) {
        self.emit_op_u16(Op::PushField, idx);
    }

    pub fn push_local(&mut self, depth: u16, slot: u16) {
        self.emit_op_u16_u16(Op::PushLocal, depth, slot);
    }

    pub fn pop(&mut self) {
        self.emit_op(Op::Pop);
    }

    pub fn store_field(&mut self, idx: u16) {
        self.emit_op_u16(Op::StoreField, idx);
    }

    pub fn store_local(&mut self, depth: u16, slot: u16) {
        self.emit_op_u16_u16(Op::StoreLocal, depth, slot);
    }

    /// `return`: non-local return from the home method.
    pub fn return_(&mut self) {
        self.emit_op(Op::Return);
    }

    /// `send <argc> <selector>`: ordinary message send.
    pub fn send(&mut self, argc: u16, selector: u16) {
        self.emit_op_u16_u16(Op::Send, argc, selector);
    }

    /// `send_super <argc> <selector>`: lookup starts at the superclass.
    pub fn send_super(&mut self, argc: u16, selector: u16) {
        self.emit_op_u16_u16(Op::SendSuper, argc, selector);
    }

    /// `block <idx>`: push a closure over nested block `idx`.
    pub fn block(&mut self, idx: u16) {
        self.emit_op_u16(Op::Block, idx);
    }

    /// `block_return`: return from the current block only.
    pub fn block_return(&mut self) {
        self.emit_op(Op::BlockReturn);
    }

    /// `dbg <file> <line:column>`: record the current source position.
    pub fn dbg(&mut self, file: u16, line: u32, column: u32) {
        self.emit_op(Op::Dbg);
        self.emit_u16(file);
        self.emit_u32(position::pack(line, column));
    }

    /// Emit an already-decoded instruction.
    pub fn emit(&mut self, instruction: &Instruction) {
        match *instruction {
            Instruction::PushNil => self.push_nil(),
            Instruction::PushSelf => self.push_self(),
            Instruction::PushTrue => self.push_true(),
            Instruction::PushFalse => self.push_false(),
            Instruction::PushChar { ch } => self.push_char(ch),
            Instruction::PushInt { value } => self.push_int(value),
            Instruction::PushFloat { value } => self.push_float(value),
            Instruction::PushArray { count } => self.push_array(count),
            Instruction::PushLiteral { idx } => self.push_literal(idx),
            Instruction::PushGlobal { idx } => self.push_global(idx),
            Instruction::PushField { idx } => self.push_field(idx),
            Instruction::PushLocal { depth, slot } => self.push_local(depth, slot),
            Instruction::Pop => self.pop(),
            Instruction::StoreField { idx } => self.store_field(idx),
            Instruction::StoreLocal { depth, slot } => self.store_local(depth, slot),
            Instruction::Return => self.return_(),
            Instruction::Send { argc, selector } => self.send(argc, selector),
            Instruction::SendSuper { argc, selector } => self.send_super(argc, selector),
            Instruction::Block { idx } => self.block(idx),
            Instruction::BlockReturn => self.block_return(),
            Instruction::Dbg { file, line, column } => self.dbg(file, line, column),
        }
    }
}
