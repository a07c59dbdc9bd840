use core::fmt;

use crate::op::Op;

/// A decoded instruction.
///
/// `Dbg` carries the unpacked line and column; encoding packs them again
/// with [`crate::position::pack`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    PushNil,
    PushSelf,
    PushTrue,
    PushFalse,
    PushChar {
        ch: u16,
    },
    PushInt {
        value: i32,
    },
    PushFloat {
        value: f32,
    },
    PushArray {
        count: u16,
    },
    PushLiteral {
        idx: u16,
    },
    PushGlobal {
        idx: u16,
    },
    PushField {
        idx: u16,
    },
    PushLocal {
        depth: u16,
        slot: u16,
    },
    Pop,
    StoreField {
        idx: u16,
    },
    StoreLocal {
        depth: u16,
        slot: u16,
    },
    Return,
    Send {
        argc: u16,
        selector: u16,
    },
    SendSuper {
        argc: u16,
        selector: u16,
    },
    Block {
        idx: u16,
    },
    BlockReturn,
    Dbg {
        file: u16,
        line: u32,
        column: u32,
    },
}

impl Instruction {
    pub fn op(&self) -> Op {
        match self {
            Self::PushNil => Op::PushNil,
            Self::PushSelf => Op::PushSelf,
            Self::PushTrue => Op::PushTrue,
            Self::PushFalse => Op::PushFalse,
            Self::PushChar { .. } => Op::PushChar,
            Self::PushInt { .. } => Op::PushInt,
            Self::PushFloat { .. } => Op::PushFloat,
            Self::PushArray { .. } => Op::PushArray,
            Self::PushLiteral { .. } => Op::PushLiteral,
            Self::PushGlobal { .. } => Op::PushGlobal,
            Self::PushField { .. } => Op::PushField,
            Self::PushLocal { .. } => Op::PushLocal,
            Self::Pop => Op::Pop,
            Self::StoreField { .. } => Op::StoreField,
            Self::StoreLocal { .. } => Op::StoreLocal,
            Self::Return => Op::Return,
            Self::Send { .. } => Op::Send,
            Self::SendSuper { .. } => Op::SendSuper,
            Self::Block { .. } => Op::Block,
            Self::BlockReturn => Op::BlockReturn,
            Self::Dbg { .. } => Op::Dbg,
        }
    }

    /// Encoded size in bytes, opcode included.
    pub fn size(&self) -> usize {
        self.op().instruction_size()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.op().mnemonic();
        match self {
            Self::PushNil
            | Self::PushSelf
            | Self::PushTrue
            | Self::PushFalse
            | Self::Pop
            | Self::Return
            | Self::BlockReturn => write!(f, "{name}"),
            Self::PushChar { ch } => match char::from_u32(u32::from(*ch)) {
                Some(c) => write!(f, "{name:<12} ${c}"),
                None => write!(f, "{name:<12} {ch}"),
            },
            Self::PushInt { value } => write!(f, "{name:<12} {value}"),
            Self::PushFloat { value } => write!(f, "{name:<12} {value}"),
            Self::PushArray { count } => write!(f, "{name:<12} {count}"),
            Self::PushLiteral { idx }
            | Self::PushGlobal { idx }
            | Self::PushField { idx }
            | Self::StoreField { idx }
            | Self::Block { idx } => write!(f, "{name:<12} #{idx}"),
            Self::PushLocal { depth, slot } | Self::StoreLocal { depth, slot } => {
                write!(f, "{name:<12} {depth}, {slot}")
            }
            Self::Send { argc, selector } | Self::SendSuper { argc, selector } => {
                write!(f, "{name:<12} {argc}, #{selector}")
            }
            Self::Dbg { file, line, column } => {
                write!(f, "{name:<12} #{file}, {line}:{column}")
            }
        }
    }
}
