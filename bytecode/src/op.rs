/// Bytecode opcodes.
///
/// Every operand has a fixed width: a *short* is 2 bytes, an *int* (and the
/// bit pattern of a float) is 4 bytes. All multi-byte operands are
/// little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// Push the nil singleton.
    PushNil = 0x00,

    /// Push the receiver of the current activation.
    PushSelf,

    /// Push `true`.
    PushTrue,

    /// Push `false`.
    PushFalse,

    /// Push a character literal.
    /// Operands: `ch:u16`
    PushChar,

    /// Push an integer literal.
    /// Operands: `value:i32`
    PushInt,

    /// Push a float literal.
    /// Operands: `bits:u32` (IEEE-754 single precision)
    PushFloat,

    /// Pop `count` values and push an array holding them in source order.
    /// Operands: `count:u16`
    PushArray,

    /// Push the string literal at `idx` of the block's literal pool.
    /// Operands: `idx:u16`
    PushLiteral,

    /// Push the global named by literal `idx`.
    /// Operands: `idx:u16`
    PushGlobal,

    /// Push field `idx` of the receiver.
    /// Operands: `idx:u16`
    PushField,

    /// Push local `slot` of the activation `depth` enclosing hops out.
    /// Operands: `depth:u16`, `slot:u16`
    PushLocal,

    /// Discard the top of the operand stack.
    Pop,

    /// Store the top of stack into receiver field `idx`. Leaves the value.
    /// Operands: `idx:u16`
    StoreField,

    /// Store the top of stack into a local. Leaves the value.
    /// Operands: `depth:u16`, `slot:u16`
    StoreLocal,

    /// Return top of stack from the enclosing method activation.
    Return,

    /// Send a message. The receiver sits beneath `argc` arguments.
    /// Operands: `argc:u16`, `selector:u16`
    Send,

    /// Send to super. Same operands as [`Send`](Op::Send).
    SendSuper,

    /// Push a closure over nested block `idx` of the current method.
    /// Operands: `idx:u16`
    Block,

    /// Return top of stack from the current block activation only.
    BlockReturn,

    /// Record the current source position.
    /// Operands: `file:u16`, `position:u32` (see [`crate::position`])
    Dbg,
}

impl Op {
    pub const COUNT: usize = Op::Dbg as usize + 1;

    const ALL: [Op; Op::COUNT] = [
        Op::PushNil,
        Op::PushSelf,
        Op::PushTrue,
        Op::PushFalse,
        Op::PushChar,
        Op::PushInt,
        Op::PushFloat,
        Op::PushArray,
        Op::PushLiteral,
        Op::PushGlobal,
        Op::PushField,
        Op::PushLocal,
        Op::Pop,
        Op::StoreField,
        Op::StoreLocal,
        Op::Return,
        Op::Send,
        Op::SendSuper,
        Op::Block,
        Op::BlockReturn,
        Op::Dbg,
    ];

    /// Total operand bytes following the opcode byte.
    pub const fn operand_size(self) -> usize {
        match self {
            Op::PushNil
            | Op::PushSelf
            | Op::PushTrue
            | Op::PushFalse
            | Op::Pop
            | Op::Return
            | Op::BlockReturn => 0,
            Op::PushChar
            | Op::PushArray
            | Op::PushLiteral
            | Op::PushGlobal
            | Op::PushField
            | Op::StoreField
            | Op::Block => 2,
            Op::PushInt | Op::PushFloat => 4,
            Op::PushLocal | Op::StoreLocal | Op::Send | Op::SendSuper => 4,
            Op::Dbg => 6,
        }
    }

    /// Size of the whole encoded instruction, opcode byte included.
    pub const fn instruction_size(self) -> usize {
        1 + self.operand_size()
    }

    /// Lowercase mnemonic used by the disassembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::PushNil => "nil",
            Op::PushSelf => "self",
            Op::PushTrue => "true",
            Op::PushFalse => "false",
            Op::PushChar => "push_char",
            Op::PushInt => "push_int",
            Op::PushFloat => "push_float",
            Op::PushArray => "push_array",
            Op::PushLiteral => "push_literal",
            Op::PushGlobal => "push_global",
            Op::PushField => "push_field",
            Op::PushLocal => "push_local",
            Op::Pop => "pop",
            Op::StoreField => "store_field",
            Op::StoreLocal => "store_local",
            Op::Return => "return",
            Op::Send => "send",
            Op::SendSuper => "send_super",
            Op::Block => "block",
            Op::BlockReturn => "block_return",
            Op::Dbg => "dbg",
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Op::ALL.get(value as usize).copied().ok_or(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_match_table() {
        for (i, op) in Op::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
            assert_eq!(Op::try_from(i as u8), Ok(*op));
        }
    }

    #[test]
    fn unknown_byte_is_rejected() {
        assert_eq!(Op::try_from(Op::COUNT as u8), Err(Op::COUNT as u8));
        assert_eq!(Op::try_from(0xFF), Err(0xFF));
    }
}
