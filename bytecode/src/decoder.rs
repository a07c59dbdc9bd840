use thiserror::Error;

use crate::instruction::Instruction;
use crate::op::Op;
use crate::position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode 0x{byte:02x} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },
    #[error("truncated {op:?} at offset {offset}")]
    Truncated { op: Op, offset: usize },
}

/// Decodes a bytecode byte slice into [`Instruction`]s.
///
/// Malformed input is reported as a [`DecodeError`]; the iterator stops
/// after the first error.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::at(bytes, 0)
    }

    /// Start decoding at byte offset `pos`.
    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self {
            bytes,
            pos,
            failed: false,
        }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Whether the decoder has reached the end of the bytecode.
    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the next instruction, or `Ok(None)` at end-of-stream.
    pub fn decode_next(&mut self) -> Result<Option<Instruction>, DecodeError> {
        if self.is_at_end() {
            return Ok(None);
        }
        let start = self.pos;
        let byte = self.bytes[start];
        let op = Op::try_from(byte).map_err(|byte| DecodeError::UnknownOpcode {
            byte,
            offset: start,
        })?;
        let end = start + op.instruction_size();
        let Some(operands) = self.bytes.get(start + 1..end) else {
            return Err(DecodeError::Truncated { op, offset: start });
        };
        self.pos = end;

        let short = |at: usize| u16::from_le_bytes([operands[at], operands[at + 1]]);
        let int = |at: usize| {
            u32::from_le_bytes([
                operands[at],
                operands[at + 1],
                operands[at + 2],
                operands[at + 3],
            ])
        };

        let instruction = match op {
            Op::PushNil => Instruction::PushNil,
            Op::PushSelf => Instruction::PushSelf,
            Op::PushTrue => Instruction::PushTrue,
            Op::PushFalse => Instruction::PushFalse,
            Op::PushChar => Instruction::PushChar { ch: short(0) },
            Op::PushInt => Instruction::PushInt {
                value: int(0) as i32,
            },
            Op::PushFloat => Instruction::PushFloat {
                value: f32::from_bits(int(0)),
            },
            Op::PushArray => Instruction::PushArray { count: short(0) },
            Op::PushLiteral => Instruction::PushLiteral { idx: short(0) },
            Op::PushGlobal => Instruction::PushGlobal { idx: short(0) },
            Op::PushField => Instruction::PushField { idx: short(0) },
            Op::PushLocal => Instruction::PushLocal {
                depth: short(0),
                slot: short(2),
            },
            Op::Pop => Instruction::Pop,
            Op::StoreField => Instruction::StoreField { idx: short(0) },
            Op::StoreLocal => Instruction::StoreLocal {
                depth: short(0),
                slot: short(2),
            },
            Op::Return => Instruction::Return,
            Op::Send => Instruction::Send {
                argc: short(0),
                selector: short(2),
            },
            Op::SendSuper => Instruction::SendSuper {
                argc: short(0),
                selector: short(2),
            },
            Op::Block => Instruction::Block { idx: short(0) },
            Op::BlockReturn => Instruction::BlockReturn,
            Op::Dbg => {
                let (line, column) = position::unpack(int(2));
                Instruction::Dbg {
                    file: short(0),
                    line,
                    column,
                }
            }
        };
        Ok(Some(instruction))
    }
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.decode_next() {
            Ok(instruction) => instruction.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Decode the single instruction at `pc`, returning it with the offset of
/// the following instruction.
pub fn decode_at(bytes: &[u8], pc: usize) -> Result<Option<(Instruction, usize)>, DecodeError> {
    let mut decoder = BytecodeDecoder::at(bytes, pc);
    Ok(decoder.decode_next()?.map(|i| (i, decoder.offset())))
}
