mod builder;
mod decoder;
mod instruction;
mod op;
pub mod position;

pub use builder::BytecodeBuilder;
pub use decoder::{BytecodeDecoder, DecodeError, decode_at};
pub use instruction::Instruction;
pub use op::Op;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instruction> {
        BytecodeDecoder::new(bytes)
            .collect::<Result<_, _>>()
            .expect("well-formed bytecode")
    }

    #[test]
    fn round_trip_every_opcode() {
        let mut b = BytecodeBuilder::new();
        b.push_nil();
        b.push_self();
        b.push_true();
        b.push_false();
        b.push_char(b'a' as u16);
        b.push_int(-123_456);
        b.push_float(2.5);
        b.push_array(3);
        b.push_literal(7);
        b.push_global(8);
        b.push_field(9);
        b.push_local(2, 1);
        b.pop();
        b.store_field(4);
        b.store_local(0, 3);
        b.send(2, 11);
        b.send_super(0, 12);
        b.block(1);
        b.block_return();
        b.dbg(0, 42, 17);
        b.return_();

        assert_eq!(decode_all(b.as_bytes()), vec![
            Instruction::PushNil,
            Instruction::PushSelf,
            Instruction::PushTrue,
            Instruction::PushFalse,
            Instruction::PushChar { ch: 97 },
            Instruction::PushInt { value: -123_456 },
            Instruction::PushFloat { value: 2.5 },
            Instruction::PushArray { count: 3 },
            Instruction::PushLiteral { idx: 7 },
            Instruction::PushGlobal { idx: 8 },
            Instruction::PushField { idx: 9 },
            Instruction::PushLocal { depth: 2, slot: 1 },
            Instruction::Pop,
            Instruction::StoreField { idx: 4 },
            Instruction::StoreLocal { depth: 0, slot: 3 },
            Instruction::Send { argc: 2, selector: 11 },
            Instruction::SendSuper { argc: 0, selector: 12 },
            Instruction::Block { idx: 1 },
            Instruction::BlockReturn,
            Instruction::Dbg { file: 0, line: 42, column: 17 },
            Instruction::Return,
        ]);
    }

    #[test]
    fn operands_are_little_endian_and_fixed_width() {
        let mut b = BytecodeBuilder::new();
        b.send(1, 0x0203);
        b.push_int(1);
        b.dbg(5, 1, 2);
        assert_eq!(b.into_bytes(), vec![
            Op::Send as u8, 1, 0, 0x03, 0x02,
            Op::PushInt as u8, 1, 0, 0, 0,
            Op::Dbg as u8, 5, 0, 2, 0, 1, 0,
        ]);
    }

    #[test]
    fn sizes_agree_with_encoding() {
        let mut b = BytecodeBuilder::new();
        b.push_local(1, 1);
        assert_eq!(b.current_offset(), Op::PushLocal.instruction_size());
        assert_eq!(Instruction::Dbg { file: 0, line: 0, column: 0 }.size(), 7);
    }

    #[test]
    fn truncated_operand_is_an_error() {
        let bytes = [Op::PushInt as u8, 1, 2];
        let mut decoder = BytecodeDecoder::new(&bytes);
        assert_eq!(
            decoder.next(),
            Some(Err(DecodeError::Truncated { op: Op::PushInt, offset: 0 }))
        );
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let bytes = [Op::Pop as u8, 0xEE];
        let results: Vec<_> = BytecodeDecoder::new(&bytes).collect();
        assert_eq!(results, vec![
            Ok(Instruction::Pop),
            Err(DecodeError::UnknownOpcode { byte: 0xEE, offset: 1 }),
        ]);
    }

    #[test]
    fn decode_at_reports_next_pc() {
        let mut b = BytecodeBuilder::new();
        b.push_self();
        b.send(0, 3);
        b.return_();
        let bytes = b.into_bytes();
        assert_eq!(
            decode_at(&bytes, 1),
            Ok(Some((Instruction::Send { argc: 0, selector: 3 }, 6)))
        );
        assert_eq!(decode_at(&bytes, 7), Ok(None));
    }

    #[test]
    fn display() {
        assert_eq!(Instruction::PushSelf.to_string(), "self");
        assert_eq!(
            Instruction::Send { argc: 1, selector: 4 }.to_string(),
            "send         1, #4"
        );
        assert_eq!(
            Instruction::PushLocal { depth: 1, slot: 0 }.to_string(),
            "push_local   1, 0"
        );
        assert_eq!(Instruction::PushChar { ch: 120 }.to_string(), "push_char    $x");
        assert_eq!(
            Instruction::Dbg { file: 0, line: 3, column: 9 }.to_string(),
            "dbg          #0, 3:9"
        );
    }

    fn any_instruction() -> impl Strategy<Value = Instruction> {
        let s = any::<u16>;
        prop_oneof![
            Just(Instruction::PushNil),
            Just(Instruction::PushSelf),
            Just(Instruction::PushTrue),
            Just(Instruction::PushFalse),
            s().prop_map(|ch| Instruction::PushChar { ch }),
            any::<i32>().prop_map(|value| Instruction::PushInt { value }),
            any::<u32>().prop_map(|bits| Instruction::PushFloat { value: f32::from_bits(bits) }),
            s().prop_map(|count| Instruction::PushArray { count }),
            s().prop_map(|idx| Instruction::PushLiteral { idx }),
            s().prop_map(|idx| Instruction::PushGlobal { idx }),
            s().prop_map(|idx| Instruction::PushField { idx }),
            (s(), s()).prop_map(|(depth, slot)| Instruction::PushLocal { depth, slot }),
            Just(Instruction::Pop),
            s().prop_map(|idx| Instruction::StoreField { idx }),
            (s(), s()).prop_map(|(depth, slot)| Instruction::StoreLocal { depth, slot }),
            Just(Instruction::Return),
            (s(), s()).prop_map(|(argc, selector)| Instruction::Send { argc, selector }),
            (s(), s()).prop_map(|(argc, selector)| Instruction::SendSuper { argc, selector }),
            s().prop_map(|idx| Instruction::Block { idx }),
            Just(Instruction::BlockReturn),
            (s(), 0u32..65536, 0u32..65536)
                .prop_map(|(file, line, column)| Instruction::Dbg { file, line, column }),
        ]
    }

    proptest! {
        #[test]
        fn reencoding_is_byte_identical(program in prop::collection::vec(any_instruction(), 0..64)) {
            let mut first = BytecodeBuilder::new();
            for i in &program {
                first.emit(i);
            }
            let bytes = first.into_bytes();

            let mut second = BytecodeBuilder::new();
            for i in BytecodeDecoder::new(&bytes) {
                second.emit(&i.expect("decodes"));
            }
            prop_assert_eq!(second.into_bytes(), bytes);
        }
    }
}
