//! Native method implementations.
//!
//! A primitive method carries a [`Primitive`] tag resolved once at compile
//! time; the dispatcher indexes [`PRIMITIVES`] with it. The receiver and
//! arguments are already popped when a primitive runs. It returns the value
//! to push, or `None` when it activated a block instead.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::error::{VmError, VmErrorKind};
use crate::interpreter::VM;
use crate::object::{BlockDescriptor, MetaClass, Value};

pub mod array;
pub mod block;
pub mod boolean;
pub mod character;
pub mod float;
pub mod integer;
pub mod object;
pub mod string;
pub mod transcript;

pub type PrimitiveFn = fn(&mut VM, Value, &[Value]) -> Result<Option<Value>, VmError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    ObjectAsString,
    ObjectClassName,
    ObjectSame,
    ObjectHash,
    ObjectBasicNew,
    ObjectError,
    IntegerAdd,
    IntegerSub,
    IntegerMul,
    IntegerDiv,
    IntegerLt,
    IntegerLe,
    IntegerGt,
    IntegerGe,
    IntegerEq,
    IntegerMod,
    IntegerAsFloat,
    FloatAdd,
    FloatSub,
    FloatMul,
    FloatDiv,
    FloatLt,
    FloatLe,
    FloatGt,
    FloatGe,
    FloatEq,
    FloatAsInteger,
    StringNew,
    StringCat,
    StringEq,
    StringAsArray,
    ArrayNew,
    ArraySize,
    ArrayAt,
    ArrayAtPut,
    BooleanIfTrueIfFalse,
    BooleanIfTrue,
    BooleanNot,
    CharacterAsInteger,
    CharacterNew,
    BlockValue,
    BlockValue1,
    BlockValue2,
    TranscriptShow,
}

#[derive(Clone, Copy)]
pub struct PrimitiveDesc {
    pub primitive: Primitive,
    pub name: &'static str,
    pub arity: u8,
    pub func: PrimitiveFn,
}

impl PrimitiveDesc {
    pub const fn new(primitive: Primitive, name: &'static str, arity: u8, func: PrimitiveFn) -> Self {
        Self {
            primitive,
            name,
            arity,
            func,
        }
    }
}

/// Indexed by `Primitive as usize`.
pub static PRIMITIVES: [PrimitiveDesc; 44] = {
    use Primitive as P;
    [
        PrimitiveDesc::new(P::ObjectAsString, "Object_ASSTRING", 0, object::object_as_string),
        PrimitiveDesc::new(P::ObjectClassName, "Object_CLASSNAME", 0, object::object_class_name),
        PrimitiveDesc::new(P::ObjectSame, "Object_SAME", 1, object::object_same),
        PrimitiveDesc::new(P::ObjectHash, "Object_HASH", 0, object::object_hash),
        PrimitiveDesc::new(P::ObjectBasicNew, "Object_Class_BASICNEW", 0, object::object_basic_new),
        PrimitiveDesc::new(P::ObjectError, "Object_Class_ERROR", 1, object::object_error),
        PrimitiveDesc::new(P::IntegerAdd, "Integer_ADD", 1, integer::integer_add),
        PrimitiveDesc::new(P::IntegerSub, "Integer_SUB", 1, integer::integer_sub),
        PrimitiveDesc::new(P::IntegerMul, "Integer_MULT", 1, integer::integer_mul),
        PrimitiveDesc::new(P::IntegerDiv, "Integer_DIV", 1, integer::integer_div),
        PrimitiveDesc::new(P::IntegerLt, "Integer_LT", 1, integer::integer_lt),
        PrimitiveDesc::new(P::IntegerLe, "Integer_LE", 1, integer::integer_le),
        PrimitiveDesc::new(P::IntegerGt, "Integer_GT", 1, integer::integer_gt),
        PrimitiveDesc::new(P::IntegerGe, "Integer_GE", 1, integer::integer_ge),
        PrimitiveDesc::new(P::IntegerEq, "Integer_EQ", 1, integer::integer_eq),
        PrimitiveDesc::new(P::IntegerMod, "Integer_MOD", 1, integer::integer_mod),
        PrimitiveDesc::new(P::IntegerAsFloat, "Integer_ASFLOAT", 0, integer::integer_as_float),
        PrimitiveDesc::new(P::FloatAdd, "Float_ADD", 1, float::float_add),
        PrimitiveDesc::new(P::FloatSub, "Float_SUB", 1, float::float_sub),
        PrimitiveDesc::new(P::FloatMul, "Float_MULT", 1, float::float_mul),
        PrimitiveDesc::new(P::FloatDiv, "Float_DIV", 1, float::float_div),
        PrimitiveDesc::new(P::FloatLt, "Float_LT", 1, float::float_lt),
        PrimitiveDesc::new(P::FloatLe, "Float_LE", 1, float::float_le),
        PrimitiveDesc::new(P::FloatGt, "Float_GT", 1, float::float_gt),
        PrimitiveDesc::new(P::FloatGe, "Float_GE", 1, float::float_ge),
        PrimitiveDesc::new(P::FloatEq, "Float_EQ", 1, float::float_eq),
        PrimitiveDesc::new(P::FloatAsInteger, "Float_ASINTEGER", 0, float::float_as_integer),
        PrimitiveDesc::new(P::StringNew, "String_Class_NEW", 1, string::string_new),
        PrimitiveDesc::new(P::StringCat, "String_CAT", 1, string::string_cat),
        PrimitiveDesc::new(P::StringEq, "String_EQ", 1, string::string_eq),
        PrimitiveDesc::new(P::StringAsArray, "String_ASARRAY", 0, string::string_as_array),
        PrimitiveDesc::new(P::ArrayNew, "Array_Class_NEW", 1, array::array_new),
        PrimitiveDesc::new(P::ArraySize, "Array_SIZE", 0, array::array_size),
        PrimitiveDesc::new(P::ArrayAt, "Array_AT", 1, array::array_at),
        PrimitiveDesc::new(P::ArrayAtPut, "Array_AT_PUT", 2, array::array_at_put),
        PrimitiveDesc::new(
            P::BooleanIfTrueIfFalse,
            "Boolean_IFTRUE_IFFALSE",
            2,
            boolean::boolean_if_true_if_false,
        ),
        PrimitiveDesc::new(P::BooleanIfTrue, "Boolean_IFTRUE", 1, boolean::boolean_if_true),
        PrimitiveDesc::new(P::BooleanNot, "Boolean_NOT", 0, boolean::boolean_not),
        PrimitiveDesc::new(
            P::CharacterAsInteger,
            "Character_ASINTEGER",
            0,
            character::character_as_integer,
        ),
        PrimitiveDesc::new(P::CharacterNew, "Character_Class_NEW", 1, character::character_new),
        PrimitiveDesc::new(P::BlockValue, "BlockDescriptor_VALUE", 0, block::block_value),
        PrimitiveDesc::new(P::BlockValue1, "BlockDescriptor_VALUE_1_ARG", 1, block::block_value),
        PrimitiveDesc::new(P::BlockValue2, "BlockDescriptor_VALUE_2_ARGS", 2, block::block_value),
        PrimitiveDesc::new(P::TranscriptShow, "TranscriptStream_SHOW", 1, transcript::transcript_show),
    ]
};

static BY_NAME: Lazy<HashMap<&'static str, Primitive>> =
    Lazy::new(|| PRIMITIVES.iter().map(|d| (d.name, d.primitive)).collect());

impl Primitive {
    pub fn desc(self) -> &'static PrimitiveDesc {
        &PRIMITIVES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.desc().name
    }

    pub fn arity(self) -> usize {
        self.desc().arity as usize
    }

    /// Resolve a primitive tag such as `Integer_ADD`.
    pub fn from_name(name: &str) -> Option<Self> {
        BY_NAME.get(name).copied()
    }
}

pub(crate) fn arg<'a>(vm: &VM, args: &'a [Value], index: usize) -> Result<&'a Value, VmError> {
    args.get(index).ok_or_else(|| {
        vm.error(
            VmErrorKind::StackUnderflow,
            format!("missing primitive argument {index}"),
        )
    })
}

fn type_error(vm: &VM, expected: &str, got: &Value) -> VmError {
    vm.error(
        VmErrorKind::TypeError,
        format!("expected {expected}, got {}", vm.class_name(got)),
    )
}

pub(crate) fn expect_int(vm: &VM, value: &Value) -> Result<i32, VmError> {
    match value {
        Value::Int(v) => Ok(*v),
        other => Err(type_error(vm, "Integer", other)),
    }
}

pub(crate) fn expect_float(vm: &VM, value: &Value) -> Result<f32, VmError> {
    match value {
        Value::Float(v) => Ok(*v),
        other => Err(type_error(vm, "Float", other)),
    }
}

pub(crate) fn expect_bool(vm: &VM, value: &Value) -> Result<bool, VmError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(type_error(vm, "Boolean", other)),
    }
}

pub(crate) fn expect_char(vm: &VM, value: &Value) -> Result<char, VmError> {
    match value {
        Value::Char(c) => Ok(*c),
        other => Err(type_error(vm, "Character", other)),
    }
}

pub(crate) fn expect_str(vm: &VM, value: &Value) -> Result<Rc<str>, VmError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(type_error(vm, "String", other)),
    }
}

pub(crate) fn expect_array(vm: &VM, value: &Value) -> Result<Rc<RefCell<Vec<Value>>>, VmError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        other => Err(type_error(vm, "Array", other)),
    }
}

pub(crate) fn expect_block(vm: &VM, value: &Value) -> Result<Rc<BlockDescriptor>, VmError> {
    match value {
        Value::Block(b) => Ok(b.clone()),
        other => Err(type_error(vm, "BlockDescriptor", other)),
    }
}

pub(crate) fn expect_class(vm: &VM, value: &Value) -> Result<Rc<MetaClass>, VmError> {
    match value {
        Value::Class(c) => Ok(c.clone()),
        other => Err(type_error(vm, "a class", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_discriminant() {
        for (i, desc) in PRIMITIVES.iter().enumerate() {
            assert_eq!(desc.primitive as usize, i, "{} is out of place", desc.name);
        }
    }

    #[test]
    fn names_resolve_back() {
        for desc in &PRIMITIVES {
            assert_eq!(Primitive::from_name(desc.name), Some(desc.primitive));
        }
        assert_eq!(Primitive::from_name("Integer_ADD"), Some(Primitive::IntegerAdd));
        assert_eq!(Primitive::from_name("Integer_POW"), None);
        assert_eq!(Primitive::BlockValue2.arity(), 2);
    }
}
