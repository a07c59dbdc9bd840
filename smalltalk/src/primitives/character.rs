use crate::error::{VmError, VmErrorKind};
use crate::interpreter::VM;
use crate::object::Value;
use crate::primitives::{arg, expect_char, expect_int};

pub fn character_as_integer(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    let c = expect_char(vm, &receiver)?;
    Ok(Some(Value::Int(c as i32)))
}

/// Class side `value:`; the character with the given code point.
pub fn character_new(vm: &mut VM, _receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let code = expect_int(vm, arg(vm, args, 0)?)?;
    let c = u32::try_from(code).ok().and_then(char::from_u32).ok_or_else(|| {
        vm.error(
            VmErrorKind::TypeError,
            format!("{code} is not a character code"),
        )
    })?;
    Ok(Some(Value::Char(c)))
}
