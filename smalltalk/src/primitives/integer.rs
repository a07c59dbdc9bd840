use crate::error::{VmError, VmErrorKind};
use crate::interpreter::VM;
use crate::object::Value;
use crate::primitives::{arg, expect_int};

fn operands(vm: &VM, receiver: &Value, args: &[Value]) -> Result<(i32, i32), VmError> {
    let a = expect_int(vm, receiver)?;
    let b = expect_int(vm, arg(vm, args, 0)?)?;
    Ok((a, b))
}

fn nonzero(vm: &VM, divisor: i32) -> Result<i32, VmError> {
    if divisor == 0 {
        return Err(vm.error(VmErrorKind::InternalVmError, "division by zero"));
    }
    Ok(divisor)
}

pub fn integer_add(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Int(a.wrapping_add(b))))
}

pub fn integer_sub(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Int(a.wrapping_sub(b))))
}

pub fn integer_mul(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Int(a.wrapping_mul(b))))
}

/// Truncating division.
pub fn integer_div(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    let b = nonzero(vm, b)?;
    Ok(Some(Value::Int(a.wrapping_div(b))))
}

/// `\\`; the sign follows the dividend.
pub fn integer_mod(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    let b = nonzero(vm, b)?;
    Ok(Some(Value::Int(a.wrapping_rem(b))))
}

pub fn integer_lt(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Bool(a < b)))
}

pub fn integer_le(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Bool(a <= b)))
}

pub fn integer_gt(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Bool(a > b)))
}

pub fn integer_ge(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Bool(a >= b)))
}

/// Comparing with a non-integer answers false rather than failing.
pub fn integer_eq(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let a = expect_int(vm, &receiver)?;
    let equal = matches!(arg(vm, args, 0)?, Value::Int(b) if *b == a);
    Ok(Some(Value::Bool(equal)))
}

pub fn integer_as_float(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    let a = expect_int(vm, &receiver)?;
    Ok(Some(Value::Float(a as f32)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_vm;

    #[test]
    fn arithmetic_wraps_and_truncates() {
        let mut vm = test_vm();
        let add = integer_add(&mut vm, Value::Int(i32::MAX), &[Value::Int(1)]).unwrap();
        assert_eq!(add, Some(Value::Int(i32::MIN)));
        let div = integer_div(&mut vm, Value::Int(-7), &[Value::Int(2)]).unwrap();
        assert_eq!(div, Some(Value::Int(-3)));
        let rem = integer_mod(&mut vm, Value::Int(-7), &[Value::Int(2)]).unwrap();
        assert_eq!(rem, Some(Value::Int(-1)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut vm = test_vm();
        let err = integer_div(&mut vm, Value::Int(1), &[Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::InternalVmError);
        assert_eq!(err.message, "division by zero");
    }

    #[test]
    fn operands_must_be_integers() {
        let mut vm = test_vm();
        let err = integer_add(&mut vm, Value::Int(1), &[Value::string("x")]).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::TypeError);
        assert_eq!(err.message, "expected Integer, got String");
        let eq = integer_eq(&mut vm, Value::Int(1), &[Value::string("x")]).unwrap();
        assert_eq!(eq, Some(Value::Bool(false)));
    }
}
