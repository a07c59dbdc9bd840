use crate::error::VmError;
use crate::interpreter::VM;
use crate::object::Value;
use crate::primitives::{arg, expect_float};

fn operands(vm: &VM, receiver: &Value, args: &[Value]) -> Result<(f32, f32), VmError> {
    let a = expect_float(vm, receiver)?;
    let b = expect_float(vm, arg(vm, args, 0)?)?;
    Ok((a, b))
}

pub fn float_add(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Float(a + b)))
}

pub fn float_sub(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Float(a - b)))
}

pub fn float_mul(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Float(a * b)))
}

/// IEEE division; dividing by zero gives an infinity or NaN.
pub fn float_div(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Float(a / b)))
}

pub fn float_lt(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Bool(a < b)))
}

pub fn float_le(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Bool(a <= b)))
}

pub fn float_gt(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Bool(a > b)))
}

pub fn float_ge(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let (a, b) = operands(vm, &receiver, args)?;
    Ok(Some(Value::Bool(a >= b)))
}

pub fn float_eq(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let a = expect_float(vm, &receiver)?;
    let equal = matches!(arg(vm, args, 0)?, Value::Float(b) if *b == a);
    Ok(Some(Value::Bool(equal)))
}

/// Truncates toward zero, saturating at the integer range.
pub fn float_as_integer(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    let a = expect_float(vm, &receiver)?;
    Ok(Some(Value::Int(a as i32)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmErrorKind;
    use crate::interpreter::test_vm;

    #[test]
    fn float_ops() {
        let mut vm = test_vm();
        let sum = float_add(&mut vm, Value::Float(1.5), &[Value::Float(2.25)]).unwrap();
        assert_eq!(sum, Some(Value::Float(3.75)));
        let lt = float_lt(&mut vm, Value::Float(1.0), &[Value::Float(2.0)]).unwrap();
        assert_eq!(lt, Some(Value::Bool(true)));
        let int = float_as_integer(&mut vm, Value::Float(-2.9), &[]).unwrap();
        assert_eq!(int, Some(Value::Int(-2)));
    }

    #[test]
    fn integer_argument_is_a_type_error() {
        let mut vm = test_vm();
        let err = float_mul(&mut vm, Value::Float(1.0), &[Value::Int(2)]).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::TypeError);
    }
}
