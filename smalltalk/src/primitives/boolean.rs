use crate::error::VmError;
use crate::interpreter::VM;
use crate::object::Value;
use crate::primitives::{arg, expect_block, expect_bool};

/// Activates the chosen block; its result lands on the caller's stack when
/// the block returns.
pub fn boolean_if_true_if_false(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let condition = expect_bool(vm, &receiver)?;
    let chosen = arg(vm, args, if condition { 0 } else { 1 })?;
    let block = expect_block(vm, chosen)?;
    vm.activate_block(&block, Vec::new())?;
    Ok(None)
}

/// Answers nil without touching the block when the receiver is false.
pub fn boolean_if_true(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let condition = expect_bool(vm, &receiver)?;
    let block = expect_block(vm, arg(vm, args, 0)?)?;
    if !condition {
        return Ok(Some(Value::Nil));
    }
    vm.activate_block(&block, Vec::new())?;
    Ok(None)
}

pub fn boolean_not(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    let condition = expect_bool(vm, &receiver)?;
    Ok(Some(Value::Bool(!condition)))
}
