use crate::error::{VmError, VmErrorKind};
use crate::interpreter::VM;
use crate::object::{Instance, Value};
use crate::primitives::{arg, expect_class};

pub fn object_as_string(_vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    Ok(Some(Value::string(&receiver.to_string())))
}

pub fn object_class_name(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    Ok(Some(Value::string(&vm.class_name(&receiver))))
}

pub fn object_same(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let other = arg(vm, args, 0)?;
    Ok(Some(Value::Bool(receiver.identical(other))))
}

pub fn object_hash(_vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    Ok(Some(Value::Int(receiver.identity_hash())))
}

/// Class side: a fresh instance with nil fields.
pub fn object_basic_new(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    let class = expect_class(vm, &receiver)?;
    Ok(Some(Value::Object(Instance::new(class))))
}

/// Class side `error:`; raises a user error carrying the argument's text.
pub fn object_error(vm: &mut VM, _receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let message = arg(vm, args, 0)?.to_string();
    Err(vm.error(VmErrorKind::Error, message))
}
