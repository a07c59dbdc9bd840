use crate::error::VmError;
use crate::interpreter::VM;
use crate::object::Value;
use crate::primitives::expect_block;

/// `value`, `value:` and `value:value:`; arguments bind in order.
pub fn block_value(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let closure = expect_block(vm, &receiver)?;
    vm.activate_block(&closure, args.to_vec())?;
    Ok(None)
}
