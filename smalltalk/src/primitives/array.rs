use crate::error::{VmError, VmErrorKind};
use crate::interpreter::VM;
use crate::object::Value;
use crate::primitives::{arg, expect_array, expect_int};

/// Largest array `new:` will allocate.
pub const MAX_ARRAY_SIZE: i32 = 1 << 24;

/// Convert a 1-based Smalltalk index into a vector offset.
fn offset(vm: &VM, index: i32, len: usize) -> Result<usize, VmError> {
    if index >= 1 && index as usize <= len {
        return Ok(index as usize - 1);
    }
    Err(vm.error(
        VmErrorKind::IndexOutOfRange,
        format!("index {index} out of bounds for size {len}"),
    ))
}

/// Class side `new:`; `size` nils.
pub fn array_new(vm: &mut VM, _receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let size = expect_int(vm, arg(vm, args, 0)?)?;
    if size < 0 {
        return Err(vm.error(
            VmErrorKind::IndexOutOfRange,
            format!("negative array size {size}"),
        ));
    }
    if size > MAX_ARRAY_SIZE {
        return Err(vm.error(
            VmErrorKind::IndexOutOfRange,
            format!("array size {size} exceeds {MAX_ARRAY_SIZE}"),
        ));
    }
    let mut items = Vec::new();
    if let Err(e) = items.try_reserve_exact(size as usize) {
        return Err(vm.error(
            VmErrorKind::InternalVmError,
            format!("cannot allocate array of {size}: {e}"),
        ));
    }
    items.resize(size as usize, Value::Nil);
    Ok(Some(Value::array(items)))
}

pub fn array_size(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    let items = expect_array(vm, &receiver)?;
    let len = items.borrow().len();
    Ok(Some(Value::Int(len as i32)))
}

pub fn array_at(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let items = expect_array(vm, &receiver)?;
    let index = expect_int(vm, arg(vm, args, 0)?)?;
    let items = items.borrow();
    let i = offset(vm, index, items.len())?;
    Ok(Some(items[i].clone()))
}

/// Answers the stored value.
pub fn array_at_put(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let items = expect_array(vm, &receiver)?;
    let index = expect_int(vm, arg(vm, args, 0)?)?;
    let value = arg(vm, args, 1)?.clone();
    let len = items.borrow().len();
    let i = offset(vm, index, len)?;
    items.borrow_mut()[i] = value.clone();
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_vm;

    #[test]
    fn indexing_is_one_based() {
        let mut vm = test_vm();
        let array = array_new(&mut vm, Value::Nil, &[Value::Int(2)]).unwrap().unwrap();
        assert_eq!(array.to_string(), "{nil. nil}");
        array_at_put(&mut vm, array.clone(), &[Value::Int(1), Value::Int(9)]).unwrap();
        let first = array_at(&mut vm, array.clone(), &[Value::Int(1)]).unwrap();
        assert_eq!(first, Some(Value::Int(9)));
        let size = array_size(&mut vm, array, &[]).unwrap();
        assert_eq!(size, Some(Value::Int(2)));
    }

    #[test]
    fn oversized_arrays_are_refused() {
        let mut vm = test_vm();
        for size in [i32::MAX, MAX_ARRAY_SIZE + 1, -1] {
            let err = array_new(&mut vm, Value::Nil, &[Value::Int(size)]).unwrap_err();
            assert_eq!(err.kind, VmErrorKind::IndexOutOfRange, "size {size}");
        }
        let empty = array_new(&mut vm, Value::Nil, &[Value::Int(0)]).unwrap().unwrap();
        assert_eq!(empty.to_string(), "{}");
    }

    #[test]
    fn out_of_range_index() {
        let mut vm = test_vm();
        let array = Value::array(vec![Value::Nil]);
        for index in [0, 2, -1] {
            let err = array_at(&mut vm, array.clone(), &[Value::Int(index)]).unwrap_err();
            assert_eq!(err.kind, VmErrorKind::IndexOutOfRange);
        }
    }
}
