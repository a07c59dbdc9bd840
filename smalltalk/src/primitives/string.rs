use crate::error::VmError;
use crate::interpreter::VM;
use crate::object::Value;
use crate::primitives::{arg, expect_str};

/// Class side `new:`; the string holds the argument's text.
pub fn string_new(vm: &mut VM, _receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let text = arg(vm, args, 0)?.to_string();
    Ok(Some(Value::string(&text)))
}

/// `,` concatenates the receiver with the argument's text.
pub fn string_cat(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let head = expect_str(vm, &receiver)?;
    let tail = arg(vm, args, 0)?.to_string();
    Ok(Some(Value::string(&format!("{head}{tail}"))))
}

/// Equal when the argument renders to the same text.
pub fn string_eq(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let this = expect_str(vm, &receiver)?;
    let other = arg(vm, args, 0)?.to_string();
    Ok(Some(Value::Bool(*this == *other)))
}

pub fn string_as_array(vm: &mut VM, receiver: Value, _args: &[Value]) -> Result<Option<Value>, VmError> {
    let this = expect_str(vm, &receiver)?;
    let chars = this.chars().map(Value::Char).collect();
    Ok(Some(Value::array(chars)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_vm;

    #[test]
    fn concatenation_uses_as_string() {
        let mut vm = test_vm();
        let joined = string_cat(&mut vm, Value::string("n = "), &[Value::Int(3)]).unwrap();
        assert_eq!(joined, Some(Value::string("n = 3")));
    }

    #[test]
    fn equality_and_explosion() {
        let mut vm = test_vm();
        let eq = string_eq(&mut vm, Value::string("3"), &[Value::Int(3)]).unwrap();
        assert_eq!(eq, Some(Value::Bool(true)));
        let chars = string_as_array(&mut vm, Value::string("ab"), &[]).unwrap();
        assert_eq!(chars, Some(Value::array(vec![Value::Char('a'), Value::Char('b')])));
    }
}
