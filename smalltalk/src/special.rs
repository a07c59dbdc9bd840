//! The system dictionary: classes and predefined globals.
//!
//! Built once from a [`CompiledProgram`] before anything runs and read-only
//! afterwards. Each VM owns its own dictionary.

use std::collections::HashMap;
use std::rc::Rc;

use crate::compile::CompiledProgram;
use crate::error::{VmError, VmErrorKind};
use crate::object::{Instance, MetaClass, Value};

/// Classes the VM maps its built-in values to.
struct WellKnown {
    undefined_object: Rc<MetaClass>,
    boolean: Rc<MetaClass>,
    integer: Rc<MetaClass>,
    float: Rc<MetaClass>,
    character: Rc<MetaClass>,
    string: Rc<MetaClass>,
    array: Rc<MetaClass>,
    block_descriptor: Rc<MetaClass>,
}

pub struct SystemDictionary {
    classes: HashMap<String, Rc<MetaClass>>,
    /// Definition order, superclasses first.
    order: Vec<Rc<MetaClass>>,
    transcript: Value,
    known: WellKnown,
}

fn unknown_class(message: String) -> VmError {
    VmError::new(VmErrorKind::UnknownClass, message, String::new())
}

impl SystemDictionary {
    /// Build the metaclasses of `program` and link every compiled block to
    /// its class. Superclasses must precede their subclasses.
    pub fn bootstrap(program: CompiledProgram) -> Result<Self, VmError> {
        let mut classes: HashMap<String, Rc<MetaClass>> = HashMap::new();
        let mut order = Vec::with_capacity(program.classes.len());

        for class in program.classes {
            let superclass = match &class.superclass {
                Some(name) => Some(classes.get(name).cloned().ok_or_else(|| {
                    unknown_class(format!("superclass {name} of {} is not defined", class.name))
                })?),
                None => None,
            };
            let meta = MetaClass::new(&class.name, superclass, class.fields, class.methods);
            log::debug!("installed class {} ({} fields)", meta.name, meta.num_fields());
            classes.insert(class.name, meta.clone());
            order.push(meta);
        }

        let required = |name: &str| {
            classes
                .get(name)
                .cloned()
                .ok_or_else(|| unknown_class(format!("missing system class {name}")))
        };
        let known = WellKnown {
            undefined_object: required("UndefinedObject")?,
            boolean: required("Boolean")?,
            integer: required("Integer")?,
            float: required("Float")?,
            character: required("Character")?,
            string: required("String")?,
            array: required("Array")?,
            block_descriptor: required("BlockDescriptor")?,
        };
        let transcript = Value::Object(Instance::new(required("TranscriptStream")?));

        Ok(Self {
            classes,
            order,
            transcript,
            known,
        })
    }

    /// Resolve a global name: a class, `Transcript` or `nil`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "nil" => Some(Value::Nil),
            "Transcript" => Some(self.transcript.clone()),
            _ => self.classes.get(name).cloned().map(Value::Class),
        }
    }

    pub fn lookup_class(&self, name: &str) -> Option<Rc<MetaClass>> {
        self.classes.get(name).cloned()
    }

    pub fn classes(&self) -> &[Rc<MetaClass>] {
        &self.order
    }

    /// Dispatch class of a value. A class object is its own class, so
    /// class-side and instance-side methods live in one table.
    pub fn class_of(&self, value: &Value) -> Rc<MetaClass> {
        let known = &self.known;
        match value {
            Value::Nil => known.undefined_object.clone(),
            Value::Bool(_) => known.boolean.clone(),
            Value::Int(_) => known.integer.clone(),
            Value::Float(_) => known.float.clone(),
            Value::Char(_) => known.character.clone(),
            Value::Str(_) => known.string.clone(),
            Value::Array(_) => known.array.clone(),
            Value::Block(_) => known.block_descriptor.clone(),
            Value::Object(obj) => obj.class.clone(),
            Value::Class(class) => class.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::compile::Compiler;

    fn dictionary() -> SystemDictionary {
        let program = Compiler::default().compile(Program::new()).unwrap();
        SystemDictionary::bootstrap(program).unwrap()
    }

    #[test]
    fn values_map_to_library_classes() {
        let dict = dictionary();
        assert_eq!(dict.class_of(&Value::Int(1)).name, "Integer");
        assert_eq!(dict.class_of(&Value::Nil).name, "UndefinedObject");
        assert_eq!(dict.class_of(&Value::string("s")).name, "String");
        let array = dict.lookup_class("Array").unwrap();
        assert!(Rc::ptr_eq(&dict.class_of(&Value::Class(array.clone())), &array));
        assert_eq!(dict.classes()[0].name, "Object");
    }

    #[test]
    fn predefined_globals() {
        let dict = dictionary();
        assert_eq!(dict.lookup("nil"), Some(Value::Nil));
        let transcript = dict.lookup("Transcript").unwrap();
        assert_eq!(dict.class_of(&transcript).name, "TranscriptStream");
        assert!(dict.lookup("Nope").is_none());
    }

    #[test]
    fn methods_are_linked_to_their_class() {
        let dict = dictionary();
        let integer = dict.lookup_class("Integer").unwrap();
        let add = integer.resolve_method("+").unwrap();
        assert_eq!(add.owner().unwrap().name, "Integer");
        let print = integer.resolve_method("printString").unwrap();
        assert_eq!(print.owner().unwrap().name, "Object");
    }

    #[test]
    fn missing_system_class_is_reported() {
        let err = SystemDictionary::bootstrap(CompiledProgram::default())
            .err()
            .unwrap();
        assert_eq!(err.kind, VmErrorKind::UnknownClass);
        assert_eq!(err.message, "missing system class UndefinedObject");
    }
}
