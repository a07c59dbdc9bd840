//! The standard class library compiled ahead of every program.

use crate::ast::{Body, ClassDef, Expr, MethodDef, Stat};

fn prim(selector: &str, args: &[&str], tag: &str) -> MethodDef {
    MethodDef::primitive(selector, args, tag)
}

fn object() -> ClassDef {
    ClassDef::new("Object", None, &[])
        .method(prim("asString", &[], "Object_ASSTRING"))
        .method(prim("className", &[], "Object_CLASSNAME"))
        .method(prim("==", &["other"], "Object_SAME"))
        .method(prim("hash", &[], "Object_HASH"))
        .method(MethodDef::code(
            "printString",
            &[],
            &[],
            Body::new(vec![Stat::ret(Expr::SelfRef.send("asString", vec![]))]),
        ))
        .method(prim("basicNew", &[], "Object_Class_BASICNEW").class_side())
        .method(
            MethodDef::code(
                "new",
                &[],
                &[],
                Body::new(vec![Stat::ret(Expr::SelfRef.send("basicNew", vec![]))]),
            )
            .class_side(),
        )
        .method(prim("error:", &["msg"], "Object_Class_ERROR").class_side())
}

fn boolean() -> ClassDef {
    ClassDef::new("Boolean", None, &[])
        .method(prim("ifTrue:ifFalse:", &["t", "f"], "Boolean_IFTRUE_IFFALSE"))
        .method(prim("ifTrue:", &["t"], "Boolean_IFTRUE"))
        .method(prim("not", &[], "Boolean_NOT"))
}

fn integer() -> ClassDef {
    ClassDef::new("Integer", None, &[])
        .method(prim("+", &["x"], "Integer_ADD"))
        .method(prim("-", &["x"], "Integer_SUB"))
        .method(prim("*", &["x"], "Integer_MULT"))
        .method(prim("/", &["x"], "Integer_DIV"))
        .method(prim("<", &["x"], "Integer_LT"))
        .method(prim("<=", &["x"], "Integer_LE"))
        .method(prim(">", &["x"], "Integer_GT"))
        .method(prim(">=", &["x"], "Integer_GE"))
        .method(prim("=", &["x"], "Integer_EQ"))
        .method(prim("\\\\", &["x"], "Integer_MOD"))
        .method(prim("asFloat", &[], "Integer_ASFLOAT"))
}

fn float() -> ClassDef {
    ClassDef::new("Float", None, &[])
        .method(prim("+", &["x"], "Float_ADD"))
        .method(prim("-", &["x"], "Float_SUB"))
        .method(prim("*", &["x"], "Float_MULT"))
        .method(prim("/", &["x"], "Float_DIV"))
        .method(prim("<", &["x"], "Float_LT"))
        .method(prim("<=", &["x"], "Float_LE"))
        .method(prim(">", &["x"], "Float_GT"))
        .method(prim(">=", &["x"], "Float_GE"))
        .method(prim("=", &["x"], "Float_EQ"))
        .method(prim("asInteger", &[], "Float_ASINTEGER"))
}

/// Library classes, superclasses first.
pub fn classes() -> Vec<ClassDef> {
    vec![
        object(),
        ClassDef::new("UndefinedObject", None, &[]),
        boolean(),
        integer(),
        float(),
        ClassDef::new("Character", None, &[])
            .method(prim("asInteger", &[], "Character_ASINTEGER"))
            .method(prim("value:", &["code"], "Character_Class_NEW").class_side()),
        ClassDef::new("String", None, &[])
            .method(prim("new:", &["s"], "String_Class_NEW").class_side())
            .method(prim(",", &["s"], "String_CAT"))
            .method(prim("=", &["s"], "String_EQ"))
            .method(prim("asArray", &[], "String_ASARRAY")),
        ClassDef::new("Array", None, &[])
            .method(prim("new:", &["size"], "Array_Class_NEW").class_side())
            .method(prim("size", &[], "Array_SIZE"))
            .method(prim("at:", &["i"], "Array_AT"))
            .method(prim("at:put:", &["i", "v"], "Array_AT_PUT")),
        ClassDef::new("BlockDescriptor", None, &[])
            .method(prim("value", &[], "BlockDescriptor_VALUE"))
            .method(prim("value:", &["a"], "BlockDescriptor_VALUE_1_ARG"))
            .method(prim("value:value:", &["a", "b"], "BlockDescriptor_VALUE_2_ARGS")),
        ClassDef::new("TranscriptStream", None, &[]).method(prim("show:", &["x"], "TranscriptStream_SHOW")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::PRIMITIVES;

    #[test]
    fn every_primitive_is_reachable_from_the_library() {
        let tags: Vec<String> = classes()
            .iter()
            .flat_map(|c| c.methods.iter())
            .filter_map(|m| match &m.kind {
                crate::ast::MethodKind::Primitive(tag) => Some(tag.clone()),
                crate::ast::MethodKind::Code(_) => None,
            })
            .collect();
        for desc in &PRIMITIVES {
            assert!(tags.iter().any(|t| t == desc.name), "{} is never used", desc.name);
        }
    }
}
