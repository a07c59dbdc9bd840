//! Built-in sample programs run by the `smalltalk` binary.
//!
//! There is no parser, so each demo builds its tree directly. Positions are
//! those of the source shown in the demo's doc comment.

use crate::ast::{BlockExpr, Body, ClassDef, Expr, MainBody, MethodDef, Program, Stat};

pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    pub build: fn() -> Program,
}

pub fn all() -> &'static [Demo] {
    &DEMOS
}

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|d| d.name == name)
}

static DEMOS: [Demo; 9] = [
    Demo {
        name: "arith",
        description: "3 + 4",
        build: arith,
    },
    Demo {
        name: "counter",
        description: "a Counter incremented twice",
        build: counter,
    },
    Demo {
        name: "closure",
        description: "one closure invoked twice after its method returned",
        build: closure,
    },
    Demo {
        name: "nonlocal",
        description: "^ from inside an ifTrue: block",
        build: nonlocal,
    },
    Demo {
        name: "super",
        description: "super sends up a three-class chain",
        build: super_chain,
    },
    Demo {
        name: "collections",
        description: "arrays, strings and characters",
        build: collections,
    },
    Demo {
        name: "class-mismatch",
        description: "class-side new sent to an integer (fails)",
        build: class_mismatch,
    },
    Demo {
        name: "instance-on-class",
        description: "instance method sent to a class (fails)",
        build: instance_on_class,
    },
    Demo {
        name: "dead-return",
        description: "^ through a closure whose method already returned (fails)",
        build: dead_return,
    },
];

fn send(receiver: Expr, selector: &str, args: Vec<Expr>) -> Expr {
    receiver.send(selector, args)
}

fn show(value: Expr) -> Stat {
    Stat::expr(send(Expr::ident("Transcript"), "show:", vec![value]))
}

/// `3 + 4`
fn arith() -> Program {
    Program::new().with_main(MainBody::new(
        &[],
        Body::new(vec![Stat::expr(send(Expr::int(3), "+", vec![Expr::int(4)]).at(1, 2))]).ending_at(1, 5),
    ))
}

/// ```text
/// class Counter [
///     |n|
///     init [ n := 0 ]
///     incr [ n := n + 1 ]
///     value [ ^n ]
/// ]
/// c := Counter new. c init. c incr. c incr. c value
/// ```
pub fn counter_class() -> ClassDef {
    ClassDef::new("Counter", None, &["n"])
        .method(MethodDef::code(
            "init",
            &[],
            &[],
            Body::new(vec![Stat::assign("n", Expr::int(0)).at(3, 11)]).ending_at(3, 20),
        ))
        .method(MethodDef::code(
            "incr",
            &[],
            &[],
            Body::new(vec![
                Stat::assign("n", send(Expr::ident("n"), "+", vec![Expr::int(1)]).at(4, 20)).at(4, 11),
            ])
            .ending_at(4, 26),
        ))
        .method(MethodDef::code(
            "value",
            &[],
            &[],
            Body::new(vec![Stat::ret(Expr::ident("n")).at(5, 12)]).ending_at(5, 17),
        ))
}

fn counter() -> Program {
    let c = || Expr::ident("c");
    Program::new().with_class(counter_class()).with_main(MainBody::new(
        &["c"],
        Body::new(vec![
            Stat::assign("c", send(Expr::ident("Counter"), "new", vec![]).at(7, 13)).at(7, 0),
            Stat::expr(send(c(), "init", vec![]).at(7, 20)),
            Stat::expr(send(c(), "incr", vec![]).at(7, 28)),
            Stat::expr(send(c(), "incr", vec![]).at(7, 36)),
            Stat::expr(send(c(), "value", vec![]).at(7, 44)),
        ])
        .ending_at(7, 49),
    ))
}

/// ```text
/// class Maker [ make [ ^[:x | x + 1] ] ]
/// b := Maker new make.
/// Transcript show: (b value: 5).
/// b value: 10
/// ```
pub fn maker_class() -> ClassDef {
    let increment = BlockExpr::new(
        &["x"],
        &[],
        Body::new(vec![Stat::expr(send(Expr::ident("x"), "+", vec![Expr::int(1)]).at(1, 30))]).ending_at(1, 34),
    );
    ClassDef::new("Maker", None, &[]).method(MethodDef::code(
        "make",
        &[],
        &[],
        Body::new(vec![Stat::ret(Expr::block(increment)).at(1, 21)]).ending_at(1, 36),
    ))
}

fn closure() -> Program {
    let b = || Expr::ident("b");
    Program::new().with_class(maker_class()).with_main(MainBody::new(
        &["b"],
        Body::new(vec![
            Stat::assign("b", send(send(Expr::ident("Maker"), "new", vec![]), "make", vec![]).at(2, 15)).at(2, 0),
            show(send(b(), "value:", vec![Expr::int(5)]).at(3, 20)),
            Stat::expr(send(b(), "value:", vec![Expr::int(10)]).at(4, 2)),
        ])
        .ending_at(4, 11),
    ))
}

/// ```text
/// class Finder [ pick: flag [ flag ifTrue: [^'yes']. ^'no' ] ]
/// Transcript show: (Finder new pick: true).
/// Finder new pick: false
/// ```
fn nonlocal() -> Program {
    let yes = BlockExpr::new(&[], &[], Body::new(vec![Stat::ret(Expr::string("yes")).at(1, 42)]).ending_at(1, 49));
    let finder = ClassDef::new("Finder", None, &[]).method(MethodDef::code(
        "pick:",
        &["flag"],
        &[],
        Body::new(vec![
            Stat::expr(send(Expr::ident("flag"), "ifTrue:", vec![Expr::block(yes)]).at(1, 33)),
            Stat::ret(Expr::string("no")).at(1, 51),
        ])
        .ending_at(1, 57),
    ));
    let finder_new = || send(Expr::ident("Finder"), "new", vec![]);
    Program::new().with_class(finder).with_main(MainBody::new(
        &[],
        Body::new(vec![
            show(send(finder_new(), "pick:", vec![Expr::boolean(true)]).at(2, 29)),
            Stat::expr(send(finder_new(), "pick:", vec![Expr::boolean(false)]).at(3, 11)),
        ])
        .ending_at(3, 22),
    ))
}

/// ```text
/// class A [ name [ ^'A' ] ]
/// class B : A [ name [ ^super name , 'B' ] ]
/// class C : B [ name [ ^super name , 'C' ] ]
/// C new name
/// ```
fn super_chain() -> Program {
    let named = |class: &str, superclass: Option<&str>, line: u32| {
        let body = match superclass {
            None => Stat::ret(Expr::string(class)),
            Some(_) => Stat::ret(send(
                Expr::super_send("name", vec![]).at(line, 28),
                ",",
                vec![Expr::string(class)],
            )
            .at(line, 33)),
        };
        ClassDef::new(class, superclass, &[]).method(MethodDef::code("name", &[], &[], Body::new(vec![body.at(line, 21)])))
    };
    Program::new()
        .with_class(named("A", None, 1))
        .with_class(named("B", Some("A"), 2))
        .with_class(named("C", Some("B"), 3))
        .with_main(MainBody::new(
            &[],
            Body::new(vec![Stat::expr(send(send(Expr::ident("C"), "new", vec![]), "name", vec![]).at(4, 6))]),
        ))
}

/// ```text
/// a := Array new: 3.
/// a at: 1 put: 'x'. a at: 2 put: $y. a at: 3 put: 2.5.
/// Transcript show: a.
/// Transcript show: 'size = ' , a size.
/// #(1 2 3) at: 2
/// ```
fn collections() -> Program {
    let a = || Expr::ident("a");
    let put = |i: i32, value: Expr| Stat::expr(send(a(), "at:put:", vec![Expr::int(i), value]));
    Program::new().with_main(MainBody::new(
        &["a"],
        Body::new(vec![
            Stat::assign("a", send(Expr::ident("Array"), "new:", vec![Expr::int(3)]).at(1, 11)).at(1, 0),
            put(1, Expr::string("x")),
            put(2, Expr::char('y')),
            put(3, Expr::float(2.5)),
            show(a()),
            show(send(Expr::string("size = "), ",", vec![send(a(), "size", vec![])]).at(4, 27)),
            Stat::expr(
                send(
                    Expr::array(vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
                    "at:",
                    vec![Expr::int(2)],
                )
                .at(5, 9),
            ),
        ]),
    ))
}

/// `3 new`
fn class_mismatch() -> Program {
    Program::new().with_main(MainBody::new(
        &[],
        Body::new(vec![Stat::expr(send(Expr::int(3), "new", vec![]).at(1, 2))]),
    ))
}

/// `Counter incr`
fn instance_on_class() -> Program {
    Program::new().with_class(counter_class()).with_main(MainBody::new(
        &[],
        Body::new(vec![Stat::expr(send(Expr::ident("Counter"), "incr", vec![]).at(7, 8))]),
    ))
}

/// ```text
/// class Escaper [ escape [ ^[:x | ^x] ] ]
/// b := Escaper new escape.
/// b value: 3
/// ```
pub fn escaper_class() -> ClassDef {
    let escape = BlockExpr::new(&["x"], &[], Body::new(vec![Stat::ret(Expr::ident("x")).at(1, 32)]).ending_at(1, 35));
    ClassDef::new("Escaper", None, &[]).method(MethodDef::code(
        "escape",
        &[],
        &[],
        Body::new(vec![Stat::ret(Expr::block(escape)).at(1, 25)]).ending_at(1, 37),
    ))
}

fn dead_return() -> Program {
    Program::new().with_class(escaper_class()).with_main(MainBody::new(
        &["b"],
        Body::new(vec![
            Stat::assign("b", send(send(Expr::ident("Escaper"), "new", vec![]), "escape", vec![]).at(2, 17)).at(2, 0),
            Stat::expr(send(Expr::ident("b"), "value:", vec![Expr::int(3)]).at(3, 2)),
        ]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::error::VmErrorKind;
    use crate::interpreter::{VM, VmOptions};
    use crate::object::Value;
    use crate::primitives::transcript::Transcript;

    fn run(name: &str) -> (Result<Value, crate::error::VmError>, String) {
        let demo = find(name).unwrap();
        let program = Compiler::default().compile((demo.build)()).unwrap();
        let transcript = Transcript::buffer();
        let mut vm = VM::with_options(program, VmOptions::default(), transcript.clone()).unwrap();
        let result = vm.exec_main();
        (result, transcript.contents())
    }

    #[test]
    fn demo_names_are_unique() {
        for (i, demo) in all().iter().enumerate() {
            assert!(all()[i + 1..].iter().all(|d| d.name != demo.name));
        }
    }

    #[test]
    fn successful_demos() {
        assert_eq!(run("arith").0.unwrap(), Value::Int(7));
        assert_eq!(run("counter").0.unwrap(), Value::Int(2));
        assert_eq!(run("closure"), (Ok(Value::Int(11)), "6\n".to_string()));
        assert_eq!(run("nonlocal"), (Ok(Value::string("no")), "yes\n".to_string()));
        assert_eq!(run("super").0.unwrap(), Value::string("ABC"));
        let (result, out) = run("collections");
        assert_eq!(result.unwrap(), Value::Int(2));
        assert_eq!(out, "{x. $y. 2.5}\nsize = 3\n");
    }

    #[test]
    fn failing_demos() {
        let kind = |name: &str| run(name).0.unwrap_err().kind;
        assert_eq!(kind("class-mismatch"), VmErrorKind::ClassMessageSentToInstance);
        assert_eq!(kind("instance-on-class"), VmErrorKind::MessageNotUnderstood);
        assert_eq!(kind("dead-return"), VmErrorKind::BlockCannotReturn);
    }
}
