//! Call-stack rendering for errors and instruction tracing.

use std::fmt::Write as _;

use crate::interpreter::VM;
use crate::object::Value;

/// One line per frame, innermost first:
/// name, locals and operand stack, last source position, and the
/// instruction the frame is executing.
pub fn stack_trace(vm: &VM) -> String {
    let mut out = String::new();
    for act in vm.call_stack() {
        let ip = act.prev_ip.unwrap_or(act.ip);
        let frame = format!(
            "{}{}{}",
            act.block.qualified_name,
            render_values(&act.locals),
            render_values(&act.stack)
        );
        let location = format!("({})", act.position);
        let _ = writeln!(
            out,
            "    at {frame:>50}{location:<20} executing {}",
            act.block.disassemble_at(ip)
        );
    }
    out
}

/// Compact call stack, outermost frame first.
pub fn call_stack_line(vm: &VM) -> String {
    let frames: Vec<String> = vm
        .call_stack()
        .iter()
        .rev()
        .map(|act| {
            format!(
                "{}{}{}",
                act.block.qualified_name,
                render_values(&act.locals),
                render_values(&act.stack)
            )
        })
        .collect();
    format!("calls: {}", frames.join(", "))
}

/// A value as it appears in traces: strings quoted, closures by block name.
pub fn render(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{s}'"),
        Value::Block(b) => b.block.name.clone(),
        other => other.to_string(),
    }
}

fn render_values(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(render).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Body, Expr, MainBody, Program, Stat};
    use crate::compile::Compiler;
    use crate::error::VmErrorKind;
    use crate::interpreter::VmOptions;
    use crate::primitives::transcript::Transcript;

    #[test]
    fn rendering_quotes_strings() {
        assert_eq!(render(&Value::string("hi")), "'hi'");
        assert_eq!(render(&Value::Nil), "nil");
        assert_eq!(render_values(&[Value::Int(1), Value::Char('x')]), "[1, $x]");
    }

    #[test]
    fn trace_shows_frame_state_at_the_failing_send() {
        let main = MainBody::new(
            &["a"],
            Body::new(vec![
                Stat::assign("a", Expr::int(5)).at(1, 0),
                Stat::expr(Expr::int(3).send("foo", vec![]).at(1, 10)),
            ]),
        );
        let compiled = Compiler::default().compile(Program::new().with_main(main)).unwrap();
        let mut vm = VM::with_options(compiled, VmOptions::default(), Transcript::buffer()).unwrap();
        let err = vm.exec_main().unwrap_err();
        assert_eq!(err.kind, VmErrorKind::MessageNotUnderstood);
        assert_eq!(err.trace.lines().count(), 1);
        assert!(
            err.trace.contains(
                "MainClass>>main[5][3](<string>:1:10)      executing 0030:  send         0, 'foo'"
            ),
            "{}",
            err.trace
        );
        assert!(err.trace.starts_with("    at "));
    }
}
