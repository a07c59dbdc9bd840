use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{VmError, VmErrorKind};
use crate::interpreter::VM;
use crate::object::Value;
use crate::primitives::arg;

enum Sink {
    Stdout,
    Buffer(String),
    Writer(Box<dyn Write + Send>),
}

/// Where `Transcript show:` writes. Clones share the same sink.
#[derive(Clone)]
pub struct Transcript {
    sink: Arc<Mutex<Sink>>,
}

impl Transcript {
    pub fn stdout() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Stdout)),
        }
    }

    /// Capture output in memory; read it back with [`Transcript::contents`].
    pub fn buffer() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Buffer(String::new()))),
        }
    }

    /// Send output to any writer, e.g. a file.
    pub fn writer(out: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Writer(Box::new(out)))),
        }
    }

    /// Write `text` as one line.
    pub fn show(&self, text: &str) -> io::Result<()> {
        match &mut *self.sink.lock() {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{text}")?;
                out.flush()
            }
            Sink::Buffer(buffer) => {
                buffer.push_str(text);
                buffer.push('\n');
                Ok(())
            }
            Sink::Writer(out) => {
                writeln!(out, "{text}")?;
                out.flush()
            }
        }
    }

    /// Captured text; empty unless this is a buffer.
    pub fn contents(&self) -> String {
        match &*self.sink.lock() {
            Sink::Buffer(buffer) => buffer.clone(),
            Sink::Stdout | Sink::Writer(_) => String::new(),
        }
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::stdout()
    }
}

pub fn transcript_show(vm: &mut VM, receiver: Value, args: &[Value]) -> Result<Option<Value>, VmError> {
    let text = arg(vm, args, 0)?.to_string();
    if let Err(e) = vm.transcript().show(&text) {
        return Err(vm.error(VmErrorKind::InternalVmError, format!("transcript write failed: {e}")));
    }
    Ok(Some(receiver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::interpreter::VmOptions;

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn buffer_collects_lines_across_clones() {
        let transcript = Transcript::buffer();
        let clone = transcript.clone();
        transcript.show("hello").unwrap();
        clone.show("42").unwrap();
        assert_eq!(transcript.contents(), "hello\n42\n");
        assert_eq!(Transcript::stdout().contents(), "");
    }

    #[test]
    fn failed_write_raises() {
        let program = Compiler::default().compile(crate::ast::Program::new()).unwrap();
        let mut vm = VM::with_options(program, VmOptions::default(), Transcript::writer(Closed)).unwrap();
        let transcript = vm.dict().lookup("Transcript").unwrap();
        let err = transcript_show(&mut vm, transcript, &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::InternalVmError);
        assert!(err.message.starts_with("transcript write failed"), "{}", err.message);
    }
}
