//! The fetch-decode-execute loop.

use std::rc::Rc;

use bytecode::{Instruction, decode_at};

use crate::activation::{Activation, ActivationId, Activations, SourcePosition};
use crate::code::CompiledBlock;
use crate::compile::CompiledProgram;
use crate::error::{VmError, VmErrorKind};
use crate::object::{BlockDescriptor, Instance, MetaClass, Value};
use crate::primitives::transcript::Transcript;
use crate::scope::{MAIN_CLASS, MAIN_SELECTOR};
use crate::special::SystemDictionary;
use crate::trace;

#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Log every instruction and the call stack after it at `trace` level.
    pub trace_instructions: bool,
    /// Maximum number of simultaneously active frames.
    pub max_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            trace_instructions: false,
            max_depth: 10_000,
        }
    }
}

pub struct VM {
    dict: SystemDictionary,
    activations: Activations,
    current: Option<ActivationId>,
    depth: usize,
    options: VmOptions,
    transcript: Transcript,
}

impl VM {
    pub fn new(program: CompiledProgram) -> Result<Self, VmError> {
        Self::with_options(program, VmOptions::default(), Transcript::stdout())
    }

    pub fn with_options(
        program: CompiledProgram,
        options: VmOptions,
        transcript: Transcript,
    ) -> Result<Self, VmError> {
        Ok(Self {
            dict: SystemDictionary::bootstrap(program)?,
            activations: Activations::new(),
            current: None,
            depth: 0,
            options,
            transcript,
        })
    }

    pub fn dict(&self) -> &SystemDictionary {
        &self.dict
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Frames still held by the VM: the call stack plus frames pinned by
    /// reachable closures.
    pub fn live_activations(&mut self) -> usize {
        self.activations.live()
    }

    /// Run `MainClass>>main` on a fresh instance; nil when there is no main.
    pub fn exec_main(&mut self) -> Result<Value, VmError> {
        let Some(class) = self.dict.lookup_class(MAIN_CLASS) else {
            return Ok(Value::Nil);
        };
        let method = class.resolve_method(MAIN_SELECTOR).ok_or_else(|| {
            self.error(
                VmErrorKind::MessageNotUnderstood,
                format!("{MAIN_CLASS} does not understand {MAIN_SELECTOR}"),
            )
        })?;
        let receiver = Value::Object(Instance::new(class));
        self.exec(receiver, &method)
    }

    pub fn exec(&mut self, receiver: Value, method: &Rc<CompiledBlock>) -> Result<Value, VmError> {
        self.exec_with_args(receiver, method, Vec::new())
    }

    /// Run `method` against `receiver` to completion.
    pub fn exec_with_args(
        &mut self,
        receiver: Value,
        method: &Rc<CompiledBlock>,
        args: Vec<Value>,
    ) -> Result<Value, VmError> {
        self.abandon();
        let result = match self.invoke(receiver, method.clone(), args) {
            Ok(Some(value)) => Ok(value),
            Ok(None) if self.current.is_none() => Ok(Value::Nil),
            Ok(None) => self.run(),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.abandon();
        }
        result
    }

    /// Send `selector` to `receiver` from the host, with the same lookup
    /// and class/instance checks as a `send` instruction.
    pub fn send(&mut self, receiver: Value, selector: &str, args: Vec<Value>) -> Result<Value, VmError> {
        let method = self.lookup(&receiver, selector, false, None)?;
        self.exec_with_args(receiver, &method, args)
    }

    /// Instantiate a class by name, as `basicNew` would.
    pub fn new_instance(&self, class_name: &str) -> Result<Value, VmError> {
        let class = self.dict.lookup_class(class_name).ok_or_else(|| {
            self.error(VmErrorKind::UnknownClass, format!("unknown class {class_name}"))
        })?;
        Ok(Value::Object(Instance::new(class)))
    }

    pub fn class_name(&self, value: &Value) -> String {
        self.dict.class_of(value).name.clone()
    }

    /// Build an error carrying the current call-stack trace.
    pub fn error(&self, kind: VmErrorKind, message: impl Into<String>) -> VmError {
        VmError::new(kind, message, trace::stack_trace(self))
    }

    /// Frames from the current one outward along the call stack.
    pub(crate) fn call_stack(&self) -> Vec<&Activation> {
        let mut frames = Vec::new();
        let mut cursor = self.current;
        while let Some(id) = cursor {
            let Some(act) = self.activations.get(id) else { break };
            frames.push(act);
            cursor = act.invoking;
        }
        frames
    }

    /// Push a frame for `closure` on top of the current one.
    pub(crate) fn activate_block(&mut self, closure: &Rc<BlockDescriptor>, args: Vec<Value>) -> Result<(), VmError> {
        if args.len() != closure.block.nargs {
            return Err(self.error(
                VmErrorKind::MismatchedBlockArg,
                format!(
                    "{} expects {} argument(s), got {}",
                    closure.block.qualified_name,
                    closure.block.nargs,
                    args.len()
                ),
            ));
        }
        self.enter()?;
        let id = self.activations.block(closure, args, self.current);
        log::trace!("enter {}", closure.block.qualified_name);
        self.current = Some(id);
        Ok(())
    }

    fn run(&mut self) -> Result<Value, VmError> {
        loop {
            if let Some(result) = self.step()? {
                return Ok(result);
            }
        }
    }

    /// Execute one instruction; `Some` once the outermost frame finished.
    fn step(&mut self) -> Result<Option<Value>, VmError> {
        let id = self.current_id()?;
        let decoded = {
            let act = self.frame(id)?;
            let decoded = decode_at(&act.block.bytecode, act.ip);
            if self.options.trace_instructions {
                log::trace!("{}", act.block.disassemble_at(act.ip));
            }
            decoded
        };
        let (instruction, next_ip) = match decoded {
            Ok(Some(decoded)) => decoded,
            // Ran off the end without a return.
            Ok(None) => {
                let (result, caller) = {
                    let act = self.frame(id)?;
                    let result = act.stack.last().cloned().unwrap_or_else(|| act.receiver.clone());
                    (result, act.invoking)
                };
                self.leave(id);
                return self.resume(caller, result);
            }
            Err(e) => {
                return Err(self.error(VmErrorKind::InternalVmError, format!("bad bytecode: {e}")));
            }
        };
        {
            let act = self.frame_mut(id)?;
            act.prev_ip = Some(act.ip);
            act.ip = next_ip;
        }

        match instruction {
            Instruction::PushNil => self.push(id, Value::Nil)?,
            Instruction::PushSelf => {
                let receiver = self.frame(id)?.receiver.clone();
                self.push(id, receiver)?;
            }
            Instruction::PushTrue => self.push(id, Value::Bool(true))?,
            Instruction::PushFalse => self.push(id, Value::Bool(false))?,
            Instruction::PushChar { ch } => {
                let c = char::from_u32(ch as u32).ok_or_else(|| {
                    self.error(VmErrorKind::InternalVmError, format!("invalid character code {ch}"))
                })?;
                self.push(id, Value::Char(c))?;
            }
            Instruction::PushInt { value } => self.push(id, Value::Int(value))?,
            Instruction::PushFloat { value } => self.push(id, Value::Float(value))?,
            Instruction::PushArray { count } => self.build_array(id, count as usize)?,
            Instruction::PushLiteral { idx } => {
                let text = self.literal_value(id, idx)?;
                self.push(id, Value::Str(text))?;
            }
            Instruction::PushGlobal { idx } => {
                let name = self.literal_value(id, idx)?;
                let value = self.dict.lookup(&name).ok_or_else(|| {
                    self.error(VmErrorKind::UndefinedGlobal, format!("{name} is not defined"))
                })?;
                self.push(id, value)?;
            }
            Instruction::PushField { idx } => {
                let value = self.field(id, idx as usize, None)?;
                self.push(id, value)?;
            }
            Instruction::PushLocal { depth, slot } => {
                let context = self.enclosing_at(id, depth)?;
                let value = self.frame(context)?.locals.get(slot as usize).cloned();
                let value = value.ok_or_else(|| {
                    self.error(VmErrorKind::InternalVmError, format!("no local slot {slot} at depth {depth}"))
                })?;
                self.push(id, value)?;
            }
            Instruction::Pop => {
                self.pop(id)?;
            }
            Instruction::StoreField { idx } => {
                let value = self.top(id)?;
                self.field(id, idx as usize, Some(value))?;
            }
            Instruction::StoreLocal { depth, slot } => {
                let value = self.top(id)?;
                let context = self.enclosing_at(id, depth)?;
                let stored = match self.frame_mut(context)?.locals.get_mut(slot as usize) {
                    Some(local) => {
                        *local = value;
                        true
                    }
                    None => false,
                };
                if !stored {
                    return Err(self.error(
                        VmErrorKind::InternalVmError,
                        format!("no local slot {slot} at depth {depth}"),
                    ));
                }
            }
            Instruction::Return => return self.method_return(id),
            Instruction::Send { argc, selector } => self.send_message(id, argc as usize, selector, false)?,
            Instruction::SendSuper { argc, selector } => self.send_message(id, argc as usize, selector, true)?,
            Instruction::Block { idx } => self.make_closure(id, idx as usize)?,
            Instruction::BlockReturn => return self.block_return(id),
            Instruction::Dbg { file, line, column } => {
                let file = self.frame(id)?.block.literal_value(file);
                self.frame_mut(id)?.position = SourcePosition { file, line, column };
            }
        }

        if self.options.trace_instructions {
            log::trace!("{}", trace::call_stack_line(self));
        }
        Ok(None)
    }

    fn current_id(&self) -> Result<ActivationId, VmError> {
        self.current
            .ok_or_else(|| self.error(VmErrorKind::InternalVmError, "no active frame"))
    }

    fn frame(&self, id: ActivationId) -> Result<&Activation, VmError> {
        self.activations
            .get(id)
            .ok_or_else(|| self.error(VmErrorKind::InternalVmError, format!("stale activation {id:?}")))
    }

    fn frame_mut(&mut self, id: ActivationId) -> Result<&mut Activation, VmError> {
        if !self.activations.contains(id) {
            return Err(self.error(VmErrorKind::InternalVmError, format!("stale activation {id:?}")));
        }
        self.activations.get_mut(id).ok_or_else(|| {
            VmError::new(VmErrorKind::InternalVmError, format!("stale activation {id:?}"), String::new())
        })
    }

    fn push(&mut self, id: ActivationId, value: Value) -> Result<(), VmError> {
        self.frame_mut(id)?.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, id: ActivationId) -> Result<Value, VmError> {
        let popped = self.frame_mut(id)?.stack.pop();
        popped.ok_or_else(|| self.error(VmErrorKind::StackUnderflow, "pop from an empty operand stack"))
    }

    fn top(&self, id: ActivationId) -> Result<Value, VmError> {
        self.frame(id)?
            .stack
            .last()
            .cloned()
            .ok_or_else(|| self.error(VmErrorKind::StackUnderflow, "operand stack is empty"))
    }

    fn literal_value(&self, id: ActivationId, idx: u16) -> Result<Rc<str>, VmError> {
        self.frame(id)?
            .block
            .literal_value(idx)
            .ok_or_else(|| self.error(VmErrorKind::InternalVmError, format!("no literal #{idx}")))
    }

    /// Walk `depth` hops out along the enclosing-context chain.
    fn enclosing_at(&self, id: ActivationId, depth: u16) -> Result<ActivationId, VmError> {
        let mut context = id;
        for _ in 0..depth {
            context = self.frame(context)?.enclosing.ok_or_else(|| {
                self.error(VmErrorKind::InternalVmError, format!("no enclosing context at depth {depth}"))
            })?;
        }
        Ok(context)
    }

    /// Read a receiver field, or write it when `store` is given.
    fn field(&self, id: ActivationId, idx: usize, store: Option<Value>) -> Result<Value, VmError> {
        let receiver = self.frame(id)?.receiver.clone();
        let Value::Object(obj) = &receiver else {
            return Err(self.error(
                VmErrorKind::UnknownField,
                format!("{} has no fields", self.class_name(&receiver)),
            ));
        };
        let mut fields = obj.fields.borrow_mut();
        let Some(slot) = fields.get_mut(idx) else {
            let count = fields.len();
            drop(fields);
            return Err(self.error(
                VmErrorKind::UnknownField,
                format!("{} has no field {idx} (of {count})", obj.class.name),
            ));
        };
        match store {
            Some(value) => {
                *slot = value.clone();
                Ok(value)
            }
            None => Ok(slot.clone()),
        }
    }

    fn build_array(&mut self, id: ActivationId, count: usize) -> Result<(), VmError> {
        let len = self.frame(id)?.stack.len();
        if len < count {
            return Err(self.error(
                VmErrorKind::StackUnderflow,
                format!("array of {count} needs {count} values, stack has {len}"),
            ));
        }
        let act = self.frame_mut(id)?;
        let items = act.stack.split_off(len - count);
        act.stack.push(Value::array(items));
        Ok(())
    }

    fn make_closure(&mut self, id: ActivationId, idx: usize) -> Result<(), VmError> {
        let (home, receiver) = {
            let act = self.frame(id)?;
            (act.home, act.receiver.clone())
        };
        let home_block = self.frame(home)?.block.clone();
        let block = home_block.blocks.get(idx).cloned().ok_or_else(|| {
            self.error(
                VmErrorKind::InternalVmError,
                format!("{} has no nested block {idx}", home_block.qualified_name),
            )
        })?;
        let pin = self
            .activations
            .pin(id)
            .ok_or_else(|| self.error(VmErrorKind::InternalVmError, format!("stale activation {id:?}")))?;
        let closure = BlockDescriptor {
            block,
            enclosing: id,
            home,
            receiver,
            pin,
        };
        self.push(id, Value::Block(Rc::new(closure)))
    }

    /// Find the method for `selector`, starting at `start` when given.
    fn lookup(
        &self,
        receiver: &Value,
        selector: &str,
        is_super: bool,
        start: Option<Rc<MetaClass>>,
    ) -> Result<Rc<CompiledBlock>, VmError> {
        let class = match start {
            Some(class) => class,
            None => self.dict.class_of(receiver),
        };
        let Some(method) = class.resolve_method(selector) else {
            let whom = if is_super {
                format!("super of {}", self.class_name(receiver))
            } else {
                self.class_name(receiver)
            };
            return Err(self.error(
                VmErrorKind::MessageNotUnderstood,
                format!("{whom} does not understand {selector}"),
            ));
        };
        let class_receiver = receiver.is_class();
        if method.is_class_method && !class_receiver {
            return Err(self.error(
                VmErrorKind::ClassMessageSentToInstance,
                format!(
                    "{selector} is a class method sent to instance of {}",
                    self.class_name(receiver)
                ),
            ));
        }
        if !method.is_class_method && class_receiver {
            return Err(self.error(
                VmErrorKind::MessageNotUnderstood,
                format!(
                    "{selector} is an instance method sent to class object {}",
                    self.class_name(receiver)
                ),
            ));
        }
        Ok(method)
    }

    fn send_message(&mut self, id: ActivationId, argc: usize, selector: u16, is_super: bool) -> Result<(), VmError> {
        let selector = self.literal_value(id, selector)?;
        let (receiver, owner) = {
            let act = self.frame(id)?;
            let receiver = act
                .stack
                .len()
                .checked_sub(argc + 1)
                .map(|i| act.stack[i].clone());
            (receiver, act.block.owner())
        };
        let receiver = receiver.ok_or_else(|| {
            self.error(
                VmErrorKind::StackUnderflow,
                format!("{selector} needs a receiver and {argc} argument(s)"),
            )
        })?;

        let start = if is_super {
            let owner = owner.ok_or_else(|| {
                self.error(VmErrorKind::InternalVmError, "super send outside of a class")
            })?;
            let superclass = owner.superclass.clone().ok_or_else(|| {
                self.error(
                    VmErrorKind::MessageNotUnderstood,
                    format!("{} has no superclass to receive {selector}", owner.name),
                )
            })?;
            Some(superclass)
        } else {
            None
        };
        let method = self.lookup(&receiver, &selector, is_super, start)?;
        log::trace!("send {selector} to {receiver:?} -> {}", method.qualified_name);

        let args = {
            let act = self.frame_mut(id)?;
            let split = act.stack.len() - argc;
            let args = act.stack.split_off(split);
            act.stack.pop();
            args
        };
        if let Some(result) = self.invoke(receiver, method, args)? {
            self.push(id, result)?;
        }
        Ok(())
    }

    /// Call a resolved method. Primitives answer immediately with `Some`,
    /// unless they activated a block; bytecode methods get a new frame.
    fn invoke(
        &mut self,
        receiver: Value,
        method: Rc<CompiledBlock>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        let expected = method.primitive.map_or(method.nargs, |p| p.arity());
        if args.len() != expected {
            return Err(self.error(
                VmErrorKind::InternalVmError,
                format!(
                    "{} expects {expected} argument(s), got {}",
                    method.qualified_name,
                    args.len()
                ),
            ));
        }
        if let Some(primitive) = method.primitive {
            return (primitive.desc().func)(self, receiver, &args);
        }
        self.enter()?;
        let id = self.activations.method(method.clone(), receiver, args, self.current);
        log::trace!("enter {}", method.qualified_name);
        self.current = Some(id);
        Ok(None)
    }

    fn enter(&mut self) -> Result<(), VmError> {
        if self.depth >= self.options.max_depth {
            return Err(self.error(VmErrorKind::InternalVmError, "call stack overflow"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self, id: ActivationId) {
        if log::log_enabled!(log::Level::Trace) {
            if let Some(act) = self.activations.get(id) {
                log::trace!("leave {}", act.block.qualified_name);
            }
        }
        self.activations.release(id);
        self.depth = self.depth.saturating_sub(1);
    }

    /// Hand `value` to the caller of a finished frame, or finish the run.
    fn resume(&mut self, caller: Option<ActivationId>, value: Value) -> Result<Option<Value>, VmError> {
        self.current = caller;
        match caller {
            Some(caller) => {
                self.push(caller, value)?;
                Ok(None)
            }
            None => Ok(Some(value)),
        }
    }

    fn block_return(&mut self, id: ActivationId) -> Result<Option<Value>, VmError> {
        let value = self.pop(id)?;
        let caller = self.frame(id)?.invoking;
        self.leave(id);
        self.resume(caller, value)
    }

    /// `^`: unwind the call stack through the home method.
    fn method_return(&mut self, id: ActivationId) -> Result<Option<Value>, VmError> {
        let value = self.pop(id)?;
        let home = self.frame(id)?.home;
        let live = self.activations.get(home).is_some_and(|h| !h.returned);
        if !live || !self.on_call_stack(id, home) {
            let act = self.frame(id)?;
            let class = act.block.owner().map(|c| c.name.clone()).unwrap_or_default();
            let method = self
                .activations
                .get(home)
                .map_or_else(|| "<released>".to_string(), |h| h.block.qualified_name.clone());
            return Err(self.error(
                VmErrorKind::BlockCannotReturn,
                format!(
                    "{class}>>{} can't trigger return again from method {method}",
                    act.block.name
                ),
            ));
        }

        let mut cursor = Some(id);
        while let Some(frame) = cursor {
            let (caller, is_method) = {
                let act = self.frame(frame)?;
                (act.invoking, act.is_method())
            };
            if is_method {
                self.frame_mut(frame)?.returned = true;
            }
            self.leave(frame);
            cursor = caller;
            if frame == home {
                break;
            }
        }
        self.resume(cursor, value)
    }

    fn on_call_stack(&self, from: ActivationId, target: ActivationId) -> bool {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if id == target {
                return true;
            }
            cursor = self.activations.get(id).and_then(|a| a.invoking);
        }
        false
    }

    /// Drop whatever is left of an interrupted run.
    fn abandon(&mut self) {
        let mut cursor = self.current.take();
        while let Some(id) = cursor {
            cursor = self.activations.get(id).and_then(|a| a.invoking);
            self.activations.release(id);
        }
        self.depth = 0;
    }
}

/// A VM loaded with the standard library only.
#[cfg(test)]
pub(crate) fn test_vm() -> VM {
    let program = crate::compile::Compiler::default()
        .compile(crate::ast::Program::new())
        .unwrap();
    VM::with_options(program, VmOptions::default(), Transcript::buffer()).unwrap()
}
