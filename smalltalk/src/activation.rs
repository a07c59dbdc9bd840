//! Activations (stack frames) and the arena that owns them.
//!
//! Frames refer to each other through [`ActivationId`] handles. A slot is
//! recycled once its frame is popped and no closure pins it. Closures hold a
//! [`FramePin`] on the frame that created them, and every block frame holds
//! the pin of its enclosing frame, so a live closure keeps its whole lexical
//! chain. Every recycle bumps the slot's generation so an outdated handle is
//! detected instead of aliasing a new frame.

use core::fmt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::code::CompiledBlock;
use crate::object::{BlockDescriptor, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivationId {
    index: u32,
    generation: u32,
}

/// Last position reported by a `dbg` instruction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub file: Option<Rc<str>>,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.file.as_deref().unwrap_or("?");
        write!(f, "{file}:{}:{}", self.line, self.column)
    }
}

#[derive(Debug)]
pub struct Activation {
    pub block: Rc<CompiledBlock>,
    pub ip: usize,
    /// Start of the instruction being executed.
    pub prev_ip: Option<usize>,
    pub stack: Vec<Value>,
    /// Arguments first, then locals.
    pub locals: Vec<Value>,
    pub receiver: Value,
    /// Caller on the call stack.
    pub invoking: Option<ActivationId>,
    /// Lexically enclosing frame; `None` for methods.
    pub enclosing: Option<ActivationId>,
    /// The method frame `^` returns from. A method is its own home.
    pub home: ActivationId,
    pub returned: bool,
    /// Pin on `enclosing`, taken from the closure this frame runs.
    pub env: Option<Rc<FramePin>>,
    pub position: SourcePosition,
}

/// Keeps a frame in the arena after it is popped. Dropping the last pin
/// queues the frame for recycling.
#[derive(Debug)]
pub struct FramePin {
    id: ActivationId,
    unpinned: Rc<RefCell<Vec<ActivationId>>>,
}

impl FramePin {
    pub fn frame(&self) -> ActivationId {
        self.id
    }
}

impl Drop for FramePin {
    fn drop(&mut self) {
        self.unpinned.borrow_mut().push(self.id);
    }
}

impl Activation {
    fn new(
        block: Rc<CompiledBlock>,
        receiver: Value,
        args: Vec<Value>,
        invoking: Option<ActivationId>,
        enclosing: Option<ActivationId>,
        home: ActivationId,
        env: Option<Rc<FramePin>>,
    ) -> Self {
        let mut locals = args;
        locals.resize(block.frame_size().max(locals.len()), Value::Nil);
        Self {
            block,
            ip: 0,
            prev_ip: None,
            stack: Vec::new(),
            locals,
            receiver,
            invoking,
            enclosing,
            home,
            returned: false,
            env,
            position: SourcePosition::default(),
        }
    }

    pub fn is_method(&self) -> bool {
        self.enclosing.is_none()
    }
}

#[derive(Default)]
struct Slot {
    generation: u32,
    activation: Option<Activation>,
    /// Set once the frame has left the call stack.
    popped: bool,
    pin: Weak<FramePin>,
}

#[derive(Default)]
pub struct Activations {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    unpinned: Rc<RefCell<Vec<ActivationId>>>,
}

impl Activations {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_with(&mut self, make: impl FnOnce(ActivationId) -> Activation) -> ActivationId {
        self.collect();
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = ActivationId {
            index,
            generation: slot.generation,
        };
        slot.popped = false;
        slot.activation = Some(make(id));
        self.live += 1;
        id
    }

    /// A frame for a method invocation; `args` fill the first local slots.
    pub fn method(
        &mut self,
        block: Rc<CompiledBlock>,
        receiver: Value,
        args: Vec<Value>,
        invoking: Option<ActivationId>,
    ) -> ActivationId {
        self.alloc_with(|id| Activation::new(block, receiver, args, invoking, None, id, None))
    }

    /// A frame for a closure invocation. Receiver and environment come from
    /// the closure, not the call site.
    pub fn block(
        &mut self,
        closure: &BlockDescriptor,
        args: Vec<Value>,
        invoking: Option<ActivationId>,
    ) -> ActivationId {
        self.alloc_with(|_| {
            Activation::new(
                closure.block.clone(),
                closure.receiver.clone(),
                args,
                invoking,
                Some(closure.enclosing),
                closure.home,
                Some(closure.pin.clone()),
            )
        })
    }

    pub fn get(&self, id: ActivationId) -> Option<&Activation> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.activation.as_ref()
    }

    pub fn get_mut(&mut self, id: ActivationId) -> Option<&mut Activation> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.activation.as_mut()
    }

    pub fn contains(&self, id: ActivationId) -> bool {
        self.get(id).is_some()
    }

    /// A pin keeping `id` alive for a closure created in it. Closures made
    /// by the same frame share one pin.
    pub fn pin(&mut self, id: ActivationId) -> Option<Rc<FramePin>> {
        self.get(id)?;
        let slot = &mut self.slots[id.index as usize];
        if let Some(pin) = slot.pin.upgrade() {
            return Some(pin);
        }
        let pin = Rc::new(FramePin {
            id,
            unpinned: self.unpinned.clone(),
        });
        slot.pin = Rc::downgrade(&pin);
        Some(pin)
    }

    /// Pop a frame off the call stack. It is recycled now, or later when
    /// its last pin goes away.
    pub fn release(&mut self, id: ActivationId) {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation != id.generation || slot.activation.is_none() {
            return;
        }
        slot.popped = true;
        if slot.pin.strong_count() == 0 {
            self.recycle(id.index);
        }
        self.collect();
    }

    /// Recycle popped frames whose pins were dropped. Recycling a block
    /// frame drops its own pin on the enclosing frame, so this runs until
    /// the queue stays empty.
    fn collect(&mut self) {
        loop {
            let next = self.unpinned.borrow_mut().pop();
            let Some(id) = next else { break };
            let Some(slot) = self.slots.get(id.index as usize) else {
                continue;
            };
            if slot.generation == id.generation
                && slot.activation.is_some()
                && slot.popped
                && slot.pin.strong_count() == 0
            {
                self.recycle(id.index);
            }
        }
    }

    fn recycle(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        let activation = slot.activation.take();
        slot.generation = slot.generation.wrapping_add(1);
        slot.popped = false;
        slot.pin = Weak::new();
        self.free.push(index);
        self.live -= 1;
        // Dropped last: this may unpin the enclosing frame.
        drop(activation);
    }

    /// Frames currently held, on the call stack or pinned by a closure.
    pub fn live(&mut self) -> usize {
        self.collect();
        self.live
    }
}
