// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Call frames.

use std::rc::Rc;

use quill_core::CompiledFunction;

/// One activation record: the executing closure, its instruction
/// pointer, and the base pointer into the value stack where its
/// locals start.
#[derive(Debug)]
pub struct Frame {
    pub func: Rc<CompiledFunction>,
    pub ip: usize,
    pub base: usize,
}

impl Frame {
    pub fn new(func: Rc<CompiledFunction>, base: usize) -> Frame {
        Frame { func, ip: 0, base }
    }

    /// The instruction buffer of this frame's function.
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.func.proto.instructions
    }
}
