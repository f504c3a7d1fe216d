// quill-core - VM access seam for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The seam through which VM-aware builtins reach the running VM.
//!
//! Builtins registered with `vm_aware` receive a [`VmHandle`]
//! prepended to their arguments. The trait keeps this crate ignorant
//! of the VM's concrete type.

use std::fmt;
use std::rc::Rc;

use crate::value::{CellRef, Value};

/// Operations the VM exposes to builtins.
pub trait VmAccess {
    /// Find the globals-area slot currently holding a value identical
    /// to `v` (reference identity for reference variants, equality
    /// otherwise). Used by `pointer`.
    fn find_global_cell(&self, v: &Value) -> Option<CellRef>;

    /// Process arguments the VM was constructed with.
    fn vm_args(&self) -> Vec<String>;
}

/// Shared handle to the running VM.
#[derive(Clone)]
pub struct VmHandle(pub Rc<dyn VmAccess>);

impl VmHandle {
    pub fn new(vm: Rc<dyn VmAccess>) -> VmHandle {
        VmHandle(vm)
    }
}

impl fmt::Debug for VmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VmHandle")
    }
}
