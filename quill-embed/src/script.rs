// quill-embed - Script pipeline for the Quill embedding API
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! `Script` / `Compiled`: the high-level pipeline.
//!
//! A `Script` collects source text, embedder variables, module map
//! and import settings; `compile()` produces a reusable `Compiled`
//! whose globals persist across runs and can be read back by name.
//!
//! ```no_run
//! use quill_embed::Script;
//! use quill_core::Value;
//!
//! let mut script = Script::new("out := a * 2");
//! script.add_variable("a", Value::Int(21));
//! let mut compiled = script.compile().unwrap();
//! compiled.run().unwrap();
//! assert!(compiled.get("out").unwrap().equals(&Value::Int(42)));
//! ```

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::debug;

use quill_core::value::{new_cell, CellRef, Value};
use quill_parser::{Parser, SourceFile};
use quill_vm::compiler::Compiler;
use quill_vm::{ModuleMap, Unit, Vm};

use crate::error::ScriptError;

/// A script to be compiled: source, variables and settings.
pub struct Script {
    source: String,
    name: String,
    variables: Vec<(String, Value)>,
    module_map: Rc<ModuleMap>,
    file_import: bool,
    import_dir: Option<PathBuf>,
    args: Vec<String>,
}

impl Script {
    pub fn new(source: impl Into<String>) -> Script {
        Script {
            source: source.into(),
            name: "<script>".to_string(),
            variables: Vec::new(),
            module_map: Rc::new(ModuleMap::new()),
            file_import: false,
            import_dir: None,
            args: Vec::new(),
        }
    }

    /// Name used in error positions (defaults to `<script>`).
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Script {
        self.name = name.into();
        self
    }

    /// Declare a global visible to the script, pre-populated with
    /// `value`. Variables occupy the first global slots in
    /// declaration order.
    pub fn add_variable(&mut self, name: impl Into<String>, value: Value) -> &mut Script {
        self.variables.push((name.into(), value));
        self
    }

    /// Set the module map consulted by `import`.
    pub fn set_imports(&mut self, modules: ModuleMap) -> &mut Script {
        self.module_map = Rc::new(modules);
        self
    }

    /// Allow `import` of source files from disk.
    pub fn enable_file_import(&mut self, enable: bool) -> &mut Script {
        self.file_import = enable;
        self
    }

    /// Root directory for file imports.
    pub fn set_import_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Script {
        self.import_dir = Some(dir.into());
        self
    }

    /// Process arguments exposed to VM-aware builtins.
    pub fn set_args(&mut self, args: Vec<String>) -> &mut Script {
        self.args = args;
        self
    }

    /// Parse and compile the script.
    pub fn compile(&self) -> Result<Compiled, ScriptError> {
        let source_file = Rc::new(SourceFile::new(self.name.clone(), &self.source));
        let file = Parser::parse_file(&self.source)?;

        let mut compiler =
            Compiler::with_builtins(Rc::clone(&self.module_map), Rc::clone(&source_file));
        let mut slots = Vec::with_capacity(self.variables.len());
        let mut globals: Vec<Option<CellRef>> = Vec::new();
        for (name, value) in &self.variables {
            let symbol = compiler.define_global(name).map_err(ScriptError::Compile)?;
            debug_assert_eq!(symbol.index, globals.len());
            slots.push((name.clone(), symbol.index));
            globals.push(Some(new_cell(value.clone())));
        }
        compiler.enable_file_import(self.file_import);
        if let Some(dir) = &self.import_dir {
            compiler.set_import_dir(dir.clone());
        }

        let unit = compiler.compile(&file)?;
        debug!(name = %self.name, "script compiled");
        Ok(Compiled {
            unit,
            source: source_file,
            slots,
            globals,
            args: self.args.clone(),
            aborting: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Compile and run in one step.
    pub fn run(&self) -> Result<Compiled, ScriptError> {
        let mut compiled = self.compile()?;
        compiled.run()?;
        Ok(compiled)
    }
}

/// A compiled script. Globals persist across runs; variables are
/// read back by name.
pub struct Compiled {
    unit: Unit,
    source: Rc<SourceFile>,
    slots: Vec<(String, usize)>,
    globals: Vec<Option<CellRef>>,
    args: Vec<String>,
    aborting: Arc<AtomicBool>,
}

impl Compiled {
    /// Run the script to completion (or to the first error).
    pub fn run(&mut self) -> Result<(), ScriptError> {
        let mut vm = Vm::new(self.unit.clone(), self.globals.clone(), self.args.clone());
        vm.set_abort_flag(Arc::clone(&self.aborting));
        vm.run().map_err(ScriptError::Runtime)
    }

    /// The abort flag for this script; raising it stops the run at
    /// the next loop edge.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.aborting)
    }

    /// Read a declared variable's current value.
    pub fn get(&self, name: &str) -> Option<Value> {
        let (_, slot) = self.slots.iter().find(|(n, _)| n == name)?;
        self.globals
            .get(*slot)?
            .as_ref()
            .map(|cell| cell.borrow().clone())
    }

    /// All declared variables with their current values.
    pub fn variables(&self) -> Vec<(String, Value)> {
        self.slots
            .iter()
            .filter_map(|(name, slot)| {
                self.globals
                    .get(*slot)?
                    .as_ref()
                    .map(|cell| (name.clone(), cell.borrow().clone()))
            })
            .collect()
    }

    /// The source file, for resolving error positions.
    pub fn source_file(&self) -> &SourceFile {
        &self.source
    }

    /// The compiled unit (e.g. for serialization).
    pub fn unit(&self) -> &Unit {
        &self.unit
    }
}
