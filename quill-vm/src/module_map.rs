// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The embedder-supplied module map consulted by `import`.
//!
//! Built-in modules resolve to an immutable map of their attributes;
//! source modules carry source text compiled as a zero-argument
//! function at the import site.

use std::collections::HashMap;

use quill_core::Value;

/// Key under which a builtin module's immutable map records its own
/// name; unit encoding uses it to serialize the module as a
/// reference.
pub const MODULE_NAME_KEY: &str = "__module_name__";

/// A module the compiler can import.
#[derive(Debug, Clone)]
pub enum Module {
    /// A host-implemented module: name → attribute values.
    Builtin(HashMap<String, Value>),
    /// Source text compiled on import.
    Source(String),
}

/// Name → module table.
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    modules: HashMap<String, Module>,
}

impl ModuleMap {
    pub fn new() -> ModuleMap {
        ModuleMap::default()
    }

    /// Register a builtin module.
    pub fn add_builtin(
        &mut self,
        name: impl Into<String>,
        attrs: impl IntoIterator<Item = (String, Value)>,
    ) {
        self.modules
            .insert(name.into(), Module::Builtin(attrs.into_iter().collect()));
    }

    /// Register a source-text module.
    pub fn add_source(&mut self, name: impl Into<String>, src: impl Into<String>) {
        self.modules.insert(name.into(), Module::Source(src.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// The immutable-map value a builtin module imports as. Attribute
    /// values are copied so module state cannot leak between VMs, and
    /// the module name is recorded under [`MODULE_NAME_KEY`].
    pub fn import_value(&self, name: &str) -> Option<Value> {
        match self.get(name)? {
            Module::Builtin(attrs) => {
                let mut entries: Vec<(String, Value)> = attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.copy_value()))
                    .collect();
                entries.push((MODULE_NAME_KEY.to_string(), Value::string(name)));
                Some(Value::immutable_map(entries))
            }
            Module::Source(_) => None,
        }
    }
}
