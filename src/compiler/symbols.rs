//! Module Symbols
//!
//! Facts gathered from a module's top level before any code is emitted: which
//! names are classes, which of those are exception types, which names are
//! imported modules, and which functions must be renamed. The result is threaded
//! through generation as an explicit value and recomputed per translation unit.

use crate::ast::{Module, Stmt};
use crate::compiler::runtime;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct ModuleSymbols {
    pub class_names: HashSet<String>,
    /// Classes deriving (directly or transitively) from `Exception` or
    /// `BaseException`.
    pub exception_classes: HashSet<String>,
    /// Bound name -> imported module, for modules lowered to namespaces.
    pub module_aliases: HashMap<String, String>,
    pub function_renames: HashMap<String, String>,
    /// Include directives requested by the module's imports.
    pub includes: BTreeSet<String>,
}

impl ModuleSymbols {
    pub fn collect(module: &Module) -> Self {
        let mut symbols = Self::default();
        let mut bases: Vec<(&str, &str)> = Vec::new();

        for stmt in &module.body {
            match stmt {
                Stmt::ClassDef { name, bases: class_bases, .. } => {
                    symbols.class_names.insert(name.clone());
                    if let Some(base) = class_bases.first() {
                        bases.push((name.as_str(), base.as_str()));
                    }
                }
                Stmt::FunctionDef { name, .. } if name == "main" => {
                    symbols
                        .function_renames
                        .insert(name.clone(), "py_main".to_string());
                }
                Stmt::Import { names } => {
                    for alias in names {
                        symbols.add_module(&alias.name);
                        if runtime::has_namespace(&alias.name) {
                            symbols
                                .module_aliases
                                .insert(alias.bound_name().to_string(), alias.name.clone());
                        }
                    }
                }
                Stmt::ImportFrom { module: name, .. } => symbols.add_module(name),
                _ => {}
            }
        }

        // Walk base chains until no new exception class appears.
        let mut changed = true;
        while changed {
            changed = false;
            for (class, base) in &bases {
                let derives = matches!(*base, "Exception" | "BaseException")
                    || symbols.exception_classes.contains(*base);
                if derives && symbols.exception_classes.insert((*class).to_string()) {
                    changed = true;
                }
            }
        }
        symbols
    }

    fn add_module(&mut self, module: &str) {
        if let Some(include) = runtime::include_for_module(module) {
            self.includes.insert(include.to_string());
        }
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.class_names.contains(name)
    }

    pub fn is_exception_class(&self, name: &str) -> bool {
        self.exception_classes.contains(name)
    }

    /// Classes that are allocated through the reference-counted runtime.
    pub fn is_rc_class(&self, name: &str) -> bool {
        self.is_class(name) && !self.is_exception_class(name)
    }

    pub fn module_for(&self, name: &str) -> Option<&str> {
        self.module_aliases.get(name).map(String::as_str)
    }

    pub fn function_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.function_renames
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }
}
