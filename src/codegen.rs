//! Code Generator
//!
//! Walks a parsed [`Module`] and emits one C++ translation unit against the
//! `pycs::gc` reference-counting runtime.
//!
//! ## Architecture
//! - [`Generator`] holds the per-translation state: module symbols, the class
//!   currently being emitted, the declaration [`Scope`] and the temp counter.
//! - Statement and expression lowering live in
//!   [`crate::compiler::generators`]; this file drives module layout, classes
//!   and function signatures.
//! - Generation is all-or-nothing: the first [`GenerationError`] aborts the
//!   translation and no partial text is returned.

use crate::ast::{CmpOp, Expr, Module, Parameter, Stmt};
use crate::compiler::class_analysis::{self, ClassAnalysis};
use crate::compiler::generators::expression::generate_expression;
use crate::compiler::generators::statement::{generate_body, generate_statement};
use crate::compiler::mutation::is_param_mutated;
use crate::compiler::runtime;
use crate::compiler::symbols::ModuleSymbols;
use crate::compiler::types::{self, map_annotation};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GenerationError {
    pub message: String,
}

impl GenerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Names already declared in the current lexical block, with the generated
/// class of names known to hold an instance handle.
///
/// Child blocks start from a copy of their parent; declarations made inside a
/// child never flow back.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    declared: HashMap<String, Option<String>>,
}

impl Scope {
    /// Records `name`; returns true if it was not declared before.
    pub fn declare(&mut self, name: &str) -> bool {
        if self.declared.contains_key(name) {
            return false;
        }
        self.declared.insert(name.to_string(), None);
        true
    }

    /// Records `name` as holding a `RcHandle<class>`.
    pub fn declare_instance(&mut self, name: &str, class: &str) {
        self.declared
            .insert(name.to_string(), Some(class.to_string()));
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    pub fn instance_class(&self, name: &str) -> Option<&str> {
        self.declared.get(name)?.as_deref()
    }

    pub fn child(&self) -> Self {
        self.clone()
    }
}

// ============================================================================
// Output Buffer
// ============================================================================

const INDENT: &str = "    ";

/// Line buffer with Allman-style braces and four-space indentation.
#[derive(Debug, Default)]
pub struct CodeWriter {
    lines: Vec<String>,
    depth: usize,
}

impl CodeWriter {
    pub fn line(&mut self, text: impl AsRef<str>) {
        self.lines
            .push(format!("{}{}", INDENT.repeat(self.depth), text.as_ref()));
    }

    /// An access specifier, one level out from the members.
    pub fn label(&mut self, text: &str) {
        let depth = self.depth.saturating_sub(1);
        self.lines.push(format!("{}{}", INDENT.repeat(depth), text));
    }

    /// Emits `header` (if any) followed by an opening brace.
    pub fn open(&mut self, header: impl AsRef<str>) {
        let header = header.as_ref();
        if !header.is_empty() {
            self.line(header);
        }
        self.line("{");
        self.depth += 1;
    }

    pub fn close(&mut self) {
        self.close_with("}");
    }

    pub fn close_with(&mut self, text: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    pub fn finish(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

// ============================================================================
// Generator
// ============================================================================

pub struct Generator {
    pub symbols: ModuleSymbols,
    /// Analysis of the class whose body is being emitted.
    pub current_class: Option<ClassAnalysis>,
    pub scope: Scope,
    pub out: CodeWriter,
    temp_counter: usize,
}

/// Generates the C++ translation unit for `module`.
pub fn generate(module: &Module) -> Result<String, GenerationError> {
    let mut generator = Generator::new(ModuleSymbols::collect(module));
    generator.generate_module(module)?;
    Ok(generator.out.finish())
}

impl Generator {
    pub fn new(symbols: ModuleSymbols) -> Self {
        Self {
            symbols,
            current_class: None,
            scope: Scope::default(),
            out: CodeWriter::default(),
            temp_counter: 0,
        }
    }

    /// A fresh temporary name: `__pytra_<base>_<n>`.
    pub fn temp(&mut self, base: &str) -> String {
        self.temp_counter += 1;
        format!("__pytra_{}_{}", base, self.temp_counter)
    }

    /// Reserves the next temp number without naming a temporary.
    pub fn next_temp_id(&mut self) -> usize {
        self.temp_counter += 1;
        self.temp_counter
    }

    /// Runs `f` with a child scope, restoring the enclosing scope afterwards.
    pub fn with_child_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, GenerationError>,
    ) -> Result<T, GenerationError> {
        let child = self.scope.child();
        self.with_scope(child, f)
    }

    /// Runs `f` with `scope` installed, restoring the enclosing scope afterwards.
    pub fn with_scope<T>(
        &mut self,
        scope: Scope,
        f: impl FnOnce(&mut Self) -> Result<T, GenerationError>,
    ) -> Result<T, GenerationError> {
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = saved;
        result
    }

    pub fn expr(&self, expr: &Expr) -> Result<String, GenerationError> {
        generate_expression(self, expr)
    }

    fn generate_module(&mut self, module: &Module) -> Result<(), GenerationError> {
        let includes: BTreeSet<String> = runtime::BASE_INCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(self.symbols.includes.iter().cloned())
            .collect();
        for include in &includes {
            self.out.line(include);
        }
        self.out.blank();
        for directive in runtime::USING_DIRECTIVES {
            self.out.line(directive);
        }
        self.out.blank();

        let classes: Vec<&Stmt> = module
            .body
            .iter()
            .filter(|stmt| matches!(stmt, Stmt::ClassDef { .. }))
            .collect();
        if !classes.is_empty() {
            for class in &classes {
                if let Stmt::ClassDef { name, .. } = class {
                    self.out.line(format!("class {};", name));
                }
            }
            self.out.blank();
        }

        let mut entry_body: Vec<&Stmt> = Vec::new();
        for stmt in &module.body {
            match stmt {
                Stmt::ClassDef { .. } => {
                    self.generate_class(stmt)?;
                    self.out.blank();
                }
                Stmt::FunctionDef { .. } => {
                    self.generate_function(stmt)?;
                    self.out.blank();
                }
                Stmt::Import { .. } | Stmt::ImportFrom { .. } => {}
                stmt if stmt.is_docstring() => {}
                Stmt::If { test, body, .. } if is_main_guard(test) => entry_body.extend(body),
                stmt => entry_body.push(stmt),
            }
        }

        self.generate_entry_point(&entry_body)
    }

    /// `int main()` built from the remaining top-level statements.
    fn generate_entry_point(&mut self, body: &[&Stmt]) -> Result<(), GenerationError> {
        self.out.open("int main()");
        self.with_scope(Scope::default(), |generator| {
            body.iter()
                .try_for_each(|stmt| generate_statement(generator, stmt))
        })?;
        self.out.line("return 0;");
        self.out.close();
        Ok(())
    }

    // ========================================================================
    // Classes
    // ========================================================================

    fn generate_class(&mut self, class: &Stmt) -> Result<(), GenerationError> {
        let Stmt::ClassDef {
            name,
            decorators,
            body,
            ..
        } = class
        else {
            return Ok(());
        };
        let analysis =
            class_analysis::analyze(class, class_analysis::is_dataclass(decorators), &self.symbols)?;
        debug!(
            class = %name,
            static_fields = analysis.static_fields.len(),
            instance_fields = analysis.instance_fields.len(),
            "emitting class"
        );

        let base = match analysis.base.as_deref() {
            None => runtime::object_base(),
            Some(_) if analysis.is_exception() => runtime::ROOT_EXCEPTION.to_string(),
            Some(base) => base.to_string(),
        };
        self.out.open(format!("class {} : public {}", name, base));
        self.out.label("public:");

        for field in &analysis.static_fields {
            let ty = declared_type(&field.ty, field.value.is_some());
            match &field.value {
                Some(value) => {
                    let value = self.expr(value)?;
                    self.out
                        .line(format!("inline static {} {} = {};", ty, field.name, value));
                }
                None => self.out.line(format!("inline static {} {};", ty, field.name)),
            }
        }
        for field in &analysis.dataclass_fields {
            let ty = declared_type(&field.ty, field.default.is_some());
            match &field.default {
                Some(default) => {
                    let default = self.expr(default)?;
                    self.out.line(format!("{} {} = {};", ty, field.name, default));
                }
                None => self.out.line(format!("{} {};", ty, field.name)),
            }
        }
        for field in &analysis.instance_fields {
            let ty = declared_type(&field.ty, false);
            self.out.line(format!("{} {};", ty, field.name));
        }

        if analysis.needs_synthesized_constructor() {
            let mut params = Vec::new();
            for field in &analysis.dataclass_fields {
                let ty = declared_type(&field.ty, false);
                match &field.default {
                    Some(default) => {
                        params.push(format!("{} {} = {}", ty, field.name, self.expr(default)?))
                    }
                    None => params.push(format!("{} {}", ty, field.name)),
                }
            }
            self.out.open(format!("{}({})", name, params.join(", ")));
            for field in &analysis.dataclass_fields {
                self.out
                    .line(format!("this->{} = {};", field.name, field.name));
            }
            self.out.close();
        }

        let previous = self.current_class.replace(analysis);
        let result = body
            .iter()
            .filter(|stmt| matches!(stmt, Stmt::FunctionDef { .. }))
            .try_for_each(|method| self.generate_method(name, method));
        self.current_class = previous;
        result?;

        self.out.close_with("};");
        Ok(())
    }

    fn generate_method(&mut self, class: &str, method: &Stmt) -> Result<(), GenerationError> {
        let Stmt::FunctionDef {
            name,
            params,
            returns,
            decorators,
            body,
        } = method
        else {
            return Ok(());
        };
        let is_static = decorators.iter().any(|d| d == "staticmethod");
        let receiver = !is_static && params.first().map(|p| p.name.as_str()) == Some("self");
        let params = if receiver { &params[1..] } else { &params[..] };
        let return_type = map_annotation(returns, &self.symbols)?;
        let signature = self.parameter_list(params, body)?;

        let header = if name == "__init__" {
            if return_type != "void" {
                return Err(GenerationError::new("__init__ return type must be None"));
            }
            format!("{}({})", class, signature.text)
        } else if is_static {
            format!("static {} {}({})", return_type, name, signature.text)
        } else if signature.generic || return_type == types::AUTO {
            // auto parameters make the method a template, which cannot be virtual
            format!("{} {}({})", return_type, name, signature.text)
        } else {
            format!("virtual {} {}({})", return_type, name, signature.text)
        };

        debug!(class, method = %name, "emitting method");
        self.generate_function_body(&header, signature.scope, body)
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn generate_function(&mut self, function: &Stmt) -> Result<(), GenerationError> {
        let Stmt::FunctionDef {
            name,
            params,
            returns,
            body,
            ..
        } = function
        else {
            return Ok(());
        };
        let return_type = map_annotation(returns, &self.symbols)?;
        let signature = self.parameter_list(params, body)?;
        let name = self.symbols.function_name(name).to_string();
        debug!(function = %name, "emitting function");
        let header = format!("{} {}({})", return_type, name, signature.text);
        self.generate_function_body(&header, signature.scope, body)
    }

    fn generate_function_body(
        &mut self,
        header: &str,
        scope: Scope,
        body: &[Stmt],
    ) -> Result<(), GenerationError> {
        self.out.open(header);
        self.with_scope(scope, |generator| {
            generate_body(generator, body)
        })?;
        self.out.close();
        Ok(())
    }

    fn parameter_list(
        &self,
        params: &[Parameter],
        body: &[Stmt],
    ) -> Result<Signature, GenerationError> {
        let mut parts = Vec::with_capacity(params.len());
        let mut scope = Scope::default();
        let mut generic = false;
        for param in params {
            let ty = match &param.annotation {
                Some(annotation) => map_annotation(annotation, &self.symbols)?,
                None => types::AUTO.to_string(),
            };
            generic |= ty == types::AUTO;
            match runtime::handle_class(&ty) {
                Some(class) => scope.declare_instance(&param.name, class),
                None => {
                    scope.declare(&param.name);
                }
            }
            let mut part = if types::is_heavy(&ty) && !is_param_mutated(body, &param.name) {
                format!("const {}& {}", ty, param.name)
            } else {
                format!("{} {}", ty, param.name)
            };
            if let Some(default) = &param.default {
                part.push_str(" = ");
                part.push_str(&self.expr(default)?);
            }
            parts.push(part);
        }
        Ok(Signature {
            text: parts.join(", "),
            scope,
            generic,
        })
    }
}

struct Signature {
    text: String,
    scope: Scope,
    generic: bool,
}

/// `auto` needs an initializer; without one the dynamic type is declared.
pub(crate) fn declared_type(ty: &str, has_initializer: bool) -> String {
    if ty == types::AUTO && !has_initializer {
        runtime::DYNAMIC_TYPE.to_string()
    } else {
        ty.to_string()
    }
}

/// `if __name__ == "__main__":`
fn is_main_guard(test: &Expr) -> bool {
    match test {
        Expr::Compare {
            left,
            op: CmpOp::Eq,
            right,
        } => {
            (left.as_name() == Some("__name__") && right.as_str_constant() == Some("__main__"))
                || (right.as_name() == Some("__name__") && left.as_str_constant() == Some("__main__"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    #[test]
    fn test_scope_child_does_not_leak() {
        let mut parent = Scope::default();
        parent.declare("x");
        let mut child = parent.child();
        assert!(child.declare("y"));
        assert!(!child.declare("x"));
        assert!(!parent.is_declared("y"));
    }

    #[test]
    fn test_scope_tracks_instance_classes() {
        let mut scope = Scope::default();
        scope.declare("n");
        assert_eq!(scope.instance_class("n"), None);
        scope.declare_instance("c", "Counter");
        assert!(!scope.declare("c"));
        assert_eq!(scope.instance_class("c"), Some("Counter"));
        let child = scope.child();
        assert_eq!(child.instance_class("c"), Some("Counter"));
    }

    #[test]
    fn test_writer_allman_braces() {
        let mut out = CodeWriter::default();
        out.open("void f()");
        out.line("return;");
        out.close();
        assert_eq!(out.finish(), "void f()\n{\n    return;\n}\n");
    }

    #[test]
    fn test_temps_are_numbered_per_generator() {
        let mut generator = Generator::new(ModuleSymbols::default());
        assert_eq!(generator.temp("tuple"), "__pytra_tuple_1");
        assert_eq!(generator.temp("item"), "__pytra_item_2");
        let mut other = Generator::new(ModuleSymbols::default());
        assert_eq!(other.temp("tuple"), "__pytra_tuple_1");
    }

    #[test]
    fn test_main_guard_detection() {
        assert!(is_main_guard(&parse_expression("__name__ == '__main__'")));
        assert!(!is_main_guard(&parse_expression("__name__ != '__main__'")));
    }
}
