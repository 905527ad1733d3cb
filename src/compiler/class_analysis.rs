//! Class Analyzer
//!
//! Classifies the members of a class body before it is emitted:
//! - **Static fields**: class-level `name: T = v` / `name = v` (shared storage).
//! - **Dataclass fields**: class-level `name: T (= v)?` of a `@dataclass`, in
//!   declaration order, emitted per instance.
//! - **Instance fields**: `self.name (: T)? = v` found in `__init__`.
//!
//! A fresh [`ClassAnalysis`] is computed each time the generator enters a class
//! and dropped when the class body has been emitted.

use crate::ast::{Expr, Parameter, Stmt};
use crate::codegen::GenerationError;
use crate::compiler::runtime;
use crate::compiler::symbols::ModuleSymbols;
use crate::compiler::types::{self, infer_literal_type, map_annotation};
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct StaticField {
    pub name: String,
    pub ty: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataclassField {
    pub name: String,
    pub ty: String,
    pub default: Option<Expr>,
}

impl DataclassField {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceField {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassAnalysis {
    pub name: String,
    pub base: Option<String>,
    pub is_dataclass: bool,
    pub dataclass_fields: Vec<DataclassField>,
    pub static_fields: Vec<StaticField>,
    pub static_field_names: HashSet<String>,
    pub instance_fields: Vec<InstanceField>,
    pub has_init: bool,
}

impl ClassAnalysis {
    pub fn is_static_field(&self, name: &str) -> bool {
        self.static_field_names.contains(name)
    }

    /// A dataclass with fields and no explicit `__init__` gets a synthesized
    /// constructor.
    pub fn needs_synthesized_constructor(&self) -> bool {
        self.is_dataclass && !self.dataclass_fields.is_empty() && !self.has_init
    }

    /// True when the class derives directly from a built-in exception root.
    pub fn is_exception(&self) -> bool {
        matches!(self.base.as_deref(), Some("Exception") | Some("BaseException"))
    }
}

/// `@dataclass`, `@dataclasses.dataclass` and their called forms.
pub fn is_dataclass(decorators: &[String]) -> bool {
    decorators.iter().any(|decorator| {
        let name = decorator.split('(').next().unwrap_or(decorator).trim();
        name == "dataclass" || name.ends_with(".dataclass")
    })
}

/// Analyzes a `ClassDef` statement.
pub fn analyze(
    class: &Stmt,
    is_dataclass: bool,
    symbols: &ModuleSymbols,
) -> Result<ClassAnalysis, GenerationError> {
    let Stmt::ClassDef { name, bases, body, .. } = class else {
        return Err(GenerationError::new("class analysis requires a class definition"));
    };
    if bases.len() > 1 {
        return Err(GenerationError::new(format!(
            "class '{}': multiple inheritance is not supported",
            name
        )));
    }
    let base = bases.first().cloned();
    if let Some(base) = &base {
        if !base.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(GenerationError::new(format!(
                "class '{}': base class must be a simple name",
                name
            )));
        }
    }

    let mut analysis = ClassAnalysis {
        name: name.clone(),
        base,
        is_dataclass,
        ..ClassAnalysis::default()
    };

    for stmt in body {
        match stmt {
            Stmt::FunctionDef { name: method, .. } => {
                if method == "__init__" {
                    analysis.has_init = true;
                }
            }
            Stmt::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let field = simple_field_name(name, target)?;
                let ty = map_annotation(annotation, symbols)?;
                if is_dataclass && !types::is_class_var(annotation) {
                    analysis.dataclass_fields.push(DataclassField {
                        name: field.to_string(),
                        ty,
                        default: value.clone(),
                    });
                } else {
                    analysis.add_static(field, ty, value.clone());
                }
            }
            Stmt::Assign { targets, value } => {
                let [target] = targets.as_slice() else {
                    return Err(GenerationError::new(format!(
                        "class '{}': static assignment must target a single name",
                        name
                    )));
                };
                let field = simple_field_name(name, target)?;
                let ty = infer_literal_type(value, symbols).unwrap_or_else(|| types::AUTO.to_string());
                analysis.add_static(field, ty, Some(value.clone()));
            }
            Stmt::Pass => {}
            stmt if stmt.is_docstring() => {}
            _ => {
                return Err(GenerationError::new(format!(
                    "unsupported class member in '{}'",
                    name
                )))
            }
        }
    }

    check_dataclass_order(&analysis);
    analysis.instance_fields = collect_instance_fields(&analysis, body, symbols)?;
    Ok(analysis)
}

impl ClassAnalysis {
    fn add_static(&mut self, name: &str, ty: String, value: Option<Expr>) {
        if self.static_field_names.insert(name.to_string()) {
            self.static_fields.push(StaticField {
                name: name.to_string(),
                ty,
                value,
            });
        }
    }
}

fn simple_field_name<'e>(class: &str, target: &'e Expr) -> Result<&'e str, GenerationError> {
    target.as_name().ok_or_else(|| {
        GenerationError::new(format!(
            "class '{}': field declaration must be a simple name, found '{}'",
            class, target
        ))
    })
}

/// Field ordering is not rejected, only reported.
fn check_dataclass_order(analysis: &ClassAnalysis) {
    let mut seen_default = false;
    for field in &analysis.dataclass_fields {
        if field.has_default() {
            seen_default = true;
        } else if seen_default {
            warn!(
                class = %analysis.name,
                field = %field.name,
                "dataclass field without a default follows a field with a default"
            );
        }
    }
}

fn collect_instance_fields(
    analysis: &ClassAnalysis,
    body: &[Stmt],
    symbols: &ModuleSymbols,
) -> Result<Vec<InstanceField>, GenerationError> {
    let init = body.iter().find_map(|stmt| match stmt {
        Stmt::FunctionDef {
            name, params, body, ..
        } if name == "__init__" => Some((params, body)),
        _ => None,
    });
    let Some((params, init_body)) = init else {
        return Ok(Vec::new());
    };

    let param_types = parameter_types(params, symbols)?;
    let declared: HashSet<&str> = analysis
        .dataclass_fields
        .iter()
        .map(|f| f.name.as_str())
        .collect();

    let mut fields: Vec<InstanceField> = Vec::new();
    for stmt in init_body {
        let (target, ty) = match stmt {
            Stmt::AnnAssign {
                target, annotation, ..
            } if target.is_self_attribute() => (target, map_annotation(annotation, symbols)?),
            Stmt::Assign { targets, value } if targets.len() == 1 && targets[0].is_self_attribute() => {
                let ty = infer_field_type(value, &param_types, symbols);
                (&targets[0], ty)
            }
            _ => continue,
        };
        let Expr::Attribute { attr, .. } = target else {
            continue;
        };
        if analysis.is_static_field(attr)
            || declared.contains(attr.as_str())
            || fields.iter().any(|f| &f.name == attr)
        {
            continue;
        }
        fields.push(InstanceField {
            name: attr.clone(),
            ty,
        });
    }
    Ok(fields)
}

fn parameter_types(
    params: &[Parameter],
    symbols: &ModuleSymbols,
) -> Result<HashMap<String, String>, GenerationError> {
    let mut types = HashMap::new();
    for param in params {
        if let Some(annotation) = &param.annotation {
            types.insert(param.name.clone(), map_annotation(annotation, symbols)?);
        }
    }
    Ok(types)
}

/// Type of `self.x = value`: the declared type of a parameter, the literal
/// shape, or the dynamic fallback.
fn infer_field_type(value: &Expr, params: &HashMap<String, String>, symbols: &ModuleSymbols) -> String {
    if let Some(ty) = value.as_name().and_then(|name| params.get(name)) {
        if ty != types::AUTO {
            return ty.clone();
        }
    }
    match infer_literal_type(value, symbols) {
        Some(ty) if ty != types::AUTO => ty,
        _ => runtime::DYNAMIC_TYPE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn analyze_source(source: &str) -> Result<ClassAnalysis, GenerationError> {
        let module = parse_module(source, "t.py").unwrap();
        let symbols = ModuleSymbols::collect(&module);
        let class = &module.body[0];
        let dataclass = match class {
            Stmt::ClassDef { decorators, .. } => is_dataclass(decorators),
            _ => false,
        };
        analyze(class, dataclass, &symbols)
    }

    #[test]
    fn test_static_and_instance_fields() {
        let analysis = analyze_source(
            "class Counter:\n    total: int = 0\n    label = 'c'\n    def __init__(self, step: int) -> None:\n        self.step = step\n        self.total = 5\n        self.name = 'x'\n        self.extra = compute()\n",
        )
        .unwrap();
        assert!(analysis.is_static_field("total"));
        assert!(analysis.is_static_field("label"));
        let names: Vec<(&str, &str)> = analysis
            .instance_fields
            .iter()
            .map(|f| (f.name.as_str(), f.ty.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("step", "long long"), ("name", "string"), ("extra", "std::any")]
        );
    }

    #[test]
    fn test_dataclass_fields_keep_order_and_defaults() {
        let analysis = analyze_source("@dataclass\nclass Point:\n    x: int\n    y: int = 10\n").unwrap();
        assert!(analysis.needs_synthesized_constructor());
        assert_eq!(analysis.dataclass_fields.len(), 2);
        assert_eq!(analysis.dataclass_fields[0].name, "x");
        assert!(!analysis.dataclass_fields[0].has_default());
        assert!(analysis.dataclass_fields[1].has_default());
        assert!(analysis.static_fields.is_empty());
    }

    #[test]
    fn test_multiple_bases_rejected() {
        let err = analyze_source("class C(A, B):\n    pass\n").unwrap_err();
        assert!(err.message.contains("multiple inheritance"));
    }

    #[test]
    fn test_dataclass_decorator_forms() {
        assert!(is_dataclass(&["dataclass".to_string()]));
        assert!(is_dataclass(&["dataclasses.dataclass(frozen=True)".to_string()]));
        assert!(!is_dataclass(&["staticmethod".to_string()]));
    }
}
