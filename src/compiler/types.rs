//! Type Mapping
//!
//! Translates Python annotations to C++ type spellings and infers C++ types
//! from the literal shape of an expression.
//!
//! ## Rules
//! - `int`, `float`, `str`, `bool`, `None` map to fixed primitives.
//! - `list[T]`, `set[T]`, `dict[K, V]`, `tuple[...]` map to standard containers,
//!   recursing on the element types.
//! - A name that is a class of the current module maps to its owning handle.
//! - `T | None` and `Optional[T]` map to `T`.
//! - `ast.<node>` maps to the `pycs::cpp_module::ast` node pointer types.
//! - Anything else maps to `auto`: partially annotated input is tolerated.

use crate::ast::{BinOp, Constant, Expr, UnaryOp};
use crate::codegen::GenerationError;
use crate::compiler::runtime;
use crate::compiler::symbols::ModuleSymbols;
use crate::parser::parse_expression;

/// Placeholder for types the generator leaves to the C++ compiler.
pub const AUTO: &str = "auto";

fn primitive(name: &str) -> Option<&'static str> {
    match name {
        "int" => Some("long long"),
        "float" => Some("double"),
        "str" => Some("string"),
        "bool" => Some("bool"),
        "None" => Some("void"),
        "bytes" | "bytearray" => Some("vector<uint8_t>"),
        "Any" | "object" => Some(runtime::DYNAMIC_TYPE),
        _ => None,
    }
}

fn container(name: &str) -> Option<&'static str> {
    match name {
        "list" | "List" => Some("vector"),
        "set" | "Set" => Some("unordered_set"),
        "dict" | "Dict" => Some("unordered_map"),
        "tuple" | "Tuple" => Some("tuple"),
        _ => None,
    }
}

/// Maps a type annotation to a C++ type.
pub fn map_annotation(annotation: &Expr, symbols: &ModuleSymbols) -> Result<String, GenerationError> {
    match annotation {
        Expr::Constant(Constant::None) => Ok("void".to_string()),
        // forward reference: "Node"
        Expr::Constant(Constant::Str(text)) => match parse_expression(text) {
            Expr::Constant(Constant::Str(_)) => Ok(AUTO.to_string()),
            parsed => map_annotation(&parsed, symbols),
        },
        Expr::Name(name) => {
            if let Some(ty) = primitive(name) {
                return Ok(ty.to_string());
            }
            if symbols.is_class(name) {
                return Ok(runtime::handle_type(name));
            }
            Ok(AUTO.to_string())
        }
        Expr::BinOp {
            left,
            op: BinOp::BitOr,
            right,
        } => {
            let left = map_annotation(left, symbols)?;
            let right = map_annotation(right, symbols)?;
            if left == "void" {
                Ok(right)
            } else if right == "void" {
                Ok(left)
            } else {
                Ok(AUTO.to_string())
            }
        }
        Expr::Subscript { value, index } => {
            let Some(base) = value.as_name() else {
                return Ok(AUTO.to_string());
            };
            if base == "Optional" {
                return map_annotation(index, symbols);
            }
            if base == "ClassVar" || base == "Final" {
                return map_annotation(index, symbols);
            }
            let Some(container) = container(base) else {
                return Ok(AUTO.to_string());
            };
            let args = match index.as_ref() {
                Expr::Tuple(items) => items
                    .iter()
                    .map(|item| map_annotation(item, symbols))
                    .collect::<Result<Vec<_>, _>>()?,
                single => vec![map_annotation(single, symbols)?],
            };
            Ok(format!("{}<{}>", container, args.join(", ")))
        }
        Expr::Attribute { value, attr } if is_ast_module(value, symbols) => {
            Ok(runtime::ast_node_type(attr).unwrap_or_else(|| AUTO.to_string()))
        }
        Expr::Raw(text) => Err(GenerationError::new(format!(
            "unresolvable type annotation '{}'",
            text
        ))),
        _ => Ok(AUTO.to_string()),
    }
}

/// True when `value` names the `ast` module, directly or through an alias.
pub fn is_ast_module(value: &Expr, symbols: &ModuleSymbols) -> bool {
    value
        .as_name()
        .map_or(false, |name| name == "ast" || symbols.module_for(name) == Some("ast"))
}

/// True for `ClassVar[...]` annotations.
pub fn is_class_var(annotation: &Expr) -> bool {
    matches!(annotation, Expr::Subscript { value, .. } if value.as_name() == Some("ClassVar"))
}

/// Types copied by value whose parameters are passed as `const T&`.
pub fn is_heavy(cpp_type: &str) -> bool {
    cpp_type == "string"
        || ["vector<", "unordered_set<", "unordered_map<", "tuple<"]
            .iter()
            .any(|prefix| cpp_type.starts_with(prefix))
}

fn merge(types: &[String], fallback: &str) -> String {
    match types.first() {
        None => fallback.to_string(),
        Some(first) if types.iter().all(|t| t == first) => first.clone(),
        Some(_) if types.iter().all(|t| matches!(t.as_str(), "long long" | "double")) => {
            "double".to_string()
        }
        Some(_) => fallback.to_string(),
    }
}

/// Infers a C++ type from the literal shape of `expr`.
pub fn infer_literal_type(expr: &Expr, symbols: &ModuleSymbols) -> Option<String> {
    let infer_all = |items: Vec<&Expr>| -> Vec<String> {
        items
            .into_iter()
            .filter_map(|item| infer_literal_type(item, symbols))
            .collect()
    };
    match expr {
        Expr::Constant(Constant::Bool(_)) => Some("bool".to_string()),
        Expr::Constant(Constant::Int(_)) => Some("long long".to_string()),
        Expr::Constant(Constant::Float(_)) => Some("double".to_string()),
        Expr::Constant(Constant::Str(_)) | Expr::JoinedStr(_) => Some("string".to_string()),
        Expr::List(items) => Some(format!(
            "vector<{}>",
            merge(&infer_all(items.iter().collect()), "long long")
        )),
        Expr::Set(items) => Some(format!(
            "unordered_set<{}>",
            merge(&infer_all(items.iter().collect()), "long long")
        )),
        Expr::Dict(entries) => {
            let keys = infer_all(entries.iter().map(|(k, _)| k).collect());
            let values = infer_all(entries.iter().map(|(_, v)| v).collect());
            Some(format!(
                "unordered_map<{}, {}>",
                merge(&keys, "string"),
                merge(&values, "long long")
            ))
        }
        Expr::BinOp { op: BinOp::Div | BinOp::Pow, .. } => Some("double".to_string()),
        Expr::BinOp { left, right, .. } => {
            let sides = infer_all(vec![left.as_ref(), right.as_ref()]);
            let merged = merge(&sides, AUTO);
            (merged != AUTO).then_some(merged)
        }
        Expr::UnaryOp { op: UnaryOp::Not, .. } => Some("bool".to_string()),
        Expr::UnaryOp { operand, .. } => infer_literal_type(operand, symbols),
        Expr::Compare { .. } => Some("bool".to_string()),
        Expr::Call { func, .. } => match func.as_name()? {
            "len" | "int" => Some("long long".to_string()),
            "float" => Some("double".to_string()),
            "str" => Some("string".to_string()),
            name if symbols.is_rc_class(name) => Some(runtime::handle_type(name)),
            _ => None,
        },
        _ => None,
    }
}
