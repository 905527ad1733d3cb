//! Parameter mutation scan.
//!
//! Decides whether a function body writes to a parameter, which controls
//! whether heavy parameters can be passed as `const T&`.

use crate::ast::{Expr, FStringPart, Stmt};

const MUTATING_METHODS: &[&str] = &[
    "append", "extend", "clear", "insert", "pop", "remove", "sort", "reverse", "update", "add",
    "discard", "setdefault",
];

/// Immediate sub-expressions of `expr`.
fn children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Name(_) | Expr::Constant(_) | Expr::Raw(_) => Vec::new(),
        Expr::List(items) | Expr::Set(items) | Expr::Tuple(items) => items.iter().collect(),
        Expr::Dict(entries) => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
        Expr::BinOp { left, right, .. } => vec![&**left, &**right],
        Expr::UnaryOp { operand, .. } => vec![&**operand],
        Expr::BoolOp { values, .. } => values.iter().collect(),
        Expr::Compare { left, right, .. } => vec![&**left, &**right],
        Expr::ChainedCompare { left, comparisons } => std::iter::once(&**left)
            .chain(comparisons.iter().map(|(_, e)| e))
            .collect(),
        Expr::Call { func, args, keywords } => std::iter::once(&**func)
            .chain(args.iter())
            .chain(keywords.iter().map(|k| &k.value))
            .collect(),
        Expr::Attribute { value, .. } => vec![&**value],
        Expr::Subscript { value, index } => vec![&**value, &**index],
        Expr::Slice { lower, upper, step } => [lower, upper, step]
            .into_iter()
            .flatten()
            .map(|e| &**e)
            .collect(),
        Expr::IfExp { test, body, orelse } => vec![&**test, &**body, &**orelse],
        Expr::JoinedStr(parts) => parts
            .iter()
            .filter_map(|part| match part {
                FStringPart::Value(e) => Some(e),
                FStringPart::Literal(_) => None,
            })
            .collect(),
        Expr::Comprehension { element, value, clauses, .. } => {
            let mut out: Vec<&Expr> = vec![&**element];
            out.extend(value.as_deref());
            for clause in clauses {
                out.push(&clause.iter);
                out.extend(clause.conditions.iter());
            }
            out
        }
    }
}

/// The name at the root of an attribute/subscript chain.
fn root_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Name(id) => Some(id),
        Expr::Attribute { value, .. } | Expr::Subscript { value, .. } => root_name(value),
        _ => None,
    }
}

fn writes_to(target: &Expr, param: &str) -> bool {
    match target {
        Expr::Tuple(items) | Expr::List(items) => items.iter().any(|t| writes_to(t, param)),
        other => root_name(other) == Some(param),
    }
}

fn calls_mutator(expr: &Expr, param: &str) -> bool {
    if let Expr::Call { func, .. } = expr {
        if let Expr::Attribute { value, attr } = func.as_ref() {
            if value.as_name() == Some(param) && MUTATING_METHODS.contains(&attr.as_str()) {
                return true;
            }
        }
    }
    children(expr).into_iter().any(|child| calls_mutator(child, param))
}

/// True if `body` assigns to `param`, to one of its elements or attributes, or
/// calls a mutating method on it.
pub fn is_param_mutated(body: &[Stmt], param: &str) -> bool {
    body.iter().any(|stmt| stmt_mutates(stmt, param))
}

fn stmt_mutates(stmt: &Stmt, param: &str) -> bool {
    let expr_mutates = |e: &Expr| calls_mutator(e, param);
    match stmt {
        Stmt::Assign { targets, value } => {
            targets.iter().any(|t| writes_to(t, param)) || expr_mutates(value)
        }
        Stmt::AnnAssign { target, value, .. } => {
            writes_to(target, param) || value.as_ref().map_or(false, expr_mutates)
        }
        Stmt::AugAssign { target, value, .. } => writes_to(target, param) || expr_mutates(value),
        Stmt::For { target, iter, body, orelse } => {
            writes_to(target, param)
                || expr_mutates(iter)
                || is_param_mutated(body, param)
                || is_param_mutated(orelse, param)
        }
        Stmt::While { test, body, orelse } | Stmt::If { test, body, orelse } => {
            expr_mutates(test) || is_param_mutated(body, param) || is_param_mutated(orelse, param)
        }
        Stmt::Try { body, handlers, orelse, finalbody } => {
            is_param_mutated(body, param)
                || handlers.iter().any(|h| is_param_mutated(&h.body, param))
                || is_param_mutated(orelse, param)
                || is_param_mutated(finalbody, param)
        }
        Stmt::Return(Some(value)) | Stmt::Raise(Some(value)) | Stmt::Expr(value) => {
            expr_mutates(value)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn body(source: &str) -> Vec<Stmt> {
        match parse_module(source, "t.py").unwrap().body.remove(0) {
            Stmt::FunctionDef { body, .. } => body,
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_detects_mutating_method_and_element_store() {
        let appends = body("def f(xs: list[int]) -> None:\n    xs.append(1)\n");
        assert!(is_param_mutated(&appends, "xs"));
        let stores = body("def f(xs: list[int]) -> None:\n    if True:\n        xs[0] = 2\n");
        assert!(is_param_mutated(&stores, "xs"));
    }

    #[test]
    fn test_reads_are_not_mutations() {
        let reads = body("def f(xs: list[int]) -> int:\n    return len(xs) + xs[0]\n");
        assert!(!is_param_mutated(&reads, "xs"));
    }
}
