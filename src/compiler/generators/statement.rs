//! Statement Lowering Module
//!
//! Emits C++ statements for AST statements. Each function takes `&mut Generator`
//! to write output lines and to consult or extend the declaration scope.
//!
//! ## Architecture
//! - **Simple statements**: return, raise, break, continue, expression statements
//! - **Assignments**: declare-on-first-assignment tracking via [`Scope`](crate::codegen::Scope)
//! - **Control flow**: if (with isinstance narrowing), for, while, try
//!
//! Every nested block runs in a child scope, so declarations made in one branch
//! never leak into a sibling branch or the parent.

use crate::ast::{BinOp, Expr, ExceptHandler, Stmt};
use crate::codegen::{declared_type, GenerationError, Generator};
use crate::compiler::generators::expression::{binop_helper, is_super_call, isinstance_type};
use crate::compiler::runtime;
use crate::compiler::types::{self, infer_literal_type, map_annotation};
use tracing::warn;

/// Emits every statement of `body` in the current scope.
pub fn generate_body(gen: &mut Generator, body: &[Stmt]) -> Result<(), GenerationError> {
    body.iter().try_for_each(|stmt| generate_statement(gen, stmt))
}

/// Emits `header { body }` with `body` in a child scope.
fn generate_block(gen: &mut Generator, header: &str, body: &[Stmt]) -> Result<(), GenerationError> {
    gen.out.open(header);
    gen.with_child_scope(|gen| generate_body(gen, body))?;
    gen.out.close();
    Ok(())
}

pub fn generate_statement(gen: &mut Generator, stmt: &Stmt) -> Result<(), GenerationError> {
    match stmt {
        Stmt::Import { .. } | Stmt::ImportFrom { .. } | Stmt::Pass => Ok(()),
        stmt if stmt.is_docstring() => Ok(()),
        Stmt::Break => {
            gen.out.line("break;");
            Ok(())
        }
        Stmt::Continue => {
            gen.out.line("continue;");
            Ok(())
        }
        Stmt::Return(value) => generate_return(gen, value.as_ref()),
        Stmt::Raise(exc) => generate_raise(gen, exc.as_ref()),
        Stmt::Expr(expr) => generate_expr_stmt(gen, expr),
        Stmt::AnnAssign {
            target,
            annotation,
            value,
        } => generate_ann_assign(gen, target, annotation, value.as_ref()),
        Stmt::Assign { targets, value } => generate_assign(gen, targets, value),
        Stmt::AugAssign { target, op, value } => generate_aug_assign(gen, target, *op, value),
        Stmt::If { test, body, orelse } => generate_if(gen, "if", test, body, orelse),
        Stmt::For {
            target,
            iter,
            body,
            orelse,
        } => generate_for(gen, target, iter, body, orelse),
        Stmt::While { test, body, orelse } => generate_while(gen, test, body, orelse),
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => generate_try(gen, body, handlers, orelse, finalbody),
        Stmt::ClassDef { name, .. } => Err(GenerationError::new(format!(
            "nested class '{}' is not supported",
            name
        ))),
        Stmt::FunctionDef { name, .. } => Err(GenerationError::new(format!(
            "nested function '{}' is not supported",
            name
        ))),
    }
}

// ============================================================================
// Simple Statement Helpers
// ============================================================================

fn generate_return(gen: &mut Generator, value: Option<&Expr>) -> Result<(), GenerationError> {
    match value {
        Some(value) => {
            let value = gen.expr(value)?;
            gen.out.line(format!("return {};", value));
        }
        None => gen.out.line("return;"),
    }
    Ok(())
}

/// `raise` re-throws; `raise E(msg)` throws a runtime error carrying the
/// stringified first argument. Anything else, `raise E()` included, is
/// stringified whole.
fn generate_raise(gen: &mut Generator, exc: Option<&Expr>) -> Result<(), GenerationError> {
    let line = match exc {
        None => "throw;".to_string(),
        Some(Expr::Call { args, .. }) if !args.is_empty() => format!(
            "throw std::runtime_error(py_to_string({}));",
            gen.expr(&args[0])?
        ),
        Some(exc) => format!("throw std::runtime_error(py_to_string({}));", gen.expr(exc)?),
    };
    gen.out.line(line);
    Ok(())
}

fn generate_expr_stmt(gen: &mut Generator, expr: &Expr) -> Result<(), GenerationError> {
    // the base class is default-constructed before the derived constructor body
    if let Expr::Call { func, args, keywords } = expr {
        if let Expr::Attribute { value, attr } = func.as_ref() {
            if attr == "__init__" && is_super_call(value) && args.is_empty() && keywords.is_empty() {
                gen.out
                    .line("/* super().__init__ omitted: base ctor is called implicitly */");
                return Ok(());
            }
        }
    }
    let expr = gen.expr(expr)?;
    gen.out.line(format!("{};", expr));
    Ok(())
}

// ============================================================================
// Assignments
// ============================================================================

fn generate_ann_assign(
    gen: &mut Generator,
    target: &Expr,
    annotation: &Expr,
    value: Option<&Expr>,
) -> Result<(), GenerationError> {
    let value = value.map(|value| gen.expr(value)).transpose()?;
    match target {
        Expr::Name(name) => {
            if gen.scope.is_declared(name) {
                if let Some(value) = value {
                    gen.out.line(format!("{} = {};", name, value));
                }
                return Ok(());
            }
            let ty = map_annotation(annotation, &gen.symbols)?;
            match runtime::handle_class(&ty) {
                Some(class) => gen.scope.declare_instance(name, class),
                None => {
                    gen.scope.declare(name);
                }
            }
            match value {
                Some(value) => gen.out.line(format!("{} {} = {};", ty, name, value)),
                None => gen
                    .out
                    .line(format!("{} {};", declared_type(&ty, false), name)),
            }
            Ok(())
        }
        target if target.is_self_attribute() => {
            let Some(value) = value else {
                return Err(GenerationError::new(format!(
                    "annotated attribute '{}' requires a value",
                    target
                )));
            };
            let target = gen.expr(target)?;
            gen.out.line(format!("{} = {};", target, value));
            Ok(())
        }
        target => Err(GenerationError::new(format!(
            "unsupported annotated assignment target '{}'",
            target
        ))),
    }
}

fn generate_assign(gen: &mut Generator, targets: &[Expr], value: &Expr) -> Result<(), GenerationError> {
    match targets {
        [] => Err(GenerationError::new("assignment without a target")),
        [Expr::Tuple(items)] | [Expr::List(items)] => generate_unpack(gen, items, value),
        [target] => {
            let value_text = gen.expr(value)?;
            match target {
                Expr::Name(name) => {
                    if gen.scope.declare(name) {
                        let ty = infer_literal_type(value, &gen.symbols)
                            .unwrap_or_else(|| types::AUTO.to_string());
                        if let Some(class) = instance_class_of(gen, value) {
                            gen.scope.declare_instance(name, &class);
                        }
                        gen.out.line(format!("{} {} = {};", ty, name, value_text));
                    } else {
                        gen.out.line(format!("{} = {};", name, value_text));
                    }
                    Ok(())
                }
                // attribute paths and elements are always stores
                Expr::Attribute { .. } | Expr::Subscript { .. } => {
                    let target = gen.expr(target)?;
                    gen.out.line(format!("{} = {};", target, value_text));
                    Ok(())
                }
                target => Err(GenerationError::new(format!(
                    "unsupported assignment target '{}'",
                    target
                ))),
            }
        }
        targets => generate_unpack(gen, targets, value),
    }
}

/// The generated class an assigned value is an instance of, when it is a
/// constructor call or another known instance.
fn instance_class_of(gen: &Generator, value: &Expr) -> Option<String> {
    match value {
        Expr::Call { func, .. } => func
            .as_name()
            .filter(|name| gen.symbols.is_rc_class(name))
            .map(str::to_owned),
        Expr::Name(name) => gen.scope.instance_class(name).map(str::to_owned),
        _ => None,
    }
}

/// `a, b = value`: one tuple temporary, then one `std::get` per target.
fn generate_unpack(gen: &mut Generator, targets: &[Expr], value: &Expr) -> Result<(), GenerationError> {
    let value = gen.expr(value)?;
    let tuple = gen.temp("tuple");
    gen.out.line(format!("auto {} = {};", tuple, value));
    for (i, target) in targets.iter().enumerate() {
        let element = format!("std::get<{}>({})", i, tuple);
        match target {
            Expr::Name(name) => {
                if gen.scope.declare(name) {
                    gen.out.line(format!("auto {} = {};", name, element));
                } else {
                    gen.out.line(format!("{} = {};", name, element));
                }
            }
            Expr::Attribute { .. } | Expr::Subscript { .. } => {
                let target = gen.expr(target)?;
                gen.out.line(format!("{} = {};", target, element));
            }
            target => {
                return Err(GenerationError::new(format!(
                    "unsupported unpacking target '{}'",
                    target
                )))
            }
        }
    }
    Ok(())
}

fn generate_aug_assign(
    gen: &mut Generator,
    target: &Expr,
    op: BinOp,
    value: &Expr,
) -> Result<(), GenerationError> {
    if !matches!(
        target,
        Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. }
    ) {
        return Err(GenerationError::new(format!(
            "unsupported augmented assignment target '{}'",
            target
        )));
    }
    let target = gen.expr(target)?;
    let value = gen.expr(value)?;
    let line = match binop_helper(op) {
        Some(helper) => format!("{t} = {h}({t}, {v});", t = target, h = helper, v = value),
        None => format!("{} {}= {};", target, op.as_str(), value),
    };
    gen.out.line(line);
    Ok(())
}

// ============================================================================
// Control Flow
// ============================================================================

/// `isinstance(name, Class)` where `Class` names a module class or a
/// namespaced type: returns the variable and the cast target.
fn narrowing_cast(gen: &Generator, test: &Expr) -> Result<Option<(String, String)>, GenerationError> {
    let Expr::Call {
        func,
        args,
        keywords,
    } = test
    else {
        return Ok(None);
    };
    if func.as_name() != Some("isinstance") || !keywords.is_empty() {
        return Ok(None);
    }
    let [Expr::Name(var), class] = args.as_slice() else {
        return Ok(None);
    };
    let narrows = match class {
        Expr::Name(name) => gen.symbols.is_class(name),
        Expr::Attribute { value, .. } => value.as_name().is_some(),
        _ => false,
    };
    if !narrows || var == "self" {
        return Ok(None);
    }
    Ok(Some((var.clone(), isinstance_type(gen, class)?)))
}

fn generate_if(
    gen: &mut Generator,
    keyword: &str,
    test: &Expr,
    body: &[Stmt],
    orelse: &[Stmt],
) -> Result<(), GenerationError> {
    let narrowing = narrowing_cast(gen, test)?;
    match &narrowing {
        Some((var, ty)) => gen.out.open(format!(
            "{} (auto __cast_{v} = py_cast<{t}>({v}))",
            keyword,
            v = var,
            t = ty
        )),
        None => {
            let test = gen.expr(test)?;
            gen.out.open(format!("{} ({})", keyword, condition(&test)));
        }
    }
    gen.with_child_scope(|gen| {
        if let Some((var, ty)) = &narrowing {
            // rebinding shadows the original only inside the branch
            gen.out.line(format!("auto {v} = __cast_{v};", v = var));
            if gen.symbols.is_rc_class(ty) {
                gen.scope.declare_instance(var, ty);
            } else {
                gen.scope.declare(var);
            }
        }
        generate_body(gen, body)
    })?;
    gen.out.close();

    match orelse {
        [] => Ok(()),
        [Stmt::If { test, body, orelse }] => generate_if(gen, "else if", test, body, orelse),
        orelse => generate_block(gen, "else", orelse),
    }
}

fn generate_while(
    gen: &mut Generator,
    test: &Expr,
    body: &[Stmt],
    orelse: &[Stmt],
) -> Result<(), GenerationError> {
    let test = gen.expr(test)?;
    generate_block(gen, &format!("while ({})", condition(&test)), body)?;
    generate_loop_else(gen, "while", orelse)
}

fn generate_loop_else(gen: &mut Generator, keyword: &str, orelse: &[Stmt]) -> Result<(), GenerationError> {
    if orelse.is_empty() {
        return Ok(());
    }
    warn!(keyword, "loop else body emitted unconditionally after the loop");
    gen.out.line(format!(
        "// {}-else is not directly supported; else body emitted below",
        keyword
    ));
    generate_block(gen, "", orelse)
}

/// Positional arguments of `range(...)` when `iter` is a plain range call.
fn range_arguments<'e>(gen: &Generator, iter: &'e Expr) -> Option<&'e [Expr]> {
    match iter {
        Expr::Call {
            func,
            args,
            keywords,
        } if func.as_name() == Some("range")
            && !gen.symbols.is_class("range")
            && keywords.is_empty()
            && (1..=3).contains(&args.len()) =>
        {
            Some(args)
        }
        _ => None,
    }
}

fn generate_for(
    gen: &mut Generator,
    target: &Expr,
    iter: &Expr,
    body: &[Stmt],
    orelse: &[Stmt],
) -> Result<(), GenerationError> {
    match (target, range_arguments(gen, iter)) {
        (Expr::Name(var), Some(bounds)) => generate_range_loop(gen, var, bounds, body)?,
        (Expr::Name(var), None) => {
            let iter = gen.expr(iter)?;
            gen.out.open(format!("for (const auto& {} : {})", var, iter));
            gen.with_child_scope(|gen| {
                gen.scope.declare(var);
                generate_body(gen, body)
            })?;
            gen.out.close();
        }
        (Expr::Tuple(items), _) => {
            let names = items
                .iter()
                .map(|item| {
                    item.as_name().ok_or_else(|| {
                        GenerationError::new(format!("unsupported for-loop target '{}'", target))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let iter = gen.expr(iter)?;
            let item = gen.temp("item");
            gen.out.open(format!("for (const auto& {} : {})", item, iter));
            gen.with_child_scope(|gen| {
                for (i, name) in names.iter().enumerate() {
                    gen.out
                        .line(format!("auto {} = std::get<{}>({});", name, i, item));
                    gen.scope.declare(name);
                }
                generate_body(gen, body)
            })?;
            gen.out.close();
        }
        (target, _) => {
            return Err(GenerationError::new(format!(
                "unsupported for-loop target '{}'",
                target
            )))
        }
    }
    generate_loop_else(gen, "for", orelse)
}

/// `for i in range(...)`: a counted loop whose bounds are evaluated once.
fn generate_range_loop(
    gen: &mut Generator,
    var: &str,
    bounds: &[Expr],
    body: &[Stmt],
) -> Result<(), GenerationError> {
    let lowered = bounds
        .iter()
        .map(|bound| gen.expr(bound))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match lowered.as_slice() {
        [stop] => ("0".to_string(), stop.clone(), None),
        [start, stop] => (start.clone(), stop.clone(), None),
        [start, stop, step] => (start.clone(), stop.clone(), Some(step.clone())),
        _ => return Err(GenerationError::new("range() expects one to three arguments")),
    };

    let id = gen.next_temp_id();
    let stop_var = format!("__pytra_range_stop_{}", id);
    gen.out
        .line(format!("const long long {} = {};", stop_var, stop));

    let init = if var != "_" && gen.scope.is_declared(var) {
        format!("{} = {}", var, start)
    } else {
        format!("long long {} = {}", var, start)
    };
    let header = match step {
        None => format!("for ({}; {v} < {}; ++{v})", init, stop_var, v = var),
        Some(step) => {
            let step_var = format!("__pytra_range_step_{}", id);
            gen.out
                .line(format!("const long long {} = {};", step_var, step));
            gen.out.line(format!(
                "if ({} == 0) throw std::runtime_error(\"range() arg 3 must not be zero\");",
                step_var
            ));
            format!(
                "for ({init}; ({s} > 0) ? ({v} < {e}) : ({v} > {e}); {v} += {s})",
                init = init,
                s = step_var,
                v = var,
                e = stop_var
            )
        }
    };

    gen.out.open(header);
    gen.with_child_scope(|gen| {
        gen.scope.declare(var);
        generate_body(gen, body)
    })?;
    gen.out.close();
    Ok(())
}

fn generate_try(
    gen: &mut Generator,
    body: &[Stmt],
    handlers: &[ExceptHandler],
    orelse: &[Stmt],
    finalbody: &[Stmt],
) -> Result<(), GenerationError> {
    generate_block(gen, "try", body)?;

    for handler in handlers {
        let header = match handler.type_name.as_deref() {
            None => "catch (...)".to_string(),
            Some(type_name) => format!(
                "catch (const {}& {})",
                catch_type(gen, type_name)?,
                handler.name.as_deref().unwrap_or("ex")
            ),
        };
        gen.out.open(header);
        gen.with_child_scope(|gen| {
            if let Some(name) = &handler.name {
                gen.scope.declare(name);
            }
            generate_body(gen, &handler.body)
        })?;
        gen.out.close();
    }

    if !orelse.is_empty() {
        warn!("try-else body emitted unconditionally after the handlers");
        gen.out
            .line("// try-else is not directly supported; else body emitted below");
        generate_block(gen, "", orelse)?;
    }
    if !finalbody.is_empty() {
        warn!("finally body does not run on the exception path");
        gen.out
            .line("// finally is not directly supported in C++; emitted as plain block");
        generate_block(gen, "", finalbody)?;
    }
    Ok(())
}

/// The C++ type caught by `except <type_name>`.
fn catch_type(gen: &Generator, type_name: &str) -> Result<String, GenerationError> {
    let type_name = type_name.trim();
    if type_name.starts_with('(') {
        return Err(GenerationError::new(format!(
            "catching a tuple of exception types is not supported: '{}'",
            type_name
        )));
    }
    Ok(match type_name {
        "Exception" | "BaseException" => runtime::ROOT_EXCEPTION.to_string(),
        name if gen.symbols.is_class(name) => name.to_string(),
        // raised errors are runtime errors
        _ => "std::runtime_error".to_string(),
    })
}

/// Drops one redundant pair of outer parentheses from a lowered condition.
fn condition(text: &str) -> &str {
    let Some(inner) = text
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return text;
    };
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in inner.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return text;
                }
            }
            _ => {}
        }
    }
    if depth == 0 {
        inner
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_strips_only_matching_parens() {
        assert_eq!(condition("(a < b)"), "a < b");
        assert_eq!(condition("(a) && (b)"), "(a) && (b)");
        assert_eq!(condition("py_in(x, xs)"), "py_in(x, xs)");
        assert_eq!(condition("(s == \")\")"), "s == \")\"");
    }
}
