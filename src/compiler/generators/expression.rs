//! Expression Lowering Module
//!
//! Turns AST expressions into C++ expression text. Every function takes the
//! [`Generator`] for read access to the module symbols and the class currently
//! being emitted; expression lowering never writes output lines itself.
//!
//! ## Attribute resolution
//! `x.attr` resolves lexically, first match wins:
//! 1. `x` is an imported module alias: namespace access.
//! 2. `x` is `self` and `attr` is a static field of the enclosing class:
//!    class-qualified access.
//! 3. `x` is `self`: member access through `this`.
//! 4. `x` is a class of the module: class-qualified access.
//! 5. Anything else: indirection through the handle (`->`).

use crate::ast::{BinOp, BoolOp, CmpOp, Constant, Expr, FStringPart, Keyword, UnaryOp};
use crate::codegen::{GenerationError, Generator};
use crate::compiler::runtime;
use crate::compiler::types::{self, map_annotation};
use tracing::warn;

/// Lowers `expr` to C++ source text.
pub fn generate_expression(gen: &Generator, expr: &Expr) -> Result<String, GenerationError> {
    match expr {
        Expr::Name(id) => Ok(generate_name(gen, id)),
        Expr::Constant(constant) => generate_constant(constant),
        Expr::List(items) | Expr::Set(items) => {
            Ok(format!("{{{}}}", generate_list(gen, items)?.join(", ")))
        }
        Expr::Tuple(items) => Ok(format!(
            "std::make_tuple({})",
            generate_list(gen, items)?.join(", ")
        )),
        Expr::Dict(entries) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                pairs.push(format!(
                    "{{{}, {}}}",
                    generate_expression(gen, key)?,
                    generate_expression(gen, value)?
                ));
            }
            Ok(format!("{{{}}}", pairs.join(", ")))
        }
        Expr::BinOp { left, op, right } => {
            let left = generate_expression(gen, left)?;
            let right = generate_expression(gen, right)?;
            Ok(generate_binop(&left, *op, &right))
        }
        Expr::UnaryOp { op, operand } => {
            let operand = generate_expression(gen, operand)?;
            let op = match op {
                UnaryOp::Not => "!",
                UnaryOp::Invert => "~",
                UnaryOp::UAdd => "+",
                UnaryOp::USub => "-",
            };
            Ok(format!("({}{})", op, operand))
        }
        Expr::BoolOp { op, values } => {
            let op = match op {
                BoolOp::And => " && ",
                BoolOp::Or => " || ",
            };
            Ok(format!("({})", generate_list(gen, values)?.join(op)))
        }
        Expr::Compare { left, op, right } => {
            let left = generate_expression(gen, left)?;
            let right = generate_expression(gen, right)?;
            Ok(generate_compare(&left, *op, &right))
        }
        Expr::ChainedCompare { .. } => {
            warn!(expr = %expr, "chained comparison lowered to a false placeholder");
            Ok("/* chained-comparison */ false".to_string())
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => generate_call(gen, func, args, keywords),
        Expr::Attribute { value, attr } => generate_attribute(gen, value, attr),
        Expr::Subscript { value, index } => generate_subscript(gen, value, index),
        Expr::Slice { .. } => Err(GenerationError::new(format!(
            "slice '{}' is only supported inside a subscript",
            expr
        ))),
        Expr::IfExp { test, body, orelse } => Ok(format!(
            "({} ? {} : {})",
            generate_expression(gen, test)?,
            generate_expression(gen, body)?,
            generate_expression(gen, orelse)?
        )),
        Expr::JoinedStr(parts) => generate_joined_str(gen, parts),
        Expr::Comprehension { .. } => {
            warn!(expr = %expr, "comprehension lowered to an empty collection");
            Ok("/* comprehension */ {}".to_string())
        }
        Expr::Raw(text) => {
            warn!(text = %text, "emitting expression text with literal substitution only");
            Ok(swap_literal_keywords(text))
        }
    }
}

fn generate_list(gen: &Generator, items: &[Expr]) -> Result<Vec<String>, GenerationError> {
    items
        .iter()
        .map(|item| generate_expression(gen, item))
        .collect()
}

fn generate_name(gen: &Generator, id: &str) -> String {
    match id {
        "self" => "this".to_string(),
        _ => gen.symbols.function_name(id).to_string(),
    }
}

// ============================================================================
// Literals
// ============================================================================

fn generate_constant(constant: &Constant) -> Result<String, GenerationError> {
    Ok(match constant {
        Constant::None => "nullptr".to_string(),
        Constant::Bool(true) => "true".to_string(),
        Constant::Bool(false) => "false".to_string(),
        Constant::Int(value) => {
            if i32::try_from(*value).is_ok() {
                value.to_string()
            } else {
                format!("{}LL", value)
            }
        }
        Constant::Float(value) => {
            if !value.is_finite() {
                return Err(GenerationError::new(format!(
                    "float literal {} has no C++ spelling",
                    value
                )));
            }
            format!("{:?}", value)
        }
        Constant::Str(text) => string_literal(text),
    })
}

/// Quotes `text` as a C++ string literal.
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // octal escapes cannot swallow following digits past three
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\{:03o}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Interpolated strings: literal segments concatenated with stringified values.
fn generate_joined_str(gen: &Generator, parts: &[FStringPart]) -> Result<String, GenerationError> {
    let mut pieces = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        match part {
            FStringPart::Literal(text) if i == 0 => {
                pieces.push(format!("string({})", string_literal(text)))
            }
            FStringPart::Literal(text) => pieces.push(string_literal(text)),
            FStringPart::Value(value) => pieces.push(format!(
                "py_to_string({})",
                generate_expression(gen, value)?
            )),
        }
    }
    match pieces.len() {
        0 => Ok("string(\"\")".to_string()),
        1 => Ok(pieces.remove(0)),
        _ => Ok(format!("({})", pieces.join(" + "))),
    }
}

/// Swaps the literal keywords `True`, `False`, `None` outside string literals.
pub fn swap_literal_keywords(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if let Some(q) = quote {
            out.push(ch);
            if ch == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if ch == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
            out.push(ch);
            i += 1;
            continue;
        }
        if ch.is_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            out.push_str(match word.as_str() {
                "True" => "true",
                "False" => "false",
                "None" => "nullptr",
                _ => word.as_str(),
            });
            continue;
        }
        out.push(ch);
        i += 1;
    }
    out
}

// ============================================================================
// Operators
// ============================================================================

fn generate_binop(left: &str, op: BinOp, right: &str) -> String {
    match binop_helper(op) {
        Some(helper) => format!("{}({}, {})", helper, left, right),
        None => format!("({} {} {})", left, op.as_str(), right),
    }
}

/// Helper spelling of the operators that have one (`/`, `//`, `**`).
pub fn binop_helper(op: BinOp) -> Option<&'static str> {
    match op {
        BinOp::Div => Some("py_div"),
        BinOp::FloorDiv => Some("py_floordiv"),
        BinOp::Pow => Some("py_pow"),
        _ => None,
    }
}

fn generate_compare(left: &str, op: CmpOp, right: &str) -> String {
    match op {
        CmpOp::In => format!("py_in({}, {})", left, right),
        CmpOp::NotIn => format!("(!py_in({}, {}))", left, right),
        CmpOp::Is => format!("({} == {})", left, right),
        CmpOp::IsNot => format!("({} != {})", left, right),
        op => format!("({} {} {})", left, op.as_str(), right),
    }
}

// ============================================================================
// Attributes and Subscripts
// ============================================================================

fn generate_attribute(gen: &Generator, value: &Expr, attr: &str) -> Result<String, GenerationError> {
    if let Some(name) = value.as_name() {
        if let Some(module) = gen.symbols.module_for(name) {
            return Ok(runtime::module_member(module, attr));
        }
        if name == "self" {
            if let Some(class) = &gen.current_class {
                if class.is_static_field(attr) {
                    return Ok(format!("{}::{}", class.name, attr));
                }
            }
            return Ok(format!("this->{}", attr));
        }
        if gen.symbols.is_class(name) {
            return Ok(format!("{}::{}", name, attr));
        }
    }
    Ok(format!("{}->{}", generate_expression(gen, value)?, attr))
}

fn generate_subscript(gen: &Generator, value: &Expr, index: &Expr) -> Result<String, GenerationError> {
    let container = generate_expression(gen, value)?;
    let Expr::Slice { lower, upper, step } = index else {
        return Ok(format!("{}[{}]", container, generate_expression(gen, index)?));
    };
    if step.is_some() {
        return Err(GenerationError::new(format!(
            "slice step is not supported in '{}'",
            index
        )));
    }
    let bound = |bound: &Option<Box<Expr>>| -> Result<String, GenerationError> {
        match bound {
            Some(expr) => Ok(format!("true, {}", generate_expression(gen, expr)?)),
            None => Ok("false, 0".to_string()),
        }
    };
    Ok(format!(
        "py_slice({}, {}, {})",
        container,
        bound(lower)?,
        bound(upper)?
    ))
}

// ============================================================================
// Calls
// ============================================================================

fn generate_call(
    gen: &Generator,
    func: &Expr,
    args: &[Expr],
    keywords: &[Keyword],
) -> Result<String, GenerationError> {
    match func {
        Expr::Name(name) => {
            if let Some(call) = generate_builtin_call(gen, name, args, keywords)? {
                return Ok(call);
            }
            let args = generate_arguments(gen, args, keywords)?.join(", ");
            if gen.symbols.is_rc_class(name) {
                return Ok(runtime::allocate(name, &args));
            }
            Ok(format!("{}({})", gen.symbols.function_name(name), args))
        }
        Expr::Attribute { value, attr } => generate_method_call(gen, value, attr, args, keywords),
        _ => Err(GenerationError::new(format!(
            "only direct function calls are supported, found '{}'",
            func
        ))),
    }
}

/// Positional arguments followed by keyword argument values, in call order.
fn generate_arguments(
    gen: &Generator,
    args: &[Expr],
    keywords: &[Keyword],
) -> Result<Vec<String>, GenerationError> {
    let mut out = generate_list(gen, args)?;
    for keyword in keywords {
        out.push(generate_expression(gen, &keyword.value)?);
    }
    Ok(out)
}

const BUILTINS: &[&str] = &[
    "print",
    "len",
    "sorted",
    "zip",
    "set",
    "str",
    "int",
    "float",
    "pow",
    "range",
    "isinstance",
];

fn generate_builtin_call(
    gen: &Generator,
    name: &str,
    args: &[Expr],
    keywords: &[Keyword],
) -> Result<Option<String>, GenerationError> {
    if !BUILTINS.contains(&name) || gen.symbols.is_class(name) {
        return Ok(None);
    }
    if name == "isinstance" {
        return match args {
            [object, class] if keywords.is_empty() => generate_isinstance(gen, object, class).map(Some),
            _ => Err(arity_error(name, "two arguments")),
        };
    }

    let lowered = generate_arguments(gen, args, keywords)?;
    let call = match (name, lowered.as_slice()) {
        ("print", all) => format!("py_print({})", all.join(", ")),
        ("len", [value]) => format!("py_len({})", value),
        ("sorted", [value]) => format!("py_sorted({})", value),
        ("zip", [a, b]) => format!("py_zip({}, {})", a, b),
        ("set", []) => "unordered_set<string>{}".to_string(),
        ("set", [items]) => format!(
            "unordered_set<std::remove_cvref_t<decltype(*{items}.begin())>>({items}.begin(), {items}.end())",
            items = items
        ),
        ("str", [value]) => format!("py_to_string({})", value),
        ("int", [value]) => format!("static_cast<long long>({})", value),
        ("float", [value]) => format!("static_cast<double>({})", value),
        ("pow", [base, exp]) => format!("py_pow({}, {})", base, exp),
        ("range", bounds) if (1..=3).contains(&bounds.len()) => {
            format!("py_range({})", bounds.join(", "))
        }
        ("zip" | "pow", _) => return Err(arity_error(name, "two arguments")),
        ("set", _) => return Err(arity_error(name, "at most one argument")),
        ("range", _) => return Err(arity_error(name, "one to three arguments")),
        _ => return Err(arity_error(name, "one argument")),
    };
    Ok(Some(call))
}

fn arity_error(name: &str, expected: &str) -> GenerationError {
    GenerationError::new(format!("{}() expects {}", name, expected))
}

fn generate_isinstance(gen: &Generator, object: &Expr, class: &Expr) -> Result<String, GenerationError> {
    let object = generate_expression(gen, object)?;
    match class {
        Expr::Tuple(classes) => {
            let types = classes
                .iter()
                .map(|class| isinstance_type(gen, class))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!(
                "py_isinstance_any<decltype({}), {}>({})",
                object,
                types.join(", "),
                object
            ))
        }
        class => Ok(format!(
            "py_isinstance<{}>({})",
            isinstance_type(gen, class)?,
            object
        )),
    }
}

/// The C++ type tested for by `isinstance(_, class)`.
pub fn isinstance_type(gen: &Generator, class: &Expr) -> Result<String, GenerationError> {
    match class {
        Expr::Name(name) if gen.symbols.is_class(name) => Ok(name.clone()),
        Expr::Name(_) => match map_annotation(class, &gen.symbols)? {
            ty if ty == types::AUTO || ty == "void" => Err(GenerationError::new(format!(
                "unsupported isinstance type '{}'",
                class
            ))),
            ty => Ok(ty),
        },
        Expr::Attribute { value, attr } if types::is_ast_module(value, &gen.symbols) => {
            Ok(runtime::ast_node_class(attr))
        }
        Expr::Attribute { .. } => generate_expression(gen, class),
        _ => Err(GenerationError::new(format!(
            "unsupported isinstance type '{}'",
            class
        ))),
    }
}

/// True for the `super()` call.
pub fn is_super_call(expr: &Expr) -> bool {
    matches!(expr, Expr::Call { func, args, .. } if func.as_name() == Some("super") && args.is_empty())
}

fn generate_method_call(
    gen: &Generator,
    receiver: &Expr,
    method: &str,
    args: &[Expr],
    keywords: &[Keyword],
) -> Result<String, GenerationError> {
    let lowered = generate_arguments(gen, args, keywords)?;

    if is_super_call(receiver) {
        let base = gen
            .current_class
            .as_ref()
            .and_then(|class| class.base.clone())
            .ok_or_else(|| GenerationError::new("super() requires a class with a base"))?;
        if method == "__init__" {
            return Err(GenerationError::new(
                "super().__init__() with arguments is not supported",
            ));
        }
        return Ok(format!("{}::{}({})", base, method, lowered.join(", ")));
    }

    if let Some(name) = receiver.as_name() {
        if let Some(module) = gen.symbols.module_for(name) {
            return Ok(format!(
                "{}({})",
                runtime::module_member(module, method),
                lowered.join(", ")
            ));
        }
        if name != "self" && gen.symbols.is_class(name) {
            return Ok(format!("{}::{}({})", name, method, lowered.join(", ")));
        }
    }

    // user methods on instances win over the container helpers
    let is_instance = receiver
        .as_name()
        .map_or(false, |name| name == "self" || gen.scope.instance_class(name).is_some());
    if !is_instance {
        let object = generate_expression(gen, receiver)?;
        if let Some(call) = runtime::method_helper(method, &object, &lowered) {
            return Ok(call);
        }
    }
    Ok(format!(
        "{}({})",
        generate_attribute(gen, receiver, method)?,
        lowered.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::symbols::ModuleSymbols;
    use crate::parser::parse_expression;

    fn lower(text: &str) -> String {
        let generator = Generator::new(ModuleSymbols::default());
        generate_expression(&generator, &parse_expression(text)).unwrap()
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(string_literal("\u{1}7"), "\"\\0017\"");
    }

    #[test]
    fn test_swap_literal_keywords_skips_strings() {
        assert_eq!(
            swap_literal_keywords("f(True, 'None', NoneType, None)"),
            "f(true, 'None', NoneType, nullptr)"
        );
    }

    #[test]
    fn test_wide_integer_suffix() {
        assert_eq!(lower("2147483647"), "2147483647");
        assert_eq!(lower("2147483648"), "2147483648LL");
        assert_eq!(lower("-5000000000"), "-5000000000LL");
    }

    #[test]
    fn test_division_helpers() {
        assert_eq!(lower("a / b"), "py_div(a, b)");
        assert_eq!(lower("a // b + 1"), "(py_floordiv(a, b) + 1)");
        assert_eq!(lower("a ** 2"), "py_pow(a, 2)");
        assert_eq!(binop_helper(BinOp::Mod), None);
    }
}
