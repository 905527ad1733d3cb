//! AST Model
//!
//! Tagged node types for the annotated Python subset accepted by the transpiler.
//! Nodes carry no behaviour beyond `Display`, which renders an expression back to
//! source text (used by the raw-text fallback and by diagnostics).
//!
//! ## Ownership
//! A [`Module`] owns its statement tree exclusively: there are no back-references
//! and no sharing between nodes.

use std::fmt;

/// The set of supported binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv, // //
    Mod,      // %
    Pow,      // **
    BitAnd,   // &
    BitOr,    // |
    BitXor,   // ^
    LShift,   // <<
    RShift,   // >>
}

impl BinOp {
    /// Source spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::BitOr => 6,
            BinOp::BitXor => 7,
            BinOp::BitAnd => 8,
            BinOp::LShift | BinOp::RShift => 9,
            BinOp::Add | BinOp::Sub => 10,
            BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => 11,
            BinOp::Pow => 13,
        }
    }
}

/// The set of supported comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,    // ==
    NotEq, // !=
    Lt,    // <
    LtE,   // <=
    Gt,    // >
    GtE,   // >=
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

/// The set of supported unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,    // not (logical NOT)
    Invert, // ~ (bitwise NOT)
    UAdd,   // +x (unary plus)
    USub,   // -x (unary minus)
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A keyword argument at a call site (`name=value`).
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
}

/// One segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Literal(String),
    Value(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

/// A `for target in iter if cond...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct ComprehensionClause {
    pub target: Expr,
    pub iter: Expr,
    pub conditions: Vec<Expr>,
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A variable lookup.
    Name(String),
    Constant(Constant),
    List(Vec<Expr>),
    Set(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    /// A single-operator comparison.
    Compare {
        left: Box<Expr>,
        op: CmpOp,
        right: Box<Expr>,
    },
    /// `a < b < c`: kept for round-tripping, not lowered structurally.
    ChainedCompare {
        left: Box<Expr>,
        comparisons: Vec<(CmpOp, Expr)>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    /// The `lower:upper:step` part of a subscript.
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    JoinedStr(Vec<FStringPart>),
    Comprehension {
        kind: ComprehensionKind,
        element: Box<Expr>,
        /// The value expression of a dict comprehension.
        value: Option<Box<Expr>>,
        clauses: Vec<ComprehensionClause>,
    },
    /// Source text no structural rule matched.
    Raw(String),
}

impl Expr {
    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name(id.into())
    }

    /// Returns the identifier if this is a bare name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the string if this is a string literal.
    pub fn as_str_constant(&self) -> Option<&str> {
        match self {
            Expr::Constant(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// True for `self.<attr>`.
    pub fn is_self_attribute(&self) -> bool {
        matches!(self, Expr::Attribute { value, .. } if value.as_name() == Some("self"))
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::IfExp { .. } => 1,
            Expr::BoolOp { op: BoolOp::Or, .. } => 2,
            Expr::BoolOp { op: BoolOp::And, .. } => 3,
            Expr::UnaryOp { op: UnaryOp::Not, .. } => 4,
            Expr::Compare { .. } | Expr::ChainedCompare { .. } => 5,
            Expr::BinOp { op, .. } => op.precedence(),
            Expr::UnaryOp { .. } => 12,
            Expr::Tuple(_) => 0,
            Expr::Raw(_) => 0,
            _ => 14,
        }
    }
}

/// Writes `expr`, parenthesized when it binds looser than `min`.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if expr.precedence() < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_operand(f, item, 1)?;
    }
    Ok(())
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in text.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => f.write_str("None"),
            Constant::Bool(true) => f.write_str("True"),
            Constant::Bool(false) => f.write_str("False"),
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Float(x) => write!(f, "{:?}", x),
            Constant::Str(s) => write_string_literal(f, s),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Name(id) => f.write_str(id),
            Expr::Constant(c) => write!(f, "{}", c),
            Expr::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Expr::Set(items) => {
                f.write_str("{")?;
                write_joined(f, items)?;
                f.write_str("}")
            }
            Expr::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Expr::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Expr::BinOp { left, op, right } => {
                let prec = op.precedence();
                let (lmin, rmin) = if *op == BinOp::Pow {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                write_operand(f, left, lmin)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, right, rmin)
            }
            Expr::UnaryOp { op, operand } => {
                let (text, prec) = match op {
                    UnaryOp::Not => ("not ", 4),
                    UnaryOp::Invert => ("~", 12),
                    UnaryOp::UAdd => ("+", 12),
                    UnaryOp::USub => ("-", 12),
                };
                f.write_str(text)?;
                write_operand(f, operand, prec)
            }
            Expr::BoolOp { op, values } => {
                let (text, prec) = match op {
                    BoolOp::And => (" and ", 3),
                    BoolOp::Or => (" or ", 2),
                };
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(text)?;
                    }
                    write_operand(f, value, prec + 1)?;
                }
                Ok(())
            }
            Expr::Compare { left, op, right } => {
                write_operand(f, left, 6)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, right, 6)
            }
            Expr::ChainedCompare { left, comparisons } => {
                write_operand(f, left, 6)?;
                for (op, right) in comparisons {
                    write!(f, " {} ", op.as_str())?;
                    write_operand(f, right, 6)?;
                }
                Ok(())
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                write_operand(f, func, 14)?;
                f.write_str("(")?;
                write_joined(f, args)?;
                for (i, kw) in keywords.iter().enumerate() {
                    if i > 0 || !args.is_empty() {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", kw.arg, kw.value)?;
                }
                f.write_str(")")
            }
            Expr::Attribute { value, attr } => {
                write_operand(f, value, 14)?;
                write!(f, ".{}", attr)
            }
            Expr::Subscript { value, index } => {
                write_operand(f, value, 14)?;
                match index.as_ref() {
                    Expr::Tuple(items) if !items.is_empty() => {
                        f.write_str("[")?;
                        write_joined(f, items)?;
                        f.write_str("]")
                    }
                    other => write!(f, "[{}]", other),
                }
            }
            Expr::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    write!(f, "{}", lower)?;
                }
                f.write_str(":")?;
                if let Some(upper) = upper {
                    write!(f, "{}", upper)?;
                }
                if let Some(step) = step {
                    write!(f, ":{}", step)?;
                }
                Ok(())
            }
            Expr::IfExp { test, body, orelse } => {
                write_operand(f, body, 2)?;
                f.write_str(" if ")?;
                write_operand(f, test, 2)?;
                f.write_str(" else ")?;
                write_operand(f, orelse, 1)
            }
            Expr::JoinedStr(parts) => {
                f.write_str("f\"")?;
                for part in parts {
                    match part {
                        FStringPart::Literal(text) => {
                            let escaped = text
                                .replace('\\', "\\\\")
                                .replace('"', "\\\"")
                                .replace('\n', "\\n")
                                .replace('{', "{{")
                                .replace('}', "}}");
                            f.write_str(&escaped)?;
                        }
                        FStringPart::Value(expr) => write!(f, "{{{}}}", expr)?,
                    }
                }
                f.write_str("\"")
            }
            Expr::Comprehension {
                kind,
                element,
                value,
                clauses,
            } => {
                let (open, close) = match kind {
                    ComprehensionKind::List => ("[", "]"),
                    ComprehensionKind::Set | ComprehensionKind::Dict => ("{", "}"),
                    ComprehensionKind::Generator => ("(", ")"),
                };
                f.write_str(open)?;
                write!(f, "{}", element)?;
                if let Some(value) = value {
                    write!(f, ": {}", value)?;
                }
                for clause in clauses {
                    let target = match &clause.target {
                        Expr::Tuple(items) => items
                            .iter()
                            .map(|item| item.to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                        other => other.to_string(),
                    };
                    write!(f, " for {} in ", target)?;
                    write_operand(f, &clause.iter, 2)?;
                    for cond in &clause.conditions {
                        f.write_str(" if ")?;
                        write_operand(f, cond, 2)?;
                    }
                }
                f.write_str(close)
            }
            Expr::Raw(text) => f.write_str(text),
        }
    }
}

/// An imported name with optional alias (`name as asname`).
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    /// The name this import binds in the importing module.
    pub fn bound_name(&self) -> &str {
        match &self.asname {
            Some(asname) => asname,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

/// An `except` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    /// Declared exception type text, `None` for a bare `except:`.
    pub type_name: Option<String>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// Statement nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        module: String,
        names: Vec<Alias>,
    },
    ClassDef {
        name: String,
        bases: Vec<String>,
        decorators: Vec<String>,
        body: Vec<Stmt>,
    },
    FunctionDef {
        name: String,
        params: Vec<Parameter>,
        returns: Expr,
        decorators: Vec<String>,
        body: Vec<Stmt>,
    },
    /// `a = v`, or `a, b = v` with one target per unpacked name.
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    Return(Option<Expr>),
    Raise(Option<Expr>),
    /// `elif` chains nest as a single `If` inside `orelse`.
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    Pass,
    Break,
    Continue,
    Expr(Expr),
}

impl Stmt {
    /// True for a bare string literal statement.
    pub fn is_docstring(&self) -> bool {
        matches!(self, Stmt::Expr(Expr::Constant(Constant::Str(_))))
    }
}

/// A parsed source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}
