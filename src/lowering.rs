use crate::ast::{
    BinOp, BoolOp, CmpOp, ComprehensionClause, ComprehensionKind, Constant, Expr, FStringPart,
    Keyword, UnaryOp,
};
use num_traits::ToPrimitive;
use rustpython_parser::ast;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LoweringError {
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(&'static str),
    #[error("Unsupported operator: {0:?}")]
    UnsupportedOperator(ast::Operator),
    #[error("Unsupported constant: {0}")]
    UnsupportedConstant(&'static str),
    #[error("Integer literal does not fit in 64 bits")]
    IntegerOverflow,
    #[error("Keyword argument unpacking is not supported")]
    KeywordUnpacking,
}

/// Lowers a `rustpython-parser` expression into the AST model.
pub fn lower_expression(expr: &ast::Expr) -> Result<Expr, LoweringError> {
    match expr {
        ast::Expr::Name(ast::ExprName { id, .. }) => Ok(Expr::Name(id.as_str().to_owned())),
        ast::Expr::Constant(ast::ExprConstant { value, .. }) => {
            lower_constant(value).map(Expr::Constant)
        }
        ast::Expr::List(ast::ExprList { elts, .. }) => Ok(Expr::List(lower_all(elts)?)),
        ast::Expr::Tuple(ast::ExprTuple { elts, .. }) => Ok(Expr::Tuple(lower_all(elts)?)),
        ast::Expr::Set(ast::ExprSet { elts, .. }) => Ok(Expr::Set(lower_all(elts)?)),
        ast::Expr::Dict(ast::ExprDict { keys, values, .. }) => {
            let mut entries = Vec::with_capacity(values.len());
            for (key, value) in keys.iter().zip(values) {
                // `**mapping` entries have no key
                let key = key
                    .as_ref()
                    .ok_or(LoweringError::UnsupportedExpression("dict unpacking"))?;
                entries.push((lower_expression(key)?, lower_expression(value)?));
            }
            Ok(Expr::Dict(entries))
        }
        ast::Expr::BinOp(ast::ExprBinOp {
            left, op, right, ..
        }) => {
            let op = match op {
                ast::Operator::Add => BinOp::Add,
                ast::Operator::Sub => BinOp::Sub,
                ast::Operator::Mult => BinOp::Mul,
                ast::Operator::Div => BinOp::Div,
                ast::Operator::FloorDiv => BinOp::FloorDiv,
                ast::Operator::Mod => BinOp::Mod,
                ast::Operator::Pow => BinOp::Pow,
                ast::Operator::BitAnd => BinOp::BitAnd,
                ast::Operator::BitOr => BinOp::BitOr,
                ast::Operator::BitXor => BinOp::BitXor,
                ast::Operator::LShift => BinOp::LShift,
                ast::Operator::RShift => BinOp::RShift,
                _ => return Err(LoweringError::UnsupportedOperator(op.clone())),
            };
            Ok(Expr::BinOp {
                left: Box::new(lower_expression(left)?),
                op,
                right: Box::new(lower_expression(right)?),
            })
        }
        ast::Expr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => {
            let op = match op {
                ast::UnaryOp::Not => UnaryOp::Not,
                ast::UnaryOp::Invert => UnaryOp::Invert,
                ast::UnaryOp::UAdd => UnaryOp::UAdd,
                ast::UnaryOp::USub => UnaryOp::USub,
            };
            let operand = lower_expression(operand)?;
            // `-<int>` folds into the literal.
            if let (UnaryOp::USub, Expr::Constant(Constant::Int(n))) = (op, &operand) {
                return Ok(Expr::Constant(Constant::Int(-n)));
            }
            Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            })
        }
        ast::Expr::BoolOp(ast::ExprBoolOp { op, values, .. }) => Ok(Expr::BoolOp {
            op: match op {
                ast::BoolOp::And => BoolOp::And,
                ast::BoolOp::Or => BoolOp::Or,
            },
            values: lower_all(values)?,
        }),
        ast::Expr::Compare(ast::ExprCompare {
            left,
            ops,
            comparators,
            ..
        }) => {
            let left = Box::new(lower_expression(left)?);
            if ops.len() == 1 && comparators.len() == 1 {
                return Ok(Expr::Compare {
                    left,
                    op: lower_cmpop(&ops[0]),
                    right: Box::new(lower_expression(&comparators[0])?),
                });
            }
            let mut comparisons = Vec::with_capacity(ops.len());
            for (op, right) in ops.iter().zip(comparators) {
                comparisons.push((lower_cmpop(op), lower_expression(right)?));
            }
            Ok(Expr::ChainedCompare { left, comparisons })
        }
        ast::Expr::Call(ast::ExprCall {
            func,
            args,
            keywords,
            ..
        }) => {
            let mut lowered_keywords = Vec::with_capacity(keywords.len());
            for keyword in keywords {
                let arg = keyword
                    .arg
                    .as_ref()
                    .ok_or(LoweringError::KeywordUnpacking)?;
                lowered_keywords.push(Keyword {
                    arg: arg.as_str().to_owned(),
                    value: lower_expression(&keyword.value)?,
                });
            }
            Ok(Expr::Call {
                func: Box::new(lower_expression(func)?),
                args: lower_all(args)?,
                keywords: lowered_keywords,
            })
        }
        ast::Expr::Attribute(ast::ExprAttribute { value, attr, .. }) => Ok(Expr::Attribute {
            value: Box::new(lower_expression(value)?),
            attr: attr.as_str().to_owned(),
        }),
        ast::Expr::Subscript(ast::ExprSubscript { value, slice, .. }) => Ok(Expr::Subscript {
            value: Box::new(lower_expression(value)?),
            index: Box::new(lower_expression(slice)?),
        }),
        ast::Expr::Slice(ast::ExprSlice {
            lower, upper, step, ..
        }) => Ok(Expr::Slice {
            lower: lower_optional(lower)?,
            upper: lower_optional(upper)?,
            step: lower_optional(step)?,
        }),
        ast::Expr::IfExp(ast::ExprIfExp {
            test, body, orelse, ..
        }) => Ok(Expr::IfExp {
            test: Box::new(lower_expression(test)?),
            body: Box::new(lower_expression(body)?),
            orelse: Box::new(lower_expression(orelse)?),
        }),
        ast::Expr::JoinedStr(ast::ExprJoinedStr { values, .. }) => {
            let mut parts = Vec::with_capacity(values.len());
            for value in values {
                parts.push(lower_fstring_part(value)?);
            }
            Ok(Expr::JoinedStr(parts))
        }
        ast::Expr::FormattedValue(ast::ExprFormattedValue { value, .. }) => {
            Ok(Expr::JoinedStr(vec![FStringPart::Value(lower_expression(value)?)]))
        }
        ast::Expr::ListComp(ast::ExprListComp {
            elt, generators, ..
        }) => lower_comprehension(ComprehensionKind::List, elt, None, generators),
        ast::Expr::SetComp(ast::ExprSetComp {
            elt, generators, ..
        }) => lower_comprehension(ComprehensionKind::Set, elt, None, generators),
        ast::Expr::GeneratorExp(ast::ExprGeneratorExp {
            elt, generators, ..
        }) => lower_comprehension(ComprehensionKind::Generator, elt, None, generators),
        ast::Expr::DictComp(ast::ExprDictComp {
            key,
            value,
            generators,
            ..
        }) => lower_comprehension(ComprehensionKind::Dict, key, Some(value), generators),
        ast::Expr::Lambda(_) => Err(LoweringError::UnsupportedExpression("lambda")),
        ast::Expr::Starred(_) => Err(LoweringError::UnsupportedExpression("starred")),
        ast::Expr::NamedExpr(_) => Err(LoweringError::UnsupportedExpression("named expression")),
        _ => Err(LoweringError::UnsupportedExpression("expression form")),
    }
}

fn lower_all(exprs: &[ast::Expr]) -> Result<Vec<Expr>, LoweringError> {
    exprs.iter().map(lower_expression).collect()
}

fn lower_optional(expr: &Option<Box<ast::Expr>>) -> Result<Option<Box<Expr>>, LoweringError> {
    match expr {
        Some(expr) => Ok(Some(Box::new(lower_expression(expr)?))),
        None => Ok(None),
    }
}

fn lower_constant(value: &ast::Constant) -> Result<Constant, LoweringError> {
    match value {
        ast::Constant::None => Ok(Constant::None),
        ast::Constant::Bool(b) => Ok(Constant::Bool(*b)),
        ast::Constant::Int(n) => n
            .to_i64()
            .map(Constant::Int)
            .ok_or(LoweringError::IntegerOverflow),
        ast::Constant::Float(x) => Ok(Constant::Float(*x)),
        ast::Constant::Str(s) => Ok(Constant::Str(s.clone())),
        ast::Constant::Bytes(_) => Err(LoweringError::UnsupportedConstant("bytes")),
        ast::Constant::Ellipsis => Err(LoweringError::UnsupportedConstant("ellipsis")),
        _ => Err(LoweringError::UnsupportedConstant("literal")),
    }
}

fn lower_cmpop(op: &ast::CmpOp) -> CmpOp {
    match op {
        ast::CmpOp::Eq => CmpOp::Eq,
        ast::CmpOp::NotEq => CmpOp::NotEq,
        ast::CmpOp::Lt => CmpOp::Lt,
        ast::CmpOp::LtE => CmpOp::LtE,
        ast::CmpOp::Gt => CmpOp::Gt,
        ast::CmpOp::GtE => CmpOp::GtE,
        ast::CmpOp::Is => CmpOp::Is,
        ast::CmpOp::IsNot => CmpOp::IsNot,
        ast::CmpOp::In => CmpOp::In,
        ast::CmpOp::NotIn => CmpOp::NotIn,
    }
}

fn lower_fstring_part(value: &ast::Expr) -> Result<FStringPart, LoweringError> {
    match value {
        ast::Expr::Constant(ast::ExprConstant {
            value: ast::Constant::Str(s),
            ..
        }) => Ok(FStringPart::Literal(s.clone())),
        ast::Expr::FormattedValue(ast::ExprFormattedValue { value, .. }) => {
            Ok(FStringPart::Value(lower_expression(value)?))
        }
        _ => Err(LoweringError::UnsupportedExpression("f-string segment")),
    }
}

fn lower_comprehension(
    kind: ComprehensionKind,
    element: &ast::Expr,
    value: Option<&ast::Expr>,
    generators: &[ast::Comprehension],
) -> Result<Expr, LoweringError> {
    let mut clauses = Vec::with_capacity(generators.len());
    for generator in generators {
        clauses.push(ComprehensionClause {
            target: lower_expression(&generator.target)?,
            iter: lower_expression(&generator.iter)?,
            conditions: lower_all(&generator.ifs)?,
        });
    }
    Ok(Expr::Comprehension {
        kind,
        element: Box::new(lower_expression(element)?),
        value: match value {
            Some(value) => Some(Box::new(lower_expression(value)?)),
            None => None,
        },
        clauses,
    })
}
