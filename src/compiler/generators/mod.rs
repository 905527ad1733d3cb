//! Code Generators Module
//!
//! Lowering functions for the two node families of the AST:
//! - `expression`: expressions to C++ expression text
//! - `statement`: statements to C++ lines written through the generator

pub mod expression;
pub mod statement;
