//! py2cpp
//!
//! Transpiles an explicitly annotated Python subset to C++ built on a
//! reference-counted object model.
//!
//! ## Pipeline
//! source text -> [`parser::parse_module`] -> [`ast::Module`] ->
//! [`codegen::generate`] -> one C++ translation unit

pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod error;
pub mod lowering;
pub mod parser;
pub mod refcount;

pub use codegen::{generate, GenerationError};
pub use error::TranspileError;
pub use parser::{parse_module, ParseError};

/// Parses and generates a whole file. Fails on the first error; no partial
/// output is produced.
pub fn transpile(source: &str, filename: &str) -> Result<String, TranspileError> {
    let module = parse_module(source, filename)?;
    Ok(generate(&module)?)
}
