//! Compiler Module
//!
//! Analysis and lowering passes used by the code generator.
//!
//! ## Architecture
//! - `symbols`: module-level facts (classes, exception classes, import aliases)
//! - `class_analysis`: static / dataclass / instance field classification
//! - `types`: annotation mapping and literal type inference
//! - `mutation`: parameter mutation scan for `const T&` passing
//! - `runtime`: spellings of the C++ runtime contract
//! - `generators`: statement and expression lowering

pub mod class_analysis;
pub mod generators;
pub mod mutation;
pub mod runtime;
pub mod symbols;
pub mod types;
