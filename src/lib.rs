//! Bytecode compiler and stack VM for the Rinha functional language.
//!
//! Programs arrive as JSON-serialized ASTs ([`loader`]), are compiled to
//! chunked bytecode ([`compiler`]), and run on a three-stack virtual machine
//! ([`vm`]). Loading, compilation, printing, and execution are all
//! iterative: host stack usage stays flat regardless of how deep the guest
//! program or its recursion goes.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate derive_is_enum_variant;

pub mod ast;
pub mod compiler;
pub mod data;
pub mod env;
pub mod errors;
pub mod interpreter;
pub mod loader;
pub mod ops;
pub mod printer;
pub mod vm;

/// Parse a serialized AST and compile it to bytecode.
pub fn str_to_code(s: &str) -> errors::Result<vm::bytecode::Bytecode> {
    let file = loader::parse_ast(s)?;
    compiler::compile(&file)
}
