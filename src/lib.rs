//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and run strictly in order:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the program AST,
//!   checking function re-declarations through `signature`.
//! - `codegen` lowers the AST into 32-bit x86 AT&T assembly, checking
//!   variable scopes, loop control and call arity on the way.
//! - `printer` renders an AST back into C source.
//! - `error` holds the diagnostics shared by the other modules.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod printer;
pub mod signature;
pub mod tokenizer;
pub mod ty;

pub use codegen::{Assembly, Options, Warning};
pub use error::{CompileError, CompileResult, ErrorCategory};

/// Compile a source string into AT&T assembly with default options.
pub fn compile(source: &str) -> CompileResult<Assembly> {
  compile_with(source, &Options::default())
}

/// Compile a source string into AT&T assembly.
pub fn compile_with(source: &str, options: &Options) -> CompileResult<Assembly> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens, source)?;
  codegen::generate(&program, options)
}
