//! Two-pass LEGv8 subset assembler library.

/// Structured error reporting.
pub mod errors;
pub use errors::{AssemblyError, AssemblyErrorKind, AssemblyFailure};

/// Source line parser.
pub mod parser;
pub use parser::{parse_line, Operand, SourceLine};

/// Pass 1 symbol table.
pub mod symbols;
pub use symbols::{Symbol, SymbolTable};

/// Pass 2 instruction encoder.
pub mod encoder;
pub use encoder::encode_line;

/// Two-pass assembler driver.
pub mod assembler;
pub use assembler::{AssembledProgram, Assembler};

#[cfg(test)]
use tempfile as _;
