//! Pass 1: program layout and symbol table construction.
//!
//! Labels resolve to the address of the next instruction at or after
//! them, so a label on its own line binds to the following instruction.

use std::collections::HashMap;

use crate::errors::{AssemblyError, AssemblyErrorKind};
use crate::parser::SourceLine;

/// One defined label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Byte address of the labeled instruction.
    pub address: u64,
    /// Line the label was defined on.
    pub line: usize,
}

/// Label-to-address map built by pass 1.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    /// Walks the parsed lines once, assigning each instruction 4 bytes
    /// starting at `text_base` and binding labels as they appear.
    ///
    /// # Errors
    ///
    /// Returns every duplicate-label error found; the walk does not stop
    /// at the first.
    pub fn build(lines: &[SourceLine], text_base: u64) -> Result<Self, Vec<AssemblyError>> {
        let mut table = Self::default();
        let mut errors = Vec::new();
        let mut address = text_base;
        for line in lines {
            if let Some(name) = &line.label {
                match table.symbols.get(name) {
                    Some(existing) => errors.push(AssemblyError::new(
                        line.number,
                        AssemblyErrorKind::DuplicateLabel {
                            name: name.clone(),
                            first_line: existing.line,
                        },
                    )),
                    None => {
                        table.symbols.insert(
                            name.clone(),
                            Symbol {
                                address,
                                line: line.number,
                            },
                        );
                    }
                }
            }
            if line.is_instruction() {
                address += 4;
            }
        }
        if errors.is_empty() {
            Ok(table)
        } else {
            Err(errors)
        }
    }

    /// Looks up a label.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    /// Number of defined labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no labels are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
