//! Two-pass assembler driver.
//!
//! Pass 1 parses every line and lays out the symbol table; pass 2 encodes
//! each instruction against the resolved symbols. Errors from a pass are
//! collected and reported together, and a later pass only runs when the
//! earlier one was clean.

use std::sync::Arc;

use legv8_core::{DefinitionTable, DefinitionTableError, EngineConfig};

use crate::encoder::encode_line;
use crate::errors::{AssemblyError, AssemblyFailure};
use crate::parser::{parse_line, SourceLine};
use crate::symbols::SymbolTable;

/// A successfully assembled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledProgram {
    /// Encoded instruction words, in program order.
    pub words: Vec<u32>,
    /// Source line number of each word, parallel to `words`.
    pub lines: Vec<usize>,
    /// Base byte address of the first word.
    pub text_base: u64,
}

/// Two-pass assembler over a definition table.
#[derive(Debug, Clone)]
pub struct Assembler {
    table: Arc<DefinitionTable>,
    text_base: u64,
}

impl Assembler {
    /// Creates an assembler over the builtin definition table, with the
    /// default text base.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionTableError`] if the builtin table fails to
    /// build.
    pub fn new() -> Result<Self, DefinitionTableError> {
        Ok(Self::with_table(Arc::new(DefinitionTable::builtin()?)))
    }

    /// Creates an assembler over an explicit table.
    #[must_use]
    pub fn with_table(table: Arc<DefinitionTable>) -> Self {
        Self {
            table,
            text_base: EngineConfig::default().text_base,
        }
    }

    /// Overrides the base address instructions are laid out from.
    #[must_use]
    pub const fn text_base(mut self, text_base: u64) -> Self {
        self.text_base = text_base;
        self
    }

    /// The definition table this assembler encodes against.
    #[must_use]
    pub fn table(&self) -> &Arc<DefinitionTable> {
        &self.table
    }

    /// Assembles full source text.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyFailure`] carrying every error the failing
    /// pass found.
    pub fn assemble(&self, source: &str) -> Result<AssembledProgram, AssemblyFailure> {
        let lines = self.parse_all(source)?;

        let symbols = SymbolTable::build(&lines, self.text_base)
            .map_err(|errors| errors.into_iter().collect::<AssemblyFailure>())?;

        let mut words = Vec::new();
        let mut line_numbers = Vec::new();
        let mut errors = Vec::new();
        let mut address = self.text_base;
        for line in lines.iter().filter(|l| l.is_instruction()) {
            match encode_line(line, address, &symbols, &self.table) {
                Ok(word) => {
                    words.push(word);
                    line_numbers.push(line.number);
                }
                Err(error) => errors.push(error),
            }
            address += 4;
        }
        if !errors.is_empty() {
            return Err(errors.into_iter().collect());
        }

        Ok(AssembledProgram {
            words,
            lines: line_numbers,
            text_base: self.text_base,
        })
    }

    fn parse_all(&self, source: &str) -> Result<Vec<SourceLine>, AssemblyFailure> {
        let mut lines = Vec::new();
        let mut errors: Vec<AssemblyError> = Vec::new();
        for (i, text) in source.lines().enumerate() {
            match parse_line(i + 1, text) {
                Ok(line) => lines.push(line),
                Err(error) => errors.push(error),
            }
        }
        if errors.is_empty() {
            Ok(lines)
        } else {
            Err(errors.into_iter().collect())
        }
    }
}
