//! Control unit: multi-width opcode resolution over the definition table.
//!
//! LEGv8 opcode identifiers vary in width by format, so decode probes the
//! candidate widths in a fixed priority order. The order matters: an 11-bit
//! R opcode also has some 8-bit prefix, and only the priority scan keeps
//! the formats from shadowing each other.

use std::sync::Arc;

use crate::bits::extract_bits;
use crate::condition::Condition;
use crate::defs::{DefinitionTable, Format, CONDITIONAL_BRANCH_OPCODE};
use crate::error::CoreError;
use crate::instruction::Instruction;

/// Resolves raw instruction words to decoded instructions.
#[derive(Debug, Clone)]
pub struct ControlUnit {
    table: Arc<DefinitionTable>,
}

impl ControlUnit {
    /// Creates a control unit over the given definition table.
    #[must_use]
    pub const fn new(table: Arc<DefinitionTable>) -> Self {
        Self { table }
    }

    /// The definition table this control unit resolves against.
    #[must_use]
    pub fn table(&self) -> &Arc<DefinitionTable> {
        &self.table
    }

    /// Decodes one instruction word.
    ///
    /// Candidate opcode widths are probed narrowest-field-first: 8-bit CB,
    /// 9-bit IM, 10-bit I, 11-bit D then R, and finally 6-bit B.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnrecognizedInstruction`] when no entry matches
    /// at any width, and [`CoreError::MissingConditionEntry`] when the
    /// conditional-branch class decodes but the table lacks the synthesized
    /// mnemonic.
    pub fn decode(&self, word: u32) -> Result<Instruction, CoreError> {
        let cb_opcode = extract_bits(word, 24, 31)?;
        if cb_opcode == CONDITIONAL_BRANCH_OPCODE {
            return self.decode_conditional(word);
        }
        if let Some(definition) = self.table.lookup(cb_opcode, Format::Cb) {
            return Instruction::from_word(word, Arc::clone(definition));
        }

        let im_opcode = extract_bits(word, 23, 31)?;
        if let Some(definition) = self.table.lookup(im_opcode, Format::Im) {
            return Instruction::from_word(word, Arc::clone(definition));
        }

        let i_opcode = extract_bits(word, 22, 31)?;
        if let Some(definition) = self.table.lookup(i_opcode, Format::I) {
            return Instruction::from_word(word, Arc::clone(definition));
        }

        let wide_opcode = extract_bits(word, 21, 31)?;
        if let Some(definition) = self.table.lookup(wide_opcode, Format::D) {
            return Instruction::from_word(word, Arc::clone(definition));
        }
        if let Some(definition) = self.table.lookup(wide_opcode, Format::R) {
            return Instruction::from_word(word, Arc::clone(definition));
        }

        let b_opcode = extract_bits(word, 26, 31)?;
        if let Some(definition) = self.table.lookup(b_opcode, Format::B) {
            return Instruction::from_word(word, Arc::clone(definition));
        }

        Err(CoreError::UnrecognizedInstruction { word })
    }

    /// Resolves the `B.cond` class: the condition lives in the register
    /// field and selects a synthesized mnemonic.
    fn decode_conditional(&self, word: u32) -> Result<Instruction, CoreError> {
        #[allow(clippy::cast_possible_truncation)]
        let cond_field = extract_bits(word, 0, 4)? as u8;
        let Some(cond) = Condition::from_bits(cond_field) else {
            return Err(CoreError::UnrecognizedInstruction { word });
        };
        let mnemonic = format!("B.{}", cond.suffix());
        let definition = self.table.lookup_mnemonic(&mnemonic).ok_or(
            CoreError::MissingConditionEntry {
                mnemonic: mnemonic.clone(),
            },
        )?;
        Instruction::from_word(word, Arc::clone(definition))
    }
}
