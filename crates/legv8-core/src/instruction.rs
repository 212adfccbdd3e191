//! Decoded instruction model: extracted fields bound to a definition.
//!
//! Field extraction happens exactly once, at construction. Signed fields
//! (`imm12`, `addr9`, branch offsets) are sign-extended here, so every
//! consumer downstream works with ready-to-use values.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::bits::{extract_bits, sign_extend};
use crate::defs::{Format, InstructionDefinition};
use crate::error::CoreError;

/// Per-format extracted operand fields, sign-extended where the field is
/// an offset or immediate displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InstructionFields {
    /// R-format operands.
    R {
        /// Second source register.
        rm: u8,
        /// Shift amount, used by the shift mnemonics.
        shamt: u8,
        /// First source register.
        rn: u8,
        /// Destination register.
        rd: u8,
    },
    /// I-format operands.
    I {
        /// Signed 12-bit immediate.
        imm12: i16,
        /// Source register.
        rn: u8,
        /// Destination register.
        rd: u8,
    },
    /// D-format operands.
    D {
        /// Signed 9-bit byte offset.
        offset9: i16,
        /// Base address register.
        rn: u8,
        /// Transfer register.
        rt: u8,
    },
    /// B-format operands.
    B {
        /// Signed 26-bit instruction-count offset.
        offset26: i32,
    },
    /// CB-format operands.
    Cb {
        /// Signed 19-bit instruction-count offset.
        offset19: i32,
        /// Tested register, or the raw condition field for `B.cond`.
        rt: u8,
    },
    /// IM-format operands.
    Im {
        /// Halfword lane selector (0..=3).
        hw: u8,
        /// Raw 16-bit immediate, unshifted.
        imm16: u16,
        /// Destination register.
        rd: u8,
    },
}

/// A fully decoded instruction: the raw word, its matched definition, and
/// the extracted fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The raw 32-bit instruction word.
    pub word: u32,
    /// The matched definition, shared with the table.
    pub definition: Arc<InstructionDefinition>,
    /// Extracted operand fields for the definition's format.
    pub fields: InstructionFields,
}

impl Instruction {
    /// Extracts the operand fields of `word` according to `definition` and
    /// binds them together.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] if field extraction fails; the builtin field
    /// layouts never do.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn from_word(
        word: u32,
        definition: Arc<InstructionDefinition>,
    ) -> Result<Self, CoreError> {
        let fields = match definition.format {
            Format::R => InstructionFields::R {
                rm: extract_bits(word, 16, 20)? as u8,
                shamt: extract_bits(word, 10, 15)? as u8,
                rn: extract_bits(word, 5, 9)? as u8,
                rd: extract_bits(word, 0, 4)? as u8,
            },
            Format::I => InstructionFields::I {
                imm12: sign_extend(u64::from(extract_bits(word, 10, 21)?), 12)? as i16,
                rn: extract_bits(word, 5, 9)? as u8,
                rd: extract_bits(word, 0, 4)? as u8,
            },
            Format::D => InstructionFields::D {
                offset9: sign_extend(u64::from(extract_bits(word, 12, 20)?), 9)? as i16,
                rn: extract_bits(word, 5, 9)? as u8,
                rt: extract_bits(word, 0, 4)? as u8,
            },
            Format::B => InstructionFields::B {
                offset26: sign_extend(u64::from(extract_bits(word, 0, 25)?), 26)? as i32,
            },
            Format::Cb => InstructionFields::Cb {
                offset19: sign_extend(u64::from(extract_bits(word, 5, 23)?), 19)? as i32,
                rt: extract_bits(word, 0, 4)? as u8,
            },
            Format::Im => InstructionFields::Im {
                hw: extract_bits(word, 21, 22)? as u8,
                imm16: extract_bits(word, 5, 20)? as u16,
                rd: extract_bits(word, 0, 4)? as u8,
            },
        };
        Ok(Self {
            word,
            definition,
            fields,
        })
    }

    /// Renders the canonical assembly text for this instruction, with the
    /// mnemonic padded to a fixed column.
    #[must_use]
    pub fn disassemble(&self) -> String {
        let mut out = format!("{:<6} ", self.definition.mnemonic);
        match self.fields {
            InstructionFields::R {
                rm,
                shamt,
                rn,
                rd,
            } => {
                if self.definition.signals.is_branching() {
                    // BR takes only the target register.
                    let _ = write!(out, "{}", register_name(rn));
                } else if self.definition.signals.alu_src.is_high() {
                    let _ = write!(
                        out,
                        "{}, {}, #{shamt}",
                        register_name(rd),
                        register_name(rn)
                    );
                } else {
                    let _ = write!(
                        out,
                        "{}, {}, {}",
                        register_name(rd),
                        register_name(rn),
                        register_name(rm)
                    );
                }
            }
            InstructionFields::I { imm12, rn, rd } => {
                let _ = write!(
                    out,
                    "{}, {}, #{imm12}",
                    register_name(rd),
                    register_name(rn)
                );
            }
            InstructionFields::D { offset9, rn, rt } => {
                let _ = write!(
                    out,
                    "{}, [{}, #{offset9}]",
                    register_name(rt),
                    register_name(rn)
                );
            }
            InstructionFields::B { offset26 } => {
                let _ = write!(out, "#{offset26}");
            }
            InstructionFields::Cb { offset19, rt } => {
                if self.definition.mnemonic.starts_with("B.") {
                    let _ = write!(out, "#{offset19}");
                } else {
                    let _ = write!(out, "{}, #{offset19}", register_name(rt));
                }
            }
            InstructionFields::Im { hw, imm16, rd } => {
                let _ = write!(out, "{}, #{imm16}", register_name(rd));
                if hw != 0 {
                    let _ = write!(out, ", LSL #{}", u32::from(hw) * 16);
                }
            }
        }
        out.trim_end().to_owned()
    }
}

/// Renders the conventional name of a register index: `X0`..`X27`, then
/// `SP`, `FP`, `LR`, and `XZR`.
#[must_use]
pub fn register_name(index: u8) -> String {
    match index {
        28 => "SP".to_owned(),
        29 => "FP".to_owned(),
        30 => "LR".to_owned(),
        31 => "XZR".to_owned(),
        _ => format!("X{index}"),
    }
}
