//! Instruction definition table: the single source of truth mapping
//! (opcode bit-pattern, format) and mnemonics to control-signal templates.
//!
//! The external table loader is out of scope; [`DefinitionTable::builtin`]
//! materializes the same data contract in code. Any (opcode, format) pair
//! not present here is illegal by definition.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::alu::AluOp;
use crate::condition::Condition;
use crate::signals::{AluOpClass, ControlSignals, Signal};

/// The reserved 8-bit CB-class opcode whose mnemonic is synthesized by
/// appending a condition-code suffix (`B.EQ`, `B.NE`, ...).
pub const CONDITIONAL_BRANCH_OPCODE: u32 = 0b0101_0100;

/// Instruction format tag. The format implies the position and width of the
/// opcode identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Format {
    /// Register: `opcode[31:21] Rm[20:16] shamt[15:10] Rn[9:5] Rd[4:0]`.
    R,
    /// Immediate: `opcode[31:22] imm12[21:10] Rn[9:5] Rd[4:0]`.
    I,
    /// Datatransfer: `opcode[31:21] addr9[20:12] op2[11:10] Rn[9:5] Rt[4:0]`.
    D,
    /// Branch: `opcode[31:26] addr26[25:0]`.
    B,
    /// Conditional branch: `opcode[31:24] addr19[23:5] Rt/cond[4:0]`.
    Cb,
    /// Wide immediate: `opcode[31:23] hw[22:21] imm16[20:5] Rd[4:0]`.
    Im,
}

impl Format {
    /// Bit range `(lo, hi)` occupied by this format's opcode identifier.
    #[must_use]
    pub const fn opcode_range(self) -> (u8, u8) {
        match self {
            Self::R | Self::D => (21, 31),
            Self::I => (22, 31),
            Self::B => (26, 31),
            Self::Cb => (24, 31),
            Self::Im => (23, 31),
        }
    }
}

/// Tagged write-back behavior. `Link` and `MergeHalfword` are the two
/// documented exceptions to the generic ALU/memory write-back rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum WritebackKind {
    /// ALU result, or memory value when `memToReg` is high.
    Standard,
    /// The sequential return address (`PC + 4`) into the link register.
    Link,
    /// Merge a 16-bit immediate into one lane of the destination register,
    /// keeping the other lanes (`MOVK`).
    MergeHalfword,
}

/// Tagged branch-resolution behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BranchKind {
    /// Not a branch.
    None,
    /// Always taken, target = `PC + offset * 4`.
    Unconditional,
    /// Always taken, target = first read register value (`BR`).
    ToRegister,
    /// Taken when the ALU result is zero (`CBZ`).
    OnZero,
    /// Taken when the ALU result is non-zero (`CBNZ`).
    OnNonZero,
    /// Taken when the condition holds over architectural NZCV (`B.cond`).
    OnCondition(Condition),
}

/// Data memory access width for load/store mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessSize {
    /// 1 byte.
    Byte,
    /// 2 bytes.
    Half,
    /// 4 bytes.
    Word,
    /// 8 bytes.
    Double,
}

impl AccessSize {
    /// Width of this access in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
            Self::Double => 8,
        }
    }

    /// Width of this access in bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Byte => 8,
            Self::Half => 16,
            Self::Word => 32,
            Self::Double => 64,
        }
    }
}

/// Memory access contract for a load/store definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemAccess {
    /// Access width.
    pub size: AccessSize,
    /// Sign-extend a narrow loaded value to 64 bits (`LDURSW`).
    pub sign_extend: bool,
}

/// Immutable per-mnemonic definition. Many instructions share one
/// definition through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDefinition {
    /// Upper-case mnemonic, including any condition suffix (`B.EQ`).
    pub mnemonic: String,
    /// Format tag, implying the opcode field position.
    pub format: Format,
    /// Opcode bit-pattern, right-aligned within the format's field width.
    pub opcode: u32,
    /// Control-signal template driving the datapath.
    pub signals: ControlSignals,
    /// Write-back behavior tag.
    pub writeback: WritebackKind,
    /// Branch-resolution behavior tag.
    pub branch: BranchKind,
    /// Memory access contract, for load/store mnemonics only.
    pub access: Option<MemAccess>,
}

/// Definition table construction failure. These indicate a broken source
/// table, never a malformed program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionTableError {
    /// Two definitions share both opcode pattern and format.
    #[error("duplicate definition for opcode {opcode:#x} in format {format:?}")]
    DuplicateOpcode {
        /// The colliding opcode pattern.
        opcode: u32,
        /// The colliding format.
        format: Format,
    },
    /// Two definitions share a mnemonic.
    #[error("duplicate definition for mnemonic '{mnemonic}'")]
    DuplicateMnemonic {
        /// The colliding mnemonic.
        mnemonic: String,
    },
}

/// Two-level lookup table: opcode pattern, then format, plus a flat
/// mnemonic index. Conditional-branch definitions are reachable only by
/// mnemonic; their shared opcode is resolved by the control unit.
#[derive(Debug, Clone, Default)]
pub struct DefinitionTable {
    by_opcode: HashMap<u32, HashMap<Format, Arc<InstructionDefinition>>>,
    by_mnemonic: HashMap<String, Arc<InstructionDefinition>>,
}

impl DefinitionTable {
    /// Builds a table from an explicit record list.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionTableError`] on any duplicate (opcode, format)
    /// pair or duplicate mnemonic.
    pub fn from_records(
        records: impl IntoIterator<Item = InstructionDefinition>,
    ) -> Result<Self, DefinitionTableError> {
        let mut table = Self::default();
        for record in records {
            table.insert(record)?;
        }
        Ok(table)
    }

    /// Builds the builtin table covering the full supported mnemonic set.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionTableError`] if the builtin records are
    /// internally inconsistent.
    pub fn builtin() -> Result<Self, DefinitionTableError> {
        Self::from_records(builtin_records())
    }

    fn insert(&mut self, record: InstructionDefinition) -> Result<(), DefinitionTableError> {
        let definition = Arc::new(record);

        // B.cond variants all share the reserved CB opcode; they are
        // resolved by synthesized mnemonic, never by (opcode, format).
        let mnemonic_only = matches!(definition.branch, BranchKind::OnCondition(_));
        if !mnemonic_only {
            let by_format = self.by_opcode.entry(definition.opcode).or_default();
            if by_format.contains_key(&definition.format) {
                return Err(DefinitionTableError::DuplicateOpcode {
                    opcode: definition.opcode,
                    format: definition.format,
                });
            }
            by_format.insert(definition.format, Arc::clone(&definition));
        }

        if self.by_mnemonic.contains_key(&definition.mnemonic) {
            return Err(DefinitionTableError::DuplicateMnemonic {
                mnemonic: definition.mnemonic.clone(),
            });
        }
        self.by_mnemonic
            .insert(definition.mnemonic.clone(), definition);
        Ok(())
    }

    /// Looks up a definition by opcode pattern and format.
    #[must_use]
    pub fn lookup(&self, opcode: u32, format: Format) -> Option<&Arc<InstructionDefinition>> {
        self.by_opcode.get(&opcode).and_then(|f| f.get(&format))
    }

    /// Looks up a definition by exact upper-case mnemonic.
    #[must_use]
    pub fn lookup_mnemonic(&self, mnemonic: &str) -> Option<&Arc<InstructionDefinition>> {
        self.by_mnemonic.get(mnemonic)
    }

    /// Iterates over every definition in the table, in no particular order.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<InstructionDefinition>> {
        self.by_mnemonic.values()
    }
}

const R_SIGNALS: ControlSignals = ControlSignals {
    reg2_loc: Signal::Low,
    uncond_branch: Signal::Low,
    flag_branch: Signal::Low,
    zero_branch: Signal::Low,
    mem_read: Signal::Low,
    mem_to_reg: Signal::Low,
    mem_write: Signal::Low,
    flag_write: Signal::Low,
    alu_src: Signal::Low,
    reg_write: Signal::High,
    alu_op: AluOpClass::Register,
    operation: AluOp::Add,
};

fn r_arith(mnemonic: &str, opcode: u32, operation: AluOp, sets_flags: bool) -> InstructionDefinition {
    InstructionDefinition {
        mnemonic: mnemonic.to_owned(),
        format: Format::R,
        opcode,
        signals: ControlSignals {
            flag_write: if sets_flags { Signal::High } else { Signal::Low },
            operation,
            ..R_SIGNALS
        },
        writeback: WritebackKind::Standard,
        branch: BranchKind::None,
        access: None,
    }
}

fn r_shift(mnemonic: &str, opcode: u32, operation: AluOp) -> InstructionDefinition {
    // Shifts take their second operand from the shamt field, so aluSrc
    // selects the immediate path.
    InstructionDefinition {
        signals: ControlSignals {
            reg2_loc: Signal::DontCare,
            alu_src: Signal::High,
            operation,
            ..R_SIGNALS
        },
        ..r_arith(mnemonic, opcode, operation, false)
    }
}

fn i_arith(mnemonic: &str, opcode: u32, operation: AluOp, sets_flags: bool) -> InstructionDefinition {
    InstructionDefinition {
        mnemonic: mnemonic.to_owned(),
        format: Format::I,
        opcode,
        signals: ControlSignals {
            reg2_loc: Signal::DontCare,
            alu_src: Signal::High,
            flag_write: if sets_flags { Signal::High } else { Signal::Low },
            operation,
            ..R_SIGNALS
        },
        writeback: WritebackKind::Standard,
        branch: BranchKind::None,
        access: None,
    }
}

fn load(mnemonic: &str, opcode: u32, size: AccessSize, sign_extend: bool) -> InstructionDefinition {
    InstructionDefinition {
        mnemonic: mnemonic.to_owned(),
        format: Format::D,
        opcode,
        signals: ControlSignals {
            reg2_loc: Signal::DontCare,
            uncond_branch: Signal::Low,
            flag_branch: Signal::Low,
            zero_branch: Signal::Low,
            mem_read: Signal::High,
            mem_to_reg: Signal::High,
            mem_write: Signal::Low,
            flag_write: Signal::Low,
            alu_src: Signal::High,
            reg_write: Signal::High,
            alu_op: AluOpClass::MemoryAccess,
            operation: AluOp::Add,
        },
        writeback: WritebackKind::Standard,
        branch: BranchKind::None,
        access: Some(MemAccess { size, sign_extend }),
    }
}

fn store(mnemonic: &str, opcode: u32, size: AccessSize) -> InstructionDefinition {
    InstructionDefinition {
        mnemonic: mnemonic.to_owned(),
        format: Format::D,
        opcode,
        signals: ControlSignals {
            reg2_loc: Signal::High,
            uncond_branch: Signal::Low,
            flag_branch: Signal::Low,
            zero_branch: Signal::Low,
            mem_read: Signal::Low,
            mem_to_reg: Signal::DontCare,
            mem_write: Signal::High,
            flag_write: Signal::Low,
            alu_src: Signal::High,
            reg_write: Signal::Low,
            alu_op: AluOpClass::MemoryAccess,
            operation: AluOp::Add,
        },
        writeback: WritebackKind::Standard,
        branch: BranchKind::None,
        access: Some(MemAccess {
            size,
            sign_extend: false,
        }),
    }
}

fn move_wide(mnemonic: &str, opcode: u32, writeback: WritebackKind) -> InstructionDefinition {
    InstructionDefinition {
        mnemonic: mnemonic.to_owned(),
        format: Format::Im,
        opcode,
        signals: ControlSignals {
            reg2_loc: Signal::DontCare,
            uncond_branch: Signal::Low,
            flag_branch: Signal::Low,
            zero_branch: Signal::Low,
            mem_read: Signal::Low,
            mem_to_reg: Signal::Low,
            mem_write: Signal::Low,
            flag_write: Signal::Low,
            alu_src: Signal::High,
            reg_write: Signal::High,
            alu_op: AluOpClass::MoveWide,
            operation: AluOp::PassB,
        },
        writeback,
        branch: BranchKind::None,
        access: None,
    }
}

fn compare_branch(mnemonic: &str, opcode: u32, branch: BranchKind) -> InstructionDefinition {
    InstructionDefinition {
        mnemonic: mnemonic.to_owned(),
        format: Format::Cb,
        opcode,
        signals: ControlSignals {
            reg2_loc: Signal::High,
            uncond_branch: Signal::Low,
            flag_branch: Signal::Low,
            zero_branch: Signal::High,
            mem_read: Signal::Low,
            mem_to_reg: Signal::DontCare,
            mem_write: Signal::Low,
            flag_write: Signal::Low,
            alu_src: Signal::Low,
            reg_write: Signal::Low,
            alu_op: AluOpClass::Branch,
            operation: AluOp::PassB,
        },
        writeback: WritebackKind::Standard,
        branch,
        access: None,
    }
}

fn cond_branch(cond: Condition) -> InstructionDefinition {
    InstructionDefinition {
        mnemonic: format!("B.{}", cond.suffix()),
        format: Format::Cb,
        opcode: CONDITIONAL_BRANCH_OPCODE,
        signals: ControlSignals {
            reg2_loc: Signal::DontCare,
            uncond_branch: Signal::Low,
            flag_branch: Signal::High,
            zero_branch: Signal::Low,
            mem_read: Signal::Low,
            mem_to_reg: Signal::DontCare,
            mem_write: Signal::Low,
            flag_write: Signal::Low,
            alu_src: Signal::DontCare,
            reg_write: Signal::Low,
            alu_op: AluOpClass::Branch,
            operation: AluOp::Idle,
        },
        writeback: WritebackKind::Standard,
        branch: BranchKind::OnCondition(cond),
        access: None,
    }
}

fn plain_branch(
    mnemonic: &str,
    format: Format,
    opcode: u32,
    branch: BranchKind,
    writeback: WritebackKind,
) -> InstructionDefinition {
    let links = matches!(writeback, WritebackKind::Link);
    InstructionDefinition {
        mnemonic: mnemonic.to_owned(),
        format,
        opcode,
        signals: ControlSignals {
            reg2_loc: Signal::DontCare,
            uncond_branch: Signal::High,
            flag_branch: Signal::Low,
            zero_branch: Signal::Low,
            mem_read: Signal::Low,
            mem_to_reg: Signal::DontCare,
            mem_write: Signal::Low,
            flag_write: Signal::Low,
            alu_src: Signal::DontCare,
            reg_write: if links { Signal::High } else { Signal::Low },
            alu_op: AluOpClass::Branch,
            operation: AluOp::Idle,
        },
        writeback,
        branch,
        access: None,
    }
}

/// The full builtin record set.
#[allow(clippy::too_many_lines)]
fn builtin_records() -> Vec<InstructionDefinition> {
    let mut records = vec![
        // R-format arithmetic/logic.
        r_arith("ADD", 0b100_0101_1000, AluOp::Add, false),
        r_arith("ADDS", 0b101_0101_1000, AluOp::Add, true),
        r_arith("SUB", 0b110_0101_1000, AluOp::Sub, false),
        r_arith("SUBS", 0b111_0101_1000, AluOp::Sub, true),
        r_arith("AND", 0b100_0101_0000, AluOp::And, false),
        r_arith("ANDS", 0b111_0101_0000, AluOp::And, true),
        r_arith("ORR", 0b101_0101_0000, AluOp::Orr, false),
        r_arith("EOR", 0b110_0101_0000, AluOp::Eor, false),
        r_arith("MUL", 0b100_1101_1000, AluOp::Mul, false),
        r_arith("SMULH", 0b100_1101_1010, AluOp::Smulh, false),
        r_arith("UMULH", 0b100_1101_1110, AluOp::Umulh, false),
        r_arith("SDIV", 0b100_1101_0110, AluOp::Sdiv, false),
        r_arith("UDIV", 0b100_1101_0111, AluOp::Udiv, false),
        r_shift("LSL", 0b110_1001_1011, AluOp::Lsl),
        r_shift("LSR", 0b110_1001_1010, AluOp::Lsr),
        r_shift("ASR", 0b110_1001_1100, AluOp::Asr),
        // I-format arithmetic/logic.
        i_arith("ADDI", 0b10_0100_0100, AluOp::Add, false),
        i_arith("ADDIS", 0b10_1100_0100, AluOp::Add, true),
        i_arith("SUBI", 0b11_0100_0100, AluOp::Sub, false),
        i_arith("SUBIS", 0b11_1100_0100, AluOp::Sub, true),
        i_arith("ANDI", 0b10_0100_1000, AluOp::And, false),
        i_arith("ANDIS", 0b11_1100_1000, AluOp::And, true),
        i_arith("ORRI", 0b10_1100_1000, AluOp::Orr, false),
        i_arith("EORI", 0b11_0100_1000, AluOp::Eor, false),
        // D-format loads and stores.
        load("LDUR", 0b111_1100_0010, AccessSize::Double, false),
        store("STUR", 0b111_1100_0000, AccessSize::Double),
        load("LDURB", 0b001_1100_0010, AccessSize::Byte, false),
        store("STURB", 0b001_1100_0000, AccessSize::Byte),
        load("LDURH", 0b011_1100_0010, AccessSize::Half, false),
        store("STURH", 0b011_1100_0000, AccessSize::Half),
        load("LDURSW", 0b101_1100_0100, AccessSize::Word, true),
        store("STURW", 0b101_1100_0000, AccessSize::Word),
        // Wide moves.
        move_wide("MOVZ", 0b1_1010_0101, WritebackKind::Standard),
        move_wide("MOVK", 0b1_1110_0101, WritebackKind::MergeHalfword),
        // Branches.
        plain_branch(
            "B",
            Format::B,
            0b00_0101,
            BranchKind::Unconditional,
            WritebackKind::Standard,
        ),
        plain_branch(
            "BL",
            Format::B,
            0b10_0101,
            BranchKind::Unconditional,
            WritebackKind::Link,
        ),
        plain_branch(
            "BR",
            Format::R,
            0b110_1011_0000,
            BranchKind::ToRegister,
            WritebackKind::Standard,
        ),
        compare_branch("CBZ", 0b1011_0100, BranchKind::OnZero),
        compare_branch("CBNZ", 0b1011_0101, BranchKind::OnNonZero),
    ];
    records.extend(Condition::ALL.into_iter().map(cond_branch));
    records
}

#[cfg(test)]
mod tests {
    use super::{
        builtin_records, AccessSize, BranchKind, DefinitionTable, DefinitionTableError, Format,
        CONDITIONAL_BRANCH_OPCODE,
    };
    use crate::signals::Signal;

    #[test]
    fn mnemonic_count_matches_supported_set() {
        let table = DefinitionTable::builtin().expect("builtin table must build");
        let mut mnemonics: Vec<_> = table
            .definitions()
            .map(|d| d.mnemonic.clone())
            .collect();
        mnemonics.sort();
        // 16 R + 8 I + 8 D + 2 IM + 3 branch + 2 compare-branch + 14 B.cond.
        assert_eq!(mnemonics.len(), 53);
        assert!(mnemonics.contains(&"ADD".to_owned()));
        assert!(mnemonics.contains(&"B.LE".to_owned()));
        assert!(mnemonics.contains(&"LDURSW".to_owned()));
    }

    #[test]
    fn conditional_branches_resolve_only_by_mnemonic() {
        let table = DefinitionTable::builtin().expect("builtin table must build");
        assert!(table
            .lookup(CONDITIONAL_BRANCH_OPCODE, Format::Cb)
            .is_none());
        let def = table.lookup_mnemonic("B.EQ").expect("B.EQ present");
        assert_eq!(def.opcode, CONDITIONAL_BRANCH_OPCODE);
        assert!(def.signals.flag_branch.is_high());
    }

    #[test]
    fn shared_opcode_requires_distinct_format() {
        let records = vec![
            super::r_arith("FOO", 0x123, crate::alu::AluOp::Add, false),
            super::r_arith("BAR", 0x123, crate::alu::AluOp::Sub, false),
        ];
        let err = DefinitionTable::from_records(records).unwrap_err();
        assert_eq!(
            err,
            DefinitionTableError::DuplicateOpcode {
                opcode: 0x123,
                format: Format::R
            }
        );
    }

    #[test]
    fn duplicate_mnemonic_is_rejected() {
        let records = vec![
            super::r_arith("FOO", 0x123, crate::alu::AluOp::Add, false),
            super::i_arith("FOO", 0x99, crate::alu::AluOp::Add, false),
        ];
        let err = DefinitionTable::from_records(records).unwrap_err();
        assert_eq!(
            err,
            DefinitionTableError::DuplicateMnemonic {
                mnemonic: "FOO".to_owned()
            }
        );
    }

    #[test]
    fn store_definitions_select_rt_via_reg2loc() {
        let table = DefinitionTable::builtin().expect("builtin table must build");
        let stur = table.lookup_mnemonic("STUR").expect("STUR present");
        assert!(stur.signals.reg2_loc.is_high());
        assert!(stur.signals.mem_write.is_high());
        assert!(!stur.signals.reg_write.is_high());
        assert_eq!(
            stur.access.map(|a| a.size),
            Some(AccessSize::Double)
        );
    }

    #[test]
    fn branch_kind_tags_cover_the_documented_exceptions() {
        let table = DefinitionTable::builtin().expect("builtin table must build");
        assert_eq!(
            table.lookup_mnemonic("BR").map(|d| d.branch),
            Some(BranchKind::ToRegister)
        );
        assert_eq!(
            table.lookup_mnemonic("BL").map(|d| d.writeback),
            Some(super::WritebackKind::Link)
        );
        assert_eq!(
            table.lookup_mnemonic("MOVK").map(|d| d.writeback),
            Some(super::WritebackKind::MergeHalfword)
        );
    }

    #[test]
    fn every_record_has_a_consistent_branch_signal() {
        for record in builtin_records() {
            let high_lines = [
                record.signals.uncond_branch,
                record.signals.flag_branch,
                record.signals.zero_branch,
            ]
            .iter()
            .filter(|s| s.is_high())
            .count();
            match record.branch {
                BranchKind::None => assert_eq!(high_lines, 0, "{}", record.mnemonic),
                _ => assert_eq!(high_lines, 1, "{}", record.mnemonic),
            }
        }
    }
}
