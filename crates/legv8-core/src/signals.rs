//! Control-signal vector steering the datapath for one instruction.

use crate::alu::AluOp;

/// A single control line. `DontCare` lines are displayed greyed-out by
/// visualizers and are treated as low by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Signal {
    /// Deasserted.
    Low,
    /// Asserted.
    High,
    /// Value is irrelevant for this instruction class.
    DontCare,
}

impl Signal {
    /// Returns `true` only for an asserted line.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

/// Coarse 2-bit ALU operation class, as presented on the `ALUOp` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AluOpClass {
    /// `00`: address computation for loads and stores.
    MemoryAccess = 0b00,
    /// `01`: branch-side use (zero test or no work at all).
    Branch = 0b01,
    /// `10`: register-class arithmetic/logic.
    Register = 0b10,
    /// `11`: wide move immediate paths.
    MoveWide = 0b11,
}

/// The full control-signal template attached to an instruction definition.
///
/// At most one of `flag_branch`, `zero_branch`, and `uncond_branch` is
/// meaningfully high for any taken-branch decision, and `operation` only
/// carries meaning when the instruction is not a pure unconditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ControlSignals {
    /// Selects the second read-register address: low = Rm field, high =
    /// Rt/target field.
    pub reg2_loc: Signal,
    /// Branch is taken unconditionally.
    pub uncond_branch: Signal,
    /// Branch decision comes from the condition-code table over NZCV.
    pub flag_branch: Signal,
    /// Branch decision comes from a zero/non-zero test of the ALU result.
    pub zero_branch: Signal,
    /// Data memory is read this instruction.
    pub mem_read: Signal,
    /// Write-back value comes from memory rather than the ALU.
    pub mem_to_reg: Signal,
    /// Data memory is written this instruction.
    pub mem_write: Signal,
    /// ALU flags are committed to the architectural NZCV register.
    pub flag_write: Signal,
    /// ALU operand B comes from the extracted immediate, not a register.
    pub alu_src: Signal,
    /// The register file write port is enabled.
    pub reg_write: Signal,
    /// Coarse ALU class lines.
    pub alu_op: AluOpClass,
    /// The concrete operation the ALU performs.
    pub operation: AluOp,
}

impl ControlSignals {
    /// Returns `true` when any branch-decision line is asserted.
    #[must_use]
    pub const fn is_branching(&self) -> bool {
        self.uncond_branch.is_high() || self.flag_branch.is_high() || self.zero_branch.is_high()
    }
}
