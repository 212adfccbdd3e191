//! Micro-step trace model.
//!
//! Each architectural step is reported as a fixed sequence of stages, and
//! each stage carries the bus transfers that fired plus a full snapshot of
//! architectural state after the stage. Hosts replay these records to
//! animate the datapath; the engine itself never reads them back.

use crate::alu::Flags;

/// The six datapath stages, in the order they are always emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Stage {
    /// Instruction word read from instruction memory at PC.
    Fetching,
    /// Control unit resolves the word to a definition and fields.
    Decoding,
    /// Register operands are read and the ALU fires.
    Executing,
    /// Data memory is read or written, when the instruction asks for it.
    AccessingMemory,
    /// The destination register receives its value.
    WritingBack,
    /// The program counter moves, sequentially or by branch.
    UpdatingPc,
}

impl Stage {
    /// All stages, in emission order.
    pub const ALL: [Self; 6] = [
        Self::Fetching,
        Self::Decoding,
        Self::Executing,
        Self::AccessingMemory,
        Self::WritingBack,
        Self::UpdatingPc,
    ];
}

/// Datapath endpoints a transfer can connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Component {
    ProgramCounter,
    InstructionMemory,
    ControlUnit,
    RegisterFile,
    SignExtender,
    Alu,
    DataMemory,
    FlagRegister,
}

/// One value moving between two datapath components during a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BusTransfer {
    /// Originating component.
    pub source: Component,
    /// Receiving component.
    pub destination: Component,
    /// Short human-readable label (`"ReadData1"`, `"ALUResult"`, ...).
    pub label: String,
    /// The raw 64-bit payload.
    pub value: u64,
}

impl BusTransfer {
    /// Convenience constructor.
    #[must_use]
    pub fn new(source: Component, destination: Component, label: &str, value: u64) -> Self {
        Self {
            source,
            destination,
            label: label.to_owned(),
            value,
        }
    }
}

/// Full architectural state after a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Snapshot {
    /// Program counter.
    pub pc: u64,
    /// Architectural NZCV flags.
    pub flags: Flags,
    /// All 32 registers, `XZR` included as zero.
    pub registers: [i64; 32],
}

/// One stage of one architectural step: which stage ran, what moved, and
/// the state afterwards. Stages that had no work still appear, with an
/// empty transfer list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MicroStep {
    /// The stage that ran.
    pub stage: Stage,
    /// Transfers that fired during the stage, in datapath order.
    pub transfers: Vec<BusTransfer>,
    /// Architectural state after the stage.
    pub snapshot: Snapshot,
}
