//! Core LEGv8 subset simulator crate.

/// Bit-field extraction, insertion, and sign-extension primitives.
pub mod bits;
pub use bits::{extract_bits, set_bits, sign_extend};

/// Core error taxonomy.
pub mod error;
pub use error::{CoreError, ErrorClass};

/// Arithmetic logic unit and NZCV flag semantics.
pub mod alu;
pub use alu::{execute, AluOp, AluResult, Flags};

/// Condition-code table for `B.cond` synthesis and evaluation.
pub mod condition;
pub use condition::Condition;

/// Control-signal vectors.
pub mod signals;
pub use signals::{AluOpClass, ControlSignals, Signal};

/// Instruction definition table.
pub mod defs;
pub use defs::{
    AccessSize, BranchKind, DefinitionTable, DefinitionTableError, Format, InstructionDefinition,
    MemAccess, WritebackKind, CONDITIONAL_BRANCH_OPCODE,
};

/// Decoded instruction model and disassembly.
pub mod instruction;
pub use instruction::{register_name, Instruction, InstructionFields};

/// Control unit resolving words to definitions across opcode widths.
pub mod control;
pub use control::ControlUnit;

/// Architectural register file.
pub mod registers;
pub use registers::{RegisterFile, FP, LR, SP, XZR};

/// Sparse byte-addressable data memory.
pub mod memory;
pub use memory::DataMemory;

/// Micro-step trace model.
pub mod trace;
pub use trace::{BusTransfer, Component, MicroStep, Snapshot, Stage};

/// Simulation engine.
pub mod engine;
pub use engine::{EngineConfig, EngineState, InstructionMemory, RunOutcome, SimulationEngine};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
