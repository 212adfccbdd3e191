//! Error taxonomy for the simulator core.
//!
//! Decode, memory, and program-counter failures are never converted to
//! default values inside the core contracts; they propagate to the caller
//! and leave the engine halted.

use thiserror::Error;

/// Coarse classification used by hosts deciding how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// No definition matched the instruction word, or the definition table
    /// itself is inconsistent.
    Decode,
    /// Data memory access policy violation.
    Memory,
    /// Program counter left the legal fetch range or lost word alignment.
    ProgramCounter,
}

/// Canonical core error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CoreError {
    /// No (opcode, format) entry matched at any candidate field width.
    #[error("unrecognized instruction word {word:#010x}")]
    UnrecognizedInstruction {
        /// The raw instruction word that failed to decode.
        word: u32,
    },
    /// The conditional-branch class decoded, but the definition table has no
    /// entry for the synthesized mnemonic. This is a table-integrity
    /// failure, not a decode ambiguity.
    #[error("definition table is missing conditional branch entry '{mnemonic}'")]
    MissingConditionEntry {
        /// The synthesized mnemonic (e.g. `B.EQ`) that was not found.
        mnemonic: String,
    },
    /// A bit-field range was malformed (`lo > hi` or `hi >= 32`).
    #[error("invalid bit range {lo}..={hi}")]
    InvalidBitRange {
        /// Low bit index of the rejected range.
        lo: u8,
        /// High bit index of the rejected range.
        hi: u8,
    },
    /// A sign-extension width was outside `1..=64`.
    #[error("invalid sign-extension width {width}")]
    InvalidExtendWidth {
        /// The rejected width.
        width: u8,
    },
    /// A data memory access targeted an address below the configured floor.
    #[error("memory access at {address:#x} is below the data floor {floor:#x}")]
    AddressBelowFloor {
        /// The offending byte address.
        address: u64,
        /// The configured minimum legal address.
        floor: u64,
    },
    /// One instruction requested both a memory read and a memory write.
    #[error("conflicting memory read and write request at {address:#x}")]
    ConflictingMemoryRequest {
        /// The effective address of the conflicting request.
        address: u64,
    },
    /// The program counter is not a multiple of the 4-byte instruction size.
    #[error("program counter {pc:#x} is not word-aligned")]
    MisalignedPc {
        /// The offending program counter value.
        pc: u64,
    },
    /// The program counter points outside the loaded program.
    #[error("program counter {pc:#x} is outside the loaded program")]
    PcOutOfRange {
        /// The offending program counter value.
        pc: u64,
    },
}

impl CoreError {
    /// Returns the coarse class of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::UnrecognizedInstruction { .. }
            | Self::MissingConditionEntry { .. }
            | Self::InvalidBitRange { .. }
            | Self::InvalidExtendWidth { .. } => ErrorClass::Decode,
            Self::AddressBelowFloor { .. } | Self::ConflictingMemoryRequest { .. } => {
                ErrorClass::Memory
            }
            Self::MisalignedPc { .. } | Self::PcOutOfRange { .. } => ErrorClass::ProgramCounter,
        }
    }
}
