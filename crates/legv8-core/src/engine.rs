//! Simulation engine: architectural stepping with micro-step tracing.
//!
//! One [`SimulationEngine::step`] retires one instruction and reports every
//! datapath stage it passed through. Any failure mid-step halts the engine
//! and propagates; a halted engine steps as a no-op.

use std::sync::Arc;

use crate::alu::{self, Flags};
use crate::bits::sign_extend;
use crate::control::ControlUnit;
use crate::defs::{AccessSize, BranchKind, DefinitionTable, DefinitionTableError, WritebackKind};
use crate::error::CoreError;
use crate::instruction::{Instruction, InstructionFields};
use crate::memory::DataMemory;
use crate::registers::{RegisterFile, LR};
use crate::trace::{BusTransfer, Component, MicroStep, Snapshot, Stage};

/// Address-space and run-bound configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EngineConfig {
    /// Base address of the first loaded instruction.
    pub text_base: u64,
    /// Minimum legal data memory address.
    pub memory_floor: u64,
    /// Initial stack pointer value.
    pub stack_top: u64,
    /// Default step bound for [`SimulationEngine::run_to_halt`].
    pub max_run_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            text_base: 0x0040_0000,
            memory_floor: 0x0050_0000,
            stack_top: 0x7FFF_FF00,
            max_run_steps: 10_000,
        }
    }
}

/// Word-addressed instruction memory holding the loaded program.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InstructionMemory {
    base: u64,
    words: Vec<u32>,
}

impl InstructionMemory {
    /// Creates an instruction memory holding `words` starting at `base`.
    #[must_use]
    pub const fn new(base: u64, words: Vec<u32>) -> Self {
        Self { base, words }
    }

    /// Number of loaded instruction words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether no program is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Fetches the instruction word at `pc`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MisalignedPc`] for a non-word-aligned `pc` and
    /// [`CoreError::PcOutOfRange`] for a `pc` outside the loaded program.
    pub fn fetch(&self, pc: u64) -> Result<u32, CoreError> {
        if pc % 4 != 0 {
            return Err(CoreError::MisalignedPc { pc });
        }
        let index = pc
            .checked_sub(self.base)
            .map(|offset| offset / 4)
            .and_then(|index| usize::try_from(index).ok())
            .filter(|&index| index < self.words.len());
        match index {
            Some(index) => Ok(self.words[index]),
            None => Err(CoreError::PcOutOfRange { pc }),
        }
    }
}

/// Whether the engine will retire another instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EngineState {
    /// The next `step` will fetch and execute.
    Ready,
    /// The engine stopped, by terminal spin or by error. Steps are no-ops.
    Halted,
}

/// Result of a bounded [`SimulationEngine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunOutcome {
    /// The engine halted after retiring `steps` instructions.
    Halted {
        /// Instructions retired before the halt.
        steps: usize,
    },
    /// The step bound was exhausted with the engine still ready.
    LimitReached {
        /// Instructions retired, equal to the bound.
        steps: usize,
    },
}

/// The architectural simulator.
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    config: EngineConfig,
    control: ControlUnit,
    registers: RegisterFile,
    memory: DataMemory,
    program: InstructionMemory,
    pc: u64,
    flags: Flags,
    state: EngineState,
}

impl SimulationEngine {
    /// Creates an engine over the builtin definition table.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionTableError`] if the builtin table fails to
    /// build.
    pub fn new(config: EngineConfig) -> Result<Self, DefinitionTableError> {
        Ok(Self::with_table(
            config,
            Arc::new(DefinitionTable::builtin()?),
        ))
    }

    /// Creates an engine over an explicit definition table.
    #[must_use]
    pub fn with_table(config: EngineConfig, table: Arc<DefinitionTable>) -> Self {
        let mut registers = RegisterFile::new();
        registers.reset(config.stack_top);
        Self {
            config,
            control: ControlUnit::new(table),
            registers,
            memory: DataMemory::new(config.memory_floor),
            program: InstructionMemory::new(config.text_base, Vec::new()),
            pc: config.text_base,
            flags: Flags::CLEAR,
            state: EngineState::Ready,
        }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current program counter.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Current architectural NZCV flags.
    #[must_use]
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    /// Current engine state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// The register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// The data memory.
    #[must_use]
    pub const fn memory(&self) -> &DataMemory {
        &self.memory
    }

    /// Mutable data memory access, for hosts preloading data segments.
    pub fn memory_mut(&mut self) -> &mut DataMemory {
        &mut self.memory
    }

    /// The control unit driving decode.
    #[must_use]
    pub const fn control(&self) -> &ControlUnit {
        &self.control
    }

    /// Loads a program and resets all architectural state.
    pub fn load_program(&mut self, words: &[u32]) {
        self.program = InstructionMemory::new(self.config.text_base, words.to_vec());
        self.reset();
    }

    /// Resets registers, memory, flags, and the program counter, keeping
    /// the loaded program.
    pub fn reset(&mut self) {
        self.registers.reset(self.config.stack_top);
        self.memory.clear();
        self.pc = self.config.text_base;
        self.flags = Flags::CLEAR;
        self.state = EngineState::Ready;
    }

    /// Retires one instruction, returning the six-stage micro-step trace.
    /// A halted engine returns an empty trace.
    ///
    /// # Errors
    ///
    /// Propagates any [`CoreError`] raised mid-step. The engine is halted
    /// before the error returns.
    pub fn step(&mut self) -> Result<Vec<MicroStep>, CoreError> {
        if self.state == EngineState::Halted {
            return Ok(Vec::new());
        }
        match self.step_inner() {
            Ok(trace) => Ok(trace),
            Err(err) => {
                self.state = EngineState::Halted;
                Err(err)
            }
        }
    }

    /// Steps until the engine halts or `max_steps` instructions retire.
    ///
    /// # Errors
    ///
    /// Propagates the first [`CoreError`] raised by a step.
    pub fn run(&mut self, max_steps: usize) -> Result<RunOutcome, CoreError> {
        for retired in 0..max_steps {
            if self.state == EngineState::Halted {
                return Ok(RunOutcome::Halted { steps: retired });
            }
            self.step()?;
        }
        if self.state == EngineState::Halted {
            Ok(RunOutcome::Halted { steps: max_steps })
        } else {
            Ok(RunOutcome::LimitReached { steps: max_steps })
        }
    }

    /// Steps until halt, bounded by the configured `max_run_steps`.
    ///
    /// # Errors
    ///
    /// Propagates the first [`CoreError`] raised by a step.
    pub fn run_to_halt(&mut self) -> Result<RunOutcome, CoreError> {
        self.run(self.config.max_run_steps)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            pc: self.pc,
            flags: self.flags,
            registers: self.registers.snapshot(),
        }
    }

    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap,
        clippy::too_many_lines
    )]
    fn step_inner(&mut self) -> Result<Vec<MicroStep>, CoreError> {
        let mut trace = Vec::with_capacity(Stage::ALL.len());

        // Fetch.
        let word = self.program.fetch(self.pc)?;
        trace.push(MicroStep {
            stage: Stage::Fetching,
            transfers: vec![
                BusTransfer::new(
                    Component::ProgramCounter,
                    Component::InstructionMemory,
                    "FetchAddress",
                    self.pc,
                ),
                BusTransfer::new(
                    Component::InstructionMemory,
                    Component::ControlUnit,
                    "Instruction",
                    u64::from(word),
                ),
            ],
            snapshot: self.snapshot(),
        });

        // Decode.
        let inst = self.control.decode(word)?;
        let signals = inst.definition.signals;
        let operands = self.read_operands(&inst);
        let mut decode_transfers = Vec::new();
        if let Some(read1) = operands.read1 {
            decode_transfers.push(BusTransfer::new(
                Component::ControlUnit,
                Component::RegisterFile,
                "ReadRegister1",
                u64::from(read1),
            ));
        }
        if let Some(read2) = operands.read2 {
            decode_transfers.push(BusTransfer::new(
                Component::ControlUnit,
                Component::RegisterFile,
                "ReadRegister2",
                u64::from(read2),
            ));
        }
        if signals.alu_src.is_high() {
            decode_transfers.push(BusTransfer::new(
                Component::ControlUnit,
                Component::SignExtender,
                "Immediate",
                operands.b as u64,
            ));
        }
        trace.push(MicroStep {
            stage: Stage::Decoding,
            transfers: decode_transfers,
            snapshot: self.snapshot(),
        });

        // Execute.
        let result = alu::execute(operands.a, operands.b, signals.operation);
        if signals.flag_write.is_high() {
            self.flags = result.flags;
        }
        let mut execute_transfers = vec![
            BusTransfer::new(
                Component::RegisterFile,
                Component::Alu,
                "OperandA",
                operands.a as u64,
            ),
            BusTransfer::new(
                if signals.alu_src.is_high() {
                    Component::SignExtender
                } else {
                    Component::RegisterFile
                },
                Component::Alu,
                "OperandB",
                operands.b as u64,
            ),
        ];
        if signals.flag_write.is_high() {
            execute_transfers.push(BusTransfer::new(
                Component::Alu,
                Component::FlagRegister,
                "Flags",
                result.flags.bits(),
            ));
        }
        trace.push(MicroStep {
            stage: Stage::Executing,
            transfers: execute_transfers,
            snapshot: self.snapshot(),
        });

        // Memory.
        let address = result.value as u64;
        if signals.mem_read.is_high() && signals.mem_write.is_high() {
            return Err(CoreError::ConflictingMemoryRequest { address });
        }
        let mut loaded = None;
        let mut memory_transfers = Vec::new();
        if signals.mem_read.is_high() {
            let access = inst
                .definition
                .access
                .unwrap_or(crate::defs::MemAccess {
                    size: AccessSize::Double,
                    sign_extend: false,
                });
            let raw = self.memory.read(address, access.size)?;
            let value = if access.sign_extend {
                sign_extend(raw, access.size.bits())?
            } else {
                raw as i64
            };
            loaded = Some(value);
            memory_transfers.push(BusTransfer::new(
                Component::Alu,
                Component::DataMemory,
                "Address",
                address,
            ));
            memory_transfers.push(BusTransfer::new(
                Component::DataMemory,
                Component::RegisterFile,
                "ReadData",
                raw,
            ));
        } else if signals.mem_write.is_high() {
            let access = inst
                .definition
                .access
                .unwrap_or(crate::defs::MemAccess {
                    size: AccessSize::Double,
                    sign_extend: false,
                });
            let store_value = operands.store_value as u64;
            self.memory.write(address, store_value, access.size)?;
            memory_transfers.push(BusTransfer::new(
                Component::Alu,
                Component::DataMemory,
                "Address",
                address,
            ));
            memory_transfers.push(BusTransfer::new(
                Component::RegisterFile,
                Component::DataMemory,
                "WriteData",
                store_value,
            ));
        }
        trace.push(MicroStep {
            stage: Stage::AccessingMemory,
            transfers: memory_transfers,
            snapshot: self.snapshot(),
        });

        // Write back.
        let mut writeback_transfers = Vec::new();
        if signals.reg_write.is_high() {
            let dest = writeback_destination(&inst);
            let value = match inst.definition.writeback {
                WritebackKind::Link => (self.pc + 4) as i64,
                WritebackKind::MergeHalfword => merge_halfword(&inst, &self.registers),
                WritebackKind::Standard => {
                    if signals.mem_to_reg.is_high() {
                        loaded.unwrap_or(result.value)
                    } else {
                        result.value
                    }
                }
            };
            self.registers.write(dest, value, true);
            writeback_transfers.push(BusTransfer::new(
                if signals.mem_to_reg.is_high() {
                    Component::DataMemory
                } else {
                    Component::Alu
                },
                Component::RegisterFile,
                "WriteData",
                value as u64,
            ));
        }
        trace.push(MicroStep {
            stage: Stage::WritingBack,
            transfers: writeback_transfers,
            snapshot: self.snapshot(),
        });

        // Update PC.
        let branch = self.resolve_branch(&inst, result.value);
        let next_pc = branch.unwrap_or(self.pc.wrapping_add(4));
        // An unconditional branch to itself can never make progress, so
        // treat it as the program's terminal spin and halt.
        let terminal_spin = matches!(
            inst.definition.branch,
            BranchKind::Unconditional | BranchKind::ToRegister
        ) && branch == Some(self.pc);
        self.pc = next_pc;
        if terminal_spin {
            self.state = EngineState::Halted;
        }
        trace.push(MicroStep {
            stage: Stage::UpdatingPc,
            transfers: vec![BusTransfer::new(
                Component::ControlUnit,
                Component::ProgramCounter,
                "NextPC",
                next_pc,
            )],
            snapshot: self.snapshot(),
        });

        Ok(trace)
    }

    /// Selects register read ports and ALU operands for `inst`.
    #[allow(clippy::cast_sign_loss)]
    fn read_operands(&self, inst: &Instruction) -> Operands {
        let signals = inst.definition.signals;
        match inst.fields {
            InstructionFields::R { rm, shamt, rn, .. } => {
                let b = if signals.alu_src.is_high() {
                    i64::from(shamt)
                } else {
                    self.registers.read(rm)
                };
                Operands {
                    read1: Some(rn),
                    read2: (!signals.alu_src.is_high()).then_some(rm),
                    a: self.registers.read(rn),
                    b,
                    store_value: 0,
                }
            }
            InstructionFields::I { imm12, rn, .. } => Operands {
                read1: Some(rn),
                read2: None,
                a: self.registers.read(rn),
                b: i64::from(imm12),
                store_value: 0,
            },
            InstructionFields::D { offset9, rn, rt } => Operands {
                read1: Some(rn),
                read2: signals.reg2_loc.is_high().then_some(rt),
                a: self.registers.read(rn),
                b: i64::from(offset9),
                store_value: self.registers.read(rt),
            },
            InstructionFields::B { .. } => Operands {
                read1: None,
                read2: None,
                a: 0,
                b: 0,
                store_value: 0,
            },
            InstructionFields::Cb { rt, .. } => {
                // B.cond carries a condition in the register field, not a
                // register to read.
                if matches!(inst.definition.branch, BranchKind::OnCondition(_)) {
                    Operands {
                        read1: None,
                        read2: None,
                        a: 0,
                        b: 0,
                        store_value: 0,
                    }
                } else {
                    Operands {
                        read1: None,
                        read2: Some(rt),
                        a: 0,
                        b: self.registers.read(rt),
                        store_value: 0,
                    }
                }
            }
            InstructionFields::Im { hw, imm16, .. } => Operands {
                read1: None,
                read2: None,
                a: 0,
                b: ((u64::from(imm16)) << (16 * u32::from(hw))) as i64,
                store_value: 0,
            },
        }
    }

    /// Resolves the branch target, if this instruction branches and the
    /// branch is taken.
    #[allow(clippy::cast_sign_loss)]
    fn resolve_branch(&self, inst: &Instruction, alu_value: i64) -> Option<u64> {
        let taken_offset = |count: i64| self.pc.wrapping_add_signed(count * 4);
        match inst.definition.branch {
            BranchKind::None => None,
            BranchKind::Unconditional => match inst.fields {
                InstructionFields::B { offset26 } => Some(taken_offset(i64::from(offset26))),
                _ => None,
            },
            BranchKind::ToRegister => match inst.fields {
                InstructionFields::R { rn, .. } => Some(self.registers.read(rn) as u64),
                _ => None,
            },
            BranchKind::OnZero | BranchKind::OnNonZero => match inst.fields {
                InstructionFields::Cb { offset19, .. } => {
                    let zero = alu_value == 0;
                    let taken = match inst.definition.branch {
                        BranchKind::OnZero => zero,
                        _ => !zero,
                    };
                    taken.then(|| taken_offset(i64::from(offset19)))
                }
                _ => None,
            },
            BranchKind::OnCondition(cond) => match inst.fields {
                InstructionFields::Cb { offset19, .. } => cond
                    .holds(self.flags)
                    .then(|| taken_offset(i64::from(offset19))),
                _ => None,
            },
        }
    }
}

/// Operand selection for one instruction.
struct Operands {
    read1: Option<u8>,
    read2: Option<u8>,
    a: i64,
    b: i64,
    store_value: i64,
}

/// Destination register index for a write-back.
fn writeback_destination(inst: &Instruction) -> u8 {
    if matches!(inst.definition.writeback, WritebackKind::Link) {
        return LR;
    }
    match inst.fields {
        InstructionFields::R { rd, .. }
        | InstructionFields::I { rd, .. }
        | InstructionFields::Im { rd, .. } => rd,
        InstructionFields::D { rt, .. } | InstructionFields::Cb { rt, .. } => rt,
        InstructionFields::B { .. } => LR,
    }
}

/// Replaces halfword lane `hw` of the destination's current value with the
/// raw 16-bit immediate (`MOVK`).
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn merge_halfword(inst: &Instruction, registers: &RegisterFile) -> i64 {
    match inst.fields {
        InstructionFields::Im { hw, imm16, rd } => {
            let shift = 16 * u32::from(hw);
            let old = registers.read(rd) as u64;
            let merged = (old & !(0xFFFFu64 << shift)) | (u64::from(imm16) << shift);
            merged as i64
        }
        _ => 0,
    }
}
