//! Pass 2: operand matching and instruction word encoding.
//!
//! Register-form mnemonics with an immediate third operand are rewritten
//! to their immediate form (`ADD` with `#n` encodes as `ADDI`), so source
//! can use the architectural spelling either way.

use legv8_core::{set_bits, BranchKind, DefinitionTable, Format, InstructionDefinition};

use crate::errors::{AssemblyError, AssemblyErrorKind};
use crate::parser::{Operand, SourceLine};
use crate::symbols::SymbolTable;

/// Register-form to immediate-form mnemonic rewrites.
const IMMEDIATE_ALIASES: [(&str, &str); 8] = [
    ("ADD", "ADDI"),
    ("ADDS", "ADDIS"),
    ("SUB", "SUBI"),
    ("SUBS", "SUBIS"),
    ("AND", "ANDI"),
    ("ANDS", "ANDIS"),
    ("ORR", "ORRI"),
    ("EOR", "EORI"),
];

/// Encodes one instruction line into its 32-bit word.
///
/// `address` is the byte address this instruction will occupy; branch
/// displacements are computed relative to it.
///
/// # Errors
///
/// Returns an [`AssemblyError`] for unknown mnemonics, operand shape
/// mismatches, out-of-range immediates and displacements, and undefined
/// labels.
pub fn encode_line(
    line: &SourceLine,
    address: u64,
    symbols: &SymbolTable,
    table: &DefinitionTable,
) -> Result<u32, AssemblyError> {
    let Some(mnemonic) = &line.mnemonic else {
        return Err(AssemblyError::new(
            line.number,
            AssemblyErrorKind::Syntax("not an instruction line".to_owned()),
        ));
    };

    let effective = effective_mnemonic(mnemonic, &line.operands);
    let definition = table.lookup_mnemonic(effective).ok_or_else(|| {
        AssemblyError::new(
            line.number,
            AssemblyErrorKind::UnknownMnemonic(mnemonic.clone()),
        )
    })?;

    let (lo, hi) = definition.format.opcode_range();
    let word = field(line.number, 0, definition.opcode, lo, hi)?;

    match definition.format {
        Format::R => encode_r(line, definition, word),
        Format::I => encode_i(line, word),
        Format::D => encode_d(line, word),
        Format::B => encode_b(line, address, symbols, word),
        Format::Cb => encode_cb(line, definition, address, symbols, word),
        Format::Im => encode_im(line, word),
    }
}

fn effective_mnemonic<'a>(mnemonic: &'a str, operands: &[Operand]) -> &'a str {
    if matches!(operands.get(2), Some(Operand::Immediate(_))) {
        for (register_form, immediate_form) in IMMEDIATE_ALIASES {
            if mnemonic == register_form {
                return immediate_form;
            }
        }
    }
    mnemonic
}

fn encode_r(
    line: &SourceLine,
    definition: &InstructionDefinition,
    word: u32,
) -> Result<u32, AssemblyError> {
    // BR takes only its target register, in the Rn field.
    if matches!(definition.branch, BranchKind::ToRegister) {
        let [Operand::Register(rn)] = line.operands[..] else {
            return Err(bad_operands(line, "expected a single register"));
        };
        return field(line.number, word, u32::from(rn), 5, 9);
    }

    // Shift mnemonics carry their amount in the shamt field.
    if definition.signals.alu_src.is_high() {
        let [Operand::Register(rd), Operand::Register(rn), Operand::Immediate(amount)] =
            line.operands[..]
        else {
            return Err(bad_operands(line, "expected Xd, Xn, #shamt"));
        };
        check_range(line.number, amount, 0, 63)?;
        let word = field(line.number, word, mask(amount, 6), 10, 15)?;
        let word = field(line.number, word, u32::from(rn), 5, 9)?;
        return field(line.number, word, u32::from(rd), 0, 4);
    }

    let [Operand::Register(rd), Operand::Register(rn), Operand::Register(rm)] = line.operands[..]
    else {
        return Err(bad_operands(line, "expected Xd, Xn, Xm"));
    };
    let word = field(line.number, word, u32::from(rm), 16, 20)?;
    let word = field(line.number, word, u32::from(rn), 5, 9)?;
    field(line.number, word, u32::from(rd), 0, 4)
}

fn encode_i(line: &SourceLine, word: u32) -> Result<u32, AssemblyError> {
    let [Operand::Register(rd), Operand::Register(rn), Operand::Immediate(imm)] = line.operands[..]
    else {
        return Err(bad_operands(line, "expected Xd, Xn, #imm"));
    };
    check_range(line.number, imm, -2048, 2047)?;
    let word = field(line.number, word, mask(imm, 12), 10, 21)?;
    let word = field(line.number, word, u32::from(rn), 5, 9)?;
    field(line.number, word, u32::from(rd), 0, 4)
}

fn encode_d(line: &SourceLine, word: u32) -> Result<u32, AssemblyError> {
    let [Operand::Register(rt), Operand::Memory { base, offset }] = line.operands[..] else {
        return Err(bad_operands(line, "expected Xt, [Xn, #offset]"));
    };
    check_range(line.number, offset, -256, 255)?;
    let word = field(line.number, word, mask(offset, 9), 12, 20)?;
    let word = field(line.number, word, u32::from(base), 5, 9)?;
    field(line.number, word, u32::from(rt), 0, 4)
}

fn encode_b(
    line: &SourceLine,
    address: u64,
    symbols: &SymbolTable,
    word: u32,
) -> Result<u32, AssemblyError> {
    let [target] = &line.operands[..] else {
        return Err(bad_operands(line, "expected a label or #offset"));
    };
    let offset = branch_offset(line.number, address, target, symbols, 26)?;
    field(line.number, word, mask(offset, 26), 0, 25)
}

fn encode_cb(
    line: &SourceLine,
    definition: &InstructionDefinition,
    address: u64,
    symbols: &SymbolTable,
    word: u32,
) -> Result<u32, AssemblyError> {
    // B.cond: the condition code occupies the register field.
    if let BranchKind::OnCondition(cond) = definition.branch {
        let [target] = &line.operands[..] else {
            return Err(bad_operands(line, "expected a label or #offset"));
        };
        let offset = branch_offset(line.number, address, target, symbols, 19)?;
        let word = field(line.number, word, mask(offset, 19), 5, 23)?;
        return field(line.number, word, u32::from(cond.bits()), 0, 4);
    }

    let [Operand::Register(rt), target] = &line.operands[..] else {
        return Err(bad_operands(line, "expected Xt, label"));
    };
    let offset = branch_offset(line.number, address, target, symbols, 19)?;
    let word = field(line.number, word, mask(offset, 19), 5, 23)?;
    field(line.number, word, u32::from(*rt), 0, 4)
}

fn encode_im(line: &SourceLine, word: u32) -> Result<u32, AssemblyError> {
    let (rd, imm, shift) = match line.operands[..] {
        [Operand::Register(rd), Operand::Immediate(imm)] => (rd, imm, 0),
        [Operand::Register(rd), Operand::Immediate(imm), Operand::Shift { amount }] => {
            (rd, imm, amount)
        }
        _ => return Err(bad_operands(line, "expected Xd, #imm16 [, LSL #shift]")),
    };
    check_range(line.number, imm, 0, 0xFFFF)?;
    if shift % 16 != 0 || shift > 48 {
        return Err(bad_operands(line, "shift must be 0, 16, 32, or 48"));
    }
    let word = field(line.number, word, shift / 16, 21, 22)?;
    let word = field(line.number, word, mask(imm, 16), 5, 20)?;
    field(line.number, word, u32::from(rd), 0, 4)
}

/// Resolves a branch target to a signed instruction-count displacement and
/// checks it against the offset field width.
fn branch_offset(
    number: usize,
    address: u64,
    target: &Operand,
    symbols: &SymbolTable,
    bits: u8,
) -> Result<i64, AssemblyError> {
    let offset = match target {
        Operand::Label(name) => {
            let symbol = symbols.lookup(name).ok_or_else(|| {
                AssemblyError::new(number, AssemblyErrorKind::UndefinedLabel(name.clone()))
            })?;
            #[allow(clippy::cast_possible_wrap)]
            let byte_offset = symbol.address.wrapping_sub(address) as i64;
            if byte_offset % 4 != 0 {
                return Err(AssemblyError::new(
                    number,
                    AssemblyErrorKind::MisalignedBranchTarget {
                        offset: byte_offset,
                    },
                ));
            }
            byte_offset / 4
        }
        Operand::Immediate(count) => *count,
        _ => {
            return Err(AssemblyError::new(
                number,
                AssemblyErrorKind::BadOperands("branch target must be a label or #offset".into()),
            ))
        }
    };
    let bound = 1i64 << (bits - 1);
    if offset < -bound || offset >= bound {
        return Err(AssemblyError::new(
            number,
            AssemblyErrorKind::OffsetOutOfRange { offset, bits },
        ));
    }
    Ok(offset)
}

fn check_range(number: usize, value: i64, min: i64, max: i64) -> Result<(), AssemblyError> {
    if value < min || value > max {
        return Err(AssemblyError::new(
            number,
            AssemblyErrorKind::ImmediateOutOfRange { value, min, max },
        ));
    }
    Ok(())
}

/// Truncates a signed value to its low `bits` bits.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn mask(value: i64, bits: u8) -> u32 {
    (value as u64 as u32) & ((1u32 << bits) - 1)
}

fn field(number: usize, word: u32, value: u32, lo: u8, hi: u8) -> Result<u32, AssemblyError> {
    set_bits(word, value, lo, hi)
        .map_err(|e| AssemblyError::new(number, AssemblyErrorKind::Encode(e)))
}

fn bad_operands(line: &SourceLine, expected: &str) -> AssemblyError {
    AssemblyError::new(
        line.number,
        AssemblyErrorKind::BadOperands(expected.to_owned()),
    )
}
