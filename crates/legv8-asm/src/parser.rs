//! Assembly source line parser.
//!
//! Converts raw text lines into structured [`SourceLine`] items ready for
//! symbol table construction and encoding. The parser knows nothing about
//! formats or opcodes; it only tokenizes labels, mnemonics, and operands.

use crate::errors::{AssemblyError, AssemblyErrorKind};

/// A parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Register direct (`X5`, `SP`, `XZR`).
    Register(u8),
    /// Immediate value (`#10`, `#-0x20`).
    Immediate(i64),
    /// Base-plus-offset memory reference (`[SP, #8]`, `[X2]`).
    Memory {
        /// Base address register.
        base: u8,
        /// Signed byte offset, zero when omitted.
        offset: i64,
    },
    /// Label reference, resolved against the symbol table in pass 2.
    Label(String),
    /// Halfword lane shift suffix on wide moves (`LSL #16`).
    Shift {
        /// Shift amount in bits; must be a multiple of 16.
        amount: u32,
    },
}

/// One parsed source line. A line may carry a label, an instruction, both,
/// or neither (blank or comment-only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-indexed source line number.
    pub number: usize,
    /// Label defined on this line, if any.
    pub label: Option<String>,
    /// Upper-cased mnemonic, if the line holds an instruction.
    pub mnemonic: Option<String>,
    /// Parsed operands, in source order.
    pub operands: Vec<Operand>,
}

impl SourceLine {
    /// Whether this line holds an instruction.
    #[must_use]
    pub const fn is_instruction(&self) -> bool {
        self.mnemonic.is_some()
    }
}

/// Parses one source line.
///
/// Comments start at `//` or `;` and run to end of line.
///
/// # Errors
///
/// Returns an [`AssemblyError`] pinned to `number` for malformed labels,
/// registers, immediates, or memory references.
pub fn parse_line(number: usize, text: &str) -> Result<SourceLine, AssemblyError> {
    let code = strip_comment(text).trim();

    let (label, rest) = match code.find(':') {
        Some(pos) => {
            let name = code[..pos].trim();
            if !is_valid_label(name) {
                return Err(AssemblyError::new(
                    number,
                    AssemblyErrorKind::InvalidLabelName(name.to_owned()),
                ));
            }
            (Some(name.to_owned()), code[pos + 1..].trim())
        }
        None => (None, code),
    };

    if rest.is_empty() {
        return Ok(SourceLine {
            number,
            label,
            mnemonic: None,
            operands: Vec::new(),
        });
    }

    let (mnemonic, operand_text) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };
    let mnemonic = mnemonic.to_uppercase();

    let mut operands = Vec::new();
    for token in split_operands(operand_text) {
        operands.push(parse_operand(number, token)?);
    }

    Ok(SourceLine {
        number,
        label,
        mnemonic: Some(mnemonic),
        operands,
    })
}

fn strip_comment(text: &str) -> &str {
    let end = text
        .find("//")
        .into_iter()
        .chain(text.find(';'))
        .min()
        .unwrap_or(text.len());
    &text[..end]
}

/// Splits an operand list on commas, keeping bracketed memory references
/// intact.
fn split_operands(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                tokens.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        tokens.push(tail);
    }
    tokens.retain(|t| !t.is_empty());
    tokens
}

fn parse_operand(number: usize, token: &str) -> Result<Operand, AssemblyError> {
    if let Some(inner) = token.strip_prefix('[') {
        let Some(inner) = inner.strip_suffix(']') else {
            return Err(AssemblyError::new(
                number,
                AssemblyErrorKind::Syntax(format!("unterminated memory reference '{token}'")),
            ));
        };
        let mut parts = inner.splitn(2, ',');
        let base_text = parts.next().unwrap_or("").trim();
        let base = parse_register(number, base_text)?;
        let offset = match parts.next() {
            Some(offset_text) => parse_immediate(number, offset_text.trim())?,
            None => 0,
        };
        return Ok(Operand::Memory { base, offset });
    }

    if token.starts_with('#') {
        return parse_immediate(number, token).map(Operand::Immediate);
    }

    let upper = token.to_uppercase();
    if let Some(rest) = upper.strip_prefix("LSL") {
        let rest = rest.trim();
        if rest.starts_with('#') {
            let amount = parse_immediate(number, rest)?;
            let amount = u32::try_from(amount).map_err(|_| {
                AssemblyError::new(
                    number,
                    AssemblyErrorKind::InvalidImmediate(token.to_owned()),
                )
            })?;
            return Ok(Operand::Shift { amount });
        }
    }

    if let Ok(register) = parse_register(number, token) {
        return Ok(Operand::Register(register));
    }

    if is_valid_label(token) {
        return Ok(Operand::Label(token.to_owned()));
    }

    Err(AssemblyError::new(
        number,
        AssemblyErrorKind::Syntax(format!("unrecognized operand '{token}'")),
    ))
}

/// Parses a register name: `X0`-`X30`, `SP`, `FP`, `LR`, or `XZR`, case
/// insensitively.
fn parse_register(number: usize, token: &str) -> Result<u8, AssemblyError> {
    let invalid = || {
        AssemblyError::new(
            number,
            AssemblyErrorKind::InvalidRegister(token.to_owned()),
        )
    };
    let upper = token.to_uppercase();
    match upper.as_str() {
        "SP" => return Ok(28),
        "FP" => return Ok(29),
        "LR" => return Ok(30),
        "XZR" => return Ok(31),
        _ => {}
    }
    let index = upper
        .strip_prefix('X')
        .ok_or_else(invalid)?
        .parse::<u8>()
        .map_err(|_| invalid())?;
    if index <= 30 {
        Ok(index)
    } else {
        Err(invalid())
    }
}

/// Parses a `#`-prefixed immediate: decimal or `0x` hex, optionally
/// negative.
fn parse_immediate(number: usize, token: &str) -> Result<i64, AssemblyError> {
    let invalid = || {
        AssemblyError::new(
            number,
            AssemblyErrorKind::InvalidImmediate(token.to_owned()),
        )
    };
    let body = token.strip_prefix('#').ok_or_else(invalid)?;
    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).map_err(|_| invalid())?
    } else {
        digits.parse::<i64>().map_err(|_| invalid())?
    };
    Ok(if negative { -magnitude } else { magnitude })
}

/// A label is an identifier: leading alphabetic or underscore, then
/// alphanumerics and underscores.
fn is_valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
