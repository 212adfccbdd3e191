//! Structured error reporting for the assembler.
//!
//! Individual line failures are collected rather than aborting at the
//! first one, so a source file with three bad lines reports all three.
//! Errors format in the conventional style:
//! ```text
//! line 12: unknown mnemonic 'FOO'
//! ```

use std::fmt;

use legv8_core::CoreError;
use thiserror::Error;

/// Classification of per-line assembly failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyErrorKind {
    /// The line could not be tokenized.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// The mnemonic is not in the definition table.
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),
    /// The operand list does not match the mnemonic's format.
    #[error("bad operands: {0}")]
    BadOperands(String),
    /// A register name was not `X0`-`X30`, `SP`, `FP`, `LR`, or `XZR`.
    #[error("invalid register '{0}'")]
    InvalidRegister(String),
    /// An immediate token could not be parsed as a number.
    #[error("invalid immediate '{0}'")]
    InvalidImmediate(String),
    /// An immediate parsed but does not fit its field.
    #[error("immediate {value} out of range {min}..={max}")]
    ImmediateOutOfRange {
        /// The rejected value.
        value: i64,
        /// Smallest encodable value.
        min: i64,
        /// Largest encodable value.
        max: i64,
    },
    /// A branch displacement does not fit its offset field.
    #[error("branch offset {offset} does not fit in {bits} bits")]
    OffsetOutOfRange {
        /// The rejected offset, in instructions.
        offset: i64,
        /// Width of the offset field.
        bits: u8,
    },
    /// A branch target is not a whole number of instructions away.
    #[error("branch target {offset} bytes away is not word-aligned")]
    MisalignedBranchTarget {
        /// The rejected displacement, in bytes.
        offset: i64,
    },
    /// A branch referenced a label no line defines.
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),
    /// A label was defined twice.
    #[error("duplicate label '{name}' (first defined on line {first_line})")]
    DuplicateLabel {
        /// The label name.
        name: String,
        /// Line of the first definition.
        first_line: usize,
    },
    /// A label name failed validation.
    #[error("invalid label name '{0}'")]
    InvalidLabelName(String),
    /// Bit-level encoding failed.
    #[error("encoding failed: {0}")]
    Encode(#[from] CoreError),
}

/// One failure, pinned to its 1-indexed source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
    /// 1-indexed source line number.
    pub line: usize,
    /// What went wrong.
    pub kind: AssemblyErrorKind,
}

impl AssemblyError {
    /// Creates an error pinned to `line`.
    #[must_use]
    pub const fn new(line: usize, kind: AssemblyErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Every failure found across both assembler passes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssemblyFailure {
    /// The collected errors, in source order.
    pub errors: Vec<AssemblyError>,
}

impl AssemblyFailure {
    /// Number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no errors were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AssemblyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AssemblyFailure {}

impl FromIterator<AssemblyError> for AssemblyFailure {
    fn from_iter<T: IntoIterator<Item = AssemblyError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AssemblyError, AssemblyErrorKind, AssemblyFailure};

    #[test]
    fn error_formats_with_line_number() {
        let error = AssemblyError::new(12, AssemblyErrorKind::UnknownMnemonic("FOO".into()));
        assert_eq!(error.to_string(), "line 12: unknown mnemonic 'FOO'");
    }

    #[test]
    fn failure_formats_one_error_per_line() {
        let failure: AssemblyFailure = vec![
            AssemblyError::new(1, AssemblyErrorKind::InvalidRegister("X99".into())),
            AssemblyError::new(
                3,
                AssemblyErrorKind::ImmediateOutOfRange {
                    value: 5000,
                    min: -2048,
                    max: 2047,
                },
            ),
        ]
        .into_iter()
        .collect();
        let text = failure.to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("line 1: invalid register 'X99'"));
        assert!(text.contains("line 3: immediate 5000 out of range -2048..=2047"));
    }
}
