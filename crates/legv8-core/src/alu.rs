//! Arithmetic logic unit and NZCV flag semantics.
//!
//! [`execute`] is a pure function over two 64-bit operands; it never touches
//! architectural state. Flag commitment is the engine's decision
//! (`flagWrite` gated), not the ALU's.

/// The NZCV condition flags produced by a flag-setting ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Flags {
    /// Negative: the result, interpreted as signed, is below zero.
    pub negative: bool,
    /// Zero: the result is exactly zero.
    pub zero: bool,
    /// Carry: unsigned overflow on ADD, no-borrow on SUB, last bit shifted
    /// out on a non-zero shift.
    pub carry: bool,
    /// Overflow: signed overflow on ADD/SUB.
    pub overflow: bool,
}

impl Flags {
    /// All four flags cleared.
    pub const CLEAR: Self = Self {
        negative: false,
        zero: false,
        carry: false,
        overflow: false,
    };

    /// Packs the flags into a 4-bit `NZCV` value (N in bit 3).
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn bits(self) -> u64 {
        (self.negative as u64) << 3
            | (self.zero as u64) << 2
            | (self.carry as u64) << 1
            | self.overflow as u64
    }
}

/// Concrete ALU operation selected by an instruction definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Orr,
    Eor,
    Lsl,
    Lsr,
    Asr,
    Mul,
    Smulh,
    Umulh,
    Sdiv,
    Udiv,
    /// Pass operand B through unchanged (move-immediate and zero-test paths).
    PassB,
    /// No ALU work; result is 0 with only Z set.
    Idle,
}

/// Result of one ALU invocation. Produced fresh per call, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AluResult {
    /// The 64-bit result value.
    pub value: i64,
    /// Flags derived from the operation.
    pub flags: Flags,
}

/// Executes `op` over `a` and `b`, returning the result and fresh flags.
#[must_use]
#[allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation
)]
pub fn execute(a: i64, b: i64, op: AluOp) -> AluResult {
    match op {
        AluOp::Add => {
            let value = a.wrapping_add(b);
            AluResult {
                value,
                flags: Flags {
                    negative: value < 0,
                    zero: value == 0,
                    carry: (value as u64) < (a as u64),
                    overflow: (a < 0) == (b < 0) && (value < 0) != (a < 0),
                },
            }
        }
        AluOp::Sub => {
            let value = a.wrapping_sub(b);
            AluResult {
                value,
                flags: Flags {
                    negative: value < 0,
                    zero: value == 0,
                    carry: (a as u64) >= (b as u64),
                    overflow: (a < 0) != (b < 0) && (value < 0) != (a < 0),
                },
            }
        }
        AluOp::And => logical(a & b),
        AluOp::Orr => logical(a | b),
        AluOp::Eor => logical(a ^ b),
        AluOp::Lsl => {
            let amount = (b as u64) & 0x3F;
            let value = ((a as u64) << amount) as i64;
            AluResult {
                value,
                flags: Flags {
                    negative: value < 0,
                    zero: value == 0,
                    carry: amount != 0 && (a as u64) >> (64 - amount) & 1 == 1,
                    overflow: false,
                },
            }
        }
        AluOp::Lsr => {
            let amount = (b as u64) & 0x3F;
            let value = ((a as u64) >> amount) as i64;
            AluResult {
                value,
                flags: Flags {
                    // A logical right shift never produces a negative in the
                    // flag sense.
                    negative: false,
                    zero: value == 0,
                    carry: amount != 0 && (a as u64) >> (amount - 1) & 1 == 1,
                    overflow: false,
                },
            }
        }
        AluOp::Asr => {
            let amount = (b as u64) & 0x3F;
            let value = a >> amount;
            AluResult {
                value,
                flags: Flags {
                    negative: value < 0,
                    zero: value == 0,
                    carry: amount != 0 && (a as u64) >> (amount - 1) & 1 == 1,
                    overflow: false,
                },
            }
        }
        AluOp::Mul => plain(a.wrapping_mul(b)),
        AluOp::Smulh => plain(((i128::from(a) * i128::from(b)) >> 64) as i64),
        AluOp::Umulh => {
            let product = u128::from(a as u64) * u128::from(b as u64);
            plain((product >> 64) as u64 as i64)
        }
        AluOp::Sdiv => plain(if b == 0 { 0 } else { a.wrapping_div(b) }),
        AluOp::Udiv => plain(if b == 0 {
            0
        } else {
            ((a as u64) / (b as u64)) as i64
        }),
        AluOp::PassB => plain(b),
        AluOp::Idle => AluResult {
            value: 0,
            flags: Flags {
                negative: false,
                zero: true,
                carry: false,
                overflow: false,
            },
        },
    }
}

/// Bitwise result: N and Z from the value, C and V cleared.
const fn logical(value: i64) -> AluResult {
    AluResult {
        value,
        flags: Flags {
            negative: value < 0,
            zero: value == 0,
            carry: false,
            overflow: false,
        },
    }
}

/// Multiply/divide/pass result: N and Z from the value, C and V cleared.
const fn plain(value: i64) -> AluResult {
    logical(value)
}
