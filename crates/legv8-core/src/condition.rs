//! Condition-code table shared by `B.cond` mnemonic synthesis and branch
//! evaluation.

use crate::alu::Flags;

/// The fourteen architectural condition codes, in 4-bit encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Condition {
    Eq = 0b0000,
    Ne = 0b0001,
    Hs = 0b0010,
    Lo = 0b0011,
    Mi = 0b0100,
    Pl = 0b0101,
    Vs = 0b0110,
    Vc = 0b0111,
    Hi = 0b1000,
    Ls = 0b1001,
    Ge = 0b1010,
    Lt = 0b1011,
    Gt = 0b1100,
    Le = 0b1101,
}

impl Condition {
    /// Ordered list of every defined condition code.
    pub const ALL: [Self; 14] = [
        Self::Eq,
        Self::Ne,
        Self::Hs,
        Self::Lo,
        Self::Mi,
        Self::Pl,
        Self::Vs,
        Self::Vc,
        Self::Hi,
        Self::Ls,
        Self::Ge,
        Self::Lt,
        Self::Gt,
        Self::Le,
    ];

    /// Decodes a 4-bit condition field. Codes `0b1110` and `0b1111` are
    /// unassigned.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b0000 => Some(Self::Eq),
            0b0001 => Some(Self::Ne),
            0b0010 => Some(Self::Hs),
            0b0011 => Some(Self::Lo),
            0b0100 => Some(Self::Mi),
            0b0101 => Some(Self::Pl),
            0b0110 => Some(Self::Vs),
            0b0111 => Some(Self::Vc),
            0b1000 => Some(Self::Hi),
            0b1001 => Some(Self::Ls),
            0b1010 => Some(Self::Ge),
            0b1011 => Some(Self::Lt),
            0b1100 => Some(Self::Gt),
            0b1101 => Some(Self::Le),
            _ => None,
        }
    }

    /// Returns the 4-bit encoding of this condition.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Returns the mnemonic suffix (`"EQ"` for `B.EQ`, and so on).
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Hs => "HS",
            Self::Lo => "LO",
            Self::Mi => "MI",
            Self::Pl => "PL",
            Self::Vs => "VS",
            Self::Vc => "VC",
            Self::Hi => "HI",
            Self::Ls => "LS",
            Self::Ge => "GE",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Le => "LE",
        }
    }

    /// Evaluates this condition against a set of NZCV flags.
    #[must_use]
    pub const fn holds(self, flags: Flags) -> bool {
        match self {
            Self::Eq => flags.zero,
            Self::Ne => !flags.zero,
            Self::Hs => flags.carry,
            Self::Lo => !flags.carry,
            Self::Mi => flags.negative,
            Self::Pl => !flags.negative,
            Self::Vs => flags.overflow,
            Self::Vc => !flags.overflow,
            Self::Hi => flags.carry && !flags.zero,
            Self::Ls => !flags.carry || flags.zero,
            Self::Ge => flags.negative == flags.overflow,
            Self::Lt => flags.negative != flags.overflow,
            Self::Gt => !flags.zero && flags.negative == flags.overflow,
            Self::Le => flags.zero || flags.negative != flags.overflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Condition;
    use crate::alu::Flags;
    use rstest::rstest;

    const fn flags(negative: bool, zero: bool, carry: bool, overflow: bool) -> Flags {
        Flags {
            negative,
            zero,
            carry,
            overflow,
        }
    }

    #[test]
    fn bits_roundtrip_for_all_defined_codes() {
        for cond in Condition::ALL {
            assert_eq!(Condition::from_bits(cond.bits()), Some(cond));
        }
        assert_eq!(Condition::from_bits(0b1110), None);
        assert_eq!(Condition::from_bits(0b1111), None);
    }

    #[rstest]
    #[case(Condition::Eq, flags(false, true, false, false), true)]
    #[case(Condition::Eq, flags(false, false, false, false), false)]
    #[case(Condition::Ne, flags(false, false, false, false), true)]
    #[case(Condition::Hs, flags(false, false, true, false), true)]
    #[case(Condition::Lo, flags(false, false, true, false), false)]
    #[case(Condition::Mi, flags(true, false, false, false), true)]
    #[case(Condition::Pl, flags(true, false, false, false), false)]
    #[case(Condition::Vs, flags(false, false, false, true), true)]
    #[case(Condition::Vc, flags(false, false, false, true), false)]
    #[case(Condition::Hi, flags(false, false, true, false), true)]
    #[case(Condition::Hi, flags(false, true, true, false), false)]
    #[case(Condition::Ls, flags(false, true, true, false), true)]
    #[case(Condition::Ge, flags(true, false, false, true), true)]
    #[case(Condition::Ge, flags(true, false, false, false), false)]
    #[case(Condition::Lt, flags(true, false, false, false), true)]
    #[case(Condition::Gt, flags(false, false, false, false), true)]
    #[case(Condition::Gt, flags(false, true, false, false), false)]
    #[case(Condition::Le, flags(false, true, false, false), true)]
    fn condition_evaluation_matches_table(
        #[case] cond: Condition,
        #[case] flags: Flags,
        #[case] expected: bool,
    ) {
        assert_eq!(cond.holds(flags), expected);
    }

    #[test]
    fn suffixes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for cond in Condition::ALL {
            assert!(seen.insert(cond.suffix()));
        }
    }
}
