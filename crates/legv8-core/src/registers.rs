//! Architectural register file.

/// Stack pointer register index.
pub const SP: u8 = 28;
/// Frame pointer register index.
pub const FP: u8 = 29;
/// Link register index.
pub const LR: u8 = 30;
/// The hardwired zero register index. Writes to it are discarded.
pub const XZR: u8 = 31;

/// Thirty-two 64-bit general-purpose registers, with `X31` hardwired to
/// zero. Values are held signed to match the ALU's native width.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    regs: [i64; 32],
}

impl RegisterFile {
    /// Creates a register file with every register zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { regs: [0; 32] }
    }

    /// Zeroes every register and points `SP` at the given stack top.
    #[allow(clippy::cast_possible_wrap)]
    pub fn reset(&mut self, stack_top: u64) {
        self.regs = [0; 32];
        self.regs[usize::from(SP)] = stack_top as i64;
    }

    /// Reads a register. `XZR` always reads zero.
    #[must_use]
    pub const fn read(&self, index: u8) -> i64 {
        if index == XZR {
            0
        } else {
            self.regs[index as usize]
        }
    }

    /// Writes a register through the write-enable gate. Writes with the
    /// gate low, and any write to `XZR`, are discarded.
    pub fn write(&mut self, index: u8, value: i64, enable: bool) {
        if enable && index != XZR {
            self.regs[index as usize] = value;
        }
    }

    /// Snapshot of all 32 registers, `XZR` included as zero.
    #[must_use]
    pub const fn snapshot(&self) -> [i64; 32] {
        self.regs
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterFile, SP, XZR};

    #[test]
    fn zero_register_ignores_writes() {
        let mut file = RegisterFile::new();
        file.write(XZR, 42, true);
        assert_eq!(file.read(XZR), 0);
        assert_eq!(file.snapshot()[usize::from(XZR)], 0);
    }

    #[test]
    fn write_enable_gates_the_port() {
        let mut file = RegisterFile::new();
        file.write(3, 99, false);
        assert_eq!(file.read(3), 0);
        file.write(3, 99, true);
        assert_eq!(file.read(3), 99);
    }

    #[test]
    fn reset_zeroes_and_seeds_the_stack_pointer() {
        let mut file = RegisterFile::new();
        file.write(1, 7, true);
        file.reset(0x7FFF_FF00);
        assert_eq!(file.read(1), 0);
        assert_eq!(file.read(SP), 0x7FFF_FF00);
    }
}
