//! Helpers for extracting data from opcodes.
use crate::constants::*;

/// A single decoded instruction word.
///
/// Every field is derived from the 16-bit opcode, so the
/// struct is recomputed on each cycle and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Raw instruction word.
    pub opcode: u16,
    /// Operand NNN, a 12-bit address.
    pub nnn: Address,
    /// Operand NN, an 8-bit constant.
    pub nn: u8,
    /// Operand N, a 4-bit constant.
    pub n: u8,
    /// Register operand X.
    pub x: u8,
    /// Register operand Y.
    pub y: u8,
}

impl Instruction {
    #[inline(always)]
    pub fn decode(opcode: u16) -> Self {
        Self {
            opcode,
            nnn: opcode & 0x0FFF,
            nn: (opcode & 0x00FF) as u8,
            n: (opcode & 0x000F) as u8,
            x: ((opcode >> 8) & 0xF) as u8,
            y: ((opcode >> 4) & 0xF) as u8,
        }
    }

    /// Build an instruction from the two big-endian bytes in memory.
    #[inline(always)]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self::decode(u16::from_be_bytes(bytes))
    }

    /// Instruction class, identified by the upper nibble.
    #[inline(always)]
    pub fn op(&self) -> u8 {
        ((self.opcode >> 12) & 0xF) as u8
    }
}

impl From<u16> for Instruction {
    fn from(opcode: u16) -> Self {
        Self::decode(opcode)
    }
}

/// Extract the instruction word from the buffer at the cursor.
///
/// Returns `None` when the word would straddle the end of the buffer.
#[inline(always)]
pub fn op_word(bytecode: &[u8], cursor: usize) -> Option<u16> {
    match bytecode.get(cursor..cursor + 2) {
        Some(&[a, b]) => Some(u16::from_be_bytes([a, b])),
        _ => None,
    }
}
