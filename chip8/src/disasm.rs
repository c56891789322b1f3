//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{bytecode::*, constants::*};

/// Writes a program listing, one line per instruction word.
///
/// ```text
/// 0200: 6000  LD V0, 0x00
/// 0202: A222  LD I, 0x222
/// ```
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
    origin: Address,
}

impl<'a> Disassembler<'a> {
    /// Listing for a program loaded at the usual start address.
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self::with_origin(bytecode, MEM_START as Address)
    }

    pub fn with_origin(bytecode: &'a [u8], origin: Address) -> Self {
        Self { bytecode, origin }
    }

    /// Write the whole listing to the given writer.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        let mut cursor = 0;

        while let Some(word) = op_word(self.bytecode, cursor) {
            let address = self.address(cursor);
            writeln!(w, "{address:04X}: {word:04X}  {}", Mnemonic::from(word))?;
            cursor += 2;
        }

        // Programs may end with data of odd length.
        if let Some(byte) = self.bytecode.get(cursor) {
            let address = self.address(cursor);
            writeln!(w, "{address:04X}: {byte:02X}    DB 0x{byte:02X}")?;
        }

        Ok(())
    }

    #[inline]
    fn address(&self, cursor: usize) -> Address {
        self.origin.wrapping_add(cursor as Address)
    }
}

impl<'a> fmt::Display for Disassembler<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.disassemble(f)
    }
}

/// Assembly text of a single instruction.
///
/// Words that the interpreter would reject are written as `DW` data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mnemonic(pub Instruction);

impl From<u16> for Mnemonic {
    fn from(opcode: u16) -> Self {
        Mnemonic(Instruction::decode(opcode))
    }
}

impl fmt::Display for Mnemonic {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Instruction { opcode, nnn, nn, n, x, y } = self.0;

        match (self.0.op(), x, nn, n) {
            (0x0, 0x0, 0xE0, _) => write!(f, "CLS"),
            (0x0, 0x0, 0xEE, _) => write!(f, "RET"),
            (0x1, _, _, _)      => write!(f, "JP 0x{nnn:03X}"),
            (0x2, _, _, _)      => write!(f, "CALL 0x{nnn:03X}"),
            (0x3, _, _, _)      => write!(f, "SE V{x:X}, 0x{nn:02X}"),
            (0x4, _, _, _)      => write!(f, "SNE V{x:X}, 0x{nn:02X}"),
            (0x5, _, _, 0x0)    => write!(f, "SE V{x:X}, V{y:X}"),
            (0x6, _, _, _)      => write!(f, "LD V{x:X}, 0x{nn:02X}"),
            (0x7, _, _, _)      => write!(f, "ADD V{x:X}, 0x{nn:02X}"),
            (0x8, _, _, 0x0)    => write!(f, "LD V{x:X}, V{y:X}"),
            (0x8, _, _, 0x1)    => write!(f, "OR V{x:X}, V{y:X}"),
            (0x8, _, _, 0x2)    => write!(f, "AND V{x:X}, V{y:X}"),
            (0x8, _, _, 0x3)    => write!(f, "XOR V{x:X}, V{y:X}"),
            (0x8, _, _, 0x4)    => write!(f, "ADD V{x:X}, V{y:X}"),
            (0x8, _, _, 0x5)    => write!(f, "SUB V{x:X}, V{y:X}"),
            (0x8, _, _, 0x6)    => write!(f, "SHR V{x:X}, V{y:X}"),
            (0x8, _, _, 0x7)    => write!(f, "SUBN V{x:X}, V{y:X}"),
            (0x8, _, _, 0xE)    => write!(f, "SHL V{x:X}, V{y:X}"),
            (0x9, _, _, 0x0)    => write!(f, "SNE V{x:X}, V{y:X}"),
            (0xA, _, _, _)      => write!(f, "LD I, 0x{nnn:03X}"),
            (0xB, _, _, _)      => write!(f, "JP V0, 0x{nnn:03X}"),
            (0xC, _, _, _)      => write!(f, "RND V{x:X}, 0x{nn:02X}"),
            (0xD, _, _, _)      => write!(f, "DRW V{x:X}, V{y:X}, {n}"),
            (0xE, _, 0x9E, _)   => write!(f, "SKP V{x:X}"),
            (0xE, _, 0xA1, _)   => write!(f, "SKNP V{x:X}"),
            (0xF, _, 0x07, _)   => write!(f, "LD V{x:X}, DT"),
            (0xF, _, 0x0A, _)   => write!(f, "LD V{x:X}, K"),
            (0xF, _, 0x15, _)   => write!(f, "LD DT, V{x:X}"),
            (0xF, _, 0x18, _)   => write!(f, "LD ST, V{x:X}"),
            (0xF, _, 0x1E, _)   => write!(f, "ADD I, V{x:X}"),
            (0xF, _, 0x29, _)   => write!(f, "LD F, V{x:X}"),
            (0xF, _, 0x33, _)   => write!(f, "LD B, V{x:X}"),
            (0xF, _, 0x55, _)   => write!(f, "LD [I], V{x:X}"),
            (0xF, _, 0x65, _)   => write!(f, "LD V{x:X}, [I]"),
            _                   => write!(f, "DW 0x{opcode:04X}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mnemonic(opcode: u16) -> String {
        Mnemonic::from(opcode).to_string()
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(mnemonic(0x00E0), "CLS");
        assert_eq!(mnemonic(0x00EE), "RET");
        assert_eq!(mnemonic(0x1204), "JP 0x204");
        assert_eq!(mnemonic(0x2ABC), "CALL 0xABC");
        assert_eq!(mnemonic(0x3142), "SE V1, 0x42");
        assert_eq!(mnemonic(0x5AB0), "SE VA, VB");
        assert_eq!(mnemonic(0x8016), "SHR V0, V1");
        assert_eq!(mnemonic(0x801E), "SHL V0, V1");
        assert_eq!(mnemonic(0xB300), "JP V0, 0x300");
        assert_eq!(mnemonic(0xC20F), "RND V2, 0x0F");
        assert_eq!(mnemonic(0xD014), "DRW V0, V1, 4");
        assert_eq!(mnemonic(0xE59E), "SKP V5");
        assert_eq!(mnemonic(0xF30A), "LD V3, K");
        assert_eq!(mnemonic(0xF155), "LD [I], V1");
        assert_eq!(mnemonic(0xF165), "LD V1, [I]");
    }

    #[test]
    fn test_rejected_words() {
        for opcode in [0x0000, 0x0123, 0x01E0, 0x5121, 0x8018, 0x801F, 0x9011, 0xE000, 0xF0FF] {
            assert_eq!(mnemonic(opcode), format!("DW 0x{opcode:04X}"));
        }
    }

    #[test]
    fn test_listing() {
        let listing = Disassembler::new(&[0x60, 0x00, 0xA2, 0x22, 0x80]).to_string();
        let lines: Vec<&str> = listing.lines().collect();

        assert_eq!(
            lines,
            [
                "0200: 6000  LD V0, 0x00",
                "0202: A222  LD I, 0x222",
                "0204: 80    DB 0x80",
            ]
        );
    }

    #[test]
    fn test_listing_origin() {
        let mut buf = String::new();
        Disassembler::with_origin(&[0x00, 0xE0], 0x300)
            .disassemble(&mut buf)
            .unwrap();
        assert_eq!(buf, "0300: 00E0  CLS\n");

        assert_eq!(Disassembler::new(&[]).to_string(), "");
    }
}
