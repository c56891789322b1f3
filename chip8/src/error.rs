//! Result and errors.
use std::{
    fmt::{self, Display, Formatter},
    io,
};

use crate::constants::MAX_PROGRAM_SIZE;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    RomTooLarge(usize),
    /// Program bytes could not be read from their source.
    RomLoadFailed(io::Error),
    /// Key index outside of the hexadecimal keypad.
    InvalidKeyIndex(u8),
    /// VM fault during the interpreter loop. The machine is halted.
    Runtime(Fault),
    Fmt(fmt::Error),
}

/// Fatal error raised by the instruction engine.
///
/// A machine that faults is halted, and keeps the fault as the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The instruction word at the program counter does not decode.
    UnknownOpcode(u16),
    /// The program counter points outside of memory at fetch time.
    MemoryOutOfBounds(u16),
    /// Subroutine call while the call stack is full.
    StackOverflow,
    /// Subroutine return while the call stack is empty.
    StackUnderflow,
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomTooLarge(size) => write!(
                f,
                "program of {size} bytes too large for VM memory, maximum is {MAX_PROGRAM_SIZE}"
            ),
            Self::RomLoadFailed(err) => write!(f, "failed to load program: {err}"),
            Self::InvalidKeyIndex(key) => {
                write!(f, "invalid key index {key}, must be in range 0 <= key < 16")
            }
            Self::Runtime(fault) => write!(f, "runtime error: {fault}"),
            Self::Fmt(err) => write!(f, "{err}"),
        }
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode(opcode) => write!(f, "unknown opcode {opcode:04X}"),
            Self::MemoryOutOfBounds(pc) => {
                write!(f, "instruction fetch out of bounds at {pc:04X}")
            }
            Self::StackOverflow => write!(f, "call stack overflow"),
            Self::StackUnderflow => write!(f, "call stack underflow"),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RomLoadFailed(err) => Some(err),
            Self::Fmt(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for Fault {}

impl From<Fault> for Chip8Error {
    fn from(fault: Fault) -> Self {
        Chip8Error::Runtime(fault)
    }
}

impl From<io::Error> for Chip8Error {
    fn from(err: io::Error) -> Self {
        Chip8Error::RomLoadFailed(err)
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}
