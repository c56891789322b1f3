mod bytecode;
mod clock;
pub mod constants;
mod cpu;
pub mod devices;
mod disasm;
mod driver;
mod error;
mod interp;
mod state;
mod vm;

pub use self::{
    bytecode::Instruction,
    clock::Clock,
    disasm::Mnemonic,
    error::Fault,
    state::{Event, MachineState},
    vm::{Flow, Hz, Quirks},
};

/// Version of the interpreter implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        cpu::Chip8Cpu,
        devices::{Devices, Input, KeyCode},
        disasm::Disassembler,
        driver::Driver,
        error::{Chip8Error, Chip8Result, Fault},
        interp::Interpreter,
        state::MachineState,
        vm::{Chip8Conf, Chip8Vm, Flow, Hz, Quirks},
    };
}
