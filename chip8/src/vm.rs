//! Virtual machine.
use std::{
    fmt::{self, Write},
    fs,
    path::Path,
    time::Duration,
};

#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::{
    constants::*,
    cpu::Chip8Cpu,
    devices::KeyCode,
    error::Chip8Result,
    interp::Interpreter,
    state::{Event, MachineState},
};

/// A CHIP-8 machine: state, instruction engine and run state.
pub struct Chip8Vm {
    cpu: Chip8Cpu,
    interp: Interpreter,
    state: MachineState,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        Chip8Vm {
            cpu: Chip8Cpu::new(),
            interp: Interpreter::new(conf.quirks, conf.seed),
            state: MachineState::Running,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Load a program and prepare the machine to run it.
    ///
    /// On error the previous machine state is left untouched.
    pub fn load(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        self.cpu.load(bytecode)?;
        self.state = MachineState::Running;
        Ok(())
    }

    /// Read a program file and load it.
    pub fn load_file(&mut self, filepath: impl AsRef<Path>) -> Chip8Result<()> {
        let bytecode = fs::read(filepath)?;
        self.load(&bytecode)
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Read access to the machine registers and memory.
    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    pub fn framebuffer_snapshot(&self) -> &DisplayBuffer {
        self.cpu.framebuffer_snapshot()
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer()
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer()
    }

    pub fn is_sound_on(&self) -> bool {
        self.cpu.is_sound_on()
    }
}

/// Hint returned by the interpreter about what a cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// The driver was asked to stop.
    Interrupt,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The display buffer changed.
    Draw,
    /// The sound timer was set.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
    /// Nothing executed because the machine is paused.
    Paused,
    /// Nothing executed because the machine has halted.
    Halted,
}

/// VM Configuration Parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct Chip8Conf {
    /// Speed of the CPU instruction clock.
    pub clock_frequency: Hz,
    pub quirks: Quirks,
    /// Seed for the random number generator used by `Cxnn`.
    ///
    /// When `None` the generator is seeded from the operating system.
    pub seed: Option<u64>,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            clock_frequency: Hz(DEFAULT_CLOCK_FREQUENCY),
            quirks: Quirks::default(),
            seed: None,
        }
    }
}

/// Behaviours that differ between CHIP-8 implementations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct Quirks {
    /// `8xy6` and `8xyE` shift Vy and store the result in Vx,
    /// as the COSMAC VIP interpreter did. When false, Vx is
    /// shifted in place and Vy is ignored.
    pub shift_reads_vy: bool,
}

/// Clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(transparent))]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, index: u8, pressed: bool) -> Chip8Result<()> {
        self.cpu.set_key(index, pressed)
    }

    pub fn set_key_state(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key, pressed)
    }

    /// Replace the state of the whole keypad.
    pub fn set_keys(&mut self, keys: &[bool; KEY_COUNT as usize]) {
        self.cpu.key_state = keys
            .iter()
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .fold(0, |state, (key_id, _)| state | 1 << key_id);
    }

    /// Count down the delay and sound timers. Call at 60 Hz.
    pub fn tick_timers(&mut self) {
        self.cpu.tick_timers()
    }

    /// Switch between running and paused.
    ///
    /// Pausing a machine that waits for a key returns it to
    /// waiting once resumed. A halted machine stays halted.
    pub fn toggle_pause(&mut self) {
        let awaiting_key = self.cpu.key_wait.is_some();
        self.state = self.state.transition(Event::TogglePause { awaiting_key });
    }

    /// Execute a single fetch-decode-execute cycle.
    ///
    /// A paused or halted machine does nothing. A machine waiting for a
    /// key completes the wait if a key was pressed, and otherwise yields
    /// [`Flow::KeyWait`] again, so the caller can keep cycling without
    /// blocking.
    ///
    /// Faults halt the machine and are returned as errors.
    pub fn execute_cycle(&mut self) -> Chip8Result<Flow> {
        match self.state {
            MachineState::Paused => return Ok(Flow::Paused),
            MachineState::Halted(_) => return Ok(Flow::Halted),
            MachineState::AwaitingKey => {
                return match self.cpu.poll_key_wait() {
                    Some(_) => {
                        self.state = self.state.transition(Event::KeyPressed);
                        Ok(Flow::Ok)
                    }
                    None => Ok(Flow::KeyWait),
                };
            }
            MachineState::Running => {}
        }

        match self.interp.step(&mut self.cpu) {
            Ok(Flow::KeyWait) => {
                self.state = self.state.transition(Event::AwaitKey);
                Ok(Flow::KeyWait)
            }
            Ok(flow) => Ok(flow),
            Err(fault) => {
                self.state = self.state.transition(Event::Fault(fault));
                Err(fault.into())
            }
        }
    }

    /// Execute up to `step_count` cycles.
    ///
    /// Stops early when the machine waits for a key, is paused or halted,
    /// returning that flow.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        for _ in 0..step_count {
            match self.execute_cycle()? {
                flow @ (Flow::KeyWait | Flow::Paused | Flow::Halted) => return Ok(flow),
                _ => {}
            }
        }

        Ok(Flow::Ok)
    }
}

/// Troubleshooting
impl Chip8Vm {
    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.display[x + y * DISPLAY_WIDTH] {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_registers(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        write!(
            buf,
            "PC={:04X} I={:04X} SP={} DT={} ST={}",
            self.cpu.pc, self.cpu.address, self.cpu.sp, self.cpu.delay_timer, self.cpu.sound_timer
        )?;
        for (i, v) in self.cpu.registers.iter().enumerate() {
            write!(buf, " V{i:X}={v:02X}")?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys:")?;
            for i in 0..KEY_COUNT {
                if self.cpu.key_state(i) {
                    write!(buf, " k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }
}
