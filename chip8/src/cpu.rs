//! CPU and memory state.
use crate::{
    bytecode::Instruction,
    constants::*,
    devices::KeyCode,
    error::{Chip8Error, Chip8Result, Fault},
};

/// Core state for a chip8 interpreter.
///
/// All storage is fixed size and held inline. Nothing outside the
/// machine keeps a mutable reference into it; the instruction engine
/// borrows it exclusively for the duration of one cycle.
#[derive(Clone)]
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: Address,
    /// Stack pointer, the number of return addresses on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address. Since addresses are 12 bits, only the
    /// lowest (rightmost) bits are used when memory is accessed.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,
    /// Pending `Fx0A` instruction waiting for a keypress.
    pub(crate) key_wait: Option<KeyWait>,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: [u8; MEM_SIZE],
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that is drawn too.
    pub(crate) display: DisplayBuffer,
}

/// Bookkeeping for a suspended `Fx0A` (`LD Vx, K`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyWait {
    /// Register receiving the key value.
    pub(crate) register: u8,
    /// Keys that were already down when the wait started.
    /// Only a fresh press satisfies the wait.
    pub(crate) held: u16,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_state: 0,
            key_wait: None,

            ram: [0; MEM_SIZE],
            stack: [0; STACK_SIZE],
            display: [false; DISPLAY_BUFFER_SIZE],
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Load a program into memory and reset the machine for execution.
    ///
    /// The font is written to the start of memory, the program to
    /// [`MEM_START`], and every register, timer, the stack, the display
    /// and the keypad are cleared.
    pub fn load(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::RomTooLarge(bytecode.len()));
        }

        // Start with clean memory to avoid leaking previous program.
        *self = Self::default();

        self.ram[FONTSET_START as usize..][..FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
        self.ram[MEM_START..][..bytecode.len()].copy_from_slice(bytecode);

        Ok(())
    }

    /// Count down both timers, stopping at zero.
    #[inline]
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Set the state of a key on the hexadecimal keypad.
    pub fn set_key(&mut self, index: u8, pressed: bool) -> Chip8Result<()> {
        let key = KeyCode::try_from(index).map_err(|_| Chip8Error::InvalidKeyIndex(index))?;
        self.set_key_state(key, pressed);
        Ok(())
    }

    pub fn set_key_state(&mut self, key: KeyCode, pressed: bool) {
        let mask = 1 << key.as_u8();
        if pressed {
            self.key_state |= mask;
        } else {
            self.key_state &= !mask;
        }
    }

    /// Checks whether the key is down. Only the low nibble of `key_id` is used.
    #[inline]
    pub fn key_state(&self, key_id: u8) -> bool {
        self.key_state & (1 << (key_id & 0xF)) != 0
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Read-only view of the display, for rendering.
    #[inline]
    pub fn framebuffer_snapshot(&self) -> &DisplayBuffer {
        &self.display
    }

    /// State of a single pixel. Coordinates wrap around the screen edges.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.display[(x & DISPLAY_WIDTH_MASK) + (y & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH]
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
    }

    #[inline]
    pub fn pc(&self) -> Address {
        self.pc
    }

    /// Address register I.
    #[inline]
    pub fn index(&self) -> Address {
        self.address
    }

    #[inline]
    pub fn register(&self, vx: u8) -> u8 {
        self.registers[vx as usize & 0xF]
    }

    #[inline]
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    #[inline]
    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    #[inline]
    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    /// The buzzer should sound while the sound timer counts down.
    #[inline]
    pub fn is_sound_on(&self) -> bool {
        self.sound_timer > 0
    }

    /// Number of return addresses on the call stack.
    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.sp
    }

    #[inline]
    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.ram
    }
}

/// Engine helpers.
impl Chip8Cpu {
    /// Read the instruction word at the program counter.
    #[inline]
    pub(crate) fn fetch(&self) -> Result<Instruction, Fault> {
        let pc = self.pc as usize;
        if pc + 1 >= MEM_SIZE {
            return Err(Fault::MemoryOutOfBounds(self.pc));
        }
        Ok(Instruction::from_bytes([self.ram[pc], self.ram[pc + 1]]))
    }

    /// Memory byte at `I + offset`, wrapped to the 12-bit address space.
    #[inline(always)]
    pub(crate) fn ram_at(&self, offset: usize) -> u8 {
        self.ram[(self.address as usize + offset) & ADDRESS_MASK]
    }

    #[inline(always)]
    pub(crate) fn ram_at_mut(&mut self, offset: usize) -> &mut u8 {
        &mut self.ram[(self.address as usize + offset) & ADDRESS_MASK]
    }

    pub(crate) fn push(&mut self, address: Address) -> Result<(), Fault> {
        if self.sp >= STACK_SIZE {
            return Err(Fault::StackOverflow);
        }
        self.stack[self.sp] = address;
        self.sp += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<Address, Fault> {
        if self.sp == 0 {
            return Err(Fault::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp])
    }

    /// Suspend on `Fx0A` until a key that is not currently down gets pressed.
    pub(crate) fn begin_key_wait(&mut self, register: u8) {
        self.key_wait = Some(KeyWait {
            register,
            held: self.key_state,
        });
    }

    /// Complete a pending key wait if a key has been freshly pressed.
    ///
    /// The key value is stored in the waiting register and returned.
    pub(crate) fn poll_key_wait(&mut self) -> Option<u8> {
        let wait = self.key_wait.as_mut()?;
        let fresh = self.key_state & !wait.held;

        if fresh == 0 {
            // A key released during the wait counts when pressed again.
            wait.held &= self.key_state;
            return None;
        }

        let key = fresh.trailing_zeros() as u8;
        self.registers[wait.register as usize] = key;
        self.key_wait = None;

        Some(key)
    }
}
