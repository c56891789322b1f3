//! Bytecode interpreter.
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    bytecode::Instruction,
    constants::*,
    cpu::Chip8Cpu,
    error::Fault,
    vm::{Flow, Quirks},
};

/// Instruction engine.
///
/// Executes exactly one fetch-decode-execute cycle against the
/// machine state it is handed. It keeps no machine state of its own,
/// only the behavioural quirks and the random number source for `Cxnn`.
pub struct Interpreter {
    quirks: Quirks,
    rng: StdRng,
}

impl Interpreter {
    pub fn new(quirks: Quirks, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { quirks, rng }
    }

    /// Execute a single instruction.
    ///
    /// The program counter is advanced past the instruction before it
    /// is executed, so jumps, calls and returns overwrite it.
    pub fn step(&mut self, cpu: &mut Chip8Cpu) -> Result<Flow, Fault> {
        // Each instruction is two bytes, with the opcode identity in the first 4-bit nibble.
        let instr = cpu.fetch()?;
        op_trace(cpu.pc, &instr);

        cpu.pc += 2;

        let Instruction { nnn, nn, n, x, y, .. } = instr;
        let (vx, vy) = (x as usize, y as usize);

        let mut control_flow = Flow::Ok;

        match instr.op() {
            // Miscellaneous instructions identified by nn
            0x0 | 0xE | 0xF => control_flow = self.exec_misc(cpu, instr)?,
            // 1nnn (JP addr)
            //
            // Jump to address.
            0x1 => {
                cpu.pc = nnn;
                control_flow = Flow::Jump;
            }
            // 2nnn (CALL addr)
            //
            // Call subroutine at nnn.
            0x2 => {
                cpu.push(cpu.pc)?;
                cpu.pc = nnn;
                control_flow = Flow::Jump;
            }
            // 3xnn (SE Vx, byte)
            //
            // Skip the next instruction if register Vx equals value nn.
            0x3 => {
                if cpu.registers[vx] == nn {
                    cpu.pc += 2;
                }
            }
            // 4xnn (SNE Vx, byte)
            //
            // Skip the next instruction if register Vx does not equal value nn.
            0x4 => {
                if cpu.registers[vx] != nn {
                    cpu.pc += 2;
                }
            }
            // 5xy0 (SE Vx, Vy)
            //
            // Skip the next instruction if register Vx equals register Vy.
            0x5 if n == 0 => {
                if cpu.registers[vx] == cpu.registers[vy] {
                    cpu.pc += 2;
                }
            }
            // 6xnn (LD Vx, byte)
            //
            // Set register Vx to value nn.
            0x6 => {
                cpu.registers[vx] = nn;
            }
            // 7xnn (ADD Vx, byte)
            //
            // Add value nn to register Vx. Carry flag is not set.
            0x7 => {
                cpu.registers[vx] = cpu.registers[vx].wrapping_add(nn);
            }
            // Arithmetic instructions identified by n
            0x8 => self.exec_math(cpu, instr)?,
            // 9xy0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            0x9 if n == 0 => {
                if cpu.registers[vx] != cpu.registers[vy] {
                    cpu.pc += 2;
                }
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value nnn.
            0xA => {
                cpu.address = nnn;
            }
            // Bnnn (JP V0, addr)
            //
            // Jump to address nnn offset by register V0.
            0xB => {
                cpu.pc = nnn + cpu.registers[0] as Address;
                control_flow = Flow::Jump;
            }
            // Cxnn (RND Vx, byte)
            //
            // Set register Vx to the result of bitwise AND between a random number and nn.
            0xC => {
                cpu.registers[vx] = nn & self.rng.gen::<u8>();
            }
            // Dxyn (DRW Vx, Vy, nibble)
            //
            // Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
            // Sprite is encoded as 8 pixels wide, n pixels high, stored in bits located in
            // memory pointed to by address register I.
            //
            // If the sprite is drawn outside of the display area, it is wrapped around to the other side.
            //
            // If the drawing operation erases existing pixels in the display buffer, register VF is set to
            // 1, and set to 0 if no display bits are unset. This is used for collision detection.
            0xD => {
                let (x, y) = (cpu.registers[vx] as usize, cpu.registers[vy] as usize);
                let mut is_erased = false;

                for r in 0..n as usize {
                    let row = cpu.ram_at(r);

                    // Each row is 8 bits representing the 8 pixels of the sprite.
                    for c in 0..8 {
                        let d = ((x + c) & DISPLAY_WIDTH_MASK)
                            + ((y + r) & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH;

                        let old_px = cpu.display[d];
                        let new_px = (row >> (7 - c)) & 1 != 0;

                        // XOR erases a pixel when both the old and new values are both 1.
                        is_erased |= old_px && new_px;

                        cpu.display[d] = old_px ^ new_px;
                    }
                }

                cpu.registers[FLAG_REGISTER] = is_erased as u8;
                control_flow = Flow::Draw;
            }
            // Unsupported operation.
            _ => return Err(Fault::UnknownOpcode(instr.opcode)),
        }

        Ok(control_flow)
    }

    /// Execute an arithmetic instruction
    #[inline]
    fn exec_math(&mut self, cpu: &mut Chip8Cpu, instr: Instruction) -> Result<(), Fault> {
        debug_assert_eq!(instr.op(), 0x8);

        let (vx, vy) = (instr.x as usize, instr.y as usize);
        let (x, y) = (cpu.registers[vx], cpu.registers[vy]);

        // The flag is written after the result, so it wins when Vx is VF.
        match instr.n {
            // 8xy0 (LD Vx, Vy)
            //
            // Store the value of register Vy in register Vx.
            0x0 => cpu.registers[vx] = y,
            // 8xy1 (OR Vx, Vy)
            0x1 => cpu.registers[vx] = x | y,
            // 8xy2 (AND Vx, Vy)
            0x2 => cpu.registers[vx] = x & y,
            // 8xy3 (XOR Vx, Vy)
            0x3 => cpu.registers[vx] = x ^ y,
            // 8xy4 (ADD Vx, Vy)
            //
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            0x4 => {
                let (result, carry) = x.overflowing_add(y);
                cpu.registers[vx] = result;
                cpu.registers[FLAG_REGISTER] = carry as u8;
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // Subtracts Vy from Vx, and stores the result in Vx.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            0x5 => {
                let (result, borrow) = x.overflowing_sub(y);
                cpu.registers[vx] = result;
                cpu.registers[FLAG_REGISTER] = !borrow as u8;
            }
            // 8xy6 (SHR Vx)
            //
            // VF is set to the least-significant bit, then the value is shifted right by 1.
            0x6 => {
                let value = self.shift_source(x, y);
                cpu.registers[vx] = value >> 1;
                cpu.registers[FLAG_REGISTER] = value & 1;
            }
            // 8xy7 (SUBN Vx, Vy)
            //
            // Subtracts Vx from Vy, and stores the result in Vx.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            0x7 => {
                let (result, borrow) = y.overflowing_sub(x);
                cpu.registers[vx] = result;
                cpu.registers[FLAG_REGISTER] = !borrow as u8;
            }
            // 8xyE (SHL Vx)
            //
            // VF is set to the most-significant bit, then the value is shifted left by 1.
            0xE => {
                let value = self.shift_source(x, y);
                cpu.registers[vx] = value << 1;
                cpu.registers[FLAG_REGISTER] = (value >> 7) & 1;
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            _ => return Err(Fault::UnknownOpcode(instr.opcode)),
        }

        Ok(())
    }

    #[inline(always)]
    fn shift_source(&self, x: u8, y: u8) -> u8 {
        if self.quirks.shift_reads_vy {
            y
        } else {
            x
        }
    }

    /// Execute a miscellaneous instruction
    #[inline]
    fn exec_misc(&mut self, cpu: &mut Chip8Cpu, instr: Instruction) -> Result<Flow, Fault> {
        let vx = instr.x as usize;

        let mut control_flow = Flow::Ok;

        match (instr.op(), instr.nn) {
            // ----------------------------------------------------------------
            // 00E0 (CLS)
            //
            // Clear display
            (0x0, 0xE0) if vx == 0 => {
                cpu.clear_display();
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Set the program counter to the value at the top of the stack.
            (0x0, 0xEE) if vx == 0 => {
                cpu.pc = cpu.pop()?;
                control_flow = Flow::Jump;
            }
            // ----------------------------------------------------------------
            // Ex9E (SKP Vx)
            //
            // Skip next instruction if the key with the value of Vx is pressed.
            (0xE, 0x9E) => {
                if cpu.key_state(cpu.registers[vx]) {
                    cpu.pc += 2;
                }
            }
            // ExA1 (SKNP Vx)
            //
            // Skip next instruction if the key with the value of Vx is not pressed.
            (0xE, 0xA1) => {
                if !cpu.key_state(cpu.registers[vx]) {
                    cpu.pc += 2;
                }
            }
            // ----------------------------------------------------------------
            // Fx07 (LD Vx, DT)
            //
            // Set Vx = delay timer value.
            (0xF, 0x07) => {
                cpu.registers[vx] = cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // The machine suspends and yields to the caller, which resumes
            // it on later cycles until a key is pressed.
            (0xF, 0x0A) => {
                cpu.begin_key_wait(instr.x);
                control_flow = Flow::KeyWait;
            }
            // Fx15 (LD DT, Vx)
            //
            // Set delay timer = Vx.
            (0xF, 0x15) => {
                cpu.delay_timer = cpu.registers[vx];
            }
            // Fx18 (LD ST, Vx)
            //
            // Set sound timer = Vx.
            (0xF, 0x18) => {
                cpu.sound_timer = cpu.registers[vx];
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I
            (0xF, 0x1E) => {
                cpu.address = cpu.address.wrapping_add(cpu.registers[vx] as Address);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            (0xF, 0x29) => {
                let digit = (cpu.registers[vx] & 0xF) as Address;
                cpu.address = FONTSET_START + digit * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            (0xF, 0x33) => {
                let x = cpu.registers[vx];
                *cpu.ram_at_mut(0) = x / 100;
                *cpu.ram_at_mut(1) = x / 10  % 10;
                *cpu.ram_at_mut(2) = x       % 10;
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            (0xF, 0x55) => {
                for v in 0..=vx {
                    let value = cpu.registers[v];
                    *cpu.ram_at_mut(v) = value;
                }
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            (0xF, 0x65) => {
                for v in 0..=vx {
                    cpu.registers[v] = cpu.ram_at(v);
                }
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            _ => return Err(Fault::UnknownOpcode(instr.opcode)),
        }

        Ok(control_flow)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(pc: Address, instr: &Instruction) {
    log::trace!("{:04X}: {}", pc, crate::disasm::Mnemonic(*instr));
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: Address, _: &Instruction) {}
