//! Frame loop tying the VM to host devices.
use crate::{
    clock::Clock,
    constants::*,
    devices::Devices,
    error::Chip8Result,
    state::MachineState,
    vm::{Chip8Vm, Flow, Hz},
};

/// Runs a [`Chip8Vm`] at 60 frames per second.
///
/// Each frame polls input, executes a slice of instruction cycles,
/// counts the timers down and presents the display and buzzer.
pub struct Driver<D: Devices> {
    vm: Chip8Vm,
    devices: D,
    clock: Clock,
    /// Clock cycles carried over between frames.
    cycle_acc: u64,
    buzzing: bool,
}

impl<D: Devices> Driver<D> {
    pub fn new(vm: Chip8Vm, devices: D) -> Self {
        Self {
            vm,
            devices,
            clock: Clock::new(Hz(DELAY_FREQUENCY)),
            cycle_acc: 0,
            buzzing: false,
        }
    }

    pub fn vm(&self) -> &Chip8Vm {
        &self.vm
    }

    pub fn into_parts(self) -> (Chip8Vm, D) {
        (self.vm, self.devices)
    }

    /// Run frames until the devices ask to quit or the machine halts.
    pub fn run(&mut self) -> Chip8Result<Flow> {
        self.clock.reset();

        loop {
            self.clock.wait();

            match self.frame()? {
                flow @ (Flow::Interrupt | Flow::Halted) => return Ok(flow),
                _ => {}
            }
        }
    }

    /// Execute a single 60 Hz frame without waiting on the clock.
    ///
    /// A fault is returned after the frame has been presented,
    /// with the machine left halted.
    pub fn frame(&mut self) -> Chip8Result<Flow> {
        let input = self.devices.poll_input();
        if input.quit {
            return Ok(Flow::Interrupt);
        }

        if input.toggle_pause {
            self.vm.toggle_pause();
        }
        self.vm.set_keys(&input.keys);

        let result = match self.vm.state() {
            MachineState::Paused => Ok(Flow::Paused),
            MachineState::Halted(_) => Ok(Flow::Halted),
            MachineState::Running | MachineState::AwaitingKey => {
                let cycles = self.next_cycle_count();
                self.vm.run_steps(cycles)
            }
        };

        if self.vm.state().is_active() {
            self.vm.tick_timers();
        }
        self.present();

        result
    }

    /// Number of cycles to run this frame.
    ///
    /// Clock frequencies that are not a multiple of the frame rate
    /// spread the remainder over following frames.
    fn next_cycle_count(&mut self) -> usize {
        self.cycle_acc = self
            .cycle_acc
            .saturating_add(self.vm.config().clock_frequency.0);
        let cycles = self.cycle_acc / DELAY_FREQUENCY;
        self.cycle_acc %= DELAY_FREQUENCY;
        usize::try_from(cycles).unwrap_or(usize::MAX)
    }

    fn present(&mut self) {
        let buzzing = self.vm.is_sound_on();
        if buzzing != self.buzzing {
            self.buzzing = buzzing;
            self.devices.buzz(buzzing);
        }

        self.devices.draw(self.vm.framebuffer_snapshot());
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        devices::{Input, KeyCode, MockDevices},
        error::{Chip8Error, Fault},
        vm::Chip8Conf,
    };

    fn vm_with(program: &[u8]) -> Chip8Vm {
        let mut vm = Chip8Vm::new(Chip8Conf::default());
        vm.load(program).unwrap();
        vm
    }

    /// Devices with no input that accept any output.
    fn idle_devices() -> MockDevices {
        let mut devices = MockDevices::new();
        devices.expect_poll_input().returning(Input::default);
        devices.expect_draw().returning(|_| ());
        devices.expect_buzz().returning(|_| ());
        devices
    }

    #[test]
    fn test_quit() {
        let mut devices = MockDevices::new();
        devices.expect_poll_input().times(2).returning(|| Input {
            quit: true,
            ..Input::default()
        });
        devices.expect_draw().times(0);

        let mut driver = Driver::new(vm_with(&[0x12, 0x00]), devices);
        assert_eq!(driver.frame().unwrap(), Flow::Interrupt);
        assert_eq!(driver.run().unwrap(), Flow::Interrupt);
    }

    #[test]
    fn test_cycles_per_frame() {
        // ADD V0, 1 repeated
        let program: Vec<u8> = [0x70, 0x01].repeat(100);
        let mut driver = Driver::new(vm_with(&program), idle_devices());

        driver.frame().unwrap();
        assert_eq!(driver.vm().cpu().register(0), 11);
        driver.frame().unwrap();
        assert_eq!(driver.vm().cpu().register(0), 23);
        driver.frame().unwrap();
        assert_eq!(driver.vm().cpu().register(0), 35);
    }

    #[test]
    fn test_configured_frequency() {
        let mut vm = Chip8Vm::new(Chip8Conf {
            clock_frequency: Hz(4 * DELAY_FREQUENCY),
            ..Chip8Conf::default()
        });
        vm.load(&[0x70, 0x01].repeat(20)).unwrap();
        let mut driver = Driver::new(vm, idle_devices());

        driver.frame().unwrap();
        driver.frame().unwrap();
        assert_eq!(driver.vm().cpu().register(0), 8);
    }

    #[test]
    fn test_extreme_frequency() {
        let mut vm = Chip8Vm::new(Chip8Conf {
            clock_frequency: Hz(u64::MAX),
            ..Chip8Conf::default()
        });
        vm.load(&[0xF0, 0x0A]).unwrap();
        let mut driver = Driver::new(vm, idle_devices());

        assert_eq!(driver.frame().unwrap(), Flow::KeyWait);
        assert_eq!(driver.frame().unwrap(), Flow::KeyWait);
        assert_eq!(driver.vm().state(), MachineState::AwaitingKey);
    }

    #[test]
    fn test_key_wait_across_frames() {
        let mut devices = MockDevices::new();
        let mut frame = 0;
        devices.expect_poll_input().returning(move || {
            frame += 1;
            if frame >= 3 {
                Input::with_key(KeyCode::Key5)
            } else {
                Input::default()
            }
        });
        devices.expect_draw().returning(|_| ());
        devices.expect_buzz().returning(|_| ());

        #[rustfmt::skip]
        let mut driver = Driver::new(vm_with(&[
            0xF0, 0x0A, // LD V0, K
            0x61, 0x42, // LD V1, 0x42
            0x12, 0x04, // JP 0x204
        ]), devices);

        assert_eq!(driver.frame().unwrap(), Flow::KeyWait);
        assert_eq!(driver.frame().unwrap(), Flow::KeyWait);
        assert_eq!(driver.vm().state(), MachineState::AwaitingKey);

        driver.frame().unwrap();
        assert_eq!(driver.vm().state(), MachineState::Running);
        assert_eq!(driver.vm().cpu().register(0), 5);
        assert_eq!(driver.vm().cpu().register(1), 0x42);
    }

    #[test]
    fn test_pause_toggle() {
        let mut devices = MockDevices::new();
        let mut frame = 0;
        devices.expect_poll_input().returning(move || {
            frame += 1;
            Input {
                toggle_pause: frame <= 2,
                ..Input::default()
            }
        });
        devices.expect_draw().times(3).returning(|_| ());
        devices.expect_buzz().returning(|_| ());

        let mut driver = Driver::new(vm_with(&[0x70, 0x01].repeat(50)), devices);

        assert_eq!(driver.frame().unwrap(), Flow::Paused);
        assert_eq!(driver.vm().cpu().register(0), 0);

        // Second toggle resumes.
        driver.frame().unwrap();
        assert_eq!(driver.vm().cpu().register(0), 11);
        driver.frame().unwrap();
        assert_eq!(driver.vm().cpu().register(0), 23);
    }

    #[test]
    fn test_buzzer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let buzz_log = Arc::clone(&log);

        let mut devices = MockDevices::new();
        devices.expect_poll_input().returning(Input::default);
        devices.expect_draw().returning(|_| ());
        devices
            .expect_buzz()
            .returning(move |state| buzz_log.lock().unwrap().push(state));

        #[rustfmt::skip]
        let mut driver = Driver::new(vm_with(&[
            0x60, 0x03, // LD V0, 3
            0xF0, 0x18, // LD ST, V0
            0x12, 0x04, // JP 0x204
        ]), devices);

        for _ in 0..5 {
            driver.frame().unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec![true, false]);
        assert_eq!(driver.vm().sound_timer(), 0);
    }

    #[test]
    fn test_fault_presents_and_halts() {
        let mut devices = MockDevices::new();
        devices.expect_poll_input().returning(Input::default);
        devices.expect_draw().times(2).returning(|_| ());
        devices.expect_buzz().returning(|_| ());

        let mut driver = Driver::new(vm_with(&[0x00, 0xE0, 0xFF, 0xFF]), devices);

        let err = driver.frame().unwrap_err();
        assert!(matches!(
            err,
            Chip8Error::Runtime(Fault::UnknownOpcode(0xFFFF))
        ));
        assert!(driver.vm().state().is_halted());

        assert_eq!(driver.frame().unwrap(), Flow::Halted);
    }

    #[test]
    fn test_run_until_halt() {
        let mut driver = Driver::new(vm_with(&[0x00, 0xEE]), idle_devices());
        assert!(matches!(
            driver.run(),
            Err(Chip8Error::Runtime(Fault::StackUnderflow))
        ));
        assert_eq!(driver.run().unwrap(), Flow::Halted);

        let (vm, _devices) = driver.into_parts();
        assert_eq!(vm.state().halt_reason(), Some(Fault::StackUnderflow));
    }
}
