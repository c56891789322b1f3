//! Host devices for running without a window.
use chip8::{constants::*, prelude::*};
use log::info;

/// Devices with no keys pressed, which remember the last frame drawn.
///
/// Optionally asks the driver to quit after a number of frames.
pub struct HeadlessDevices {
    frames: u64,
    max_frames: Option<u64>,
    display: Box<DisplayBuffer>,
}

impl HeadlessDevices {
    pub fn new(max_frames: Option<u64>) -> Self {
        Self {
            frames: 0,
            max_frames,
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }

    /// Number of frames that were run.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn display(&self) -> &DisplayBuffer {
        &self.display
    }
}

impl Devices for HeadlessDevices {
    fn poll_input(&mut self) -> Input {
        let quit = self.max_frames.map_or(false, |max| self.frames >= max);
        if !quit {
            self.frames += 1;
        }

        Input {
            quit,
            ..Input::default()
        }
    }

    fn draw(&mut self, display: &DisplayBuffer) {
        self.display.copy_from_slice(display);
    }

    fn buzz(&mut self, state: bool) {
        if state {
            info!("buzzer on");
        } else {
            info!("buzzer off");
        }
    }
}
