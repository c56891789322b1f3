//! Software rasterizer for the display buffer.
use std::io::{self, Write};

use chip8::constants::*;

use crate::config::Rgba;

/// Scaled RGBA image of the display.
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Frame {
    /// Paint the display buffer, each pixel as a `scale` by `scale` square.
    pub fn rasterize(display: &DisplayBuffer, foreground: Rgba, background: Rgba, scale: u32) -> Self {
        let scale = scale.max(1) as usize;
        let (width, height) = (DISPLAY_WIDTH * scale, DISPLAY_HEIGHT * scale);

        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x / scale, y / scale)))
            .map(|(x, y)| {
                if display[x + y * DISPLAY_WIDTH] {
                    foreground
                } else {
                    background
                }
            })
            .collect();

        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        self.pixels[x + y * self.width]
    }

    /// Encode as a binary PPM (P6) image. Alpha is dropped.
    pub fn write_ppm<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "P6\n{} {}\n255\n", self.width, self.height)?;

        for pixel in &self.pixels {
            let [r, g, b, _] = pixel.to_bytes();
            w.write_all(&[r, g, b])?;
        }

        Ok(())
    }
}
