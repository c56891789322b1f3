//! Application configuration.
use std::{
    fmt,
    fs,
    num::{NonZeroU32, NonZeroU64},
    path::Path,
};

use chip8::{constants::DELAY_FREQUENCY, prelude::*};
use serde::{
    de::{Error, Unexpected, Visitor},
    Deserialize, Deserializer,
};

use crate::error::AppError;

/// Settings read from the YAML configuration file.
///
/// Every key is optional.
///
/// ```yaml
/// foreground: "#FFFFFFFF"
/// background: 0x000000FF
/// scale: 20
/// cycles_per_tick: 12
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Colour of lit pixels.
    pub foreground: Rgba,
    /// Colour of unlit pixels.
    pub background: Rgba,
    /// Size of a display pixel in output pixels.
    pub scale: NonZeroU32,
    /// Instructions executed per 60 Hz timer tick.
    ///
    /// When absent the CPU runs at the interpreter default speed.
    #[serde(deserialize_with = "bounded_cycles")]
    pub cycles_per_tick: Option<NonZeroU64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            foreground: Rgba::WHITE,
            background: Rgba::BLACK,
            scale: NonZeroU32::new(20).unwrap_or(NonZeroU32::MIN),
            cycles_per_tick: None,
        }
    }
}

impl AppConfig {
    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, AppError> {
        let source = fs::read_to_string(filepath)?;
        Self::from_yaml(&source)
    }

    pub fn from_yaml(source: &str) -> Result<Self, AppError> {
        // An empty document means all defaults.
        if source.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(source)?)
    }

    /// Virtual machine settings derived from this configuration.
    pub fn chip8_conf(&self) -> Chip8Conf {
        let mut conf = Chip8Conf::default();
        if let Some(cycles) = self.cycles_per_tick {
            conf.clock_frequency = Hz(cycles.get().saturating_mul(DELAY_FREQUENCY));
        }
        conf
    }
}

/// Largest accepted `cycles_per_tick`.
pub const MAX_CYCLES_PER_TICK: u64 = u32::MAX as u64;

fn bounded_cycles<'de, D>(deserializer: D) -> Result<Option<NonZeroU64>, D::Error>
where
    D: Deserializer<'de>,
{
    let cycles = NonZeroU64::deserialize(deserializer)?;
    if cycles.get() > MAX_CYCLES_PER_TICK {
        return Err(D::Error::invalid_value(
            Unexpected::Unsigned(cycles.get()),
            &"cycles per tick no larger than 4294967295",
        ));
    }

    Ok(Some(cycles))
}

/// 32-bit colour packed as `0xRRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub u32);

impl Rgba {
    pub const WHITE: Rgba = Rgba(0xFFFFFFFF);
    pub const BLACK: Rgba = Rgba(0x000000FF);

    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RgbaVisitor)
    }
}

struct RgbaVisitor;

impl<'de> Visitor<'de> for RgbaVisitor {
    type Value = Rgba;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a 32-bit integer or a \"#RRGGBBAA\" string")
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        u32::try_from(v)
            .map(Rgba)
            .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: Error,
    {
        u32::try_from(v)
            .map(Rgba)
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: Error,
    {
        v.strip_prefix('#')
            .filter(|hex| hex.len() == 8)
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .map(Rgba)
            .ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
    }
}
