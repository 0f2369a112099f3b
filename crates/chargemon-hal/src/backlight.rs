//! Display backlight control via sysfs.
//!
//! The brightness node is opened once at startup and the handle kept for
//! the lifetime of the process; each on/off transition is a single short
//! write. Only the first device under the backlight class is driven —
//! boards with more than one backlight are not disambiguated.

use crate::{HalError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Backlight class directory.
pub const BACKLIGHT_SYSFS: &str = "/sys/class/backlight";

/// Open write handle to a backlight's `brightness` node.
pub struct Backlight {
    brightness: File,
    max_brightness: u32,
}

impl Backlight {
    /// Open the first backlight device on the system.
    ///
    /// Fails when there is no backlight class, no device in it, or the
    /// device reports an unreadable or zero `max_brightness`. Callers are
    /// expected to degrade: the indicator keeps running with dimming
    /// disabled.
    pub fn open() -> Result<Self> {
        Self::open_at(Path::new(BACKLIGHT_SYSFS))
    }

    /// Open the first device under a different class directory, mainly for
    /// tests.
    pub fn open_at(base: &Path) -> Result<Self> {
        let device = fs::read_dir(base)?
            .flatten()
            .next()
            .ok_or(HalError::NoBacklight)?
            .path();

        let max_brightness: u32 = fs::read_to_string(device.join("max_brightness"))?
            .trim()
            .parse()
            .map_err(|_| HalError::BadMaxBrightness)?;
        if max_brightness == 0 {
            return Err(HalError::BadMaxBrightness);
        }

        let brightness = OpenOptions::new()
            .write(true)
            .open(device.join("brightness"))?;

        tracing::info!(
            "backlight at {} (max_brightness {})",
            device.display(),
            max_brightness
        );

        Ok(Self {
            brightness,
            max_brightness,
        })
    }

    pub fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    /// Turn the display fully on.
    pub fn wake(&mut self) -> Result<()> {
        self.write_level(self.max_brightness)
    }

    /// Turn the display off.
    pub fn sleep(&mut self) -> Result<()> {
        self.write_level(0)
    }

    fn write_level(&mut self, level: u32) -> Result<()> {
        self.brightness.write_all(level.to_string().as_bytes())?;
        tracing::debug!("backlight set to {}", level);
        Ok(())
    }
}
