//! Runtime policy for the indicator.
//!
//! Every toggle defaults to off. A board vendor bakes its defaults into
//! `/etc/chargemon/config.toml`; the boot script can still override any of
//! them per invocation with the short flags below.

use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::Path;

/// System-wide configuration file, optional.
pub const CONFIG_PATH: &str = "/etc/chargemon/config.toml";

/// Policy toggles owned by the decision core.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Drift the drawn icon to prevent burn-in on OLED panels (`-o`).
    pub oled_shift: bool,
    /// Exit (shutdown) shortly after external power disappears (`-e`).
    pub exit_on_unplug: bool,
    /// Honor a pending RTC wake alarm and exit when it fires (`-a`).
    pub exit_on_alarm: bool,
    /// Ask the frontend for a window instead of the full screen (`-w`).
    pub windowed: bool,
    /// Use the scripted mock battery instead of sysfs (`-t`).
    pub mock_battery: bool,
    /// Boot automatically once sufficiently charged (`-b`).
    pub autoboot: bool,
}

impl Policy {
    /// Load the system config file, falling back to defaults.
    pub fn load_default() -> Self {
        Self::load(Path::new(CONFIG_PATH))
    }

    fn load(path: &Path) -> Self {
        let Ok(raw) = std::fs::read_to_string(path) else {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Self::default();
        };
        match toml::from_str(&raw) {
            Ok(policy) => policy,
            Err(err) => {
                tracing::warn!("ignoring unparsable {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    /// Overlay short flags (clustered allowed, e.g. `-oeb`) on this policy.
    pub fn apply_args(mut self, args: impl Iterator<Item = String>) -> Result<Self> {
        for arg in args {
            let flags = match arg.strip_prefix('-') {
                Some(flags) if !flags.is_empty() => flags,
                _ => bail!("unexpected argument `{arg}`\n{}", usage()),
            };
            for flag in flags.chars() {
                match flag {
                    'o' => self.oled_shift = true,
                    'e' => self.exit_on_unplug = true,
                    'a' => self.exit_on_alarm = true,
                    'w' => self.windowed = true,
                    't' => self.mock_battery = true,
                    'b' => self.autoboot = true,
                    _ => bail!("unknown flag -{flag}\n{}", usage()),
                }
            }
        }
        Ok(self)
    }
}

/// Command-line help text.
pub fn usage() -> String {
    "Usage: chargemon [-oeawtb]\n\
     \x20   -o: prevent burn-in on OLED screens\n\
     \x20   -e: exit immediately if not charging\n\
     \x20   -a: exit on rtc alarm\n\
     \x20   -w: run in window\n\
     \x20   -t: use mock battery\n\
     \x20   -b: autoboot when battery is charged enough"
        .to_string()
}
