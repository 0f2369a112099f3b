//! Hardware access for the chargemon charging indicator.
//!
//! This crate covers the device-file surface the indicator needs on a Linux
//! handheld: power-supply telemetry under `/sys/class/power_supply`, the
//! display backlight under `/sys/class/backlight`, and the RTC wake alarm on
//! `/dev/rtc0`. Everything here degrades instead of failing hard — a
//! charging indicator must never fail to indicate *something*, so missing
//! hardware turns into unknown readings or disabled features, not process
//! exits.
//!
//! # Example
//!
//! ```no_run
//! use chargemon_hal::PowerSupplyScanner;
//!
//! let scanner = PowerSupplyScanner::new();
//! let info = scanner.scan();
//! println!("state: {}, charge: {:?}", info.state.as_str(), info.fraction);
//! ```

pub mod backlight;
pub mod fuel;
pub mod mock;
pub mod power;
pub mod rtc;

pub use backlight::Backlight;
pub use mock::MockBattery;
pub use power::{BatteryInfo, ChargeState, PowerSource, PowerSupplyScanner};
pub use rtc::WakeSchedule;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HalError {
    #[error("no backlight device available")]
    NoBacklight,

    #[error("backlight reports no usable max_brightness")]
    BadMaxBrightness,

    #[error("wake alarm ioctl failed: {0}")]
    AlarmIoctl(#[from] nix::Error),

    #[error("wake alarm time could not be resolved to an epoch time")]
    AlarmTime,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HAL Result type
pub type Result<T> = std::result::Result<T, HalError>;
