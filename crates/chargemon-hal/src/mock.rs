//! Scripted battery source for bring-up without hardware.
//!
//! Cycles through a fixed set of charge levels, always claiming external
//! power, so the full indicator path (icon fill, blink warning, autoboot)
//! can be exercised on a desk. One entry is deliberately out of range to
//! push samples through the clamping path.

use crate::power::{BatteryInfo, ChargeState, PowerSource};

const MOCK_PERCENTS: [i64; 7] = [50, 90, 10, 0, 1, -1, 100];

/// Battery feed that replays a fixed charge-level script forever.
pub struct MockBattery {
    cursor: usize,
}

impl MockBattery {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Next scripted snapshot.
    pub fn sample(&mut self) -> BatteryInfo {
        let percent = MOCK_PERCENTS[self.cursor];
        self.cursor = (self.cursor + 1) % MOCK_PERCENTS.len();

        tracing::debug!("mock battery at {}%", percent);

        BatteryInfo {
            source: PowerSource::Usb,
            state: ChargeState::Charging,
            fraction: Some(percent as f64 / 100.0),
            seconds: None,
            voltage: Some(3.9),
            current: Some(-10.0),
            temperature: None,
        }
    }
}

impl Default for MockBattery {
    fn default() -> Self {
        Self::new()
    }
}
