//! Display-lifecycle state machine.
//!
//! The only component with memory across ticks. Each tick it consumes one
//! battery sample plus whatever input events the frontend collected, then
//! decides: keep indicating, dim, blink a low-battery warning, or terminate
//! with an exit reason the boot script acts on.

use crate::config::Policy;
use chargemon_hal::{BatteryInfo, PowerSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// Backlight goes dark after this much time without input.
pub const SCREEN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long external power may be gone before exit-on-unplug fires.
pub const UNPLUG_GRACE: Duration = Duration::from_secs(2);

/// Minimum charge for the autoboot policy to boot.
pub const AUTOBOOT_MIN_PERCENT: u8 = 20;

/// Below this the power key warns instead of booting.
pub const POWEROFF_MIN_PERCENT: u8 = 5;

/// Ticks the battery icon blinks after a refused power-off.
pub const LOW_BATTERY_BLINK_TICKS: u32 = 10;

const TICK_IDLE: Duration = Duration::from_secs(1);
// faster cadence while blinking so the alternation is visible
const TICK_BLINK: Duration = Duration::from_millis(250);

/// Why the loop stopped. The process exits with the ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Continue the normal boot.
    Boot,
    /// Power the device back off.
    Shutdown,
    /// An RTC wake alarm fired.
    Alarm,
}

impl ExitReason {
    pub fn code(self) -> i32 {
        match self {
            ExitReason::Boot => 0,
            ExitReason::Shutdown => 1,
            ExitReason::Alarm => 2,
        }
    }
}

/// Loop-control value mirrored from the signal-handler atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlag {
    Run,
    Stop,
    Alarm,
}

/// Discrete events fed back from the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PowerKey,
    Key,
    Quit,
}

/// The slice of a battery snapshot the lifecycle acts on.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatterySample {
    pub percent: u8,
    pub charging: bool,
}

impl BatterySample {
    /// Reduce a snapshot to percent + charging flag.
    ///
    /// A missing or non-positive fraction floors to 1%: the indicator must
    /// show *something*, and an empty-looking bar reads as broken rather
    /// than empty.
    pub fn from_info(info: &BatteryInfo) -> Self {
        let percent = match info.fraction {
            Some(fraction) if fraction > 0.0 => (fraction * 100.0) as u8,
            _ => {
                tracing::warn!("battery charge unknown or out of range, flooring to 1%");
                1
            }
        };
        Self {
            percent,
            charging: info.source == PowerSource::Usb,
        }
    }
}

/// Anti-burn-in offset: a bounded random walk reflecting at screen edges.
#[derive(Debug, Clone)]
pub struct OledDrift {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl OledDrift {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1) as i32;
        let height = height.max(1) as i32;
        Self {
            x: width / 2,
            y: height / 2,
            width,
            height,
        }
    }

    /// One walk step; the offset stays inside `[0,width) x [0,height)`.
    pub fn step(&mut self, rng: &mut impl Rng) {
        self.x = reflect(self.x + rng.gen_range(-1..=1), self.width);
        self.y = reflect(self.y + rng.gen_range(-1..=1), self.height);
    }

    pub fn offset(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

fn reflect(v: i32, limit: i32) -> i32 {
    let v = if v < 0 {
        -v
    } else if v >= limit {
        2 * (limit - 1) - v
    } else {
        v
    };
    v.clamp(0, limit - 1)
}

/// What the frontend should draw this tick.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub percent: u8,
    pub charging: bool,
    /// Battery icon visibility; alternates per frame while blinking.
    pub icon_visible: bool,
    /// Anti-burn-in offset, when the OLED policy is on.
    pub offset: Option<(i32, i32)>,
}

/// The top-level cooperative state machine.
pub struct Lifecycle {
    policy: Policy,
    rng: StdRng,
    drift: Option<OledDrift>,
    sample: BatterySample,
    frame_count: u64,
    blink_ticks: u32,
    display_on: bool,
    last_input: Instant,
    last_charging: Instant,
    running: bool,
    exit_reason: ExitReason,
}

impl Lifecycle {
    pub fn new(policy: Policy, screen: (u32, u32), now: Instant) -> Self {
        Self::with_rng(policy, screen, now, StdRng::from_entropy())
    }

    /// Construct with a caller-provided RNG for reproducible drift.
    pub fn with_rng(policy: Policy, screen: (u32, u32), now: Instant, rng: StdRng) -> Self {
        let drift = policy.oled_shift.then(|| OledDrift::new(screen.0, screen.1));
        Self {
            policy,
            rng,
            drift,
            sample: BatterySample::default(),
            frame_count: 0,
            blink_ticks: 0,
            display_on: true,
            last_input: now,
            last_charging: now,
            running: true,
            exit_reason: ExitReason::Boot,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn exit_reason(&self) -> ExitReason {
        self.exit_reason
    }

    pub fn display_on(&self) -> bool {
        self.display_on
    }

    /// Loop cadence: slow while steady, fast while the warning blinks.
    pub fn tick_interval(&self) -> Duration {
        if self.blink_ticks == 0 {
            TICK_IDLE
        } else {
            TICK_BLINK
        }
    }

    /// Advance one tick with a fresh battery sample.
    pub fn tick(&mut self, now: Instant, sample: BatterySample) {
        self.sample = sample;
        self.frame_count += 1;
        if self.blink_ticks > 0 {
            self.blink_ticks -= 1;
        }

        if sample.charging {
            self.last_charging = now;
            if self.policy.autoboot && sample.percent >= AUTOBOOT_MIN_PERCENT {
                tracing::info!("charged to {}%, booting", sample.percent);
                self.terminate(ExitReason::Boot);
                return;
            }
        } else if self.policy.exit_on_unplug
            && now.duration_since(self.last_charging) >= UNPLUG_GRACE
        {
            tracing::info!("external power gone, shutting down");
            self.terminate(ExitReason::Shutdown);
            return;
        }

        if let Some(drift) = &mut self.drift {
            drift.step(&mut self.rng);
        }
    }

    /// React to one frontend event; `sample` is a fresh re-scan.
    pub fn handle_event(&mut self, now: Instant, event: InputEvent, sample: BatterySample) {
        self.sample = sample;

        match event {
            InputEvent::Quit => {
                self.running = false;
                return;
            }
            InputEvent::PowerKey => {
                if sample.percent > POWEROFF_MIN_PERCENT {
                    tracing::info!("power key at {}%, booting", sample.percent);
                    self.terminate(ExitReason::Boot);
                    return;
                }
                // too low to safely power off; warn with a blink instead
                tracing::info!("power key refused at {}%", sample.percent);
                self.blink_ticks = LOW_BATTERY_BLINK_TICKS;
            }
            InputEvent::Key => {}
        }

        if !self.display_on {
            self.display_on = true;
        }
        self.last_input = now;
    }

    /// Dim the display once the idle timeout elapses.
    pub fn idle_tick(&mut self, now: Instant) {
        if self.display_on && now.duration_since(self.last_input) >= SCREEN_TIMEOUT {
            tracing::debug!("idle for {:?}, dimming", SCREEN_TIMEOUT);
            self.display_on = false;
        }
    }

    /// Fold in the signal-handler control flag, checked once per tick.
    pub fn absorb(&mut self, flag: ControlFlag) {
        match flag {
            ControlFlag::Run => {}
            ControlFlag::Stop => self.running = false,
            ControlFlag::Alarm => self.terminate(ExitReason::Alarm),
        }
    }

    /// View model for the frontend.
    pub fn frame(&self) -> Frame {
        Frame {
            percent: self.sample.percent,
            charging: self.sample.charging,
            icon_visible: self.frame_count % 2 != 0 || self.blink_ticks == 0,
            offset: self.drift.as_ref().map(OledDrift::offset),
        }
    }

    fn terminate(&mut self, reason: ExitReason) {
        self.exit_reason = reason;
        self.running = false;
    }
}
