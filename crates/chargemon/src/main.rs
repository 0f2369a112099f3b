//! chargemon - boot-time charging indicator for Linux handhelds.
//!
//! When a powered-off device is plugged in, the bootloader starts this
//! program instead of the full OS. It watches the battery, keeps the
//! backlight sensible, and exits with a code telling the boot script what
//! to do next:
//!
//! - `0` continue the normal boot,
//! - `1` power back off,
//! - `2` an RTC wake alarm fired.

use anyhow::{Context, Result};
use chargemon::config::Policy;
use chargemon::frontend::{Frontend, HeadlessFrontend};
use chargemon::state::{BatterySample, ControlFlag, ExitReason, Lifecycle};
use chargemon_hal::rtc::{self, WakeSchedule};
use chargemon_hal::{Backlight, BatteryInfo, MockBattery, PowerSupplyScanner};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

const CONTROL_RUN: u8 = 0;
const CONTROL_STOP: u8 = 1;
const CONTROL_ALARM: u8 = 2;

/// The only cross-context state: signal handlers store, the loop loads
/// once per tick.
static CONTROL: AtomicU8 = AtomicU8::new(CONTROL_RUN);

extern "C" fn handle_stop(_sig: i32) {
    CONTROL.store(CONTROL_STOP, Ordering::Relaxed);
}

extern "C" fn handle_alarm(_sig: i32) {
    CONTROL.store(CONTROL_ALARM, Ordering::Relaxed);
}

fn control_flag() -> ControlFlag {
    match CONTROL.load(Ordering::Relaxed) {
        CONTROL_STOP => ControlFlag::Stop,
        CONTROL_ALARM => ControlFlag::Alarm,
        _ => ControlFlag::Run,
    }
}

fn main() {
    setup_logging();

    match run() {
        Ok(reason) => std::process::exit(reason.code()),
        Err(err) => {
            tracing::error!("{err:#}");
            std::process::exit(-1);
        }
    }
}

fn run() -> Result<ExitReason> {
    info!("chargemon {} starting", env!("CARGO_PKG_VERSION"));

    let policy = Policy::load_default()
        .apply_args(std::env::args().skip(1))
        .context("invalid command line")?;
    debug!("policy: {:?}", policy);

    setup_signal_handlers()?;

    if policy.exit_on_alarm {
        arm_wake_alarm();
    }

    let mut telemetry = if policy.mock_battery {
        Telemetry::Mock(MockBattery::new())
    } else {
        Telemetry::Sysfs(PowerSupplyScanner::new())
    };

    // nothing to indicate when we are not even plugged in
    if policy.exit_on_unplug {
        let sample = BatterySample::from_info(&telemetry.sample());
        if !sample.charging {
            info!("not charging, exiting immediately");
            return Ok(ExitReason::Boot);
        }
    }

    let mut backlight = match Backlight::open() {
        Ok(backlight) => Some(backlight),
        Err(err) => {
            warn!("backlight unavailable, dimming disabled: {}", err);
            None
        }
    };

    let mut frontend = HeadlessFrontend::new();
    if policy.windowed {
        debug!("windowed mode requested; only a graphical frontend honors it");
    }

    let mut machine = Lifecycle::new(policy, frontend.dimensions(), Instant::now());
    let mut lit = true; // the panel is on when we inherit it

    while machine.running() {
        machine.absorb(control_flag());
        if !machine.running() {
            break;
        }

        let sample = BatterySample::from_info(&telemetry.sample());
        debug!(
            "battery {}%{}",
            sample.percent,
            if sample.charging { ", charging" } else { "" }
        );
        machine.tick(Instant::now(), sample);

        if machine.display_on() {
            frontend.present(&machine.frame());
        }

        for event in frontend.poll() {
            // re-read the battery so the power-key decision is current
            let sample = BatterySample::from_info(&telemetry.sample());
            machine.handle_event(Instant::now(), event, sample);
        }
        apply_backlight(&mut backlight, &mut lit, machine.display_on());

        thread::sleep(machine.tick_interval());

        machine.idle_tick(Instant::now());
        apply_backlight(&mut backlight, &mut lit, machine.display_on());
    }

    // leave the panel lit for whatever runs next
    if let Some(backlight) = &mut backlight {
        if let Err(err) = backlight.wake() {
            warn!("could not restore brightness: {}", err);
        }
    }

    let reason = machine.exit_reason();
    info!("exiting: {:?} (code {})", reason, reason.code());
    Ok(reason)
}

/// Battery feed: real sysfs scanner or the `-t` mock.
enum Telemetry {
    Sysfs(PowerSupplyScanner),
    Mock(MockBattery),
}

impl Telemetry {
    fn sample(&mut self) -> BatteryInfo {
        match self {
            Telemetry::Sysfs(scanner) => scanner.scan(),
            Telemetry::Mock(mock) => mock.sample(),
        }
    }
}

/// Write the backlight only on on/off transitions.
fn apply_backlight(backlight: &mut Option<Backlight>, lit: &mut bool, want_on: bool) {
    if *lit == want_on {
        return;
    }
    if let Some(backlight) = backlight {
        let result = if want_on {
            backlight.wake()
        } else {
            backlight.sleep()
        };
        if let Err(err) = result {
            warn!("backlight write failed: {}", err);
        }
    }
    *lit = want_on;
}

/// Setup logging to console
fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(false))
        .init();
}

/// Install handlers for termination signals and the alarm timer.
///
/// Handlers only store into [`CONTROL`]; no I/O, no allocation.
fn setup_signal_handlers() -> Result<()> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    let stop = SigAction::new(
        SigHandler::Handler(handle_stop),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let alarm = SigAction::new(
        SigHandler::Handler(handle_alarm),
        SaFlags::empty(),
        SigSet::empty(),
    );

    unsafe {
        sigaction(Signal::SIGINT, &stop)?;
        sigaction(Signal::SIGHUP, &stop)?;
        sigaction(Signal::SIGTERM, &stop)?;
        sigaction(Signal::SIGALRM, &alarm)?;
    }

    Ok(())
}

/// Read the pending RTC wake alarm and arm a matching software timer.
///
/// Any failure downgrades to "no alarm scheduled"; the indicator keeps
/// running either way.
fn arm_wake_alarm() {
    match rtc::read_wake_alarm(Path::new(rtc::RTC_DEVICE)) {
        Ok(WakeSchedule::Armed { seconds }) => {
            info!("RTC wake alarm due in {}s", seconds);
            nix::unistd::alarm::set(seconds);
        }
        Ok(WakeSchedule::NotArmed) => debug!("no pending RTC wake alarm"),
        Err(err) => info!("failed to read RTC {}: {}", rtc::RTC_DEVICE, err),
    }
}
