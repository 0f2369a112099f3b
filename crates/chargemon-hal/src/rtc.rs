//! RTC wake-alarm readout.
//!
//! Firmware on these devices powers the machine back on for a pending RTC
//! alarm, which lands the boot in this indicator instead of the alarm's
//! real target. Reading the pending alarm at startup lets the caller arm a
//! software timer and hand control back (exit reason Alarm) the moment the
//! hardware alarm was meant to fire.

use crate::{HalError, Result};
use std::fs::File;
use std::mem;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default RTC character device.
pub const RTC_DEVICE: &str = "/dev/rtc0";

// `struct rtc_time` from <linux/rtc.h>. Layout-compatible with the kernel ABI
// (not exported by the `libc` crate, so mirrored here).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct RtcTime {
    tm_sec: libc::c_int,
    tm_min: libc::c_int,
    tm_hour: libc::c_int,
    tm_mday: libc::c_int,
    tm_mon: libc::c_int,
    tm_year: libc::c_int,
    tm_wday: libc::c_int,
    tm_yday: libc::c_int,
    tm_isdst: libc::c_int,
}

// `struct rtc_wkalrm` from <linux/rtc.h>.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct RtcWkalrm {
    enabled: libc::c_uchar,
    pending: libc::c_uchar,
    time: RtcTime,
}

// RTC_WKALM_RD from <linux/rtc.h>
nix::ioctl_read!(rtc_wkalm_rd, b'p', 0x10, RtcWkalrm);

/// Outcome of a wake-alarm read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSchedule {
    /// An enabled alarm lies in the future, this many seconds away.
    Armed { seconds: u32 },
    /// No enabled alarm, an unset time, or an alarm already due.
    NotArmed,
}

/// Read the pending hardware wake alarm and compute its distance from now.
///
/// Errors only on ioctl or time-conversion failure; callers log and treat
/// that the same as no alarm.
pub fn read_wake_alarm(device: &Path) -> Result<WakeSchedule> {
    let rtc = File::open(device)?;

    let mut wake: RtcWkalrm = unsafe { mem::zeroed() };
    unsafe { rtc_wkalm_rd(rtc.as_raw_fd(), &mut wake) }?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| HalError::AlarmTime)?
        .as_secs() as i64;

    wake_delta(&wake, now)
}

/// Distance from `now` (epoch seconds) to the alarm in `wake`.
///
/// A disabled alarm or the hardware's unset-year sentinel reads as
/// [`WakeSchedule::NotArmed`]. The broken-down time is interpreted as local
/// time with the DST flag left to the OS.
fn wake_delta(wake: &RtcWkalrm, now: i64) -> Result<WakeSchedule> {
    if wake.enabled != 1 || wake.time.tm_year == -1 {
        return Ok(WakeSchedule::NotArmed);
    }

    let mut tm: libc::tm = unsafe { mem::zeroed() };
    tm.tm_sec = wake.time.tm_sec;
    tm.tm_min = wake.time.tm_min;
    tm.tm_hour = wake.time.tm_hour;
    tm.tm_mday = wake.time.tm_mday;
    tm.tm_mon = wake.time.tm_mon;
    tm.tm_year = wake.time.tm_year;
    tm.tm_isdst = -1; // the OS knows the DST state better than the RTC

    let alarm_time = unsafe { libc::mktime(&mut tm) };
    if alarm_time == -1 {
        return Err(HalError::AlarmTime);
    }

    let delta = alarm_time - now;
    if delta > 0 {
        Ok(WakeSchedule::Armed {
            seconds: delta as u32,
        })
    } else {
        // already due
        Ok(WakeSchedule::NotArmed)
    }
}
