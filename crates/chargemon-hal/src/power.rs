//! Battery and power-source telemetry via sysfs.
//!
//! Walks the kernel power-supply class, classifies each node, and folds the
//! per-node readings into a single [`BatteryInfo`] for this tick. Readings
//! are heterogeneous and partially missing on real hardware: drivers omit
//! `capacity`, report zero for "unknown" time-to-empty, or expose the same
//! physical battery twice. All of that is absorbed here so callers see one
//! best-effort snapshot per scan, never an error.

use crate::fuel;
use std::fs;
use std::path::PathBuf;

/// Power-supply class directory.
pub const POWER_SUPPLY_SYSFS: &str = "/sys/class/power_supply";

/// Nodes that double-report a battery already covered by another node.
///
/// The Nokia N900 exposes both `rx51-battery` and `bq27200-0` with
/// `type=Battery` for the same physical cell; keep the gauge, skip the
/// other.
pub const DUPLICATE_SUPPLY_DENYLIST: &[&str] = &["rx51-battery"];

/// Battery charge state as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    NoBattery,
    Unknown,
    Charging,
    OnBattery,
    Full,
}

impl ChargeState {
    /// Human-readable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeState::NoBattery => "no battery",
            ChargeState::Unknown => "unknown",
            ChargeState::Charging => "charging",
            ChargeState::OnBattery => "on battery",
            ChargeState::Full => "full",
        }
    }
}

/// What is powering the system right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
    Battery,
    Usb,
    Unknown,
}

/// One scan's fused battery snapshot.
///
/// Every field is independently absent-capable: absent and zero are
/// different readings. `fraction` is in `[0, 1]` whenever present.
#[derive(Debug, Clone)]
pub struct BatteryInfo {
    pub source: PowerSource,
    pub state: ChargeState,
    /// 1.0 == 100%
    pub fraction: Option<f64>,
    /// Estimated seconds until empty.
    pub seconds: Option<i64>,
    /// Volts.
    pub voltage: Option<f64>,
    /// Amperes, < 0 charging, > 0 discharging.
    pub current: Option<f64>,
    /// Degrees celsius.
    pub temperature: Option<f64>,
}

impl BatteryInfo {
    /// Snapshot with nothing known, used when the supply tree is missing.
    pub fn unknown() -> Self {
        Self {
            source: PowerSource::Unknown,
            state: ChargeState::NoBattery,
            fraction: None,
            seconds: None,
            voltage: None,
            current: None,
            temperature: None,
        }
    }
}

/// Raw per-node readings before unit conversion.
#[derive(Debug, Clone)]
struct BatteryNode {
    state: ChargeState,
    /// Capacity in percent, clamped to <= 100.
    percent: Option<i64>,
    /// Seconds until empty; zero or negative reads as unknown.
    seconds: Option<i64>,
    voltage_uv: Option<i64>,
    current_ua: Option<i64>,
    temp_deci: Option<i64>,
}

/// Enumerates power-supply nodes and selects the most authoritative one.
pub struct PowerSupplyScanner {
    base: PathBuf,
}

impl PowerSupplyScanner {
    pub fn new() -> Self {
        Self::with_base(POWER_SUPPLY_SYSFS)
    }

    /// Scan a different class directory, mainly for tests.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Read all supply nodes and fuse them into one snapshot.
    ///
    /// Visits every node in filesystem-enumeration order; ordering only
    /// matters on exact selection ties, where the first node seen wins. An
    /// unreadable class directory yields an all-unknown snapshot, never an
    /// error.
    pub fn scan(&self) -> BatteryInfo {
        let mut info = BatteryInfo::unknown();

        let entries = match fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!("power supply tree {} unavailable: {}", self.base.display(), err);
                return info;
            }
        };

        let mut have_battery = false;

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();

            if DUPLICATE_SUPPLY_DENYLIST.contains(&name.as_str()) {
                continue;
            }

            let Some(kind) = self.read_field(&name, "type") else {
                continue; // don't know what we're looking at
            };

            let is_battery = match kind.as_str() {
                "Battery" => true,
                "USB" => false,
                _ => continue,
            };

            // scope "device" means something like a controller reporting its
            // own battery, not something that powers the system; no scope at
            // all means a system battery
            if self.read_field(&name, "scope").as_deref() == Some("device") {
                continue;
            }

            if is_battery {
                let node = self.read_battery_node(&name);
                have_battery = consider(&mut info, &node, have_battery);
            } else if let Some(online) = self.read_field(&name, "online") {
                // Known quirk, preserved: a nonzero `online` is ignored, so
                // this probe only ever demotes the source to Battery and
                // never reports Usb. See DESIGN.md before changing.
                if online == "0" {
                    info.source = PowerSource::Battery;
                }
            }
        }

        info
    }

    /// Parse one battery node's fields; any unreadable field stays absent.
    fn read_battery_node(&self, name: &str) -> BatteryNode {
        // some drivers don't offer `present`; assume present unless it says
        // otherwise
        let absent = self.read_field(name, "present").is_some_and(|v| v == "0");

        let state = if absent {
            ChargeState::NoBattery
        } else {
            match self.read_field(name, "status").as_deref() {
                Some("Charging") => ChargeState::Charging,
                Some("Discharging") => ChargeState::OnBattery,
                Some("Full") | Some("Not charging") => ChargeState::Full,
                _ => ChargeState::Unknown,
            }
        };

        BatteryNode {
            state,
            percent: self.read_int(name, "capacity").map(|pct| pct.min(100)),
            seconds: self
                .read_int(name, "time_to_empty_now")
                .filter(|&secs| secs > 0),
            voltage_uv: self.read_int(name, "voltage_now"),
            current_ua: self.read_int(name, "current_now"),
            temp_deci: self.read_int(name, "temp"),
        }
    }

    fn read_field(&self, node: &str, key: &str) -> Option<String> {
        let raw = fs::read_to_string(self.base.join(node).join(key)).ok()?;
        Some(raw.trim_end_matches('\n').to_string())
    }

    fn read_int(&self, node: &str, key: &str) -> Option<i64> {
        self.read_field(node, key)?.trim().parse().ok()
    }
}

impl Default for PowerSupplyScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Greedy best-of fold across battery nodes.
///
/// Prefers the node with the largest known time-to-empty, then the largest
/// known percentage (compared against the current best's possibly-estimated
/// fraction), then simply having any battery over none. The first node seen
/// keeps exact ties. Returns whether a battery has been adopted so far.
fn consider(info: &mut BatteryInfo, node: &BatteryNode, have_battery: bool) -> bool {
    let choose = match (node.seconds, info.seconds) {
        (Some(candidate), Some(best)) => candidate > best,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => match (node.percent, info.fraction) {
            (Some(candidate), Some(best)) => candidate as f64 > best * 100.0,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            // at least we know there's a battery
            (None, None) => !have_battery,
        },
    };

    if !choose {
        return have_battery;
    }

    adopt(info, node);
    true
}

/// Copy a node's readings into the snapshot, converting units and filling
/// the fraction from the fuel estimator when the reported capacity is
/// absent or out of range.
fn adopt(info: &mut BatteryInfo, node: &BatteryNode) {
    info.state = node.state;
    info.seconds = node.seconds;
    info.fraction = node.percent.map(|pct| pct as f64 / 100.0);
    info.voltage = node.voltage_uv.map(|uv| uv as f64 / 1_000_000.0);
    info.current = node.current_ua.map(|ua| ua as f64 / 1_000_000.0);
    info.temperature = node.temp_deci.map(|deci| deci as f64 / 10.0);

    let usable = info.fraction.is_some_and(|f| (0.0..=1.0).contains(&f));
    if !usable {
        if let Some(voltage) = info.voltage {
            let estimated = fuel::soc_fraction(voltage, info.current);
            tracing::debug!(
                "capacity unusable ({:?}), estimated {:.0}% from {:.2} V",
                info.fraction,
                estimated * 100.0,
                voltage
            );
            info.fraction = Some(estimated);
        } else {
            info.fraction = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_node(base: &Path, name: &str, fields: &[(&str, &str)]) {
        let dir = base.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (key, value) in fields {
            fs::write(dir.join(key), format!("{value}\n")).unwrap();
        }
    }

    fn node(
        seconds: Option<i64>,
        percent: Option<i64>,
        voltage_uv: Option<i64>,
    ) -> BatteryNode {
        BatteryNode {
            state: ChargeState::OnBattery,
            percent,
            seconds,
            voltage_uv,
            current_ua: None,
            temp_deci: None,
        }
    }

    fn fold(nodes: &[BatteryNode]) -> BatteryInfo {
        let mut info = BatteryInfo::unknown();
        let mut have_battery = false;
        for n in nodes {
            have_battery = consider(&mut info, n, have_battery);
        }
        info
    }

    #[test]
    fn test_largest_time_to_empty_wins() {
        let info = fold(&[
            node(Some(1200), Some(80), None),
            node(Some(5400), Some(10), None),
            node(Some(3600), Some(90), None),
        ]);
        assert_eq!(info.seconds, Some(5400));
        assert_eq!(info.fraction, Some(0.10));
    }

    #[test]
    fn test_percentage_breaks_missing_seconds() {
        let info = fold(&[node(None, Some(80), None), node(None, Some(40), None)]);
        assert_eq!(info.fraction, Some(0.80));
    }

    #[test]
    fn test_known_seconds_beats_any_percentage() {
        let info = fold(&[node(None, Some(99), None), node(Some(60), Some(5), None)]);
        assert_eq!(info.seconds, Some(60));
        assert_eq!(info.fraction, Some(0.05));
    }

    #[test]
    fn test_any_battery_beats_none() {
        let info = fold(&[node(None, None, None)]);
        assert_eq!(info.state, ChargeState::OnBattery);
        assert_eq!(info.fraction, None);
    }

    #[test]
    fn test_first_seen_keeps_ties() {
        let mut first = node(None, None, Some(3_900_000));
        first.state = ChargeState::Charging;
        let second = node(None, None, None);
        let info = fold(&[first, second]);
        // the second node brings nothing better; the first stays selected
        assert_eq!(info.state, ChargeState::Charging);
    }

    #[test]
    fn test_estimator_fills_missing_capacity() {
        let info = fold(&[node(None, None, Some(4_200_000))]);
        let fraction = info.fraction.expect("estimated fraction");
        assert!(fraction > 0.95, "4.2 V should estimate near full, got {fraction}");
    }

    #[test]
    fn test_out_of_range_capacity_clamped() {
        let tmp = TempDir::new().unwrap();
        write_node(
            tmp.path(),
            "bat0",
            &[("type", "Battery"), ("status", "Discharging"), ("capacity", "150")],
        );
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.fraction, Some(1.0));
    }

    #[test]
    fn test_scan_reads_and_converts_fields() {
        let tmp = TempDir::new().unwrap();
        write_node(
            tmp.path(),
            "bat0",
            &[
                ("type", "Battery"),
                ("status", "Charging"),
                ("capacity", "42"),
                ("voltage_now", "3812000"),
                ("current_now", "-210000"),
                ("temp", "284"),
                ("time_to_empty_now", "7200"),
            ],
        );
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.state, ChargeState::Charging);
        assert_eq!(info.fraction, Some(0.42));
        assert_eq!(info.seconds, Some(7200));
        assert_eq!(info.voltage, Some(3.812));
        assert_eq!(info.current, Some(-0.21));
        assert_eq!(info.temperature, Some(28.4));
    }

    #[test]
    fn test_zero_time_to_empty_is_unknown() {
        let tmp = TempDir::new().unwrap();
        write_node(
            tmp.path(),
            "bat0",
            &[
                ("type", "Battery"),
                ("status", "Discharging"),
                ("capacity", "50"),
                ("time_to_empty_now", "0"),
            ],
        );
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.seconds, None);
    }

    #[test]
    fn test_denylisted_node_never_selected() {
        let tmp = TempDir::new().unwrap();
        write_node(
            tmp.path(),
            "rx51-battery",
            &[
                ("type", "Battery"),
                ("status", "Discharging"),
                ("capacity", "99"),
                ("time_to_empty_now", "99999"),
            ],
        );
        write_node(
            tmp.path(),
            "bq27200-0",
            &[("type", "Battery"), ("status", "Discharging"), ("capacity", "37")],
        );
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.fraction, Some(0.37));
        assert_eq!(info.seconds, None);
    }

    #[test]
    fn test_device_scope_never_selected() {
        let tmp = TempDir::new().unwrap();
        write_node(
            tmp.path(),
            "gamepad-battery",
            &[
                ("type", "Battery"),
                ("scope", "device"),
                ("status", "Discharging"),
                ("capacity", "100"),
            ],
        );
        write_node(
            tmp.path(),
            "bat0",
            &[("type", "Battery"), ("status", "Discharging"), ("capacity", "12")],
        );
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.fraction, Some(0.12));
    }

    #[test]
    fn test_absent_present_file_means_present() {
        let tmp = TempDir::new().unwrap();
        write_node(
            tmp.path(),
            "bat0",
            &[("type", "Battery"), ("status", "Full"), ("capacity", "100")],
        );
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.state, ChargeState::Full);
    }

    #[test]
    fn test_not_present_battery_reports_no_battery() {
        let tmp = TempDir::new().unwrap();
        write_node(
            tmp.path(),
            "bat0",
            &[("type", "Battery"), ("present", "0"), ("status", "Discharging")],
        );
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.state, ChargeState::NoBattery);
    }

    #[test]
    fn test_usb_online_zero_reports_battery_source() {
        let tmp = TempDir::new().unwrap();
        write_node(tmp.path(), "usb", &[("type", "USB"), ("online", "0")]);
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.source, PowerSource::Battery);
    }

    #[test]
    fn test_usb_online_nonzero_leaves_source_unknown() {
        // preserved quirk: a powered USB supply does not promote the source
        let tmp = TempDir::new().unwrap();
        write_node(tmp.path(), "usb", &[("type", "USB"), ("online", "1")]);
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.source, PowerSource::Unknown);
    }

    #[test]
    fn test_missing_tree_degrades_to_unknown() {
        let info = PowerSupplyScanner::with_base("/nonexistent/power_supply").scan();
        assert_eq!(info.state, ChargeState::NoBattery);
        assert_eq!(info.source, PowerSource::Unknown);
        assert_eq!(info.fraction, None);
    }

    #[test]
    fn test_unparsable_field_is_absent() {
        let tmp = TempDir::new().unwrap();
        write_node(
            tmp.path(),
            "bat0",
            &[("type", "Battery"), ("status", "Discharging"), ("capacity", "garbage")],
        );
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        // no capacity and no voltage: fraction stays unknown
        assert_eq!(info.fraction, None);
        assert_eq!(info.state, ChargeState::OnBattery);
    }

    #[test]
    fn test_unclassifiable_node_skipped() {
        let tmp = TempDir::new().unwrap();
        write_node(tmp.path(), "weird", &[("type", "Wireless"), ("capacity", "77")]);
        let info = PowerSupplyScanner::with_base(tmp.path()).scan();
        assert_eq!(info.fraction, None);
    }
}
