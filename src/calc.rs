//! conversions from raw kernel units, and derived rates and levels.
//!
//! everything here is a pure function of its inputs. readers hand over raw samples in the
//! kernel's own units, and the renderer only ever sees what this module produces.

use std::time::Duration;

/// an index into an ordered set of glyphs, always less than the set's length.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct Level(usize);

/// a value in millionths of a base SI unit: µW, µV, µWh.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct Micro(pub u64);

/// a frequency in kilohertz, as cpufreq reports it.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct KiloHertz(pub u64);

/// a size in kibibytes, as meminfo (mis)labels "kB".
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct KibiBytes(pub u64);

/// seconds per hour, for watt-hours to joules.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// the number of seconds in a day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// maps `value` onto one of `n` equal buckets spanning `[min, max]`.
///
/// values below `min` land in the first bucket, values at or above `max` in the last. `n` of
/// zero is treated as one.
pub fn level(min: f64, max: f64, value: f64, n: usize) -> Level {
    let last = n.max(1) - 1;

    if value.is_nan() || value <= min {
        return Level(0);
    }
    if value >= max || min >= max {
        return Level(last);
    }

    let fraction = (value - min) / (max - min);
    let bucket = (fraction * (last + 1) as f64).floor() as usize;
    Level(bucket.min(last))
}

/// the fraction of `elapsed` that was not spent idle, clamped to `[0, 1]`.
///
/// `elapsed` must be the measured interval, not the nominal refresh period.
pub fn busy_fraction(idle: Duration, elapsed: Duration) -> f64 {
    if elapsed.is_zero() {
        return 0.0;
    }

    let busy = 1.0 - idle.as_secs_f64() / elapsed.as_secs_f64();
    busy.clamp(0.0, 1.0)
}

/// idle time implied by a count of cycles at a maximum clock rate over an interval.
pub fn idle_from_cycles(cycles: u64, max: KiloHertz, elapsed: Duration) -> Duration {
    let hz = max.hz();
    if hz == 0.0 {
        return Duration::ZERO;
    }

    let busy = Duration::from_secs_f64((cycles as f64 / hz).min(elapsed.as_secs_f64()));
    elapsed.saturating_sub(busy)
}

// === impl Level ===

impl Level {
    pub fn index(self) -> usize {
        self.0
    }
}

// === impl Micro ===

impl Micro {
    /// converts to the base unit.
    pub fn to_base(self) -> f64 {
        self.0 as f64 / 1e6
    }

    /// converts from the base unit, rounding to the nearest micro-unit.
    pub fn from_base(base: f64) -> Self {
        Self((base * 1e6).round().max(0.0) as u64)
    }
}

// === impl KiloHertz ===

impl KiloHertz {
    pub fn hz(self) -> f64 {
        self.0 as f64 * 1e3
    }

    pub fn ghz(self) -> f64 {
        self.0 as f64 / 1e6
    }
}

// === impl KibiBytes ===

impl KibiBytes {
    pub fn bytes(self) -> u64 {
        self.0.saturating_mul(1024)
    }

    /// decimal gigabytes.
    pub fn gb(self) -> f64 {
        self.bytes() as f64 / 1e9
    }
}

/// a cpu's frequency relative to its scaling bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frequency {
    pub ghz: f64,
    pub level: Level,
}

impl Frequency {
    pub fn new(current: KiloHertz, min: KiloHertz, max: KiloHertz, glyphs: usize) -> Self {
        Self {
            ghz: current.ghz(),
            level: level(min.0 as f64, max.0 as f64, current.0 as f64, glyphs),
        }
    }
}

/// a cpu's load over one interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Load {
    pub percent: f64,
    pub level: Level,
}

impl Load {
    pub fn new(idle: Duration, elapsed: Duration, glyphs: usize) -> Self {
        let busy = busy_fraction(idle, elapsed);
        Self {
            percent: busy * 100.0,
            level: level(0.0, 1.0, busy, glyphs),
        }
    }
}

/// memory usage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Memory {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub used_gb: f64,
    pub total_gb: f64,
    pub percent: f64,
}

impl Memory {
    pub fn new(total: KibiBytes, available: KibiBytes) -> Self {
        let used = KibiBytes(total.0.saturating_sub(available.0));
        let percent = if total.0 == 0 {
            0.0
        } else {
            used.0 as f64 / total.0 as f64 * 100.0
        };

        Self {
            total_bytes: total.bytes(),
            available_bytes: available.bytes(),
            used_bytes: used.bytes(),
            used_gb: used.gb(),
            total_gb: total.gb(),
            percent,
        }
    }
}

/// raw battery attributes, in micro-units.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatteryRaw {
    pub energy_now: Micro,
    pub energy_full: Micro,
    pub energy_full_design: Micro,
    pub power_now: Micro,
    pub voltage_now: Micro,
}

/// a battery's state in base units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Battery {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy_wh: f64,
    pub energy_full_wh: f64,
    pub energy_joules: f64,
    pub percent: f64,
    /// full capacity relative to design capacity.
    pub health: Option<f64>,
    /// estimated time until empty. only known when discharging with positive draw, and when
    /// the estimate fits in a `Duration`.
    pub remaining: Option<Duration>,
    pub level: Level,
}

impl Battery {
    pub fn new(raw: BatteryRaw, charging_source_online: bool, glyphs: usize) -> Self {
        let BatteryRaw {
            energy_now,
            energy_full,
            energy_full_design,
            power_now,
            voltage_now,
        } = raw;

        let voltage = voltage_now.to_base();
        let power = power_now.to_base();
        let energy_wh = energy_now.to_base();
        let energy_full_wh = energy_full.to_base();
        let energy_joules = energy_wh * SECONDS_PER_HOUR;
        let current = if voltage > 0.0 { power / voltage } else { 0.0 };

        let percent = if energy_full_wh > 0.0 {
            100.0 * energy_wh / energy_full_wh
        } else {
            0.0
        };
        let health = (energy_full_design.0 > 0)
            .then(|| 100.0 * energy_full_wh / energy_full_design.to_base());
        let remaining = if !charging_source_online && power > 0.0 {
            Duration::try_from_secs_f64(energy_joules / power).ok()
        } else {
            None
        };

        Self {
            voltage,
            current,
            power,
            energy_wh,
            energy_full_wh,
            energy_joules,
            percent,
            health,
            remaining,
            level: level(0.0, 100.0, percent, glyphs),
        }
    }
}
