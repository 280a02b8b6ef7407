use {
    super::{Roots, parse_value},
    crate::{
        calc::{BatteryRaw, Micro},
        error::Error,
    },
    std::{
        collections::BTreeMap,
        fs,
        io::ErrorKind,
        path::{Path, PathBuf},
    },
    tracing::trace,
};

/// reads chargers and batteries from the power supply class.
///
/// supplies come and go (a laptop battery can be swapped, a dock unplugged), so the registry is
/// listed afresh every cycle and no handles are held between cycles.
#[derive(Clone, Debug)]
pub struct PowerReader {
    registry: PathBuf,
}

/// every power supply present at one instant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PowerSample {
    pub chargers: Vec<Charger>,
    /// batteries, keyed by the number at the end of their name (`BAT1` is 1).
    pub batteries: BTreeMap<u64, BatterySample>,
}

/// an external source of power, such as mains or usb.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Charger {
    pub name: String,
    pub online: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatterySample {
    pub name: String,
    pub raw: BatteryRaw,
    /// `Charging`, `Discharging`, `Full`, and so on, if the driver reports it.
    pub status: Option<String>,
}

enum Supply {
    Charger(Charger),
    Battery(BatterySample),
}

// === impl PowerReader ===

impl PowerReader {
    pub fn open(roots: &Roots) -> Self {
        Self {
            registry: roots.sys("class/power_supply"),
        }
    }

    pub fn sample(&self) -> Result<PowerSample, Error> {
        let Self { registry } = self;

        // no power supply class at all is a machine without batteries, not a failure.
        let entries = match fs::read_dir(registry) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PowerSample::default()),
            Err(e) => return Err(Error::read(registry.as_path())(e)),
        };

        let mut dirs = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::read(registry.as_path()))?;
        dirs.sort();

        let mut sample = PowerSample::default();
        let mut unnumbered = Vec::new();
        for dir in dirs.iter().filter(|d| d.is_dir()) {
            match Self::supply(dir)? {
                Some(Supply::Charger(charger)) => sample.chargers.push(charger),
                Some(Supply::Battery(battery)) => match Self::index(&battery.name) {
                    Some(i) if !sample.batteries.contains_key(&i) => {
                        sample.batteries.insert(i, battery);
                    }
                    _ => unnumbered.push(battery),
                },
                None => {}
            }
        }

        // batteries without a number in their name are placed after the numbered ones.
        let mut next = sample.batteries.keys().next_back().map_or(0, |i| i + 1);
        for battery in unnumbered {
            sample.batteries.insert(next, battery);
            next += 1;
        }

        Ok(sample)
    }

    /// reads one supply, or `None` if it is neither a charger nor a system battery.
    fn supply(dir: &Path) -> Result<Option<Supply>, Error> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // a supply that disappears while we look at it is skipped.
        let Some(kind) = Self::text(dir, "type")? else {
            return Ok(None);
        };
        trace!(%name, %kind, "found power supply");

        match kind.as_str() {
            "Mains" | "USB" | "Wireless" => {
                let online = Self::number(dir, "online")?.unwrap_or(0) != 0;
                Ok(Some(Supply::Charger(Charger { name, online })))
            }
            "Battery" => {
                // peripherals (mice, headsets) report scope "Device"; only system batteries count.
                if Self::text(dir, "scope")?.as_deref() == Some("Device") {
                    return Ok(None);
                }
                if Self::number(dir, "present")? == Some(0) {
                    return Ok(None);
                }
                let raw = Self::battery(dir)?;
                let status = Self::text(dir, "status")?;
                Ok(Some(Supply::Battery(BatterySample { name, raw, status })))
            }
            _ => Ok(None),
        }
    }

    /// reads a battery's energy and power, in micro-units.
    ///
    /// drivers that report charge (µAh) and current (µA) instead of energy and power are
    /// converted using the present voltage. current and power are signed, negative while
    /// discharging on many drivers; only their magnitude is kept, since `status` already says
    /// which way the charge is flowing.
    fn battery(dir: &Path) -> Result<BatteryRaw, Error> {
        let voltage = Self::number(dir, "voltage_now")?.unwrap_or(0);
        let times_voltage = |micro: u64| (micro as u128 * voltage as u128 / 1_000_000) as u64;

        let energy = |suffix: &str| -> Result<Option<u64>, Error> {
            match Self::number(dir, &format!("energy_{suffix}"))? {
                Some(energy) => Ok(Some(energy)),
                None => Ok(Self::number(dir, &format!("charge_{suffix}"))?.map(times_voltage)),
            }
        };
        let required = |value: Option<u64>, name: &'static str| {
            value.ok_or_else(|| Error::parse(dir.join(name), name, "<missing>"))
        };

        let energy_now = required(energy("now")?, "energy_now")?;
        let energy_full = required(energy("full")?, "energy_full")?;
        let energy_full_design = energy("full_design")?.unwrap_or(0);
        let power_now = match Self::magnitude(dir, "power_now")? {
            Some(power) => power,
            None => Self::magnitude(dir, "current_now")?.map_or(0, times_voltage),
        };

        Ok(BatteryRaw {
            energy_now: Micro(energy_now),
            energy_full: Micro(energy_full),
            energy_full_design: Micro(energy_full_design),
            power_now: Micro(power_now),
            voltage_now: Micro(voltage),
        })
    }

    /// the number at the end of a supply's name.
    fn index(name: &str) -> Option<u64> {
        let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        name[name.len() - digits..].parse::<u32>().ok().map(u64::from)
    }

    /// reads an attribute, or `None` if the driver does not provide it.
    fn text(dir: &Path, attribute: &str) -> Result<Option<String>, Error> {
        let path = dir.join(attribute);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text.trim().to_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::read(path)(e)),
        }
    }

    fn number(dir: &Path, attribute: &str) -> Result<Option<u64>, Error> {
        Self::text(dir, attribute)?
            .map(|text| parse_value(&dir.join(attribute), "a power supply attribute", &text))
            .transpose()
    }

    /// the absolute value of a signed attribute.
    fn magnitude(dir: &Path, attribute: &str) -> Result<Option<u64>, Error> {
        Self::text(dir, attribute)?
            .map(|text| parse_value::<i64>(&dir.join(attribute), "a power supply attribute", &text))
            .transpose()
            .map(|value| value.map(i64::unsigned_abs))
    }
}

// === impl PowerSample ===

impl PowerSample {
    /// whether any charger is supplying power.
    pub fn on_mains(&self) -> bool {
        self.chargers.iter().any(|c| c.online)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::calc::Battery};

    fn supply(roots: &Roots, name: &str, attributes: &[(&str, &str)]) {
        let dir = roots.sys("class/power_supply").join(name);
        fs::create_dir_all(&dir).unwrap();
        for (attribute, value) in attributes {
            fs::write(dir.join(attribute), format!("{value}\n")).unwrap();
        }
    }

    fn laptop(dir: &tempfile::TempDir, ac_online: &str) -> Roots {
        let roots = Roots {
            proc: dir.path().join("proc"),
            sys: dir.path().join("sys"),
        };
        supply(&roots, "AC", &[("type", "Mains"), ("online", ac_online)]);
        supply(
            &roots,
            "BAT0",
            &[
                ("type", "Battery"),
                ("status", "Discharging"),
                ("energy_now", "50000000"),
                ("energy_full", "100000000"),
                ("energy_full_design", "100000000"),
                ("power_now", "10000000"),
                ("voltage_now", "12000000"),
            ],
        );
        roots
    }

    #[test]
    fn battery_on_battery_power() {
        let dir = tempfile::tempdir().unwrap();
        let sample = PowerReader::open(&laptop(&dir, "0")).sample().unwrap();

        assert!(!sample.on_mains());
        assert_eq!(sample.chargers.len(), 1);
        let bat0 = &sample.batteries[&0];
        assert_eq!(bat0.status.as_deref(), Some("Discharging"));

        let battery = Battery::new(bat0.raw, sample.on_mains(), 8);
        assert_eq!(battery.voltage, 12.0);
        assert!((battery.current - 0.833).abs() < 1e-3);
        assert_eq!(battery.power, 10.0);
        assert_eq!(battery.percent, 50.0);
        // 50Wh at 10W: five hours.
        assert_eq!(battery.remaining.unwrap().as_secs(), 5 * 3600);
    }

    #[test]
    fn battery_on_mains() {
        let dir = tempfile::tempdir().unwrap();
        let sample = PowerReader::open(&laptop(&dir, "1")).sample().unwrap();
        assert!(sample.on_mains());

        let battery = Battery::new(sample.batteries[&0].raw, sample.on_mains(), 8);
        assert_eq!(battery.remaining, None);
    }

    #[test]
    fn registry_is_listed_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let roots = laptop(&dir, "0");
        let reader = PowerReader::open(&roots);
        assert_eq!(reader.sample().unwrap().batteries.len(), 1);

        fs::remove_dir_all(roots.sys("class/power_supply/BAT0")).unwrap();
        assert!(reader.sample().unwrap().batteries.is_empty());
    }

    #[test]
    fn no_registry_means_no_supplies() {
        let dir = tempfile::tempdir().unwrap();
        let roots = Roots {
            proc: dir.path().to_owned(),
            sys: dir.path().to_owned(),
        };
        let sample = PowerReader::open(&roots).sample().unwrap();
        assert_eq!(sample, PowerSample::default());
    }

    #[test]
    fn charge_is_converted_to_energy() {
        let dir = tempfile::tempdir().unwrap();
        let roots = Roots {
            proc: dir.path().join("proc"),
            sys: dir.path().join("sys"),
        };
        supply(
            &roots,
            "BAT1",
            &[
                ("type", "Battery"),
                ("charge_now", "2000000"),
                ("charge_full", "4000000"),
                ("current_now", "1000000"),
                ("voltage_now", "10000000"),
            ],
        );

        let sample = PowerReader::open(&roots).sample().unwrap();
        let raw = sample.batteries[&1].raw;
        assert_eq!(raw.energy_now, Micro(20_000_000));
        assert_eq!(raw.energy_full, Micro(40_000_000));
        assert_eq!(raw.power_now, Micro(10_000_000));
        assert_eq!(raw.energy_full_design, Micro(0));
    }

    #[test]
    fn discharging_current_is_negative() {
        let dir = tempfile::tempdir().unwrap();
        let roots = Roots {
            proc: dir.path().join("proc"),
            sys: dir.path().join("sys"),
        };
        supply(
            &roots,
            "BAT0",
            &[
                ("type", "Battery"),
                ("status", "Discharging"),
                ("charge_now", "2000000"),
                ("charge_full", "4000000"),
                ("current_now", "-1000000"),
                ("voltage_now", "10000000"),
            ],
        );
        supply(
            &roots,
            "BAT1",
            &[
                ("type", "Battery"),
                ("energy_now", "50000000"),
                ("energy_full", "100000000"),
                ("power_now", "-10000000"),
                ("voltage_now", "12000000"),
            ],
        );

        let sample = PowerReader::open(&roots).sample().unwrap();
        assert_eq!(sample.batteries[&0].raw.power_now, Micro(10_000_000));
        assert_eq!(sample.batteries[&1].raw.power_now, Micro(10_000_000));

        let battery = Battery::new(sample.batteries[&0].raw, sample.on_mains(), 8);
        assert_eq!(battery.current, 1.0);
        // 20Wh at 10W: two hours.
        assert_eq!(battery.remaining.unwrap().as_secs(), 2 * 3600);
    }

    #[test]
    fn peripherals_and_absent_batteries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let roots = laptop(&dir, "0");
        supply(&roots, "hidpp_battery_0", &[("type", "Battery"), ("scope", "Device")]);
        supply(&roots, "BAT1", &[("type", "Battery"), ("present", "0")]);
        supply(&roots, "ucsi-source-psy-USBC000:001", &[("type", "USB"), ("online", "0")]);

        let sample = PowerReader::open(&roots).sample().unwrap();
        assert_eq!(sample.batteries.keys().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(sample.chargers.len(), 2);
    }

    #[test]
    fn unnumbered_batteries_follow_numbered_ones() {
        let dir = tempfile::tempdir().unwrap();
        let roots = laptop(&dir, "0");
        supply(
            &roots,
            "macsmc-battery",
            &[("type", "Battery"), ("energy_now", "1"), ("energy_full", "2")],
        );

        let sample = PowerReader::open(&roots).sample().unwrap();
        assert_eq!(sample.batteries[&1].name, "macsmc-battery");
    }

    #[test]
    fn missing_energy_names_the_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let roots = laptop(&dir, "0");
        supply(&roots, "BAT2", &[("type", "Battery"), ("energy_full", "2")]);

        let err = PowerReader::open(&roots).sample().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("BAT2"), "{message}");
        assert!(message.contains("energy_now"), "{message}");
    }

    #[test]
    fn indices() {
        assert_eq!(PowerReader::index("BAT0"), Some(0));
        assert_eq!(PowerReader::index("BAT12"), Some(12));
        assert_eq!(PowerReader::index("battery"), None);
        assert_eq!(PowerReader::index("BAT99999999999"), None);
    }
}
