use {
    crate::{
        calc::{Battery, Frequency, Load, Memory},
        config::{Config, LoadKind, OnError},
        error::Error,
        meter::Glyphs,
        reader::{
            CpuReader, LoadCounter, MemoryReader, PerfLoad, PowerReader, ProcStatLoad,
            TimeReader, UptimeReader, online_cpus,
        },
        report::{BatteryReading, CpuReading, PowerReading, Readings},
        source::{Fresh, Reread},
    },
    std::time::Duration,
    tracing::{info, warn},
};

/// observes every counter once per cycle.
///
/// the sentinel owns each reader, and with them every handle opened at startup. each call to
/// [`Sentinel::observe()`] samples the readers and derives what the report will show.
pub struct Sentinel<F = Reread> {
    time: TimeReader,
    uptime: UptimeReader<F>,
    cpu: CpuReader<F>,
    load: Option<Box<dyn LoadCounter>>,
    memory: MemoryReader<F>,
    power: PowerReader,
    glyphs: Glyphs,
    on_error: OnError,
}

// === impl Sentinel ===

impl Sentinel {
    /// opens every reader.
    ///
    /// any source that cannot be opened here is a fatal error, whatever the error policy.
    pub fn open(config: &Config) -> Result<Self, Error> {
        let roots = config.roots();

        let count = online_cpus().unwrap_or_else(|| {
            warn!("could not count online cpus, assuming one");
            1
        });
        let cpu = CpuReader::open(&roots, count)?;
        let load: Option<Box<dyn LoadCounter>> = match config.load {
            LoadKind::Stat => Some(Box::new(ProcStatLoad::open(&roots)?)),
            LoadKind::Perf => {
                let cpus = cpu.bounds().map(|(id, _, max)| (id, max));
                Some(Box::new(PerfLoad::open(cpus)?))
            }
            LoadKind::None => None,
        };
        info!(cpus = count, load = ?config.load, "opened counters");

        Ok(Self {
            time: TimeReader,
            uptime: UptimeReader::open(&roots)?,
            cpu,
            load,
            memory: MemoryReader::open(&roots)?,
            power: PowerReader::open(&roots),
            glyphs: config.glyphs,
            on_error: config.on_error,
        })
    }
}

impl<F: Fresh> Sentinel<F> {
    /// samples every counter.
    ///
    /// `elapsed` is the measured time since the previous cycle began, or `None` on the first
    /// cycle. under [`OnError::Abort`] the first failure is returned; under [`OnError::Skip`]
    /// it is logged and kept in the [`Readings`] in place of that section.
    pub fn observe(&mut self, elapsed: Option<Duration>) -> Result<Readings, Error> {
        let Self {
            time,
            uptime,
            cpu,
            load,
            memory,
            power,
            glyphs,
            on_error,
        } = self;
        let (n, policy) = (glyphs.count(), *on_error);

        let time = time.sample();
        let uptime = Self::guard(policy, "uptime", uptime.sample())?;
        let cpus = Self::guard(policy, "cpu", Self::cpus(cpu, load, elapsed, n))?;
        let memory = Self::guard(
            policy,
            "memory",
            memory
                .sample()
                .map(|sample| Memory::new(sample.total, sample.available)),
        )?;
        let power = Self::guard(policy, "battery", Self::power(power, n))?;

        Ok(Readings {
            time,
            uptime,
            cpus,
            memory,
            power,
        })
    }

    fn cpus(
        cpu: &mut CpuReader<F>,
        load: &mut Option<Box<dyn LoadCounter>>,
        elapsed: Option<Duration>,
        n: usize,
    ) -> Result<Vec<CpuReading>, Error> {
        // the load counters are read before anything can fail, so that reset-on-read counters
        // always cover exactly one interval.
        let idle = match load {
            Some(load) => load.idle(elapsed)?,
            None => None,
        };

        let readings = cpu
            .sample()?
            .into_iter()
            .map(|sample| {
                let load = idle
                    .as_ref()
                    .and_then(|idle| idle.get(&sample.id))
                    .zip(elapsed)
                    .map(|(idle, elapsed)| Load::new(*idle, elapsed, n));

                CpuReading {
                    id: sample.id,
                    frequency: Frequency::new(sample.current, sample.min, sample.max, n),
                    load,
                }
            })
            .collect();

        Ok(readings)
    }

    fn power(power: &PowerReader, n: usize) -> Result<PowerReading, Error> {
        let sample = power.sample()?;
        let on_mains = sample.on_mains();

        let batteries = sample
            .batteries
            .into_iter()
            .map(|(index, battery)| BatteryReading {
                index,
                name: battery.name,
                status: battery.status,
                battery: Battery::new(battery.raw, on_mains, n),
            })
            .collect();

        Ok(PowerReading {
            chargers: sample.chargers,
            batteries,
        })
    }

    /// applies the error policy to one section's result.
    fn guard<T>(
        policy: OnError,
        section: &'static str,
        result: Result<T, Error>,
    ) -> Result<Result<T, Error>, Error> {
        match (result, policy) {
            (Ok(value), _) => Ok(Ok(value)),
            (Err(error), OnError::Abort) => Err(error),
            (Err(error), OnError::Skip) => {
                warn!(section, %error, "section unavailable this cycle");
                Ok(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            reader::Roots,
            source::MockFresh,
        },
    };

    const SECOND: Duration = Duration::from_secs(1);

    const STAT: [&str; 2] = [
        "cpu  100 0 0 100 0 0 0 0 0 0\ncpu0 100 0 0 100 0 0 0 0 0 0\n",
        "cpu  150 0 0 150 0 0 0 0 0 0\ncpu0 175 0 0 125 0 0 0 0 0 0\n",
    ];

    fn mock(
        dir: &tempfile::TempDir,
        on_error: OnError,
        meminfo: &[&str],
    ) -> Sentinel<MockFresh> {
        let roots = Roots {
            proc: dir.path().join("proc"),
            sys: dir.path().join("sys"),
        };
        let freq = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq";

        Sentinel {
            time: TimeReader,
            uptime: UptimeReader::new(MockFresh::new(
                "/proc/uptime",
                ["10.5 20.0\n", "11.5 21.0\n"],
            )),
            cpu: CpuReader::from_parts([(
                0,
                MockFresh::new(freq, ["1200000\n", "3600000\n"]),
                400_000,
                3_600_000,
            )]),
            load: Some(Box::new(ProcStatLoad::new(MockFresh::new("/proc/stat", STAT), 100))),
            memory: MemoryReader::new(MockFresh::new("/proc/meminfo", meminfo.iter().copied())),
            power: PowerReader::open(&roots),
            glyphs: Glyphs::Ascii,
            on_error,
        }
    }

    const MEMINFO: &str = "MemTotal: 1000 kB\nMemAvailable: 250 kB\n";

    #[test]
    fn first_cycle_has_no_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut sentinel = mock(&dir, OnError::Abort, &[MEMINFO, MEMINFO]);

        let readings = sentinel.observe(None).unwrap();
        let cpus = readings.cpus.unwrap();
        assert_eq!(cpus.len(), 1);
        assert_eq!(cpus[0].load, None);
        assert_eq!(cpus[0].frequency.ghz, 1.2);
        assert_eq!(readings.uptime.unwrap().up, Duration::from_millis(10_500));
        assert_eq!(readings.memory.unwrap().percent, 75.0);
        assert!(readings.power.unwrap().batteries.is_empty());
    }

    #[test]
    fn second_cycle_derives_load_from_elapsed_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut sentinel = mock(&dir, OnError::Abort, &[MEMINFO, MEMINFO]);
        sentinel.observe(None).unwrap();

        // cpu0 was idle for 25 of 100 ticks, a quarter of the second that elapsed.
        let readings = sentinel.observe(Some(SECOND)).unwrap();
        let cpus = readings.cpus.unwrap();
        let load = cpus[0].load.unwrap();
        assert_eq!(load.percent, 75.0);
        assert_eq!(cpus[0].frequency.level.index(), 2);
    }

    #[test]
    fn abort_returns_the_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut sentinel = mock(&dir, OnError::Abort, &["MemTotal: 1 kB\n"]);

        let err = sentinel.observe(None).unwrap_err();
        assert!(matches!(err, Error::ParseFailure { what: "MemAvailable", .. }));
    }

    #[test]
    fn skip_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let mut sentinel = mock(&dir, OnError::Skip, &["MemTotal: 1 kB\n", MEMINFO]);

        let readings = sentinel.observe(None).unwrap();
        assert!(readings.memory.is_err());
        assert!(readings.cpus.is_ok());

        // the next cycle recovers.
        let readings = sentinel.observe(Some(SECOND)).unwrap();
        assert!(readings.memory.is_ok());
    }
}
