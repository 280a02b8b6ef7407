use {
    super::{Roots, parse_value, read_value},
    crate::{
        calc::KiloHertz,
        error::Error,
        source::{Fresh, Reread},
        stat::CpuId,
    },
    std::path::PathBuf,
    tracing::debug,
};

/// reads each cpu's current scaling frequency.
///
/// the current frequency of every cpu is held open and reread each cycle. the scaling bounds
/// are read once, when the reader is opened, since they do not change during a session.
#[derive(Debug)]
pub struct CpuReader<F = Reread> {
    cpus: Vec<Cpu<F>>,
}

#[derive(Debug)]
struct Cpu<F> {
    id: CpuId,
    current: F,
    min: KiloHertz,
    max: KiloHertz,
}

/// one cpu's frequency, with the bounds it scales between.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CpuSample {
    pub id: CpuId,
    pub current: KiloHertz,
    pub min: KiloHertz,
    pub max: KiloHertz,
}

/// the number of cpus currently online.
pub fn online_cpus() -> Option<u32> {
    // SAFETY: sysconf has no preconditions; it returns -1 for unknown names.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    u32::try_from(n).ok().filter(|n| *n > 0)
}

// === impl CpuReader ===

impl CpuReader {
    /// opens the frequency files of cpus `0..count`.
    pub fn open(roots: &Roots, count: u32) -> Result<Self, Error> {
        let cpus = (0..count)
            .map(|id| -> Result<Cpu<Reread>, Error> {
                let dir = Self::cpufreq(roots, id);
                let min = read_value(&dir.join("scaling_min_freq"), "minimum frequency")
                    .map(KiloHertz)
                    .map_err(Self::unavailable)?;
                let max = read_value(&dir.join("scaling_max_freq"), "maximum frequency")
                    .map(KiloHertz)
                    .map_err(Self::unavailable)?;
                let current = Reread::open(dir.join("scaling_cur_freq"))?;
                debug!(cpu = id, min = min.0, max = max.0, "opened cpu frequency");

                Ok(Cpu {
                    id: CpuId::new(id),
                    current,
                    min,
                    max,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { cpus })
    }

    fn cpufreq(roots: &Roots, id: u32) -> PathBuf {
        roots.sys(format!("devices/system/cpu/cpu{id}/cpufreq"))
    }

    /// a bound that cannot be read at startup means the display cannot work at all.
    fn unavailable(error: Error) -> Error {
        match error {
            Error::ReadFailure { path, source } => Error::ResourceUnavailable { path, source },
            other => other,
        }
    }
}

impl<F: Fresh> CpuReader<F> {
    /// the cpus this reader observes, with their fixed scaling bounds.
    pub fn bounds(&self) -> impl Iterator<Item = (CpuId, KiloHertz, KiloHertz)> + '_ {
        self.cpus.iter().map(|cpu| (cpu.id, cpu.min, cpu.max))
    }

    pub fn sample(&mut self) -> Result<Vec<CpuSample>, Error> {
        let Self { cpus } = self;

        cpus.iter_mut()
            .map(|cpu| -> Result<CpuSample, Error> {
                let path = cpu.current.path().to_owned();
                let text = cpu.current.fresh()?;
                let current = parse_value(&path, "current frequency", text).map(KiloHertz)?;

                Ok(CpuSample {
                    id: cpu.id,
                    current,
                    min: cpu.min,
                    max: cpu.max,
                })
            })
            .collect()
    }
}

#[cfg(test)]
impl<F: Fresh> CpuReader<F> {
    pub(crate) fn from_parts(cpus: impl IntoIterator<Item = (u32, F, u64, u64)>) -> Self {
        let cpus = cpus
            .into_iter()
            .map(|(id, current, min, max)| Cpu {
                id: CpuId::new(id),
                current,
                min: KiloHertz(min),
                max: KiloHertz(max),
            })
            .collect();

        Self { cpus }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::source::MockFresh, std::fs};

    fn fake_cpu(roots: &Roots, id: u32, min: u64, cur: u64, max: u64) {
        let dir = CpuReader::cpufreq(roots, id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("scaling_min_freq"), format!("{min}\n")).unwrap();
        fs::write(dir.join("scaling_cur_freq"), format!("{cur}\n")).unwrap();
        fs::write(dir.join("scaling_max_freq"), format!("{max}\n")).unwrap();
    }

    fn roots(dir: &tempfile::TempDir) -> Roots {
        Roots {
            proc: dir.path().join("proc"),
            sys: dir.path().join("sys"),
        }
    }

    #[test]
    fn reads_bounds_once_and_current_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let roots = roots(&dir);
        fake_cpu(&roots, 0, 400_000, 1_200_000, 3_600_000);
        fake_cpu(&roots, 1, 400_000, 3_600_000, 3_600_000);

        let mut reader = CpuReader::open(&roots, 2).unwrap();
        let samples = reader.sample().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].current, KiloHertz(1_200_000));
        assert_eq!(samples[1].max, KiloHertz(3_600_000));

        // bounds are cached; the current frequency is not.
        let cpu0 = CpuReader::cpufreq(&roots, 0);
        fs::write(cpu0.join("scaling_max_freq"), "1\n").unwrap();
        fs::write(cpu0.join("scaling_cur_freq"), "2000000\n").unwrap();
        let samples = reader.sample().unwrap();
        assert_eq!(samples[0].current, KiloHertz(2_000_000));
        assert_eq!(samples[0].max, KiloHertz(3_600_000));
    }

    #[test]
    fn missing_cpufreq_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let roots = roots(&dir);
        fake_cpu(&roots, 0, 400_000, 1_200_000, 3_600_000);

        let err = CpuReader::open(&roots, 2).unwrap_err();
        assert!(matches!(err, Error::ResourceUnavailable { .. }));
        assert!(err.to_string().contains("cpu1"), "{err}");
    }

    #[test]
    fn malformed_frequency_is_a_parse_failure() {
        let path = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq";
        let current = MockFresh::new(path, ["fast\n"]);
        let mut reader = CpuReader::from_parts([(0, current, 400_000, 3_600_000)]);
        let err = reader.sample().unwrap_err();
        assert!(matches!(err, Error::ParseFailure { .. }));
        assert!(err.to_string().contains("scaling_cur_freq"));
    }

    #[test]
    fn bounds_are_exposed() {
        let current = MockFresh::new("cur", Vec::<String>::new());
        let reader = CpuReader::from_parts([(3, current, 1, 2)]);
        let bounds = reader.bounds().collect::<Vec<_>>();
        assert_eq!(bounds, vec![(CpuId::new(3), KiloHertz(1), KiloHertz(2))]);
    }
}
