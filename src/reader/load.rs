//! per-cpu load counters.
//!
//! two kernel facilities can tell us how busy each cpu was during the last interval:
//!
//! * `/proc/stat` keeps cumulative idle tick counts, which we difference against the previous
//!   snapshot ourselves.
//! * `perf_event_open(2)` hardware cycle counters, which we reset after every read so that each
//!   read reports only the cycles of the interval that just ended.
//!
//! both are presented as the same thing: how long each cpu sat idle during the interval.

use {
    super::Roots,
    crate::{
        calc::{self, KiloHertz},
        error::Error,
        source::{Counter, Fresh, Reread},
        stat::{CpuId, Measurement, Snapshot, UserHz},
    },
    std::{
        collections::BTreeMap,
        fs::File,
        io::{self, Read},
        os::fd::{AsRawFd, FromRawFd},
        time::Duration,
    },
    tracing::debug,
};

/// a source of per-cpu idle time.
pub trait LoadCounter {
    /// returns how long each cpu was idle during the interval that just elapsed.
    ///
    /// `elapsed` is the measured length of that interval, or `None` on the first cycle. the
    /// first call only establishes a baseline, and returns `Ok(None)`. a failed call discards
    /// the baseline, so the call after it establishes a new one.
    fn idle(
        &mut self,
        elapsed: Option<Duration>,
    ) -> Result<Option<BTreeMap<CpuId, Duration>>, Error>;
}

/// idle time from the tick counts in `/proc/stat`.
#[derive(Debug)]
pub struct ProcStatLoad<F = Reread> {
    source: F,
    last: Option<Snapshot>,
    freq: u64,
}

/// idle time inferred from hardware cycle counters, reset on every read.
#[derive(Debug)]
pub struct PerfLoad<C = PerfCounter> {
    cpus: Vec<(CpuId, C, KiloHertz)>,
    primed: bool,
}

/// a `PERF_COUNT_HW_CPU_CYCLES` counter for every process on one cpu.
#[derive(Debug)]
pub struct PerfCounter {
    cpu: u32,
    fd: File,
}

// === impl ProcStatLoad ===

impl ProcStatLoad {
    pub fn open(roots: &Roots) -> Result<Self, Error> {
        Reread::open(roots.proc("stat")).map(|source| Self::new(source, UserHz::freq()))
    }
}

impl<F: Fresh> ProcStatLoad<F> {
    pub fn new(source: F, freq: u64) -> Self {
        Self {
            source,
            last: None,
            freq,
        }
    }
}

impl<F: Fresh> LoadCounter for ProcStatLoad<F> {
    fn idle(
        &mut self,
        _elapsed: Option<Duration>,
    ) -> Result<Option<BTreeMap<CpuId, Duration>>, Error> {
        let Self { source, last, freq } = self;

        let snapshot = Snapshot::read(source).inspect_err(|_| *last = None)?;
        let prev = last.replace(snapshot);
        let (Some(prev), Some(new)) = (prev, last.as_ref()) else {
            return Ok(None);
        };

        // cpus that went offline or came online since the last snapshot are skipped.
        let idle = new
            .cpus
            .iter()
            .filter_map(|(id, b)| {
                let a = prev.cpus.get(id)?;
                let idle = Measurement::new(a, b).idle().as_duration(*freq);
                Some((*id, idle))
            })
            .collect();

        Ok(Some(idle))
    }
}

// === impl PerfLoad ===

impl PerfLoad {
    /// opens a cycle counter for each cpu, given its maximum scaling frequency.
    pub fn open(cpus: impl IntoIterator<Item = (CpuId, KiloHertz)>) -> Result<Self, Error> {
        let cpus = cpus
            .into_iter()
            .map(|(id, max)| PerfCounter::open(id.as_u32()).map(|c| (id, c, max)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(cpus))
    }
}

impl<C: Counter> PerfLoad<C> {
    pub fn new(cpus: Vec<(CpuId, C, KiloHertz)>) -> Self {
        Self {
            cpus,
            primed: false,
        }
    }
}

impl<C: Counter> LoadCounter for PerfLoad<C> {
    fn idle(
        &mut self,
        elapsed: Option<Duration>,
    ) -> Result<Option<BTreeMap<CpuId, Duration>>, Error> {
        let Self { cpus, primed } = self;

        // always read, so that every counter is reset at the start of the next interval.
        let counts = cpus
            .iter_mut()
            .map(|(id, counter, max)| counter.take().map(|cycles| (*id, cycles, *max)))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|_| *primed = false)?;

        let (true, Some(elapsed)) = (std::mem::replace(primed, true), elapsed) else {
            return Ok(None);
        };

        let idle = counts
            .into_iter()
            .map(|(id, cycles, max)| (id, calc::idle_from_cycles(cycles, max, elapsed)))
            .collect();

        Ok(Some(idle))
    }
}

// === impl PerfCounter ===

impl PerfCounter {
    const PERF_TYPE_HARDWARE: u32 = 0;
    const PERF_COUNT_HW_CPU_CYCLES: u64 = 0;
    /// `_IO('$', 3)`
    const PERF_EVENT_IOC_RESET: u64 = 0x2403;

    pub fn open(cpu: u32) -> Result<Self, Error> {
        let attr = PerfEventAttr {
            kind: Self::PERF_TYPE_HARDWARE,
            size: std::mem::size_of::<PerfEventAttr>() as u32,
            config: Self::PERF_COUNT_HW_CPU_CYCLES,
            ..PerfEventAttr::default()
        };

        // every process (-1) on this cpu, no group leader (-1), no flags.
        // SAFETY: `attr` is a valid, fully initialized PERF_ATTR_SIZE_VER0 structure that
        // outlives the call.
        let fd = unsafe {
            libc::syscall(
                libc::SYS_perf_event_open,
                &attr as *const PerfEventAttr,
                -1 as libc::pid_t,
                cpu as libc::c_int,
                -1 as libc::c_int,
                0 as libc::c_ulong,
            )
        };
        if fd < 0 {
            return Err(Error::Perf {
                cpu,
                source: io::Error::last_os_error(),
            });
        }

        // SAFETY: the syscall succeeded, so `fd` is an open descriptor that we now own.
        let fd = unsafe { File::from_raw_fd(fd as libc::c_int) };
        debug!(cpu, "opened perf cycle counter");

        Ok(Self { cpu, fd })
    }
}

impl Counter for PerfCounter {
    fn take(&mut self) -> Result<u64, Error> {
        let Self { cpu, fd } = self;
        let cpu = *cpu;
        let perf = move |source| Error::Perf { cpu, source };

        let mut count = [0; 8];
        fd.read_exact(&mut count).map_err(perf)?;

        // SAFETY: `fd` is a perf event descriptor, for which this request takes no argument.
        let reset = unsafe { libc::ioctl(fd.as_raw_fd(), Self::PERF_EVENT_IOC_RESET as _, 0) };
        if reset < 0 {
            return Err(perf(io::Error::last_os_error()));
        }

        Ok(u64::from_ne_bytes(count))
    }
}

/// the first published layout of `struct perf_event_attr` (`PERF_ATTR_SIZE_VER0`).
///
/// the kernel accepts any published size, so only the fields we set are declared.
#[repr(C)]
#[derive(Debug, Default)]
#[allow(dead_code, reason = "these fields are read by the kernel.")]
struct PerfEventAttr {
    kind: u32,
    size: u32,
    config: u64,
    sample_period: u64,
    sample_type: u64,
    read_format: u64,
    /// `disabled`, `inherit`, `exclude_*`, and the other single-bit flags. all clear: count
    /// user, kernel, and hypervisor cycles from the moment the counter is opened.
    flags: u64,
    wakeup_events: u32,
    bp_type: u32,
    config1: u64,
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::source::{MockCounter, MockFresh},
    };

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn perf_attr_has_the_ver0_size() {
        assert_eq!(std::mem::size_of::<PerfEventAttr>(), 64);
    }

    #[test]
    fn proc_stat_differences_idle_ticks() {
        let source = MockFresh::new(
            "/proc/stat",
            [
                "cpu  200 0 0 200 0 0 0 0 0 0\ncpu0 100 0 0 100 0 0 0 0 0 0\ncpu1 100 0 0 100 0 0 0 0 0 0\n",
                "cpu  300 0 0 300 0 0 0 0 0 0\ncpu0 175 0 0 125 0 0 0 0 0 0\ncpu1 125 0 0 175 0 0 0 0 0 0\n",
            ],
        );
        let mut load = ProcStatLoad::new(source, 100);

        assert_eq!(load.idle(None).unwrap(), None);
        let idle = load.idle(Some(SECOND)).unwrap().unwrap();
        assert_eq!(idle[&CpuId::new(0)], Duration::from_millis(250));
        assert_eq!(idle[&CpuId::new(1)], Duration::from_millis(750));
    }

    #[test]
    fn proc_stat_skips_hotplugged_cpus() {
        let source = MockFresh::new(
            "/proc/stat",
            [
                "cpu  1 0 0 1 0 0 0 0 0 0\ncpu0 1 0 0 1 0 0 0 0 0 0\n",
                "cpu  2 0 0 2 0 0 0 0 0 0\ncpu0 2 0 0 2 0 0 0 0 0 0\ncpu1 1 0 0 1 0 0 0 0 0 0\n",
            ],
        );
        let mut load = ProcStatLoad::new(source, 100);
        load.idle(None).unwrap();

        let idle = load.idle(Some(SECOND)).unwrap().unwrap();
        assert_eq!(idle.keys().copied().collect::<Vec<_>>(), vec![CpuId::new(0)]);
    }

    #[test]
    fn proc_stat_failure_discards_the_baseline() {
        let source = MockFresh::new(
            "/proc/stat",
            [
                "cpu  0 0 0 100 0 0 0 0 0 0\ncpu0 0 0 0 100 0 0 0 0 0 0\n",
                "cpu0 garbage\n",
                "cpu  0 0 0 250 0 0 0 0 0 0\ncpu0 0 0 0 250 0 0 0 0 0 0\n",
                "cpu  50 0 0 300 0 0 0 0 0 0\ncpu0 50 0 0 300 0 0 0 0 0 0\n",
            ],
        );
        let mut load = ProcStatLoad::new(source, 100);

        assert_eq!(load.idle(None).unwrap(), None);
        assert!(load.idle(Some(SECOND)).is_err());
        // the idle ticks since the first snapshot span two intervals, so they are not used.
        assert_eq!(load.idle(Some(SECOND)).unwrap(), None);
        let idle = load.idle(Some(SECOND)).unwrap().unwrap();
        assert_eq!(idle[&CpuId::new(0)], Duration::from_millis(500));
    }

    #[test]
    fn perf_failure_discards_the_baseline() {
        let max = KiloHertz(1_000_000);
        let mut load = PerfLoad::new(vec![(CpuId::new(0), FailingCounter(0), max)]);

        assert_eq!(load.idle(None).unwrap(), None);
        assert!(load.idle(Some(SECOND)).is_err());
        assert_eq!(load.idle(Some(SECOND)).unwrap(), None);
        let idle = load.idle(Some(SECOND)).unwrap().unwrap();
        assert_eq!(idle[&CpuId::new(0)], Duration::from_millis(500));
    }

    /// fails its second read, and counts half a billion cycles on every other.
    struct FailingCounter(u32);

    impl Counter for FailingCounter {
        fn take(&mut self) -> Result<u64, Error> {
            let Self(reads) = self;
            *reads += 1;
            match *reads {
                2 => Err(Error::Perf {
                    cpu: 0,
                    source: io::ErrorKind::Interrupted.into(),
                }),
                _ => Ok(500_000_000),
            }
        }
    }

    /// the counter resets on every read, so each interval sees only its own cycles.
    #[test]
    fn perf_uses_per_interval_cycles_and_actual_elapsed_time() {
        let max = KiloHertz(1_000_000); // 1GHz
        let counter = MockCounter::new([123_456, 500_000_000, 750_000_000]);
        let mut load = PerfLoad::new(vec![(CpuId::new(0), counter, max)]);

        // the first read only resets.
        assert_eq!(load.idle(None).unwrap(), None);

        let idle = load.idle(Some(SECOND)).unwrap().unwrap();
        assert_eq!(idle[&CpuId::new(0)], Duration::from_millis(500));
        assert_eq!(calc::busy_fraction(idle[&CpuId::new(0)], SECOND), 0.5);

        // a late interval: the same count over 1.5s is a lighter load.
        let elapsed = Duration::from_millis(1500);
        let idle = load.idle(Some(elapsed)).unwrap().unwrap();
        assert_eq!(idle[&CpuId::new(0)], Duration::from_millis(750));
        assert_eq!(calc::busy_fraction(idle[&CpuId::new(0)], elapsed), 0.5);
    }
}
