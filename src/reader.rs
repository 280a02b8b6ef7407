//! counter readers, one per metric family.
//!
//! each reader is opened once, which acquires whatever persistent handles it needs, and is then
//! sampled once per cycle. opening fails with [`Error::ResourceUnavailable`]; sampling fails with
//! [`Error::ReadFailure`] or [`Error::ParseFailure`].
//!
//! [`Error::ResourceUnavailable`]: crate::error::Error::ResourceUnavailable
//! [`Error::ReadFailure`]: crate::error::Error::ReadFailure
//! [`Error::ParseFailure`]: crate::error::Error::ParseFailure

use {
    crate::error::Error,
    std::{
        path::{Path, PathBuf},
        str::FromStr,
    },
};

pub use self::{
    cpu::{CpuReader, CpuSample, online_cpus},
    load::{LoadCounter, PerfLoad, ProcStatLoad},
    memory::{MemoryReader, MemorySample},
    power::{BatterySample, Charger, PowerReader, PowerSample},
    time::{TimeReader, TimeSample},
    uptime::{Uptime, UptimeReader},
};

mod cpu;
mod load;
mod memory;
mod power;
mod time;
mod uptime;

/// where the proc and sys pseudo-filesystems are mounted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Roots {
    pub proc: PathBuf,
    pub sys: PathBuf,
}

// === impl Roots ===

impl Default for Roots {
    fn default() -> Self {
        Self {
            proc: PathBuf::from("/proc"),
            sys: PathBuf::from("/sys"),
        }
    }
}

impl Roots {
    pub fn proc(&self, rest: impl AsRef<Path>) -> PathBuf {
        self.proc.join(rest)
    }

    pub fn sys(&self, rest: impl AsRef<Path>) -> PathBuf {
        self.sys.join(rest)
    }
}

/// parses a pseudo-file holding a single number, such as most sysfs attributes.
fn parse_value<T: FromStr>(path: &Path, what: &'static str, text: &str) -> Result<T, Error> {
    text.trim()
        .parse::<T>()
        .map_err(|_| Error::parse(path, what, text))
}

/// reads a one-shot pseudo-file holding a single number.
fn read_value<T: FromStr>(path: &Path, what: &'static str) -> Result<T, Error> {
    let text = std::fs::read_to_string(path).map_err(Error::read(path))?;
    parse_value(path, what, &text)
}
