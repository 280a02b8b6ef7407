//! runtime configuration.
//!
//! settings come from an optional TOML file, with command-line flags taking precedence. every
//! field has a default, so an empty file (or no file) is a valid configuration.

use {
    crate::{meter::Glyphs, reader::Roots},
    serde::Deserialize,
    std::{
        io,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// what to do when a section cannot be sampled during a cycle.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OnError {
    /// stop, and report the error.
    #[default]
    Abort,
    /// show the section as unavailable for this cycle, and carry on.
    Skip,
}

/// where per-cpu load figures come from.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LoadKind {
    /// idle ticks from `/proc/stat`.
    #[default]
    Stat,
    /// hardware cycle counters. needs `CAP_PERFMON` or a permissive `perf_event_paranoid`.
    Perf,
    /// no load column.
    None,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// milliseconds between refreshes. zero, or no period at all, refreshes once.
    pub interval_ms: Option<f64>,
    /// refreshes per second; the reciprocal of the interval.
    pub frequency_hz: Option<f64>,
    pub glyphs: Glyphs,
    pub load: LoadKind,
    pub on_error: OnError,
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("both a refresh interval and a refresh frequency were given")]
    Conflict,
    #[error("invalid refresh interval {0}ms: expected a finite, non-negative number")]
    Interval(f64),
    #[error("invalid refresh frequency {0}Hz: expected a finite, positive number")]
    Frequency(f64),
}

// === impl Config ===

impl Default for Config {
    fn default() -> Self {
        let Roots { proc, sys } = Roots::default();
        Self {
            interval_ms: None,
            frequency_hz: None,
            glyphs: Glyphs::default(),
            load: LoadKind::default(),
            on_error: OnError::default(),
            proc_root: proc,
            sys_root: sys,
        }
    }
}

impl Config {
    /// loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        Self::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// the refresh period, or `None` to refresh once.
    pub fn period(&self) -> Result<Option<Duration>, ConfigError> {
        match (self.interval_ms, self.frequency_hz) {
            (Some(_), Some(_)) => Err(ConfigError::Conflict),
            (Some(ms), None) => interval(ms).map_err(ConfigError::Interval),
            (None, Some(hz)) => frequency(hz).map(Some).map_err(ConfigError::Frequency),
            (None, None) => Ok(None),
        }
    }

    pub fn roots(&self) -> Roots {
        Roots {
            proc: self.proc_root.clone(),
            sys: self.sys_root.clone(),
        }
    }
}

/// converts an interval in milliseconds to a period, where zero means "once".
pub fn interval(ms: f64) -> Result<Option<Duration>, f64> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(ms);
    }

    let period = Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| ms)?;
    Ok(Some(period).filter(|p| !p.is_zero()))
}

/// converts a frequency in hertz to a period.
pub fn frequency(hz: f64) -> Result<Duration, f64> {
    if !hz.is_finite() || hz <= 0.0 {
        return Err(hz);
    }

    Duration::try_from_secs_f64(1.0 / hz)
        .ok()
        .filter(|p| !p.is_zero())
        .ok_or(hz)
}
