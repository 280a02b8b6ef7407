//! command-line arguments.

use {
    crate::{
        config::{self, Config, LoadKind, OnError},
        meter::Glyphs,
    },
    clap::{Parser, ValueEnum},
    std::path::PathBuf,
    tracing::level_filters::LevelFilter,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

/// a refreshing terminal status display.
///
/// with neither `--interval` nor `--frequency`, the report is drawn once.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// refresh interval, in milliseconds. zero draws the report once.
    #[arg(short, long, value_name = "MS", value_parser = parse_interval)]
    pub interval: Option<f64>,

    /// refresh frequency, in hertz.
    #[arg(
        short,
        long,
        value_name = "HZ",
        value_parser = parse_frequency,
        conflicts_with = "interval"
    )]
    pub frequency: Option<f64>,

    /// the glyphs that levels are drawn with.
    #[arg(short, long)]
    pub glyphs: Option<Glyphs>,

    /// where per-cpu load comes from.
    #[arg(long)]
    pub load: Option<LoadKind>,

    /// what to do when a section cannot be read.
    #[arg(long)]
    pub on_error: Option<OnError>,

    /// a TOML configuration file. flags take precedence over its settings.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// diagnostics written to stderr at or above this level.
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// where the proc filesystem is mounted.
    #[arg(long, value_name = "PATH")]
    pub proc_root: Option<PathBuf>,

    /// where the sys filesystem is mounted.
    #[arg(long, value_name = "PATH")]
    pub sys_root: Option<PathBuf>,
}

// === impl LogLevel ===

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::OFF,
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

// === impl Config ===

impl Config {
    /// overrides settings with any that were given on the command line.
    pub fn merge_args(&mut self, args: &Args) {
        let Args {
            interval,
            frequency,
            glyphs,
            load,
            on_error,
            config: _,
            log_level: _,
            proc_root,
            sys_root,
        } = args;

        // a refresh rate on the command line replaces the file's, whichever form either takes.
        if interval.is_some() || frequency.is_some() {
            self.interval_ms = *interval;
            self.frequency_hz = *frequency;
        }
        if let Some(glyphs) = glyphs {
            self.glyphs = *glyphs;
        }
        if let Some(load) = load {
            self.load = *load;
        }
        if let Some(on_error) = on_error {
            self.on_error = *on_error;
        }
        if let Some(proc_root) = proc_root {
            self.proc_root.clone_from(proc_root);
        }
        if let Some(sys_root) = sys_root {
            self.sys_root.clone_from(sys_root);
        }
    }
}

fn parse_interval(s: &str) -> Result<f64, String> {
    let ms = s.parse::<f64>().map_err(|e| e.to_string())?;
    config::interval(ms)
        .map(|_| ms)
        .map_err(|_| format!("`{s}` is not a finite, non-negative number of milliseconds"))
}

fn parse_frequency(s: &str) -> Result<f64, String> {
    let hz = s.parse::<f64>().map_err(|e| e.to_string())?;
    config::frequency(hz)
        .map(|_| hz)
        .map_err(|_| format!("`{s}` is not a finite, positive frequency"))
}
