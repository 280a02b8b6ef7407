//! a refreshing terminal status display.
//!
//! every cycle, jamesmon samples a set of linux counters (clocks, uptime, per-cpu frequency and
//! load, memory, and power supplies), derives rates and levels from them, and redraws a text
//! report in a single write.

pub use self::{
    config::{Config, ConfigError, LoadKind, OnError},
    error::Error,
    meter::Glyphs,
    scheduler::Cancel,
};

use {
    self::{
        scheduler::{Scheduler, Tick},
        sentinel::Sentinel,
        sink::{Sink, Terminal},
        source::SystemClock,
    },
    std::{io, time::Duration},
    tracing::debug,
};

pub mod calc;
pub mod cli;
pub mod config;
mod error;
pub mod meter;
pub mod reader;
pub mod report;
pub mod scheduler;
pub mod sink;
pub mod source;

/// kernel statistics facilities.
///
/// this file provides tools to interact with `/proc/stat`.
pub mod stat;

mod sentinel;

pub struct App<S = Terminal> {
    sentinel: Sentinel,
    sink: S,
    period: Option<Duration>,
    glyphs: Glyphs,
}

/// an error that ends the application.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Counter(#[from] Error),
    #[error("failed to write to the terminal: {0}")]
    Terminal(#[from] io::Error),
}

// === impl App ===

impl App {
    /// opens every counter, drawing to standard output.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let mut terminal = Terminal::stdout();
        if config.period()?.is_some() {
            terminal.hide_cursor()?;
        }

        Self::with_sink(config, terminal)
    }
}

impl<S: Sink> App<S> {
    /// opens every counter, drawing to `sink`.
    pub fn with_sink(config: &Config, sink: S) -> Result<Self, AppError> {
        Ok(Self {
            period: config.period()?,
            sentinel: Sentinel::open(config)?,
            sink,
            glyphs: config.glyphs,
        })
    }

    /// refreshes until `cancel` is set, or until a cycle fails.
    pub fn run(self, cancel: Cancel) -> Result<(), AppError> {
        let Self {
            mut sentinel,
            mut sink,
            period,
            glyphs,
        } = self;

        let scheduler = Scheduler::new(period, SystemClock, cancel);
        scheduler.run(|Tick { count, elapsed, .. }| -> Result<(), AppError> {
            let readings = sentinel.observe(elapsed)?;
            let frame = report::render(&readings, glyphs);
            sink.present(&frame)?;
            debug!(count, ?elapsed, "refreshed");
            Ok(())
        })
    }
}
