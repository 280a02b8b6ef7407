use {
    super::{Roots, parse_value},
    crate::{
        error::Error,
        source::{Fresh, Reread},
    },
    std::time::Duration,
};

/// reads `/proc/uptime` through one persistently open handle.
///
/// the kernel presents the current uptime at offset 0 on every read, so the handle is rewound
/// and reread in full each time rather than streamed.
#[derive(Debug)]
pub struct UptimeReader<F = Reread> {
    source: F,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Uptime {
    /// time since boot.
    pub up: Duration,
}

// === impl UptimeReader ===

impl UptimeReader {
    pub fn open(roots: &Roots) -> Result<Self, Error> {
        Reread::open(roots.proc("uptime")).map(Self::new)
    }
}

impl<F: Fresh> UptimeReader<F> {
    pub fn new(source: F) -> Self {
        Self { source }
    }

    pub fn sample(&mut self) -> Result<Uptime, Error> {
        let Self { source } = self;
        let path = source.path().to_owned();
        let text = source.fresh()?;

        // the second token, idle time summed over every cpu, is not shown.
        let up = text
            .split_whitespace()
            .next()
            .ok_or_else(|| Error::parse(&path, "uptime seconds", text))
            .and_then(|t| parse_value::<f64>(&path, "uptime seconds", t))
            .and_then(|s| {
                Duration::try_from_secs_f64(s)
                    .map_err(|_| Error::parse(&path, "uptime seconds", text))
            })?;

        Ok(Uptime { up })
    }
}
