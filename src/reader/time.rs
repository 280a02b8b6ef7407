use {
    chrono::{DateTime, Local},
    std::time::{Duration, SystemTime, UNIX_EPOCH},
};

/// TAI is ahead of UTC by this many seconds, as of the 2017 leap second.
const TAI_OFFSET: Duration = Duration::from_secs(37);

/// reads the wall clock. holds no handles.
#[derive(Debug, Default)]
pub struct TimeReader;

/// the time at one instant, from each clock we display.
#[derive(Clone, Debug)]
pub struct TimeSample {
    /// time since the unix epoch.
    pub unix: Duration,
    /// time since the unix epoch on the TAI scale.
    pub tai: Duration,
    /// the same instant, in the local timezone.
    pub local: DateTime<Local>,
}

// === impl TimeReader ===

impl TimeReader {
    pub fn sample(&self) -> TimeSample {
        Self::at(SystemTime::now())
    }

    fn at(wall: SystemTime) -> TimeSample {
        // a clock set before 1970 reads as the epoch.
        let unix = wall.duration_since(UNIX_EPOCH).unwrap_or_default();

        TimeSample {
            unix,
            tai: unix + TAI_OFFSET,
            local: DateTime::<Local>::from(wall),
        }
    }
}
