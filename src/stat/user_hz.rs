use std::{
    ops::{Add, Sub},
    str::FromStr,
    sync::OnceLock,
    time::Duration,
};

/// a duration measured in kernel clock ticks.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct UserHz(u64);

// === impl UserHz ===

impl UserHz {
    /// the fallback number of clock ticks in a second, used if `sysconf(3)` cannot tell us.
    const FALLBACK_FREQ: u64 = 100;

    /// the number of clock ticks in a second, per `sysconf(_SC_CLK_TCK)`.
    pub fn freq() -> u64 {
        static FREQ: OnceLock<u64> = OnceLock::new();
        *FREQ.get_or_init(|| {
            // SAFETY: sysconf has no preconditions; it returns -1 for unknown names.
            let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
            u64::try_from(ticks)
                .ok()
                .filter(|t| *t > 0)
                .unwrap_or(Self::FALLBACK_FREQ)
        })
    }

    pub fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// converts these ticks to a duration, at the given tick frequency.
    pub fn as_duration(self, freq: u64) -> Duration {
        let Self(ticks) = self;
        let freq = freq.max(1);
        let secs = ticks / freq;
        let nanos = (ticks % freq) * 1_000_000_000 / freq;
        Duration::new(secs, nanos as u32)
    }
}

impl FromStr for UserHz {
    type Err = <u64 as FromStr>::Err;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Add for UserHz {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        let (Self(lhs), Self(rhs)) = (self, rhs);
        Self(lhs.saturating_add(rhs))
    }
}

impl Sub for UserHz {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        let (Self(lhs), Self(rhs)) = (self, rhs);
        Self(lhs.saturating_sub(rhs))
    }
}
