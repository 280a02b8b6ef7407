//! drift-free periodic refreshes.

use {
    crate::source::{Clock, Sleep, SystemClock},
    std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::{Duration, Instant},
    },
    tracing::{debug, trace},
};

/// runs a refresh once per period, measured from the previous target rather than from whenever
/// the previous refresh finished.
#[derive(Debug)]
pub struct Scheduler<C = SystemClock> {
    /// `None`, or zero, refreshes exactly once.
    period: Option<Duration>,
    clock: C,
    cancel: Cancel,
}

/// a shared flag asking the scheduler to stop at its next boundary.
#[derive(Clone, Debug, Default)]
pub struct Cancel(Arc<AtomicBool>);

/// one refresh.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Tick {
    /// how many refreshes came before this one.
    pub count: u64,
    /// when this refresh began.
    pub start: Instant,
    /// the measured time since the previous refresh began, or `None` for the first.
    pub elapsed: Option<Duration>,
}

// === impl Scheduler ===

impl<C: Clock + Sleep> Scheduler<C> {
    pub fn new(period: Option<Duration>, clock: C, cancel: Cancel) -> Self {
        Self {
            period: period.filter(|p| !p.is_zero()),
            clock,
            cancel,
        }
    }

    /// refreshes until cancelled, or until `refresh` fails.
    ///
    /// cancellation is only observed between refreshes, never during one.
    pub fn run<E>(&self, mut refresh: impl FnMut(Tick) -> Result<(), E>) -> Result<(), E> {
        let Self {
            period,
            clock,
            cancel,
        } = self;

        let mut target = clock.now();
        let mut last = None::<Instant>;

        for count in 0.. {
            if cancel.is_cancelled() {
                debug!(count, "cancelled");
                break;
            }

            let start = clock.now();
            let elapsed = last.map(|last| start.saturating_duration_since(last));
            last = Some(start);
            refresh(Tick {
                count,
                start,
                elapsed,
            })?;

            let Some(period) = *period else {
                break;
            };
            target = Self::next(target, period, clock.now());
            trace!(?target, "sleeping");
            clock.sleep_until(target);
        }

        Ok(())
    }

    /// the boundary after `target`, skipping any that `now` has already passed.
    fn next(target: Instant, period: Duration, now: Instant) -> Instant {
        let next = target + period;
        if now <= next {
            return next;
        }

        // an overrun. fire at the first boundary after now, rather than catching up.
        let behind = now - next;
        let skipped = behind.as_nanos() / period.as_nanos() + 1;
        debug!(%skipped, ?behind, "refresh overran its period");
        let skipped = u32::try_from(skipped).unwrap_or(u32::MAX);

        next + period * skipped
    }
}

// === impl Cancel ===

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let Self(flag) = self;
        flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        let Self(flag) = self;
        flag.load(Ordering::Relaxed)
    }
}
