use super::*;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CpuTime {
    /// time spent in user mode.
    user: UserHz,
    /// time spent in user mode with low priority (nice).
    nice: UserHz,
    /// time spent in system mode.
    system: UserHz,
    /// time spent in the idle task.
    ///
    /// this value should be USER_HZ times the second entry in the /proc/uptime pseudo-file.
    idle: UserHz,
    /// time waiting for i/o to complete.
    ///
    /// this value is not reliable, for the following reasons:
    ///   *  the cpu will not wait for i/o to complete; iowait is the time that a task is waiting
    ///      for i/o to complete. when a cpu goes into idle state for outstanding task i/o,
    ///      another task will be scheduled on this cpu.
    ///   *  on a multi-core cpu, the task waiting for i/o to complete is not running on any cpu,
    ///      so the iowait of each cpu is difficult to calculate.
    ///   *  the value in this field may decrease in certain conditions.
    iowait: UserHz,
    /// time servicing interrupts.
    irq: UserHz,
    /// time servicing softirqs.
    softirq: UserHz,
    /// stolen time, which is the time spent in other operating systems when running in a
    /// virtualized environment.
    steal: UserHz,
    /// time spent running a virtual cpu for guest operating systems under the control of the linux
    /// kernel.
    guest: UserHz,
    /// time spent running a niced guest.
    guest_nice: UserHz,
}

/// the difference between two [`CpuTime`]s, restricted to what load calculations need.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Measurement {
    /// time spent idle or waiting for i/o.
    idle: UserHz,
    /// time spent in any state.
    total: UserHz,
}

// == impl Measurement ===

impl Measurement {
    /// measures the time that elapsed between two readings of the same cpu.
    ///
    /// counters that went backwards (`iowait` may) contribute zero.
    pub fn new(a: &CpuTime, b: &CpuTime) -> Self {
        Self {
            idle: b.idle_total() - a.idle_total(),
            total: b.total() - a.total(),
        }
    }

    pub fn idle(&self) -> UserHz {
        self.idle
    }

    pub fn total(&self) -> UserHz {
        self.total
    }
}

// === impl CpuTime ===

impl CpuTime {
    /// time spent idle, including time spent waiting for i/o.
    pub fn idle_total(&self) -> UserHz {
        self.idle + self.iowait
    }

    pub fn total(&self) -> UserHz {
        let Self {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            // guest time is already accounted for in `user` and `nice`.
            guest: _,
            guest_nice: _,
        } = *self;

        user + nice + system + idle + iowait + irq + softirq + steal
    }
}

impl TryFrom<Vec<UserHz>> for CpuTime {
    type Error = EntryParseError;
    fn try_from(times: Vec<UserHz>) -> Result<Self, Self::Error> {
        let found = times.len();
        <_ as TryInto<[_; 10]>>::try_into(times)
            .map(Self::from)
            .map_err(|_| EntryParseError::CpuTime {
                expected: 10,
                found,
            })
    }
}

impl From<[UserHz; 10]> for CpuTime {
    fn from(
        [
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            guest,
            guest_nice,
        ]: [UserHz; 10],
    ) -> Self {
        Self {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            guest,
            guest_nice,
        }
    }
}
