//! renders one cycle's readings as text.
//!
//! rendering is a pure function of [`Readings`]: nothing here reads a counter or looks at a
//! clock. sections always appear in the same order, separated by a blank line.

use {
    crate::{
        calc::{self, Battery, Frequency, Load, Memory},
        error::Error,
        meter::{Glyphs, Meter},
        reader::{Charger, TimeSample, Uptime},
        stat::CpuId,
    },
    std::{
        fmt::{self, Write},
        time::Duration,
    },
};

/// everything one cycle observed, ready to render.
///
/// a section that could not be sampled, under the skip policy, holds its error.
#[derive(Debug)]
pub struct Readings {
    pub time: TimeSample,
    pub uptime: Result<Uptime, Error>,
    pub cpus: Result<Vec<CpuReading>, Error>,
    pub memory: Result<Memory, Error>,
    pub power: Result<PowerReading, Error>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CpuReading {
    pub id: CpuId,
    pub frequency: Frequency,
    /// absent on the first cycle, and when no load counter is configured.
    pub load: Option<Load>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PowerReading {
    pub chargers: Vec<Charger>,
    pub batteries: Vec<BatteryReading>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatteryReading {
    pub index: u64,
    pub name: String,
    pub status: Option<String>,
    pub battery: Battery,
}

/// a block of report lines.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Section {
    pub lines: Vec<String>,
}

/// the width of the memory meter, in cells.
const METER_WIDTH: usize = 20;

/// renders a full frame.
pub fn render(readings: &Readings, glyphs: Glyphs) -> String {
    let Readings {
        time,
        uptime,
        cpus,
        memory,
        power,
    } = readings;

    let sections = [
        Ok(time_section(time)),
        uptime.as_ref().map(uptime_section),
        cpus.as_ref().map(|cpus| cpu_section(cpus, glyphs)),
        memory.as_ref().map(|memory| memory_section(memory, glyphs)),
        power.as_ref().map(|power| power_section(power, glyphs)),
    ];
    let titles = ["Time", "Uptime", "CPU", "Memory", "Battery"];

    let mut frame = String::new();
    for (i, (section, title)) in sections.into_iter().zip(titles).enumerate() {
        if i > 0 {
            frame.push('\n');
        }
        let section = section.unwrap_or_else(|error| Section::unavailable(title, error));
        // writing to a string cannot fail.
        let _ = write!(frame, "{section}");
    }

    frame
}

// === impl Section ===

impl Section {
    fn unavailable(title: &'static str, error: &Error) -> Self {
        Self {
            lines: vec![format!("{title}: unavailable ({error})")],
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.lines.iter().try_for_each(|line| writeln!(f, "{line}"))
    }
}

fn time_section(time: &TimeSample) -> Section {
    let TimeSample { unix, tai, local } = time;
    let stamp = |d: &Duration| format!("{}.{:03}s", d.as_secs(), d.subsec_millis());

    Section {
        lines: vec![
            format!("TAI:  {}", stamp(tai)),
            format!("UNIX: {}", stamp(unix)),
            String::new(),
            local.format("%F %b %a %T%.3f").to_string(),
        ],
    }
}

fn uptime_section(uptime: &Uptime) -> Section {
    let seconds = uptime.up.as_secs_f64();
    Section {
        lines: vec![format!(
            "Uptime: {seconds:.0}s ({:.5}d)",
            seconds / calc::SECONDS_PER_DAY
        )],
    }
}

fn cpu_section(cpus: &[CpuReading], glyphs: Glyphs) -> Section {
    let mut row = String::from("CPUs: ");
    let _ = glyphs.row(cpus.iter().map(|cpu| cpu.frequency.level), &mut row);

    let mut lines = vec![row];
    for CpuReading {
        id,
        frequency,
        load,
    } in cpus
    {
        let mut line = format!(
            "{:<6}{:06.3}GHz {}",
            format!("{id}:"),
            frequency.ghz,
            glyphs.glyph(frequency.level)
        );
        if let Some(Load { percent, level }) = load {
            let _ = write!(line, "  load {percent:5.1}% {}", glyphs.glyph(*level));
        }
        lines.push(line);
    }

    Section { lines }
}

fn memory_section(memory: &Memory, glyphs: Glyphs) -> Section {
    let Memory {
        used_gb,
        total_gb,
        percent,
        ..
    } = *memory;

    let mut meter = String::new();
    let _ = Meter {
        name: "mem",
        value: (percent / 100.0 * METER_WIDTH as f64).round() as usize,
        width: METER_WIDTH,
        glyphs,
    }
    .draw(&mut meter);

    Section {
        lines: vec![
            format!("Memory: {used_gb:.3}/{total_gb:.1}GB {percent:.1}%"),
            meter,
        ],
    }
}

fn power_section(power: &PowerReading, glyphs: Glyphs) -> Section {
    let PowerReading {
        chargers,
        batteries,
    } = power;

    let mut lines = batteries
        .iter()
        .map(|reading| battery_line(reading, glyphs))
        .collect::<Vec<_>>();
    lines.extend(chargers.iter().map(|Charger { name, online }| {
        let state = if *online { "online" } else { "offline" };
        format!("{name}: {state}")
    }));
    if lines.is_empty() {
        lines.push("Battery: none".to_owned());
    }

    Section { lines }
}

fn battery_line(reading: &BatteryReading, glyphs: Glyphs) -> String {
    let BatteryReading {
        index,
        name,
        status,
        battery,
    } = reading;

    let mut line = format!(
        "Battery {index} ({name}): {:5.1}% {} {:6.2}W {:6.2}V {:5.3}A {:.1}/{:.1}Wh",
        battery.percent,
        glyphs.glyph(battery.level),
        battery.power,
        battery.voltage,
        battery.current,
        battery.energy_wh,
        battery.energy_full_wh,
    );
    if let Some(remaining) = battery.remaining {
        let secs = remaining.as_secs();
        let _ = write!(
            line,
            " {:02}:{:02}:{:02} left",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
    }
    if let Some(health) = battery.health {
        let _ = write!(line, " health {health:.1}%");
    }
    if let Some(status) = status {
        let _ = write!(line, " {status}");
    }

    line
}
