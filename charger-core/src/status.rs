//! Shared status surface for charger front-ends.
//!
//! The emulator console and the firmware log both render a [`ChargerStatus`]
//! through [`StatusFormatter`] so the textual output stays identical across
//! targets.

use core::fmt;

use crate::charger::ChargePhase;
use crate::clock::Tick;
use crate::fault::FaultKind;

/// Snapshot of the controller outputs after the most recent tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChargerStatus {
    pub phase: ChargePhase,
    pub target_voltage: f32,
    pub target_current: f32,
    pub charging_enabled: bool,
    pub discharging_enabled: bool,
    pub tick: Tick,
    pub ticks_in_phase: u64,
    pub deep_discharge_cycles: u32,
    pub cadence_faults: u32,
    pub fault: Option<FaultKind>,
}

/// Helper that renders a [`ChargerStatus`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    status: &'a ChargerStatus,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(status: &'a ChargerStatus) -> Self {
        Self { status }
    }

    /// Writes the phase line (e.g. `charger phase=cv tick=t120 in-phase=42`).
    pub fn write_phase_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "charger phase={} tick={} in-phase={}",
            self.status.phase, self.status.tick, self.status.ticks_in_phase
        )
    }

    /// Writes the setpoint line (e.g. `targets voltage=14.40V current=20.00A charging=enabled`).
    pub fn write_targets_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "targets voltage={:.2}V current={:.2}A charging={}",
            self.status.target_voltage,
            self.status.target_current,
            enabled_label(self.status.charging_enabled)
        )
    }

    /// Writes the protection line (e.g. `load switch=connected deep-cycles=1 fault=none cadence-faults=0`).
    pub fn write_protection_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("load switch=")?;
        writer.write_str(if self.status.discharging_enabled {
            "connected"
        } else {
            "disconnected"
        })?;
        write!(writer, " deep-cycles={}", self.status.deep_discharge_cycles)?;

        writer.write_str(" fault=")?;
        match self.status.fault {
            Some(kind) => write!(writer, "{kind}")?,
            None => writer.write_str("none")?,
        }

        write!(writer, " cadence-faults={}", self.status.cadence_faults)
    }
}

impl fmt::Display for StatusFormatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_phase_line(f)?;
        f.write_str("; ")?;
        self.write_targets_line(f)?;
        f.write_str("; ")?;
        self.write_protection_line(f)
    }
}

const fn enabled_label(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    fn sample() -> ChargerStatus {
        ChargerStatus {
            phase: ChargePhase::ConstantVoltage,
            target_voltage: 14.4,
            target_current: 20.0,
            charging_enabled: true,
            discharging_enabled: false,
            tick: Tick::new(120),
            ticks_in_phase: 42,
            deep_discharge_cycles: 1,
            cadence_faults: 0,
            fault: Some(FaultKind::OverTemperature),
        }
    }

    #[test]
    fn formatter_renders_each_line() {
        let status = sample();
        let formatter = StatusFormatter::new(&status);

        let mut line: String<96> = String::new();
        formatter.write_phase_line(&mut line).unwrap();
        assert_eq!(line.as_str(), "charger phase=cv tick=t120 in-phase=42");

        line.clear();
        formatter.write_targets_line(&mut line).unwrap();
        assert_eq!(
            line.as_str(),
            "targets voltage=14.40V current=20.00A charging=enabled"
        );

        line.clear();
        formatter.write_protection_line(&mut line).unwrap();
        assert_eq!(
            line.as_str(),
            "load switch=disconnected deep-cycles=1 fault=over-temperature cadence-faults=0"
        );
    }

    #[test]
    fn display_joins_lines_on_one_row() {
        let status = sample();
        let mut line: String<192> = String::new();
        core::fmt::Write::write_fmt(&mut line, format_args!("{}", StatusFormatter::new(&status)))
            .unwrap();
        assert!(line.starts_with("charger phase=cv"));
        assert!(line.contains("; targets "));
        assert!(line.ends_with("cadence-faults=0"));
    }
}
