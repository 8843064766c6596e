use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant as HostInstant};

use charger_core::charger::ChargeController;
use charger_core::clock::Tick;
use charger_core::fault::{FaultKind, FaultLatch};
use charger_core::profile::ProfileKind;
use charger_core::status::StatusFormatter;
use charger_core::telemetry::EventId;

use crate::battery::SimBattery;
use crate::command::{self, ConsoleCommand};

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "tick",
        "tick <volts> <amps> [count]    - feed a measurement for one or more ticks",
    ),
    (
        "sim",
        "sim <ticks>                    - run the simulated battery against the charger",
    ),
    (
        "skip",
        "skip <ticks>                   - advance the clock without updating the charger",
    ),
    (
        "status",
        "status                         - display charger phase, targets and protection",
    ),
    (
        "events",
        "events                         - list recorded telemetry events",
    ),
    (
        "fault",
        "fault <none|overtemp|overcurrent|external <code>> - latch or clear a fault",
    ),
    (
        "help",
        "help [topic]                   - show help for a command",
    ),
    ("exit", "exit                           - close the session"),
];

/// Default transcript location for a profile.
#[must_use]
pub fn log_path(profile: ProfileKind) -> PathBuf {
    PathBuf::from(format!("evidence/emulator-{}.log", profile.tag()))
}

pub struct Session {
    profile: ProfileKind,
    controller: ChargeController<'static, FaultLatch>,
    battery: SimBattery,
    now: Tick,
    last_reported: Option<EventId>,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl Session {
    pub fn new(profile: ProfileKind) -> io::Result<Self> {
        Self::with_transcript(profile, log_path(profile))
    }

    pub fn with_transcript(profile: ProfileKind, path: impl AsRef<Path>) -> io::Result<Self> {
        let settings = profile.profile();
        settings
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;

        let transcript = TranscriptLogger::new(path.as_ref(), profile)?;
        Ok(Self {
            profile,
            controller: ChargeController::with_faults(settings, FaultLatch::new(), Tick::ZERO),
            battery: SimBattery::for_profile(settings),
            now: Tick::ZERO,
            last_reported: None,
            transcript,
            started_at: HostInstant::now(),
        })
    }

    #[must_use]
    pub fn profile(&self) -> ProfileKind {
        self.profile
    }

    #[must_use]
    pub fn controller(&self) -> &ChargeController<'static, FaultLatch> {
        &self.controller
    }

    #[must_use]
    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match command::parse(trimmed) {
            Ok(ConsoleCommand::Tick { volts, amps, count }) => self.handle_tick(volts, amps, count),
            Ok(ConsoleCommand::Sim { ticks }) => self.handle_sim(ticks),
            Ok(ConsoleCommand::Skip { ticks }) => self.handle_skip(ticks),
            Ok(ConsoleCommand::Status) => self.status_lines()?,
            Ok(ConsoleCommand::Events) => self.event_lines(),
            Ok(ConsoleCommand::Fault(fault)) => self.handle_fault(fault),
            Ok(ConsoleCommand::Help(topic)) => help_lines(topic),
            Err(err) => vec![format!("ERR {} {err}", err.kind())],
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn handle_tick(&mut self, volts: f32, amps: f32, count: u32) -> Vec<String> {
        for _ in 0..count {
            self.now = self.now.next();
            self.controller.update(self.now, volts, amps);
        }

        let mut lines = vec![format!(
            "OK tick now={} phase={}",
            self.now,
            self.controller.get_state()
        )];
        self.push_new_events(&mut lines);
        lines
    }

    fn handle_sim(&mut self, ticks: u32) -> Vec<String> {
        for _ in 0..ticks {
            let measurement = self.battery.step(
                self.controller.read_target_voltage(),
                self.controller.read_target_current(),
                self.controller.charging_enabled(),
                self.controller.discharging_enabled(),
            );
            self.now = self.now.next();
            self.controller
                .update(self.now, measurement.volts, measurement.amps);
        }

        let last = self.battery.last();
        let mut lines = vec![format!(
            "OK sim now={} phase={} soc={:.1}% battery={:.2}V/{:.2}A",
            self.now,
            self.controller.get_state(),
            self.battery.soc() * 100.0,
            last.volts,
            last.amps
        )];
        self.push_new_events(&mut lines);
        lines
    }

    fn handle_skip(&mut self, ticks: u32) -> Vec<String> {
        self.now = self.now + u64::from(ticks);
        vec![format!(
            "OK skip now={} (next update reports a cadence gap)",
            self.now
        )]
    }

    fn handle_fault(&self, fault: Option<FaultKind>) -> Vec<String> {
        let latch = self.controller.faults();
        match fault {
            Some(kind) => {
                latch.raise(kind);
                vec![format!("OK fault latched {kind} (applies on next tick)")]
            }
            None => {
                latch.clear();
                vec!["OK fault cleared (applies on next tick)".to_string()]
            }
        }
    }

    fn status_lines(&self) -> io::Result<Vec<String>> {
        let status = self.controller.snapshot();
        let formatter = StatusFormatter::new(&status);
        let mut phase = String::new();
        let mut targets = String::new();
        let mut protection = String::new();
        formatter
            .write_phase_line(&mut phase)
            .map_err(io::Error::other)?;
        formatter
            .write_targets_line(&mut targets)
            .map_err(io::Error::other)?;
        formatter
            .write_protection_line(&mut protection)
            .map_err(io::Error::other)?;
        Ok(vec![phase, targets, protection])
    }

    fn event_lines(&mut self) -> Vec<String> {
        let telemetry = self.controller.telemetry();
        let mut lines = vec![format!("OK events count={}", telemetry.len())];
        lines.extend(
            telemetry
                .oldest_first()
                .map(|record| format!("  event {record}")),
        );
        self.last_reported = telemetry.latest().map(|record| record.id);
        lines
    }

    fn push_new_events(&mut self, lines: &mut Vec<String>) {
        let telemetry = self.controller.telemetry();
        let fresh: Vec<String> = match self.last_reported {
            Some(id) => telemetry
                .records_after(id)
                .map(|record| format!("  event {record}"))
                .collect(),
            None => telemetry
                .oldest_first()
                .map(|record| format!("  event {record}"))
                .collect(),
        };
        lines.extend(fresh);
        if let Some(latest) = telemetry.latest() {
            self.last_reported = Some(latest.id);
        }
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, profile: ProfileKind) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: ProfileKind) -> io::Result<()> {
        writeln!(self.writer, "# Charger emulator transcript ({profile})")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charger_core::charger::ChargePhase;

    fn session(name: &str) -> (Session, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "charger-emulator-{name}-{}.log",
            std::process::id()
        ));
        let session = Session::with_transcript(ProfileKind::LeadAcid, &path).unwrap();
        (session, path)
    }

    #[test]
    fn ticks_below_recharge_start_bulk_charging() {
        let (mut session, path) = session("tick");

        let lines = session.handle_command("tick 12.4 0 60").unwrap();
        assert_eq!(lines[0], "OK tick now=t60 phase=cc");
        assert!(lines.iter().any(|line| line.contains("phase-changed idle->cc")));

        let lines = session.handle_command("tick 12.6 20").unwrap();
        assert_eq!(lines, vec!["OK tick now=t61 phase=cc".to_string()]);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn skipped_ticks_surface_as_cadence_faults() {
        let (mut session, path) = session("skip");

        session.handle_command("tick 12.9 0").unwrap();
        let lines = session.handle_command("skip 10").unwrap();
        assert_eq!(lines[0], "OK skip now=t11 (next update reports a cadence gap)");

        let lines = session.handle_command("tick 12.9 0").unwrap();
        assert!(lines.iter().any(|line| line.contains("cadence-violation")));
        assert_eq!(session.controller().cadence_faults(), 1);

        let status = session.handle_command("status").unwrap();
        assert_eq!(status.len(), 3);
        assert!(status[2].ends_with("cadence-faults=1"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn latched_fault_disables_charging_on_next_tick() {
        let (mut session, path) = session("fault");

        let lines = session.handle_command("fault overtemp").unwrap();
        assert_eq!(
            lines,
            vec!["OK fault latched over-temperature (applies on next tick)".to_string()]
        );
        session.handle_command("tick 12.9 0").unwrap();

        let status = session.handle_command("status").unwrap();
        assert!(status[1].ends_with("charging=disabled"));
        assert!(status[2].contains("fault=over-temperature"));

        session.handle_command("fault none").unwrap();
        session.handle_command("tick 12.9 0").unwrap();
        assert!(session.controller().charging_enabled());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn simulated_battery_is_recharged_after_the_dwell() {
        let (mut session, path) = session("sim");

        let lines = session.handle_command("sim 120").unwrap();
        assert!(lines[0].starts_with("OK sim now=t120 phase=cc"));
        assert_eq!(
            session.controller().get_state(),
            ChargePhase::ConstantCurrent
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn simulated_charge_runs_through_absorption_into_trickle() {
        let (mut session, path) = session("sim-cycle");

        let lines = session.handle_command("sim 5000").unwrap();
        assert!(lines[0].starts_with("OK sim now=t5000 phase=cv"));
        assert!(lines.iter().any(|line| line.contains("phase-changed cc->cv")));

        let lines = session.handle_command("sim 15000").unwrap();
        assert!(lines[0].starts_with("OK sim now=t20000 phase=trickle"));
        assert!(lines.iter().any(|line| line.contains("phase-changed cv->trickle")));
        assert!(session.controller().discharging_enabled());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn parse_errors_are_reported_inline() {
        let (mut session, path) = session("errors");

        let lines = session.handle_command("tick abc").unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR syntax"));

        let lines = session.handle_command("sim 0").unwrap();
        assert_eq!(lines, vec!["ERR range ticks must be at least 1".to_string()]);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn help_lists_topics_and_rejects_unknown_ones() {
        let (mut session, path) = session("help");

        let lines = session.handle_command("help").unwrap();
        assert_eq!(lines.first().map(String::as_str), Some("Available commands:"));
        assert_eq!(lines.len(), HELP_TOPICS.len() + 2);

        let lines = session.handle_command("help reboot").unwrap();
        assert_eq!(lines[0], "No help available for `reboot`.");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn events_command_lists_the_ring_and_marks_it_reported() {
        let (mut session, path) = session("events");

        session.handle_command("tick 12.4 0 60").unwrap();
        let lines = session.handle_command("events").unwrap();
        assert_eq!(lines[0], "OK events count=1");
        assert_eq!(lines[1], "  event #0 t60 phase-changed idle->cc");

        let lines = session.handle_command("tick 14.5 20").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("phase-changed cc->cv"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn transcript_records_host_and_emulator_lines() {
        let (mut session, path) = session("transcript");
        session.handle_command("status").unwrap();
        drop(session);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# Charger emulator transcript (lead-acid)"));
        assert!(contents.contains("HOST> status"));
        assert!(contents.contains("EMU < charger phase=idle tick=t0 in-phase=0"));

        let _ = fs::remove_file(path);
    }
}
