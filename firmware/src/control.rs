#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! One control period: fault screening, controller update, output mapping.
//!
//! Kept free of peripherals so the same step runs under host tests.

use charger_core::charger::{ChargeController, Dwell};
use charger_core::clock::Tick;
use charger_core::fault::{FaultKind, FaultLatch, FaultMonitor};
use charger_core::profile::ChargingProfile;
use charger_core::status::ChargerStatus;
use charger_core::telemetry::{EventId, TelemetryEventKind, TelemetryRecord};

use crate::hw::BatterySample;
use crate::status;

/// Measured charge current above this multiple of the bulk limit is a fault.
pub const OVERCURRENT_RATIO: f32 = 1.5;
/// Ticks the current must stay back in range before the fault clears.
pub const OVERCURRENT_HOLDOFF_TICKS: u32 = 30;

/// Levels driven onto the power-stage pins after a tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SwitchOutputs {
    pub charge_enabled: bool,
    pub load_connected: bool,
}

/// Result of a single [`ControlLoop::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    pub outputs: SwitchOutputs,
    pub status: ChargerStatus,
    pub phase_changed: bool,
}

pub struct ControlLoop<'p> {
    controller: ChargeController<'p, FaultLatch>,
    now: Tick,
    overcurrent_clear: Dwell,
    last_logged: Option<EventId>,
}

impl<'p> ControlLoop<'p> {
    pub fn new(profile: &'p ChargingProfile) -> Self {
        Self {
            controller: ChargeController::with_faults(profile, FaultLatch::new(), Tick::ZERO),
            now: Tick::ZERO,
            overcurrent_clear: Dwell::new(),
            last_logged: None,
        }
    }

    pub fn controller(&self) -> &ChargeController<'p, FaultLatch> {
        &self.controller
    }

    /// Runs one tick with the sample taken at the start of the period.
    pub fn step(&mut self, sample: BatterySample) -> StepReport {
        self.now = self.now.next();
        let phase_before = self.controller.get_state();

        self.screen_overcurrent(sample);
        self.controller.update(self.now, sample.volts, sample.amps);
        self.log_new_events();

        let status = self.controller.snapshot();
        status::publish(&status, sample);

        StepReport {
            outputs: SwitchOutputs {
                charge_enabled: self.controller.charging_enabled(),
                load_connected: self.controller.discharging_enabled(),
            },
            status,
            phase_changed: self.controller.get_state() != phase_before,
        }
    }

    fn screen_overcurrent(&mut self, sample: BatterySample) {
        let limit = self.controller.profile().charge_current_max * OVERCURRENT_RATIO;
        let latch = self.controller.faults();
        let in_range = sample.amps <= limit;

        if !in_range {
            latch.raise(FaultKind::OverCurrent);
        }
        let settled = self
            .overcurrent_clear
            .satisfied(in_range, self.now, OVERCURRENT_HOLDOFF_TICKS);
        if settled && latch.active_fault() == Some(FaultKind::OverCurrent) {
            latch.clear();
        }
    }

    fn log_new_events(&mut self) {
        let telemetry = self.controller.telemetry();
        match self.last_logged {
            Some(id) => telemetry.records_after(id).for_each(log_event),
            None => telemetry.oldest_first().for_each(log_event),
        }
        if let Some(latest) = telemetry.latest() {
            self.last_logged = Some(latest.id);
        }
    }
}

#[cfg(target_os = "none")]
fn log_event(record: &TelemetryRecord) {
    let tick = record.tick.get();
    let code = record.event.to_raw();
    match record.event {
        TelemetryEventKind::PhaseChanged { from, to } => {
            defmt::info!(
                "charger[{=u16:#x}]: {} -> {} t={}",
                code,
                from.label(),
                to.label(),
                tick
            );
        }
        TelemetryEventKind::LoadDisconnected => {
            defmt::warn!("charger[{=u16:#x}]: load disconnected t={}", code, tick);
        }
        TelemetryEventKind::LoadReconnected => {
            defmt::info!("charger[{=u16:#x}]: load reconnected t={}", code, tick);
        }
        TelemetryEventKind::FaultRaised(kind) => {
            defmt::warn!(
                "charger[{=u16:#x}]: fault raised {} t={}",
                code,
                defmt::Display2Format(&kind),
                tick
            );
        }
        TelemetryEventKind::FaultCleared => {
            defmt::info!("charger[{=u16:#x}]: fault cleared t={}", code, tick);
        }
        TelemetryEventKind::CadenceViolation { expected, observed } => {
            defmt::warn!(
                "charger[{=u16:#x}]: tick cadence expected t={} observed t={}",
                code,
                expected.get(),
                observed.get()
            );
        }
    }
}

#[cfg(not(target_os = "none"))]
fn log_event(record: &TelemetryRecord) {
    println!("charger[{:#06x}]: {record}", record.event.to_raw());
}

#[cfg(test)]
mod tests {
    use super::*;
    use charger_core::charger::ChargePhase;
    use charger_core::profile::LEAD_ACID_6_CELL;

    fn sample(volts: f32, amps: f32) -> BatterySample {
        BatterySample { volts, amps }
    }

    #[test]
    fn phase_change_is_reported_on_the_transition_tick() {
        let mut control = ControlLoop::new(&LEAD_ACID_6_CELL);

        for _ in 0..59 {
            let report = control.step(sample(12.4, -1.0));
            assert!(!report.phase_changed);
            assert!(report.outputs.charge_enabled);
            assert!(report.outputs.load_connected);
        }

        let report = control.step(sample(12.4, -1.0));
        assert!(report.phase_changed);
        assert_eq!(report.status.phase, ChargePhase::ConstantCurrent);
        assert_eq!(report.status.tick, Tick::new(60));
    }

    #[test]
    fn excessive_current_latches_until_the_holdoff_expires() {
        let mut control = ControlLoop::new(&LEAD_ACID_6_CELL);

        let report = control.step(sample(13.0, 31.0));
        assert!(!report.outputs.charge_enabled);
        assert_eq!(report.status.fault, Some(FaultKind::OverCurrent));

        for _ in 1..OVERCURRENT_HOLDOFF_TICKS {
            let report = control.step(sample(13.0, 0.0));
            assert!(!report.outputs.charge_enabled);
        }

        let report = control.step(sample(13.0, 0.0));
        assert!(report.outputs.charge_enabled);
        assert_eq!(report.status.fault, None);
    }

    #[test]
    fn low_pack_voltage_opens_the_load_switch() {
        let mut control = ControlLoop::new(&LEAD_ACID_6_CELL);

        let report = control.step(sample(11.5, -3.0));
        assert!(!report.outputs.load_connected);
        assert_eq!(control.controller().deep_discharge_cycles(), 1);
    }
}
