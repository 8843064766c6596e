//! Charging state machine.
//!
//! [`ChargeController`] borrows a [`ChargingProfile`] and is advanced by
//! [`ChargeController::update`] exactly once per
//! [`TICK_PERIOD`](crate::clock::TICK_PERIOD). Every timer is counted in ticks
//! taken from the caller's monotonic [`Tick`] counter, so the controller is
//! fully deterministic for a given profile, measurement history, and tick
//! sequence. Outputs are cached and read back through side-effect free
//! accessors between ticks.
//!
//! Phase cycle:
//!
//! ```text
//! Idle -> ConstantCurrent -> ConstantVoltage -> Trickle | Idle
//! Trickle -> ConstantCurrent | Equalization
//! Idle -> Equalization -> Trickle | Idle
//! ```

use core::fmt;

use crate::clock::Tick;
use crate::fault::{FaultKind, FaultMonitor, NoFaultMonitor};
use crate::profile::ChargingProfile;
use crate::status::ChargerStatus;
use crate::telemetry::{TelemetryEventKind, TelemetryLog};

/// Charging phase reported to supervisors.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChargePhase {
    /// Not charging; waiting for the recharge trigger.
    Idle,
    /// Bulk: current held at the profile maximum while voltage rises.
    ConstantCurrent,
    /// Absorption: voltage held at the ceiling while current tapers.
    ConstantVoltage,
    /// Float maintenance charge.
    Trickle,
    /// Controlled overvoltage to balance series cells.
    Equalization,
}

impl ChargePhase {
    pub const ALL: [ChargePhase; 5] = [
        ChargePhase::Idle,
        ChargePhase::ConstantCurrent,
        ChargePhase::ConstantVoltage,
        ChargePhase::Trickle,
        ChargePhase::Equalization,
    ];

    /// Deterministic index used for compact encodings.
    #[must_use]
    pub const fn as_index(self) -> u16 {
        match self {
            ChargePhase::Idle => 0,
            ChargePhase::ConstantCurrent => 1,
            ChargePhase::ConstantVoltage => 2,
            ChargePhase::Trickle => 3,
            ChargePhase::Equalization => 4,
        }
    }

    /// Attempts to construct a [`ChargePhase`] from a raw index.
    #[must_use]
    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(ChargePhase::Idle),
            1 => Some(ChargePhase::ConstantCurrent),
            2 => Some(ChargePhase::ConstantVoltage),
            3 => Some(ChargePhase::Trickle),
            4 => Some(ChargePhase::Equalization),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ChargePhase::Idle => "idle",
            ChargePhase::ConstantCurrent => "cc",
            ChargePhase::ConstantVoltage => "cv",
            ChargePhase::Trickle => "trickle",
            ChargePhase::Equalization => "equalization",
        }
    }
}

impl fmt::Display for ChargePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tracks how long a condition has held on consecutive ticks.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Dwell {
    since: Option<Tick>,
}

impl Dwell {
    #[must_use]
    pub const fn new() -> Self {
        Self { since: None }
    }

    /// Tick on which the condition started holding, if it currently holds.
    #[must_use]
    pub const fn since(&self) -> Option<Tick> {
        self.since
    }

    /// Observes `holds` at `now` and returns the consecutive tick count,
    /// counting `now` itself. Any tick where the condition fails resets it.
    pub fn observe(&mut self, holds: bool, now: Tick) -> u64 {
        if !holds {
            self.since = None;
            return 0;
        }

        let since = *self.since.get_or_insert(now);
        now.ticks_since(since) + 1
    }

    /// Returns `true` once the condition has held for at least `limit` ticks.
    pub fn satisfied(&mut self, holds: bool, now: Tick, limit: u32) -> bool {
        let held_for = self.observe(holds, now);
        holds && held_for >= u64::from(limit)
    }
}

/// Phase together with the timers only that phase needs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChargeState {
    Idle {
        recharge: Dwell,
    },
    ConstantCurrent,
    ConstantVoltage {
        /// First tick of the current dwell at the absorption voltage limit.
        voltage_limit_reached: Option<Tick>,
        cutoff: Dwell,
    },
    Trickle {
        recharge: Dwell,
    },
    Equalization,
}

impl ChargeState {
    /// Fresh state for `phase` with every timer cleared.
    #[must_use]
    pub const fn entering(phase: ChargePhase) -> Self {
        match phase {
            ChargePhase::Idle => ChargeState::Idle {
                recharge: Dwell::new(),
            },
            ChargePhase::ConstantCurrent => ChargeState::ConstantCurrent,
            ChargePhase::ConstantVoltage => ChargeState::ConstantVoltage {
                voltage_limit_reached: None,
                cutoff: Dwell::new(),
            },
            ChargePhase::Trickle => ChargeState::Trickle {
                recharge: Dwell::new(),
            },
            ChargePhase::Equalization => ChargeState::Equalization,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> ChargePhase {
        match self {
            ChargeState::Idle { .. } => ChargePhase::Idle,
            ChargeState::ConstantCurrent => ChargePhase::ConstantCurrent,
            ChargeState::ConstantVoltage { .. } => ChargePhase::ConstantVoltage,
            ChargeState::Trickle { .. } => ChargePhase::Trickle,
            ChargeState::Equalization => ChargePhase::Equalization,
        }
    }
}

/// Charging state machine bound to one borrowed profile.
///
/// # Tick contract
///
/// [`update`](Self::update) must be called once per tick with a tick counter
/// that advances by exactly one between calls. The controller cannot correct
/// a missed or doubled tick: gaps are counted in
/// [`cadence_faults`](Self::cadence_faults) and recorded as
/// [`TelemetryEventKind::CadenceViolation`], and a tick that does not move
/// forward trips a debug assertion.
pub struct ChargeController<'p, F = NoFaultMonitor> {
    profile: &'p ChargingProfile,
    faults: F,
    state: ChargeState,
    time_phase_entered: Tick,
    target_voltage: f32,
    target_current: f32,
    charging_enabled: bool,
    discharging_enabled: bool,
    active_fault: Option<FaultKind>,
    last_tick: Option<Tick>,
    last_equalization: Tick,
    deep_discharge_cycles: u32,
    cadence_faults: u32,
    telemetry: TelemetryLog,
}

impl<'p> ChargeController<'p, NoFaultMonitor> {
    /// Creates a controller in [`ChargePhase::Idle`] at tick `now`.
    ///
    /// Charging stays disabled and the load stays connected until the first
    /// [`update`](Self::update).
    #[must_use]
    pub fn new(profile: &'p ChargingProfile, now: Tick) -> Self {
        Self::with_faults(profile, NoFaultMonitor::new(), now)
    }
}

impl<'p, F> ChargeController<'p, F>
where
    F: FaultMonitor,
{
    /// Creates a controller that consults `faults` before enabling charging.
    #[must_use]
    pub fn with_faults(profile: &'p ChargingProfile, faults: F, now: Tick) -> Self {
        Self {
            profile,
            faults,
            state: ChargeState::entering(ChargePhase::Idle),
            time_phase_entered: now,
            target_voltage: 0.0,
            target_current: 0.0,
            charging_enabled: false,
            discharging_enabled: true,
            active_fault: None,
            last_tick: None,
            last_equalization: now,
            deep_discharge_cycles: 0,
            cadence_faults: 0,
            telemetry: TelemetryLog::new(),
        }
    }

    /// Advances the state machine by one tick.
    ///
    /// `battery_voltage` (V) and `battery_current` (A, positive into the
    /// battery) are the filtered measurements for tick `now`.
    pub fn update(&mut self, now: Tick, battery_voltage: f32, battery_current: f32) {
        self.check_cadence(now);
        self.poll_faults(now);

        if let Some(next) = self.next_phase(now, battery_voltage, battery_current) {
            self.enter_state(next, now);
        }

        self.update_load_switch(now, battery_voltage);
        self.charging_enabled = self.active_fault.is_none();
    }

    fn next_phase(
        &mut self,
        now: Tick,
        battery_voltage: f32,
        battery_current: f32,
    ) -> Option<ChargePhase> {
        let profile = self.profile;
        let equalization_due = self.equalization_due(now);
        let after_charge = if profile.trickle_enabled {
            ChargePhase::Trickle
        } else {
            ChargePhase::Idle
        };
        let below_recharge = battery_voltage < profile.pack_voltage_recharge();
        let at_voltage_limit = battery_voltage >= profile.pack_voltage_max();
        let ticks_in_phase = now.ticks_since(self.time_phase_entered);

        match &mut self.state {
            ChargeState::Idle { recharge } => {
                if recharge.satisfied(below_recharge, now, profile.time_limit_recharge) {
                    Some(ChargePhase::ConstantCurrent)
                } else if equalization_due {
                    Some(ChargePhase::Equalization)
                } else {
                    None
                }
            }
            ChargeState::ConstantCurrent => {
                at_voltage_limit.then_some(ChargePhase::ConstantVoltage)
            }
            ChargeState::ConstantVoltage {
                voltage_limit_reached,
                cutoff,
            } => {
                if at_voltage_limit {
                    voltage_limit_reached.get_or_insert(now);
                } else {
                    *voltage_limit_reached = None;
                }

                let tapered = cutoff.satisfied(
                    battery_current <= profile.current_cutoff_cv,
                    now,
                    profile.time_limit_cv,
                );
                let ceiling_reached = ticks_in_phase > u64::from(profile.time_limit_cv);

                (tapered || ceiling_reached).then_some(after_charge)
            }
            ChargeState::Trickle { recharge } => {
                if recharge.satisfied(below_recharge, now, profile.time_trickle_recharge) {
                    Some(ChargePhase::ConstantCurrent)
                } else if equalization_due {
                    Some(ChargePhase::Equalization)
                } else {
                    None
                }
            }
            ChargeState::Equalization => {
                (ticks_in_phase >= u64::from(profile.time_limit_equalization))
                    .then_some(after_charge)
            }
        }
    }

    fn enter_state(&mut self, next: ChargePhase, now: Tick) {
        let previous = self.state.phase();
        if previous == ChargePhase::Equalization {
            self.last_equalization = now;
            self.deep_discharge_cycles = 0;
        }

        self.state = ChargeState::entering(next);
        self.time_phase_entered = now;
        self.apply_targets();
        self.telemetry.record(
            TelemetryEventKind::PhaseChanged {
                from: previous,
                to: next,
            },
            now,
        );
    }

    fn apply_targets(&mut self) {
        let profile = self.profile;
        let (voltage, current) = match self.state.phase() {
            ChargePhase::Idle => (0.0, 0.0),
            ChargePhase::ConstantCurrent | ChargePhase::ConstantVoltage => {
                (profile.pack_voltage_max(), profile.charge_current_max)
            }
            ChargePhase::Trickle => (profile.pack_voltage_trickle(), profile.charge_current_max),
            ChargePhase::Equalization => (
                profile.pack_voltage_equalization(),
                profile.current_limit_equalization,
            ),
        };
        self.target_voltage = voltage;
        self.target_current = current;
    }

    fn equalization_due(&self, now: Tick) -> bool {
        let profile = self.profile;
        if !profile.equalization_enabled {
            return false;
        }

        let calendar = profile
            .equalization_interval_ticks()
            .is_some_and(|interval| now.ticks_since(self.last_equalization) >= interval);
        let cycles = profile.equalization_trigger_deep_cycles != 0
            && self.deep_discharge_cycles >= profile.equalization_trigger_deep_cycles;

        calendar || cycles
    }

    fn update_load_switch(&mut self, now: Tick, battery_voltage: f32) {
        let profile = self.profile;
        if self.discharging_enabled && battery_voltage <= profile.pack_voltage_load_disconnect() {
            self.discharging_enabled = false;
            self.deep_discharge_cycles = self.deep_discharge_cycles.saturating_add(1);
            self.telemetry.record(TelemetryEventKind::LoadDisconnected, now);
        } else if !self.discharging_enabled
            && battery_voltage >= profile.pack_voltage_load_reconnect()
        {
            self.discharging_enabled = true;
            self.telemetry.record(TelemetryEventKind::LoadReconnected, now);
        }
    }

    fn poll_faults(&mut self, now: Tick) {
        let fault = self.faults.active_fault();
        if fault == self.active_fault {
            return;
        }

        let event = match fault {
            Some(kind) => TelemetryEventKind::FaultRaised(kind),
            None => TelemetryEventKind::FaultCleared,
        };
        self.active_fault = fault;
        self.telemetry.record(event, now);
    }

    fn check_cadence(&mut self, now: Tick) {
        if let Some(last) = self.last_tick {
            debug_assert!(now > last, "charger ticks must advance: {last} -> {now}");

            let expected = last.next();
            if now != expected {
                self.cadence_faults = self.cadence_faults.saturating_add(1);
                self.telemetry.record(
                    TelemetryEventKind::CadenceViolation {
                        expected,
                        observed: now,
                    },
                    now,
                );
            }
        }
        self.last_tick = Some(now);
    }
}

impl<F> ChargeController<'_, F> {
    /// Current ceiling the power stage should apply (A).
    #[must_use]
    pub fn read_target_current(&self) -> f32 {
        self.target_current
    }

    /// Voltage the power stage should regulate to (V).
    #[must_use]
    pub fn read_target_voltage(&self) -> f32 {
        self.target_voltage
    }

    /// Returns `true` when the power stage may charge the battery.
    #[must_use]
    pub fn charging_enabled(&self) -> bool {
        self.charging_enabled
    }

    /// Returns `true` when the load switch may stay closed.
    #[must_use]
    pub fn discharging_enabled(&self) -> bool {
        self.discharging_enabled
    }

    /// Returns the current charging phase.
    #[must_use]
    pub fn get_state(&self) -> ChargePhase {
        self.state.phase()
    }

    /// Returns the phase together with its timers.
    #[must_use]
    pub fn state(&self) -> &ChargeState {
        &self.state
    }

    /// Tick of the last phase transition.
    #[must_use]
    pub fn time_phase_entered(&self) -> Tick {
        self.time_phase_entered
    }

    /// First tick of the current dwell at the absorption voltage limit.
    #[must_use]
    pub fn time_voltage_limit_reached(&self) -> Option<Tick> {
        match self.state {
            ChargeState::ConstantVoltage {
                voltage_limit_reached,
                ..
            } => voltage_limit_reached,
            _ => None,
        }
    }

    /// Tick the last equalization finished (construction tick before the first).
    #[must_use]
    pub fn last_equalization(&self) -> Tick {
        self.last_equalization
    }

    /// Load-disconnect trips since the last equalization.
    #[must_use]
    pub fn deep_discharge_cycles(&self) -> u32 {
        self.deep_discharge_cycles
    }

    /// Number of updates that did not follow the previous tick by exactly one.
    #[must_use]
    pub fn cadence_faults(&self) -> u32 {
        self.cadence_faults
    }

    /// Fault reported by the monitor on the last tick.
    #[must_use]
    pub fn active_fault(&self) -> Option<FaultKind> {
        self.active_fault
    }

    /// Tick passed to the most recent update, if any.
    #[must_use]
    pub fn last_tick(&self) -> Option<Tick> {
        self.last_tick
    }

    #[must_use]
    pub fn profile(&self) -> &ChargingProfile {
        self.profile
    }

    #[must_use]
    pub fn faults(&self) -> &F {
        &self.faults
    }

    /// Recent controller events.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryLog {
        &self.telemetry
    }

    /// Captures the cached outputs for status reporting.
    #[must_use]
    pub fn snapshot(&self) -> ChargerStatus {
        let tick = self.last_tick.unwrap_or(self.time_phase_entered);
        ChargerStatus {
            phase: self.get_state(),
            target_voltage: self.target_voltage,
            target_current: self.target_current,
            charging_enabled: self.charging_enabled,
            discharging_enabled: self.discharging_enabled,
            tick,
            ticks_in_phase: tick.ticks_since(self.time_phase_entered),
            deep_discharge_cycles: self.deep_discharge_cycles,
            cadence_faults: self.cadence_faults,
            fault: self.active_fault,
        }
    }
}
