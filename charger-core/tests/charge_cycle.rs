use charger_core::charger::{ChargeController, ChargePhase, ChargeState};
use charger_core::clock::Tick;
use charger_core::profile::ChargingProfile;
use charger_core::telemetry::TelemetryEventKind;

const TWO_CELL: ChargingProfile = ChargingProfile {
    num_cells: 2,
    time_limit_recharge: 5,
    cell_voltage_recharge: 2.05,
    charge_current_max: 10.0,
    cell_voltage_max: 2.4,
    time_limit_cv: 3,
    current_cutoff_cv: 0.5,
    trickle_enabled: true,
    cell_voltage_trickle: 2.2,
    time_trickle_recharge: 5,
    equalization_enabled: false,
    cell_voltage_equalization: 2.5,
    time_limit_equalization: 4,
    current_limit_equalization: 1.5,
    equalization_trigger_time: 0,
    equalization_trigger_deep_cycles: 0,
    cell_voltage_load_disconnect: 1.9,
    cell_voltage_load_reconnect: 2.0,
    temperature_compensation: 0.0,
};

struct Bench<'p> {
    controller: ChargeController<'p>,
    now: Tick,
}

impl<'p> Bench<'p> {
    fn new(profile: &'p ChargingProfile) -> Self {
        Self {
            controller: ChargeController::new(profile, Tick::ZERO),
            now: Tick::ZERO,
        }
    }

    fn tick(&mut self, voltage: f32, current: f32) -> ChargePhase {
        self.now = self.now.next();
        self.controller.update(self.now, voltage, current);
        self.controller.get_state()
    }

    fn run(&mut self, ticks: u32, voltage: f32, current: f32) -> ChargePhase {
        for _ in 0..ticks {
            self.tick(voltage, current);
        }
        self.controller.get_state()
    }

    /// Drives the bench from idle into absorption at tick 6.
    fn into_absorption(&mut self) {
        assert_eq!(self.run(5, 4.0, 0.0), ChargePhase::ConstantCurrent);
        assert_eq!(self.tick(4.8, 10.0), ChargePhase::ConstantVoltage);
    }
}

fn cutoff_since(controller: &ChargeController<'_>) -> Option<Tick> {
    match controller.state() {
        ChargeState::ConstantVoltage { cutoff, .. } => cutoff.since(),
        _ => None,
    }
}

fn approx(actual: f32, expected: f32) -> bool {
    (actual - expected).abs() < 1e-4
}

#[test]
fn end_to_end_cycle_reaches_trickle() {
    let mut bench = Bench::new(&TWO_CELL);

    assert_eq!(bench.run(4, 4.0, 0.0), ChargePhase::Idle);
    assert_eq!(bench.tick(4.0, 0.0), ChargePhase::ConstantCurrent);
    assert!(approx(bench.controller.read_target_current(), 10.0));
    assert!(bench.controller.charging_enabled());

    assert_eq!(bench.tick(4.8, 10.0), ChargePhase::ConstantVoltage);
    assert!(approx(bench.controller.read_target_voltage(), 4.8));

    assert_eq!(bench.run(3, 4.8, 0.4), ChargePhase::Trickle);
    assert!(approx(bench.controller.read_target_voltage(), 4.4));
    assert_eq!(bench.controller.time_phase_entered(), Tick::new(9));

    let phases: Vec<_> = bench
        .controller
        .telemetry()
        .oldest_first()
        .filter_map(|record| match record.event {
            TelemetryEventKind::PhaseChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        [
            ChargePhase::ConstantCurrent,
            ChargePhase::ConstantVoltage,
            ChargePhase::Trickle
        ]
    );
}

#[test]
fn absorption_ends_in_idle_without_trickle() {
    let profile = ChargingProfile {
        trickle_enabled: false,
        ..TWO_CELL
    };
    let mut bench = Bench::new(&profile);
    bench.into_absorption();

    assert_eq!(bench.run(3, 4.8, 0.4), ChargePhase::Idle);
    assert!(approx(bench.controller.read_target_voltage(), 0.0));
    assert!(approx(bench.controller.read_target_current(), 0.0));
}

#[test]
fn recharge_dwell_must_be_consecutive() {
    let mut bench = Bench::new(&TWO_CELL);

    bench.run(3, 4.0, 0.0);
    assert_eq!(bench.tick(4.2, 0.0), ChargePhase::Idle);
    assert_eq!(bench.run(4, 4.0, 0.0), ChargePhase::Idle);
    assert_eq!(bench.tick(4.0, 0.0), ChargePhase::ConstantCurrent);
}

#[test]
fn bulk_switches_to_absorption_on_first_tick_at_limit() {
    let mut bench = Bench::new(&TWO_CELL);
    bench.run(5, 4.0, 0.0);

    assert_eq!(bench.tick(4.79, 10.0), ChargePhase::ConstantCurrent);
    assert!(approx(bench.controller.read_target_voltage(), 4.8));
    assert_eq!(bench.tick(4.81, 10.0), ChargePhase::ConstantVoltage);
    assert_eq!(bench.controller.time_phase_entered(), Tick::new(7));
}

#[test]
fn cutoff_boundary_is_inclusive_at_the_limit() {
    let mut bench = Bench::new(&TWO_CELL);
    bench.into_absorption();

    assert_eq!(bench.run(2, 4.8, 0.5), ChargePhase::ConstantVoltage);
    assert_eq!(bench.tick(4.8, 0.5), ChargePhase::Trickle);
}

#[test]
fn current_rebound_resets_the_cutoff_dwell() {
    let mut bench = Bench::new(&TWO_CELL);
    bench.into_absorption();

    assert_eq!(bench.tick(4.8, 0.4), ChargePhase::ConstantVoltage);
    assert_eq!(bench.controller.time_voltage_limit_reached(), Some(Tick::new(7)));
    assert_eq!(cutoff_since(&bench.controller), Some(Tick::new(7)));

    // Current rises and the voltage sags under the limit for one tick.
    assert_eq!(bench.tick(4.7, 2.0), ChargePhase::ConstantVoltage);
    assert_eq!(bench.controller.time_voltage_limit_reached(), None);
    assert_eq!(cutoff_since(&bench.controller), None);

    assert_eq!(bench.tick(4.8, 0.4), ChargePhase::ConstantVoltage);
    assert_eq!(bench.controller.time_voltage_limit_reached(), Some(Tick::new(9)));
    assert_eq!(cutoff_since(&bench.controller), Some(Tick::new(9)));
}

#[test]
fn absorption_ceiling_counts_from_phase_entry() {
    let mut bench = Bench::new(&TWO_CELL);
    bench.into_absorption();

    // Voltage sits just under the limit and current never tapers.
    assert_eq!(bench.run(3, 4.79, 3.0), ChargePhase::ConstantVoltage);
    assert_eq!(bench.controller.time_voltage_limit_reached(), None);
    assert_eq!(bench.tick(4.79, 3.0), ChargePhase::Trickle);
    assert_eq!(bench.controller.time_phase_entered(), Tick::new(10));
}

#[test]
fn absorption_ceiling_ends_rebounding_charge() {
    let mut bench = Bench::new(&TWO_CELL);
    bench.into_absorption();

    bench.run(2, 4.8, 0.4);
    bench.tick(4.7, 2.0);
    assert_eq!(bench.tick(4.8, 0.4), ChargePhase::Trickle);
}

#[test]
fn trickle_falls_back_to_bulk_after_recharge_dwell() {
    let mut bench = Bench::new(&TWO_CELL);
    bench.into_absorption();
    assert_eq!(bench.run(3, 4.8, 0.4), ChargePhase::Trickle);

    assert_eq!(bench.run(4, 4.0, -1.0), ChargePhase::Trickle);
    assert_eq!(bench.tick(4.0, -1.0), ChargePhase::ConstantCurrent);
    assert!(approx(bench.controller.read_target_current(), 10.0));
}

#[test]
fn accessors_are_idempotent_between_ticks() {
    let mut bench = Bench::new(&TWO_CELL);
    bench.into_absorption();

    let controller = &bench.controller;
    assert_eq!(controller.get_state(), controller.get_state());
    assert_eq!(
        controller.read_target_voltage().to_bits(),
        controller.read_target_voltage().to_bits()
    );
    assert_eq!(
        controller.read_target_current().to_bits(),
        controller.read_target_current().to_bits()
    );
    assert_eq!(controller.charging_enabled(), controller.charging_enabled());
    assert_eq!(
        controller.discharging_enabled(),
        controller.discharging_enabled()
    );
    assert_eq!(controller.snapshot(), controller.snapshot());
}

#[test]
fn snapshot_reports_ticks_spent_in_phase() {
    let mut bench = Bench::new(&TWO_CELL);
    bench.into_absorption();
    bench.run(2, 4.8, 1.0);

    let status = bench.controller.snapshot();
    assert_eq!(status.phase, ChargePhase::ConstantVoltage);
    assert_eq!(status.tick, Tick::new(8));
    assert_eq!(status.ticks_in_phase, 2);
    assert_eq!(status.cadence_faults, 0);
}
