#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Published charger outputs for tasks that do not own the controller.
//!
//! The charger task stores each tick's snapshot in single-word atomics so
//! readers never touch the controller itself. Phase changes are additionally
//! handed to the report task through [`PHASE_REPORTS`]; between phase changes
//! the report task logs a heartbeat built from [`published`].

use core::fmt;

use charger_core::charger::ChargePhase;
use charger_core::status::ChargerStatus;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicI32, AtomicU16, AtomicU32, AtomicU64, Ordering};

use crate::hw::BatterySample;

/// Latest status captured on a phase transition.
pub static PHASE_REPORTS: Signal<CriticalSectionRawMutex, ChargerStatus> = Signal::new();

static PHASE: AtomicU16 = AtomicU16::new(0);
static TARGET_MV: AtomicI32 = AtomicI32::new(0);
static TARGET_MA: AtomicI32 = AtomicI32::new(0);
static BATTERY_MV: AtomicI32 = AtomicI32::new(0);
static BATTERY_MA: AtomicI32 = AtomicI32::new(0);
static CHARGING_ENABLED: AtomicBool = AtomicBool::new(false);
static LOAD_CONNECTED: AtomicBool = AtomicBool::new(true);
static TICK: AtomicU64 = AtomicU64::new(0);
static DEEP_CYCLES: AtomicU32 = AtomicU32::new(0);
static CADENCE_FAULTS: AtomicU32 = AtomicU32::new(0);

/// Fixed-point copy of the published outputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PublishedStatus {
    pub phase: ChargePhase,
    pub target_mv: i32,
    pub target_ma: i32,
    pub battery_mv: i32,
    pub battery_ma: i32,
    pub charging_enabled: bool,
    pub load_connected: bool,
    pub tick: u64,
    pub deep_discharge_cycles: u32,
    pub cadence_faults: u32,
}

impl fmt::Display for PublishedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t{} phase={} battery={}mV/{}mA target={}mV/{}mA charging={} load={} deep-cycles={} cadence-faults={}",
            self.tick,
            self.phase,
            self.battery_mv,
            self.battery_ma,
            self.target_mv,
            self.target_ma,
            on_off(self.charging_enabled),
            on_off(self.load_connected),
            self.deep_discharge_cycles,
            self.cadence_faults
        )
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

impl PublishedStatus {
    /// Fixed-point view of one tick's snapshot and measurement.
    #[must_use]
    pub fn capture(status: &ChargerStatus, battery: BatterySample) -> Self {
        Self {
            phase: status.phase,
            target_mv: to_milli(status.target_voltage),
            target_ma: to_milli(status.target_current),
            battery_mv: to_milli(battery.volts),
            battery_ma: to_milli(battery.amps),
            charging_enabled: status.charging_enabled,
            load_connected: status.discharging_enabled,
            tick: status.tick.get(),
            deep_discharge_cycles: status.deep_discharge_cycles,
            cadence_faults: status.cadence_faults,
        }
    }
}

/// Stores the snapshot and measurement taken on the current tick.
pub fn publish(status: &ChargerStatus, battery: BatterySample) {
    let captured = PublishedStatus::capture(status, battery);
    PHASE.store(captured.phase.as_index(), Ordering::Relaxed);
    TARGET_MV.store(captured.target_mv, Ordering::Relaxed);
    TARGET_MA.store(captured.target_ma, Ordering::Relaxed);
    BATTERY_MV.store(captured.battery_mv, Ordering::Relaxed);
    BATTERY_MA.store(captured.battery_ma, Ordering::Relaxed);
    CHARGING_ENABLED.store(captured.charging_enabled, Ordering::Relaxed);
    LOAD_CONNECTED.store(captured.load_connected, Ordering::Relaxed);
    TICK.store(captured.tick, Ordering::Relaxed);
    DEEP_CYCLES.store(captured.deep_discharge_cycles, Ordering::Relaxed);
    CADENCE_FAULTS.store(captured.cadence_faults, Ordering::Relaxed);
}

/// Reads back the most recently published outputs.
pub fn published() -> PublishedStatus {
    PublishedStatus {
        phase: ChargePhase::from_index(PHASE.load(Ordering::Relaxed)).unwrap_or(ChargePhase::Idle),
        target_mv: TARGET_MV.load(Ordering::Relaxed),
        target_ma: TARGET_MA.load(Ordering::Relaxed),
        battery_mv: BATTERY_MV.load(Ordering::Relaxed),
        battery_ma: BATTERY_MA.load(Ordering::Relaxed),
        charging_enabled: CHARGING_ENABLED.load(Ordering::Relaxed),
        load_connected: LOAD_CONNECTED.load(Ordering::Relaxed),
        tick: TICK.load(Ordering::Relaxed),
        deep_discharge_cycles: DEEP_CYCLES.load(Ordering::Relaxed),
        cadence_faults: CADENCE_FAULTS.load(Ordering::Relaxed),
    }
}

/// Rounds a volt/amp value to the nearest milli-unit.
#[allow(clippy::cast_possible_truncation)]
fn to_milli(value: f32) -> i32 {
    let scaled = value * 1000.0;
    let bias = if scaled < 0.0 { -0.5 } else { 0.5 };
    (scaled + bias) as i32
}
