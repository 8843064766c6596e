//! Simulated battery pack used by the `sim` command.
//!
//! A coarse open-circuit-voltage model with a fixed internal resistance. The
//! load draws a constant current whenever the load switch is closed. When
//! charging is enabled the charger feeds the load and the pack together: its
//! output current is capped at the target current and the terminal voltage at
//! the target voltage. Whatever the charger cannot cover comes out of the pack.

use charger_core::clock::TICK_PERIOD;
use charger_core::profile::ChargingProfile;

const DEFAULT_SOC: f32 = 0.5;
const DEFAULT_LOAD_AMPS: f32 = 2.0;
const DEFAULT_CAPACITY_AH: f32 = 50.0;
const CELL_RESISTANCE_OHMS: f32 = 0.01;
const KNEE_SOC: f32 = 0.9;

/// Measurement produced by one simulation step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub volts: f32,
    /// Positive into the battery.
    pub amps: f32,
}

#[derive(Clone, Debug)]
pub struct SimBattery {
    soc: f32,
    capacity_ah: f32,
    load_amps: f32,
    resistance: f32,
    ocv_empty: f32,
    ocv_knee: f32,
    ocv_full: f32,
    last: Measurement,
}

impl SimBattery {
    /// Builds a half-charged pack whose voltage curve spans the profile's
    /// load-disconnect to absorption range.
    #[must_use]
    pub fn for_profile(profile: &ChargingProfile) -> Self {
        let cells = f32::from(profile.num_cells);
        let mut battery = Self {
            soc: DEFAULT_SOC,
            capacity_ah: DEFAULT_CAPACITY_AH,
            load_amps: DEFAULT_LOAD_AMPS,
            resistance: CELL_RESISTANCE_OHMS * cells,
            ocv_empty: (profile.cell_voltage_load_disconnect - 0.05) * cells,
            ocv_knee: profile.cell_voltage_trickle * cells,
            ocv_full: (profile.cell_voltage_max + 0.05) * cells,
            last: Measurement {
                volts: 0.0,
                amps: 0.0,
            },
        };
        battery.last.volts = battery.open_circuit_voltage();
        battery
    }

    #[must_use]
    pub fn with_soc(mut self, soc: f32) -> Self {
        self.soc = soc.clamp(0.0, 1.0);
        self.last.volts = self.open_circuit_voltage();
        self
    }

    #[must_use]
    pub fn with_load(mut self, amps: f32) -> Self {
        self.load_amps = amps.max(0.0);
        self
    }

    #[must_use]
    pub fn soc(&self) -> f32 {
        self.soc
    }

    /// Measurement from the most recent step.
    #[must_use]
    pub fn last(&self) -> Measurement {
        self.last
    }

    #[must_use]
    pub fn open_circuit_voltage(&self) -> f32 {
        if self.soc <= KNEE_SOC {
            self.ocv_empty + (self.ocv_knee - self.ocv_empty) * (self.soc / KNEE_SOC)
        } else {
            let above_knee = (self.soc - KNEE_SOC) / (1.0 - KNEE_SOC);
            self.ocv_knee + (self.ocv_full - self.ocv_knee) * above_knee
        }
    }

    /// Advances the pack by one tick period under the given charger outputs.
    pub fn step(
        &mut self,
        target_voltage: f32,
        target_current: f32,
        charging_enabled: bool,
        load_connected: bool,
    ) -> Measurement {
        let ocv = self.open_circuit_voltage();
        let load = if load_connected { self.load_amps } else { 0.0 };
        let unsupported = Measurement {
            volts: ocv - load * self.resistance,
            amps: -load,
        };

        self.last = if charging_enabled {
            let current_limited = target_current.max(0.0) - load;
            let voltage_limited = (target_voltage - ocv) / self.resistance;
            if voltage_limited > current_limited {
                Measurement {
                    volts: ocv + current_limited * self.resistance,
                    amps: current_limited,
                }
            } else if voltage_limited >= -load {
                // Charger regulating at the target voltage.
                Measurement {
                    volts: target_voltage,
                    amps: voltage_limited,
                }
            } else {
                unsupported
            }
        } else {
            unsupported
        };

        let hours = TICK_PERIOD.as_secs_f32() / 3600.0;
        self.soc = (self.soc + self.last.amps * hours / self.capacity_ah).clamp(0.0, 1.0);
        self.last
    }
}
