#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Battery sensing front-end and power-stage wiring.
//!
//! | Signal | Pin | Notes |
//! |---|---|---|
//! | Battery voltage | PA0 | 100 kΩ / 10 kΩ divider |
//! | Battery current | PA1 | 10 mΩ shunt, ×50 amplifier biased at 1.65 V |
//! | Load switch | PB2 | high = load connected |
//! | Charge enable | PB3 | high = power stage enabled |
//!
//! Conversion math lives here so it can be unit tested on the host; the ADC
//! and GPIO drivers are in [`board`].

#[cfg(target_os = "none")]
pub mod board;

/// 12-bit conversion ceiling.
pub const ADC_FULL_SCALE: u16 = 4095;
/// Supply voltage at which the factory VREFINT calibration was taken.
pub const VREFINT_CAL_VOLTS: f32 = 3.0;
/// Supply assumed when the VREFINT reading is unusable.
pub const NOMINAL_VDDA_VOLTS: f32 = 3.3;

/// One filtered battery measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatterySample {
    pub volts: f32,
    /// Positive into the battery.
    pub amps: f32,
}

/// Scaling of the analog front-end between the battery and the ADC pins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalogFrontEnd {
    pub divider_ratio: f32,
    pub shunt_ohms: f32,
    pub amplifier_gain: f32,
    pub current_offset_volts: f32,
}

impl AnalogFrontEnd {
    pub const BOARD: Self = Self {
        divider_ratio: 11.0,
        shunt_ohms: 0.010,
        amplifier_gain: 50.0,
        current_offset_volts: 1.65,
    };

    /// Analog supply implied by a VREFINT conversion.
    #[must_use]
    pub fn vdda_volts(vrefint_cal: u16, vrefint_raw: u16) -> f32 {
        if vrefint_raw == 0 || vrefint_cal == 0 {
            return NOMINAL_VDDA_VOLTS;
        }
        VREFINT_CAL_VOLTS * f32::from(vrefint_cal) / f32::from(vrefint_raw)
    }

    #[must_use]
    pub fn pin_volts(raw: u16, vdda: f32) -> f32 {
        f32::from(raw.min(ADC_FULL_SCALE)) * vdda / f32::from(ADC_FULL_SCALE)
    }

    #[must_use]
    pub fn battery_volts(&self, raw: u16, vdda: f32) -> f32 {
        Self::pin_volts(raw, vdda) * self.divider_ratio
    }

    #[must_use]
    pub fn battery_amps(&self, raw: u16, vdda: f32) -> f32 {
        (Self::pin_volts(raw, vdda) - self.current_offset_volts)
            / (self.amplifier_gain * self.shunt_ohms)
    }

    #[must_use]
    pub fn sample(&self, voltage_raw: u16, current_raw: u16, vdda: f32) -> BatterySample {
        BatterySample {
            volts: self.battery_volts(voltage_raw, vdda),
            amps: self.battery_amps(current_raw, vdda),
        }
    }
}
