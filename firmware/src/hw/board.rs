//! STM32G0 drivers for the battery sense channels and power switches.

use core::ptr;

use embassy_stm32::adc::{Adc, AdcChannel, AnyAdcChannel, SampleTime};
use embassy_stm32::gpio::{Level, Output};
use embassy_stm32::peripherals::ADC1;

use super::{AnalogFrontEnd, BatterySample};
use crate::control::SwitchOutputs;

/// Factory-programmed VREFINT calibration constant sampled at 3.0 V.
const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_75AA as *const u16;

/// Reads the factory-trimmed VREFINT calibration constant.
pub fn read_vrefint_calibration() -> u16 {
    unsafe { ptr::read_volatile(VREFINT_CAL_ADDR) }
}

/// Blocking ADC sampler for pack voltage and current.
pub struct BatterySense<'d> {
    adc: Adc<'d, ADC1>,
    voltage: AnyAdcChannel<ADC1>,
    current: AnyAdcChannel<ADC1>,
    vrefint: AnyAdcChannel<ADC1>,
    vrefint_cal: u16,
    front_end: AnalogFrontEnd,
}

impl<'d> BatterySense<'d> {
    pub fn new(
        mut adc: Adc<'d, ADC1>,
        voltage: AnyAdcChannel<ADC1>,
        current: AnyAdcChannel<ADC1>,
    ) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        let vrefint = adc.enable_vrefint().degrade_adc();
        Self {
            adc,
            voltage,
            current,
            vrefint,
            vrefint_cal: read_vrefint_calibration(),
            front_end: AnalogFrontEnd::BOARD,
        }
    }

    /// Converts VREFINT, voltage and current in sequence.
    pub fn sample(&mut self) -> BatterySample {
        let vrefint_raw = self.adc.blocking_read(&mut self.vrefint);
        let vdda = AnalogFrontEnd::vdda_volts(self.vrefint_cal, vrefint_raw);
        let voltage_raw = self.adc.blocking_read(&mut self.voltage);
        let current_raw = self.adc.blocking_read(&mut self.current);
        self.front_end.sample(voltage_raw, current_raw, vdda)
    }
}

/// Load switch and charger enable outputs.
pub struct PowerSwitches<'d> {
    load: Output<'d>,
    charge: Output<'d>,
}

impl<'d> PowerSwitches<'d> {
    pub fn new(load: Output<'d>, charge: Output<'d>) -> Self {
        Self { load, charge }
    }

    pub fn apply(&mut self, outputs: SwitchOutputs) {
        self.load.set_level(Level::from(outputs.load_connected));
        self.charge.set_level(Level::from(outputs.charge_enabled));
    }
}
