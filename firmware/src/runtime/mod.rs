use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Level, Output, Speed};
use static_cell::StaticCell;

use charger_core::profile::{ChargingProfile, LEAD_ACID_6_CELL};

use crate::control::ControlLoop;
use crate::hw::board::{BatterySense, PowerSwitches};

mod charger_task;
mod report_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Profile the charger runs with for the lifetime of the firmware.
static PROFILE: StaticCell<ChargingProfile> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        ADC1,
        PA0,
        PA1,
        PB2,
        PB3,
        ..
    } = hal::init(config);

    // Load switch closed and power stage off until the first tick decides.
    let switches = PowerSwitches::new(
        Output::new(PB2, Level::High, Speed::Low),
        Output::new(PB3, Level::Low, Speed::Low),
    );

    let profile: &'static ChargingProfile = PROFILE.init(LEAD_ACID_6_CELL);
    if let Err(err) = profile.validate() {
        defmt::error!(
            "charger: rejecting profile ({}); power stage stays off",
            defmt::Display2Format(&err)
        );
        core::future::pending::<()>().await;
    }
    defmt::info!(
        "charger: profile loaded cells={} max={}V",
        profile.num_cells,
        profile.pack_voltage_max()
    );

    let sense = BatterySense::new(Adc::new(ADC1), PA0.degrade_adc(), PA1.degrade_adc());

    spawner
        .spawn(charger_task::run(ControlLoop::new(profile), sense, switches))
        .expect("failed to spawn charger task");

    spawner
        .spawn(report_task::run())
        .expect("failed to spawn report task");

    core::future::pending::<()>().await;
}
