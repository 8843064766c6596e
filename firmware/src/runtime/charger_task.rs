use charger_core::clock::TICK_PERIOD;
use embassy_time::{Duration, Ticker};

use crate::control::ControlLoop;
use crate::hw::board::{BatterySense, PowerSwitches};
use crate::status::PHASE_REPORTS;

#[embassy_executor::task]
pub async fn run(
    mut control: ControlLoop<'static>,
    mut sense: BatterySense<'static>,
    mut switches: PowerSwitches<'static>,
) -> ! {
    let mut ticker = Ticker::every(Duration::from_secs(TICK_PERIOD.as_secs()));
    defmt::info!("charger: control loop running every {}s", TICK_PERIOD.as_secs());

    loop {
        ticker.next().await;

        let sample = sense.sample();
        let report = control.step(sample);
        switches.apply(report.outputs);

        if report.phase_changed {
            PHASE_REPORTS.signal(report.status);
        }
    }
}
