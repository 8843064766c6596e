use core::fmt::Write;

use charger_core::status::StatusFormatter;
use embassy_time::{Duration, with_timeout};
use heapless::String;

use crate::status::{PHASE_REPORTS, published};

const STATUS_LINE_CAPACITY: usize = 192;
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);

/// Logs every phase change, and a heartbeat of the published outputs when the
/// phase has been steady for a full heartbeat period.
#[embassy_executor::task]
pub async fn run() -> ! {
    let mut line: String<STATUS_LINE_CAPACITY> = String::new();
    loop {
        line.clear();
        let written = match with_timeout(HEARTBEAT_PERIOD, PHASE_REPORTS.wait()).await {
            Ok(status) => write!(line, "status: {}", StatusFormatter::new(&status)),
            Err(_) => write!(line, "heartbeat: {}", published()),
        };
        if written.is_err() {
            defmt::warn!("report: line truncated");
        }
        defmt::info!("{}", line.as_str());
    }
}
