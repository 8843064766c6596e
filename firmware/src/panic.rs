use core::panic::PanicInfo;

use defmt::error;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    error!("charger: panic {}", defmt::Display2Format(info));
    cortex_m::asm::udf();
}
