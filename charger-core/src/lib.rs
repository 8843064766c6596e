#![no_std]

// Shared charging logic for the solar charge controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. The firmware and the emulator both drive the same
// `ChargeController` so the state machine can be exercised without hardware.

pub mod charger;
pub mod clock;
pub mod fault;
pub mod profile;
pub mod status;
pub mod telemetry;

pub use charger::{ChargeController, ChargePhase, ChargeState};
pub use clock::{TICK_PERIOD, Tick};
pub use profile::{ChargingProfile, ProfileError, ProfileKind};
