//! Charging profile definitions shared by firmware and host targets.
//!
//! A [`ChargingProfile`] is populated once by configuration and only ever read
//! afterwards. Voltage thresholds are stored per cell; the `pack_*` helpers
//! scale them by [`ChargingProfile::num_cells`] to the whole-battery values the
//! state machine compares against. Timer fields are expressed in controller
//! ticks (one tick per [`TICK_PERIOD`](crate::clock::TICK_PERIOD)).

use core::fmt;

use crate::clock::weeks_to_ticks;

/// Immutable charging parameters for one battery.
///
/// The state machine relies on the ordering
/// `recharge < trickle < max <= equalization` and
/// `load_disconnect < load_reconnect <= recharge` (all per cell). Use
/// [`ChargingProfile::validate`] before constructing a controller; behaviour
/// under a violated ordering is unspecified.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChargingProfile {
    /// Number of series cells, at least one.
    pub num_cells: u8,

    /// Ticks the voltage must stay below the recharge threshold before leaving idle.
    pub time_limit_recharge: u32,
    /// Recharge threshold per cell (V).
    pub cell_voltage_recharge: f32,

    /// Bulk charge current ceiling (A).
    pub charge_current_max: f32,

    /// Absorption voltage per cell (V).
    pub cell_voltage_max: f32,
    /// Absorption cutoff dwell and hard time limit (ticks).
    pub time_limit_cv: u32,
    /// Absorption ends once the current tapers to this value (A).
    pub current_cutoff_cv: f32,

    pub trickle_enabled: bool,
    /// Float voltage per cell (V).
    pub cell_voltage_trickle: f32,
    /// Ticks below the recharge threshold before trickle falls back to bulk.
    pub time_trickle_recharge: u32,

    pub equalization_enabled: bool,
    /// Equalization voltage per cell (V).
    pub cell_voltage_equalization: f32,
    /// Equalization duration (ticks).
    pub time_limit_equalization: u32,
    /// Current ceiling during equalization (A).
    pub current_limit_equalization: f32,
    /// Weeks since the last equalization before another one is due; 0 disables.
    pub equalization_trigger_time: u32,
    /// Deep-discharge cycles before an equalization is due; 0 disables.
    pub equalization_trigger_deep_cycles: u32,

    /// Load is disconnected at or below this cell voltage (V).
    pub cell_voltage_load_disconnect: f32,
    /// Load is reconnected at or above this cell voltage (V).
    pub cell_voltage_load_reconnect: f32,

    /// Temperature compensation (V/K per cell). Reserved; not applied yet.
    pub temperature_compensation: f32,
}

impl ChargingProfile {
    fn pack(&self, cell_voltage: f32) -> f32 {
        cell_voltage * f32::from(self.num_cells)
    }

    #[must_use]
    pub fn pack_voltage_recharge(&self) -> f32 {
        self.pack(self.cell_voltage_recharge)
    }

    #[must_use]
    pub fn pack_voltage_max(&self) -> f32 {
        self.pack(self.cell_voltage_max)
    }

    #[must_use]
    pub fn pack_voltage_trickle(&self) -> f32 {
        self.pack(self.cell_voltage_trickle)
    }

    #[must_use]
    pub fn pack_voltage_equalization(&self) -> f32 {
        self.pack(self.cell_voltage_equalization)
    }

    #[must_use]
    pub fn pack_voltage_load_disconnect(&self) -> f32 {
        self.pack(self.cell_voltage_load_disconnect)
    }

    #[must_use]
    pub fn pack_voltage_load_reconnect(&self) -> f32 {
        self.pack(self.cell_voltage_load_reconnect)
    }

    /// Calendar equalization interval in ticks, `None` when that trigger is disabled.
    #[must_use]
    pub const fn equalization_interval_ticks(&self) -> Option<u64> {
        if self.equalization_trigger_time == 0 {
            None
        } else {
            Some(weeks_to_ticks(self.equalization_trigger_time))
        }
    }

    /// Checks the threshold ordering the state machine depends on.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule as a [`ProfileError`].
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.num_cells == 0 {
            return Err(ProfileError::NoCells);
        }
        if self.cell_voltage_recharge >= self.cell_voltage_trickle {
            return Err(ProfileError::RechargeNotBelowTrickle);
        }
        if self.cell_voltage_trickle >= self.cell_voltage_max {
            return Err(ProfileError::TrickleNotBelowMax);
        }
        if self.cell_voltage_max > self.cell_voltage_equalization {
            return Err(ProfileError::MaxAboveEqualization);
        }
        if self.cell_voltage_load_disconnect >= self.cell_voltage_load_reconnect {
            return Err(ProfileError::DisconnectNotBelowReconnect);
        }
        if self.cell_voltage_load_reconnect > self.cell_voltage_recharge {
            return Err(ProfileError::ReconnectAboveRecharge);
        }
        Ok(())
    }
}

/// Ordering rule violated by a [`ChargingProfile`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProfileError {
    NoCells,
    RechargeNotBelowTrickle,
    TrickleNotBelowMax,
    MaxAboveEqualization,
    DisconnectNotBelowReconnect,
    ReconnectAboveRecharge,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ProfileError::NoCells => "num_cells must be at least 1",
            ProfileError::RechargeNotBelowTrickle => {
                "cell_voltage_recharge must be below cell_voltage_trickle"
            }
            ProfileError::TrickleNotBelowMax => "cell_voltage_trickle must be below cell_voltage_max",
            ProfileError::MaxAboveEqualization => {
                "cell_voltage_max must not exceed cell_voltage_equalization"
            }
            ProfileError::DisconnectNotBelowReconnect => {
                "cell_voltage_load_disconnect must be below cell_voltage_load_reconnect"
            }
            ProfileError::ReconnectAboveRecharge => {
                "cell_voltage_load_reconnect must not exceed cell_voltage_recharge"
            }
        };
        f.write_str(message)
    }
}

/// 12 V flooded lead-acid battery with float and periodic equalization.
pub const LEAD_ACID_6_CELL: ChargingProfile = ChargingProfile {
    num_cells: 6,
    time_limit_recharge: 60,
    cell_voltage_recharge: 2.2,
    charge_current_max: 20.0,
    cell_voltage_max: 2.4,
    time_limit_cv: 120 * 60,
    current_cutoff_cv: 2.0,
    trickle_enabled: true,
    cell_voltage_trickle: 2.3,
    time_trickle_recharge: 30 * 60,
    equalization_enabled: true,
    cell_voltage_equalization: 2.5,
    time_limit_equalization: 60 * 60,
    current_limit_equalization: 1.0,
    equalization_trigger_time: 8,
    equalization_trigger_deep_cycles: 10,
    cell_voltage_load_disconnect: 1.95,
    cell_voltage_load_reconnect: 2.1,
    temperature_compensation: -0.003,
};

/// 12.8 V LiFePO4 pack: bulk and absorption only.
pub const LIFEPO4_4_CELL: ChargingProfile = ChargingProfile {
    num_cells: 4,
    time_limit_recharge: 60,
    cell_voltage_recharge: 3.3,
    charge_current_max: 20.0,
    cell_voltage_max: 3.55,
    time_limit_cv: 60 * 60,
    current_cutoff_cv: 1.0,
    trickle_enabled: false,
    cell_voltage_trickle: 3.4,
    time_trickle_recharge: 30 * 60,
    equalization_enabled: false,
    cell_voltage_equalization: 3.55,
    time_limit_equalization: 0,
    current_limit_equalization: 0.0,
    equalization_trigger_time: 0,
    equalization_trigger_deep_cycles: 0,
    cell_voltage_load_disconnect: 3.0,
    cell_voltage_load_reconnect: 3.15,
    temperature_compensation: 0.0,
};

/// Built-in profile presets selectable by tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProfileKind {
    LeadAcid,
    LiFePo4,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 2] = [ProfileKind::LeadAcid, ProfileKind::LiFePo4];

    /// Returns the preset parameters.
    #[must_use]
    pub const fn profile(self) -> &'static ChargingProfile {
        match self {
            ProfileKind::LeadAcid => &LEAD_ACID_6_CELL,
            ProfileKind::LiFePo4 => &LIFEPO4_4_CELL,
        }
    }

    /// Short identifier used on command lines and in logs.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            ProfileKind::LeadAcid => "lead-acid",
            ProfileKind::LiFePo4 => "lifepo4",
        }
    }

    /// Looks up a preset by tag, ignoring ASCII case.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
