//! Monotonic tick counter used by every charger timer.
//!
//! The controller never reads wall-clock time. Callers own the tick source and
//! hand the current [`Tick`] to
//! [`ChargeController::update`](crate::charger::ChargeController::update) once
//! per [`TICK_PERIOD`], which keeps the state machine deterministic and
//! testable without real delays.

use core::{fmt, ops::Add, time::Duration};

/// Nominal interval between two consecutive controller ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Number of ticks in one calendar week at [`TICK_PERIOD`].
pub const TICKS_PER_WEEK: u64 = 7 * 24 * 60 * 60;

/// Converts a week count into ticks.
#[must_use]
pub const fn weeks_to_ticks(weeks: u32) -> u64 {
    (weeks as u64) * TICKS_PER_WEEK
}

/// Monotonic tick stamp.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Tick(u64);

impl Tick {
    /// The first tick of a freshly started clock.
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw tick count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the tick that follows `self`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Number of ticks elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub const fn ticks_since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<u64> for Tick {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl From<u64> for Tick {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
