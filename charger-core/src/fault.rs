//! Fault input consulted by the charger before enabling the power stage.
//!
//! Fault detection itself (thermistors, over-current comparators, supervisor
//! requests) lives outside this crate. Collaborators implement
//! [`FaultMonitor`] and the controller polls it once per tick.

use core::cell::Cell;
use core::fmt;

/// Reason charging is currently inhibited.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultKind {
    OverTemperature,
    OverCurrent,
    /// Board-specific fault identified by a raw code.
    External(u8),
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::OverTemperature => f.write_str("over-temperature"),
            FaultKind::OverCurrent => f.write_str("over-current"),
            FaultKind::External(code) => write!(f, "external({code})"),
        }
    }
}

/// Source of hard faults that must disable charging.
pub trait FaultMonitor {
    /// Returns the active fault, if any.
    fn active_fault(&self) -> Option<FaultKind>;
}

/// Fault monitor that never reports a fault.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoFaultMonitor;

impl NoFaultMonitor {
    /// Creates a new no-op fault monitor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FaultMonitor for NoFaultMonitor {
    fn active_fault(&self) -> Option<FaultKind> {
        None
    }
}

/// Fault latch settable from the owning task between ticks.
#[derive(Debug, Default)]
pub struct FaultLatch {
    fault: Cell<Option<FaultKind>>,
}

impl FaultLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fault: Cell::new(None),
        }
    }

    /// Raises `fault`, replacing any fault already latched.
    pub fn raise(&self, fault: FaultKind) {
        self.fault.set(Some(fault));
    }

    pub fn clear(&self) {
        self.fault.set(None);
    }
}

impl FaultMonitor for FaultLatch {
    fn active_fault(&self) -> Option<FaultKind> {
        self.fault.get()
    }
}

impl<T: FaultMonitor + ?Sized> FaultMonitor for &T {
    fn active_fault(&self) -> Option<FaultKind> {
        (**self).active_fault()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_reports_until_cleared() {
        let latch = FaultLatch::new();
        assert_eq!(latch.active_fault(), None);

        latch.raise(FaultKind::OverTemperature);
        assert_eq!((&latch).active_fault(), Some(FaultKind::OverTemperature));

        latch.clear();
        assert_eq!(latch.active_fault(), None);
        assert_eq!(NoFaultMonitor::new().active_fault(), None);
    }
}
