//! Telemetry events emitted by the charge controller.
//!
//! The controller records phase changes, load-switch trips, fault edges and
//! tick-cadence violations into a fixed-capacity ring so supervisors can pull
//! a recent history without the core ever logging or allocating. Events carry
//! compact numeric codes for transports that cannot ship strings.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::charger::ChargePhase;
use crate::clock::Tick;
use crate::fault::FaultKind;

/// Identifier assigned to each telemetry record, wrapping on overflow.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    PhaseChanged { from: ChargePhase, to: ChargePhase },
    LoadDisconnected,
    LoadReconnected,
    FaultRaised(FaultKind),
    FaultCleared,
    /// `update` was called with a tick other than the one expected.
    CadenceViolation { expected: Tick, observed: Tick },
}

impl TelemetryEventKind {
    const PHASE_CHANGED_BASE: u16 = 0x0100;
    const LOAD_DISCONNECTED_CODE: u16 = 0x0200;
    const LOAD_RECONNECTED_CODE: u16 = 0x0201;
    const FAULT_RAISED_BASE: u16 = 0x0300;
    const FAULT_CLEARED_CODE: u16 = 0x03FF;
    const CADENCE_VIOLATION_CODE: u16 = 0x0400;
    const EXTERNAL_FAULT_BASE: u16 = 0x0500;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::PhaseChanged { from, to } => {
                Self::PHASE_CHANGED_BASE | (from.as_index() << 4) | to.as_index()
            }
            TelemetryEventKind::LoadDisconnected => Self::LOAD_DISCONNECTED_CODE,
            TelemetryEventKind::LoadReconnected => Self::LOAD_RECONNECTED_CODE,
            TelemetryEventKind::FaultRaised(FaultKind::OverTemperature) => {
                Self::FAULT_RAISED_BASE | 0x01
            }
            TelemetryEventKind::FaultRaised(FaultKind::OverCurrent) => Self::FAULT_RAISED_BASE | 0x02,
            TelemetryEventKind::FaultRaised(FaultKind::External(code)) => {
                Self::EXTERNAL_FAULT_BASE | u16::from(code)
            }
            TelemetryEventKind::FaultCleared => Self::FAULT_CLEARED_CODE,
            TelemetryEventKind::CadenceViolation { .. } => Self::CADENCE_VIOLATION_CODE,
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::PhaseChanged { from, to } => {
                write!(f, "phase-changed {from}->{to}")
            }
            TelemetryEventKind::LoadDisconnected => f.write_str("load-disconnected"),
            TelemetryEventKind::LoadReconnected => f.write_str("load-reconnected"),
            TelemetryEventKind::FaultRaised(kind) => write!(f, "fault-raised {kind}"),
            TelemetryEventKind::FaultCleared => f.write_str("fault-cleared"),
            TelemetryEventKind::CadenceViolation { expected, observed } => {
                write!(f, "cadence-violation expected={expected} observed={observed}")
            }
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub tick: Tick,
    pub event: TelemetryEventKind,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.id, self.tick, self.event)
    }
}

/// Fixed-capacity history of controller events, overwriting the oldest entry.
pub struct TelemetryLog<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryLog<CAPACITY> {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Appends an event stamped with `tick` and returns its identifier.
    pub fn record(&mut self, event: TelemetryEventKind, tick: Tick) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, tick, event });
        id
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns records newer than `id`, oldest first.
    ///
    /// Ids are compared modulo 2^32, so the window survives the id counter
    /// wrapping as long as the caller is less than half the id space behind.
    pub fn records_after(&self, id: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        self.oldest_first()
            .filter(move |record| record.id.wrapping_sub(id).wrapping_sub(1) < EventId::MAX / 2)
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Identifier that the next recorded event will receive.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }
}

impl<const CAPACITY: usize> Default for TelemetryLog<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_overwrites_oldest_and_keeps_order() {
        let mut log = TelemetryLog::<3>::new();
        for tick in 0..5 {
            log.record(TelemetryEventKind::LoadReconnected, Tick::new(tick));
        }

        assert_eq!(log.len(), 3);
        let ids: heapless::Vec<EventId, 3> = log.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[2, 3, 4]);
        assert_eq!(log.latest().map(|record| record.tick), Some(Tick::new(4)));
        assert_eq!(log.next_event_id(), 5);
    }

    #[test]
    fn records_after_skips_already_seen_events() {
        let mut log = TelemetryLog::<8>::new();
        let first = log.record(TelemetryEventKind::LoadDisconnected, Tick::new(1));
        log.record(TelemetryEventKind::LoadReconnected, Tick::new(2));

        let mut newer = log.records_after(first);
        assert_eq!(
            newer.next().map(|record| record.event),
            Some(TelemetryEventKind::LoadReconnected)
        );
        assert!(newer.next().is_none());
    }

    #[test]
    fn records_after_follows_ids_across_wraparound() {
        let mut log = TelemetryLog::<8> {
            ring: HistoryBuf::new(),
            next_event_id: EventId::MAX - 1,
        };
        let seen = log.record(TelemetryEventKind::LoadDisconnected, Tick::new(1));
        log.record(TelemetryEventKind::LoadReconnected, Tick::new(2));
        log.record(TelemetryEventKind::FaultCleared, Tick::new(3));
        assert_eq!(log.next_event_id(), 1);

        let ids: heapless::Vec<EventId, 8> =
            log.records_after(seen).map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[EventId::MAX, 0]);

        let ids: heapless::Vec<EventId, 8> =
            log.records_after(EventId::MAX).map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[0]);
        assert_eq!(log.records_after(0).count(), 0);
    }

    #[test]
    fn raw_codes_are_distinct_per_event() {
        let mut events: heapless::Vec<TelemetryEventKind, 320> = heapless::Vec::new();
        for from in ChargePhase::ALL {
            for to in ChargePhase::ALL {
                events
                    .push(TelemetryEventKind::PhaseChanged { from, to })
                    .unwrap();
            }
        }
        for code in 0..=u8::MAX {
            events
                .push(TelemetryEventKind::FaultRaised(FaultKind::External(code)))
                .unwrap();
        }
        for event in [
            TelemetryEventKind::LoadDisconnected,
            TelemetryEventKind::LoadReconnected,
            TelemetryEventKind::FaultRaised(FaultKind::OverTemperature),
            TelemetryEventKind::FaultRaised(FaultKind::OverCurrent),
            TelemetryEventKind::FaultCleared,
            TelemetryEventKind::CadenceViolation {
                expected: Tick::new(2),
                observed: Tick::new(5),
            },
        ] {
            events.push(event).unwrap();
        }

        for (index, event) in events.iter().enumerate() {
            for other in &events[index + 1..] {
                assert_ne!(event.to_raw(), other.to_raw(), "{event} vs {other}");
            }
        }
        assert_eq!(
            TelemetryEventKind::FaultRaised(FaultKind::External(3)).to_raw(),
            0x0503
        );
    }
}
