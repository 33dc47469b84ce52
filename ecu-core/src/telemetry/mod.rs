//! Decoder lifecycle telemetry shared by firmware and host targets.
//!
//! Events are kept in a fixed-size ring so the interrupt-side code never
//! allocates; consumers (the firmware logger task, the emulator REPL) drain
//! them in chronological order.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::Micros;
use crate::decoders::SyncStatus;

/// Default number of telemetry records retained.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Monotonically increasing identifier assigned to each record.
pub type EventId = u32;

/// Decoder and engine lifecycle events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecoderEvent {
    /// Full sync acquired.
    SyncAcquired,
    /// Crank position known but cam phase still missing.
    HalfSync,
    /// Sync dropped after a tooth pattern violation.
    SyncLost,
    /// No primary tooth within the decoder's stall time.
    Stalled,
}

impl DecoderEvent {
    /// Event describing a move from `previous` to `current`, if it is worth recording.
    #[must_use]
    pub const fn for_transition(previous: SyncStatus, current: SyncStatus) -> Option<Self> {
        match (previous, current) {
            (SyncStatus::Full, SyncStatus::Full)
            | (SyncStatus::Half, SyncStatus::Half)
            | (SyncStatus::None, SyncStatus::None) => None,
            (_, SyncStatus::Full) => Some(DecoderEvent::SyncAcquired),
            (SyncStatus::None, SyncStatus::Half) => Some(DecoderEvent::HalfSync),
            // Full to half only happens across a reset; treat it as a loss.
            (SyncStatus::Full, SyncStatus::Half) | (_, SyncStatus::None) => {
                Some(DecoderEvent::SyncLost)
            }
        }
    }
}

impl fmt::Display for DecoderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderEvent::SyncAcquired => f.write_str("sync-acquired"),
            DecoderEvent::HalfSync => f.write_str("half-sync"),
            DecoderEvent::SyncLost => f.write_str("sync-lost"),
            DecoderEvent::Stalled => f.write_str("stalled"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp_us: Micros,
    pub event: DecoderEvent,
    /// Engine speed when the event was recorded.
    pub rpm: u16,
    /// Decoder sync-loss counter when the event was recorded.
    pub sync_loss_count: u16,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} t={}us {} rpm={} losses={}",
            self.id, self.timestamp_us, self.event, self.rpm, self.sync_loss_count
        )
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records decoder events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    #[must_use]
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Id the next record will receive; lets consumers detect what they missed.
    #[must_use]
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records an arbitrary event.
    pub fn record(
        &mut self,
        event: DecoderEvent,
        timestamp_us: Micros,
        rpm: u16,
        sync_loss_count: u16,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp_us,
            event,
            rpm,
            sync_loss_count,
        });

        id
    }

    /// Records a sync status change; unchanged status records nothing.
    pub fn record_sync_transition(
        &mut self,
        previous: SyncStatus,
        current: SyncStatus,
        timestamp_us: Micros,
        rpm: u16,
        sync_loss_count: u16,
    ) -> Option<EventId> {
        DecoderEvent::for_transition(previous, current)
            .map(|event| self.record(event, timestamp_us, rpm, sync_loss_count))
    }

    /// Records with an id of at least `since`, oldest first.
    pub fn since(&self, since: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        self.oldest_first()
            .filter(move |record| record.id.wrapping_sub(since) < EventId::MAX / 2)
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_map_to_events() {
        assert_eq!(
            DecoderEvent::for_transition(SyncStatus::None, SyncStatus::Full),
            Some(DecoderEvent::SyncAcquired)
        );
        assert_eq!(
            DecoderEvent::for_transition(SyncStatus::Half, SyncStatus::Full),
            Some(DecoderEvent::SyncAcquired)
        );
        assert_eq!(
            DecoderEvent::for_transition(SyncStatus::None, SyncStatus::Half),
            Some(DecoderEvent::HalfSync)
        );
        assert_eq!(
            DecoderEvent::for_transition(SyncStatus::Full, SyncStatus::None),
            Some(DecoderEvent::SyncLost)
        );
        assert_eq!(DecoderEvent::for_transition(SyncStatus::Full, SyncStatus::Full), None);
    }

    #[test]
    fn ring_keeps_newest_records_with_increasing_ids() {
        let mut recorder = TelemetryRecorder::<2>::new();
        assert!(recorder.is_empty());

        recorder.record(DecoderEvent::SyncAcquired, 100, 250, 0);
        recorder.record(DecoderEvent::SyncLost, 200, 3_000, 1);
        let id = recorder.record(DecoderEvent::Stalled, 300, 0, 1);
        assert_eq!(id, 2);
        assert_eq!(recorder.len(), 2);

        let events: heapless::Vec<DecoderEvent, 2> =
            recorder.oldest_first().map(|record| record.event).collect();
        assert_eq!(events.as_slice(), &[DecoderEvent::SyncLost, DecoderEvent::Stalled]);
        assert_eq!(recorder.latest().map(|record| record.timestamp_us), Some(300));
    }

    #[test]
    fn unchanged_sync_is_not_recorded() {
        let mut recorder = TelemetryRecorder::<4>::new();
        assert_eq!(
            recorder.record_sync_transition(SyncStatus::Half, SyncStatus::Half, 10, 0, 0),
            None
        );
        assert_eq!(
            recorder.record_sync_transition(SyncStatus::Half, SyncStatus::Full, 20, 300, 0),
            Some(0)
        );
        assert_eq!(recorder.since(0).count(), 1);
        assert_eq!(recorder.since(1).count(), 0);
    }
}
