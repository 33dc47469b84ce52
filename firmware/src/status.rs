#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Lock-free status mirror for the firmware target.
//!
//! The housekeeping task publishes the engine's [`StatusSnapshot`] into
//! atomics after every update so the logger can read RPM, sync and crank
//! angle without entering the engine's critical section.

use ecu_core::Micros;
use ecu_core::decoders::SyncStatus;
use ecu_core::status::StatusSnapshot;
use portable_atomic::{AtomicBool, AtomicI16, AtomicU8, AtomicU16, AtomicU32, Ordering};

static RPM: AtomicU16 = AtomicU16::new(0);
static SYNC: AtomicU8 = AtomicU8::new(SYNC_NONE);
static SYNC_LOSSES: AtomicU16 = AtomicU16::new(0);
static CRANK_ANGLE: AtomicI16 = AtomicI16::new(0);
static CRANKING: AtomicBool = AtomicBool::new(false);
/// Timestamp (µs, +1) of the last publish.
static PUBLISHED_AT: AtomicU32 = AtomicU32::new(0);

const SYNC_NONE: u8 = 0;
const SYNC_HALF: u8 = 1;
const SYNC_FULL: u8 = 2;

/// Values copied out of the mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSummary {
    pub rpm: u16,
    pub sync: SyncStatus,
    pub sync_loss_count: u16,
    pub crank_angle: i16,
    pub cranking: bool,
    pub published_at: Option<Micros>,
}

const fn encode_sync(sync: SyncStatus) -> u8 {
    match sync {
        SyncStatus::None => SYNC_NONE,
        SyncStatus::Half => SYNC_HALF,
        SyncStatus::Full => SYNC_FULL,
    }
}

const fn decode_sync(raw: u8) -> SyncStatus {
    match raw {
        SYNC_HALF => SyncStatus::Half,
        SYNC_FULL => SyncStatus::Full,
        _ => SyncStatus::None,
    }
}

fn encode_micros(micros: Micros) -> u32 {
    micros.wrapping_add(1)
}

fn decode_micros(raw: u32) -> Option<Micros> {
    if raw == 0 {
        None
    } else {
        Some(raw.wrapping_sub(1))
    }
}

/// Stores the fields of `snapshot` taken at `now`.
pub fn publish(snapshot: &StatusSnapshot, now: Micros) {
    RPM.store(snapshot.rpm, Ordering::Relaxed);
    SYNC.store(encode_sync(snapshot.sync), Ordering::Relaxed);
    SYNC_LOSSES.store(snapshot.sync_loss_count, Ordering::Relaxed);
    CRANK_ANGLE.store(snapshot.crank_angle, Ordering::Relaxed);
    CRANKING.store(snapshot.cranking, Ordering::Relaxed);
    PUBLISHED_AT.store(encode_micros(now), Ordering::Relaxed);
}

/// Engine speed from the last publish.
pub fn rpm() -> u16 {
    RPM.load(Ordering::Relaxed)
}

pub fn sync_status() -> SyncStatus {
    decode_sync(SYNC.load(Ordering::Relaxed))
}

/// Reads every mirrored field.
pub fn summary() -> StatusSummary {
    StatusSummary {
        rpm: rpm(),
        sync: sync_status(),
        sync_loss_count: SYNC_LOSSES.load(Ordering::Relaxed),
        crank_angle: CRANK_ANGLE.load(Ordering::Relaxed),
        cranking: CRANKING.load(Ordering::Relaxed),
        published_at: decode_micros(PUBLISHED_AT.load(Ordering::Relaxed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecu_core::decoders::TriggerPattern;

    #[test]
    fn publish_round_trips_through_the_atomics() {
        let mut snapshot = StatusSnapshot::stopped(TriggerPattern::MissingTooth);
        snapshot.sync = SyncStatus::Half;
        snapshot.rpm = 812;
        snapshot.crank_angle = -40;
        snapshot.sync_loss_count = 3;
        snapshot.cranking = true;

        publish(&snapshot, 0);
        let summary = summary();
        assert_eq!(summary.rpm, 812);
        assert_eq!(summary.sync, SyncStatus::Half);
        assert_eq!(summary.crank_angle, -40);
        assert_eq!(summary.sync_loss_count, 3);
        assert!(summary.cranking);
        // Zero is a valid timestamp, not "never published".
        assert_eq!(summary.published_at, Some(0));
    }

    #[test]
    fn sync_codes_fall_back_to_none() {
        for sync in [SyncStatus::None, SyncStatus::Half, SyncStatus::Full] {
            assert_eq!(decode_sync(encode_sync(sync)), sync);
        }
        assert_eq!(decode_sync(0xff), SyncStatus::None);
        assert_eq!(decode_micros(0), None);
    }
}
