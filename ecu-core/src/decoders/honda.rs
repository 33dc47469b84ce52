//! Honda D17: twelve teeth 30 degrees apart plus a thirteenth sync tooth just
//! after tooth 12.
//!
//! The sync tooth is never recorded as a tooth time, so the crank angle keeps
//! advancing from tooth 12 until tooth 1 arrives.

use super::{DecoderState, EdgeReport, Pattern, STALL_MICROS_PER_DEGREE, SyncStatus, WheelGeometry};
use crate::Micros;
use crate::config::TriggerConfig;

pub(crate) struct HondaD17;

impl HondaD17 {
    const TEETH: u16 = 12;
    const TOOTH_ANGLE: u16 = 30;
}

impl Pattern for HondaD17 {
    fn geometry(_config: &TriggerConfig) -> WheelGeometry {
        WheelGeometry::even(Self::TOOTH_ANGLE, Self::TEETH, false)
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = state.primary_gap(now);
        state.tooth_current_count = state.tooth_current_count.saturating_add(1);
        let synced = state.sync.is_synced();

        if synced && state.tooth_current_count == Self::TEETH + 1 {
            state.tooth_current_count = 0;
            return EdgeReport::accepted();
        }
        if synced && state.tooth_current_count == 1 {
            state.mark_tooth_one(now);
            state.bump_start_revolutions();
            state.record_tooth(now);
            return EdgeReport::accepted();
        }
        if state.has_gap_history() && gap < state.last_tooth_gap() >> 1 {
            if synced {
                state.count_sync_loss();
            }
            state.tooth_current_count = 0;
            state.sync = SyncStatus::Full;
            return EdgeReport::accepted();
        }

        state.record_tooth(now);
        EdgeReport::accepted()
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        state.std_rpm(false)
    }

    fn stall_time(_state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE * u32::from(Self::TOOTH_ANGLE)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TriggerConfig;
    use crate::decoders::{TriggerDecoder, TriggerPattern};

    #[test]
    fn sync_tooth_parks_counter_at_zero() {
        let config = TriggerConfig::for_pattern(TriggerPattern::HondaD17, 13, 0);
        let mut decoder = TriggerDecoder::new(config).unwrap();
        for now in [1_000, 1_300, 1_600] {
            decoder.primary_edge(now);
        }
        decoder.primary_edge(1_650);
        assert!(decoder.has_sync());
        assert_eq!(decoder.tooth(), 0);
        assert_eq!(decoder.last_tooth_time(), 1_600);

        decoder.primary_edge(1_900);
        assert_eq!(decoder.tooth(), 1);
        assert_eq!(decoder.last_tooth_time(), 1_900);
    }
}
