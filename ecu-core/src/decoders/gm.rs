//! GM 7X: six teeth 60 degrees apart plus a sync notch 10 degrees after tooth 2.
//!
//! The notch shows up as a gap less than half the previous one and is counted
//! as tooth 3. Angles come from a table because the notch breaks the spacing.

use super::{DecoderState, EdgeReport, Pattern, STALL_MICROS_PER_DEGREE, SyncStatus, ToothLog, WheelGeometry};
use crate::Micros;
use crate::config::TriggerConfig;

pub(crate) struct Gm7x;

impl Gm7x {
    const TOOTH_ANGLES: [i16; 7] = [42, 102, 112, 162, 222, 282, 342];
    const SYNC_TOOTH: u16 = 3;
}

impl Pattern for Gm7x {
    fn geometry(_config: &TriggerConfig) -> WheelGeometry {
        WheelGeometry::table(60, &Self::TOOTH_ANGLES)
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = state.primary_gap(now);
        state.tooth_current_count = state.tooth_current_count.saturating_add(1);

        if state.has_gap_history() {
            if state.tooth_current_count > state.geometry.actual_teeth {
                state.tooth_current_count = 1;
                state.mark_tooth_one(now);
            } else if gap < state.last_tooth_gap() >> 1 {
                if state.sync.is_synced() && state.tooth_current_count != Self::SYNC_TOOTH {
                    state.count_sync_loss();
                }
                state.tooth_current_count = Self::SYNC_TOOTH;
                state.sync = SyncStatus::Full;
                state.bump_start_revolutions();
            }
        }

        state.record_tooth(now);
        EdgeReport::accepted()
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        state.std_rpm(false)
    }

    fn crank_angle(log: &ToothLog, now: Micros) -> i16 {
        log.table_angle(now)
    }

    fn stall_time(_state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE * 60
    }
}
