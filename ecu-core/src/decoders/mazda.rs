//! Mazda Miata 1999-2005: four crank teeth at alternating 70/110 degree
//! spacing and a cam wheel whose double tooth precedes crank tooth 6.

use super::{DecoderState, EdgeReport, Pattern, STALL_MICROS_PER_DEGREE, SyncStatus, ToothLog, WheelGeometry};
use crate::Micros;
use crate::config::{FilterLevel, TriggerConfig};

pub(crate) struct Miata9905;

impl Miata9905 {
    const TOOTH_ANGLES: [i16; 8] = [710, 100, 170, 280, 350, 460, 530, 640];
    const CAM_SYNC_TOOTH: u16 = 6;
    const CAM_EDGES_FOR_SYNC: u16 = 2;
    const LONGEST_GAP: u16 = 110;

    /// Scales the filter by the spacing of the next tooth relative to the current one.
    fn predictive_filter(state: &mut DecoderState, gap: Micros) {
        let geometry = state.geometry;
        let tooth = state.tooth_current_count;
        let next = if tooth >= geometry.actual_teeth { 1 } else { tooth + 1 };
        match (geometry.table_spacing(tooth), geometry.table_spacing(next)) {
            (Some(current), Some(upcoming)) if current > 0 => {
                let expected = u64::from(gap) * u64::from(upcoming) / u64::from(current);
                state.set_filter(u32::try_from(expected).unwrap_or(u32::MAX));
            }
            _ => state.filter_time = 0,
        }
    }
}

impl Pattern for Miata9905 {
    fn geometry(_config: &TriggerConfig) -> WheelGeometry {
        WheelGeometry::table(Self::LONGEST_GAP, &Self::TOOTH_ANGLES)
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = state.primary_gap(now);
        if gap < state.filter_time && state.start_revolutions != 0 {
            return EdgeReport::filtered();
        }

        state.tooth_current_count = state.tooth_current_count.saturating_add(1);
        if state.tooth_current_count > state.geometry.actual_teeth {
            state.tooth_current_count = 1;
            state.mark_tooth_one(now);
            state.bump_start_revolutions();
        } else if state.secondary_count == Self::CAM_EDGES_FOR_SYNC {
            if !state.sync.is_synced() {
                state.tooth_current_count = Self::CAM_SYNC_TOOTH;
                state.sync = SyncStatus::Full;
            } else if state.tooth_current_count != Self::CAM_SYNC_TOOTH {
                state.count_sync_loss();
                if state.config.resync_on_secondary {
                    state.tooth_current_count = Self::CAM_SYNC_TOOTH;
                }
            }
        }
        state.secondary_count = 0;

        if state.sync.is_synced() && state.config.filter != FilterLevel::Off {
            Self::predictive_filter(state, gap);
        }
        state.record_tooth(now);
        EdgeReport::accepted()
    }

    fn secondary(state: &mut DecoderState, now: Micros) {
        // The double tooth edges sit close together, so no filtering here.
        state.record_secondary(now);
        state.secondary_count = state.secondary_count.saturating_add(1);
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        if !state.sync.is_synced() {
            return 0;
        }
        if state.rpm < state.config.cranking_rpm {
            match state.geometry.table_spacing(state.tooth_current_count) {
                Some(spacing) => state.cranking_rpm_for_angle(spacing),
                None => state.rpm,
            }
        } else {
            state.std_rpm(true)
        }
    }

    fn crank_angle(log: &ToothLog, now: Micros) -> i16 {
        log.table_angle(now)
    }

    fn stall_time(_state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE * u32::from(Self::LONGEST_GAP)
    }
}
