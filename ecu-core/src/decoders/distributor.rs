//! Cam-speed wheels with one tooth per cylinder.
//!
//! [`BasicDistributor`] has no reference at all: the first tooth seen becomes
//! tooth 1 and the counter simply wraps. [`Daihatsu`] adds one short extra
//! tooth 30 degrees after tooth 1, which is counted as tooth 2.

use super::{DecoderState, EdgeReport, Pattern, STALL_MICROS_PER_DEGREE, SyncStatus, ToothLog, WheelGeometry};
use crate::Micros;
use crate::config::TriggerConfig;
use crate::timing::DEGREES_PER_CYCLE;

/// Below this speed the distributor estimates RPM from single tooth gaps.
const DISTRIBUTOR_TOOTH_RPM_LIMIT: u16 = 1_500;

pub(crate) struct BasicDistributor;

impl Pattern for BasicDistributor {
    fn geometry(config: &TriggerConfig) -> WheelGeometry {
        let teeth = u16::from(config.cylinders.max(1));
        WheelGeometry::even(DEGREES_PER_CYCLE / teeth, teeth, false)
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = state.primary_gap(now);
        if gap < state.filter_time {
            return EdgeReport::filtered();
        }

        if state.sync.is_synced() {
            state.set_filter(gap);
        } else {
            state.filter_time = 0;
        }

        if state.tooth_current_count >= state.geometry.actual_teeth || !state.sync.is_synced() {
            state.tooth_current_count = 1;
            state.mark_tooth_one(now);
            state.sync = SyncStatus::Full;
            state.bump_start_revolutions();
        } else {
            state.tooth_current_count += 1;
        }
        state.record_tooth(now);
        EdgeReport::accepted()
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        if state.rpm < state.config.cranking_rpm || state.rpm < DISTRIBUTOR_TOOTH_RPM_LIMIT {
            state.cranking_rpm(state.geometry.actual_teeth, true)
        } else {
            state.std_rpm(true)
        }
    }

    fn stall_time(state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE * u32::from(state.geometry.tooth_angle)
    }
}

pub(crate) struct Daihatsu;

impl Daihatsu {
    const THREE_CYLINDER: [i16; 4] = [0, 30, 240, 480];
    const FOUR_CYLINDER: [i16; 5] = [0, 30, 180, 360, 540];
}

impl Pattern for Daihatsu {
    fn geometry(config: &TriggerConfig) -> WheelGeometry {
        if config.cylinders == 3 {
            WheelGeometry::table(240, &Self::THREE_CYLINDER)
        } else {
            WheelGeometry::table(180, &Self::FOUR_CYLINDER)
        }
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = state.primary_gap(now);
        if gap < state.filter_time {
            return EdgeReport::filtered();
        }

        if state.sync.is_synced() {
            if state.tooth_current_count >= state.geometry.actual_teeth {
                state.tooth_current_count = 1;
                state.mark_tooth_one(now);
                state.bump_start_revolutions();
            } else {
                state.tooth_current_count += 1;
            }
            // The extra tooth follows tooth 1 closely.
            if state.tooth_current_count == 1 {
                state.filter_time = 0;
            } else {
                state.set_filter(gap);
            }
        } else if state.has_gap_history() {
            let last = state.last_tooth_gap();
            let target = if state.config.cylinders == 3 {
                last >> 2
            } else {
                last.saturating_mul(3) >> 4
            };
            if gap < target {
                state.tooth_current_count = 2;
                state.sync = SyncStatus::Full;
            }
        }

        state.record_tooth(now);
        EdgeReport::accepted()
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        if state.rpm < state.config.cranking_rpm {
            // Only gaps between regular teeth span a whole cylinder.
            let tooth = state.tooth_current_count;
            if tooth == 1 || tooth >= 4 {
                state.cranking_rpm(u16::from(state.config.cylinders), true)
            } else {
                state.rpm
            }
        } else {
            state.std_rpm(true)
        }
    }

    fn crank_angle(log: &ToothLog, now: Micros) -> i16 {
        log.table_angle(now)
    }

    fn stall_time(state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE * u32::from(state.geometry.tooth_angle)
    }
}
