//! 36-2-1: 36 positions at 10 degrees with positions 35 and 36 missing (the
//! double gap before tooth 1) and position 18 missing (a single gap before
//! position 19).
//!
//! The counter tracks wheel positions rather than physical teeth, so the
//! crank angle is `(position - 1) * 10` like any evenly spaced wheel.

use super::{DecoderState, EdgeReport, Pattern, STALL_MICROS_PER_DEGREE, WheelGeometry};
use crate::Micros;
use crate::config::TriggerConfig;

pub(crate) struct ThirtySixMinusTwoMinusOne;

impl ThirtySixMinusTwoMinusOne {
    const POSITIONS: u16 = 36;
    const TOOTH_ANGLE: u16 = 10;
    /// Last tooth before the single gap.
    const BEFORE_SINGLE_GAP: u16 = 17;
    const AFTER_SINGLE_GAP: u16 = 19;
    /// Last tooth before the double gap.
    const BEFORE_DOUBLE_GAP: u16 = 34;

    const fn is_missing_position(position: u16) -> bool {
        matches!(position, 18 | 35 | 36)
    }

    fn reference_tooth(state: &mut DecoderState, now: Micros) {
        if state.sync.is_synced() {
            state.bump_start_revolutions();
        } else {
            state.start_revolutions = 0;
        }
        state.tooth_current_count = 1;
        state.revolution_one = !state.revolution_one;
        state.mark_tooth_one(now);
        state.declare_reference_sync();
    }
}

impl Pattern for ThirtySixMinusTwoMinusOne {
    fn geometry(_config: &TriggerConfig) -> WheelGeometry {
        WheelGeometry::even(Self::TOOTH_ANGLE, Self::POSITIONS, false)
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = state.primary_gap(now);
        if gap < state.filter_time {
            return EdgeReport::filtered();
        }

        if !state.has_gap_history() {
            state.record_tooth(now);
            return EdgeReport::accepted();
        }

        let last = state.last_tooth_gap();
        let double_gap = last.saturating_mul(5) >> 1;
        let single_gap = last.saturating_mul(3) >> 1;
        let synced = state.sync.is_synced();

        if gap > double_gap {
            if synced && state.tooth_current_count != Self::BEFORE_DOUBLE_GAP {
                state.lose_sync();
            }
            Self::reference_tooth(state, now);
            state.filter_time = 0;
        } else if gap > single_gap {
            if synced && state.tooth_current_count != Self::BEFORE_SINGLE_GAP {
                state.lose_sync();
                state.tooth_current_count = 0;
            } else {
                state.tooth_current_count = Self::AFTER_SINGLE_GAP;
            }
            state.filter_time = 0;
        } else {
            state.tooth_current_count = state.tooth_current_count.saturating_add(1);
            let position = state.tooth_current_count;
            if synced && Self::is_missing_position(position) {
                state.lose_sync();
                state.tooth_current_count = 0;
            } else if position > Self::POSITIONS {
                state.tooth_current_count = 0;
            }
            state.set_filter(gap);
        }

        state.record_tooth(now);
        EdgeReport::accepted()
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        if state.rpm < state.config.cranking_rpm {
            // Tooth 1 and position 19 follow a gap.
            match state.tooth_current_count {
                1 | Self::AFTER_SINGLE_GAP => state.rpm,
                _ => state.cranking_rpm(Self::POSITIONS, false),
            }
        } else {
            state.std_rpm(false)
        }
    }

    fn stall_time(_state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE * u32::from(Self::TOOTH_ANGLE) * 3
    }
}
