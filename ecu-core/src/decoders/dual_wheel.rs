//! Evenly spaced crank wheel paired with a single cam tooth that marks tooth 1.
//!
//! [`DualWheel`] counts every crank tooth; [`Audi135`] reads a 135 tooth
//! flywheel and only counts every third tooth, giving 45 positions at 8 degrees.

use super::{DecoderState, EdgeReport, Pattern, STALL_MICROS_PER_DEGREE, SyncStatus, WheelGeometry};
use crate::Micros;
use crate::config::{TriggerConfig, WheelSpeed};

pub(crate) struct DualWheel;

impl Pattern for DualWheel {
    fn geometry(config: &TriggerConfig) -> WheelGeometry {
        let teeth = config.teeth.max(1);
        WheelGeometry::even(config.wheel_angle() / teeth, teeth, true)
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = state.primary_gap(now);
        if gap < state.filter_time {
            return EdgeReport::filtered();
        }

        state.tooth_current_count = state.tooth_current_count.saturating_add(1);
        state.set_filter(gap);
        state.record_tooth(now);

        if !state.sync.is_synced() {
            return EdgeReport::accepted();
        }

        if state.tooth_current_count == 1 || state.tooth_current_count > state.config.teeth {
            state.tooth_current_count = 1;
            state.revolution_one = !state.revolution_one;
            state.mark_tooth_one(now);
            state.bump_start_revolutions();
        }
        EdgeReport::tooth(state.even_tooth_event())
    }

    fn secondary(state: &mut DecoderState, now: Micros) {
        let gap = now.wrapping_sub(state.secondary_last_time);
        if gap < state.secondary_filter_time {
            return;
        }
        state.record_secondary(now);
        state.secondary_filter_time = gap >> 2;

        if !state.sync.is_synced() || state.start_revolutions <= u16::from(state.config.stable_cycles) {
            state.tooth_current_count = state.config.teeth;
            // The first crank tooth after the cam must not be filtered out.
            state.filter_time = 0;
            state.sync = SyncStatus::Full;
        } else {
            if state.tooth_current_count != state.config.teeth && state.start_revolutions > 2 {
                state.count_sync_loss();
            }
            if state.config.resync_on_secondary {
                state.tooth_current_count = state.config.teeth;
            }
        }
        state.revolution_one = true;
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        if !state.sync.is_synced() {
            return 0;
        }
        let cam_speed = state.config.speed == WheelSpeed::Cam;
        if state.rpm < state.config.cranking_rpm {
            state.cranking_rpm(state.config.teeth, cam_speed)
        } else {
            state.std_rpm(cam_speed)
        }
    }

    fn set_end_teeth(state: &mut DecoderState, end_angles: &[i16]) {
        super::missing_tooth::MissingTooth::set_end_teeth(state, end_angles);
    }

    fn stall_time(state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE * u32::from(state.geometry.tooth_angle)
    }
}

pub(crate) struct Audi135;

impl Audi135 {
    const RAW_TEETH_PER_POSITION: u8 = 3;
    const POSITIONS: u16 = 45;
    const POSITION_ANGLE: u16 = 8;
}

impl Pattern for Audi135 {
    fn geometry(_config: &TriggerConfig) -> WheelGeometry {
        WheelGeometry::even(Self::POSITION_ANGLE, Self::POSITIONS, false)
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = now.wrapping_sub(state.system_last_time);
        if gap < state.filter_time && state.start_revolutions != 0 {
            return EdgeReport::filtered();
        }
        state.system_last_time = now;
        state.system_count = state.system_count.saturating_add(1);

        if !state.sync.is_synced() {
            state.tooth_last_time = now;
            return EdgeReport::accepted();
        }
        if state.system_count < Self::RAW_TEETH_PER_POSITION {
            return EdgeReport::accepted();
        }

        state.system_count = 0;
        state.tooth_current_count = state.tooth_current_count.saturating_add(1);
        if state.tooth_current_count == 1 || state.tooth_current_count > Self::POSITIONS {
            state.tooth_current_count = 1;
            state.mark_tooth_one(now);
            state.revolution_one = !state.revolution_one;
            state.bump_start_revolutions();
        }
        state.set_filter(gap);
        state.record_tooth(now);
        EdgeReport::accepted()
    }

    fn secondary(state: &mut DecoderState, now: Micros) {
        let gap = now.wrapping_sub(state.secondary_last_time);
        if gap < state.secondary_filter_time {
            return;
        }
        state.record_secondary(now);
        state.secondary_filter_time = gap >> 1;

        if !state.sync.is_synced() {
            state.tooth_current_count = 0;
            state.sync = SyncStatus::Full;
            // Count the very next raw tooth as position 1.
            state.system_count = Self::RAW_TEETH_PER_POSITION;
        } else {
            if state.tooth_current_count != Self::POSITIONS && state.start_revolutions > 2 {
                state.count_sync_loss();
            }
            if state.config.resync_on_secondary {
                state.tooth_current_count = 0;
                state.system_count = Self::RAW_TEETH_PER_POSITION;
            }
        }
        state.revolution_one = true;
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        if !state.sync.is_synced() || state.tooth_current_count == 0 {
            return 0;
        }
        if state.rpm < state.config.cranking_rpm {
            state.cranking_rpm(Self::POSITIONS, false)
        } else {
            state.std_rpm(false)
        }
    }

    fn stall_time(_state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE * u32::from(Self::POSITION_ANGLE)
    }
}
