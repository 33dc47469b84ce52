//! Evenly spaced wheel with a block of missing teeth marking tooth 1 (36-1, 60-2, 24-1, ...).
//!
//! The reference gap is found by comparing each tooth gap against the previous
//! one. Once synced the comparison only runs in the last quarter of the wheel,
//! where the gap is expected; a gap earlier than that, or running past the
//! last physical tooth without one, drops sync.
//!
//! The optional cam input is either a single tooth per cycle or a 4-1 wheel and
//! supplies the revolution parity needed for sequential operation.

use super::{DecoderState, EdgeReport, Pattern, STALL_MICROS_PER_DEGREE, ToothLog, WheelGeometry};
use crate::Micros;
use crate::config::{MAX_CHANNELS, SecondaryPattern, TriggerConfig, WheelSpeed};
use crate::timing::wrap_angle;

pub(crate) struct MissingTooth;

impl MissingTooth {
    /// Gap a tooth must exceed to be the reference: 1.5x the last gap for a
    /// single missing tooth, otherwise `missing` times it.
    fn target_gap(state: &DecoderState) -> Micros {
        let last = state.last_tooth_gap();
        match state.config.missing_teeth {
            1 => last.saturating_mul(3) >> 1,
            missing => last.saturating_mul(u32::from(missing)),
        }
    }

    fn in_gap_window(state: &DecoderState) -> bool {
        let actual = state.geometry.actual_teeth;
        state.tooth_current_count > actual - actual / 4
            || !state.sync.is_synced()
            || state.rpm < state.config.cranking_rpm
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
        // A fresh reference restarts filtering from scratch.
        state.filter_time = 0;
        state.record_tooth(now);
    }
}

impl Pattern for MissingTooth {
    fn geometry(config: &TriggerConfig) -> WheelGeometry {
        let teeth = config.teeth.max(1);
        WheelGeometry::even(
            config.wheel_angle() / teeth,
            teeth.saturating_sub(u16::from(config.missing_teeth)),
            true,
        )
    }

    fn primary(state: &mut DecoderState, now: Micros) -> EdgeReport {
        let gap = state.primary_gap(now);
        if gap < state.filter_time {
            return EdgeReport::filtered();
        }

        state.tooth_current_count = state.tooth_current_count.saturating_add(1);
        if !state.has_gap_history() {
            state.record_tooth(now);
            return EdgeReport::accepted();
        }

        if Self::in_gap_window(state) {
            let actual = state.geometry.actual_teeth;
            if gap > Self::target_gap(state) {
                if state.tooth_current_count < actual && state.sync.is_synced() {
                    // Gap arrived before the last physical tooth: teeth were lost.
                    state.lose_sync();
                } else {
                    Self::reference_tooth(state, now);
                    return EdgeReport::accepted();
                }
            } else if state.tooth_current_count > actual {
                state.lose_sync();
                state.tooth_current_count = 0;
            }
        }

        state.set_filter(gap);
        state.record_tooth(now);
        EdgeReport::tooth(state.even_tooth_event())
    }

    fn secondary(state: &mut DecoderState, now: Micros) {
        let gap = now.wrapping_sub(state.secondary_last_time);
        if gap < state.secondary_filter_time {
            return;
        }

        match state.config.secondary {
            SecondaryPattern::FourMinusOne => {
                let last = state
                    .secondary_last_time
                    .wrapping_sub(state.secondary_last_minus_one_time);
                let target = last.saturating_mul(3) >> 1;
                if gap >= target || state.secondary_count > 3 {
                    state.secondary_count = 1;
                    state.revolution_one = true;
                    state.secondary_filter_time = 0;
                } else {
                    state.secondary_filter_time = gap >> 2;
                    state.secondary_count = state.secondary_count.saturating_add(1);
                }
            }
            SecondaryPattern::Single => {
                state.revolution_one = true;
                state.secondary_filter_time = gap >> 1;
                state.secondary_count = state.secondary_count.saturating_add(1);
            }
        }
        state.record_secondary(now);
    }

    fn rpm(state: &mut DecoderState) -> u16 {
        let cam_speed = state.config.speed == WheelSpeed::Cam;
        if state.rpm < state.config.cranking_rpm {
            // The last gap on tooth 1 spans the missing teeth.
            if state.tooth_current_count == 1 {
                state.rpm
            } else {
                state.cranking_rpm(state.config.teeth, cam_speed)
            }
        } else {
            state.std_rpm(cam_speed)
        }
    }

    fn crank_angle(log: &ToothLog, now: Micros) -> i16 {
        log.even_angle(now)
    }

    fn set_end_teeth(state: &mut DecoderState, end_angles: &[i16]) {
        let teeth = state.config.teeth;
        let actual = state.geometry.actual_teeth;
        let tooth_angle = state.geometry.tooth_angle.max(1);
        let revolutions = if state.config.sequential && state.config.speed == WheelSpeed::Crank {
            2
        } else {
            1
        };
        let cycle = state.config.cycle_angle();

        state.end_teeth = [0; MAX_CHANNELS];
        for (slot, &end_angle) in state.end_teeth.iter_mut().zip(end_angles) {
            let relative = wrap_angle(
                i32::from(end_angle) - i32::from(state.config.trigger_angle),
                cycle,
            );
            // Whole tooth angles past tooth 1, leaving at least one tooth of margin.
            let mut tooth = u16::try_from(relative).unwrap_or(0) / tooth_angle;
            if tooth == 0 {
                tooth = teeth * revolutions;
            }
            let revolution = (tooth - 1) / teeth;
            let position = (tooth - 1) % teeth + 1;
            *slot = revolution * teeth + position.min(actual);
        }
    }

    fn stall_time(state: &DecoderState) -> Micros {
        STALL_MICROS_PER_DEGREE
            * u32::from(state.geometry.tooth_angle)
            * (u32::from(state.config.missing_teeth) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::{SyncStatus, TriggerDecoder};

    const GAP: Micros = 1_000;

    fn decoder(config: TriggerConfig) -> TriggerDecoder {
        TriggerDecoder::new(config).unwrap()
    }

    /// Feeds one 36-1 revolution starting at `start`, returning the time of the next tooth 1.
    fn feed_revolution(decoder: &mut TriggerDecoder, start: Micros) -> Micros {
        let mut now = start;
        for _ in 0..35 {
            decoder.primary_edge(now);
            now += GAP;
        }
        now + GAP
    }

    #[test]
    fn syncs_on_first_gap() {
        let mut decoder = decoder(TriggerConfig::default());
        let next = feed_revolution(&mut decoder, 10_000);
        assert_eq!(decoder.sync_status(), SyncStatus::None);

        decoder.primary_edge(next);
        assert_eq!(decoder.sync_status(), SyncStatus::Full);
        assert_eq!(decoder.tooth(), 1);
    }

    #[test]
    fn early_gap_counts_one_sync_loss() {
        let mut decoder = decoder(TriggerConfig::default());
        let mut now = feed_revolution(&mut decoder, 10_000);
        decoder.primary_edge(now);
        assert!(decoder.has_sync());

        for _ in 0..29 {
            now += GAP;
            decoder.primary_edge(now);
        }
        assert_eq!(decoder.tooth(), 30);
        now += 3 * GAP;
        decoder.primary_edge(now);
        assert!(!decoder.has_sync());
        assert_eq!(decoder.sync_loss_count(), 1);
    }

    #[test]
    fn end_teeth_clamp_into_present_teeth() {
        let mut decoder = decoder(TriggerConfig::default().with_per_tooth_ignition(true));
        decoder.set_end_teeth(&[355, 100, 5]);
        assert_eq!(decoder.end_tooth(0), 35);
        assert_eq!(decoder.end_tooth(1), 10);
        assert_eq!(decoder.end_tooth(2), 35);
        assert_eq!(decoder.end_tooth(3), 0);
    }

    #[test]
    fn sequential_end_teeth_use_second_revolution_numbers() {
        let mut decoder = decoder(
            TriggerConfig::default()
                .with_per_tooth_ignition(true)
                .with_sequential(true),
        );
        decoder.set_end_teeth(&[460, 715]);
        assert_eq!(decoder.end_tooth(0), 36 + 10);
        assert_eq!(decoder.end_tooth(1), 36 + 35);
    }

    #[test]
    fn stall_time_spans_the_gap_at_50_rpm() {
        let mut decoder = decoder(TriggerConfig::default());
        assert_eq!(decoder.stall_time(), 3_334 * 10 * 2);

        // 50 RPM: 1.2 s per revolution, the missing tooth doubles the gap.
        let gap = 1_200_000 / 36 * 2 + 1;
        assert!(decoder.stall_time() > gap);
        decoder.primary_edge(1_000);
        assert!(!decoder.is_stalled(1_000 + gap));
        assert!(decoder.is_stalled(1_000 + decoder.stall_time() + 1));
    }
}
