//! Per-tooth spark refinement.
//!
//! Wheels with enough teeth know the crank angle exactly on every tooth. When
//! the tooth a coil channel is waiting for arrives, the spark compare is
//! recomputed from that tooth instead of from the revolution-time estimate
//! used when the dwell was scheduled.

use crate::channels::IgnitionChannel;
use crate::decoders::{ToothEvent, TriggerDecoder};
use crate::schedule::{CompareTimer, IgnitionSchedule, ScheduleStatus};
use crate::timing::CycleLimits;

/// Stable revolutions required before a pending dwell gets a preset spark compare.
pub const MIN_CYCLES_FOR_END_COMPARE: u16 = 6;

/// Applies `event` to every coil channel whose end tooth it is.
///
/// Dwelling coils get their compare rewritten immediately; coils still
/// waiting to dwell have the spark compare preset once the engine has run
/// for [`MIN_CYCLES_FOR_END_COMPARE`] revolutions. Returns the number of
/// channels adjusted.
pub fn adjust_ignition<T: CompareTimer>(
    event: ToothEvent,
    decoder: &TriggerDecoder,
    channels: &[IgnitionChannel],
    schedules: &mut [IgnitionSchedule<T>],
    limits: &CycleLimits,
) -> usize {
    if event.tooth == 0 {
        return 0;
    }

    let timing = decoder.timing();
    let stable = decoder.start_revolutions() > MIN_CYCLES_FOR_END_COMPARE;
    let mut adjusted = 0;

    for (channel, schedule) in channels.iter().zip(schedules.iter_mut()) {
        if channel.end_tooth != event.tooth {
            continue;
        }

        let remaining = limits.ignition_limits(
            i32::from(channel.end_angle) - i32::from(event.crank_angle),
        );
        let delay = timing.angle_to_time(u16::try_from(remaining).unwrap_or(0));

        let applied = match schedule.status() {
            ScheduleStatus::Running => schedule.retarget_running_end(delay),
            ScheduleStatus::Pending if stable => schedule.preset_end(delay),
            ScheduleStatus::Pending | ScheduleStatus::Off => false,
        };
        if applied {
            adjusted += 1;
        }
    }

    adjusted
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::config::TriggerConfig;

    struct MockTimer<'a> {
        counter: &'a Cell<u16>,
        compare: u16,
    }

    impl CompareTimer for MockTimer<'_> {
        fn counter(&self) -> u16 {
            self.counter.get()
        }

        fn set_compare(&mut self, value: u16) {
            self.compare = value;
        }

        fn enable(&mut self) {}

        fn disable(&mut self) {}
    }

    #[test]
    fn off_channels_and_other_teeth_are_left_alone() {
        let counter = Cell::new(0);
        let decoder = TriggerDecoder::new(TriggerConfig::default()).unwrap();
        let channels = [IgnitionChannel {
            end_tooth: 30,
            end_angle: 350,
            ..IgnitionChannel::new(0)
        }];
        let mut schedules = [IgnitionSchedule::new(
            0,
            MockTimer {
                counter: &counter,
                compare: 0,
            },
        )];
        let limits = CycleLimits::default();

        let event = ToothEvent {
            tooth: 30,
            crank_angle: 290,
        };
        assert_eq!(adjust_ignition(event, &decoder, &channels, &mut schedules, &limits), 0);

        let other = ToothEvent {
            tooth: 0,
            crank_angle: 0,
        };
        assert_eq!(adjust_ignition(other, &decoder, &channels, &mut schedules, &limits), 0);
        assert_eq!(schedules[0].timer().compare, 0);
    }
}
